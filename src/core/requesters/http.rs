//! HTTP implementations of the collaborator clients

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{
    AppInfo, AuthRequester, AwardsRequester, MediaRequester, RequesterError, TokenPair, UserInfo,
};
use crate::core::auth::JwtVerifier;

/// Longest error body kept from a collaborator answer
const MAX_ERROR_BODY: usize = 500;

/// A reqwest client bound to one service's base URL
#[derive(Clone)]
struct ServiceClient {
    service: &'static str,
    base_url: String,
    client: Client,
}

impl ServiceClient {
    fn new(service: &'static str, client: Client, base_url: &str) -> Self {
        Self {
            service,
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn get(&self, path: &str, token: &str) -> Result<Response, RequesterError> {
        let url = self.url(path);
        tracing::debug!("GET {} ({} service)", url, self.service);

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| self.connection_error(e))?;

        self.check_status(response).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        token: &str,
    ) -> Result<T, RequesterError> {
        let response = self.get(path, token).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| RequesterError::InvalidResponse {
                service: self.service,
                message: e.to_string(),
            })
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, RequesterError> {
        let url = self.url(path);
        tracing::debug!("POST {} ({} service)", url, self.service);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.connection_error(e))?;

        self.check_status(response)
            .await?
            .json::<T>()
            .await
            .map_err(|e| RequesterError::InvalidResponse {
                service: self.service,
                message: e.to_string(),
            })
    }

    async fn check_status(&self, response: Response) -> Result<Response, RequesterError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        tracing::warn!("{} service answered {}: {}", self.service, status, body);

        Err(RequesterError::Status {
            service: self.service,
            status: status.as_u16(),
            body,
        })
    }

    fn connection_error(&self, err: reqwest::Error) -> RequesterError {
        tracing::error!("Failed to reach {} service: {}", self.service, err);
        RequesterError::Connection {
            service: self.service,
            message: err.to_string(),
        }
    }
}

// ============================================================================
// Auth service
// ============================================================================

#[derive(Serialize)]
struct SignUpBody<'a> {
    username: &'a str,
    password: &'a str,
    email: &'a str,
}

#[derive(Clone)]
pub struct HttpAuthRequester {
    inner: ServiceClient,
    local: Option<JwtVerifier>,
}

impl HttpAuthRequester {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            inner: ServiceClient::new("auth", client, base_url),
            local: None,
        }
    }

    /// Verify user tokens with a shared secret instead of asking the auth service
    pub fn with_local_verification(mut self, verifier: JwtVerifier) -> Self {
        self.local = Some(verifier);
        self
    }
}

#[async_trait]
impl AuthRequester for HttpAuthRequester {
    async fn get_user_info(&self, token: &str) -> Result<UserInfo, RequesterError> {
        if let Some(verifier) = &self.local {
            return verifier
                .verify(token)
                .and_then(UserInfo::try_from)
                .map_err(|e| RequesterError::Status {
                    service: "auth",
                    status: 401,
                    body: e.to_string(),
                });
        }

        self.inner.get_json("/api/users/me/", token).await
    }

    async fn app_auth(&self, token: &str) -> Result<AppInfo, RequesterError> {
        self.inner.get_json("/api/apps/me/", token).await
    }

    async fn sign_up(
        &self,
        username: &str,
        password: &str,
        email: &str,
    ) -> Result<TokenPair, RequesterError> {
        self.inner
            .post_json(
                "/api/register/",
                &SignUpBody {
                    username,
                    password,
                    email,
                },
            )
            .await
    }
}

// ============================================================================
// Awards service
// ============================================================================

#[derive(Clone)]
pub struct HttpAwardsRequester {
    inner: ServiceClient,
}

impl HttpAwardsRequester {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            inner: ServiceClient::new("awards", client, base_url),
        }
    }
}

#[async_trait]
impl AwardsRequester for HttpAwardsRequester {
    async fn get_pin(&self, id: i64, token: &str) -> Result<(), RequesterError> {
        self.inner.get(&format!("/api/pins/{}/", id), token).await?;
        Ok(())
    }

    async fn get_geopin(&self, id: i64, token: &str) -> Result<(), RequesterError> {
        self.inner.get(&format!("/api/geopins/{}/", id), token).await?;
        Ok(())
    }

    async fn get_achievement(&self, id: i64, token: &str) -> Result<(), RequesterError> {
        self.inner
            .get(&format!("/api/achievements/{}/", id), token)
            .await?;
        Ok(())
    }
}

// ============================================================================
// Media service
// ============================================================================

#[derive(Clone)]
pub struct HttpMediaRequester {
    inner: ServiceClient,
}

impl HttpMediaRequester {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            inner: ServiceClient::new("media", client, base_url),
        }
    }
}

#[async_trait]
impl MediaRequester for HttpMediaRequester {
    async fn get_image_info(&self, id: i64, token: &str) -> Result<(), RequesterError> {
        self.inner.get(&format!("/api/images/{}/", id), token).await?;
        Ok(())
    }
}
