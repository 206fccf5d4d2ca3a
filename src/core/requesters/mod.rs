//! Clients for the services this one depends on
//!
//! - auth service: user identity, app (service-to-service) tokens, sign-up
//! - awards service: pin, geopin and achievement existence
//! - media service: image existence
//!
//! Each collaborator is a trait so handlers work the same against the real
//! HTTP services ([`http`]) and against token-scripted mocks ([`mock`]).

pub mod http;
pub mod mock;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::config::{Config, RequestersMode};

pub use http::{HttpAuthRequester, HttpAwardsRequester, HttpMediaRequester};
pub use mock::{ErrorKey, MockError, MockRequester, MockToken, Role};

/// Collaborator call failure
#[derive(Debug, thiserror::Error)]
pub enum RequesterError {
    #[error("{service} service is unreachable: {message}")]
    Connection {
        service: &'static str,
        message: String,
    },

    #[error("{service} service answered {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("Unexpected response from {service} service: {message}")]
    InvalidResponse {
        service: &'static str,
        message: String,
    },

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[from] reqwest::Error),
}

impl RequesterError {
    /// Status code the collaborator answered with, if it answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            RequesterError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Identity of the user behind a bearer token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: i64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub is_superuser: bool,
}

/// Identity of the service behind an app token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppInfo {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

/// Tokens issued by the auth service on sign-up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

#[async_trait]
pub trait AuthRequester: Send + Sync {
    async fn get_user_info(&self, token: &str) -> Result<UserInfo, RequesterError>;

    async fn app_auth(&self, token: &str) -> Result<AppInfo, RequesterError>;

    async fn sign_up(
        &self,
        username: &str,
        password: &str,
        email: &str,
    ) -> Result<TokenPair, RequesterError>;
}

#[async_trait]
pub trait AwardsRequester: Send + Sync {
    async fn get_pin(&self, id: i64, token: &str) -> Result<(), RequesterError>;

    async fn get_geopin(&self, id: i64, token: &str) -> Result<(), RequesterError>;

    async fn get_achievement(&self, id: i64, token: &str) -> Result<(), RequesterError>;
}

#[async_trait]
pub trait MediaRequester: Send + Sync {
    async fn get_image_info(&self, id: i64, token: &str) -> Result<(), RequesterError>;
}

/// The full set of collaborator clients
#[derive(Clone)]
pub struct Requesters {
    pub auth: Arc<dyn AuthRequester>,
    pub awards: Arc<dyn AwardsRequester>,
    pub media: Arc<dyn MediaRequester>,
}

impl Requesters {
    /// Token-scripted mocks for every collaborator
    pub fn mock() -> Self {
        let mock = Arc::new(MockRequester);
        Self {
            auth: mock.clone(),
            awards: mock.clone(),
            media: mock,
        }
    }

    /// HTTP clients pointed at the configured base URLs
    pub fn http(config: &Config) -> Result<Self, RequesterError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()?;

        let mut auth = HttpAuthRequester::new(client.clone(), &config.auth_service_url);
        if let Some(secret) = &config.jwt_secret {
            auth = auth.with_local_verification(crate::core::auth::JwtVerifier::new(secret));
        }

        Ok(Self {
            auth: Arc::new(auth),
            awards: Arc::new(HttpAwardsRequester::new(
                client.clone(),
                &config.awards_service_url,
            )),
            media: Arc::new(HttpMediaRequester::new(client, &config.media_service_url)),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, RequesterError> {
        match config.requesters_mode {
            RequestersMode::Http => Self::http(config),
            RequestersMode::Mock => Ok(Self::mock()),
        }
    }
}
