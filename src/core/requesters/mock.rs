//! Token-scripted collaborator mocks
//!
//! In mock mode the bearer token is a JSON object that tells every mocked
//! service how to behave:
//!
//! ```json
//! {"auth": "", "app_auth": "", "awards": "", "media": "",
//!  "role": "user", "authenticate": true, "id": 1}
//! ```
//!
//! A non-empty service key makes that service fail with the given error
//! (`"error"` for a transport failure, `"bad_code_4xx"`/`"bad_code_500"` for
//! an HTTP status). `authenticate: false` makes user lookups answer 401 and
//! `role: "admin"` marks the caller as a superuser. `id`, `username` and
//! `email` override the identity returned for the token.

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{
    AppInfo, AuthRequester, AwardsRequester, MediaRequester, RequesterError, TokenPair, UserInfo,
};

/// User id a mock token resolves to unless overridden
pub const DEFAULT_MOCK_USER_ID: i64 = 1;

const KEY_ROLE: &str = "role";
const KEY_AUTHENTICATE: &str = "authenticate";

/// Which mocked service an injected error applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKey {
    Auth,
    AppAuth,
    Awards,
    Media,
}

impl ErrorKey {
    pub const ALL: [ErrorKey; 4] = [
        ErrorKey::Auth,
        ErrorKey::AppAuth,
        ErrorKey::Awards,
        ErrorKey::Media,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKey::Auth => "auth",
            ErrorKey::AppAuth => "app_auth",
            ErrorKey::Awards => "awards",
            ErrorKey::Media => "media",
        }
    }

    fn service(&self) -> &'static str {
        match self {
            ErrorKey::Auth | ErrorKey::AppAuth => "auth",
            ErrorKey::Awards => "awards",
            ErrorKey::Media => "media",
        }
    }
}

/// Injected failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockError {
    ErrorToken,
    BadCode400,
    BadCode401,
    BadCode403,
    BadCode404,
    BadCode500,
}

impl MockError {
    pub fn as_str(&self) -> &'static str {
        match self {
            MockError::ErrorToken => "error",
            MockError::BadCode400 => "bad_code_400",
            MockError::BadCode401 => "bad_code_401",
            MockError::BadCode403 => "bad_code_403",
            MockError::BadCode404 => "bad_code_404",
            MockError::BadCode500 => "bad_code_500",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "error" => Some(MockError::ErrorToken),
            "bad_code_400" => Some(MockError::BadCode400),
            "bad_code_401" => Some(MockError::BadCode401),
            "bad_code_403" => Some(MockError::BadCode403),
            "bad_code_404" => Some(MockError::BadCode404),
            "bad_code_500" => Some(MockError::BadCode500),
            _ => None,
        }
    }

    fn into_requester_error(self, service: &'static str) -> RequesterError {
        let status = match self {
            MockError::ErrorToken => {
                return RequesterError::Connection {
                    service,
                    message: "mocked connection failure".to_string(),
                };
            }
            MockError::BadCode400 => 400,
            MockError::BadCode401 => 401,
            MockError::BadCode403 => 403,
            MockError::BadCode404 => 404,
            MockError::BadCode500 => 500,
        };
        RequesterError::Status {
            service,
            status,
            body: format!("mocked {} answer", status),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

/// Builder for mock bearer tokens
#[derive(Debug, Clone)]
pub struct MockToken {
    payload: Map<String, Value>,
}

impl Default for MockToken {
    fn default() -> Self {
        Self::new()
    }
}

impl MockToken {
    /// A token for a regular, authenticated user with no injected errors
    pub fn new() -> Self {
        let mut payload = Map::new();
        for key in ErrorKey::ALL {
            payload.insert(key.as_str().to_string(), Value::String(String::new()));
        }
        payload.insert(KEY_ROLE.to_string(), Value::from(Role::User.as_str()));
        payload.insert(KEY_AUTHENTICATE.to_string(), Value::Bool(true));
        Self { payload }
    }

    /// A token for a specific user id
    pub fn for_user(user_id: i64) -> Self {
        let mut token = Self::new();
        token.set_another_key("id", user_id);
        token
    }

    pub fn set_error(&mut self, service: ErrorKey, error: MockError) {
        self.payload
            .insert(service.as_str().to_string(), Value::from(error.as_str()));
    }

    pub fn set_role(&mut self, role: Role) {
        self.payload
            .insert(KEY_ROLE.to_string(), Value::from(role.as_str()));
    }

    pub fn set_another_key(&mut self, key: &str, val: impl Into<Value>) {
        self.payload.insert(key.to_string(), val.into());
    }

    pub fn set_authenticate(&mut self, val: bool) {
        self.payload
            .insert(KEY_AUTHENTICATE.to_string(), Value::Bool(val));
    }

    /// Raw token (the JSON payload)
    pub fn token(&self) -> String {
        Value::Object(self.payload.clone()).to_string()
    }

    /// Value for the Authorization header
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token())
    }
}

/// Parsed mock token as seen by the mocked services
struct MockScript {
    payload: Map<String, Value>,
}

impl MockScript {
    fn parse(token: &str, service: &'static str) -> Result<Self, RequesterError> {
        match serde_json::from_str::<Value>(token) {
            Ok(Value::Object(payload)) => Ok(Self { payload }),
            _ => Err(RequesterError::Status {
                service,
                status: 401,
                body: "malformed mock token".to_string(),
            }),
        }
    }

    fn injected(&self, key: ErrorKey) -> Result<(), RequesterError> {
        let error = self
            .payload
            .get(key.as_str())
            .and_then(Value::as_str)
            .and_then(MockError::parse);

        match error {
            Some(error) => Err(error.into_requester_error(key.service())),
            None => Ok(()),
        }
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    fn authenticated(&self) -> bool {
        self.payload
            .get(KEY_AUTHENTICATE)
            .and_then(Value::as_bool)
            .unwrap_or(true)
    }

    fn user_info(&self) -> UserInfo {
        let id = self
            .payload
            .get("id")
            .and_then(Value::as_i64)
            .unwrap_or(DEFAULT_MOCK_USER_ID);

        UserInfo {
            id,
            username: self
                .str_field("username")
                .map(str::to_string)
                .unwrap_or_else(|| format!("mock_user_{}", id)),
            email: self.str_field("email").unwrap_or_default().to_string(),
            is_superuser: self.str_field(KEY_ROLE) == Some(Role::Admin.as_str()),
        }
    }
}

/// Every collaborator, answering as the token says
#[derive(Debug, Clone, Copy, Default)]
pub struct MockRequester;

impl MockRequester {
    fn lookup(token: &str, key: ErrorKey) -> Result<MockScript, RequesterError> {
        let script = MockScript::parse(token, key.service())?;
        script.injected(key)?;
        Ok(script)
    }
}

#[async_trait]
impl AuthRequester for MockRequester {
    async fn get_user_info(&self, token: &str) -> Result<UserInfo, RequesterError> {
        let script = Self::lookup(token, ErrorKey::Auth)?;
        if !script.authenticated() {
            return Err(RequesterError::Status {
                service: "auth",
                status: 401,
                body: "mocked unauthenticated user".to_string(),
            });
        }
        Ok(script.user_info())
    }

    async fn app_auth(&self, token: &str) -> Result<AppInfo, RequesterError> {
        Self::lookup(token, ErrorKey::AppAuth)?;
        Ok(AppInfo {
            id: 1,
            name: "mock_app".to_string(),
        })
    }

    async fn sign_up(
        &self,
        username: &str,
        _password: &str,
        email: &str,
    ) -> Result<TokenPair, RequesterError> {
        let mut access = MockToken::new();
        access.set_another_key("username", username);
        access.set_another_key("email", email);

        Ok(TokenPair {
            access: access.token(),
            refresh: format!("mock-refresh-{}", username),
        })
    }
}

#[async_trait]
impl AwardsRequester for MockRequester {
    async fn get_pin(&self, _id: i64, token: &str) -> Result<(), RequesterError> {
        Self::lookup(token, ErrorKey::Awards).map(|_| ())
    }

    async fn get_geopin(&self, _id: i64, token: &str) -> Result<(), RequesterError> {
        Self::lookup(token, ErrorKey::Awards).map(|_| ())
    }

    async fn get_achievement(&self, _id: i64, token: &str) -> Result<(), RequesterError> {
        Self::lookup(token, ErrorKey::Awards).map(|_| ())
    }
}

#[async_trait]
impl MediaRequester for MockRequester {
    async fn get_image_info(&self, _id: i64, token: &str) -> Result<(), RequesterError> {
        Self::lookup(token, ErrorKey::Media).map(|_| ())
    }
}
