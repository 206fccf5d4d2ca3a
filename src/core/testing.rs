//! Shared helpers for router tests
//!
//! Requests go through `tower::ServiceExt::oneshot` against an app backed by
//! the in-memory store and the token-scripted requesters.

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use serde_json::Value;
use tower::ServiceExt;

use crate::core::db::MemoryStore;
use crate::core::requesters::{MockToken, Requesters};
use crate::core::state::{AppState, app_router};

pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub token: MockToken,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_requesters(Requesters::mock())
    }

    pub fn with_requesters(requesters: Requesters) -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(store.clone(), store.clone(), requesters);

        Self {
            store,
            token: MockToken::new(),
            router: app_router(state),
        }
    }

    /// Send a request, authenticated with `self.token`, and return status and JSON body
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<&Value>,
        authenticated: bool,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if authenticated {
            builder = builder.header(header::AUTHORIZATION, self.token.bearer());
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        (status, json)
    }

    async fn check_status(
        &self,
        method: Method,
        uri: &str,
        body: Option<&Value>,
        expected: &[u16],
    ) -> Value {
        let (status, json) = self.request(method.clone(), uri, body, true).await;
        assert!(
            expected.contains(&status.as_u16()),
            "{} {} answered {}, expected one of {:?}: {}",
            method,
            uri,
            status,
            expected,
            json
        );
        json
    }

    pub async fn get_and_check_status(&self, uri: &str, expected: &[u16]) -> Value {
        self.check_status(Method::GET, uri, None, expected).await
    }

    pub async fn post_and_check_status(&self, uri: &str, body: &Value, expected: &[u16]) -> Value {
        self.check_status(Method::POST, uri, Some(body), expected)
            .await
    }

    pub async fn patch_and_check_status(&self, uri: &str, body: &Value, expected: &[u16]) -> Value {
        self.check_status(Method::PATCH, uri, Some(body), expected)
            .await
    }

    pub async fn delete_and_check_status(&self, uri: &str, expected: &[u16]) -> Value {
        self.check_status(Method::DELETE, uri, None, expected).await
    }
}

/// Check the keys of an object, or of every object in a list
///
/// With `allow_extra_fields` the object only needs to contain `fields`.
pub fn fields_test(json: &Value, fields: &[&str], allow_extra_fields: bool) {
    match json {
        Value::Object(_) => single_object_fields_test(json, fields, allow_extra_fields),
        Value::Array(items) => {
            for item in items {
                single_object_fields_test(item, fields, allow_extra_fields);
            }
        }
        other => panic!("expected an object or a list, got {}", other),
    }
}

fn single_object_fields_test(json: &Value, fields: &[&str], allow_extra_fields: bool) {
    let object = json.as_object().expect("list item is not an object");
    let keys: BTreeSet<&str> = object.keys().map(String::as_str).collect();
    let needed: BTreeSet<&str> = fields.iter().copied().collect();

    let missing: Vec<_> = needed.difference(&keys).collect();
    assert!(missing.is_empty(), "missing fields {:?} in {}", missing, json);

    if !allow_extra_fields {
        let extra: Vec<_> = keys.difference(&needed).collect();
        assert!(extra.is_empty(), "unexpected fields {:?} in {}", extra, json);
    }
}

/// Check that a list response holds exactly the persisted rows, matched on `lookup_field`
pub fn list_test(json: &Value, persisted: &[i64], lookup_field: &str) {
    let items = json.as_array().expect("response is not a list");
    assert_eq!(
        items.len(),
        persisted.len(),
        "response has {} items, store has {}",
        items.len(),
        persisted.len()
    );

    for id in persisted {
        assert!(
            items.iter().any(|item| item[lookup_field] == *id),
            "{} {} is missing from the response",
            lookup_field,
            id
        );
    }
}
