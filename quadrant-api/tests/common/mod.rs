//! Common test utilities for integration tests
//!
//! The router is built over `MemoryStore`, a pinned clock, cheap password
//! hashing and a scripted OAuth verifier, so no database is needed. Requests
//! go straight through `tower::Service::call`.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{DateTime, TimeZone, Utc};
use quadrant_api::app::{build_router, AppState};
use quadrant_api::config::Config;
use quadrant_shared::auth::oauth::{OAuthError, OAuthIdentity, OAuthVerifier};
use quadrant_shared::clock::FixedClock;
use quadrant_shared::config::{AuthSettings, HashingParams};
use quadrant_shared::store::MemoryStore;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tower::Service as _;

pub const SECRET: &str = "test-secret-key-at-least-32-bytes-long";
pub const PASSWORD: &str = "Passw0rd";

/// Verifier that accepts only tokens registered with [`FakeOAuth::accept`]
#[derive(Default)]
pub struct FakeOAuth {
    identities: Mutex<HashMap<String, OAuthIdentity>>,
}

impl FakeOAuth {
    pub fn accept(&self, token: &str, external_id: &str, email: &str) {
        self.identities.lock().unwrap().insert(
            token.to_string(),
            OAuthIdentity {
                external_id: external_id.to_string(),
                email: email.to_string(),
                name: Some("Google User".to_string()),
                avatar_url: None,
            },
        );
    }
}

#[async_trait]
impl OAuthVerifier for FakeOAuth {
    async fn verify(&self, token: &str) -> Result<OAuthIdentity, OAuthError> {
        self.identities
            .lock()
            .unwrap()
            .get(token)
            .cloned()
            .ok_or_else(|| OAuthError::Invalid("unknown token".to_string()))
    }
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap()
}

/// Test context containing the router and its collaborators
pub struct TestContext {
    pub app: axum::Router,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<FixedClock>,
    pub oauth: Arc<FakeOAuth>,
}

/// Decoded response
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestContext {
    pub fn new() -> Self {
        let auth = AuthSettings::new(SECRET).unwrap().with_hashing(HashingParams {
            memory_kib: 4096,
            iterations: 1,
            parallelism: 1,
        });
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(FixedClock::new(start_time()));
        let oauth = Arc::new(FakeOAuth::default());

        let state = AppState::new(
            Config::with_auth(auth),
            store.clone(),
            oauth.clone(),
            clock.clone(),
        );

        Self {
            app: build_router(state),
            store,
            clock,
            oauth,
        }
    }

    /// Sends a request; `body` is sent as JSON when present
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().call(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        TestResponse { status, body }
    }

    pub async fn get(&self, uri: &str, token: &str) -> TestResponse {
        self.send("GET", uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.send("POST", uri, token, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: &str, body: Option<Value>) -> TestResponse {
        self.send("PATCH", uri, Some(token), body).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> TestResponse {
        self.send("DELETE", uri, Some(token), None).await
    }

    /// Registers an account and returns its access token
    pub async fn register(&self, email: &str) -> String {
        let response = self
            .post(
                "/v1/auth/register",
                None,
                json!({ "email": email, "password": PASSWORD }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.body["access_token"].as_str().unwrap().to_string()
    }

    /// Logs in with the shared test password and returns the access token
    pub async fn login(&self, email: &str) -> String {
        let response = self
            .post(
                "/v1/auth/login",
                None,
                json!({ "email": email, "password": PASSWORD }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.body);
        response.body["access_token"].as_str().unwrap().to_string()
    }

    /// Creates a project and returns its id
    pub async fn project(&self, token: &str, name: &str) -> String {
        let response = self.post("/v1/projects", Some(token), json!({ "name": name })).await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.body["id"].as_str().unwrap().to_string()
    }

    /// Creates a task and returns its JSON
    pub async fn task(&self, token: &str, project_id: &str, title: &str, urgent: bool, important: bool) -> Value {
        let response = self
            .post(
                "/v1/tasks",
                Some(token),
                json!({
                    "project_id": project_id,
                    "title": title,
                    "is_urgent": urgent,
                    "is_important": important,
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.body
    }
}
