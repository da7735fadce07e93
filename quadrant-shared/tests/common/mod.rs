//! Shared fixtures for service tests
//!
//! Every service is wired to one `MemoryStore`, cheap Argon2 parameters, a
//! pinned clock and a scripted OAuth verifier.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use quadrant_shared::auth::oauth::{OAuthError, OAuthIdentity, OAuthVerifier};
use quadrant_shared::clock::FixedClock;
use quadrant_shared::config::{AuthSettings, HashingParams};
use quadrant_shared::models::project::{NewProject, Project};
use quadrant_shared::models::task::{NewTask, Task};
use quadrant_shared::models::user::User;
use quadrant_shared::services::{
    AuthService, ProjectService, Registration, TaskService, UserService,
};
use quadrant_shared::store::MemoryStore;

pub const SECRET: &str = "test-secret-key-at-least-32-bytes-long";
pub const PASSWORD: &str = "Passw0rd";

/// Verifier that accepts only tokens registered with [`FakeOAuth::accept`]
#[derive(Default)]
pub struct FakeOAuth {
    identities: Mutex<HashMap<String, OAuthIdentity>>,
}

impl FakeOAuth {
    pub fn accept(&self, token: &str, identity: OAuthIdentity) {
        self.identities
            .lock()
            .unwrap()
            .insert(token.to_string(), identity);
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

pub fn identity(external_id: &str, email: &str) -> OAuthIdentity {
    OAuthIdentity {
        external_id: external_id.to_string(),
        email: email.to_string(),
        name: Some("Google User".to_string()),
        avatar_url: Some(format!("https://example.com/{}.png", external_id)),
    }
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap()
}

pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub settings: Arc<AuthSettings>,
    pub clock: Arc<FixedClock>,
    pub oauth: Arc<FakeOAuth>,
    pub auth: AuthService,
    pub users: UserService,
    pub projects: ProjectService,
    pub tasks: TaskService,
}

impl TestContext {
    pub fn new() -> Self {
        let settings = AuthSettings::new(SECRET).unwrap().with_hashing(HashingParams {
            memory_kib: 4096,
            iterations: 1,
            parallelism: 1,
        });
        Self::with_settings(settings)
    }

    pub fn with_settings(settings: AuthSettings) -> Self {
        let store = Arc::new(MemoryStore::new());
        let settings = Arc::new(settings);
        let clock = Arc::new(FixedClock::new(start_time()));
        let oauth = Arc::new(FakeOAuth::default());

        Self {
            auth: AuthService::new(store.clone(), settings.clone(), oauth.clone(), clock.clone()),
            users: UserService::new(store.clone(), settings.clone()),
            projects: ProjectService::new(store.clone()),
            tasks: TaskService::new(store.clone(), store.clone(), clock.clone()),
            store,
            settings,
            clock,
            oauth,
        }
    }

    pub async fn register(&self, email: &str) -> User {
        self.auth
            .register(Registration {
                email: email.to_string(),
                password: PASSWORD.to_string(),
                full_name: None,
            })
            .await
            .unwrap()
    }

    pub async fn project(&self, owner: &User, name: &str) -> Project {
        self.projects
            .create(
                owner,
                NewProject {
                    name: name.to_string(),
                    description: None,
                },
            )
            .await
            .unwrap()
    }

    pub async fn task(&self, owner: &User, project: &Project, title: &str, urgent: bool, important: bool) -> Task {
        self.tasks
            .create(owner, NewTask::new(project.id, title).with_flags(urgent, important))
            .await
            .unwrap()
    }
}
