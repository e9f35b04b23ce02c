//! In-process fixtures for unit and router tests

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use rust_decimal::Decimal;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

use crate::config::test_config;
use crate::database::models::{DetailedRequirement, FeeBreakdown, NewUser, Profile, User, VisaType};
use crate::database::{MemoryStore, Store};
use crate::state::AppState;
use crate::types::{Role, VisaCategory};

pub const TEST_PASSWORD: &str = "password1";

/// Memory-backed state with a throwaway upload root
pub struct TestContext {
    pub state: AppState,
    upload_dir: TempDir,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    /// Same fixtures over a caller-supplied store
    pub fn with_store(store: Arc<dyn Store>) -> Self {
        let upload_dir = tempfile::tempdir().expect("create upload dir");
        let config = test_config(upload_dir.path().to_path_buf());
        let state = AppState::with_store(config, store).expect("build state");
        Self { state, upload_dir }
    }

    pub fn upload_root(&self) -> &Path {
        self.upload_dir.path()
    }

    pub fn router(&self) -> Router {
        crate::router::app(self.state.clone())
    }

    /// A fresh active account with `role` plus a bearer token for it
    pub async fn user(&self, role: Role) -> (User, String) {
        let id = Uuid::new_v4().simple().to_string();
        let password_hash = self
            .state
            .passwords
            .hash(TEST_PASSWORD.to_string())
            .await
            .expect("hash password");
        let user = self
            .state
            .store
            .insert_user(NewUser {
                name: format!("User {}", &id[..8]),
                email: format!("{}@example.com", id),
                password_hash,
                role,
                profile: Profile::default(),
            })
            .await
            .expect("insert user");
        let token = self.state.tokens.issue(user.id).expect("issue token");
        (user, token)
    }

    pub async fn visa_type(
        &self,
        country: &str,
        country_code: &str,
        category: VisaCategory,
        public_requirements: Vec<String>,
    ) -> VisaType {
        let now = chrono::Utc::now();
        let entry = VisaType {
            id: Uuid::new_v4(),
            country: country.to_string(),
            country_code: country_code.to_string(),
            name: format!("{} {}", country, category),
            category,
            public_requirements,
            detailed_requirements: vec![DetailedRequirement {
                title: "Bank statements".to_string(),
                description: "Last three months".to_string(),
                mandatory: true,
            }],
            fees: FeeBreakdown::new(Decimal::new(8000, 2), Decimal::new(2500, 2), "EUR"),
            processing_time: "10 days".to_string(),
            validity: "90 days".to_string(),
            max_stay: "30 days".to_string(),
            pdf_files: vec![],
            is_active: true,
            updated_by: None,
            created_at: now,
            updated_at: now,
        };
        self.state.store.insert_visa_type(entry).await.expect("insert visa type")
    }

    /// Drive the router once and decode the JSON body (Null when empty)
    pub async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("build request");

        let response = self.router().oneshot(request).await.expect("router response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }
}
