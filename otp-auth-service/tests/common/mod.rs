//! Shared setup for router-level integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use otp_auth_service::{
    build_router,
    config::{
        AuthConfig, DatabaseConfig, Environment, OtpConfig, RateLimitConfig, SecurityConfig,
        SessionConfig, SmtpConfig, SwaggerConfig, SwaggerMode,
    },
    services::{MemoryStore, RecordingNotifier},
    AppState,
};
use serde_json::Value;
use tower::ServiceExt;

pub const TEST_SESSION_SECRET: &str = "integration-test-secret-at-least-32-bytes";

pub fn test_config() -> AuthConfig {
    AuthConfig {
        common: service_core::config::Config::default(),
        environment: Environment::Dev,
        service_name: "otp-auth-service-test".to_string(),
        service_version: "0.0.0".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        database: DatabaseConfig {
            url: "postgres://localhost/otp_auth_test".to_string(),
            max_connections: 5,
            min_connections: 1,
        },
        session: SessionConfig {
            secret: TEST_SESSION_SECRET.to_string(),
            ttl_days: 30,
            issuer: "otp-auth-service".to_string(),
        },
        otp: OtpConfig {
            length: 6,
            ttl_minutes: 10,
            max_sends_per_window: 0,
            send_window_minutes: 15,
            invalidate_previous: false,
            sweep_interval_seconds: 300,
        },
        smtp: SmtpConfig {
            host: "localhost".to_string(),
            port: 1025,
            user: String::new(),
            password: String::new(),
            from_email: "noreply@example.com".to_string(),
            tls: false,
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        },
        swagger: SwaggerConfig {
            enabled: SwaggerMode::Public,
        },
        rate_limit: RateLimitConfig {
            send_code_attempts: 1000,
            send_code_window_seconds: 60,
            verify_code_attempts: 1000,
            verify_code_window_seconds: 60,
            global_ip_limit: 1000,
            global_ip_window_seconds: 60,
        },
    }
}

/// Router over an in-memory store and a notifier that records codes.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: AuthConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let state = AppState::new(
            config,
            store.clone(),
            store.clone(),
            store.clone(),
            notifier.clone(),
            None,
        );
        let router = build_router(state.clone())
            .await
            .expect("Failed to build router");

        Self {
            router,
            state,
            store,
            notifier,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        bearer: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-forwarded-for", "203.0.113.7");
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn send_code(&self, email: &str) -> (StatusCode, Value) {
        self.request(
            Method::POST,
            "/api/v1/auth/send-code",
            Some(serde_json::json!({ "email": email })),
            None,
        )
        .await
    }

    pub async fn verify_code(&self, email: &str, code: &str) -> (StatusCode, Value) {
        self.request(
            Method::POST,
            "/api/v1/auth/verify-code",
            Some(serde_json::json!({ "email": email, "code": code })),
            None,
        )
        .await
    }

    /// Send a code and return what the notifier delivered.
    pub async fn issue_code(&self, email: &str) -> String {
        let (status, _) = self.send_code(email).await;
        assert_eq!(status, StatusCode::OK);
        self.notifier
            .last_code_for(email)
            .expect("No code was delivered")
    }

    /// Full sign-in; returns the session token and the identity id.
    pub async fn sign_in(&self, email: &str) -> (String, String) {
        let code = self.issue_code(email).await;
        let (status, body) = self.verify_code(email, &code).await;
        assert_eq!(status, StatusCode::OK, "verify failed: {}", body);
        (
            body["session_token"].as_str().unwrap().to_string(),
            body["identity"]["id"].as_str().unwrap().to_string(),
        )
    }
}

/// A six digit code that differs from `code`.
pub fn other_code(code: &str) -> String {
    if code == "000000" {
        "111111".to_string()
    } else {
        "000000".to_string()
    }
}
