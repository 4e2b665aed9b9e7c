pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware,
    rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware, IpRateLimiter},
    security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AuthConfig;
use crate::services::{AuthService, HealthCheck, IdentityStore, Notifier, OtpStore};

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health,
        handlers::health::health_db,
        handlers::auth::send_code,
        handlers::auth::verify_code,
        handlers::user::get_me,
        handlers::user::delete_me,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::auth::SendCodeRequest,
            dtos::auth::SendCodeResponse,
            dtos::auth::VerifyCodeRequest,
            dtos::auth::VerifyCodeResponse,
            models::PublicIdentity,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Email one-time-code sign-in"),
        (name = "User", description = "Current identity"),
        (name = "Observability", description = "Service health and monitoring"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: AuthConfig,
    pub auth: AuthService,
    pub health: Arc<dyn HealthCheck>,
    pub metrics: Option<PrometheusHandle>,
    pub send_code_rate_limiter: IpRateLimiter,
    pub verify_code_rate_limiter: IpRateLimiter,
    pub ip_rate_limiter: IpRateLimiter,
}

impl AppState {
    /// Wire the services over the given stores and notifier.
    pub fn new(
        config: AuthConfig,
        otps: Arc<dyn OtpStore>,
        identities: Arc<dyn IdentityStore>,
        health: Arc<dyn HealthCheck>,
        notifier: Arc<dyn Notifier>,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        let auth = AuthService::new(otps, identities, notifier, &config.otp, &config.session);
        let limits = &config.rate_limit;

        Self {
            send_code_rate_limiter: create_ip_rate_limiter(
                limits.send_code_attempts,
                limits.send_code_window_seconds,
            ),
            verify_code_rate_limiter: create_ip_rate_limiter(
                limits.verify_code_attempts,
                limits.verify_code_window_seconds,
            ),
            ip_rate_limiter: create_ip_rate_limiter(
                limits.global_ip_limit,
                limits.global_ip_window_seconds,
            ),
            config,
            auth,
            health,
            metrics,
        }
    }
}

pub async fn build_router(state: AppState) -> Result<Router, AppError> {
    let send_code_route = Router::new()
        .route("/api/v1/auth/send-code", post(handlers::auth::send_code))
        .layer(from_fn_with_state(
            state.send_code_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let verify_code_route = Router::new()
        .route("/api/v1/auth/verify-code", post(handlers::auth::verify_code))
        .layer(from_fn_with_state(
            state.verify_code_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let user_routes = Router::new()
        .route(
            "/api/v1/users/me",
            get(handlers::user::get_me).delete(handlers::user::delete_me),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::session_auth_middleware,
        ));

    let mut app = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/health/db", get(handlers::health::health_db))
        .route("/metrics", get(handlers::metrics::metrics));

    if state.config.swagger_enabled() {
        app = app.merge(SwaggerUi::new("/docs").url("/.well-known/openapi.json", ApiDoc::openapi()));
    } else {
        app = app.route(
            "/.well-known/openapi.json",
            get(|| async { axum::Json(ApiDoc::openapi()) }),
        );
    }

    let origins: Vec<HeaderValue> = state
        .config
        .security
        .allowed_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!("Invalid CORS origin '{}': {}. Skipping.", o, e);
                None
            }
        })
        .collect();

    let app = app
        .merge(send_code_route)
        .merge(verify_code_route)
        .merge(user_routes)
        .with_state(state.clone())
        .layer(from_fn_with_state(
            state.ip_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ))
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
        );

    Ok(app)
}
