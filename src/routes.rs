use axum::{
    Router,
    routing::{get, post},
};
use http::{HeaderValue, Method, header};
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::handlers;
use crate::state::AppState;

/// Router の構築
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/api/health", get(handlers::health_check))
        .route("/api/v1/auth/signup", post(handlers::register))
        .route("/api/v1/auth/login", post(handlers::login))
        .route(
            "/api/v1/auth/reset-password-token",
            post(handlers::request_password_reset),
        )
        .route("/api/v1/auth/reset-password", post(handlers::reset_password))
        .layer(cors)
        .with_state(state)
}

/// CORS 設定（オリジン未設定時は全許可、Cookie なし）
fn cors_layer(config: &Config) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    match &config.cors_allowed_origin {
        Some(origin) => match HeaderValue::from_str(origin) {
            Ok(origin) => base.allow_origin(origin).allow_credentials(true),
            Err(e) => {
                tracing::warn!(error = ?e, origin = %origin, "CORS_ALLOWED_ORIGIN が不正（全許可で継続）");
                base.allow_origin(Any)
            }
        },
        None => base.allow_origin(Any),
    }
}
