//! HTTP surface: router, layers, and the server loop.

use anyhow::Result;
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use utoipa::OpenApi;

use crate::auth::AuthService;
use handlers::{
    auth::{
        __path_confirm_password, __path_login, __path_logout, __path_replace_tokens,
        __path_resend_verification, __path_reset_password, __path_signup, __path_verify_email,
        confirm_password, login, logout, replace_tokens, resend_verification, reset_password,
        signup, verify_email,
    },
    health::{__path_health, health},
};

pub mod handlers;
pub mod types;

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        signup,
        login,
        logout,
        replace_tokens,
        verify_email,
        reset_password,
        confirm_password,
        resend_verification
    ),
    components(schemas(
        types::SignupRequest,
        types::LoginRequest,
        types::LogoutRequest,
        types::ReplaceTokensRequest,
        types::ResetPasswordRequest,
        types::ResendVerificationRequest,
        types::TokenQuery,
        types::TokenPairResponse
    )),
    tags(
        (name = "health", description = "Service liveness"),
        (name = "auth", description = "Credentials, sessions and mailed tokens")
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

/// Build the application router with all routes and layers.
#[must_use]
pub fn router(service: Arc<AuthService>) -> Router {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/replace-tokens", post(replace_tokens))
        .route("/auth/verify-email", post(verify_email))
        .route("/auth/reset-password", post(reset_password))
        .route("/auth/confirm-password", post(confirm_password))
        .route("/auth/resend-verification", post(resend_verification))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(service)),
        )
        .route("/health", get(health))
        .route(
            "/api-docs/openapi.json",
            get(|| async { axum::Json(openapi()) }),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, service: Arc<AuthService>) -> Result<()> {
    let app = router(service);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_all_routes() {
        let spec = openapi();
        for path in [
            "/health",
            "/auth/signup",
            "/auth/login",
            "/auth/logout",
            "/auth/replace-tokens",
            "/auth/verify-email",
            "/auth/reset-password",
            "/auth/confirm-password",
            "/auth/resend-verification",
        ] {
            assert!(spec.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn openapi_carries_cargo_metadata() {
        let spec = openapi();
        assert_eq!(spec.info.title, env!("CARGO_PKG_NAME"));
        assert_eq!(spec.info.version, env!("CARGO_PKG_VERSION"));
    }
}
