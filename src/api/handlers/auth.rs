//! axum handlers for the auth endpoints.
//!
//! The boundary validates request shape, delegates to the orchestrator, and
//! maps error kinds to status codes: malformed requests and domain failures
//! are 400-class with a message, store/mail failures are 500-class.

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use std::sync::Arc;
use tracing::error;

use super::{normalize_email, valid_email};
use crate::api::types::{
    LoginRequest, LogoutRequest, ReplaceTokensRequest, ResendVerificationRequest,
    ResetPasswordRequest, SignupRequest, TokenPairResponse, TokenQuery,
};
use crate::auth::{AuthError, AuthService};
use crate::session::{SessionError, TokenPair};

fn error_response(err: &AuthError) -> (StatusCode, String) {
    match err {
        AuthError::InvalidCredentials
        | AuthError::Token(_)
        | AuthError::Session(
            SessionError::NotFound
            | SessionError::DeviceMismatch
            | SessionError::UserNotFound
            | SessionError::Token(_),
        ) => (StatusCode::BAD_REQUEST, err.to_string()),
        _ => {
            error!("auth operation failed: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal error".to_string(),
            )
        }
    }
}

fn token_pair_response(pair: TokenPair) -> Json<TokenPairResponse> {
    Json(TokenPairResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
    })
}

#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created, verification mail sent"),
        (status = 400, description = "Malformed request", body = String),
        (status = 500, description = "Could not create the user", body = String)
    ),
    tag = "auth"
)]
pub async fn signup(
    service: Extension<Arc<AuthService>>,
    payload: Option<Json<SignupRequest>>,
) -> impl IntoResponse {
    let request: SignupRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response();
    }
    if request.password.is_empty() || request.role.is_empty() {
        return (StatusCode::BAD_REQUEST, "Missing fields".to_string()).into_response();
    }

    match service.signup(&email, &request.password, &request.role).await {
        Ok(()) => StatusCode::CREATED.into_response(),
        Err(err) => error_response(&err).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session opened", body = TokenPairResponse),
        (status = 400, description = "Invalid credentials", body = String)
    ),
    tag = "auth"
)]
pub async fn login(
    service: Extension<Arc<AuthService>>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let request: LoginRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let email = normalize_email(&request.email);
    if request.device_id.is_empty() {
        return (StatusCode::BAD_REQUEST, "Missing device id".to_string()).into_response();
    }

    match service
        .login(&email, &request.password, &request.device_id)
        .await
    {
        Ok(pair) => (StatusCode::OK, token_pair_response(pair)).into_response(),
        Err(err) => error_response(&err).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    request_body = LogoutRequest,
    responses(
        (status = 204, description = "Session closed"),
        (status = 400, description = "Unknown refresh token", body = String)
    ),
    tag = "auth"
)]
pub async fn logout(
    service: Extension<Arc<AuthService>>,
    payload: Option<Json<LogoutRequest>>,
) -> impl IntoResponse {
    let request: LogoutRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    match service.logout(&request.refresh_token).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(&err).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/auth/replace-tokens",
    request_body = ReplaceTokensRequest,
    responses(
        (status = 200, description = "Tokens rotated", body = TokenPairResponse),
        (status = 400, description = "Unknown token or device mismatch", body = String)
    ),
    tag = "auth"
)]
pub async fn replace_tokens(
    service: Extension<Arc<AuthService>>,
    payload: Option<Json<ReplaceTokensRequest>>,
) -> impl IntoResponse {
    let request: ReplaceTokensRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    match service
        .replace_tokens(&request.refresh_token, &request.device_id)
        .await
    {
        Ok(pair) => (StatusCode::OK, token_pair_response(pair)).into_response(),
        Err(err) => error_response(&err).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/auth/verify-email",
    params(
        ("token" = String, Query, description = "Signed email-verification token")
    ),
    responses(
        (status = 204, description = "Email verified"),
        (status = 400, description = "Invalid or expired token", body = String)
    ),
    tag = "auth"
)]
pub async fn verify_email(
    service: Extension<Arc<AuthService>>,
    query: Option<Query<TokenQuery>>,
) -> impl IntoResponse {
    let Some(Query(query)) = query else {
        return (StatusCode::BAD_REQUEST, "Missing token".to_string()).into_response();
    };

    match service.verify_email(&query.token).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(&err).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 204, description = "Reset mail sent"),
        (status = 400, description = "Malformed request", body = String),
        (status = 500, description = "Could not send the mail", body = String)
    ),
    tag = "auth"
)]
pub async fn reset_password(
    service: Extension<Arc<AuthService>>,
    payload: Option<Json<ResetPasswordRequest>>,
) -> impl IntoResponse {
    let request: ResetPasswordRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response();
    }
    if request.new_password.is_empty() {
        return (StatusCode::BAD_REQUEST, "Missing new password".to_string()).into_response();
    }

    match service
        .request_password_reset(&email, &request.new_password)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(&err).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/auth/confirm-password",
    params(
        ("token" = String, Query, description = "Signed password-reset token")
    ),
    responses(
        (status = 204, description = "Password updated"),
        (status = 400, description = "Invalid or expired token", body = String)
    ),
    tag = "auth"
)]
pub async fn confirm_password(
    service: Extension<Arc<AuthService>>,
    query: Option<Query<TokenQuery>>,
) -> impl IntoResponse {
    let Some(Query(query)) = query else {
        return (StatusCode::BAD_REQUEST, "Missing token".to_string()).into_response();
    };

    match service.confirm_password_reset(&query.token).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(&err).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/auth/resend-verification",
    request_body = ResendVerificationRequest,
    responses(
        (status = 204, description = "Verification mail re-sent"),
        (status = 400, description = "Malformed request", body = String),
        (status = 500, description = "Could not send the mail", body = String)
    ),
    tag = "auth"
)]
pub async fn resend_verification(
    service: Extension<Arc<AuthService>>,
    payload: Option<Json<ResendVerificationRequest>>,
) -> impl IntoResponse {
    let request: ResendVerificationRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response();
    }

    match service.resend_verification(&email).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(&err).into_response(),
    }
}
