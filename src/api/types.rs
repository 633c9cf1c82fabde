//! Request/response types for the auth endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub role: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub device_id: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LogoutRequest {
    pub refresh_token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ReplaceTokensRequest {
    pub refresh_token: String,
    pub device_id: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub new_password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ResendVerificationRequest {
    pub email: String,
}

/// Query string carrying the signed token from a mailed link.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct TokenQuery {
    pub token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct TokenPairResponse {
    pub access_token: String,
    pub refresh_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn login_request_round_trips() -> Result<()> {
        let request: LoginRequest = serde_json::from_value(serde_json::json!({
            "email": "a@x.com",
            "password": "pw",
            "device_id": "dev1",
        }))?;
        assert_eq!(request.email, "a@x.com");
        assert_eq!(request.device_id, "dev1");
        Ok(())
    }

    #[test]
    fn token_pair_response_serializes_both_fields() -> Result<()> {
        let response = TokenPairResponse {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
        };
        let value = serde_json::to_value(&response)?;
        assert_eq!(value["access_token"], "access");
        assert_eq!(value["refresh_token"], "refresh");
        Ok(())
    }
}
