//! Request/response types for the admin auth endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MagicLinkRequest {
    pub email: String,
}

#[derive(Deserialize, Debug)]
pub struct VerifyParams {
    pub token: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyResponse {
    pub session_token: String,
    pub expires_at: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SubmissionResponse {
    pub token: String,
    pub status: String,
    pub step: i32,
    pub email: Option<String>,
    #[schema(value_type = Object)]
    pub data: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::{MagicLinkRequest, VerifyResponse};
    use anyhow::Result;

    #[test]
    fn magic_link_request_round_trips() -> Result<()> {
        let request: MagicLinkRequest =
            serde_json::from_value(serde_json::json!({"email": "staff@org.example"}))?;
        assert_eq!(request.email, "staff@org.example");
        Ok(())
    }

    #[test]
    fn verify_response_serializes_expiry() -> Result<()> {
        let response = VerifyResponse {
            session_token: "jwt".to_string(),
            expires_at: "2026-08-04T00:00:00Z".to_string(),
        };
        let value = serde_json::to_value(&response)?;
        assert_eq!(value["expires_at"], "2026-08-04T00:00:00Z");
        Ok(())
    }
}
