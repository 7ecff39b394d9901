//! Request/response types for the resume endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SendLinkRequest {
    pub email: String,
    pub token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SendLinkResponse {
    pub ok: bool,
}

#[derive(Deserialize, Debug)]
pub struct ExchangeParams {
    pub rt: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct DraftParams {
    pub token: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SaveDraftRequest {
    #[serde(default)]
    pub token: Option<String>,
    #[schema(value_type = Object)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub step: i32,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SaveDraftResponse {
    pub token: String,
    pub step: i32,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct PresignUploadRequest {
    #[serde(default)]
    pub token: Option<String>,
    pub content_type: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct PresignUploadResponse {
    pub url: String,
    pub key: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct WhoamiResponse {
    pub token: Option<String>,
}

/// Serialized draft payload stored at `drafts/{token}.json`.
#[derive(Serialize, Deserialize, Debug)]
pub(crate) struct DraftPayload {
    pub data: serde_json::Value,
    #[serde(default)]
    pub step: Option<i32>,
}
