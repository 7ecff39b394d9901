//! Applicant resume flow endpoints.
//!
//! Flow Overview:
//! 1) `save-draft` persists the wizard payload and hands out a draft token.
//! 2) `send-link` mails a single-use resume token for that draft.
//! 3) `exchange` consumes the resume token and sets the `resume` cookie.
//! 4) `get-draft` rehydrates the wizard from the cookie (or explicit token).
//!
//! Security boundaries:
//! - Resume tokens are single-use; consumption is atomic in the store.
//! - Raw resume tokens are never persisted, only their hashes.
//! - Mail delivery failures never fail the owning request.

pub mod state;
pub mod store;
pub mod types;
mod utils;

use axum::{
    extract::{Extension, Query},
    http::{
        header::{LOCATION, SET_COOKIE},
        HeaderMap, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::{error, info};
use ulid::Ulid;

use crate::api::email::OutboundEmail;
use crate::api::error::ApiError;
use crate::api::handlers::{normalize_email, valid_email};

pub use state::{ResumeConfig, ResumeState};
use store::ConsumeOutcome;
use types::{
    DraftParams, DraftPayload, ExchangeParams, PresignUploadRequest, PresignUploadResponse,
    SaveDraftRequest, SaveDraftResponse, SendLinkRequest, SendLinkResponse, WhoamiResponse,
};

const TOKEN_BYTES: usize = 32;
const RESUME_EMAIL_SUBJECT: &str = "Resume your grant application";

/// Email a single-use resume link for an existing draft.
#[utoipa::path(
    post,
    path = "/v1/resume/send-link",
    request_body = SendLinkRequest,
    responses(
        (status = 200, description = "Resume link queued", body = SendLinkResponse),
        (status = 400, description = "Invalid email or missing draft token"),
        (status = 404, description = "Unknown draft token"),
    ),
    tag = "resume"
)]
pub async fn send_link(
    state: Extension<Arc<ResumeState>>,
    payload: Option<Json<SendLinkRequest>>,
) -> Result<Response, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::InvalidInput("Missing payload".to_string()));
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return Err(ApiError::InvalidInput("Invalid email".to_string()));
    }
    let draft_token = request.token.trim();
    if draft_token.is_empty() {
        return Err(ApiError::InvalidInput("Missing draft token".to_string()));
    }

    let draft = state
        .store()
        .find_draft(draft_token)
        .await
        .map_err(|err| {
            error!("Failed to lookup draft: {err}");
            ApiError::Upstream("Draft store unavailable")
        })?
        .ok_or(ApiError::NotFound("Unknown draft token"))?;

    let resume_token = utils::generate_token(TOKEN_BYTES).map_err(|err| {
        error!("Failed to generate resume token: {err}");
        ApiError::Upstream("Token generation failed")
    })?;
    state
        .store()
        .insert_resume_token(
            &resume_token,
            &draft.token,
            &email,
            state.config().resume_token_ttl_seconds(),
        )
        .await
        .map_err(|err| {
            error!("Failed to store resume token: {err}");
            ApiError::Upstream("Draft store unavailable")
        })?;

    let exchange_url = utils::build_exchange_url(
        state.config().backend_base_url(),
        state.config().public_base_url(),
        &resume_token,
    );

    // Delivery is best-effort: a down mail backend must not fail the request,
    // and the acknowledgement never reveals whether the address was known.
    if state.mailer().is_enabled() {
        let outcome = state
            .mailer()
            .dispatch(OutboundEmail {
                to: email.clone(),
                subject: RESUME_EMAIL_SUBJECT.to_string(),
                html_body: format!(
                    "<p>Pick up your application where you left off:</p>\
                     <p><a href=\"{exchange_url}\">Resume application</a></p>\
                     <p>This link can be used once and expires in 24 hours.</p>"
                ),
                text_body: format!(
                    "Pick up your application where you left off: {exchange_url}\n\
                     This link can be used once and expires in 24 hours.\n"
                ),
                reply_to: None,
            })
            .await;
        if !outcome.is_sent() {
            info!("resume link ready for manual delivery: {exchange_url}");
        }
    } else {
        info!("resume link ready for manual delivery: {exchange_url}");
    }

    if let Err(err) = state.store().set_draft_email(&draft.token, &email).await {
        error!("Failed to update draft contact: {err}");
    }

    Ok((StatusCode::OK, Json(SendLinkResponse { ok: true })).into_response())
}

/// Consume a resume token and start a cookie session for its draft.
#[utoipa::path(
    get,
    path = "/v1/resume/exchange",
    params(("rt" = String, Query, description = "Resume token from the email link")),
    responses(
        (status = 302, description = "Cookie set, redirect to the application"),
        (status = 400, description = "Missing resume token"),
        (status = 404, description = "Unknown resume token"),
        (status = 410, description = "Resume token expired or already used"),
    ),
    tag = "resume"
)]
pub async fn exchange(
    state: Extension<Arc<ResumeState>>,
    params: Query<ExchangeParams>,
) -> Result<Response, ApiError> {
    let token = params
        .rt
        .as_deref()
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::InvalidInput("Missing resume token".to_string()))?;

    let outcome = state
        .store()
        .consume_resume_token(token)
        .await
        .map_err(|err| {
            error!("Failed to consume resume token: {err}");
            ApiError::Upstream("Draft store unavailable")
        })?;

    let draft_token = match outcome {
        ConsumeOutcome::Consumed { draft_token, .. } => draft_token,
        ConsumeOutcome::AlreadyUsed => return Err(ApiError::Gone("Resume token already used")),
        ConsumeOutcome::Expired => return Err(ApiError::Gone("Resume token expired")),
        ConsumeOutcome::NotFound => return Err(ApiError::NotFound("Unknown resume token")),
    };

    let cookie = utils::resume_cookie(
        &draft_token,
        state.config().cookie_ttl_seconds(),
        state.config().cookie_secure(),
    )
    .map_err(|err| {
        error!("Failed to build resume cookie: {err}");
        ApiError::Upstream("Session cookie failed")
    })?;

    let landing = state.config().public_base_url().map_or_else(
        || "/?resumed=1".to_string(),
        |base| format!("{}/?resumed=1", base.trim_end_matches('/')),
    );

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, cookie);
    headers.insert(
        LOCATION,
        landing.parse().map_err(|_| {
            error!("Invalid landing location: {landing}");
            ApiError::Upstream("Redirect failed")
        })?,
    );
    Ok((StatusCode::FOUND, headers).into_response())
}

/// Rehydrate the saved draft payload for the current session.
#[utoipa::path(
    get,
    path = "/v1/resume/draft",
    params(("token" = Option<String>, Query, description = "Draft token (cookie wins when both are present)")),
    responses(
        (status = 200, description = "Draft payload with current step"),
        (status = 400, description = "No draft token resolvable"),
        (status = 404, description = "Unknown draft or no saved data"),
        (status = 500, description = "Draft storage unreachable or payload malformed"),
    ),
    tag = "resume"
)]
pub async fn get_draft(
    headers: HeaderMap,
    state: Extension<Arc<ResumeState>>,
    params: Query<DraftParams>,
) -> Result<Response, ApiError> {
    // The authenticated cookie takes precedence over an explicit parameter so
    // a crafted link cannot silently switch an applicant's session.
    let token = utils::extract_cookie_token(&headers)
        .or_else(|| {
            params
                .token
                .as_deref()
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(str::to_string)
        })
        .ok_or_else(|| ApiError::InvalidInput("Missing draft token".to_string()))?;

    let draft = state
        .store()
        .find_draft(&token)
        .await
        .map_err(|err| {
            error!("Failed to lookup draft: {err}");
            ApiError::Upstream("Draft store unavailable")
        })?
        .ok_or(ApiError::NotFound("Unknown draft token"))?;

    let Some(data_key) = draft.data_key.as_deref() else {
        return Err(ApiError::NotFound("Draft has no saved data"));
    };

    let bytes = state
        .objects()
        .get(data_key)
        .await
        .map_err(|err| {
            error!("Failed to fetch draft payload: {err}");
            ApiError::Upstream("Draft storage unreachable")
        })?
        .ok_or(ApiError::Upstream("Draft payload unavailable"))?;

    let payload: DraftPayload = serde_json::from_slice(&bytes)
        .map_err(|err| {
            error!("Malformed draft payload for {data_key}: {err}");
            ApiError::Upstream("Draft payload malformed")
        })?;

    let step = payload.step.unwrap_or(draft.step);
    let body = match payload.data {
        serde_json::Value::Object(mut map) => {
            map.insert("step".to_string(), serde_json::json!(step));
            serde_json::Value::Object(map)
        }
        other => serde_json::json!({ "data": other, "step": step }),
    };

    Ok((StatusCode::OK, Json(body)).into_response())
}

/// Persist the wizard payload, minting a draft token on first save.
#[utoipa::path(
    post,
    path = "/v1/resume/draft",
    request_body = SaveDraftRequest,
    responses(
        (status = 200, description = "Draft saved", body = SaveDraftResponse),
        (status = 400, description = "Missing payload"),
        (status = 404, description = "Unknown draft token"),
        (status = 500, description = "Draft storage unreachable"),
    ),
    tag = "resume"
)]
pub async fn save_draft(
    state: Extension<Arc<ResumeState>>,
    payload: Option<Json<SaveDraftRequest>>,
) -> Result<Response, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::InvalidInput("Missing payload".to_string()));
    };
    if request.step < 0 {
        return Err(ApiError::InvalidInput("Invalid step".to_string()));
    }

    let token = match request.token.as_deref().map(str::trim) {
        Some(token) if !token.is_empty() => {
            // Re-saving requires a known draft; tokens are minted server-side.
            state
                .store()
                .find_draft(token)
                .await
                .map_err(|err| {
                    error!("Failed to lookup draft: {err}");
                    ApiError::Upstream("Draft store unavailable")
                })?
                .ok_or(ApiError::NotFound("Unknown draft token"))?;
            token.to_string()
        }
        _ => utils::generate_token(TOKEN_BYTES).map_err(|err| {
            error!("Failed to generate draft token: {err}");
            ApiError::Upstream("Token generation failed")
        })?,
    };

    let data_key = format!("drafts/{token}.json");
    let body = serde_json::to_vec(&DraftPayload {
        data: request.data,
        step: Some(request.step),
    })
    .map_err(|err| {
        error!("Failed to serialize draft payload: {err}");
        ApiError::Upstream("Draft serialization failed")
    })?;

    state
        .objects()
        .put(&data_key, body, "application/json")
        .await
        .map_err(|err| {
            error!("Failed to store draft payload: {err}");
            ApiError::Upstream("Draft storage unreachable")
        })?;

    state
        .store()
        .upsert_draft(&token, &data_key, request.step)
        .await
        .map_err(|err| {
            error!("Failed to upsert draft: {err}");
            ApiError::Upstream("Draft store unavailable")
        })?;

    Ok((
        StatusCode::OK,
        Json(SaveDraftResponse {
            token,
            step: request.step,
        }),
    )
        .into_response())
}

/// Issue a presigned PUT URL for a browser-direct file upload.
#[utoipa::path(
    post,
    path = "/v1/resume/uploads",
    request_body = PresignUploadRequest,
    responses(
        (status = 200, description = "Presigned upload URL", body = PresignUploadResponse),
        (status = 400, description = "Missing content type or draft token"),
        (status = 404, description = "Unknown draft token"),
    ),
    tag = "resume"
)]
pub async fn presign_upload(
    headers: HeaderMap,
    state: Extension<Arc<ResumeState>>,
    payload: Option<Json<PresignUploadRequest>>,
) -> Result<Response, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::InvalidInput("Missing payload".to_string()));
    };
    let content_type = request.content_type.trim();
    if content_type.is_empty() {
        return Err(ApiError::InvalidInput("Missing content type".to_string()));
    }

    let token = utils::extract_cookie_token(&headers)
        .or_else(|| {
            request
                .token
                .as_deref()
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(str::to_string)
        })
        .ok_or_else(|| ApiError::InvalidInput("Missing draft token".to_string()))?;

    state
        .store()
        .find_draft(&token)
        .await
        .map_err(|err| {
            error!("Failed to lookup draft: {err}");
            ApiError::Upstream("Draft store unavailable")
        })?
        .ok_or(ApiError::NotFound("Unknown draft token"))?;

    let key = format!("submissions/{token}/{}", Ulid::new());
    let url = state
        .objects()
        .presign_put(&key, content_type, state.config().upload_url_ttl_seconds())
        .map_err(|err| {
            error!("Failed to presign upload: {err}");
            ApiError::Upstream("Upload storage unavailable")
        })?;

    Ok((StatusCode::OK, Json(PresignUploadResponse { url, key })).into_response())
}

/// Report the draft token bound to the current session cookie, if any.
#[utoipa::path(
    get,
    path = "/v1/resume/whoami",
    responses((status = 200, description = "Current session", body = WhoamiResponse)),
    tag = "resume"
)]
pub async fn whoami(headers: HeaderMap) -> Response {
    let token = utils::extract_cookie_token(&headers);
    (StatusCode::OK, Json(WhoamiResponse { token })).into_response()
}

/// Clear the resume session cookie. Idempotent.
#[utoipa::path(
    post,
    path = "/v1/resume/logout",
    responses((status = 204, description = "Session cleared")),
    tag = "resume"
)]
pub async fn logout(state: Extension<Arc<ResumeState>>) -> Response {
    let mut headers = HeaderMap::new();
    if let Ok(cookie) = utils::clear_resume_cookie(state.config().cookie_secure()) {
        headers.insert(SET_COOKIE, cookie);
    }
    (StatusCode::NO_CONTENT, headers).into_response()
}

#[cfg(test)]
mod tests;
