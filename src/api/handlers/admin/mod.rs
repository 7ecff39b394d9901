//! Staff magic-link login and session-protected review endpoints.
//!
//! Flow Overview:
//! 1) `request-magic-link` mails a short-lived signed login token to an
//!    allow-listed address, rate limited per email.
//! 2) `verify-magic-link` exchanges that token for a session token.
//! 3) `require_admin` gates review endpoints on the session token and
//!    re-checks the allow-list on every request.
//!
//! Security boundaries:
//! - Verification failures are reported uniformly to avoid oracle attacks.
//! - The allow-list is consulted at issuance and again on every
//!   authenticated request, so removals take effect immediately.
//! - Sensitive reads are audited best-effort, never blocking the response.

pub mod audit;
pub mod rate_limit;
pub mod state;
pub mod token;
pub mod types;

use axum::{
    extract::{Extension, Path, Query},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::{error, info};

use crate::api::email::OutboundEmail;
use crate::api::error::ApiError;
use crate::api::handlers::{extract_client_ip, normalize_email};

use super::resume::state::ResumeState;
use super::resume::types::DraftPayload;
pub use audit::{AuditEvent, AuditRecorder, ACTOR_UNKNOWN};
pub use state::{AdminAuthConfig, AdminAuthState};
use rate_limit::ResendDecision;
use token::{SessionIdentity, TokenError, ROLE_ADMIN};
use types::{MagicLinkRequest, SubmissionResponse, VerifyParams, VerifyResponse};

const LOGIN_EMAIL_SUBJECT: &str = "Your review sign-in link";
const SUBMISSION_READ_ACTION: &str = "submission.read";

/// Email a short-lived magic login link to an allow-listed address.
#[utoipa::path(
    post,
    path = "/v1/admin/auth/request",
    request_body = MagicLinkRequest,
    responses(
        (status = 204, description = "Login link queued"),
        (status = 400, description = "Missing email"),
        (status = 403, description = "Address is not on the admin allow-list"),
        (status = 429, description = "Resend interval not elapsed"),
    ),
    tag = "admin"
)]
pub async fn request_magic_link(
    state: Extension<Arc<AdminAuthState>>,
    payload: Option<Json<MagicLinkRequest>>,
) -> Result<Response, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::InvalidInput("Missing payload".to_string()));
    };
    let email = normalize_email(&request.email);
    if email.is_empty() {
        return Err(ApiError::InvalidInput("Missing email".to_string()));
    }

    // The allow-list gate runs before any delivery work. The distinct 403 is
    // a known enumeration trade-off carried over from the original policy.
    if !state.config().is_allowed(&email) {
        return Err(ApiError::Forbidden);
    }

    if let ResendDecision::Limited {
        retry_after_seconds,
    } = state.limiter().check_and_update(&email)
    {
        return Err(ApiError::RateLimited {
            retry_after_seconds,
        });
    }

    let issued = state.signer().issue_magic(&email).map_err(|err| {
        error!("Failed to sign magic token: {err}");
        ApiError::Upstream("Token signing failed")
    })?;
    let login_url = format!(
        "{}/admin/login?token={}",
        state.config().ui_base_url().trim_end_matches('/'),
        issued.token
    );

    if state.mailer().is_enabled() {
        let outcome = state
            .mailer()
            .dispatch(OutboundEmail {
                to: email.clone(),
                subject: LOGIN_EMAIL_SUBJECT.to_string(),
                html_body: format!(
                    "<p>Sign in to the review panel:</p>\
                     <p><a href=\"{login_url}\">Sign in</a></p>\
                     <p>The link expires in {} minutes.</p>",
                    state.config().magic_ttl_seconds() / 60
                ),
                text_body: format!("Sign in to the review panel: {login_url}\n"),
                reply_to: None,
            })
            .await;
        if !outcome.is_sent() {
            info!("magic link ready for manual delivery: {login_url}");
        }
    } else {
        info!("magic link ready for manual delivery: {login_url}");
    }

    Ok(StatusCode::NO_CONTENT.into_response())
}

/// Exchange a magic token for an admin session token.
#[utoipa::path(
    get,
    path = "/v1/admin/auth/verify",
    params(("token" = String, Query, description = "Magic token from the login email")),
    responses(
        (status = 200, description = "Session token issued", body = VerifyResponse),
        (status = 400, description = "Missing token or wrong token class"),
        (status = 401, description = "Invalid or expired magic token"),
        (status = 403, description = "Address no longer on the allow-list"),
    ),
    tag = "admin"
)]
pub async fn verify_magic_link(
    state: Extension<Arc<AdminAuthState>>,
    params: Query<VerifyParams>,
) -> Result<Response, ApiError> {
    let token = params
        .token
        .as_deref()
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::InvalidInput("Missing token".to_string()))?;

    let email = match state.signer().verify_magic(token) {
        Ok(email) => email,
        // A session token replayed here is a caller bug, not a credential
        // failure; everything else collapses to 401.
        Err(TokenError::WrongType) => {
            return Err(ApiError::InvalidInput("Wrong token type".to_string()))
        }
        Err(TokenError::Invalid) => return Err(ApiError::Unauthorized),
    };

    // Allow-list membership may have changed since the link was issued.
    if !state.config().is_allowed(&email) {
        return Err(ApiError::Forbidden);
    }

    let issued = state.signer().issue_session(&email).map_err(|err| {
        error!("Failed to sign session token: {err}");
        ApiError::Upstream("Token signing failed")
    })?;

    Ok((
        StatusCode::OK,
        Json(VerifyResponse {
            session_token: issued.token,
            expires_at: issued.expires_at.to_rfc3339(),
        }),
    )
        .into_response())
}

/// Resolve the bearer session token into an admin identity.
///
/// All verification failures collapse to 401; a valid credential whose
/// address has left the allow-list is 403.
pub(crate) fn require_admin(
    headers: &HeaderMap,
    state: &AdminAuthState,
) -> Result<SessionIdentity, ApiError> {
    let token = extract_bearer_token(headers).ok_or(ApiError::Unauthorized)?;
    let identity = state
        .signer()
        .verify_session(&token)
        .map_err(|_| ApiError::Unauthorized)?;
    if identity.role != ROLE_ADMIN {
        return Err(ApiError::Unauthorized);
    }
    if !state.config().is_allowed(&identity.email) {
        return Err(ApiError::Forbidden);
    }
    Ok(identity)
}

/// Read a submitted or in-progress application for review.
#[utoipa::path(
    get,
    path = "/v1/admin/submissions/{token}",
    params(("token" = String, Path, description = "Draft token of the application")),
    responses(
        (status = 200, description = "Application payload", body = SubmissionResponse),
        (status = 401, description = "Missing or invalid session token"),
        (status = 403, description = "Admin no longer allow-listed"),
        (status = 404, description = "Unknown application"),
    ),
    tag = "admin"
)]
pub async fn get_submission(
    headers: HeaderMap,
    admin_state: Extension<Arc<AdminAuthState>>,
    resume_state: Extension<Arc<ResumeState>>,
    Path(token): Path<String>,
) -> Result<Response, ApiError> {
    let source_ip = extract_client_ip(&headers);
    let identity = match require_admin(&headers, &admin_state) {
        Ok(identity) => identity,
        Err(err) => {
            admin_state.audit().record(AuditEvent {
                actor: ACTOR_UNKNOWN.to_string(),
                source_ip,
                action: SUBMISSION_READ_ACTION,
                resource: token,
                outcome: "denied",
            });
            return Err(err);
        }
    };

    let audit = |outcome: &'static str| AuditEvent {
        actor: identity.email.clone(),
        source_ip: source_ip.clone(),
        action: SUBMISSION_READ_ACTION,
        resource: token.clone(),
        outcome,
    };

    let draft = match resume_state.store().find_draft(&token).await {
        Ok(Some(draft)) => draft,
        Ok(None) => {
            admin_state.audit().record(audit("not_found"));
            return Err(ApiError::NotFound("Unknown application"));
        }
        Err(err) => {
            error!("Failed to lookup draft: {err}");
            admin_state.audit().record(audit("error"));
            return Err(ApiError::Upstream("Draft store unavailable"));
        }
    };

    let data = match draft.data_key.as_deref() {
        Some(data_key) => match resume_state.objects().get(data_key).await {
            Ok(Some(bytes)) => match serde_json::from_slice::<DraftPayload>(&bytes) {
                Ok(payload) => payload.data,
                Err(err) => {
                    error!("Malformed draft payload for {data_key}: {err}");
                    admin_state.audit().record(audit("error"));
                    return Err(ApiError::Upstream("Draft payload malformed"));
                }
            },
            Ok(None) => serde_json::Value::Null,
            Err(err) => {
                error!("Failed to fetch draft payload: {err}");
                admin_state.audit().record(audit("error"));
                return Err(ApiError::Upstream("Draft storage unreachable"));
            }
        },
        None => serde_json::Value::Null,
    };

    admin_state.audit().record(audit("ok"));
    Ok((
        StatusCode::OK,
        Json(SubmissionResponse {
            token: draft.token,
            status: draft.status.as_str().to_string(),
            step: draft.step,
            email: draft.email,
            data,
        }),
    )
        .into_response())
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
