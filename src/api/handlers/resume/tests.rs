use super::state::{ResumeConfig, ResumeState};
use super::store::{MemoryResumeStore, ResumeStore};
use super::types::{PresignUploadRequest, SaveDraftRequest, SendLinkRequest};
use super::{exchange, get_draft, logout, presign_upload, save_draft, send_link, whoami};
use crate::api::email::test_support::RecordingSender;
use crate::api::email::MailDispatcher;
use crate::api::error::ApiError;
use crate::api::objects::{MemoryObjectStore, ObjectStore};
use anyhow::{Context, Result};
use axum::extract::{Extension, Query};
use axum::http::header::{COOKIE, LOCATION, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use axum::Json;
use std::sync::Arc;

struct Harness {
    state: Arc<ResumeState>,
    store: Arc<MemoryResumeStore>,
    objects: Arc<MemoryObjectStore>,
    sender: Arc<RecordingSender>,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryResumeStore::new());
    let objects = Arc::new(MemoryObjectStore::new());
    let sender = Arc::new(RecordingSender::default());
    let config = ResumeConfig::new(
        Some("https://apply.bursary.dev".to_string()),
        Some("https://api.bursary.dev".to_string()),
    );
    let state = Arc::new(ResumeState::new(
        config,
        store.clone(),
        objects.clone(),
        MailDispatcher::new(sender.clone()),
    ));
    Harness {
        state,
        store,
        objects,
        sender,
    }
}

async fn body_json(response: Response) -> Result<serde_json::Value> {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .context("failed to read body")?;
    serde_json::from_slice(&bytes).context("body is not JSON")
}

fn cookie_headers(token: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(COOKIE, HeaderValue::from_str(&format!("resume={token}"))?);
    Ok(headers)
}

fn sent_count(sender: &RecordingSender) -> usize {
    sender
        .sent
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .len()
}

fn first_sent_text(sender: &RecordingSender) -> String {
    sender
        .sent
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .first()
        .map(|message| message.text_body.clone())
        .unwrap_or_default()
}

#[tokio::test]
async fn send_link_missing_payload_is_invalid() {
    let h = harness();
    let result = send_link(Extension(h.state), None).await;
    assert!(matches!(result, Err(ApiError::InvalidInput(_))));
}

#[tokio::test]
async fn send_link_invalid_email_skips_the_store() {
    let h = harness();
    // The draft does not exist: an InvalidInput (not NotFound) response
    // proves validation rejected the request before any store lookup.
    let result = send_link(
        Extension(h.state),
        Some(Json(SendLinkRequest {
            email: "not-an-email".to_string(),
            token: "abc123".to_string(),
        })),
    )
    .await;
    assert!(matches!(result, Err(ApiError::InvalidInput(_))));
    assert_eq!(sent_count(&h.sender), 0);
}

#[tokio::test]
async fn send_link_unknown_draft_is_not_found() {
    let h = harness();
    let result = send_link(
        Extension(h.state),
        Some(Json(SendLinkRequest {
            email: "sam@example.com".to_string(),
            token: "missing".to_string(),
        })),
    )
    .await;
    assert!(matches!(result, Err(ApiError::NotFound(_))));
    assert_eq!(sent_count(&h.sender), 0);
}

#[tokio::test]
async fn send_link_then_exchange_sets_cookie_once() -> Result<()> {
    let h = harness();
    h.store.upsert_draft("abc123", "drafts/abc123.json", 1).await?;

    let response = send_link(
        Extension(h.state.clone()),
        Some(Json(SendLinkRequest {
            email: " Sam@Example.COM ".to_string(),
            token: "abc123".to_string(),
        })),
    )
    .await
    .map_err(|err| anyhow::anyhow!("send-link failed: {err}"))?;
    assert_eq!(response.status(), StatusCode::OK);

    // The email carries the exchange URL; the draft now knows the address.
    assert_eq!(sent_count(&h.sender), 1);
    let text = first_sent_text(&h.sender);
    let resume_token = text
        .split("rt=")
        .nth(1)
        .and_then(|rest| rest.split_whitespace().next())
        .context("no resume token in email")?
        .to_string();
    assert!(text.contains("https://api.bursary.dev/v1/resume/exchange?rt="));

    let draft = h.store.find_draft("abc123").await?.context("draft")?;
    assert_eq!(draft.email.as_deref(), Some("sam@example.com"));

    let response = exchange(
        Extension(h.state.clone()),
        Query(super::types::ExchangeParams {
            rt: Some(resume_token.clone()),
        }),
    )
    .await
    .map_err(|err| anyhow::anyhow!("exchange failed: {err}"))?;
    assert_eq!(response.status(), StatusCode::FOUND);
    let cookie = response
        .headers()
        .get(SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .context("no cookie")?;
    assert!(cookie.starts_with("resume=abc123;"));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));
    assert!(cookie.contains("Secure"));
    let location = response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .context("no location")?;
    assert_eq!(location, "https://apply.bursary.dev/?resumed=1");

    // Replaying the same resume token is Gone, not a second session.
    let replay = exchange(
        Extension(h.state),
        Query(super::types::ExchangeParams {
            rt: Some(resume_token),
        }),
    )
    .await;
    assert!(matches!(replay, Err(ApiError::Gone(_))));
    Ok(())
}

#[tokio::test]
async fn exchange_missing_token_is_invalid() {
    let h = harness();
    let result = exchange(
        Extension(h.state),
        Query(super::types::ExchangeParams { rt: None }),
    )
    .await;
    assert!(matches!(result, Err(ApiError::InvalidInput(_))));
}

#[tokio::test]
async fn exchange_unknown_token_is_not_found() {
    let h = harness();
    let result = exchange(
        Extension(h.state),
        Query(super::types::ExchangeParams {
            rt: Some("missing".to_string()),
        }),
    )
    .await;
    assert!(matches!(result, Err(ApiError::NotFound(_))));
}

#[tokio::test]
async fn exchange_expired_token_is_gone() -> Result<()> {
    let h = harness();
    h.store
        .insert_resume_token("rt-old", "abc123", "sam@example.com", -60)
        .await?;
    let result = exchange(
        Extension(h.state),
        Query(super::types::ExchangeParams {
            rt: Some("rt-old".to_string()),
        }),
    )
    .await;
    assert!(matches!(result, Err(ApiError::Gone(_))));
    Ok(())
}

#[tokio::test]
async fn get_draft_returns_payload_with_step() -> Result<()> {
    let h = harness();
    h.store.upsert_draft("abc123", "drafts/abc123.json", 2).await?;
    h.objects
        .put(
            "drafts/abc123.json",
            serde_json::to_vec(&serde_json::json!({
                "data": {"child.firstName": "Sam"},
                "step": 2
            }))?,
            "application/json",
        )
        .await?;

    let response = get_draft(
        cookie_headers("abc123")?,
        Extension(h.state),
        Query(super::types::DraftParams { token: None }),
    )
    .await
    .map_err(|err| anyhow::anyhow!("get-draft failed: {err}"))?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    assert_eq!(
        body,
        serde_json::json!({"child.firstName": "Sam", "step": 2})
    );
    Ok(())
}

#[tokio::test]
async fn get_draft_prefers_cookie_over_query_token() -> Result<()> {
    let h = harness();
    h.store.upsert_draft("mine", "drafts/mine.json", 1).await?;
    h.objects
        .put(
            "drafts/mine.json",
            serde_json::to_vec(&serde_json::json!({"data": {"who": "me"}, "step": 1}))?,
            "application/json",
        )
        .await?;

    let response = get_draft(
        cookie_headers("mine")?,
        Extension(h.state),
        Query(super::types::DraftParams {
            token: Some("theirs".to_string()),
        }),
    )
    .await
    .map_err(|err| anyhow::anyhow!("get-draft failed: {err}"))?;
    let body = body_json(response).await?;
    assert_eq!(body["who"], "me");
    Ok(())
}

#[tokio::test]
async fn get_draft_without_token_is_invalid() {
    let h = harness();
    let result = get_draft(
        HeaderMap::new(),
        Extension(h.state),
        Query(super::types::DraftParams { token: None }),
    )
    .await;
    assert!(matches!(result, Err(ApiError::InvalidInput(_))));
}

#[tokio::test]
async fn get_draft_unknown_draft_is_not_found() -> Result<()> {
    let h = harness();
    let result = get_draft(
        HeaderMap::new(),
        Extension(h.state.clone()),
        Query(super::types::DraftParams {
            token: Some("missing".to_string()),
        }),
    )
    .await;
    assert!(matches!(result, Err(ApiError::NotFound(_))));
    Ok(())
}

#[tokio::test]
async fn get_draft_with_malformed_payload_is_upstream_error() -> Result<()> {
    let h = harness();
    h.store.upsert_draft("abc123", "drafts/abc123.json", 0).await?;
    h.objects
        .put("drafts/abc123.json", b"not json".to_vec(), "application/json")
        .await?;
    let result = get_draft(
        cookie_headers("abc123")?,
        Extension(h.state),
        Query(super::types::DraftParams { token: None }),
    )
    .await;
    assert!(matches!(result, Err(ApiError::Upstream(_))));
    Ok(())
}

#[tokio::test]
async fn get_draft_with_missing_object_is_upstream_error() -> Result<()> {
    let h = harness();
    h.store.upsert_draft("abc123", "drafts/abc123.json", 0).await?;
    let result = get_draft(
        cookie_headers("abc123")?,
        Extension(h.state),
        Query(super::types::DraftParams { token: None }),
    )
    .await;
    assert!(matches!(result, Err(ApiError::Upstream(_))));
    Ok(())
}

#[tokio::test]
async fn save_draft_then_get_draft_round_trips() -> Result<()> {
    let h = harness();
    let response = save_draft(
        Extension(h.state.clone()),
        Some(Json(SaveDraftRequest {
            token: None,
            data: serde_json::json!({"child.firstName": "Sam", "school": "Northside"}),
            step: 2,
        })),
    )
    .await
    .map_err(|err| anyhow::anyhow!("save-draft failed: {err}"))?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    let token = body["token"].as_str().context("token")?.to_string();
    assert_eq!(body["step"], 2);

    let response = get_draft(
        HeaderMap::new(),
        Extension(h.state),
        Query(super::types::DraftParams {
            token: Some(token),
        }),
    )
    .await
    .map_err(|err| anyhow::anyhow!("get-draft failed: {err}"))?;
    let body = body_json(response).await?;
    assert_eq!(
        body,
        serde_json::json!({
            "child.firstName": "Sam",
            "school": "Northside",
            "step": 2
        })
    );
    Ok(())
}

#[tokio::test]
async fn save_draft_rejects_unknown_explicit_token() {
    let h = harness();
    let result = save_draft(
        Extension(h.state),
        Some(Json(SaveDraftRequest {
            token: Some("forged".to_string()),
            data: serde_json::json!({}),
            step: 0,
        })),
    )
    .await;
    assert!(matches!(result, Err(ApiError::NotFound(_))));
}

#[tokio::test]
async fn presign_upload_issues_url_under_the_draft_prefix() -> Result<()> {
    let h = harness();
    h.store.upsert_draft("abc123", "drafts/abc123.json", 0).await?;
    let response = presign_upload(
        cookie_headers("abc123")?,
        Extension(h.state),
        Some(Json(PresignUploadRequest {
            token: None,
            content_type: "application/pdf".to_string(),
        })),
    )
    .await
    .map_err(|err| anyhow::anyhow!("presign failed: {err}"))?;
    let body = body_json(response).await?;
    let key = body["key"].as_str().context("key")?;
    assert!(key.starts_with("submissions/abc123/"));
    assert!(body["url"].as_str().context("url")?.contains(key));
    Ok(())
}

#[tokio::test]
async fn presign_upload_requires_a_resolvable_draft() {
    let h = harness();
    let result = presign_upload(
        HeaderMap::new(),
        Extension(h.state),
        Some(Json(PresignUploadRequest {
            token: None,
            content_type: "application/pdf".to_string(),
        })),
    )
    .await;
    assert!(matches!(result, Err(ApiError::InvalidInput(_))));
}

#[tokio::test]
async fn whoami_reports_cookie_token_or_null() -> Result<()> {
    let response = whoami(cookie_headers("abc123")?).await;
    let body = body_json(response).await?;
    assert_eq!(body["token"], "abc123");

    let response = whoami(HeaderMap::new()).await;
    let body = body_json(response).await?;
    assert_eq!(body["token"], serde_json::Value::Null);
    Ok(())
}

#[tokio::test]
async fn logout_clears_the_cookie() {
    let h = harness();
    let response = logout(Extension(h.state)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let cookie = response
        .headers()
        .get(SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    assert!(cookie.starts_with("resume=;"));
    assert!(cookie.contains("Max-Age=0"));
}
