//! Token, URL and cookie helpers for the resume flow.

use anyhow::{Context, Result};
use axum::http::{header::COOKIE, HeaderMap, HeaderValue};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

pub(crate) const RESUME_COOKIE_NAME: &str = "resume";

/// Generate an opaque URL-safe token from `byte_length` bytes of OS entropy.
///
/// Used for draft tokens and resume tokens; 32 bytes gives 256 bits of
/// entropy, comfortably above the 128-bit floor for negligible collisions.
pub(crate) fn generate_token(byte_length: usize) -> Result<String> {
    let mut bytes = vec![0u8; byte_length];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate token")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Hash a resume token so raw values never touch the database.
pub(crate) fn hash_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

/// Build the exchange URL embedded in resume emails.
///
/// Prefers the backend base URL, falls back to the public base URL, and as a
/// last resort emits a bare relative path (an operational fallback only).
pub(crate) fn build_exchange_url(
    backend_base_url: Option<&str>,
    public_base_url: Option<&str>,
    resume_token: &str,
) -> String {
    let base = backend_base_url
        .or(public_base_url)
        .map(|base| base.trim_end_matches('/'));
    match base {
        Some(base) => format!("{base}/v1/resume/exchange?rt={resume_token}"),
        None => format!("/v1/resume/exchange?rt={resume_token}"),
    }
}

/// Build the `resume` session cookie carrying the draft token.
pub(crate) fn resume_cookie(
    token: &str,
    max_age_seconds: i64,
    secure: bool,
) -> Result<HeaderValue, axum::http::header::InvalidHeaderValue> {
    let mut cookie = format!(
        "{RESUME_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_seconds}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(crate) fn clear_resume_cookie(
    secure: bool,
) -> Result<HeaderValue, axum::http::header::InvalidHeaderValue> {
    let mut cookie =
        format!("{RESUME_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Read the draft token from the `resume` cookie, if present.
pub(crate) fn extract_cookie_token(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == RESUME_COOKIE_NAME && !val.is_empty() {
            return Some(val.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use base64ct::{Base64UrlUnpadded, Encoding};

    #[test]
    fn generate_token_is_url_safe_and_high_entropy() {
        let token = generate_token(32).expect("token");
        assert!(!token.contains('='));
        assert!(!token.contains('+'));
        assert!(!token.contains('/'));
        let decoded = Base64UrlUnpadded::decode_vec(&token).expect("decode");
        assert_eq!(decoded.len(), 32);
    }

    #[test]
    fn generate_token_is_unique() {
        let first = generate_token(32).expect("token");
        let second = generate_token(32).expect("token");
        assert_ne!(first, second);
    }

    #[test]
    fn hash_token_stable() {
        assert_eq!(hash_token("token"), hash_token("token"));
        assert_ne!(hash_token("token"), hash_token("other"));
    }

    #[test]
    fn exchange_url_prefers_backend_base() {
        let url = build_exchange_url(
            Some("https://api.bursary.dev/"),
            Some("https://apply.bursary.dev"),
            "rt1",
        );
        assert_eq!(url, "https://api.bursary.dev/v1/resume/exchange?rt=rt1");
    }

    #[test]
    fn exchange_url_falls_back_to_public_then_relative() {
        assert_eq!(
            build_exchange_url(None, Some("https://apply.bursary.dev"), "rt1"),
            "https://apply.bursary.dev/v1/resume/exchange?rt=rt1"
        );
        assert_eq!(
            build_exchange_url(None, None, "rt1"),
            "/v1/resume/exchange?rt=rt1"
        );
    }

    #[test]
    fn resume_cookie_sets_expected_attributes() {
        let cookie = resume_cookie("draft1", 86400, true).expect("cookie");
        let value = cookie.to_str().expect("str");
        assert!(value.starts_with("resume=draft1;"));
        assert!(value.contains("HttpOnly"));
        assert!(value.contains("SameSite=Lax"));
        assert!(value.contains("Max-Age=86400"));
        assert!(value.contains("Secure"));

        let insecure = resume_cookie("draft1", 86400, false).expect("cookie");
        assert!(!insecure.to_str().expect("str").contains("Secure"));
    }

    #[test]
    fn extract_cookie_token_parses_pairs() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("other=1; resume=draft1; theme=dark"),
        );
        assert_eq!(extract_cookie_token(&headers), Some("draft1".to_string()));
    }

    #[test]
    fn extract_cookie_token_ignores_empty_values() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("resume="));
        assert_eq!(extract_cookie_token(&headers), None);
        assert_eq!(extract_cookie_token(&HeaderMap::new()), None);
    }
}
