//! # Bursary (Grant Application Backend)
//!
//! `bursary` is the backend for a multi-step grant-application form. It owns
//! the two stateful flows of the system:
//!
//! ## Applicant resume flow
//!
//! Drafts are saved against an opaque **draft token**; the serialized payload
//! lives in object storage while the document store keeps the metadata
//! (storage key, wizard step, status, contact email). Applicants who leave
//! get a **resume token** by email: single-use, 24-hour expiry, exchanged for
//! an `HttpOnly` cookie session that rehydrates the draft. Consumption is
//! atomic, so a resume link can never grant two sessions.
//!
//! ## Staff magic-link login
//!
//! Review staff authenticate with a **magic link**: a short-lived signed
//! token mailed to an allow-listed address, exchanged for a longer-lived
//! **session token**. The two token classes are signed under independent
//! secrets and carry an explicit `typ` discriminator which is checked on
//! every verification. Magic-link requests are rate limited per address, and
//! sensitive reads on the review surface leave a best-effort audit trail.
//!
//! External collaborators (object storage, document store, mail delivery)
//! sit behind traits with HTTP/Postgres implementations for deployment and
//! in-memory implementations for tests.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
