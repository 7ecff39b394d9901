//! Admin authentication configuration and shared state.
//!
//! Configuration is validated once at construction: an empty allow-list or a
//! missing/shared signing secret refuses to start the service rather than
//! serving with a weakened login flow.

use anyhow::{bail, Result};
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashSet;
use std::sync::Arc;

use crate::api::email::MailDispatcher;
use crate::api::handlers::normalize_email;

use super::audit::AuditRecorder;
use super::rate_limit::{Clock, ResendLimiter};
use super::token::AdminTokenSigner;

const DEFAULT_MAGIC_TTL_MINUTES: i64 = 15;
const DEFAULT_SESSION_TTL_HOURS: i64 = 12;
const DEFAULT_RESEND_INTERVAL_SECONDS: i64 = 60;

#[derive(Clone, Debug)]
pub struct AdminAuthConfig {
    allow_list: HashSet<String>,
    ui_base_url: String,
    magic_ttl_minutes: i64,
    session_ttl_hours: i64,
    resend_interval_seconds: i64,
}

impl AdminAuthConfig {
    /// # Errors
    /// Returns an error when no usable admin address is configured.
    pub fn new(admin_emails: &[String], ui_base_url: String) -> Result<Self> {
        let allow_list: HashSet<String> = admin_emails
            .iter()
            .map(|email| normalize_email(email))
            .filter(|email| !email.is_empty())
            .collect();
        if allow_list.is_empty() {
            bail!("admin allow-list must contain at least one email");
        }
        Ok(Self {
            allow_list,
            ui_base_url,
            magic_ttl_minutes: DEFAULT_MAGIC_TTL_MINUTES,
            session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
            resend_interval_seconds: DEFAULT_RESEND_INTERVAL_SECONDS,
        })
    }

    #[must_use]
    pub fn with_magic_ttl_minutes(mut self, minutes: i64) -> Self {
        self.magic_ttl_minutes = minutes;
        self
    }

    #[must_use]
    pub fn with_session_ttl_hours(mut self, hours: i64) -> Self {
        self.session_ttl_hours = hours;
        self
    }

    #[must_use]
    pub fn with_resend_interval_seconds(mut self, seconds: i64) -> Self {
        self.resend_interval_seconds = seconds;
        self
    }

    /// Allow-list membership for an already-normalized address.
    #[must_use]
    pub fn is_allowed(&self, email_normalized: &str) -> bool {
        self.allow_list.contains(email_normalized)
    }

    pub(crate) fn ui_base_url(&self) -> &str {
        &self.ui_base_url
    }

    pub(crate) fn magic_ttl_seconds(&self) -> i64 {
        self.magic_ttl_minutes * 60
    }

    pub(crate) fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_hours * 60 * 60
    }

    pub(crate) fn resend_interval_seconds(&self) -> i64 {
        self.resend_interval_seconds
    }
}

pub struct AdminAuthState {
    config: AdminAuthConfig,
    signer: AdminTokenSigner,
    limiter: ResendLimiter,
    mailer: MailDispatcher,
    audit: AuditRecorder,
}

impl AdminAuthState {
    /// # Errors
    /// Returns an error when a signing secret is missing or the two secrets
    /// are not independent.
    pub fn new(
        config: AdminAuthConfig,
        magic_secret: &SecretString,
        session_secret: &SecretString,
        mailer: MailDispatcher,
        audit: AuditRecorder,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        if magic_secret.expose_secret().is_empty() {
            bail!("magic token signing secret is required");
        }
        if session_secret.expose_secret().is_empty() {
            bail!("session token signing secret is required");
        }
        if magic_secret.expose_secret() == session_secret.expose_secret() {
            bail!("magic and session signing secrets must be distinct");
        }

        let signer = AdminTokenSigner::new(
            magic_secret,
            session_secret,
            config.magic_ttl_seconds(),
            config.session_ttl_seconds(),
        );
        let limiter = ResendLimiter::new(config.resend_interval_seconds(), clock);
        Ok(Self {
            config,
            signer,
            limiter,
            mailer,
            audit,
        })
    }

    #[must_use]
    pub fn config(&self) -> &AdminAuthConfig {
        &self.config
    }

    pub(crate) fn signer(&self) -> &AdminTokenSigner {
        &self.signer
    }

    pub(crate) fn limiter(&self) -> &ResendLimiter {
        &self.limiter
    }

    pub(crate) fn mailer(&self) -> &MailDispatcher {
        &self.mailer
    }

    pub(crate) fn audit(&self) -> &AuditRecorder {
        &self.audit
    }
}
