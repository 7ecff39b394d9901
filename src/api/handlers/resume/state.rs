//! Resume flow configuration and shared state.

use std::sync::Arc;

use crate::api::email::MailDispatcher;
use crate::api::objects::ObjectStore;

use super::store::ResumeStore;

const DEFAULT_RESUME_TOKEN_TTL_SECONDS: i64 = 24 * 60 * 60;
const DEFAULT_COOKIE_TTL_SECONDS: i64 = 24 * 60 * 60;
const DEFAULT_DRAFT_TTL_DAYS: i64 = 180;
const DEFAULT_UPLOAD_URL_TTL_SECONDS: u64 = 15 * 60;

#[derive(Clone, Debug)]
pub struct ResumeConfig {
    public_base_url: Option<String>,
    backend_base_url: Option<String>,
    resume_token_ttl_seconds: i64,
    cookie_ttl_seconds: i64,
    draft_ttl_days: i64,
    upload_url_ttl_seconds: u64,
}

impl ResumeConfig {
    #[must_use]
    pub fn new(public_base_url: Option<String>, backend_base_url: Option<String>) -> Self {
        Self {
            public_base_url,
            backend_base_url,
            resume_token_ttl_seconds: DEFAULT_RESUME_TOKEN_TTL_SECONDS,
            cookie_ttl_seconds: DEFAULT_COOKIE_TTL_SECONDS,
            draft_ttl_days: DEFAULT_DRAFT_TTL_DAYS,
            upload_url_ttl_seconds: DEFAULT_UPLOAD_URL_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_resume_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.resume_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_cookie_ttl_seconds(mut self, seconds: i64) -> Self {
        self.cookie_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_draft_ttl_days(mut self, days: i64) -> Self {
        self.draft_ttl_days = days;
        self
    }

    #[must_use]
    pub fn with_upload_url_ttl_seconds(mut self, seconds: u64) -> Self {
        self.upload_url_ttl_seconds = seconds;
        self
    }

    pub(crate) fn public_base_url(&self) -> Option<&str> {
        self.public_base_url.as_deref()
    }

    pub(crate) fn backend_base_url(&self) -> Option<&str> {
        self.backend_base_url.as_deref()
    }

    pub(crate) fn resume_token_ttl_seconds(&self) -> i64 {
        self.resume_token_ttl_seconds
    }

    pub(crate) fn cookie_ttl_seconds(&self) -> i64 {
        self.cookie_ttl_seconds
    }

    pub(crate) fn draft_ttl_days(&self) -> i64 {
        self.draft_ttl_days
    }

    pub(crate) fn upload_url_ttl_seconds(&self) -> u64 {
        self.upload_url_ttl_seconds
    }

    /// Cookies are only marked `Secure` when the applicant-facing site is
    /// served over HTTPS, so local development keeps working.
    pub(crate) fn cookie_secure(&self) -> bool {
        self.public_base_url
            .as_deref()
            .is_some_and(|url| url.starts_with("https://"))
    }
}

pub struct ResumeState {
    config: ResumeConfig,
    store: Arc<dyn ResumeStore>,
    objects: Arc<dyn ObjectStore>,
    mailer: MailDispatcher,
}

impl ResumeState {
    #[must_use]
    pub fn new(
        config: ResumeConfig,
        store: Arc<dyn ResumeStore>,
        objects: Arc<dyn ObjectStore>,
        mailer: MailDispatcher,
    ) -> Self {
        Self {
            config,
            store,
            objects,
            mailer,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ResumeConfig {
        &self.config
    }

    pub(crate) fn store(&self) -> &dyn ResumeStore {
        self.store.as_ref()
    }

    pub(crate) fn objects(&self) -> &dyn ObjectStore {
        self.objects.as_ref()
    }

    pub(crate) fn mailer(&self) -> &MailDispatcher {
        &self.mailer
    }
}
