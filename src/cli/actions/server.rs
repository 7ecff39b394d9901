use crate::api;
use crate::api::handlers::{admin::AdminAuthConfig, resume::ResumeConfig};
use anyhow::{Context, Result};
use secrecy::SecretString;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub storage_base_url: String,
    pub storage_bucket: String,
    pub public_base_url: Option<String>,
    pub backend_base_url: Option<String>,
    pub resume_token_ttl_seconds: i64,
    pub resume_cookie_ttl_seconds: i64,
    pub draft_ttl_days: i64,
    pub upload_url_ttl_seconds: u64,
    pub admin_emails: Vec<String>,
    pub magic_token_secret: SecretString,
    pub session_token_secret: SecretString,
    pub admin_ui_base_url: String,
    pub magic_token_ttl_minutes: i64,
    pub session_token_ttl_hours: i64,
    pub magic_link_resend_seconds: i64,
    pub mail_api_url: Option<String>,
    pub mail_from: Option<String>,
}

/// Execute the server action.
///
/// # Errors
/// Returns an error if configuration validation or server startup fails.
/// Configuration problems (empty allow-list, missing or shared signing
/// secrets) are fatal before the listener binds.
pub async fn execute(args: Args) -> Result<()> {
    let resume_config = ResumeConfig::new(args.public_base_url, args.backend_base_url)
        .with_resume_token_ttl_seconds(args.resume_token_ttl_seconds)
        .with_cookie_ttl_seconds(args.resume_cookie_ttl_seconds)
        .with_draft_ttl_days(args.draft_ttl_days)
        .with_upload_url_ttl_seconds(args.upload_url_ttl_seconds);

    let admin_config = AdminAuthConfig::new(&args.admin_emails, args.admin_ui_base_url)
        .context("invalid admin configuration")?
        .with_magic_ttl_minutes(args.magic_token_ttl_minutes)
        .with_session_ttl_hours(args.session_token_ttl_hours)
        .with_resend_interval_seconds(args.magic_link_resend_seconds);

    api::new(
        args.port,
        args.dsn,
        resume_config,
        admin_config,
        args.magic_token_secret,
        args.session_token_secret,
        api::MailSettings {
            api_url: args.mail_api_url,
            from: args.mail_from,
        },
        api::StorageSettings {
            base_url: args.storage_base_url,
            bucket: args.storage_bucket,
        },
    )
    .await
}
