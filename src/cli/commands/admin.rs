use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("admin-emails")
                .long("admin-emails")
                .help("Comma-separated allow-list of admin email addresses")
                .env("BURSARY_ADMIN_EMAILS")
                .required(true),
        )
        .arg(
            Arg::new("magic-token-secret")
                .long("magic-token-secret")
                .help("Signing secret for magic login tokens")
                .env("BURSARY_MAGIC_TOKEN_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new("session-token-secret")
                .long("session-token-secret")
                .help("Signing secret for admin session tokens (must differ from the magic secret)")
                .env("BURSARY_SESSION_TOKEN_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new("admin-ui-base-url")
                .long("admin-ui-base-url")
                .help("Admin UI base URL used to build login links")
                .env("BURSARY_ADMIN_UI_BASE_URL")
                .default_value("https://admin.bursary.dev"),
        )
        .arg(
            Arg::new("magic-token-ttl-minutes")
                .long("magic-token-ttl-minutes")
                .help("Magic login token TTL in minutes")
                .env("BURSARY_MAGIC_TOKEN_TTL_MINUTES")
                .default_value("15")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("session-token-ttl-hours")
                .long("session-token-ttl-hours")
                .help("Admin session token TTL in hours")
                .env("BURSARY_SESSION_TOKEN_TTL_HOURS")
                .default_value("12")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("magic-link-resend-seconds")
                .long("magic-link-resend-seconds")
                .help("Minimum interval between magic-link requests per address")
                .env("BURSARY_MAGIC_LINK_RESEND_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(i64)),
        )
}

#[derive(Debug)]
pub struct Options {
    pub admin_emails: Vec<String>,
    pub magic_token_secret: SecretString,
    pub session_token_secret: SecretString,
    pub admin_ui_base_url: String,
    pub magic_token_ttl_minutes: i64,
    pub session_token_ttl_hours: i64,
    pub magic_link_resend_seconds: i64,
}

impl Options {
    /// # Errors
    /// Returns an error when a required argument is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let admin_emails = matches
            .get_one::<String>("admin-emails")
            .context("missing required argument: --admin-emails")?
            .split(',')
            .map(str::trim)
            .filter(|email| !email.is_empty())
            .map(str::to_string)
            .collect();
        let magic_token_secret = matches
            .get_one::<String>("magic-token-secret")
            .cloned()
            .map(SecretString::from)
            .context("missing required argument: --magic-token-secret")?;
        let session_token_secret = matches
            .get_one::<String>("session-token-secret")
            .cloned()
            .map(SecretString::from)
            .context("missing required argument: --session-token-secret")?;

        Ok(Self {
            admin_emails,
            magic_token_secret,
            session_token_secret,
            admin_ui_base_url: matches
                .get_one::<String>("admin-ui-base-url")
                .cloned()
                .unwrap_or_else(|| "https://admin.bursary.dev".to_string()),
            magic_token_ttl_minutes: matches
                .get_one::<i64>("magic-token-ttl-minutes")
                .copied()
                .unwrap_or(15),
            session_token_ttl_hours: matches
                .get_one::<i64>("session-token-ttl-hours")
                .copied()
                .unwrap_or(12),
            magic_link_resend_seconds: matches
                .get_one::<i64>("magic-link-resend-seconds")
                .copied()
                .unwrap_or(60),
        })
    }
}
