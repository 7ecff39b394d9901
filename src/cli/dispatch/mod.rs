//! Command-line argument dispatch and server initialization.
//!
//! This module parses validated CLI arguments and maps them to the
//! appropriate action, such as starting the API server with its full
//! configuration state.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{admin, mail, resume, storage};
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let storage_opts = storage::Options::parse(matches)?;
    let resume_opts = resume::Options::parse(matches)?;
    let admin_opts = admin::Options::parse(matches)?;
    let mail_opts = mail::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        storage_base_url: storage_opts.base_url,
        storage_bucket: storage_opts.bucket,
        public_base_url: resume_opts.public_base_url,
        backend_base_url: resume_opts.backend_base_url,
        resume_token_ttl_seconds: resume_opts.resume_token_ttl_seconds,
        resume_cookie_ttl_seconds: resume_opts.resume_cookie_ttl_seconds,
        draft_ttl_days: resume_opts.draft_ttl_days,
        upload_url_ttl_seconds: resume_opts.upload_url_ttl_seconds,
        admin_emails: admin_opts.admin_emails,
        magic_token_secret: admin_opts.magic_token_secret,
        session_token_secret: admin_opts.session_token_secret,
        admin_ui_base_url: admin_opts.admin_ui_base_url,
        magic_token_ttl_minutes: admin_opts.magic_token_ttl_minutes,
        session_token_ttl_hours: admin_opts.session_token_ttl_hours,
        magic_link_resend_seconds: admin_opts.magic_link_resend_seconds,
        mail_api_url: mail_opts.api_url,
        mail_from: mail_opts.from,
    }))
}
