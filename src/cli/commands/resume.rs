use anyhow::Result;
use clap::{Arg, ArgMatches, Command};

pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("public-base-url")
                .long("public-base-url")
                .help("Applicant-facing base URL used for redirects and the exchange fallback")
                .env("BURSARY_PUBLIC_BASE_URL"),
        )
        .arg(
            Arg::new("backend-base-url")
                .long("backend-base-url")
                .help("API base URL embedded in resume links")
                .env("BURSARY_BACKEND_BASE_URL"),
        )
        .arg(
            Arg::new("resume-token-ttl-seconds")
                .long("resume-token-ttl-seconds")
                .help("Resume token TTL in seconds")
                .env("BURSARY_RESUME_TOKEN_TTL_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("resume-cookie-ttl-seconds")
                .long("resume-cookie-ttl-seconds")
                .help("Resume session cookie TTL in seconds")
                .env("BURSARY_RESUME_COOKIE_TTL_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("draft-ttl-days")
                .long("draft-ttl-days")
                .help("Days an idle draft is kept before being purged")
                .env("BURSARY_DRAFT_TTL_DAYS")
                .default_value("180")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("upload-url-ttl-seconds")
                .long("upload-url-ttl-seconds")
                .help("Presigned upload URL TTL in seconds")
                .env("BURSARY_UPLOAD_URL_TTL_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(u64)),
        )
}

#[derive(Debug)]
pub struct Options {
    pub public_base_url: Option<String>,
    pub backend_base_url: Option<String>,
    pub resume_token_ttl_seconds: i64,
    pub resume_cookie_ttl_seconds: i64,
    pub draft_ttl_days: i64,
    pub upload_url_ttl_seconds: u64,
}

impl Options {
    /// # Errors
    /// Infallible today; kept fallible for parity with the other option sets.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        Ok(Self {
            public_base_url: matches.get_one::<String>("public-base-url").cloned(),
            backend_base_url: matches.get_one::<String>("backend-base-url").cloned(),
            resume_token_ttl_seconds: matches
                .get_one::<i64>("resume-token-ttl-seconds")
                .copied()
                .unwrap_or(86400),
            resume_cookie_ttl_seconds: matches
                .get_one::<i64>("resume-cookie-ttl-seconds")
                .copied()
                .unwrap_or(86400),
            draft_ttl_days: matches
                .get_one::<i64>("draft-ttl-days")
                .copied()
                .unwrap_or(180),
            upload_url_ttl_seconds: matches
                .get_one::<u64>("upload-url-ttl-seconds")
                .copied()
                .unwrap_or(900),
        })
    }
}
