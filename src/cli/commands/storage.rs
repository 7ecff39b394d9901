use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};

pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("storage-base-url")
                .long("storage-base-url")
                .help("Object storage gateway base URL")
                .env("BURSARY_STORAGE_BASE_URL")
                .required(true),
        )
        .arg(
            Arg::new("storage-bucket")
                .long("storage-bucket")
                .help("Bucket for draft payloads and uploads")
                .env("BURSARY_STORAGE_BUCKET")
                .default_value("bursary"),
        )
}

#[derive(Debug)]
pub struct Options {
    pub base_url: String,
    pub bucket: String,
}

impl Options {
    /// # Errors
    /// Returns an error when the storage base URL is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        Ok(Self {
            base_url: matches
                .get_one::<String>("storage-base-url")
                .cloned()
                .context("missing required argument: --storage-base-url")?,
            bucket: matches
                .get_one::<String>("storage-bucket")
                .cloned()
                .unwrap_or_else(|| "bursary".to_string()),
        })
    }
}
