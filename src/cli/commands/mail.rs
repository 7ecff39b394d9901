use anyhow::Result;
use clap::{Arg, ArgMatches, Command};

pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("mail-api-url")
                .long("mail-api-url")
                .help("Transactional mail API endpoint; links are logged when unset")
                .env("BURSARY_MAIL_API_URL"),
        )
        .arg(
            Arg::new("mail-from")
                .long("mail-from")
                .help("Sending identity for outbound mail")
                .env("BURSARY_MAIL_FROM"),
        )
}

#[derive(Debug)]
pub struct Options {
    pub api_url: Option<String>,
    pub from: Option<String>,
}

impl Options {
    /// # Errors
    /// Infallible today; kept fallible for parity with the other option sets.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        Ok(Self {
            api_url: matches.get_one::<String>("mail-api-url").cloned(),
            from: matches.get_one::<String>("mail-from").cloned(),
        })
    }
}
