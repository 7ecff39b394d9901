use clap::{builder::ValueParser, Arg, Command};

pub const ARG_VERBOSITY: &str = "verbosity";

#[must_use]
pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
            .env("BURSARY_LOG_LEVEL")
            .global(true)
            .action(clap::ArgAction::Count)
            .value_parser(validator_log_level()),
    )
}

#[cfg(test)]
mod tests {
    use super::validator_log_level;
    use clap::{Arg, Command};

    fn parse(value: &str) -> Result<u8, clap::Error> {
        Command::new("test")
            .arg(
                Arg::new("verbosity")
                    .long("verbose")
                    .value_parser(validator_log_level()),
            )
            .try_get_matches_from(vec!["test", "--verbose", value])
            .map(|matches| matches.get_one::<u8>("verbosity").copied().unwrap_or(0))
    }

    #[test]
    fn accepts_numbers_and_names() {
        assert_eq!(parse("2").ok(), Some(2));
        assert_eq!(parse("info").ok(), Some(2));
        assert_eq!(parse("TRACE").ok(), Some(4));
    }

    #[test]
    fn rejects_unknown_levels() {
        assert!(parse("noisy").is_err());
        assert!(parse("42").is_err());
    }
}
