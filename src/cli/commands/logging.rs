use clap::{builder::ValueParser, Arg, ArgMatches, Command};

pub const ARG_VERBOSITY: &str = "verbosity";
pub const ARG_LOG_LEVEL: &str = "log-level";

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

/// Effective verbosity: the higher of `-v` occurrences and `--log-level`.
#[must_use]
pub fn verbosity(matches: &ArgMatches) -> u8 {
    let count = matches.get_one::<u8>(ARG_VERBOSITY).copied().unwrap_or(0);
    let level = matches.get_one::<u8>(ARG_LOG_LEVEL).copied().unwrap_or(0);
    count.max(level)
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_VERBOSITY)
                .short('v')
                .long("verbose")
                .help("Increase verbosity: -v WARN, -vv INFO, -vvv DEBUG, -vvvv TRACE (default: ERROR)")
                .global(true)
                .action(clap::ArgAction::Count),
        )
        .arg(
            Arg::new(ARG_LOG_LEVEL)
                .long(ARG_LOG_LEVEL)
                .help("Log level: ERROR, WARN, INFO, DEBUG, TRACE or 0-5")
                .env("KARAMSAATHI_LOG_LEVEL")
                .global(true)
                .value_parser(validator_log_level()),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_names_and_numbers() {
        let command = with_args(Command::new("karamsaathi"));
        for (level, expected) in [("debug", 3), ("TRACE", 4), ("5", 5)] {
            temp_env::with_var("KARAMSAATHI_LOG_LEVEL", Some(level), || {
                let matches = command.clone().get_matches_from(vec!["karamsaathi"]);
                assert_eq!(
                    matches.get_one::<u8>(ARG_LOG_LEVEL).copied(),
                    Some(expected)
                );
                assert_eq!(verbosity(&matches), expected);
            });
        }
    }

    #[test]
    fn verbosity_takes_the_higher_setting() {
        temp_env::with_var("KARAMSAATHI_LOG_LEVEL", Some("info"), || {
            let command = with_args(Command::new("karamsaathi"));

            let matches = command.clone().get_matches_from(vec!["karamsaathi", "-v"]);
            assert_eq!(verbosity(&matches), 2);

            let matches = command.get_matches_from(vec!["karamsaathi", "-vvvv"]);
            assert_eq!(verbosity(&matches), 4);
        });

        temp_env::with_var("KARAMSAATHI_LOG_LEVEL", None::<&str>, || {
            let matches = with_args(Command::new("karamsaathi")).get_matches_from(vec!["karamsaathi"]);
            assert_eq!(verbosity(&matches), 0);
        });
    }

    #[test]
    fn rejects_unknown_level() {
        temp_env::with_var("KARAMSAATHI_LOG_LEVEL", Some("loud"), || {
            let result = with_args(Command::new("karamsaathi")).try_get_matches_from(vec!["karamsaathi"]);
            assert!(result.is_err());
        });
    }
}
