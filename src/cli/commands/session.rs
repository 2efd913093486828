use anyhow::{bail, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_SESSION_SECRET: &str = "session-secret";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_SESSION_ISSUER: &str = "session-issuer";

pub struct Options {
    pub secret: SecretString,
    pub ttl_seconds: i64,
    pub issuer: String,
}

impl Options {
    /// Parse session arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the signing secret is missing or blank.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let secret = match matches.get_one::<String>(ARG_SESSION_SECRET) {
            Some(value) if !value.trim().is_empty() => SecretString::from(value.clone()),
            _ => bail!("missing required argument: --{ARG_SESSION_SECRET}"),
        };

        Ok(Self {
            secret,
            ttl_seconds: matches
                .get_one::<i64>(ARG_SESSION_TTL_SECONDS)
                .copied()
                .unwrap_or(604_800),
            issuer: matches
                .get_one::<String>(ARG_SESSION_ISSUER)
                .cloned()
                .filter(|issuer| !issuer.trim().is_empty())
                .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string()),
        })
    }
}

impl std::fmt::Debug for Options {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Options")
            .field("secret", &"***")
            .field("ttl_seconds", &self.ttl_seconds)
            .field("issuer", &self.issuer)
            .finish()
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SESSION_SECRET)
                .long(ARG_SESSION_SECRET)
                .help("HMAC secret used to sign session tokens")
                .env("KARAMSAATHI_SESSION_SECRET")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session token TTL in seconds")
                .env("KARAMSAATHI_SESSION_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_SESSION_ISSUER)
                .long(ARG_SESSION_ISSUER)
                .help("Issuer (iss) claim of session tokens")
                .env("KARAMSAATHI_SESSION_ISSUER")
                .default_value("karamsaathi"),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn parses_session_options() -> Result<()> {
        temp_env::with_vars(
            [
                ("KARAMSAATHI_SESSION_SECRET", Some("session-secret")),
                ("KARAMSAATHI_SESSION_TTL_SECONDS", Some("3600")),
                ("KARAMSAATHI_SESSION_ISSUER", None),
            ],
            || {
                let matches = with_args(Command::new("karamsaathi")).get_matches_from(vec!["karamsaathi"]);
                let options = Options::parse(&matches)?;
                assert_eq!(options.secret.expose_secret(), "session-secret");
                assert_eq!(options.ttl_seconds, 3600);
                assert_eq!(options.issuer, "karamsaathi");
                assert!(!format!("{options:?}").contains("session-secret"));
                Ok(())
            },
        )
    }

    #[test]
    fn secret_is_required() {
        temp_env::with_var("KARAMSAATHI_SESSION_SECRET", None::<&str>, || {
            let matches = with_args(Command::new("karamsaathi")).get_matches_from(vec!["karamsaathi"]);
            assert!(Options::parse(&matches).is_err());
        });
    }
}
