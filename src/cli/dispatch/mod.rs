//! Command-line argument dispatch.
//!
//! Parses validated CLI arguments and maps them to the action to run, such as
//! starting the API server with its full configuration.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{delivery, otp, session, ARG_DSN, ARG_FRONTEND_BASE_URL, ARG_PORT};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .filter(|dsn| !dsn.trim().is_empty());
    let frontend_base_url = matches
        .get_one::<String>(ARG_FRONTEND_BASE_URL)
        .cloned()
        .unwrap_or_else(|| "https://karamsaathi.in".to_string());

    let otp_opts = otp::Options::parse(matches)?;
    let session_opts = session::Options::parse(matches)?;
    let delivery_opts = delivery::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        frontend_base_url,
        otp_config: otp_opts.config,
        otp_purge_interval_seconds: otp_opts.purge_interval_seconds,
        otp_code_pepper: otp_opts.code_pepper,
        session_secret: session_opts.secret,
        session_ttl_seconds: session_opts.ttl_seconds,
        session_issuer: session_opts.issuer,
        sms_provider: delivery_opts.provider,
        sms_locale: delivery_opts.locale,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::delivery::Provider;
    use secrecy::ExposeSecret;

    const CLEARED: [(&str, Option<&str>); 6] = [
        ("KARAMSAATHI_DSN", None),
        ("KARAMSAATHI_OTP_CODE_PEPPER", None),
        ("KARAMSAATHI_SESSION_SECRET", None),
        ("KARAMSAATHI_SMS_PROVIDER", None),
        ("KARAMSAATHI_SMS_LOCALE", None),
        ("KARAMSAATHI_OTP_MAX_ATTEMPTS", None),
    ];

    #[test]
    fn builds_server_action() -> Result<()> {
        temp_env::with_vars(CLEARED, || {
            let matches = crate::cli::commands::new().get_matches_from(vec![
                "karamsaathi",
                "--otp-code-pepper",
                "pepper",
                "--session-secret",
                "secret",
                "--otp-max-attempts",
                "3",
            ]);
            let Action::Server(args) = handler(&matches)?;
            assert_eq!(args.port, 8080);
            assert_eq!(args.dsn, None);
            assert_eq!(args.otp_config.max_attempts(), 3);
            assert_eq!(args.otp_code_pepper.expose_secret(), "pepper");
            assert_eq!(args.session_secret.expose_secret(), "secret");
            assert_eq!(args.session_ttl_seconds, 604_800);
            assert!(matches!(args.sms_provider, Provider::Log));
            Ok(())
        })
    }

    #[test]
    fn session_secret_required() {
        temp_env::with_vars(CLEARED, || {
            let matches = crate::cli::commands::new()
                .get_matches_from(vec!["karamsaathi", "--otp-code-pepper", "pepper"]);
            let result = handler(&matches);
            assert!(result.is_err());
            if let Err(err) = result {
                assert!(err
                    .to_string()
                    .contains("missing required argument: --session-secret"));
            }
        });
    }
}
