use anyhow::{bail, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

use crate::otp::OtpConfig;

pub const ARG_OTP_TTL_SECONDS: &str = "otp-ttl-seconds";
pub const ARG_OTP_CODE_LENGTH: &str = "otp-code-length";
pub const ARG_OTP_MAX_ATTEMPTS: &str = "otp-max-attempts";
pub const ARG_OTP_MIN_RESEND_INTERVAL_SECONDS: &str = "otp-min-resend-interval-seconds";
pub const ARG_OTP_MAX_RESENDS_PER_WINDOW: &str = "otp-max-resends-per-window";
pub const ARG_OTP_RESEND_WINDOW_SECONDS: &str = "otp-resend-window-seconds";
pub const ARG_OTP_DELIVERY_TIMEOUT_SECONDS: &str = "otp-delivery-timeout-seconds";
pub const ARG_OTP_PURGE_INTERVAL_SECONDS: &str = "otp-purge-interval-seconds";
pub const ARG_OTP_CODE_PEPPER: &str = "otp-code-pepper";

pub struct Options {
    pub config: OtpConfig,
    pub purge_interval_seconds: u64,
    pub code_pepper: SecretString,
}

impl Options {
    /// Parse OTP arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the code pepper is missing or blank.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let code_pepper = match matches.get_one::<String>(ARG_OTP_CODE_PEPPER) {
            Some(value) if !value.trim().is_empty() => SecretString::from(value.clone()),
            _ => bail!("missing required argument: --{ARG_OTP_CODE_PEPPER}"),
        };

        let get_i64 = |id: &str, default: i64| matches.get_one::<i64>(id).copied().unwrap_or(default);
        let get_u32 = |id: &str, default: u32| matches.get_one::<u32>(id).copied().unwrap_or(default);

        let defaults = OtpConfig::new();
        let config = OtpConfig::new()
            .with_ttl_seconds(get_i64(ARG_OTP_TTL_SECONDS, defaults.ttl().num_seconds()))
            .with_code_length(
                matches
                    .get_one::<usize>(ARG_OTP_CODE_LENGTH)
                    .copied()
                    .unwrap_or(defaults.code_length()),
            )
            .with_max_attempts(get_u32(ARG_OTP_MAX_ATTEMPTS, defaults.max_attempts()))
            .with_min_resend_interval_seconds(get_i64(
                ARG_OTP_MIN_RESEND_INTERVAL_SECONDS,
                defaults.min_resend_interval().num_seconds(),
            ))
            .with_max_resends_per_window(get_u32(
                ARG_OTP_MAX_RESENDS_PER_WINDOW,
                defaults.max_resends_per_window(),
            ))
            .with_resend_window_seconds(get_i64(
                ARG_OTP_RESEND_WINDOW_SECONDS,
                defaults.resend_window().num_seconds(),
            ))
            .with_delivery_timeout_seconds(
                matches
                    .get_one::<u64>(ARG_OTP_DELIVERY_TIMEOUT_SECONDS)
                    .copied()
                    .unwrap_or(defaults.delivery_timeout().as_secs()),
            )
            .normalize();

        Ok(Self {
            config,
            purge_interval_seconds: matches
                .get_one::<u64>(ARG_OTP_PURGE_INTERVAL_SECONDS)
                .copied()
                .unwrap_or(60)
                .max(1),
            code_pepper,
        })
    }
}

impl std::fmt::Debug for Options {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Options")
            .field("config", &self.config)
            .field("purge_interval_seconds", &self.purge_interval_seconds)
            .field("code_pepper", &"***")
            .finish()
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_challenge_args(command);
    let command = with_resend_args(command);
    with_secret_args(command)
}

fn with_challenge_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_OTP_TTL_SECONDS)
                .long(ARG_OTP_TTL_SECONDS)
                .help("Lifetime of an issued code in seconds")
                .env("KARAMSAATHI_OTP_TTL_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_OTP_CODE_LENGTH)
                .long(ARG_OTP_CODE_LENGTH)
                .help("Number of digits in a code (4-10)")
                .env("KARAMSAATHI_OTP_CODE_LENGTH")
                .default_value("6")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new(ARG_OTP_MAX_ATTEMPTS)
                .long(ARG_OTP_MAX_ATTEMPTS)
                .help("Wrong guesses allowed per code")
                .env("KARAMSAATHI_OTP_MAX_ATTEMPTS")
                .default_value("5")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_OTP_DELIVERY_TIMEOUT_SECONDS)
                .long(ARG_OTP_DELIVERY_TIMEOUT_SECONDS)
                .help("How long a request waits for the delivery provider")
                .env("KARAMSAATHI_OTP_DELIVERY_TIMEOUT_SECONDS")
                .default_value("10")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_OTP_PURGE_INTERVAL_SECONDS)
                .long(ARG_OTP_PURGE_INTERVAL_SECONDS)
                .help("Interval between sweeps of dead challenges")
                .env("KARAMSAATHI_OTP_PURGE_INTERVAL_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(u64)),
        )
}

fn with_resend_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_OTP_MIN_RESEND_INTERVAL_SECONDS)
                .long(ARG_OTP_MIN_RESEND_INTERVAL_SECONDS)
                .help("Minimum seconds between two codes for the same identifier and purpose")
                .env("KARAMSAATHI_OTP_MIN_RESEND_INTERVAL_SECONDS")
                .default_value("30")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_OTP_MAX_RESENDS_PER_WINDOW)
                .long(ARG_OTP_MAX_RESENDS_PER_WINDOW)
                .help("Codes allowed per resend window")
                .env("KARAMSAATHI_OTP_MAX_RESENDS_PER_WINDOW")
                .default_value("5")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_OTP_RESEND_WINDOW_SECONDS)
                .long(ARG_OTP_RESEND_WINDOW_SECONDS)
                .help("Length of the resend window in seconds")
                .env("KARAMSAATHI_OTP_RESEND_WINDOW_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(i64)),
        )
}

fn with_secret_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_OTP_CODE_PEPPER)
            .long(ARG_OTP_CODE_PEPPER)
            .help("Server secret mixed into code hashes")
            .env("KARAMSAATHI_OTP_CODE_PEPPER")
            .hide_env_values(true),
    )
}
