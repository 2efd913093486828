use anyhow::{anyhow, Result};
use clap::{builder::PossibleValuesParser, Arg, ArgMatches, Command};
use secrecy::SecretString;
use std::str::FromStr;

use crate::{
    i18n::Locale,
    otp::delivery::{TwilioOptions, WhatsAppOptions},
};

pub const ARG_SMS_PROVIDER: &str = "sms-provider";
pub const ARG_SMS_LOCALE: &str = "sms-locale";
pub const ARG_TWILIO_ACCOUNT_SID: &str = "twilio-account-sid";
pub const ARG_TWILIO_AUTH_TOKEN: &str = "twilio-auth-token";
pub const ARG_TWILIO_PHONE_NUMBER: &str = "twilio-phone-number";
pub const ARG_WHATSAPP_ACCESS_TOKEN: &str = "whatsapp-access-token";
pub const ARG_WHATSAPP_PHONE_NUMBER_ID: &str = "whatsapp-phone-number-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmsProvider {
    Log,
    Twilio,
    WhatsApp,
}

impl FromStr for SmsProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "log" => Ok(Self::Log),
            "twilio" => Ok(Self::Twilio),
            "whatsapp" => Ok(Self::WhatsApp),
            _ => Err(format!("unknown sms provider: {s}")),
        }
    }
}

/// Provider choice plus the credentials it needs.
#[derive(Debug, Clone)]
pub enum Provider {
    Log,
    Twilio(TwilioOptions),
    WhatsApp(WhatsAppOptions),
}

#[derive(Debug, Clone)]
pub struct Options {
    pub provider: Provider,
    pub locale: Locale,
}

impl Options {
    /// Parse delivery arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the selected provider is missing credentials.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
        };
        let required = |id: &str| {
            get_non_empty(id).ok_or_else(|| anyhow!("missing required argument: --{id}"))
        };

        let provider = get_non_empty(ARG_SMS_PROVIDER)
            .map_or(Ok(SmsProvider::Log), |value| value.parse::<SmsProvider>())
            .map_err(|err| anyhow!(err))?;

        let provider = match provider {
            SmsProvider::Log => Provider::Log,
            SmsProvider::Twilio => Provider::Twilio(TwilioOptions {
                account_sid: required(ARG_TWILIO_ACCOUNT_SID)?,
                auth_token: SecretString::from(required(ARG_TWILIO_AUTH_TOKEN)?),
                from_number: required(ARG_TWILIO_PHONE_NUMBER)?,
            }),
            SmsProvider::WhatsApp => Provider::WhatsApp(WhatsAppOptions {
                access_token: SecretString::from(required(ARG_WHATSAPP_ACCESS_TOKEN)?),
                phone_number_id: required(ARG_WHATSAPP_PHONE_NUMBER_ID)?,
            }),
        };

        let locale = get_non_empty(ARG_SMS_LOCALE)
            .map_or(Ok(Locale::default()), |tag| tag.parse::<Locale>())
            .map_err(|err| anyhow!(err))?;

        Ok(Self { provider, locale })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = command
        .arg(
            Arg::new(ARG_SMS_PROVIDER)
                .long(ARG_SMS_PROVIDER)
                .help("Channel used to deliver codes to phone numbers")
                .long_help(
                    "Channel used to deliver codes to phone numbers.\n\n`log` writes codes to the log instead of sending them and also handles email addresses; use it for local development only.",
                )
                .env("KARAMSAATHI_SMS_PROVIDER")
                .default_value("log")
                .value_parser(PossibleValuesParser::new(["log", "twilio", "whatsapp"])),
        )
        .arg(
            Arg::new(ARG_SMS_LOCALE)
                .long(ARG_SMS_LOCALE)
                .help("Language of the delivered message: en, hi, mr, ta")
                .env("KARAMSAATHI_SMS_LOCALE")
                .default_value("en"),
        );
    let command = with_twilio_args(command);
    with_whatsapp_args(command)
}

fn with_twilio_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_TWILIO_ACCOUNT_SID)
                .long(ARG_TWILIO_ACCOUNT_SID)
                .help("Twilio account SID")
                .env("TWILIO_ACCOUNT_SID"),
        )
        .arg(
            Arg::new(ARG_TWILIO_AUTH_TOKEN)
                .long(ARG_TWILIO_AUTH_TOKEN)
                .help("Twilio auth token")
                .env("TWILIO_AUTH_TOKEN")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_TWILIO_PHONE_NUMBER)
                .long(ARG_TWILIO_PHONE_NUMBER)
                .help("Twilio sender phone number (E.164)")
                .env("TWILIO_PHONE_NUMBER"),
        )
}

fn with_whatsapp_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_WHATSAPP_ACCESS_TOKEN)
                .long(ARG_WHATSAPP_ACCESS_TOKEN)
                .help("WhatsApp Cloud API access token")
                .env("WHATSAPP_ACCESS_TOKEN")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_WHATSAPP_PHONE_NUMBER_ID)
                .long(ARG_WHATSAPP_PHONE_NUMBER_ID)
                .help("WhatsApp Cloud API phone number id")
                .env("WHATSAPP_PHONE_NUMBER_ID"),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn with_cleared_provider_env<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        temp_env::with_vars(
            [
                ("KARAMSAATHI_SMS_PROVIDER", None::<&str>),
                ("KARAMSAATHI_SMS_LOCALE", None),
                ("TWILIO_ACCOUNT_SID", None),
                ("TWILIO_AUTH_TOKEN", None),
                ("TWILIO_PHONE_NUMBER", None),
                ("WHATSAPP_ACCESS_TOKEN", None),
                ("WHATSAPP_PHONE_NUMBER_ID", None),
            ],
            f,
        )
    }

    fn command() -> Command {
        with_args(Command::new("karamsaathi"))
    }

    #[test]
    fn defaults_to_log_provider() -> Result<()> {
        with_cleared_provider_env(|| {
            let matches = command().get_matches_from(vec!["karamsaathi"]);
            let options = Options::parse(&matches)?;
            assert!(matches!(options.provider, Provider::Log));
            assert_eq!(options.locale, Locale::En);
            Ok(())
        })
    }

    #[test]
    fn twilio_requires_credentials() {
        with_cleared_provider_env(|| {
            let matches = command().get_matches_from(vec![
                "karamsaathi",
                "--sms-provider",
                "twilio",
                "--twilio-account-sid",
                "AC123",
            ]);
            let result = Options::parse(&matches);
            assert!(result.is_err());
            if let Err(err) = result {
                assert!(err
                    .to_string()
                    .contains("missing required argument: --twilio-auth-token"));
            }
        });
    }

    #[test]
    fn twilio_from_provider_env_names() -> Result<()> {
        with_cleared_provider_env(|| {
            temp_env::with_vars(
                [
                    ("KARAMSAATHI_SMS_PROVIDER", Some("twilio")),
                    ("KARAMSAATHI_SMS_LOCALE", Some("hi-IN")),
                    ("TWILIO_ACCOUNT_SID", Some("AC123")),
                    ("TWILIO_AUTH_TOKEN", Some("token")),
                    ("TWILIO_PHONE_NUMBER", Some("+15005550006")),
                ],
                || {
                    let matches = command().get_matches_from(vec!["karamsaathi"]);
                    let options = Options::parse(&matches)?;
                    assert_eq!(options.locale, Locale::Hi);
                    match options.provider {
                        Provider::Twilio(twilio) => {
                            assert_eq!(twilio.account_sid, "AC123");
                            assert_eq!(twilio.auth_token.expose_secret(), "token");
                            assert_eq!(twilio.from_number, "+15005550006");
                        }
                        other => panic!("unexpected provider: {other:?}"),
                    }
                    Ok(())
                },
            )
        })
    }

    #[test]
    fn whatsapp_options() -> Result<()> {
        with_cleared_provider_env(|| {
            let matches = command().get_matches_from(vec![
                "karamsaathi",
                "--sms-provider",
                "whatsapp",
                "--whatsapp-access-token",
                "wa-token",
                "--whatsapp-phone-number-id",
                "1234",
            ]);
            let options = Options::parse(&matches)?;
            assert!(matches!(
                options.provider,
                Provider::WhatsApp(ref whatsapp) if whatsapp.phone_number_id == "1234"
            ));
            Ok(())
        })
    }

    #[test]
    fn rejects_unknown_locale_and_provider() {
        with_cleared_provider_env(|| {
            let matches =
                command().get_matches_from(vec!["karamsaathi", "--sms-locale", "fr"]);
            assert!(Options::parse(&matches).is_err());

            let result =
                command().try_get_matches_from(vec!["karamsaathi", "--sms-provider", "pigeon"]);
            assert_eq!(
                result.map_err(|e| e.kind()),
                Err(clap::error::ErrorKind::InvalidValue)
            );
        });
    }
}
