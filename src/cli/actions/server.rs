use crate::{
    api,
    cli::{commands::delivery::Provider, globals::GlobalArgs},
    i18n::Locale,
    otp::{
        delivery::{CodeSender, DeliveryRouter, LogCodeSender, TwilioSmsSender, WhatsAppSender},
        OtpConfig,
    },
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::{sync::Arc, time::Duration};
use tracing::{debug, info};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: Option<String>,
    pub frontend_base_url: String,
    pub otp_config: OtpConfig,
    pub otp_purge_interval_seconds: u64,
    pub otp_code_pepper: SecretString,
    pub session_secret: SecretString,
    pub session_ttl_seconds: i64,
    pub session_issuer: String,
    pub sms_provider: Provider,
    pub sms_locale: Locale,
}

/// Execute the server action.
/// # Errors
/// Returns an error if a delivery client cannot be built or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    debug!("server args: {:?}", args);

    let globals = GlobalArgs::new(args.otp_code_pepper, args.session_secret);

    let sender = code_sender(args.sms_provider, args.sms_locale)?;

    let server_config = api::ServerConfig {
        frontend_base_url: args.frontend_base_url,
        session_issuer: args.session_issuer,
        session_ttl_seconds: args.session_ttl_seconds,
        purge_interval: Duration::from_secs(args.otp_purge_interval_seconds),
    };

    api::new(
        args.port,
        args.dsn,
        &globals,
        args.otp_config,
        server_config,
        sender,
    )
    .await
}

/// Build the delivery chain for the configured provider.
///
/// Email addresses are only deliverable with the `log` provider.
///
/// # Errors
/// Returns an error if an HTTP client cannot be built.
pub fn code_sender(provider: Provider, locale: Locale) -> Result<Arc<dyn CodeSender>> {
    let router = match provider {
        Provider::Log => {
            info!("Delivering codes to the log; do not use in production");
            let log: Arc<dyn CodeSender> = Arc::new(LogCodeSender);
            DeliveryRouter::new(log.clone()).with_email(log)
        }
        Provider::Twilio(options) => {
            info!("Delivering codes by SMS through Twilio");
            let twilio = TwilioSmsSender::new(options)
                .context("Failed to build Twilio client")?
                .with_locale(locale);
            DeliveryRouter::new(Arc::new(twilio))
        }
        Provider::WhatsApp(options) => {
            info!("Delivering codes through WhatsApp");
            let whatsapp = WhatsAppSender::new(options)
                .context("Failed to build WhatsApp client")?
                .with_locale(locale);
            DeliveryRouter::new(Arc::new(whatsapp))
        }
    };

    Ok(Arc::new(router))
}
