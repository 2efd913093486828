//! Code delivery channels.
//!
//! Senders never fail the protocol by themselves: they report a
//! `DeliveryResult` and the service decides what the caller sees.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use std::{collections::HashMap, sync::Arc};
use tracing::{debug, error, info, instrument};
use url::Url;

use super::{
    identifier::{Identifier, IdentifierKind},
    purpose::Purpose,
};
use crate::i18n::{self, Locale};

const TWILIO_API_BASE: &str = "https://api.twilio.com";
const WHATSAPP_API_BASE: &str = "https://graph.facebook.com";
const WHATSAPP_API_VERSION: &str = "v19.0";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryResult {
    pub ok: bool,
    pub provider_error: Option<String>,
}

impl DeliveryResult {
    #[must_use]
    pub fn delivered() -> Self {
        Self {
            ok: true,
            provider_error: None,
        }
    }

    #[must_use]
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            provider_error: Some(reason.into()),
        }
    }
}

#[async_trait]
pub trait CodeSender: Send + Sync {
    async fn send(&self, identifier: &Identifier, code: &str, purpose: Purpose) -> DeliveryResult;
}

/// Writes codes to the log instead of sending them. Local development only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogCodeSender;

#[async_trait]
impl CodeSender for LogCodeSender {
    async fn send(&self, identifier: &Identifier, code: &str, purpose: Purpose) -> DeliveryResult {
        info!(
            identifier = %identifier.redacted(),
            purpose = %purpose,
            "One-time code issued (log delivery)"
        );
        debug!(identifier = %identifier, purpose = %purpose, code, "One-time code");
        DeliveryResult::delivered()
    }
}

fn http_client() -> Result<Client> {
    Ok(Client::builder()
        .user_agent(crate::APP_USER_AGENT)
        .build()?)
}

fn endpoint_url(base: &str, path: &str) -> Result<Url> {
    let url = Url::parse(base).with_context(|| format!("invalid provider URL: {base}"))?;
    url.join(path)
        .with_context(|| format!("invalid provider path: {path}"))
}

#[derive(Clone, Debug)]
pub struct TwilioOptions {
    pub account_sid: String,
    pub auth_token: SecretString,
    pub from_number: String,
}

/// SMS through the Twilio Messages API.
#[derive(Clone, Debug)]
pub struct TwilioSmsSender {
    options: TwilioOptions,
    base_url: String,
    locale: Locale,
    client: Client,
}

impl TwilioSmsSender {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(options: TwilioOptions) -> Result<Self> {
        Ok(Self {
            options,
            base_url: TWILIO_API_BASE.to_string(),
            locale: Locale::default(),
            client: http_client()?,
        })
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }

    async fn deliver(&self, identifier: &Identifier, code: &str) -> Result<()> {
        let url = endpoint_url(
            &self.base_url,
            &format!(
                "/2010-04-01/Accounts/{}/Messages.json",
                self.options.account_sid
            ),
        )?;

        let mut form = HashMap::new();
        form.insert("To", identifier.as_str().to_string());
        form.insert("From", self.options.from_number.clone());
        form.insert("Body", i18n::code_message(self.locale, code));

        let response = self
            .client
            .post(url.as_str())
            .basic_auth(
                &self.options.account_sid,
                Some(self.options.auth_token.expose_secret()),
            )
            .form(&form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body: Value = response.json().await.unwrap_or_default();
            let message = body["message"].as_str().unwrap_or_default();
            return Err(anyhow!("twilio returned {status}: {message}"));
        }
        Ok(())
    }
}

#[async_trait]
impl CodeSender for TwilioSmsSender {
    #[instrument(
        skip(self, identifier, code, _purpose),
        fields(identifier = %identifier.redacted(), purpose = %_purpose)
    )]
    async fn send(&self, identifier: &Identifier, code: &str, _purpose: Purpose) -> DeliveryResult {
        match self.deliver(identifier, code).await {
            Ok(()) => DeliveryResult::delivered(),
            Err(err) => {
                error!("SMS delivery failed: {err}");
                DeliveryResult::failed(err.to_string())
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct WhatsAppOptions {
    pub access_token: SecretString,
    pub phone_number_id: String,
}

/// Text message through the WhatsApp Cloud API.
#[derive(Clone, Debug)]
pub struct WhatsAppSender {
    options: WhatsAppOptions,
    base_url: String,
    locale: Locale,
    client: Client,
}

impl WhatsAppSender {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(options: WhatsAppOptions) -> Result<Self> {
        Ok(Self {
            options,
            base_url: WHATSAPP_API_BASE.to_string(),
            locale: Locale::default(),
            client: http_client()?,
        })
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }

    async fn deliver(&self, identifier: &Identifier, code: &str) -> Result<()> {
        let url = endpoint_url(
            &self.base_url,
            &format!(
                "/{WHATSAPP_API_VERSION}/{}/messages",
                self.options.phone_number_id
            ),
        )?;

        // WhatsApp expects the number without the leading plus.
        let payload = json!({
            "messaging_product": "whatsapp",
            "to": identifier.as_str().trim_start_matches('+'),
            "type": "text",
            "text": { "body": i18n::code_message(self.locale, code) },
        });

        let response = self
            .client
            .post(url.as_str())
            .bearer_auth(self.options.access_token.expose_secret())
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body: Value = response.json().await.unwrap_or_default();
            let message = body["error"]["message"].as_str().unwrap_or_default();
            return Err(anyhow!("whatsapp returned {status}: {message}"));
        }
        Ok(())
    }
}

#[async_trait]
impl CodeSender for WhatsAppSender {
    #[instrument(
        skip(self, identifier, code, _purpose),
        fields(identifier = %identifier.redacted(), purpose = %_purpose)
    )]
    async fn send(&self, identifier: &Identifier, code: &str, _purpose: Purpose) -> DeliveryResult {
        match self.deliver(identifier, code).await {
            Ok(()) => DeliveryResult::delivered(),
            Err(err) => {
                error!("WhatsApp delivery failed: {err}");
                DeliveryResult::failed(err.to_string())
            }
        }
    }
}

/// Routes phone numbers and email addresses to their configured sender.
#[derive(Clone)]
pub struct DeliveryRouter {
    phone: Arc<dyn CodeSender>,
    email: Option<Arc<dyn CodeSender>>,
}

impl DeliveryRouter {
    #[must_use]
    pub fn new(phone: Arc<dyn CodeSender>) -> Self {
        Self { phone, email: None }
    }

    #[must_use]
    pub fn with_email(mut self, email: Arc<dyn CodeSender>) -> Self {
        self.email = Some(email);
        self
    }
}

#[async_trait]
impl CodeSender for DeliveryRouter {
    async fn send(&self, identifier: &Identifier, code: &str, purpose: Purpose) -> DeliveryResult {
        match identifier.kind() {
            IdentifierKind::Phone => self.phone.send(identifier, code, purpose).await,
            IdentifierKind::Email => match &self.email {
                Some(sender) => sender.send(identifier, code, purpose).await,
                None => DeliveryResult::failed("email delivery is not configured"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::{Path, State},
        http::{HeaderMap, StatusCode},
        routing::post,
        Form, Json, Router,
    };
    use tokio::sync::Mutex;

    type Captured = Arc<Mutex<Vec<(String, String)>>>;

    async fn serve(router: Router) -> anyhow::Result<String> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        Ok(format!("http://{addr}"))
    }

    async fn twilio_messages(
        State(captured): State<Captured>,
        Path(sid): Path<String>,
        headers: HeaderMap,
        Form(form): Form<HashMap<String, String>>,
    ) -> (StatusCode, Json<Value>) {
        if sid != "AC123" || !headers.contains_key("authorization") {
            return (StatusCode::UNAUTHORIZED, Json(json!({"message": "bad auth"})));
        }
        let to = form.get("To").cloned().unwrap_or_default();
        let body = form.get("Body").cloned().unwrap_or_default();
        captured.lock().await.push((to, body));
        (StatusCode::CREATED, Json(json!({"sid": "SM1"})))
    }

    fn phone() -> anyhow::Result<Identifier> {
        Identifier::parse("+919876543210").map_err(|err| anyhow!(err))
    }

    #[tokio::test]
    async fn twilio_sender_posts_form() -> anyhow::Result<()> {
        let captured: Captured = Arc::default();
        let router = Router::new()
            .route(
                "/2010-04-01/Accounts/:sid/Messages.json",
                post(twilio_messages),
            )
            .with_state(captured.clone());
        let base = serve(router).await?;

        let sender = TwilioSmsSender::new(TwilioOptions {
            account_sid: "AC123".to_string(),
            auth_token: SecretString::from("token".to_string()),
            from_number: "+15005550006".to_string(),
        })?
        .with_base_url(base)
        .with_locale(Locale::Hi);

        let result = sender.send(&phone()?, "123456", Purpose::Login).await;
        assert_eq!(result, DeliveryResult::delivered());

        let captured = captured.lock().await;
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].0, "+919876543210");
        assert!(captured[0].1.contains("123456"));
        Ok(())
    }

    #[tokio::test]
    async fn twilio_sender_reports_provider_error() -> anyhow::Result<()> {
        let captured: Captured = Arc::default();
        let router = Router::new()
            .route(
                "/2010-04-01/Accounts/:sid/Messages.json",
                post(twilio_messages),
            )
            .with_state(captured);
        let base = serve(router).await?;

        let sender = TwilioSmsSender::new(TwilioOptions {
            account_sid: "ACwrong".to_string(),
            auth_token: SecretString::from("token".to_string()),
            from_number: "+15005550006".to_string(),
        })?
        .with_base_url(base);

        let result = sender.send(&phone()?, "123456", Purpose::Login).await;
        assert!(!result.ok);
        assert!(result
            .provider_error
            .is_some_and(|reason| reason.contains("bad auth")));
        Ok(())
    }

    #[tokio::test]
    async fn whatsapp_sender_posts_json_without_plus() -> anyhow::Result<()> {
        let captured: Captured = Arc::default();
        let router = Router::new()
            .route(
                "/v19.0/:phone_id/messages",
                post(
                    |State(captured): State<Captured>, Json(body): Json<Value>| async move {
                        let to = body["to"].as_str().unwrap_or_default().to_string();
                        let text = body["text"]["body"].as_str().unwrap_or_default().to_string();
                        captured.lock().await.push((to, text));
                        Json(json!({"messages": [{"id": "wamid.1"}]}))
                    },
                ),
            )
            .with_state(captured.clone());
        let base = serve(router).await?;

        let sender = WhatsAppSender::new(WhatsAppOptions {
            access_token: SecretString::from("token".to_string()),
            phone_number_id: "1055".to_string(),
        })?
        .with_base_url(base);

        let result = sender.send(&phone()?, "654321", Purpose::Register).await;
        assert!(result.ok);
        let captured = captured.lock().await;
        assert_eq!(captured[0].0, "919876543210");
        assert!(captured[0].1.contains("654321"));
        Ok(())
    }

    #[tokio::test]
    async fn router_fails_email_without_sender() -> anyhow::Result<()> {
        let router = DeliveryRouter::new(Arc::new(LogCodeSender));
        let email = Identifier::parse("user@example.com").map_err(|err| anyhow!(err))?;
        let result = router.send(&email, "123456", Purpose::Login).await;
        assert!(!result.ok);

        let router = router.with_email(Arc::new(LogCodeSender));
        assert!(router.send(&email, "123456", Purpose::Login).await.ok);
        assert!(router.send(&phone()?, "123456", Purpose::Login).await.ok);
        Ok(())
    }
}
