//! Request/verify protocol over the challenge store.
//!
//! Both operations are optimistic read-modify-write loops: load the record,
//! decide, then save with the version that was read. A lost race reloads and
//! decides again, so at most one verification can consume a challenge.
//! Store failures are retried with exponential backoff and jitter before they
//! surface as `OtpError::Unavailable`.

use chrono::{DateTime, Utc};
use rand::Rng;
use std::{future::Future, sync::Arc, time::Duration};
use tokio::{task::JoinHandle, time::sleep};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::{
    challenge::{next_issue_window, ChallengeKey, ChallengeState, IssuedCode, OtpChallenge},
    clock::{Clock, SystemClock},
    code::{generate_code, generate_salt, valid_code_format, CodeHasher},
    config::OtpConfig,
    delivery::{CodeSender, DeliveryResult},
    error::{OtpError, StoreError},
    identifier::Identifier,
    identity::{Identity, IdentityStore},
    purpose::Purpose,
    session::{SessionIssuer, SessionToken},
    store::ChallengeStore,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeRequested {
    pub challenge_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedSession {
    pub session: SessionToken,
    pub identity: Identity,
}

/// Outcome of one read-modify-write round.
enum Step {
    Store(StoreError),
    Reject(OtpError),
}

impl From<StoreError> for Step {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl From<OtpError> for Step {
    fn from(err: OtpError) -> Self {
        Self::Reject(err)
    }
}

#[derive(Clone)]
pub struct OtpService {
    config: OtpConfig,
    hasher: CodeHasher,
    store: Arc<dyn ChallengeStore>,
    sender: Arc<dyn CodeSender>,
    identities: Arc<dyn IdentityStore>,
    sessions: Arc<dyn SessionIssuer>,
    clock: Arc<dyn Clock>,
}

impl OtpService {
    #[must_use]
    pub fn new(
        config: OtpConfig,
        hasher: CodeHasher,
        store: Arc<dyn ChallengeStore>,
        sender: Arc<dyn CodeSender>,
        identities: Arc<dyn IdentityStore>,
        sessions: Arc<dyn SessionIssuer>,
    ) -> Self {
        Self {
            config: config.normalize(),
            hasher,
            store,
            sender,
            identities,
            sessions,
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn config(&self) -> &OtpConfig {
        &self.config
    }

    /// # Errors
    /// Returns the store error when the backend cannot be reached.
    pub async fn ping(&self) -> Result<(), StoreError> {
        self.store.ping().await
    }

    /// Issue a fresh code for `(identifier, purpose)` and hand it to the sender.
    ///
    /// # Errors
    /// `InvalidIdentifierFormat`, `RateLimited`, `DeliveryFailed` (the
    /// challenge stays verifiable), or `Unavailable` when the store keeps failing.
    pub async fn request_code(
        &self,
        raw_identifier: &str,
        purpose: Purpose,
    ) -> Result<CodeRequested, OtpError> {
        let identifier = Identifier::parse(raw_identifier)?;
        let key = ChallengeKey::new(&identifier, purpose);

        let code = generate_code(self.config.code_length())
            .map_err(|err| internal("failed to generate code", &err))?;
        let salt = generate_salt().map_err(|err| internal("failed to generate salt", &err))?;
        let code_hash = self
            .hasher
            .hash(&salt, &identifier, purpose, &code)
            .map_err(|err| internal("failed to hash code", &err))?;
        let issued_code = IssuedCode { code_hash, salt };

        let store = self.store.as_ref();
        let clock = self.clock.as_ref();
        let config = &self.config;
        let key_ref = &key;
        let issued_ref = &issued_code;
        let challenge = self
            .with_store_retries("request_code", || async move {
                let previous = store.load(key_ref).await?;
                let now = clock.now();
                let window = next_issue_window(previous.as_ref(), now, config)?;
                let challenge = OtpChallenge::issue(
                    key_ref,
                    issued_ref.clone(),
                    window,
                    now,
                    config.ttl(),
                    previous.as_ref(),
                );
                store
                    .save(&challenge, previous.as_ref().map(|prev| prev.version))
                    .await?;
                Ok::<_, Step>(challenge)
            })
            .await
            .inspect_err(|err| {
                if let OtpError::RateLimited {
                    retry_after_seconds,
                } = err
                {
                    debug!(
                        identifier = %identifier.redacted(),
                        %purpose,
                        retry_after_seconds,
                        "Code request throttled"
                    );
                }
            })?;

        info!(
            identifier = %identifier.redacted(),
            %purpose,
            challenge_id = %challenge.challenge_id,
            resend_count = challenge.resend_count,
            "One-time code issued"
        );

        let requested = CodeRequested {
            challenge_id: challenge.challenge_id,
            expires_at: challenge.expires_at,
        };

        let delivery = self.dispatch(identifier, code, key, challenge.challenge_id);
        match tokio::time::timeout(self.config.delivery_timeout(), delivery).await {
            Ok(Ok(result)) if result.ok => Ok(requested),
            Ok(Ok(result)) => Err(OtpError::DeliveryFailed {
                challenge_id: requested.challenge_id,
                expires_at: requested.expires_at,
                reason: result
                    .provider_error
                    .unwrap_or_else(|| "provider rejected the message".to_string()),
            }),
            Ok(Err(err)) => {
                error!("delivery task failed: {err}");
                Err(OtpError::DeliveryFailed {
                    challenge_id: requested.challenge_id,
                    expires_at: requested.expires_at,
                    reason: "delivery task failed".to_string(),
                })
            }
            Err(_) => {
                warn!(
                    challenge_id = %requested.challenge_id,
                    timeout_seconds = self.config.delivery_timeout().as_secs(),
                    "Delivery still pending after timeout"
                );
                Ok(requested)
            }
        }
    }

    /// Check a submitted code and, on success, find or create the identity and
    /// issue a session.
    ///
    /// # Errors
    /// `InvalidIdentifierFormat`, `InvalidCodeFormat`, `NotFound`, `Expired`,
    /// `AlreadyUsed`, `TooManyAttempts`, `InvalidCode`, or `Unavailable`.
    pub async fn verify_code(
        &self,
        raw_identifier: &str,
        purpose: Purpose,
        submitted_code: &str,
    ) -> Result<VerifiedSession, OtpError> {
        let identifier = Identifier::parse(raw_identifier)?;
        let submitted_code = submitted_code.trim();
        if !valid_code_format(submitted_code, self.config.code_length()) {
            return Err(OtpError::InvalidCodeFormat);
        }
        let key = ChallengeKey::new(&identifier, purpose);

        let store = self.store.as_ref();
        let clock = self.clock.as_ref();
        let hasher = &self.hasher;
        let max_attempts = self.config.max_attempts();
        let key_ref = &key;
        let identifier_ref = &identifier;
        let updated = self
            .with_store_retries("verify_code", || async move {
                let Some(challenge) = store.load(key_ref).await? else {
                    return Err(Step::Reject(OtpError::NotFound));
                };
                match challenge.state(clock.now(), max_attempts) {
                    ChallengeState::Expired => return Err(Step::Reject(OtpError::Expired)),
                    ChallengeState::Verified => return Err(Step::Reject(OtpError::AlreadyUsed)),
                    ChallengeState::Exhausted => {
                        return Err(Step::Reject(OtpError::TooManyAttempts))
                    }
                    ChallengeState::Pending => {}
                }

                let matched = hasher.verify(
                    &challenge.salt,
                    identifier_ref,
                    purpose,
                    submitted_code,
                    &challenge.code_hash,
                );
                let expected = challenge.version;
                let mut updated = challenge.bumped();
                if matched {
                    updated.consumed = true;
                } else {
                    updated.attempt_count += 1;
                }
                store.save(&updated, Some(expected)).await?;
                Ok::<_, Step>(updated)
            })
            .await?;

        if !updated.consumed {
            let attempts_remaining = updated.attempts_remaining(max_attempts);
            debug!(
                identifier = %identifier.redacted(),
                %purpose,
                attempts_remaining,
                "Invalid code submitted"
            );
            return Err(OtpError::InvalidCode { attempts_remaining });
        }

        let identity = self
            .identities
            .find_or_create_by_identifier(&identifier)
            .await
            .map_err(|err| internal("identity lookup failed", &err))?;
        let session = self
            .sessions
            .issue(&identity)
            .await
            .map_err(|err| internal("session issue failed", &err))?;

        info!(
            identifier = %identifier.redacted(),
            %purpose,
            challenge_id = %updated.challenge_id,
            user_id = %identity.id,
            "Challenge verified"
        );

        Ok(VerifiedSession { session, identity })
    }

    /// Periodically delete challenges that are past both expiry and resend window.
    #[must_use]
    pub fn spawn_purge_worker(&self, interval: Duration) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let clock = Arc::clone(&self.clock);
        tokio::spawn(async move {
            loop {
                sleep(interval).await;
                match store.purge(clock.now()).await {
                    Ok(0) => {}
                    Ok(purged) => debug!(purged, "Purged dead challenges"),
                    Err(err) => error!("challenge purge failed: {err}"),
                }
            }
        })
    }

    /// Send on a detached task; the caller bounds how long it waits.
    fn dispatch(
        &self,
        identifier: Identifier,
        code: String,
        key: ChallengeKey,
        challenge_id: Uuid,
    ) -> JoinHandle<DeliveryResult> {
        let sender = Arc::clone(&self.sender);
        let purpose = key.purpose();
        let span = info_span!(
            "otp.delivery",
            identifier = %identifier.redacted(),
            %purpose,
            %challenge_id
        );
        tokio::spawn(
            async move {
                let result = sender.send(&identifier, &code, purpose).await;
                if result.ok {
                    info!("One-time code delivered");
                } else {
                    warn!(
                        reason = result.provider_error.as_deref().unwrap_or_default(),
                        "One-time code delivery failed"
                    );
                }
                result
            }
            .instrument(span),
        )
    }

    async fn with_store_retries<T, F, Fut>(
        &self,
        operation: &'static str,
        mut step: F,
    ) -> Result<T, OtpError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Step>>,
    {
        let attempts = self.config.store_retry_attempts();
        let mut attempt = 1;
        loop {
            match step().await {
                Ok(value) => return Ok(value),
                Err(Step::Reject(err)) => return Err(err),
                Err(Step::Store(err)) => {
                    if attempt >= attempts {
                        error!(operation, attempts, "challenge store gave up: {err}");
                        return Err(OtpError::Unavailable);
                    }
                    match err {
                        StoreError::Conflict => debug!(operation, attempt, "challenge version conflict"),
                        StoreError::Backend(err) => {
                            warn!(operation, attempt, "challenge store error: {err}");
                        }
                    }
                    sleep(backoff_delay(
                        attempt,
                        self.config.store_retry_base(),
                        self.config.store_retry_max(),
                    ))
                    .await;
                    attempt += 1;
                }
            }
        }
    }
}

impl std::fmt::Debug for OtpService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OtpService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn internal(context: &str, err: &dyn std::fmt::Display) -> OtpError {
    error!("{context}: {err}");
    OtpError::Unavailable
}

fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let shift = attempt.saturating_sub(1).min(31);
    let factor = 1u32 << shift;
    let delay = base.checked_mul(factor).unwrap_or(max);
    let capped = if delay > max { max } else { delay };
    jitter_delay(capped)
}

fn jitter_delay(delay: Duration) -> Duration {
    let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
    if delay_ms < 2 {
        return delay;
    }
    let half = delay_ms / 2;
    let jitter = rand::thread_rng().gen_range(0..=half);
    Duration::from_millis(half + jitter)
}
