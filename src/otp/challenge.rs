//! Challenge records and the rules that govern their lifecycle.
//!
//! A challenge is keyed by `(identifier, purpose)`; at most one record exists
//! per key and every issuance replaces it. Terminal records are kept until the
//! purge worker sweeps them so resend accounting survives expiry.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::{config::OtpConfig, error::OtpError, identifier::Identifier, purpose::Purpose};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChallengeKey {
    identifier: String,
    purpose: Purpose,
}

impl ChallengeKey {
    #[must_use]
    pub fn new(identifier: &Identifier, purpose: Purpose) -> Self {
        Self {
            identifier: identifier.as_str().to_string(),
            purpose,
        }
    }

    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    #[must_use]
    pub fn purpose(&self) -> Purpose {
        self.purpose
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeState {
    Pending,
    Verified,
    Expired,
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpChallenge {
    pub identifier: String,
    pub purpose: Purpose,
    pub challenge_id: Uuid,
    pub code_hash: Vec<u8>,
    pub salt: Vec<u8>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub attempt_count: u32,
    pub resend_count: u32,
    pub last_issued_at: DateTime<Utc>,
    pub window_ends_at: DateTime<Utc>,
    pub consumed: bool,
    pub version: i64,
}

/// Resend accounting carried into the next issuance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssueWindow {
    pub resend_count: u32,
    pub window_ends_at: DateTime<Utc>,
}

/// Hashed code material for a new issuance.
#[derive(Debug, Clone)]
pub struct IssuedCode {
    pub code_hash: Vec<u8>,
    pub salt: Vec<u8>,
}

impl OtpChallenge {
    /// Build the record for a fresh issuance, replacing `previous` if any.
    #[must_use]
    pub fn issue(
        key: &ChallengeKey,
        code: IssuedCode,
        window: IssueWindow,
        now: DateTime<Utc>,
        ttl: Duration,
        previous: Option<&OtpChallenge>,
    ) -> Self {
        Self {
            identifier: key.identifier().to_string(),
            purpose: key.purpose(),
            challenge_id: Uuid::new_v4(),
            code_hash: code.code_hash,
            salt: code.salt,
            issued_at: now,
            expires_at: now + ttl,
            attempt_count: 0,
            resend_count: window.resend_count,
            last_issued_at: now,
            window_ends_at: window.window_ends_at,
            consumed: false,
            version: previous.map_or(1, |prev| prev.version + 1),
        }
    }

    #[must_use]
    pub fn key(&self) -> ChallengeKey {
        ChallengeKey {
            identifier: self.identifier.clone(),
            purpose: self.purpose,
        }
    }

    /// Expiry is checked first: past `expires_at` every record reads as expired.
    #[must_use]
    pub fn state(&self, now: DateTime<Utc>, max_attempts: u32) -> ChallengeState {
        if now > self.expires_at {
            ChallengeState::Expired
        } else if self.consumed {
            ChallengeState::Verified
        } else if self.attempt_count >= max_attempts {
            ChallengeState::Exhausted
        } else {
            ChallengeState::Pending
        }
    }

    #[must_use]
    pub fn attempts_remaining(&self, max_attempts: u32) -> u32 {
        max_attempts.saturating_sub(self.attempt_count)
    }

    /// Instant after which the record carries no information and may be deleted.
    #[must_use]
    pub fn purgeable_after(&self) -> DateTime<Utc> {
        self.expires_at.max(self.window_ends_at)
    }

    /// Next version after applying a mutation.
    #[must_use]
    pub fn bumped(mut self) -> Self {
        self.version += 1;
        self
    }
}

/// Apply resend throttling against the record currently stored for the key.
///
/// The minimum interval guards any unexpired challenge that was not consumed,
/// exhausted ones included; the per-window cap applies to any record whose
/// window is still open.
///
/// # Errors
/// Returns `OtpError::RateLimited` with the seconds until a new issuance is allowed.
pub fn next_issue_window(
    previous: Option<&OtpChallenge>,
    now: DateTime<Utc>,
    config: &OtpConfig,
) -> Result<IssueWindow, OtpError> {
    let fresh = IssueWindow {
        resend_count: 1,
        window_ends_at: now + config.resend_window(),
    };

    let Some(previous) = previous else {
        return Ok(fresh);
    };

    if now <= previous.expires_at && !previous.consumed {
        let next_allowed = previous.last_issued_at + config.min_resend_interval();
        if now < next_allowed {
            return Err(OtpError::RateLimited {
                retry_after_seconds: ceil_seconds(next_allowed - now),
            });
        }
    }

    if now < previous.window_ends_at {
        if previous.resend_count >= config.max_resends_per_window() {
            return Err(OtpError::RateLimited {
                retry_after_seconds: ceil_seconds(previous.window_ends_at - now),
            });
        }
        return Ok(IssueWindow {
            resend_count: previous.resend_count + 1,
            window_ends_at: previous.window_ends_at,
        });
    }

    Ok(fresh)
}

/// Whole seconds, rounded up, never zero.
#[must_use]
pub fn ceil_seconds(duration: Duration) -> u64 {
    let millis = duration.num_milliseconds().max(0);
    u64::try_from((millis + 999) / 1000).unwrap_or(0).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> ChallengeKey {
        ChallengeKey {
            identifier: "+919876543210".to_string(),
            purpose: Purpose::Login,
        }
    }

    fn issued(now: DateTime<Utc>, config: &OtpConfig, previous: Option<&OtpChallenge>) -> OtpChallenge {
        let window = IssueWindow {
            resend_count: 1,
            window_ends_at: now + config.resend_window(),
        };
        OtpChallenge::issue(
            &key(),
            IssuedCode {
                code_hash: vec![1, 2, 3],
                salt: vec![4, 5, 6],
            },
            window,
            now,
            config.ttl(),
            previous,
        )
    }

    #[test]
    fn issue_sets_expiry_and_resets_attempts() {
        let config = OtpConfig::new();
        let now = Utc::now();
        let first = issued(now, &config, None);
        assert_eq!(first.expires_at, now + Duration::seconds(300));
        assert_eq!(first.attempt_count, 0);
        assert_eq!(first.version, 1);
        assert_eq!(first.key(), key());

        let mut used = first.clone();
        used.attempt_count = 3;
        let second = issued(now, &config, Some(&used));
        assert_eq!(second.attempt_count, 0);
        assert_eq!(second.version, 2);
        assert_ne!(second.challenge_id, first.challenge_id);
    }

    #[test]
    fn state_is_derived_from_the_record() {
        let config = OtpConfig::new();
        let now = Utc::now();
        let mut challenge = issued(now, &config, None);
        assert_eq!(challenge.state(now, 5), ChallengeState::Pending);
        assert_eq!(challenge.state(challenge.expires_at, 5), ChallengeState::Pending);
        assert_eq!(
            challenge.state(challenge.expires_at + Duration::seconds(1), 5),
            ChallengeState::Expired
        );

        challenge.attempt_count = 5;
        assert_eq!(challenge.state(now, 5), ChallengeState::Exhausted);
        assert_eq!(challenge.attempts_remaining(5), 0);

        challenge.consumed = true;
        assert_eq!(challenge.state(now, 5), ChallengeState::Verified);
        assert_eq!(
            challenge.state(now + Duration::hours(1), 5),
            ChallengeState::Expired
        );
    }

    #[test]
    fn min_interval_blocks_quick_resend() {
        let config = OtpConfig::new();
        let now = Utc::now();
        let previous = issued(now, &config, None);

        let result = next_issue_window(Some(&previous), now + Duration::seconds(10), &config);
        assert_eq!(
            result,
            Err(OtpError::RateLimited {
                retry_after_seconds: 20
            })
        );

        let window = next_issue_window(Some(&previous), now + Duration::seconds(30), &config);
        assert_eq!(
            window,
            Ok(IssueWindow {
                resend_count: 2,
                window_ends_at: previous.window_ends_at,
            })
        );
    }

    #[test]
    fn exhausted_challenge_still_waits_for_min_interval() {
        let config = OtpConfig::new();
        let now = Utc::now();
        let mut previous = issued(now, &config, None);
        previous.attempt_count = config.max_attempts();

        let result = next_issue_window(Some(&previous), now + Duration::seconds(5), &config);
        assert_eq!(
            result,
            Err(OtpError::RateLimited {
                retry_after_seconds: 25
            })
        );
    }

    #[test]
    fn consumed_challenge_skips_min_interval() {
        let config = OtpConfig::new();
        let now = Utc::now();
        let mut previous = issued(now, &config, None);
        previous.consumed = true;

        let window = next_issue_window(Some(&previous), now + Duration::seconds(1), &config);
        assert_eq!(window.map(|window| window.resend_count), Ok(2));
    }

    #[test]
    fn window_cap_applies_even_after_expiry() {
        let config = OtpConfig::new();
        let now = Utc::now();
        let mut previous = issued(now, &config, None);
        previous.resend_count = 5;

        let later = previous.expires_at + Duration::seconds(60);
        let result = next_issue_window(Some(&previous), later, &config);
        assert_eq!(
            result,
            Err(OtpError::RateLimited {
                retry_after_seconds: ceil_seconds(previous.window_ends_at - later)
            })
        );

        let reopened = next_issue_window(Some(&previous), previous.window_ends_at, &config);
        assert_eq!(reopened.map(|window| window.resend_count), Ok(1));
    }

    #[test]
    fn ceil_seconds_rounds_up() {
        assert_eq!(ceil_seconds(Duration::milliseconds(1)), 1);
        assert_eq!(ceil_seconds(Duration::milliseconds(1001)), 2);
        assert_eq!(ceil_seconds(Duration::seconds(30)), 30);
        assert_eq!(ceil_seconds(Duration::seconds(-5)), 1);
    }
}
