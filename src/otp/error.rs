use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Outcome errors of the request/verify protocol. None of them is fatal to
/// the service; each leaves it ready for the next call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OtpError {
    #[error("Rate limited: retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },
    #[error("Code delivery failed: {reason}")]
    DeliveryFailed {
        challenge_id: Uuid,
        expires_at: DateTime<Utc>,
        reason: String,
    },
    #[error("No active challenge")]
    NotFound,
    #[error("Challenge expired")]
    Expired,
    #[error("Challenge already used")]
    AlreadyUsed,
    #[error("Too many verification attempts")]
    TooManyAttempts,
    #[error("Invalid code: {attempts_remaining} attempts remaining")]
    InvalidCode { attempts_remaining: u32 },
    #[error("Invalid identifier format")]
    InvalidIdentifierFormat,
    #[error("Invalid code format")]
    InvalidCodeFormat,
    #[error("Service unavailable")]
    Unavailable,
}

impl OtpError {
    /// Stable machine-readable code used in API error bodies.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "rate_limited",
            Self::DeliveryFailed { .. } => "delivery_failed",
            Self::NotFound => "not_found",
            Self::Expired => "expired",
            Self::AlreadyUsed => "already_used",
            Self::TooManyAttempts => "too_many_attempts",
            Self::InvalidCode { .. } => "invalid_code",
            Self::InvalidIdentifierFormat => "invalid_identifier_format",
            Self::InvalidCodeFormat => "invalid_code_format",
            Self::Unavailable => "unavailable",
        }
    }
}

/// Challenge store failures. `Conflict` means another writer updated the
/// record first; both variants are retried by the service.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("challenge version conflict")]
    Conflict,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}
