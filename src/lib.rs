//! # KaramSaathi (One-Time Code Authentication)
//!
//! `karamsaathi` authenticates workers and employers of the KaramSaathi job
//! marketplace by proving possession of a phone number or email address.
//!
//! ## Flow
//!
//! 1. `POST /v1/auth/otp/request` issues a numeric code for an
//!    `(identifier, purpose)` pair and hands it to a delivery channel
//!    (SMS, WhatsApp, or email).
//! 2. `POST /v1/auth/otp/verify` checks the submitted code. On success the
//!    identity is found or created and a signed session token is returned.
//!
//! ## Challenge Rules
//!
//! - **Scoped codes:** a code issued for `login` cannot satisfy `register`
//!   or `phone_change`.
//! - **Hashed at rest:** only a salted HMAC of the code is stored.
//! - **Single use:** a challenge yields at most one successful verification,
//!   even under concurrent requests (compare-and-set on a record version).
//! - **Throttled:** a minimum interval between issuances and a cap on
//!   issuances per window protect the delivery providers and the user.
//!
//! User-facing error messages are localized for English, Hindi, Marathi, and Tamil.

pub mod api;
pub mod cli;
pub mod i18n;
pub mod otp;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
