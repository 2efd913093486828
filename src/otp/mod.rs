//! One-time code authentication core.
//!
//! Challenges live in a [`store::ChallengeStore`], codes leave through a
//! [`delivery::CodeSender`], and a successful verification goes through an
//! [`identity::IdentityStore`] and a [`session::SessionIssuer`].

pub mod challenge;
pub mod clock;
pub mod code;
pub mod config;
pub mod delivery;
pub mod error;
pub mod identifier;
pub mod identity;
pub mod purpose;
pub mod service;
pub mod session;
pub mod store;

pub use config::OtpConfig;
pub use error::{OtpError, StoreError};
pub use identifier::Identifier;
pub use purpose::Purpose;
pub use service::{CodeRequested, OtpService, VerifiedSession};

/// Postgres schema, applied idempotently at startup.
pub const SCHEMA_SQL: &str = include_str!("../../db/sql/01_karamsaathi.sql");
