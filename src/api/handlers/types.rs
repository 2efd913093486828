//! Request/response types for the OTP endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::otp::{identity::Identity, Purpose};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CodeRequest {
    /// Phone number (E.164 or a 10-digit Indian mobile number) or email address.
    pub identifier: String,
    pub purpose: Purpose,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CodeRequestResponse {
    pub challenge_id: String,
    /// RFC 3339 timestamp.
    pub expires_at: String,
    pub expires_in_seconds: i64,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyRequest {
    pub identifier: String,
    pub purpose: Purpose,
    pub code: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyResponse {
    pub session_token: String,
    /// RFC 3339 timestamp.
    pub session_expires_at: String,
    pub identity: Identity,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct ErrorBody {
    /// Stable machine-readable error code.
    pub error: String,
    /// Localized, user-facing message.
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts_remaining: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub challenge_id: Option<String>,
}

impl ErrorBody {
    #[must_use]
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            attempts_remaining: None,
            retry_after_seconds: None,
            challenge_id: None,
        }
    }
}
