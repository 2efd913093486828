pub mod health;
pub mod otp;
pub mod root;
pub mod session;
pub mod types;

// common functions for the handlers
use axum::{
    http::{
        header::{ACCEPT_LANGUAGE, RETRY_AFTER},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Json, Response},
};

use self::types::ErrorBody;
use crate::{i18n, i18n::Locale, otp::OtpError};

/// Locale for user-facing messages, from `Accept-Language`.
pub(crate) fn request_locale(headers: &HeaderMap) -> Locale {
    headers
        .get(ACCEPT_LANGUAGE)
        .and_then(|value| value.to_str().ok())
        .map(Locale::from_accept_language)
        .unwrap_or_default()
}

#[must_use]
pub const fn error_status(error: &OtpError) -> StatusCode {
    match error {
        OtpError::InvalidIdentifierFormat | OtpError::InvalidCodeFormat => StatusCode::BAD_REQUEST,
        OtpError::InvalidCode { .. } => StatusCode::UNAUTHORIZED,
        OtpError::TooManyAttempts => StatusCode::FORBIDDEN,
        OtpError::NotFound => StatusCode::NOT_FOUND,
        OtpError::AlreadyUsed => StatusCode::CONFLICT,
        OtpError::Expired => StatusCode::GONE,
        OtpError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        OtpError::DeliveryFailed { .. } => StatusCode::BAD_GATEWAY,
        OtpError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
    }
}

pub(crate) fn error_response(locale: Locale, error: &OtpError) -> Response {
    let mut body = ErrorBody::new(error.code(), i18n::error_message(locale, error));
    let mut headers = HeaderMap::new();

    match error {
        OtpError::InvalidCode { attempts_remaining } => {
            body.attempts_remaining = Some(*attempts_remaining);
        }
        OtpError::RateLimited {
            retry_after_seconds,
        } => {
            body.retry_after_seconds = Some(*retry_after_seconds);
            headers.insert(RETRY_AFTER, HeaderValue::from(*retry_after_seconds));
        }
        OtpError::DeliveryFailed { challenge_id, .. } => {
            body.challenge_id = Some(challenge_id.to_string());
        }
        _ => {}
    }

    (error_status(error), headers, Json(body)).into_response()
}

pub(crate) fn missing_payload() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody::new("missing_payload", "Missing payload")),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn maps_every_error_to_a_status() {
        let cases = [
            (OtpError::InvalidIdentifierFormat, StatusCode::BAD_REQUEST),
            (OtpError::InvalidCodeFormat, StatusCode::BAD_REQUEST),
            (
                OtpError::InvalidCode {
                    attempts_remaining: 2,
                },
                StatusCode::UNAUTHORIZED,
            ),
            (OtpError::TooManyAttempts, StatusCode::FORBIDDEN),
            (OtpError::NotFound, StatusCode::NOT_FOUND),
            (OtpError::AlreadyUsed, StatusCode::CONFLICT),
            (OtpError::Expired, StatusCode::GONE),
            (
                OtpError::RateLimited {
                    retry_after_seconds: 3,
                },
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                OtpError::DeliveryFailed {
                    challenge_id: Uuid::new_v4(),
                    expires_at: Utc::now(),
                    reason: "provider down".to_string(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (OtpError::Unavailable, StatusCode::SERVICE_UNAVAILABLE),
        ];
        for (error, status) in cases {
            assert_eq!(error_status(&error), status, "{error:?}");
        }
    }

    #[test]
    fn rate_limited_sets_retry_after() {
        let response = error_response(
            Locale::En,
            &OtpError::RateLimited {
                retry_after_seconds: 17,
            },
        );
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(RETRY_AFTER),
            Some(&HeaderValue::from_static("17"))
        );
    }

    #[test]
    fn locale_defaults_to_english() {
        let mut headers = HeaderMap::new();
        assert_eq!(request_locale(&headers), Locale::En);

        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("ta-IN,en;q=0.5"));
        assert_eq!(request_locale(&headers), Locale::Ta);
    }
}
