//! Session introspection for bearer tokens.

use axum::{
    extract::Extension,
    http::{
        header::{AUTHORIZATION, WWW_AUTHENTICATE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::debug;

use super::{request_locale, types::ErrorBody};
use crate::{
    i18n::{self, Message},
    otp::session::{JwtSessionIssuer, SessionClaims, SessionError},
};

#[utoipa::path(
    get,
    path = "/v1/auth/session",
    responses(
        (status = 200, description = "Session is active", body = SessionClaims),
        (status = 401, description = "Missing, invalid, or expired session token", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn session(headers: HeaderMap, sessions: Extension<Arc<JwtSessionIssuer>>) -> Response {
    let result = match bearer_token(&headers) {
        Some(token) => sessions.verify(token),
        None => Err(SessionError::Invalid),
    };

    match result {
        Ok(claims) => (StatusCode::OK, Json(claims)).into_response(),
        Err(err) => {
            debug!("Rejected session token: {err}");
            let code = match err {
                SessionError::Expired => "session_expired",
                SessionError::Invalid => "unauthorized",
            };
            let body = ErrorBody::new(
                code,
                i18n::template(request_locale(&headers), Message::Unauthorized),
            );
            let mut response_headers = HeaderMap::new();
            response_headers.insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
            (StatusCode::UNAUTHORIZED, response_headers, Json(body)).into_response()
        }
    }
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_bearer_tokens() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer   xyz "));
        assert_eq!(bearer_token(&headers), Some("xyz"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }
}
