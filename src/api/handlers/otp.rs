//! One-time code request and verification endpoints.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::{debug, instrument};

use super::{
    error_response, missing_payload, request_locale,
    types::{CodeRequest, CodeRequestResponse, ErrorBody, VerifyRequest, VerifyResponse},
};
use crate::otp::OtpService;

#[utoipa::path(
    post,
    path = "/v1/auth/otp/request",
    request_body = CodeRequest,
    responses(
        (status = 202, description = "Code issued and handed to the delivery channel", body = CodeRequestResponse),
        (status = 400, description = "Malformed identifier or payload", body = ErrorBody),
        (status = 429, description = "Too many codes requested; see Retry-After", body = ErrorBody),
        (status = 502, description = "Delivery provider failed; the code can still be verified", body = ErrorBody),
        (status = 503, description = "Challenge store unavailable", body = ErrorBody)
    ),
    tag = "auth"
)]
#[instrument(skip(headers, service, payload), fields(purpose = tracing::field::Empty))]
pub async fn request_code(
    headers: HeaderMap,
    service: Extension<Arc<OtpService>>,
    payload: Option<Json<CodeRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return missing_payload();
    };
    tracing::Span::current().record("purpose", request.purpose.as_str());

    match service
        .request_code(&request.identifier, request.purpose)
        .await
    {
        Ok(requested) => {
            debug!(challenge_id = %requested.challenge_id, "Code requested");
            let response = CodeRequestResponse {
                challenge_id: requested.challenge_id.to_string(),
                expires_at: requested.expires_at.to_rfc3339(),
                expires_in_seconds: service.config().ttl().num_seconds(),
            };
            (StatusCode::ACCEPTED, Json(response)).into_response()
        }
        Err(err) => error_response(request_locale(&headers), &err),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/otp/verify",
    request_body = VerifyRequest,
    responses(
        (status = 200, description = "Code accepted; session issued", body = VerifyResponse),
        (status = 400, description = "Malformed identifier, code, or payload", body = ErrorBody),
        (status = 401, description = "Wrong code", body = ErrorBody),
        (status = 403, description = "Too many attempts", body = ErrorBody),
        (status = 404, description = "No challenge for this identifier and purpose", body = ErrorBody),
        (status = 409, description = "Challenge already used", body = ErrorBody),
        (status = 410, description = "Challenge expired", body = ErrorBody),
        (status = 503, description = "Challenge store unavailable", body = ErrorBody)
    ),
    tag = "auth"
)]
#[instrument(skip(headers, service, payload), fields(purpose = tracing::field::Empty))]
pub async fn verify_code(
    headers: HeaderMap,
    service: Extension<Arc<OtpService>>,
    payload: Option<Json<VerifyRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return missing_payload();
    };
    tracing::Span::current().record("purpose", request.purpose.as_str());

    match service
        .verify_code(&request.identifier, request.purpose, &request.code)
        .await
    {
        Ok(verified) => {
            debug!(user_id = %verified.identity.id, "Code verified");
            let response = VerifyResponse {
                session_token: verified.session.token,
                session_expires_at: verified.session.expires_at.to_rfc3339(),
                identity: verified.identity,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(err) => error_response(request_locale(&headers), &err),
    }
}
