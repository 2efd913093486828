use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::identity::{Identity, Role};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[async_trait]
pub trait SessionIssuer: Send + Sync {
    async fn issue(&self, identity: &Identity) -> Result<SessionToken>;
}

#[derive(ToSchema, Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    /// User id.
    pub sub: String,
    pub identifier: String,
    pub roles: Vec<Role>,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub jti: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Session expired")]
    Expired,
    #[error("Invalid session token")]
    Invalid,
}

const MAX_SESSION_TTL_SECONDS: i64 = 365 * 24 * 60 * 60;

/// HS256 session tokens.
#[derive(Clone)]
pub struct JwtSessionIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    ttl: Duration,
}

impl JwtSessionIssuer {
    #[must_use]
    pub fn new(secret: &SecretString, issuer: impl Into<String>, ttl_seconds: i64) -> Self {
        let secret = secret.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            issuer: issuer.into(),
            ttl: Duration::seconds(ttl_seconds.clamp(1, MAX_SESSION_TTL_SECONDS)),
        }
    }

    /// # Errors
    /// Returns `SessionError::Expired` for a well-formed token past `exp`, and
    /// `SessionError::Invalid` for anything else that fails validation.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, SessionError> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.issuer]);
        validation.leeway = 0;

        decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => SessionError::Expired,
                _ => SessionError::Invalid,
            })
    }

    fn sign(&self, identity: &Identity, now: DateTime<Utc>) -> Result<SessionToken> {
        let expires_at = now + self.ttl;
        let claims = SessionClaims {
            sub: identity.id.to_string(),
            identifier: identity.identifier.clone(),
            roles: identity.roles.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: self.issuer.clone(),
            jti: Uuid::new_v4().to_string(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding_key)?;
        Ok(SessionToken { token, expires_at })
    }
}

#[async_trait]
impl SessionIssuer for JwtSessionIssuer {
    async fn issue(&self, identity: &Identity) -> Result<SessionToken> {
        self.sign(identity, Utc::now())
    }
}

impl std::fmt::Debug for JwtSessionIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtSessionIssuer")
            .field("issuer", &self.issuer)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity {
            id: Uuid::new_v4(),
            identifier: "+919876543210".to_string(),
            roles: vec![Role::Worker],
        }
    }

    fn issuer(secret: &str) -> JwtSessionIssuer {
        JwtSessionIssuer::new(&SecretString::from(secret.to_string()), "karamsaathi", 3600)
    }

    #[tokio::test]
    async fn issued_token_verifies() -> Result<()> {
        let issuer = issuer("session-secret");
        let identity = identity();
        let session = issuer.issue(&identity).await?;

        let claims = issuer.verify(&session.token)?;
        assert_eq!(claims.sub, identity.id.to_string());
        assert_eq!(claims.identifier, identity.identifier);
        assert_eq!(claims.roles, vec![Role::Worker]);
        assert_eq!(claims.iss, "karamsaathi");
        assert_eq!(claims.exp, session.expires_at.timestamp());
        Ok(())
    }

    #[test]
    fn rejects_foreign_and_garbage_tokens() -> Result<()> {
        let token = issuer("one").sign(&identity(), Utc::now())?;
        assert_eq!(issuer("two").verify(&token.token), Err(SessionError::Invalid));
        assert_eq!(issuer("one").verify("not-a-token"), Err(SessionError::Invalid));

        let other_issuer =
            JwtSessionIssuer::new(&SecretString::from("one".to_string()), "someone-else", 3600);
        assert_eq!(other_issuer.verify(&token.token), Err(SessionError::Invalid));
        Ok(())
    }

    #[test]
    fn reports_expired_tokens() -> Result<()> {
        let issuer = issuer("session-secret");
        let token = issuer.sign(&identity(), Utc::now() - Duration::hours(2))?;
        assert_eq!(issuer.verify(&token.token), Err(SessionError::Expired));
        Ok(())
    }

    #[test]
    fn oversized_ttl_is_capped() -> Result<()> {
        let issuer = JwtSessionIssuer::new(
            &SecretString::from("session-secret".to_string()),
            "karamsaathi",
            i64::MAX,
        );
        let now = Utc::now();
        let token = issuer.sign(&identity(), now)?;
        assert_eq!(token.expires_at, now + Duration::days(365));
        Ok(())
    }

    #[test]
    fn debug_hides_keys() {
        let rendered = format!("{:?}", issuer("session-secret"));
        assert!(!rendered.contains("session-secret"));
    }
}
