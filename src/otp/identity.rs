use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use std::{collections::HashMap, fmt, str::FromStr};
use tokio::sync::Mutex;
use tracing::Instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use super::identifier::Identifier;

/// Marketplace roles. New identities start as workers.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Worker,
    Employer,
    Admin,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Worker => "worker",
            Self::Employer => "employer",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "worker" => Ok(Self::Worker),
            "employer" => Ok(Self::Employer),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("unknown role: {s}")),
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    #[schema(value_type = String, format = Uuid)]
    pub id: Uuid,
    pub identifier: String,
    pub roles: Vec<Role>,
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Idempotent: repeated calls for the same identifier return the same identity.
    async fn find_or_create_by_identifier(&self, identifier: &Identifier) -> Result<Identity>;
}

#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    identities: Mutex<HashMap<String, Identity>>,
}

impl MemoryIdentityStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn find_or_create_by_identifier(&self, identifier: &Identifier) -> Result<Identity> {
        let mut identities = self.identities.lock().await;
        let identity = identities
            .entry(identifier.as_str().to_string())
            .or_insert_with(|| Identity {
                id: Uuid::new_v4(),
                identifier: identifier.as_str().to_string(),
                roles: vec![Role::default()],
            });
        Ok(identity.clone())
    }
}

#[derive(Clone, Debug)]
pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn find_or_create_by_identifier(&self, identifier: &Identifier) -> Result<Identity> {
        let query = r"
            INSERT INTO users (identifier)
            VALUES ($1)
            ON CONFLICT (identifier) DO UPDATE SET last_login_at = NOW()
            RETURNING id, identifier, roles
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT"
        );
        let row = sqlx::query(query)
            .bind(identifier.as_str())
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .context("failed to upsert user")?;

        let roles: Vec<String> = row.try_get("roles")?;
        let roles = roles
            .iter()
            .filter_map(|role| role.parse::<Role>().ok())
            .collect();

        Ok(Identity {
            id: row.try_get("id")?,
            identifier: row.try_get("identifier")?,
            roles,
        })
    }
}
