//! Client API keys.
//!
//! Keys look like `agemail_<8 hex>_<random body>`. The first 16 characters
//! (`agemail_` plus the hex tag) are stored in clear as a lookup prefix; the
//! full key is stored only as an HMAC-SHA256 keyed with a per-key salt.

use anyhow::Result;
use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use sqlx::{FromRow, PgPool};

use crate::common::{ApiKeyId, CompanyId};

type HmacSha256 = Hmac<Sha256>;

pub const KEY_PREFIX_LEN: usize = 16;
const KEY_SCHEME: &str = "agemail_";

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ApiKey {
    pub id: ApiKeyId,
    pub company_id: CompanyId,
    pub name: String,
    pub key_prefix: String,
    #[serde(skip_serializing)]
    pub key_hash: String,
    #[serde(skip_serializing)]
    pub key_salt: String,
    pub active: bool,
}

/// The lookup prefix of a presented key, if it is shaped like one of ours.
pub fn key_prefix(full_key: &str) -> Option<&str> {
    if !full_key.starts_with(KEY_SCHEME) || full_key.len() <= KEY_PREFIX_LEN {
        return None;
    }
    let prefix = full_key.get(..KEY_PREFIX_LEN)?;
    let tag = &prefix[KEY_SCHEME.len()..];
    if !tag.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(prefix)
}

/// Hex HMAC-SHA256 of `full_key`, keyed with the salt string.
pub fn hash_key(full_key: &str, salt: &str) -> Result<String, InvalidLength> {
    let mut mac = HmacSha256::new_from_slice(salt.as_bytes())?;
    mac.update(full_key.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

impl ApiKey {
    /// Constant-time comparison of the presented key against the stored hash.
    pub fn verify(&self, full_key: &str) -> bool {
        let Ok(expected) = hex::decode(&self.key_hash) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(self.key_salt.as_bytes()) else {
            return false;
        };
        mac.update(full_key.as_bytes());
        mac.verify_slice(&expected).is_ok()
    }
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl ApiKey {
    pub async fn find_active_by_prefix(prefix: &str, pool: &PgPool) -> Result<Option<Self>> {
        let key = sqlx::query_as::<_, ApiKey>(
            r#"
            SELECT id, company_id, name, key_prefix, key_hash, key_salt, active
            FROM api_keys
            WHERE key_prefix = $1 AND active = true
            "#,
        )
        .bind(prefix)
        .fetch_optional(pool)
        .await?;
        Ok(key)
    }

    pub async fn touch(id: ApiKeyId, pool: &PgPool) -> Result<()> {
        sqlx::query("UPDATE api_keys SET last_used_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn insert(&self, pool: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO api_keys (id, company_id, name, key_prefix, key_hash, key_salt, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(self.id)
        .bind(self.company_id)
        .bind(&self.name)
        .bind(&self.key_prefix)
        .bind(&self.key_hash)
        .bind(&self.key_salt)
        .bind(self.active)
        .execute(pool)
        .await?;
        Ok(())
    }
}
