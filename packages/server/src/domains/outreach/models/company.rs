use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use typed_builder::TypedBuilder;

use crate::common::CompanyId;

/// A client company. Owns jobs, prompt templates and API keys, and may
/// bring its own SMTP server for delivering client submissions.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, TypedBuilder)]
pub struct Company {
    #[builder(default = CompanyId::new())]
    pub id: CompanyId,
    #[builder(setter(into))]
    pub name: String,
    #[builder(setter(into))]
    pub slug: String,

    #[builder(default)]
    pub smtp_enabled: bool,
    #[builder(default, setter(strip_option, into))]
    pub smtp_host: Option<String>,
    #[builder(default, setter(strip_option))]
    pub smtp_port: Option<i32>,
    #[builder(default, setter(strip_option, into))]
    pub smtp_user: Option<String>,
    #[serde(skip_serializing)]
    #[builder(default, setter(strip_option, into))]
    pub smtp_password: Option<String>,
    #[builder(default = true)]
    pub smtp_secure: bool,
    #[builder(default, setter(strip_option, into))]
    pub smtp_from_email: Option<String>,
    #[builder(default, setter(strip_option, into))]
    pub smtp_from_name: Option<String>,
    #[builder(default, setter(strip_option, into))]
    pub smtp_reply_to_email: Option<String>,
    #[builder(default, setter(strip_option, into))]
    pub smtp_signature: Option<String>,

    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
    #[builder(default = Utc::now())]
    pub updated_at: DateTime<Utc>,
}

/// Everything needed to open an SMTP session on behalf of a company.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Implicit TLS when true, STARTTLS otherwise
    pub secure: bool,
    pub from_name: String,
    pub from_email: String,
    pub reply_to: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl Company {
    /// SMTP settings if the company enabled SMTP and filled in host, port,
    /// user and password. Anything less means "not configured".
    pub fn smtp_settings(&self) -> Option<SmtpSettings> {
        if !self.smtp_enabled {
            return None;
        }
        let host = non_empty(&self.smtp_host)?;
        let port = self.smtp_port.and_then(|p| u16::try_from(p).ok()).filter(|p| *p > 0)?;
        let user = non_empty(&self.smtp_user)?;
        let password = non_empty(&self.smtp_password)?;

        Some(SmtpSettings {
            host: host.to_string(),
            port,
            user: user.to_string(),
            password: password.to_string(),
            secure: self.smtp_secure,
            from_name: non_empty(&self.smtp_from_name)
                .unwrap_or(&self.name)
                .to_string(),
            from_email: non_empty(&self.smtp_from_email).unwrap_or(user).to_string(),
            reply_to: non_empty(&self.smtp_reply_to_email).map(str::to_string),
        })
    }

    pub fn smtp_configured(&self) -> bool {
        self.smtp_settings().is_some()
    }

    pub fn signature(&self) -> Option<&str> {
        non_empty(&self.smtp_signature)
    }
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl Company {
    pub async fn find_by_id(id: CompanyId, pool: &PgPool) -> Result<Option<Self>> {
        let company = sqlx::query_as::<_, Company>("SELECT * FROM companies WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(company)
    }

    pub async fn find_by_slug(slug: &str, pool: &PgPool) -> Result<Option<Self>> {
        let company = sqlx::query_as::<_, Company>("SELECT * FROM companies WHERE slug = $1")
            .bind(slug)
            .fetch_optional(pool)
            .await?;
        Ok(company)
    }

    pub async fn insert(&self, pool: &PgPool) -> Result<Self> {
        let company = sqlx::query_as::<_, Company>(
            r#"
            INSERT INTO companies (
                id, name, slug, smtp_enabled, smtp_host, smtp_port, smtp_user, smtp_password,
                smtp_secure, smtp_from_email, smtp_from_name, smtp_reply_to_email, smtp_signature
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING *
            "#,
        )
        .bind(self.id)
        .bind(&self.name)
        .bind(&self.slug)
        .bind(self.smtp_enabled)
        .bind(&self.smtp_host)
        .bind(self.smtp_port)
        .bind(&self.smtp_user)
        .bind(&self.smtp_password)
        .bind(self.smtp_secure)
        .bind(&self.smtp_from_email)
        .bind(&self.smtp_from_name)
        .bind(&self.smtp_reply_to_email)
        .bind(&self.smtp_signature)
        .fetch_one(pool)
        .await?;
        Ok(company)
    }
}
