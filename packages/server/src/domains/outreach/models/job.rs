//! Lead processing job: one lead moving through research, generation and delivery.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::time::Duration;
use typed_builder::TypedBuilder;

use crate::common::{CompanyId, JobId, TemplateId};
use crate::domains::outreach::activities::classify::DomainType;

// ============================================================================
// Status
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "lead_job_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Scraping,
    Scraped,
    Generating,
    Generated,
    Sending,
    Sent,
    Completed,
    Failed,
    Rejected,
    Skipped,
}

/// Statuses the sweeper resumes and the lock may be taken in.
pub const IN_FLIGHT_SQL: &str = "('pending', 'scraping', 'scraped', 'generating', 'sending')";

/// Statuses a job never leaves on its own.
const TERMINAL_SQL: &str = "('sent', 'completed', 'failed', 'rejected', 'skipped')";

impl JobStatus {
    pub const ALL: [JobStatus; 11] = [
        JobStatus::Pending,
        JobStatus::Scraping,
        JobStatus::Scraped,
        JobStatus::Generating,
        JobStatus::Generated,
        JobStatus::Sending,
        JobStatus::Sent,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Rejected,
        JobStatus::Skipped,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Scraping => "scraping",
            JobStatus::Scraped => "scraped",
            JobStatus::Generating => "generating",
            JobStatus::Generated => "generated",
            JobStatus::Sending => "sending",
            JobStatus::Sent => "sent",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Rejected => "rejected",
            JobStatus::Skipped => "skipped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Sent
                | JobStatus::Completed
                | JobStatus::Failed
                | JobStatus::Rejected
                | JobStatus::Skipped
        )
    }

    /// Work remains and the job may be locked and advanced.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            JobStatus::Pending
                | JobStatus::Scraping
                | JobStatus::Scraped
                | JobStatus::Generating
                | JobStatus::Sending
        )
    }

    /// A repeated invocation returns the stored email without calling any adapter.
    pub fn is_settled_success(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Sent | JobStatus::Generated
        )
    }

    /// Allowed forward edges of the state machine.
    pub fn can_advance_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Scraping)
                | (Pending, Rejected)
                | (Pending, Skipped)
                | (Scraping, Scraped)
                | (Scraping, Failed)
                | (Scraped, Generating)
                | (Generating, Generated)
                | (Generating, Failed)
                | (Generated, Sending)
                | (Generated, Completed)
                | (Sending, Sent)
                | (Sending, Failed)
        )
    }

    /// Rough completion percentage shown to demo users.
    pub fn progress(&self) -> u8 {
        match self {
            JobStatus::Pending => 10,
            JobStatus::Scraping => 30,
            JobStatus::Scraped => 40,
            JobStatus::Generating => 60,
            JobStatus::Generated => 80,
            JobStatus::Sending => 90,
            JobStatus::Sent | JobStatus::Completed => 100,
            JobStatus::Failed | JobStatus::Rejected | JobStatus::Skipped => 0,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        JobStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| anyhow!("Invalid job status: {}", s))
    }
}

// ============================================================================
// Metadata and research artifacts
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobSource {
    /// Public registration form; always delivered through the managed provider
    #[default]
    Demo,
    /// Authenticated client submission; delivered only through the client's own SMTP
    ClientApi,
}

impl std::fmt::Display for JobSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobSource::Demo => write!(f, "demo"),
            JobSource::ClientApi => write!(f, "client_api"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMetadata {
    #[serde(default)]
    pub source: JobSource,
    /// Cached classifier verdict; written once and never recomputed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_type: Option<DomainType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<TemplateId>,
}

/// Structured facts about the lead's company.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyFacts {
    pub company_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub products: Vec<String>,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
}

/// Result of the research stage, persisted in `scrape_result`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ResearchOutcome {
    Facts(CompanyFacts),
    Error { error: String },
}

impl ResearchOutcome {
    pub fn facts(&self) -> Option<&CompanyFacts> {
        match self {
            ResearchOutcome::Facts(facts) => Some(facts),
            ResearchOutcome::Error { .. } => None,
        }
    }
}

/// Outcome of a conditional lock acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockGrant {
    Acquired,
    /// The previous holder's lock had outlived the TTL
    Reclaimed { stale_since: DateTime<Utc> },
    Denied,
}

impl LockGrant {
    pub fn is_granted(&self) -> bool {
        !matches!(self, LockGrant::Denied)
    }
}

// ============================================================================
// Job
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, TypedBuilder)]
pub struct Job {
    #[builder(default = JobId::new())]
    pub id: JobId,
    pub company_id: CompanyId,

    #[builder(setter(into))]
    pub first_name: String,
    #[builder(setter(into))]
    pub last_name: String,
    #[builder(setter(into))]
    pub email: String,
    #[builder(setter(into))]
    pub domain: String,

    #[builder(default)]
    pub status: JobStatus,
    #[builder(default)]
    pub metadata: Json<JobMetadata>,
    #[builder(default)]
    pub processing_lock: Option<DateTime<Utc>>,
    /// Persisted for compatibility; nothing reads or increments it
    #[builder(default)]
    pub retry_count: i32,

    #[builder(default)]
    pub scrape_result: Option<Json<ResearchOutcome>>,
    #[builder(default)]
    pub email_subject: Option<String>,
    #[builder(default)]
    pub email_body: Option<String>,
    #[builder(default)]
    pub email_draft: Option<String>,
    #[builder(default)]
    pub email_sent: bool,
    #[builder(default, setter(strip_option, into))]
    pub error_message: Option<String>,

    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
    #[builder(default = Utc::now())]
    pub updated_at: DateTime<Utc>,
    #[builder(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn source(&self) -> JobSource {
        self.metadata.source
    }

    pub fn domain_type(&self) -> Option<DomainType> {
        self.metadata.domain_type
    }

    pub fn template_id(&self) -> Option<TemplateId> {
        self.metadata.template_id
    }

    pub fn facts(&self) -> Option<&CompanyFacts> {
        self.scrape_result.as_ref().and_then(|r| r.facts())
    }

    /// True when both halves of the generated email are stored.
    pub fn has_email(&self) -> bool {
        self.email_subject.is_some() && self.email_body.is_some()
    }

    /// The lock is held and younger than `ttl`.
    pub fn is_locked(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        match self.processing_lock {
            Some(since) => !lock_expired(since, ttl, now),
            None => false,
        }
    }
}

pub fn lock_expired(since: DateTime<Utc>, ttl: Duration, now: DateTime<Utc>) -> bool {
    match chrono::Duration::from_std(ttl) {
        Ok(ttl) => since + ttl < now,
        Err(_) => false,
    }
}

/// Fields an intake request supplies.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub company_id: CompanyId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub domain: String,
    pub status: JobStatus,
    pub metadata: JobMetadata,
    pub error_message: Option<String>,
}

impl From<NewJob> for Job {
    fn from(new: NewJob) -> Self {
        Job {
            id: JobId::new(),
            company_id: new.company_id,
            first_name: new.first_name,
            last_name: new.last_name,
            email: new.email,
            domain: new.domain,
            status: new.status,
            metadata: Json(new.metadata),
            processing_lock: None,
            retry_count: 0,
            scrape_result: None,
            email_subject: None,
            email_body: None,
            email_draft: None,
            email_sent: false,
            error_message: new.error_message,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            completed_at: None,
        }
    }
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl Job {
    pub async fn insert(&self, pool: &PgPool) -> Result<Self> {
        let job = sqlx::query_as::<_, Job>(
            r#"
            INSERT INTO jobs (
                id, company_id, first_name, last_name, email, domain,
                status, metadata, retry_count, error_message, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 0, $9, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(self.id)
        .bind(self.company_id)
        .bind(&self.first_name)
        .bind(&self.last_name)
        .bind(&self.email)
        .bind(&self.domain)
        .bind(self.status)
        .bind(&self.metadata)
        .bind(&self.error_message)
        .fetch_one(pool)
        .await?;
        Ok(job)
    }

    pub async fn find_by_id(id: JobId, pool: &PgPool) -> Result<Option<Self>> {
        let job = sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(job)
    }

    /// Take the processing lock if the job is in flight and the lock is free or expired.
    ///
    /// One conditional UPDATE; concurrent callers cannot both succeed.
    pub async fn try_lock(id: JobId, ttl: Duration, pool: &PgPool) -> Result<LockGrant> {
        let sql = format!(
            r#"
            UPDATE jobs AS j
            SET processing_lock = NOW(), updated_at = NOW()
            FROM (SELECT id, processing_lock FROM jobs WHERE id = $1) AS prev
            WHERE j.id = prev.id
              AND j.status IN {IN_FLIGHT_SQL}
              AND (
                j.processing_lock IS NULL
                OR j.processing_lock < NOW() - make_interval(secs => $2)
              )
            RETURNING prev.processing_lock
            "#
        );

        let row: Option<(Option<DateTime<Utc>>,)> = sqlx::query_as(&sql)
            .bind(id)
            .bind(ttl.as_secs_f64())
            .fetch_optional(pool)
            .await?;

        Ok(match row {
            None => LockGrant::Denied,
            Some((None,)) => LockGrant::Acquired,
            Some((Some(stale_since),)) => LockGrant::Reclaimed { stale_since },
        })
    }

    pub async fn release_lock(id: JobId, pool: &PgPool) -> Result<()> {
        sqlx::query("UPDATE jobs SET processing_lock = NULL, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Move to `status`. Refuses to leave a terminal status.
    pub async fn update_status(
        id: JobId,
        status: JobStatus,
        error_message: Option<&str>,
        pool: &PgPool,
    ) -> Result<()> {
        let sql = format!(
            r#"
            UPDATE jobs
            SET status = $2,
                error_message = COALESCE($3, error_message),
                completed_at = CASE WHEN $2 IN ('sent', 'completed')
                                    THEN NOW() ELSE completed_at END,
                updated_at = NOW()
            WHERE id = $1 AND status NOT IN {TERMINAL_SQL}
            "#
        );

        let result = sqlx::query(&sql)
            .bind(id)
            .bind(status)
            .bind(error_message)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(anyhow!("job {} not found or already terminal", id));
        }
        Ok(())
    }

    /// Write the classifier verdict unless one is already cached.
    pub async fn cache_domain_type(id: JobId, domain_type: DomainType, pool: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET metadata = jsonb_set(metadata, '{domain_type}', to_jsonb($2::text)),
                updated_at = NOW()
            WHERE id = $1 AND NOT (metadata ? 'domain_type')
            "#,
        )
        .bind(id)
        .bind(domain_type.as_str())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Store facts and mark the job `scraped` in one statement.
    pub async fn record_facts(id: JobId, facts: &CompanyFacts, pool: &PgPool) -> Result<()> {
        let outcome = ResearchOutcome::Facts(facts.clone());
        sqlx::query(
            r#"
            UPDATE jobs
            SET scrape_result = $2, status = 'scraped', updated_at = NOW()
            WHERE id = $1 AND status = 'scraping'
            "#,
        )
        .bind(id)
        .bind(Json(&outcome))
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Store the research error and fail the job in one statement.
    pub async fn record_research_failure(
        id: JobId,
        error: &str,
        error_message: &str,
        pool: &PgPool,
    ) -> Result<()> {
        let outcome = ResearchOutcome::Error {
            error: error.to_string(),
        };
        sqlx::query(
            r#"
            UPDATE jobs
            SET scrape_result = $2, status = 'failed', error_message = $3, updated_at = NOW()
            WHERE id = $1 AND status = 'scraping'
            "#,
        )
        .bind(id)
        .bind(Json(&outcome))
        .bind(error_message)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Store the drafted email and mark the job `generated` in one statement.
    pub async fn record_email(
        id: JobId,
        subject: &str,
        body_html: &str,
        draft: &str,
        pool: &PgPool,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET email_subject = $2, email_body = $3, email_draft = $4,
                status = 'generated', updated_at = NOW()
            WHERE id = $1 AND status = 'generating'
            "#,
        )
        .bind(id)
        .bind(subject)
        .bind(body_html)
        .bind(draft)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn mark_sent(id: JobId, pool: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET email_sent = true, status = 'sent', completed_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = 'sending'
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Record delivery without touching the status, so the sweeper skips the job.
    pub async fn flag_email_sent(id: JobId, pool: &PgPool) -> Result<()> {
        sqlx::query("UPDATE jobs SET email_sent = true, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Clear the lock regardless of its age (admin override).
    pub async fn force_unlock(id: JobId, pool: &PgPool) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE jobs SET processing_lock = NULL, updated_at = NOW() WHERE id = $1 AND processing_lock IS NOT NULL",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Put a failed job back to `pending` (manual re-trigger).
    pub async fn reset_failed(id: JobId, pool: &PgPool) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'pending', error_message = NULL, processing_lock = NULL, updated_at = NOW()
            WHERE id = $1 AND status = 'failed'
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Oldest in-flight jobs whose lock is free or expired. A job whose email
    /// already left is never resumed.
    pub async fn find_resumable(limit: i64, lock_ttl: Duration, pool: &PgPool) -> Result<Vec<Self>> {
        let sql = format!(
            r#"
            SELECT * FROM jobs
            WHERE status IN {IN_FLIGHT_SQL}
              AND NOT email_sent
              AND (processing_lock IS NULL OR processing_lock < NOW() - make_interval(secs => $2))
            ORDER BY created_at ASC
            LIMIT $1
            "#
        );
        let jobs = sqlx::query_as::<_, Job>(&sql)
            .bind(limit)
            .bind(lock_ttl.as_secs_f64())
            .fetch_all(pool)
            .await?;
        Ok(jobs)
    }

    pub async fn list_for_company(
        company_id: CompanyId,
        status: Option<JobStatus>,
        limit: i64,
        offset: i64,
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        let jobs = sqlx::query_as::<_, Job>(
            r#"
            SELECT * FROM jobs
            WHERE company_id = $1 AND ($2::lead_job_status IS NULL OR status = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(company_id)
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;
        Ok(jobs)
    }

    pub async fn count_for_company(
        company_id: CompanyId,
        status: Option<JobStatus>,
        pool: &PgPool,
    ) -> Result<i64> {
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM jobs
            WHERE company_id = $1 AND ($2::lead_job_status IS NULL OR status = $2)
            "#,
        )
        .bind(company_id)
        .bind(status)
        .fetch_one(pool)
        .await?;
        Ok(count.0)
    }

    /// Jobs created before domain types were cached on intake.
    pub async fn find_missing_domain_type(limit: i64, pool: &PgPool) -> Result<Vec<Self>> {
        let jobs = sqlx::query_as::<_, Job>(
            r#"
            SELECT * FROM jobs
            WHERE NOT (metadata ? 'domain_type')
            ORDER BY created_at ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(jobs)
    }
}
