//! Persistence seams for the outreach pipeline.
//!
//! Split into focused traits:
//! - `JobStore`: job rows, status transitions and the processing lock
//! - `CompanyDirectory`: companies, prompt templates and API keys
//! - `OutreachStore`: composite of both, held by `ServerDeps`

mod memory;
mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

use crate::common::{CompanyId, JobId, TemplateId};
use crate::domains::outreach::activities::classify::DomainType;
use crate::domains::outreach::models::{
    ApiKey, Company, CompanyFacts, Job, JobStatus, LockGrant, NewJob, PromptTemplate,
};

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert_job(&self, job: NewJob) -> Result<Job>;

    async fn find_job(&self, id: JobId) -> Result<Option<Job>>;

    /// Conditional lock acquisition; at most one concurrent caller is granted.
    async fn try_lock(&self, id: JobId, ttl: Duration) -> Result<LockGrant>;

    async fn release_lock(&self, id: JobId) -> Result<()>;

    /// Clear the lock regardless of age. Returns whether a lock was held.
    async fn force_unlock(&self, id: JobId) -> Result<bool>;

    /// `failed` back to `pending`. Returns whether the job was failed.
    async fn reset_failed(&self, id: JobId) -> Result<bool>;

    /// Errors if the job is missing or already terminal.
    async fn update_status(
        &self,
        id: JobId,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> Result<()>;

    /// No-op when a domain type is already cached.
    async fn cache_domain_type(&self, id: JobId, domain_type: DomainType) -> Result<()>;

    /// `scraping` -> `scraped` with the facts.
    async fn record_facts(&self, id: JobId, facts: &CompanyFacts) -> Result<()>;

    /// `scraping` -> `failed` with the research error stored.
    async fn record_research_failure(&self, id: JobId, error: &str, message: &str) -> Result<()>;

    /// `generating` -> `generated` with the email.
    async fn record_email(&self, id: JobId, subject: &str, body_html: &str, draft: &str)
        -> Result<()>;

    /// `sending` -> `sent`, flagging the email as delivered.
    async fn mark_sent(&self, id: JobId) -> Result<()>;

    /// Set `email_sent` alone, whatever the status. Fallback when `mark_sent`
    /// keeps failing after the email already left.
    async fn flag_email_sent(&self, id: JobId) -> Result<()>;

    /// Oldest in-flight, unsent jobs whose lock is free or older than `lock_ttl`.
    async fn find_resumable(&self, limit: i64, lock_ttl: Duration) -> Result<Vec<Job>>;

    async fn list_jobs(
        &self,
        company_id: CompanyId,
        status: Option<JobStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Job>>;

    async fn count_jobs(&self, company_id: CompanyId, status: Option<JobStatus>) -> Result<i64>;

    async fn find_missing_domain_type(&self, limit: i64) -> Result<Vec<Job>>;

    /// Cheap connectivity check for health probes.
    async fn ping(&self) -> Result<()>;
}

#[async_trait]
pub trait CompanyDirectory: Send + Sync {
    async fn find_company(&self, id: CompanyId) -> Result<Option<Company>>;

    async fn find_company_by_slug(&self, slug: &str) -> Result<Option<Company>>;

    async fn find_template(
        &self,
        id: TemplateId,
        company_id: CompanyId,
    ) -> Result<Option<PromptTemplate>>;

    async fn find_default_template(&self, company_id: CompanyId) -> Result<Option<PromptTemplate>>;

    async fn find_api_key(&self, prefix: &str) -> Result<Option<ApiKey>>;

    async fn touch_api_key(&self, key: &ApiKey) -> Result<()>;
}

/// Everything the pipeline and HTTP layer persist through.
pub trait OutreachStore: JobStore + CompanyDirectory {}

impl<T: JobStore + CompanyDirectory> OutreachStore for T {}
