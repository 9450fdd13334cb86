//! PostgreSQL-backed store. Delegates to the model query methods.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use std::time::Duration;

use super::{CompanyDirectory, JobStore};
use crate::common::{CompanyId, JobId, TemplateId};
use crate::domains::outreach::activities::classify::DomainType;
use crate::domains::outreach::models::{
    ApiKey, Company, CompanyFacts, Job, JobStatus, LockGrant, NewJob, PromptTemplate,
};

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl JobStore for PostgresStore {
    async fn insert_job(&self, job: NewJob) -> Result<Job> {
        Job::from(job).insert(&self.pool).await
    }

    async fn find_job(&self, id: JobId) -> Result<Option<Job>> {
        Job::find_by_id(id, &self.pool).await
    }

    async fn try_lock(&self, id: JobId, ttl: Duration) -> Result<LockGrant> {
        Job::try_lock(id, ttl, &self.pool).await
    }

    async fn release_lock(&self, id: JobId) -> Result<()> {
        Job::release_lock(id, &self.pool).await
    }

    async fn force_unlock(&self, id: JobId) -> Result<bool> {
        Job::force_unlock(id, &self.pool).await
    }

    async fn reset_failed(&self, id: JobId) -> Result<bool> {
        Job::reset_failed(id, &self.pool).await
    }

    async fn update_status(
        &self,
        id: JobId,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> Result<()> {
        Job::update_status(id, status, error_message, &self.pool).await
    }

    async fn cache_domain_type(&self, id: JobId, domain_type: DomainType) -> Result<()> {
        Job::cache_domain_type(id, domain_type, &self.pool).await
    }

    async fn record_facts(&self, id: JobId, facts: &CompanyFacts) -> Result<()> {
        Job::record_facts(id, facts, &self.pool).await
    }

    async fn record_research_failure(&self, id: JobId, error: &str, message: &str) -> Result<()> {
        Job::record_research_failure(id, error, message, &self.pool).await
    }

    async fn record_email(
        &self,
        id: JobId,
        subject: &str,
        body_html: &str,
        draft: &str,
    ) -> Result<()> {
        Job::record_email(id, subject, body_html, draft, &self.pool).await
    }

    async fn mark_sent(&self, id: JobId) -> Result<()> {
        Job::mark_sent(id, &self.pool).await
    }

    async fn flag_email_sent(&self, id: JobId) -> Result<()> {
        Job::flag_email_sent(id, &self.pool).await
    }

    async fn find_resumable(&self, limit: i64, lock_ttl: Duration) -> Result<Vec<Job>> {
        Job::find_resumable(limit, lock_ttl, &self.pool).await
    }

    async fn list_jobs(
        &self,
        company_id: CompanyId,
        status: Option<JobStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Job>> {
        Job::list_for_company(company_id, status, limit, offset, &self.pool).await
    }

    async fn count_jobs(&self, company_id: CompanyId, status: Option<JobStatus>) -> Result<i64> {
        Job::count_for_company(company_id, status, &self.pool).await
    }

    async fn find_missing_domain_type(&self, limit: i64) -> Result<Vec<Job>> {
        Job::find_missing_domain_type(limit, &self.pool).await
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl CompanyDirectory for PostgresStore {
    async fn find_company(&self, id: CompanyId) -> Result<Option<Company>> {
        Company::find_by_id(id, &self.pool).await
    }

    async fn find_company_by_slug(&self, slug: &str) -> Result<Option<Company>> {
        Company::find_by_slug(slug, &self.pool).await
    }

    async fn find_template(
        &self,
        id: TemplateId,
        company_id: CompanyId,
    ) -> Result<Option<PromptTemplate>> {
        PromptTemplate::find_for_company(id, company_id, &self.pool).await
    }

    async fn find_default_template(&self, company_id: CompanyId) -> Result<Option<PromptTemplate>> {
        PromptTemplate::find_default(company_id, &self.pool).await
    }

    async fn find_api_key(&self, prefix: &str) -> Result<Option<ApiKey>> {
        ApiKey::find_active_by_prefix(prefix, &self.pool).await
    }

    async fn touch_api_key(&self, key: &ApiKey) -> Result<()> {
        ApiKey::touch(key.id, &self.pool).await
    }
}
