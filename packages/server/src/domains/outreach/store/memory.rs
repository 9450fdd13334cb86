//! In-memory store for tests and local development.
//!
//! Mirrors the conditional semantics of the Postgres queries: every mutation
//! runs under one mutex, so `try_lock` is as atomic as the UPDATE it stands in for.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::{CompanyDirectory, JobStore};
use crate::common::{CompanyId, JobId, TemplateId};
use crate::domains::outreach::activities::classify::DomainType;
use crate::domains::outreach::models::job::lock_expired;
use crate::domains::outreach::models::{
    ApiKey, Company, CompanyFacts, Job, JobStatus, LockGrant, NewJob, PromptTemplate,
    ResearchOutcome,
};
use sqlx::types::Json;

#[derive(Default)]
struct State {
    jobs: HashMap<JobId, Job>,
    companies: Vec<Company>,
    templates: Vec<PromptTemplate>,
    api_keys: Vec<ApiKey>,
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
    failing_releases: AtomicUsize,
    release_calls: AtomicUsize,
    failing_mark_sent: AtomicUsize,
    mark_sent_calls: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_company(&self, company: Company) {
        self.state().companies.push(company);
    }

    pub fn add_template(&self, template: PromptTemplate) {
        self.state().templates.push(template);
    }

    pub fn add_api_key(&self, key: ApiKey) {
        self.state().api_keys.push(key);
    }

    /// Seed a job exactly as given (any status, lock or artifacts).
    pub fn put_job(&self, job: Job) {
        self.state().jobs.insert(job.id, job);
    }

    /// Snapshot of a job, bypassing the async trait.
    pub fn job(&self, id: JobId) -> Option<Job> {
        self.state().jobs.get(&id).cloned()
    }

    /// The next `n` calls to `release_lock` fail without touching the lock.
    pub fn fail_next_releases(&self, n: usize) {
        self.failing_releases.store(n, Ordering::SeqCst);
    }

    pub fn release_calls(&self) -> usize {
        self.release_calls.load(Ordering::SeqCst)
    }

    /// The next `n` calls to `mark_sent` fail without touching the job.
    pub fn fail_next_mark_sent(&self, n: usize) {
        self.failing_mark_sent.store(n, Ordering::SeqCst);
    }

    pub fn mark_sent_calls(&self) -> usize {
        self.mark_sent_calls.load(Ordering::SeqCst)
    }

    fn with_job<T>(&self, id: JobId, f: impl FnOnce(&mut Job) -> Result<T>) -> Result<T> {
        let mut state = self.state();
        let job = state
            .jobs
            .get_mut(&id)
            .ok_or_else(|| anyhow!("job {} not found", id))?;
        f(job)
    }

    /// Apply `f` only when the job is currently in `expected`.
    fn transition(&self, id: JobId, expected: JobStatus, f: impl FnOnce(&mut Job)) -> Result<()> {
        self.with_job(id, |job| {
            if job.status == expected {
                f(job);
                job.updated_at = Utc::now();
            }
            Ok(())
        })
    }
}

#[async_trait]
impl JobStore for InMemoryStore {
    async fn insert_job(&self, job: NewJob) -> Result<Job> {
        let job = Job::from(job);
        self.state().jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn find_job(&self, id: JobId) -> Result<Option<Job>> {
        Ok(self.job(id))
    }

    async fn try_lock(&self, id: JobId, ttl: Duration) -> Result<LockGrant> {
        let mut state = self.state();
        let Some(job) = state.jobs.get_mut(&id) else {
            return Ok(LockGrant::Denied);
        };
        if !job.status.is_in_flight() {
            return Ok(LockGrant::Denied);
        }

        let now = Utc::now();
        let grant = match job.processing_lock {
            None => LockGrant::Acquired,
            Some(since) if lock_expired(since, ttl, now) => LockGrant::Reclaimed { stale_since: since },
            Some(_) => return Ok(LockGrant::Denied),
        };
        job.processing_lock = Some(now);
        job.updated_at = now;
        Ok(grant)
    }

    async fn release_lock(&self, id: JobId) -> Result<()> {
        self.release_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failing_releases
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            bail!("connection reset while releasing lock");
        }

        self.with_job(id, |job| {
            job.processing_lock = None;
            Ok(())
        })
    }

    async fn force_unlock(&self, id: JobId) -> Result<bool> {
        self.with_job(id, |job| Ok(job.processing_lock.take().is_some()))
    }

    async fn reset_failed(&self, id: JobId) -> Result<bool> {
        self.with_job(id, |job| {
            if job.status != JobStatus::Failed {
                return Ok(false);
            }
            job.status = JobStatus::Pending;
            job.error_message = None;
            job.processing_lock = None;
            Ok(true)
        })
    }

    async fn update_status(
        &self,
        id: JobId,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> Result<()> {
        self.with_job(id, |job| {
            if job.status.is_terminal() {
                bail!("job {} not found or already terminal", id);
            }
            let now = Utc::now();
            job.status = status;
            if let Some(message) = error_message {
                job.error_message = Some(message.to_string());
            }
            if matches!(status, JobStatus::Sent | JobStatus::Completed) {
                job.completed_at = Some(now);
            }
            job.updated_at = now;
            Ok(())
        })
    }

    async fn cache_domain_type(&self, id: JobId, domain_type: DomainType) -> Result<()> {
        self.with_job(id, |job| {
            job.metadata.domain_type.get_or_insert(domain_type);
            Ok(())
        })
    }

    async fn record_facts(&self, id: JobId, facts: &CompanyFacts) -> Result<()> {
        self.transition(id, JobStatus::Scraping, |job| {
            job.scrape_result = Some(Json(ResearchOutcome::Facts(facts.clone())));
            job.status = JobStatus::Scraped;
        })
    }

    async fn record_research_failure(&self, id: JobId, error: &str, message: &str) -> Result<()> {
        self.transition(id, JobStatus::Scraping, |job| {
            job.scrape_result = Some(Json(ResearchOutcome::Error {
                error: error.to_string(),
            }));
            job.status = JobStatus::Failed;
            job.error_message = Some(message.to_string());
        })
    }

    async fn record_email(
        &self,
        id: JobId,
        subject: &str,
        body_html: &str,
        draft: &str,
    ) -> Result<()> {
        self.transition(id, JobStatus::Generating, |job| {
            job.email_subject = Some(subject.to_string());
            job.email_body = Some(body_html.to_string());
            job.email_draft = Some(draft.to_string());
            job.status = JobStatus::Generated;
        })
    }

    async fn mark_sent(&self, id: JobId) -> Result<()> {
        self.mark_sent_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failing_mark_sent
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            bail!("connection reset while marking job sent");
        }

        self.transition(id, JobStatus::Sending, |job| {
            job.email_sent = true;
            job.status = JobStatus::Sent;
            job.completed_at = Some(Utc::now());
        })
    }

    async fn flag_email_sent(&self, id: JobId) -> Result<()> {
        self.with_job(id, |job| {
            job.email_sent = true;
            job.updated_at = Utc::now();
            Ok(())
        })
    }

    async fn find_resumable(&self, limit: i64, lock_ttl: Duration) -> Result<Vec<Job>> {
        let now = Utc::now();
        let mut jobs: Vec<Job> = self
            .state()
            .jobs
            .values()
            .filter(|job| job.status.is_in_flight() && !job.email_sent)
            .filter(|job| !job.is_locked(lock_ttl, now))
            .cloned()
            .collect();
        jobs.sort_by_key(|job| job.created_at);
        jobs.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(jobs)
    }

    async fn list_jobs(
        &self,
        company_id: CompanyId,
        status: Option<JobStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Job>> {
        let mut jobs: Vec<Job> = self
            .state()
            .jobs
            .values()
            .filter(|job| job.company_id == company_id)
            .filter(|job| status.map_or(true, |s| job.status == s))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(0))
            .take(usize::try_from(limit).unwrap_or(0))
            .collect())
    }

    async fn count_jobs(&self, company_id: CompanyId, status: Option<JobStatus>) -> Result<i64> {
        let count = self
            .state()
            .jobs
            .values()
            .filter(|job| job.company_id == company_id)
            .filter(|job| status.map_or(true, |s| job.status == s))
            .count();
        Ok(count as i64)
    }

    async fn find_missing_domain_type(&self, limit: i64) -> Result<Vec<Job>> {
        let mut jobs: Vec<Job> = self
            .state()
            .jobs
            .values()
            .filter(|job| job.metadata.domain_type.is_none())
            .cloned()
            .collect();
        jobs.sort_by_key(|job| job.created_at);
        jobs.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(jobs)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl CompanyDirectory for InMemoryStore {
    async fn find_company(&self, id: CompanyId) -> Result<Option<Company>> {
        Ok(self.state().companies.iter().find(|c| c.id == id).cloned())
    }

    async fn find_company_by_slug(&self, slug: &str) -> Result<Option<Company>> {
        Ok(self.state().companies.iter().find(|c| c.slug == slug).cloned())
    }

    async fn find_template(
        &self,
        id: TemplateId,
        company_id: CompanyId,
    ) -> Result<Option<PromptTemplate>> {
        Ok(self
            .state()
            .templates
            .iter()
            .find(|t| t.id == id && t.company_id == company_id && t.active)
            .cloned())
    }

    async fn find_default_template(&self, company_id: CompanyId) -> Result<Option<PromptTemplate>> {
        Ok(self
            .state()
            .templates
            .iter()
            .find(|t| t.company_id == company_id && t.is_default && t.active)
            .cloned())
    }

    async fn find_api_key(&self, prefix: &str) -> Result<Option<ApiKey>> {
        Ok(self
            .state()
            .api_keys
            .iter()
            .find(|k| k.key_prefix == prefix && k.active)
            .cloned())
    }

    async fn touch_api_key(&self, _key: &ApiKey) -> Result<()> {
        Ok(())
    }
}
