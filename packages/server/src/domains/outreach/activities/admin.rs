//! Operator tooling: lock inspection, forced reprocessing, manual reset.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::pipeline::{process_job, PipelineOutcome};
use crate::common::JobId;
use crate::domains::outreach::models::{Job, JobSource, JobStatus};
use crate::domains::outreach::store::JobStore;
use crate::kernel::ServerDeps;

#[derive(Debug, Clone, Default)]
pub struct InspectOptions {
    /// Clear the lock whatever its age, then run the pipeline
    pub force: bool,
    /// Move a failed job back to `pending` before running
    pub reset: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInspection {
    pub job_id: JobId,
    pub status: JobStatus,
    pub is_locked: bool,
    pub locked_since: Option<DateTime<Utc>>,
    pub source: JobSource,
    pub email_generated: bool,
    pub email_sent: bool,
    pub error_message: Option<String>,
}

impl JobInspection {
    fn of(job: &Job, deps: &ServerDeps) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            is_locked: job.is_locked(deps.settings.lock_ttl, Utc::now()),
            locked_since: job.processing_lock,
            source: job.source(),
            email_generated: job.has_email(),
            email_sent: job.email_sent,
            error_message: job.error_message.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AdminReport {
    pub before: JobInspection,
    pub outcome: Option<PipelineOutcome>,
    pub after: Option<JobInspection>,
}

/// Inspect a job and, if asked, unlock/reset and reprocess it.
/// `Ok(None)` when the job does not exist.
pub async fn inspect_job(
    job_id: JobId,
    options: InspectOptions,
    deps: &ServerDeps,
) -> Result<Option<AdminReport>> {
    let Some(job) = deps.store.find_job(job_id).await? else {
        return Ok(None);
    };
    let before = JobInspection::of(&job, deps);

    if !options.force && !options.reset {
        return Ok(Some(AdminReport {
            before,
            outcome: None,
            after: None,
        }));
    }

    if options.force && deps.store.force_unlock(job_id).await? {
        warn!(job_id = %job_id, "Processing lock cleared by operator");
    }
    if options.reset && deps.store.reset_failed(job_id).await? {
        info!(job_id = %job_id, "Failed job reset to pending by operator");
    }

    let outcome = process_job(job_id, deps).await;
    let after = deps
        .store
        .find_job(job_id)
        .await?
        .map(|job| JobInspection::of(&job, deps));

    Ok(Some(AdminReport {
        before,
        outcome: Some(outcome),
        after,
    }))
}
