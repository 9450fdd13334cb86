//! Queue sweeper: resume in-flight jobs abandoned by crashed runs.
//!
//! Externally triggered. Jobs run one after another; the lock and the
//! settled-job short circuit in the orchestrator keep repeats harmless.

use anyhow::Result;
use serde::Serialize;
use tracing::info;

use super::pipeline::{process_job, PipelineOutcome};
use crate::common::JobId;
use crate::domains::outreach::store::JobStore;
use crate::kernel::ServerDeps;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepEntry {
    pub job_id: JobId,
    pub status: String,
    pub message: String,
}

impl SweepEntry {
    fn new(job_id: JobId, outcome: &PipelineOutcome) -> Self {
        Self {
            job_id,
            status: outcome.status_label().to_string(),
            message: outcome.message(),
        }
    }
}

/// Process up to one batch of the oldest resumable jobs.
pub async fn sweep(deps: &ServerDeps) -> Result<Vec<SweepEntry>> {
    let batch = deps
        .store
        .find_resumable(deps.settings.sweep_batch_size, deps.settings.lock_ttl)
        .await?;

    info!(count = batch.len(), "Sweeping resumable jobs");

    let mut entries = Vec::with_capacity(batch.len());
    for job in batch {
        let outcome = process_job(job.id, deps).await;
        info!(job_id = %job.id, status = outcome.status_label(), "Swept job");
        entries.push(SweepEntry::new(job.id, &outcome));
    }
    Ok(entries)
}
