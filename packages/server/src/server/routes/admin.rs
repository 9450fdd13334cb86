//! Operator endpoint for inspecting and unsticking a single job.

use axum::{
    extract::{Extension, Query},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::JobId;
use crate::domains::outreach::activities::admin::{inspect_job, InspectOptions, JobInspection};
use crate::domains::outreach::models::{JobSource, JobStatus};
use crate::server::app::AppState;
use crate::server::auth::CronAuth;
use crate::server::error::ApiError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessJobQuery {
    pub job_id: Option<String>,
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub reset: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessJobResponse {
    pub job_id: JobId,
    pub original_status: JobStatus,
    pub status: JobStatus,
    pub is_locked: bool,
    pub locked_since: Option<DateTime<Utc>>,
    pub source: JobSource,
    pub email_generated: bool,
    pub email_sent: bool,
    pub error_message: Option<String>,
    /// Outcome label of the re-run, absent for a plain inspection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    pub message: String,
}

impl ProcessJobResponse {
    fn new(before: &JobInspection, after: &JobInspection, result: Option<String>, message: String) -> Self {
        Self {
            job_id: after.job_id,
            original_status: before.status,
            status: after.status,
            is_locked: after.is_locked,
            locked_since: after.locked_since,
            source: after.source,
            email_generated: after.email_generated,
            email_sent: after.email_sent,
            error_message: after.error_message.clone(),
            result,
            message,
        }
    }
}

/// GET /api/admin/process-job?jobId=..&force=true&reset=true
pub async fn admin_process_job_handler(
    Extension(state): Extension<AppState>,
    _: CronAuth,
    Query(query): Query<ProcessJobQuery>,
) -> Result<Json<ProcessJobResponse>, ApiError> {
    let raw_id = query
        .job_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Job ID is required".to_string()))?;
    let job_id = JobId::parse(&raw_id)
        .map_err(|_| ApiError::BadRequest(format!("Invalid job ID: {}", raw_id)))?;

    let options = InspectOptions {
        force: query.force,
        reset: query.reset,
    };
    let report = inspect_job(job_id, options, &state.deps)
        .await?
        .ok_or_else(|| ApiError::NotFound("Job not found".to_string()))?;

    let response = match (&report.outcome, &report.after) {
        (Some(outcome), Some(after)) => ProcessJobResponse::new(
            &report.before,
            after,
            Some(outcome.status_label().to_string()),
            outcome.message(),
        ),
        _ => {
            let message = if report.before.is_locked {
                "Job is currently locked. Use ?force=true to release lock and process"
            } else {
                "Job status retrieved. Use ?force=true or ?reset=true to reprocess"
            };
            ProcessJobResponse::new(&report.before, &report.before, None, message.to_string())
        }
    };

    Ok(Json(response))
}
