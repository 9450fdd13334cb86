//! Public demo form: registration and status polling.

use axum::{
    extract::{Extension, Path},
    Json,
};
use serde::Serialize;
use tracing::info;

use crate::common::JobId;
use crate::domains::outreach::activities::intake::{register_demo_lead, LeadSubmission};
use crate::domains::outreach::activities::status::JobStatusView;
use crate::domains::outreach::models::JobStatus;
use crate::domains::outreach::store::{CompanyDirectory, JobStore};
use crate::server::app::AppState;
use crate::server::auth::FormSecret;
use crate::server::error::ApiError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub message: String,
    pub job_id: JobId,
}

/// POST /api/demo/register
///
/// Records the lead and returns immediately; the sweep processes it.
pub async fn demo_register_handler(
    Extension(state): Extension<AppState>,
    _: FormSecret,
    Json(submission): Json<LeadSubmission>,
) -> Result<Json<RegisterResponse>, ApiError> {
    if !submission.missing_fields().is_empty() {
        return Err(ApiError::BadRequest("Missing required fields".to_string()));
    }

    let slug = &state.http.demo_company_slug;
    let company = state
        .deps
        .store
        .find_company_by_slug(slug)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Demo company '{}' not found", slug))?;

    let job = register_demo_lead(&company, submission, &state.deps).await?;
    if job.status == JobStatus::Skipped {
        return Err(ApiError::BadRequest(
            "Please use a business email address".to_string(),
        ));
    }

    info!(job_id = %job.id, "Demo registration queued");
    Ok(Json(RegisterResponse {
        message: "Demo registration successful".to_string(),
        job_id: job.id,
    }))
}

/// GET /api/demo/status/:job_id
pub async fn demo_status_handler(
    Extension(state): Extension<AppState>,
    _: FormSecret,
    Path(job_id): Path<String>,
) -> Result<Json<JobStatusView>, ApiError> {
    let not_found = || ApiError::NotFound("Job not found".to_string());
    let job_id = JobId::parse(&job_id).map_err(|_| not_found())?;

    let job = state
        .deps
        .store
        .find_job(job_id)
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(JobStatusView::from(&job)))
}
