//! Client API: synchronous lead processing and job listing.

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::common::JobId;
use crate::domains::outreach::activities::intake::{submit_client_lead, ClientIntake, LeadSubmission};
use crate::domains::outreach::activities::pipeline::{process_job, PipelineOutcome};
use crate::domains::outreach::models::{Job, JobStatus};
use crate::domains::outreach::store::JobStore;
use crate::server::app::AppState;
use crate::server::auth::ClientAuth;
use crate::server::error::ApiError;

const DEFAULT_PAGE_SIZE: u32 = 10;
const MAX_PAGE_SIZE: u32 = 100;

/// Response for a client lead after the pipeline ran.
pub fn outcome_response(job_id: JobId, outcome: PipelineOutcome) -> Response {
    match outcome {
        PipelineOutcome::Completed(email) | PipelineOutcome::Sent(email) => Json(json!({
            "success": true,
            "jobId": job_id,
            "status": email.status,
            "emailSubject": email.email_subject,
            "emailBody": email.email_body,
            "emailSent": email.email_sent,
            "message": "Lead processed successfully",
        }))
        .into_response(),
        PipelineOutcome::Rejected { status, message } => Json(json!({
            "success": false,
            "jobId": job_id,
            "status": status,
            "message": message,
        }))
        .into_response(),
        PipelineOutcome::Busy => (
            StatusCode::CONFLICT,
            Json(json!({
                "success": false,
                "jobId": job_id,
                "status": "processing",
                "message": PipelineOutcome::Busy.message(),
            })),
        )
            .into_response(),
        other => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "success": false,
                "jobId": job_id,
                "status": other.status_label(),
                "message": other.message(),
            })),
        )
            .into_response(),
    }
}

/// POST /api/client/process-lead
pub async fn client_process_lead_handler(
    Extension(state): Extension<AppState>,
    ClientAuth { company, .. }: ClientAuth,
    Json(submission): Json<LeadSubmission>,
) -> Result<Response, ApiError> {
    let missing = submission.missing_fields();
    if !missing.is_empty() {
        return Err(ApiError::BadRequest(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )));
    }

    let job = match submit_client_lead(&company, submission, &state.deps).await? {
        ClientIntake::Created(job) => job,
        ClientIntake::NotBusiness(_) => {
            return Ok(Json(json!({
                "success": false,
                "businessEmail": false,
                "error": "Please use a business email address",
            }))
            .into_response());
        }
    };

    let outcome = process_job(job.id, &state.deps).await;
    info!(job_id = %job.id, status = outcome.status_label(), "Client lead processed");

    Ok(outcome_response(job.id, outcome))
}

#[derive(Debug, Deserialize)]
pub struct JobsQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct JobSummary {
    pub id: JobId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub domain: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl From<Job> for JobSummary {
    fn from(job: Job) -> Self {
        Self {
            id: job.id,
            first_name: job.first_name,
            last_name: job.last_name,
            email: job.email,
            domain: job.domain,
            status: job.status,
            created_at: job.created_at,
            updated_at: job.updated_at,
            completed_at: job.completed_at,
            error_message: job.error_message,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub pages: i64,
}

#[derive(Debug, Serialize)]
pub struct JobsResponse {
    pub jobs: Vec<JobSummary>,
    pub pagination: Pagination,
}

/// GET /api/client/jobs
pub async fn client_jobs_handler(
    Extension(state): Extension<AppState>,
    ClientAuth { company, .. }: ClientAuth,
    Query(query): Query<JobsQuery>,
) -> Result<Json<JobsResponse>, ApiError> {
    let status = match query.status.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(
            raw.parse::<JobStatus>()
                .map_err(|_| ApiError::BadRequest(format!("Invalid status filter: {}", raw)))?,
        ),
        None => None,
    };
    let page = query.page.unwrap_or(1).max(1);
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let offset = i64::from(page - 1) * i64::from(limit);

    let store = &state.deps.store;
    let jobs = store
        .list_jobs(company.id, status, i64::from(limit), offset)
        .await?;
    let total = store.count_jobs(company.id, status).await?;
    let pages = (total + i64::from(limit) - 1) / i64::from(limit);

    Ok(Json(JobsResponse {
        jobs: jobs.into_iter().map(JobSummary::from).collect(),
        pagination: Pagination {
            total,
            page,
            limit,
            pages,
        },
    }))
}
