use axum::{extract::Extension, Json};
use serde::Serialize;

use crate::domains::outreach::activities::sweep::{sweep, SweepEntry};
use crate::server::app::AppState;
use crate::server::auth::CronAuth;
use crate::server::error::ApiError;

#[derive(Debug, Serialize)]
pub struct SweepResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<SweepEntry>,
}

/// GET /api/cron/process-queue
pub async fn cron_process_queue_handler(
    Extension(state): Extension<AppState>,
    _: CronAuth,
) -> Result<Json<SweepResponse>, ApiError> {
    let results = sweep(&state.deps).await?;

    let message = if results.is_empty() {
        "No jobs to process at this time".to_string()
    } else {
        format!("Processed {} jobs", results.len())
    };

    Ok(Json(SweepResponse { message, results }))
}
