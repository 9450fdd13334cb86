//! Polling view of a job for asynchronous flows.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::common::JobId;
use crate::domains::outreach::models::{Job, JobStatus};

#[derive(Debug, Clone, Serialize)]
pub struct Timestamps {
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub completed: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusView {
    pub job_id: JobId,
    pub status: JobStatus,
    pub progress: u8,
    pub status_message: String,
    pub error: Option<String>,
    pub timestamps: Timestamps,
}

pub fn status_message(job: &Job) -> String {
    match job.status {
        JobStatus::Pending => "Your request is pending...".to_string(),
        JobStatus::Scraping => "Researching your company...".to_string(),
        JobStatus::Scraped => "Research complete, preparing email...".to_string(),
        JobStatus::Generating => "Crafting your personalized email...".to_string(),
        JobStatus::Generated => "Email created, preparing to send...".to_string(),
        JobStatus::Sending => "Sending your email...".to_string(),
        JobStatus::Sent | JobStatus::Completed => "Email sent successfully!".to_string(),
        JobStatus::Failed => format!(
            "Process failed: {}",
            job.error_message.as_deref().unwrap_or("Unknown error")
        ),
        JobStatus::Rejected | JobStatus::Skipped => job
            .error_message
            .clone()
            .unwrap_or_else(|| "Your request was rejected".to_string()),
    }
}

impl From<&Job> for JobStatusView {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            progress: job.status.progress(),
            status_message: status_message(job),
            error: job.error_message.clone(),
            timestamps: Timestamps {
                created: job.created_at,
                updated: job.updated_at,
                completed: job.completed_at,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::CompanyId;

    fn job(status: JobStatus) -> Job {
        Job::builder()
            .company_id(CompanyId::new())
            .first_name("Ada")
            .last_name("Lovelace")
            .email("ada@acme.com")
            .domain("acme.com")
            .status(status)
            .build()
    }

    #[test]
    fn test_in_flight_view() {
        let view = JobStatusView::from(&job(JobStatus::Generating));
        assert_eq!(view.progress, 60);
        assert_eq!(view.status_message, "Crafting your personalized email...");
        assert!(view.timestamps.completed.is_none());
    }

    #[test]
    fn test_failed_view_carries_error() {
        let mut failed = job(JobStatus::Failed);
        failed.error_message = Some("Scraping failed: timeout".into());
        let view = JobStatusView::from(&failed);
        assert_eq!(view.progress, 0);
        assert_eq!(view.status_message, "Process failed: Scraping failed: timeout");
    }

    #[test]
    fn test_rejected_without_message_uses_default() {
        assert_eq!(
            status_message(&job(JobStatus::Rejected)),
            "Your request was rejected"
        );
    }

    #[test]
    fn test_view_serializes_camel_case() {
        let json = serde_json::to_value(JobStatusView::from(&job(JobStatus::Sent))).unwrap();
        assert_eq!(json["status"], "sent");
        assert_eq!(json["progress"], 100);
        assert!(json.get("statusMessage").is_some());
    }
}
