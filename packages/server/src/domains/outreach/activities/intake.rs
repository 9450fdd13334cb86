//! Lead intake: validate a submission and create its job.

use anyhow::Result;
use serde::Deserialize;
use tracing::info;

use super::classify::{classify_email, email_domain, DomainType};
use crate::common::TemplateId;
use crate::domains::outreach::models::{Company, Job, JobMetadata, JobSource, JobStatus, NewJob};
use crate::domains::outreach::store::JobStore;
use crate::kernel::ServerDeps;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadSubmission {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub template_id: Option<TemplateId>,
}

impl LeadSubmission {
    /// Names of required fields that are blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("firstName", &self.first_name),
            ("lastName", &self.last_name),
            ("email", &self.email),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }

    fn into_new_job(self, company: &Company, metadata: JobMetadata, status: JobStatus) -> NewJob {
        let domain = email_domain(&self.email);
        NewJob {
            company_id: company.id,
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email: self.email.trim().to_string(),
            domain,
            status,
            metadata,
            error_message: None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ClientIntake {
    Created(Job),
    /// No job is created for non-business addresses
    NotBusiness(DomainType),
}

/// Client API submission. Only business addresses become jobs.
pub async fn submit_client_lead(
    company: &Company,
    submission: LeadSubmission,
    deps: &ServerDeps,
) -> Result<ClientIntake> {
    let domain_type = classify_email(&submission.email);
    if !domain_type.is_business() {
        info!(company_id = %company.id, domain_type = %domain_type, "Client lead is not a business email");
        return Ok(ClientIntake::NotBusiness(domain_type));
    }

    let metadata = JobMetadata {
        source: JobSource::ClientApi,
        domain_type: Some(domain_type),
        template_id: submission.template_id,
    };
    let job = deps
        .store
        .insert_job(submission.into_new_job(company, metadata, JobStatus::Pending))
        .await?;

    info!(job_id = %job.id, company_id = %company.id, "Client lead accepted");
    Ok(ClientIntake::Created(job))
}

/// Demo form submission. Always records a job; non-business addresses are
/// stored as `skipped` so the demo can report why.
pub async fn register_demo_lead(
    company: &Company,
    submission: LeadSubmission,
    deps: &ServerDeps,
) -> Result<Job> {
    let domain_type = classify_email(&submission.email);
    let metadata = JobMetadata {
        source: JobSource::Demo,
        domain_type: Some(domain_type),
        template_id: None,
    };

    let (status, error_message) = if domain_type.is_business() {
        (JobStatus::Pending, None)
    } else {
        (JobStatus::Skipped, Some(format!("{} email domain", domain_type)))
    };
    let mut new_job = submission.into_new_job(company, metadata, status);
    new_job.error_message = error_message;

    let job = deps.store.insert_job(new_job).await?;
    info!(job_id = %job.id, status = %job.status, "Demo lead registered");
    Ok(job)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_reports_blank_values() {
        let submission = LeadSubmission {
            first_name: "Ada".into(),
            last_name: " ".into(),
            email: "".into(),
            template_id: None,
        };
        assert_eq!(submission.missing_fields(), vec!["lastName", "email"]);
    }

    #[test]
    fn test_submission_accepts_camel_case_json() {
        let submission: LeadSubmission = serde_json::from_str(
            r#"{"firstName":"Ada","lastName":"Lovelace","email":"ada@acme.com"}"#,
        )
        .unwrap();
        assert!(submission.missing_fields().is_empty());
        assert!(submission.template_id.is_none());
    }
}
