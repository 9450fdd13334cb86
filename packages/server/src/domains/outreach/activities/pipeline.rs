//! Pipeline orchestrator.
//!
//! Drives one job through classify -> research -> generate -> deliver under
//! the job's lock. Stage failures never escape as `Err`: they are persisted
//! on the job and reported through `PipelineOutcome`.

use serde::Serialize;
use tracing::{error, info, warn};

use super::classify::{classify_email, DomainType};
use super::deliver::{deliver_email, needs_delivery};
use super::generate::generate_email;
use super::lock;
use super::research::research_company;
use crate::common::JobId;
use crate::domains::outreach::models::{Company, CompanyFacts, Job, JobStatus};
use crate::domains::outreach::store::{CompanyDirectory, JobStore};
use crate::kernel::ServerDeps;

/// The stored email of a job that finished (or already had) generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettledEmail {
    pub job_id: JobId,
    pub status: JobStatus,
    pub email_subject: String,
    pub email_body: String,
    pub email_sent: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Email generated and handed back to the caller (`completed` or `generated`)
    Completed(SettledEmail),
    /// Email generated and delivered
    Sent(SettledEmail),
    /// Not a qualifying lead (`rejected` or `skipped`)
    Rejected { status: JobStatus, message: String },
    Failed { message: String },
    /// Another run holds the lock
    Busy,
    NotFound,
}

impl PipelineOutcome {
    /// Status string reported to callers.
    pub fn status_label(&self) -> &'static str {
        match self {
            PipelineOutcome::Completed(email) | PipelineOutcome::Sent(email) => {
                email.status.as_str()
            }
            PipelineOutcome::Rejected { status, .. } => status.as_str(),
            PipelineOutcome::Failed { .. } => JobStatus::Failed.as_str(),
            PipelineOutcome::Busy => "processing",
            PipelineOutcome::NotFound => "not_found",
        }
    }

    pub fn message(&self) -> String {
        match self {
            PipelineOutcome::Completed(_) => "Email generated".to_string(),
            PipelineOutcome::Sent(_) => "Email sent".to_string(),
            PipelineOutcome::Rejected { message, .. } | PipelineOutcome::Failed { message } => {
                message.clone()
            }
            PipelineOutcome::Busy => "Job is already being processed".to_string(),
            PipelineOutcome::NotFound => "Job not found".to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PipelineOutcome::Completed(_) | PipelineOutcome::Sent(_))
    }
}

/// Outcome for a job that needs no further work, `None` while in flight.
pub fn settled_outcome(job: &Job) -> Option<PipelineOutcome> {
    let email = || SettledEmail {
        job_id: job.id,
        status: job.status,
        email_subject: job.email_subject.clone().unwrap_or_default(),
        email_body: job.email_body.clone().unwrap_or_default(),
        email_sent: job.email_sent,
    };

    match job.status {
        JobStatus::Sent => Some(PipelineOutcome::Sent(email())),
        JobStatus::Completed | JobStatus::Generated => Some(PipelineOutcome::Completed(email())),
        JobStatus::Rejected | JobStatus::Skipped => Some(PipelineOutcome::Rejected {
            status: job.status,
            message: job
                .error_message
                .clone()
                .unwrap_or_else(|| "Not a business email domain".to_string()),
        }),
        JobStatus::Failed => Some(PipelineOutcome::Failed {
            message: job
                .error_message
                .clone()
                .unwrap_or_else(|| "Unknown error".to_string()),
        }),
        _ => None,
    }
}

/// Run (or resume) the pipeline for one job.
pub async fn process_job(job_id: JobId, deps: &ServerDeps) -> PipelineOutcome {
    let job = match deps.store.find_job(job_id).await {
        Ok(Some(job)) => job,
        Ok(None) => return PipelineOutcome::NotFound,
        Err(e) => {
            error!(job_id = %job_id, error = %e, "Failed to load job");
            return PipelineOutcome::Failed {
                message: "Failed to load job".to_string(),
            };
        }
    };

    if let Some(outcome) = settled_outcome(&job) {
        info!(job_id = %job_id, status = %job.status, "Job already settled; returning stored result");
        return outcome;
    }

    match lock::with_lock(job_id, deps, || run_locked(job_id, deps)).await {
        Ok(Some(outcome)) => outcome,
        Ok(None) => contended(job_id, deps).await,
        Err(e) => {
            error!(job_id = %job_id, error = %e, "Lock acquisition failed");
            PipelineOutcome::Failed {
                message: "Failed to acquire processing lock".to_string(),
            }
        }
    }
}

/// Lock unavailable: report the stored result if the other run already
/// finished, otherwise that the job is busy.
async fn contended(job_id: JobId, deps: &ServerDeps) -> PipelineOutcome {
    match deps.store.find_job(job_id).await {
        Ok(Some(job)) => settled_outcome(&job).unwrap_or(PipelineOutcome::Busy),
        Ok(None) => PipelineOutcome::NotFound,
        Err(_) => PipelineOutcome::Busy,
    }
}

async fn run_locked(job_id: JobId, deps: &ServerDeps) -> PipelineOutcome {
    // Re-read under the lock; another run may have moved it since
    let job = match deps.store.find_job(job_id).await {
        Ok(Some(job)) => job,
        Ok(None) => return PipelineOutcome::NotFound,
        Err(e) => return fail(job_id, deps, format!("Failed to load job: {}", e)).await,
    };
    if let Some(outcome) = settled_outcome(&job) {
        return outcome;
    }

    let company = match deps.store.find_company(job.company_id).await {
        Ok(Some(company)) => company,
        Ok(None) => return fail(job_id, deps, "Company not found".to_string()).await,
        Err(e) => return fail(job_id, deps, format!("Failed to load company: {}", e)).await,
    };

    run_stages(job, &company, deps).await
}

async fn run_stages(mut job: Job, company: &Company, deps: &ServerDeps) -> PipelineOutcome {
    let job_id = job.id;
    let mut facts: Option<CompanyFacts> = job.facts().cloned();

    loop {
        match job.status {
            JobStatus::Pending => {
                let domain_type = match job.domain_type() {
                    Some(cached) => cached,
                    None => {
                        let classified = classify_email(&job.email);
                        if let Err(e) = deps.store.cache_domain_type(job_id, classified).await {
                            warn!(job_id = %job_id, error = %e, "Failed to cache domain type");
                        }
                        classified
                    }
                };

                if !domain_type.is_business() {
                    return reject(job_id, domain_type, deps).await;
                }
                if let Err(outcome) = advance(&mut job, JobStatus::Scraping, deps).await {
                    return outcome;
                }
            }

            JobStatus::Scraping => match research_company(&job.domain, deps).await {
                Ok(found) => {
                    if let Err(e) = deps.store.record_facts(job_id, &found).await {
                        return fail(job_id, deps, format!("Failed to store research: {}", e))
                            .await;
                    }
                    info!(job_id = %job_id, company = %found.company_name, "Research complete");
                    facts = Some(found);
                    job.status = JobStatus::Scraped;
                }
                Err(e) => {
                    let message = format!("Scraping failed: {}", e);
                    let detail = e.detail();
                    warn!(job_id = %job_id, error = %detail, "Research failed");
                    if let Err(store_err) = deps
                        .store
                        .record_research_failure(job_id, &detail, &message)
                        .await
                    {
                        error!(job_id = %job_id, error = %store_err, "Failed to persist research failure");
                    }
                    return PipelineOutcome::Failed { message };
                }
            },

            JobStatus::Scraped => {
                if let Err(outcome) = advance(&mut job, JobStatus::Generating, deps).await {
                    return outcome;
                }
            }

            JobStatus::Generating => {
                let Some(facts) = facts.as_ref() else {
                    return fail(job_id, deps, "Email generation failed: missing research facts".to_string())
                        .await;
                };
                match generate_email(&job, facts, company, deps).await {
                    Ok(email) => {
                        if let Err(e) = deps
                            .store
                            .record_email(job_id, &email.subject, &email.body_html, &email.body_text)
                            .await
                        {
                            return fail(job_id, deps, format!("Failed to store email: {}", e)).await;
                        }
                        info!(job_id = %job_id, "Email generated");
                        job.email_subject = Some(email.subject);
                        job.email_body = Some(email.body_html);
                        job.email_draft = Some(email.body_text);
                        job.status = JobStatus::Generated;
                    }
                    Err(e) => {
                        warn!(job_id = %job_id, error = %e.detail(), "Generation failed");
                        return fail(job_id, deps, format!("Email generation failed: {}", e)).await;
                    }
                }
            }

            JobStatus::Generated => {
                let next = if needs_delivery(&job, company) {
                    JobStatus::Sending
                } else {
                    JobStatus::Completed
                };
                if let Err(outcome) = advance(&mut job, next, deps).await {
                    return outcome;
                }
            }

            JobStatus::Sending => {
                // A flagged job already delivered; only the status is missing
                if !job.email_sent {
                    match deliver_email(&job, company, deps).await {
                        Ok(channel) => info!(job_id = %job_id, channel = %channel, "Email sent"),
                        Err(e) => {
                            warn!(job_id = %job_id, error = %e.detail(), "Delivery failed");
                            return fail(job_id, deps, format!("Email sending failed: {}", e))
                                .await;
                        }
                    }
                }
                record_delivery(job_id, deps).await;
                job.email_sent = true;
                job.status = JobStatus::Sent;
            }

            _ => {
                return settled_outcome(&job).unwrap_or_else(|| PipelineOutcome::Failed {
                    message: format!("Unexpected job status {}", job.status),
                })
            }
        }
    }
}

/// The email left: move the job to `sent`, retrying on the backoff schedule.
/// If that never lands, flag `email_sent` alone so no sweep delivers it again.
async fn record_delivery(job_id: JobId, deps: &ServerDeps) {
    let marked = lock::retry_with_backoff(
        job_id,
        "Marking job sent",
        &deps.settings.release_backoff,
        || deps.store.mark_sent(job_id),
    )
    .await;

    let Err(e) = marked else {
        return;
    };
    error!(job_id = %job_id, error = %e, "Email delivered but status update failed");

    if let Err(e) = deps.store.flag_email_sent(job_id).await {
        error!(
            job_id = %job_id,
            error = %e,
            "Could not flag delivered email; the job may be resent after its lock expires"
        );
    }
}

/// Persist a forward transition, keeping `job` in step with the store.
async fn advance(job: &mut Job, next: JobStatus, deps: &ServerDeps) -> Result<(), PipelineOutcome> {
    if !job.status.can_advance_to(next) {
        return Err(fail(
            job.id,
            deps,
            format!("Illegal transition {} -> {}", job.status, next),
        )
        .await);
    }

    if let Err(e) = deps.store.update_status(job.id, next, None).await {
        return Err(fail(job.id, deps, format!("Failed to update status: {}", e)).await);
    }

    info!(job_id = %job.id, from = %job.status, to = %next, "Job status changed");
    job.status = next;
    Ok(())
}

async fn reject(job_id: JobId, domain_type: DomainType, deps: &ServerDeps) -> PipelineOutcome {
    let message = format!("{} email domain", domain_type);
    info!(job_id = %job_id, domain_type = %domain_type, "Lead rejected");

    if let Err(e) = deps
        .store
        .update_status(job_id, JobStatus::Rejected, Some(&message))
        .await
    {
        error!(job_id = %job_id, error = %e, "Failed to persist rejection");
    }

    PipelineOutcome::Rejected {
        status: JobStatus::Rejected,
        message,
    }
}

async fn fail(job_id: JobId, deps: &ServerDeps, message: String) -> PipelineOutcome {
    if let Err(e) = deps
        .store
        .update_status(job_id, JobStatus::Failed, Some(&message))
        .await
    {
        error!(job_id = %job_id, error = %e, "Failed to persist job failure");
    }
    PipelineOutcome::Failed { message }
}
