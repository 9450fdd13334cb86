//! Delivery stage: wrap the generated body in the transactional envelope and
//! route it through the company's own SMTP server or the managed provider.

use std::time::Duration;
use thiserror::Error;
use tracing::info;

use super::generate::escape_html;
use crate::domains::outreach::models::{Company, Job, JobSource};
use crate::kernel::{OutboundEmail, ProviderFailure, ServerDeps};

const AI_DISCLOSURE: &str = "This is an AI-generated email based on publicly available \
information about your company. If you have any questions, please reply to this email.";

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("job has no generated email")]
    MissingContent,
    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),
    #[error("{0}")]
    Provider(ProviderFailure),
}

impl DeliveryError {
    /// Full error text for logs.
    pub fn detail(&self) -> String {
        match self {
            DeliveryError::Provider(failure) => failure.detail.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryChannel {
    /// The company's own SMTP server
    Smtp,
    /// Hosted provider under the company's display name
    Managed,
}

impl std::fmt::Display for DeliveryChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryChannel::Smtp => write!(f, "smtp"),
            DeliveryChannel::Managed => write!(f, "managed"),
        }
    }
}

/// Demo leads are always emailed. Client leads are emailed only when their
/// company configured its own SMTP server; otherwise the caller gets the
/// content and delivers it themselves.
pub fn needs_delivery(job: &Job, company: &Company) -> bool {
    match job.source() {
        JobSource::Demo => true,
        JobSource::ClientApi => company.smtp_configured(),
    }
}

pub fn channel_for(company: &Company) -> DeliveryChannel {
    if company.smtp_configured() {
        DeliveryChannel::Smtp
    } else {
        DeliveryChannel::Managed
    }
}

/// Greeting, body, signature, rule and disclosure footer.
pub fn render_envelope(first_name: &str, body_html: &str, company: &Company) -> String {
    let signature = match company.signature() {
        Some(signature) => signature.to_string(),
        None => format!("Best regards,<br>The {} Team", escape_html(&company.name)),
    };

    format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
  <p>Hi {first_name},</p>
  <div>{body_html}</div>
  <p style="margin-top: 20px;">{signature}</p>
  <hr style="border: 0; border-top: 1px solid #eee; margin: 20px 0;">
  <p style="color: #666; font-size: 12px;">{AI_DISCLOSURE}</p>
</div>"#,
        first_name = escape_html(first_name),
    )
}

pub async fn deliver_email(
    job: &Job,
    company: &Company,
    deps: &ServerDeps,
) -> Result<DeliveryChannel, DeliveryError> {
    let (Some(subject), Some(body_html)) = (&job.email_subject, &job.email_body) else {
        return Err(DeliveryError::MissingContent);
    };

    let email = OutboundEmail {
        to: job.email.clone(),
        subject: subject.clone(),
        html: render_envelope(&job.first_name, body_html, company),
        from_name: company.name.clone(),
        reply_to: None,
    };

    let channel = channel_for(company);
    info!(job_id = %job.id, channel = %channel, "Delivering email");

    let deadline = deps.settings.stage_timeout;
    let sent = match company.smtp_settings() {
        Some(settings) => {
            tokio::time::timeout(deadline, deps.smtp_mailer.send(&settings, &email)).await
        }
        None => tokio::time::timeout(deadline, deps.managed_mailer.send(&email)).await,
    };

    sent.map_err(|_| DeliveryError::Timeout(deadline))?
        .map_err(|e| DeliveryError::Provider(e.into()))?;

    Ok(channel)
}
