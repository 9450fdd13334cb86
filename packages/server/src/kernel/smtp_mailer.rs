//! lettre implementation of `BaseSmtpMailer`.
//!
//! Opens a fresh connection per message using the company's own server;
//! implicit TLS when the company marked it secure, STARTTLS otherwise.

use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;
use tracing::debug;

use super::{BaseSmtpMailer, DeliveryReceipt, OutboundEmail};
use crate::domains::outreach::models::SmtpSettings;

const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Default)]
pub struct LettreSmtpMailer;

impl LettreSmtpMailer {
    pub fn new() -> Self {
        Self
    }
}

/// Build the MIME message for `email` as sent from `settings`.
pub fn build_message(settings: &SmtpSettings, email: &OutboundEmail) -> Result<Message> {
    let from_address: Address = settings
        .from_email
        .parse()
        .with_context(|| format!("Invalid SMTP from address: {}", settings.from_email))?;
    let to_address: Address = email
        .to
        .parse()
        .with_context(|| format!("Invalid recipient address: {}", email.to))?;

    let mut builder = Message::builder()
        .from(Mailbox::new(Some(settings.from_name.clone()), from_address))
        .to(Mailbox::new(None, to_address))
        .subject(email.subject.clone())
        .header(ContentType::TEXT_HTML);

    if let Some(reply_to) = settings.reply_to.as_deref().or(email.reply_to.as_deref()) {
        let reply_to: Address = reply_to
            .parse()
            .with_context(|| format!("Invalid reply-to address: {}", reply_to))?;
        builder = builder.reply_to(Mailbox::new(None, reply_to));
    }

    builder
        .body(email.html.clone())
        .context("Failed to build email message")
}

fn transport(settings: &SmtpSettings) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
    let builder = if settings.secure {
        AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
    } else {
        AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
    }
    .with_context(|| format!("Invalid SMTP host: {}", settings.host))?;

    Ok(builder
        .port(settings.port)
        .credentials(Credentials::new(
            settings.user.clone(),
            settings.password.clone(),
        ))
        .timeout(Some(SMTP_TIMEOUT))
        .build())
}

#[async_trait]
impl BaseSmtpMailer for LettreSmtpMailer {
    async fn send(
        &self,
        settings: &SmtpSettings,
        email: &OutboundEmail,
    ) -> Result<DeliveryReceipt> {
        let message = build_message(settings, email)?;
        let mailer = transport(settings)?;

        let response = mailer
            .send(message)
            .await
            .with_context(|| format!("SMTP delivery via {} failed", settings.host))?;

        let reply = response.message().collect::<Vec<_>>().join(" ");
        debug!(host = %settings.host, code = %response.code(), "SMTP server accepted email");

        Ok(DeliveryReceipt {
            message_id: Some(reply).filter(|r| !r.is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> SmtpSettings {
        SmtpSettings {
            host: "smtp.acme.com".into(),
            port: 587,
            user: "mailer@acme.com".into(),
            password: "secret".into(),
            secure: false,
            from_name: "Acme Sales".into(),
            from_email: "sales@acme.com".into(),
            reply_to: Some("replies@acme.com".into()),
        }
    }

    fn email() -> OutboundEmail {
        OutboundEmail {
            to: "lead@prospect.io".into(),
            subject: "An idea for Prospect".into(),
            html: "<p>Hi</p>".into(),
            from_name: "Acme".into(),
            reply_to: None,
        }
    }

    #[test]
    fn test_message_headers_use_company_settings() {
        let message = build_message(&settings(), &email()).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("Acme Sales"));
        assert!(raw.contains("<sales@acme.com>"));
        assert!(raw.contains("To: lead@prospect.io"));
        assert!(raw.contains("Reply-To: replies@acme.com"));
        assert!(raw.contains("Subject: An idea for Prospect"));
    }

    #[test]
    fn test_invalid_recipient_is_rejected() {
        let mut email = email();
        email.to = "not an address".into();
        assert!(build_message(&settings(), &email).is_err());
    }
}
