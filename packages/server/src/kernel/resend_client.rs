//! Resend implementation of `BaseManagedMailer`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{BaseManagedMailer, DeliveryReceipt, OutboundEmail, ProviderError};

const RESEND_API_URL: &str = "https://api.resend.com";

pub struct ResendClient {
    client: Client,
    api_key: String,
    sender_email: String,
    base_url: String,
}

#[derive(Serialize)]
struct SendEmailRequest<'a> {
    from: String,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<&'a str>,
}

#[derive(Deserialize)]
struct SendEmailResponse {
    id: Option<String>,
}

impl ResendClient {
    pub fn new(api_key: impl Into<String>, sender_email: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create Resend HTTP client")?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            sender_email: sender_email.into(),
            base_url: RESEND_API_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[async_trait]
impl BaseManagedMailer for ResendClient {
    async fn send(&self, email: &OutboundEmail) -> Result<DeliveryReceipt> {
        let request = SendEmailRequest {
            from: format!("{} <{}>", email.from_name, self.sender_email),
            to: [email.to.as_str()],
            subject: &email.subject,
            html: &email.html,
            reply_to: email.reply_to.as_deref(),
        };

        let response = self
            .client
            .post(format!("{}/emails", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Resend request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::status("Resend", status, text).into());
        }

        let body: SendEmailResponse = response
            .json()
            .await
            .context("Failed to parse Resend response")?;

        debug!(message_id = ?body.id, "Resend accepted email");

        Ok(DeliveryReceipt {
            message_id: body.id,
        })
    }
}
