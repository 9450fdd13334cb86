//! Server dependencies for activities (using traits for testability)
//!
//! Every adapter and the store are injected here once at startup; nothing in
//! the pipeline reaches for a global client.

use anyhow::Result;
use sqlx::PgPool;
use std::sync::Arc;

use crate::config::{Config, PipelineSettings};
use crate::domains::outreach::store::{OutreachStore, PostgresStore};
use crate::kernel::{
    BaseAI, BaseCompanyResearcher, BaseManagedMailer, BaseSmtpMailer, FirecrawlClient,
    LettreSmtpMailer, OpenAIAdapter, ResendClient,
};

/// Server dependencies accessible to activities
#[derive(Clone)]
pub struct ServerDeps {
    pub store: Arc<dyn OutreachStore>,
    pub ai: Arc<dyn BaseAI>,
    pub researcher: Arc<dyn BaseCompanyResearcher>,
    /// Hosted provider for companies without their own SMTP server
    pub managed_mailer: Arc<dyn BaseManagedMailer>,
    /// Direct submission for any lead whose company configured SMTP
    pub smtp_mailer: Arc<dyn BaseSmtpMailer>,
    pub settings: PipelineSettings,
}

impl ServerDeps {
    pub fn new(
        store: Arc<dyn OutreachStore>,
        ai: Arc<dyn BaseAI>,
        researcher: Arc<dyn BaseCompanyResearcher>,
        managed_mailer: Arc<dyn BaseManagedMailer>,
        smtp_mailer: Arc<dyn BaseSmtpMailer>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            ai,
            researcher,
            managed_mailer,
            smtp_mailer,
            settings,
        }
    }

    /// Production wiring: Postgres, OpenAI, Firecrawl, Resend and lettre.
    pub fn from_config(config: &Config, pool: PgPool) -> Result<Self> {
        Ok(Self::new(
            Arc::new(PostgresStore::new(pool)),
            Arc::new(OpenAIAdapter::new(
                config.openai_api_key.clone(),
                config.openai_model.clone(),
            )?),
            Arc::new(FirecrawlClient::new(config.firecrawl_api_key.clone())?),
            Arc::new(ResendClient::new(
                config.resend_api_key.clone(),
                config.resend_sender_email.clone(),
            )?),
            Arc::new(LettreSmtpMailer::new()),
            config.pipeline.clone(),
        ))
    }
}
