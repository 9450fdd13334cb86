use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use dotenvy::dotenv;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub openai_api_key: String,
    pub openai_model: String,
    pub firecrawl_api_key: String,
    pub resend_api_key: String,
    pub resend_sender_email: String,
    /// Shared secret for the sweep trigger and admin endpoints
    pub cron_secret: String,
    /// Shared secret sent by the public registration form
    pub website_form_secret: String,
    /// Slug of the company that owns demo submissions
    pub demo_company_slug: String,
    pub rate_limit_per_second: Option<u64>,
    pub pipeline: PipelineSettings,
}

/// Tunables for the lead processing pipeline.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Deadline applied to each research / generation / delivery call
    pub stage_timeout: Duration,
    /// A lock older than this is considered abandoned and may be reclaimed
    pub lock_ttl: Duration,
    /// Retry schedule for lock release and the sent marker: one attempt per
    /// entry, each delay slept only when another attempt follows
    pub release_backoff: Vec<Duration>,
    /// Maximum jobs resumed per sweep
    pub sweep_batch_size: i64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            stage_timeout: Duration::from_secs(90),
            lock_ttl: Duration::from_secs(600),
            release_backoff: vec![
                Duration::from_millis(200),
                Duration::from_millis(400),
                Duration::from_millis(800),
            ],
            sweep_batch_size: 5,
        }
    }
}

impl PipelineSettings {
    /// Number of times the lock release is attempted.
    pub fn release_attempts(&self) -> usize {
        self.release_backoff.len()
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let defaults = PipelineSettings::default();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: parse_or("PORT", 8080)?,
            openai_api_key: env::var("OPENAI_API_KEY").context("OPENAI_API_KEY must be set")?,
            openai_model: env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o".to_string()),
            firecrawl_api_key: env::var("FIRECRAWL_API_KEY")
                .context("FIRECRAWL_API_KEY must be set")?,
            resend_api_key: env::var("RESEND_API_KEY").context("RESEND_API_KEY must be set")?,
            resend_sender_email: env::var("RESEND_SENDER_EMAIL")
                .unwrap_or_else(|_| "onboarding@resend.dev".to_string()),
            cron_secret: env::var("CRON_SECRET").context("CRON_SECRET must be set")?,
            website_form_secret: env::var("WEBSITE_FORM_SECRET")
                .context("WEBSITE_FORM_SECRET must be set")?,
            demo_company_slug: env::var("DEMO_COMPANY_SLUG")
                .unwrap_or_else(|_| "agent-email".to_string()),
            rate_limit_per_second: env::var("RATE_LIMIT_PER_SECOND")
                .ok()
                .map(|v| v.parse::<u64>().context("RATE_LIMIT_PER_SECOND must be a valid number"))
                .transpose()?,
            pipeline: PipelineSettings {
                stage_timeout: Duration::from_secs(parse_or(
                    "STAGE_TIMEOUT_SECS",
                    defaults.stage_timeout.as_secs(),
                )?),
                lock_ttl: Duration::from_secs(parse_or(
                    "LOCK_TTL_SECS",
                    defaults.lock_ttl.as_secs(),
                )?),
                sweep_batch_size: parse_or("SWEEP_BATCH_SIZE", defaults.sweep_batch_size)?,
                ..defaults
            },
        })
    }
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => value
            .parse()
            .with_context(|| format!("{} must be a valid number", key)),
        Err(_) => Ok(default),
    }
}
