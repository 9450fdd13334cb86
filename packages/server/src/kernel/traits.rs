// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Prompt building, stage ordering and status handling live in domains/outreach.
//
// Naming convention: Base* for trait names (e.g., BaseAI, BaseSmtpMailer)

use anyhow::Result;
use async_trait::async_trait;

use crate::domains::outreach::models::{CompanyFacts, SmtpSettings};

// =============================================================================
// AI Trait (Infrastructure - Generic LLM capabilities)
// =============================================================================

#[async_trait]
pub trait BaseAI: Send + Sync {
    /// Complete a system + user prompt pair (returns raw text response)
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;

    /// Complete expecting a JSON object (returns raw JSON string)
    /// Parse with serde_json::from_str in calling code
    async fn complete_json(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        self.complete(system_prompt, user_prompt).await
    }
}

// =============================================================================
// Research Trait (Infrastructure - company facts from a domain)
// =============================================================================

#[async_trait]
pub trait BaseCompanyResearcher: Send + Sync {
    /// Look up public facts about the company behind `domain`
    async fn research(&self, domain: &str) -> Result<CompanyFacts>;
}

// =============================================================================
// Mail Traits (Infrastructure - outbound email)
// =============================================================================

/// A fully rendered email ready for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
    /// Display name for the From header
    pub from_name: String,
    pub reply_to: Option<String>,
}

/// Provider acknowledgement of an accepted message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub message_id: Option<String>,
}

/// Hosted delivery provider for companies without their own SMTP server.
#[async_trait]
pub trait BaseManagedMailer: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> Result<DeliveryReceipt>;
}

/// Direct submission through a company's own SMTP server.
#[async_trait]
pub trait BaseSmtpMailer: Send + Sync {
    async fn send(&self, settings: &SmtpSettings, email: &OutboundEmail)
        -> Result<DeliveryReceipt>;
}
