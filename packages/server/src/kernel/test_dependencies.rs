// TestDependencies - mock implementations for testing
//
// Provides mock adapters and an in-memory store that can be injected into
// ServerDeps for tests. Every mock records its calls.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::{
    BaseAI, BaseCompanyResearcher, BaseManagedMailer, BaseSmtpMailer, DeliveryReceipt,
    OutboundEmail, ServerDeps,
};
use crate::config::PipelineSettings;
use crate::domains::outreach::models::{CompanyFacts, SmtpSettings};
use crate::domains::outreach::store::InMemoryStore;

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn pause(delay: Option<Duration>) {
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
}

// =============================================================================
// Mock Researcher
// =============================================================================

pub struct MockResearcher {
    responses: Arc<Mutex<Vec<Result<CompanyFacts, String>>>>,
    calls: Arc<Mutex<Vec<String>>>,
    delay: Option<Duration>,
}

impl MockResearcher {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            delay: None,
        }
    }

    /// Queue facts to be returned by the next call
    pub fn with_facts(self, facts: CompanyFacts) -> Self {
        locked(&self.responses).push(Ok(facts));
        self
    }

    /// Queue a failure for the next call
    pub fn with_error(self, message: &str) -> Self {
        locked(&self.responses).push(Err(message.to_string()));
        self
    }

    /// Sleep before answering (concurrency and timeout tests)
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Get all domains that were researched
    pub fn calls(&self) -> Vec<String> {
        locked(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        locked(&self.calls).len()
    }
}

impl Default for MockResearcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseCompanyResearcher for MockResearcher {
    async fn research(&self, domain: &str) -> Result<CompanyFacts> {
        locked(&self.calls).push(domain.to_string());
        pause(self.delay).await;

        let next = {
            let mut responses = locked(&self.responses);
            (!responses.is_empty()).then(|| responses.remove(0))
        };
        match next {
            Some(Ok(facts)) => Ok(facts),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Ok(CompanyFacts {
                company_name: domain.to_string(),
                description: "A mock company.".to_string(),
                products: vec!["Widgets".to_string()],
                ..Default::default()
            }),
        }
    }
}

// =============================================================================
// Mock AI (Generic LLM capabilities)
// =============================================================================

/// Arguments captured from a completion call
#[derive(Debug, Clone)]
pub struct AiCall {
    pub system_prompt: String,
    pub user_prompt: String,
    pub json: bool,
}

pub struct MockAI {
    responses: Arc<Mutex<Vec<Result<String, String>>>>,
    calls: Arc<Mutex<Vec<AiCall>>>,
    delay: Option<Duration>,
}

impl MockAI {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            delay: None,
        }
    }

    /// Add a raw response to the queue
    pub fn with_response(self, response: &str) -> Self {
        locked(&self.responses).push(Ok(response.to_string()));
        self
    }

    /// Queue a JSON email response
    pub fn with_email(self, subject: &str, body: &str) -> Self {
        let json = serde_json::json!({ "subject": subject, "body": body }).to_string();
        self.with_response(&json)
    }

    pub fn with_error(self, message: &str) -> Self {
        locked(&self.responses).push(Err(message.to_string()));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<AiCall> {
        locked(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        locked(&self.calls).len()
    }

    async fn respond(&self, system_prompt: &str, user_prompt: &str, json: bool) -> Result<String> {
        locked(&self.calls).push(AiCall {
            system_prompt: system_prompt.to_string(),
            user_prompt: user_prompt.to_string(),
            json,
        });
        pause(self.delay).await;

        let next = {
            let mut responses = locked(&self.responses);
            (!responses.is_empty()).then(|| responses.remove(0))
        };
        match next {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Ok(serde_json::json!({
                "subject": "Mock subject",
                "body": "Mock body."
            })
            .to_string()),
        }
    }
}

impl Default for MockAI {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseAI for MockAI {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        self.respond(system_prompt, user_prompt, false).await
    }

    async fn complete_json(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        self.respond(system_prompt, user_prompt, true).await
    }
}

// =============================================================================
// Mock Mailers
// =============================================================================

pub struct MockManagedMailer {
    sent: Arc<Mutex<Vec<OutboundEmail>>>,
    failures: Arc<Mutex<Vec<String>>>,
}

impl MockManagedMailer {
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            failures: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// The next send fails with `message`
    pub fn with_error(self, message: &str) -> Self {
        locked(&self.failures).push(message.to_string());
        self
    }

    pub fn sent(&self) -> Vec<OutboundEmail> {
        locked(&self.sent).clone()
    }
}

impl Default for MockManagedMailer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseManagedMailer for MockManagedMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<DeliveryReceipt> {
        let failure = {
            let mut failures = locked(&self.failures);
            (!failures.is_empty()).then(|| failures.remove(0))
        };
        if let Some(message) = failure {
            return Err(anyhow!(message));
        }
        locked(&self.sent).push(email.clone());
        Ok(DeliveryReceipt {
            message_id: Some(format!("mock-{}", locked(&self.sent).len())),
        })
    }
}

/// A message captured by `MockSmtpMailer` with the server it targeted
#[derive(Debug, Clone)]
pub struct SmtpDelivery {
    pub settings: SmtpSettings,
    pub email: OutboundEmail,
}

pub struct MockSmtpMailer {
    sent: Arc<Mutex<Vec<SmtpDelivery>>>,
    failures: Arc<Mutex<Vec<String>>>,
}

impl MockSmtpMailer {
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            failures: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_error(self, message: &str) -> Self {
        locked(&self.failures).push(message.to_string());
        self
    }

    pub fn sent(&self) -> Vec<SmtpDelivery> {
        locked(&self.sent).clone()
    }
}

impl Default for MockSmtpMailer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseSmtpMailer for MockSmtpMailer {
    async fn send(
        &self,
        settings: &SmtpSettings,
        email: &OutboundEmail,
    ) -> Result<DeliveryReceipt> {
        let failure = {
            let mut failures = locked(&self.failures);
            (!failures.is_empty()).then(|| failures.remove(0))
        };
        if let Some(message) = failure {
            return Err(anyhow!(message));
        }
        locked(&self.sent).push(SmtpDelivery {
            settings: settings.clone(),
            email: email.clone(),
        });
        Ok(DeliveryReceipt::default())
    }
}

// =============================================================================
// TestDependencies
// =============================================================================

/// Builder for ServerDeps backed by mocks and an in-memory store.
///
/// Keeps `Arc` handles to every mock so tests can inspect calls after the
/// pipeline ran.
pub struct TestDependencies {
    pub store: Arc<InMemoryStore>,
    pub ai: Arc<MockAI>,
    pub researcher: Arc<MockResearcher>,
    pub managed_mailer: Arc<MockManagedMailer>,
    pub smtp_mailer: Arc<MockSmtpMailer>,
    pub settings: PipelineSettings,
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            store: Arc::new(InMemoryStore::new()),
            ai: Arc::new(MockAI::new()),
            researcher: Arc::new(MockResearcher::new()),
            managed_mailer: Arc::new(MockManagedMailer::new()),
            smtp_mailer: Arc::new(MockSmtpMailer::new()),
            settings: PipelineSettings {
                release_backoff: vec![
                    Duration::from_millis(1),
                    Duration::from_millis(2),
                    Duration::from_millis(4),
                ],
                ..PipelineSettings::default()
            },
        }
    }

    pub fn mock_ai(mut self, ai: MockAI) -> Self {
        self.ai = Arc::new(ai);
        self
    }

    pub fn mock_researcher(mut self, researcher: MockResearcher) -> Self {
        self.researcher = Arc::new(researcher);
        self
    }

    pub fn mock_managed_mailer(mut self, mailer: MockManagedMailer) -> Self {
        self.managed_mailer = Arc::new(mailer);
        self
    }

    pub fn mock_smtp_mailer(mut self, mailer: MockSmtpMailer) -> Self {
        self.smtp_mailer = Arc::new(mailer);
        self
    }

    pub fn stage_timeout(mut self, timeout: Duration) -> Self {
        self.settings.stage_timeout = timeout;
        self
    }

    pub fn lock_ttl(mut self, ttl: Duration) -> Self {
        self.settings.lock_ttl = ttl;
        self
    }

    pub fn server_deps(&self) -> ServerDeps {
        ServerDeps::new(
            self.store.clone(),
            self.ai.clone(),
            self.researcher.clone(),
            self.managed_mailer.clone(),
            self.smtp_mailer.clone(),
            self.settings.clone(),
        )
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}
