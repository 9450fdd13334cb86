//! Research stage: company facts for the lead's domain, under a deadline.

use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::domains::outreach::models::CompanyFacts;
use crate::kernel::{ProviderFailure, ServerDeps};

#[derive(Debug, Error)]
pub enum ResearchError {
    #[error("research timed out after {0:?}")]
    Timeout(Duration),
    #[error("{0}")]
    Provider(ProviderFailure),
}

impl ResearchError {
    /// Full error text for logs and the stored research outcome.
    pub fn detail(&self) -> String {
        match self {
            ResearchError::Provider(failure) => failure.detail.clone(),
            other => other.to_string(),
        }
    }
}

/// `"acme-corp.co.uk"` becomes `"Acme Corp"`.
pub fn company_name_from_domain(domain: &str) -> String {
    let label = domain
        .trim()
        .trim_start_matches("www.")
        .split('.')
        .next()
        .unwrap_or_default();

    label
        .split(|c: char| c == '-' || c == '_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub async fn research_company(
    domain: &str,
    deps: &ServerDeps,
) -> Result<CompanyFacts, ResearchError> {
    let deadline = deps.settings.stage_timeout;
    info!(domain = %domain, "Researching company");

    let facts = tokio::time::timeout(deadline, deps.researcher.research(domain))
        .await
        .map_err(|_| ResearchError::Timeout(deadline))?
        .map_err(|e| ResearchError::Provider(e.into()))?;

    Ok(normalize(facts, domain))
}

fn normalize(mut facts: CompanyFacts, domain: &str) -> CompanyFacts {
    if facts.company_name.trim().is_empty() {
        facts.company_name = company_name_from_domain(domain);
    }
    facts.products.retain(|p| !p.trim().is_empty());
    facts.services.retain(|s| !s.trim().is_empty());
    facts.values.retain(|v| !v.trim().is_empty());
    facts
}
