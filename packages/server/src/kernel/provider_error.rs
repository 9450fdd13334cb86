//! Failures reported by external providers.
//!
//! A provider response body can carry internal traces, so it never appears
//! in `Display`. Job records and API responses get `ProviderFailure::summary`;
//! the body is only reachable through `detail`, which goes to logs and the
//! stored research outcome.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider} returned {status}")]
    Status {
        provider: &'static str,
        status: u16,
        body: String,
    },
    #[error("{provider} reported a failure")]
    Rejected {
        provider: &'static str,
        reason: String,
    },
}

impl ProviderError {
    pub fn status(provider: &'static str, status: reqwest::StatusCode, body: String) -> Self {
        ProviderError::Status {
            provider,
            status: status.as_u16(),
            body,
        }
    }

    fn body(&self) -> &str {
        match self {
            ProviderError::Status { body, .. } => body,
            ProviderError::Rejected { reason, .. } => reason,
        }
    }
}

/// An adapter error split into a caller-safe summary and a full detail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{summary}")]
pub struct ProviderFailure {
    pub summary: String,
    pub detail: String,
}

impl From<anyhow::Error> for ProviderFailure {
    fn from(err: anyhow::Error) -> Self {
        let provider = err
            .chain()
            .find_map(|cause| cause.downcast_ref::<ProviderError>());

        // The outermost message is the adapter's own context line
        let summary = match provider {
            Some(provider) => provider.to_string(),
            None => err.to_string(),
        };
        let chain = format!("{:#}", err);
        let detail = match provider.map(ProviderError::body) {
            Some(body) if !body.is_empty() => format!("{} - {}", chain, body),
            _ => chain,
        };

        Self { summary, detail }
    }
}
