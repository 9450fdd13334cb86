//! Typed ID definitions for the pipeline's entities.

pub use super::id::Id;

/// Marker type for lead processing jobs.
pub struct Job;

/// Marker type for client companies (job owners).
pub struct Company;

/// Marker type for prompt templates.
pub struct PromptTemplate;

/// Marker type for client API keys.
pub struct ApiKey;

pub type JobId = Id<Job>;
pub type CompanyId = Id<Company>;
pub type TemplateId = Id<PromptTemplate>;
pub type ApiKeyId = Id<ApiKey>;
