pub mod api_key;
pub mod company;
pub mod job;
pub mod prompt_template;

pub use api_key::ApiKey;
pub use company::{Company, SmtpSettings};
pub use job::{
    CompanyFacts, Job, JobMetadata, JobSource, JobStatus, LockGrant, NewJob, ResearchOutcome,
};
pub use prompt_template::PromptTemplate;
