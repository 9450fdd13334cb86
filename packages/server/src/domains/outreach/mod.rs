//! Lead outreach: intake, the processing pipeline and its persistence.

pub mod activities;
pub mod models;
pub mod store;

pub use activities::{process_job, DomainType, PipelineOutcome};
pub use models::{Job, JobStatus};
pub use store::{InMemoryStore, OutreachStore, PostgresStore};
