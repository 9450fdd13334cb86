pub mod admin;
pub mod backfill;
pub mod classify;
pub mod deliver;
pub mod generate;
pub mod intake;
pub mod lock;
pub mod pipeline;
pub mod research;
pub mod status;
pub mod sweep;

pub use classify::{classify_email, DomainType};
pub use pipeline::{process_job, PipelineOutcome, SettledEmail};
pub use sweep::{sweep, SweepEntry};
