//! Kernel module - server infrastructure and dependencies.

pub mod ai;
pub mod deps;
pub mod firecrawl_client;
pub mod provider_error;
pub mod resend_client;
pub mod smtp_mailer;
pub mod test_dependencies;
pub mod traits;

pub use ai::OpenAIAdapter;
pub use deps::ServerDeps;
pub use firecrawl_client::FirecrawlClient;
pub use provider_error::{ProviderError, ProviderFailure};
pub use resend_client::ResendClient;
pub use smtp_mailer::LettreSmtpMailer;
pub use test_dependencies::TestDependencies;
pub use traits::*;
