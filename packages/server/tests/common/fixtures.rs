//! Test fixtures: companies, templates, jobs and API keys.

use outreach_core::domains::outreach::activities::classify::email_domain;
use outreach_core::domains::outreach::models::api_key::{hash_key, key_prefix};
use outreach_core::domains::outreach::models::{
    ApiKey, Company, Job, JobMetadata, JobSource, PromptTemplate,
};
use outreach_core::common::ApiKeyId;
use outreach_core::kernel::TestDependencies;
use sqlx::types::Json;

pub const TEST_API_KEY: &str = "agemail_0a1b2c3d_dGVzdC1rZXktYm9keQ";

/// A company without SMTP settings.
pub fn acme() -> Company {
    Company::builder().name("Acme").slug("acme").build()
}

/// A company with a fully configured SMTP server.
pub fn acme_with_smtp() -> Company {
    Company::builder()
        .name("Acme")
        .slug("acme-smtp")
        .smtp_enabled(true)
        .smtp_host("smtp.acme.com")
        .smtp_port(587)
        .smtp_user("sales@acme.com")
        .smtp_password("hunter2")
        .smtp_secure(false)
        .build()
}

pub fn default_template(company: &Company) -> PromptTemplate {
    PromptTemplate::builder()
        .company_id(company.id)
        .name("Default outreach")
        .template("Write a short email to {{firstName}} {{lastName}} about {{companyName}}.")
        .is_default(true)
        .build()
}

/// Store the company with a default template; returns the company.
pub fn seed(test: &TestDependencies, company: Company) -> Company {
    test.store.add_company(company.clone());
    test.store.add_template(default_template(&company));
    company
}

/// A pending job for `email` owned by `company`.
pub fn lead(company: &Company, email: &str, source: JobSource) -> Job {
    Job::builder()
        .company_id(company.id)
        .first_name("Ada")
        .last_name("Lovelace")
        .email(email)
        .domain(email_domain(email))
        .metadata(Json(JobMetadata {
            source,
            domain_type: None,
            template_id: None,
        }))
        .build()
}

/// An active key for `company` matching `TEST_API_KEY`.
pub fn api_key(company: &Company) -> ApiKey {
    let salt = "fixture-salt".to_string();
    ApiKey {
        id: ApiKeyId::new(),
        company_id: company.id,
        name: "Test key".to_string(),
        key_prefix: key_prefix(TEST_API_KEY).unwrap_or_default().to_string(),
        key_hash: hash_key(TEST_API_KEY, &salt).expect("HMAC accepts any key length"),
        key_salt: salt,
        active: true,
    }
}
