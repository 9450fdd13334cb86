//! PostgresStore against a real database.
//!
//! These need Docker; run with `cargo test --test postgres_store_tests -- --ignored`.

mod common;

use std::time::Duration;

use outreach_core::domains::outreach::activities::classify::DomainType;
use outreach_core::domains::outreach::models::{
    CompanyFacts, JobMetadata, JobSource, JobStatus, LockGrant, NewJob, ResearchOutcome,
};
use outreach_core::domains::outreach::store::{CompanyDirectory, JobStore};
use outreach_core::domains::outreach::PostgresStore;
use test_context::test_context;
use uuid::Uuid;

use crate::common::{acme, api_key, default_template, TestHarness, TEST_API_KEY};

const TTL: Duration = Duration::from_secs(600);

async fn store_with_company(ctx: &TestHarness) -> (PostgresStore, outreach_core::domains::outreach::models::Company) {
    let mut company = acme();
    // Slugs are unique; tests share one database
    company.slug = format!("acme-{}", Uuid::new_v4());
    let company = company.insert(&ctx.db_pool).await.expect("insert company");
    (PostgresStore::new(ctx.db_pool.clone()), company)
}

fn new_job(company_id: outreach_core::common::CompanyId, email: &str) -> NewJob {
    NewJob {
        company_id,
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        email: email.to_string(),
        domain: email.split('@').nth(1).unwrap_or_default().to_string(),
        status: JobStatus::Pending,
        metadata: JobMetadata {
            source: JobSource::ClientApi,
            domain_type: None,
            template_id: None,
        },
        error_message: None,
    }
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore] // Requires Docker
async fn lock_is_exclusive_until_released(ctx: &TestHarness) {
    let (store, company) = store_with_company(ctx).await;
    let job = store.insert_job(new_job(company.id, "ada@acme-tools.com")).await.unwrap();

    assert_eq!(store.try_lock(job.id, TTL).await.unwrap(), LockGrant::Acquired);
    assert_eq!(store.try_lock(job.id, TTL).await.unwrap(), LockGrant::Denied);

    store.release_lock(job.id).await.unwrap();
    assert_eq!(store.try_lock(job.id, TTL).await.unwrap(), LockGrant::Acquired);
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore] // Requires Docker
async fn concurrent_lock_attempts_grant_exactly_one(ctx: &TestHarness) {
    let (store, company) = store_with_company(ctx).await;
    let job = store.insert_job(new_job(company.id, "ada@acme-tools.com")).await.unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.try_lock(job.id, TTL).await })
        })
        .collect();

    let mut granted = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap().is_granted() {
            granted += 1;
        }
    }
    assert_eq!(granted, 1);
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore] // Requires Docker
async fn expired_lock_is_reclaimed(ctx: &TestHarness) {
    let (store, company) = store_with_company(ctx).await;
    let job = store.insert_job(new_job(company.id, "ada@acme-tools.com")).await.unwrap();
    sqlx::query("UPDATE jobs SET processing_lock = NOW() - INTERVAL '1 hour' WHERE id = $1")
        .bind(job.id)
        .execute(&ctx.db_pool)
        .await
        .unwrap();

    let grant = store.try_lock(job.id, TTL).await.unwrap();

    assert!(matches!(grant, LockGrant::Reclaimed { .. }));
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore] // Requires Docker
async fn stage_artifacts_advance_status(ctx: &TestHarness) {
    let (store, company) = store_with_company(ctx).await;
    let job = store.insert_job(new_job(company.id, "ada@acme-tools.com")).await.unwrap();

    store.update_status(job.id, JobStatus::Scraping, None).await.unwrap();
    let facts = CompanyFacts {
        company_name: "Acme Tools".to_string(),
        ..Default::default()
    };
    store.record_facts(job.id, &facts).await.unwrap();

    let scraped = store.find_job(job.id).await.unwrap().unwrap();
    assert_eq!(scraped.status, JobStatus::Scraped);
    assert_eq!(
        scraped.scrape_result.as_deref(),
        Some(&ResearchOutcome::Facts(facts))
    );

    store.update_status(job.id, JobStatus::Generating, None).await.unwrap();
    store
        .record_email(job.id, "Hello", "<p>Body</p>", "Body")
        .await
        .unwrap();
    store.update_status(job.id, JobStatus::Sending, None).await.unwrap();
    store.mark_sent(job.id).await.unwrap();

    let sent = store.find_job(job.id).await.unwrap().unwrap();
    assert_eq!(sent.status, JobStatus::Sent);
    assert!(sent.email_sent);
    assert!(sent.completed_at.is_some());
    assert_eq!(sent.email_draft.as_deref(), Some("Body"));
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore] // Requires Docker
async fn terminal_status_is_final(ctx: &TestHarness) {
    let (store, company) = store_with_company(ctx).await;
    let job = store.insert_job(new_job(company.id, "ada@acme-tools.com")).await.unwrap();

    store
        .update_status(job.id, JobStatus::Failed, Some("Scraping failed: boom"))
        .await
        .unwrap();

    assert!(store.update_status(job.id, JobStatus::Pending, None).await.is_err());
    assert_eq!(
        store.find_job(job.id).await.unwrap().unwrap().status,
        JobStatus::Failed
    );

    // Operator reset is the one way out of `failed`
    assert!(store.reset_failed(job.id).await.unwrap());
    assert_eq!(
        store.find_job(job.id).await.unwrap().unwrap().status,
        JobStatus::Pending
    );
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore] // Requires Docker
async fn domain_type_is_cached_once(ctx: &TestHarness) {
    let (store, company) = store_with_company(ctx).await;
    let job = store.insert_job(new_job(company.id, "ada@acme-tools.com")).await.unwrap();

    store.cache_domain_type(job.id, DomainType::Business).await.unwrap();
    store.cache_domain_type(job.id, DomainType::Free).await.unwrap();

    let stored = store.find_job(job.id).await.unwrap().unwrap();
    assert_eq!(stored.domain_type(), Some(DomainType::Business));
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore] // Requires Docker
async fn list_and_count_filter_by_company_and_status(ctx: &TestHarness) {
    let (store, company) = store_with_company(ctx).await;
    for i in 0..3 {
        store
            .insert_job(new_job(company.id, &format!("lead{}@acme-tools.com", i)))
            .await
            .unwrap();
    }
    let failed = store.insert_job(new_job(company.id, "x@acme-tools.com")).await.unwrap();
    store
        .update_status(failed.id, JobStatus::Failed, Some("boom"))
        .await
        .unwrap();

    assert_eq!(store.count_jobs(company.id, None).await.unwrap(), 4);
    assert_eq!(
        store.count_jobs(company.id, Some(JobStatus::Failed)).await.unwrap(),
        1
    );
    let page = store.list_jobs(company.id, None, 2, 0).await.unwrap();
    assert_eq!(page.len(), 2);
    assert!(page[0].created_at >= page[1].created_at);
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore] // Requires Docker
async fn directory_finds_default_template_and_api_key(ctx: &TestHarness) {
    let (store, company) = store_with_company(ctx).await;
    let template = default_template(&company);
    template.insert(&ctx.db_pool).await.unwrap();
    let key = api_key(&company);
    key.insert(&ctx.db_pool).await.unwrap();

    let found = store.find_default_template(company.id).await.unwrap().unwrap();
    assert_eq!(found.id, template.id);

    let found_key = store.find_api_key(&key.key_prefix).await.unwrap().unwrap();
    assert!(found_key.verify(TEST_API_KEY));
    store.touch_api_key(&found_key).await.unwrap();

    let by_slug = store.find_company_by_slug(&company.slug).await.unwrap().unwrap();
    assert_eq!(by_slug.id, company.id);
    store.ping().await.unwrap();
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore] // Requires Docker
async fn flagged_email_is_never_resumed(ctx: &TestHarness) {
    let (store, company) = store_with_company(ctx).await;
    let job = store.insert_job(new_job(company.id, "ada@acme-tools.com")).await.unwrap();
    store.update_status(job.id, JobStatus::Sending, None).await.unwrap();

    let before = store.find_resumable(10_000, TTL).await.unwrap();
    assert!(before.iter().any(|j| j.id == job.id));

    store.flag_email_sent(job.id).await.unwrap();

    let after = store.find_resumable(10_000, TTL).await.unwrap();
    assert!(after.iter().all(|j| j.id != job.id));
    let stored = store.find_job(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Sending);
    assert!(stored.email_sent);
}
