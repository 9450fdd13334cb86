//! HTTP surface driven through the router with in-memory dependencies.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Utc;
use outreach_core::common::{CompanyId, JobId};
use outreach_core::domains::outreach::models::{Company, JobSource};
use outreach_core::domains::outreach::store::JobStore;
use outreach_core::domains::outreach::JobStatus;
use outreach_core::kernel::TestDependencies;
use outreach_core::server::{build_app, AppState, HttpSettings};
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::common::{acme, api_key, lead, seed, TEST_API_KEY};

const CRON_SECRET: &str = "cron-secret";
const FORM_SECRET: &str = "form-secret";

struct TestApp {
    test: TestDependencies,
    company: Company,
    router: Router,
}

fn app() -> TestApp {
    let test = TestDependencies::new();
    let mut company = acme();
    company.slug = "agent-email".to_string();
    let company = seed(&test, company);
    test.store.add_api_key(api_key(&company));

    let state = AppState::new(
        test.server_deps(),
        HttpSettings {
            cron_secret: CRON_SECRET.to_string(),
            website_form_secret: FORM_SECRET.to_string(),
            demo_company_slug: "agent-email".to_string(),
            rate_limit_per_second: None,
        },
    );

    TestApp {
        router: build_app(state),
        test,
        company,
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_json(uri: &str, header: (&str, &str), body: Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .header(header.0, header.1)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str, header: (&str, &str)) -> Request<Body> {
    Request::get(uri)
        .header(header.0, header.1)
        .body(Body::empty())
        .unwrap()
}

fn lead_body(email: &str) -> Value {
    json!({ "firstName": "Ada", "lastName": "Lovelace", "email": email })
}

const BEARER: (&str, &str) = ("authorization", "Bearer cron-secret");

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn health_reports_healthy_store() {
    let app = app();
    let request = Request::get("/health").body(Body::empty()).unwrap();

    let (status, body) = send(&app.router, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

// =============================================================================
// Client API
// =============================================================================

#[tokio::test]
async fn process_lead_requires_api_key() {
    let app = app();
    let request = Request::post("/api/client/process-lead")
        .header("content-type", "application/json")
        .body(Body::from(lead_body("ada@acme-tools.com").to_string()))
        .unwrap();

    let (status, _) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let wrong_key = post_json(
        "/api/client/process-lead",
        ("x-api-key", "agemail_0a1b2c3d_not-the-right-body"),
        lead_body("ada@acme-tools.com"),
    );
    let (status, _) = send(&app.router, wrong_key).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn process_lead_runs_pipeline_synchronously() {
    let app = app();
    let request = post_json(
        "/api/client/process-lead",
        ("x-api-key", TEST_API_KEY),
        lead_body("ada@acme-tools.com"),
    );

    let (status, body) = send(&app.router, request).await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["success"], true);
    assert_eq!(body["status"], "completed");
    assert_eq!(body["emailSubject"], "Mock subject");
    assert_eq!(body["emailSent"], false);

    let job_id: JobId = serde_json::from_value(body["jobId"].clone()).unwrap();
    let stored = app.test.store.job(job_id).unwrap();
    assert_eq!(stored.company_id, app.company.id);
    assert_eq!(stored.source(), JobSource::ClientApi);
}

#[tokio::test]
async fn process_lead_turns_away_free_email_without_creating_a_job() {
    let app = app();
    let request = post_json(
        "/api/client/process-lead",
        ("x-api-key", TEST_API_KEY),
        lead_body("ada@gmail.com"),
    );

    let (status, body) = send(&app.router, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["businessEmail"], false);
    let deps = app.test.server_deps();
    assert_eq!(deps.store.count_jobs(app.company.id, None).await.unwrap(), 0);
    assert_eq!(app.test.researcher.call_count(), 0);
}

#[tokio::test]
async fn process_lead_rejects_missing_fields() {
    let app = app();
    let request = post_json(
        "/api/client/process-lead",
        ("x-api-key", TEST_API_KEY),
        json!({ "firstName": "Ada", "email": "ada@acme-tools.com" }),
    );

    let (status, body) = send(&app.router, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("lastName"));
}

#[tokio::test]
async fn process_lead_reports_pipeline_failure_as_500() {
    let app = app();
    // Company without a default template cannot generate
    let orphan = Company::builder()
        .id(CompanyId::new())
        .name("Orphan")
        .slug("orphan")
        .build();
    app.test.store.add_company(orphan.clone());
    let mut key = api_key(&orphan);
    key.key_prefix = "agemail_ffffffff".to_string();
    let full_key = "agemail_ffffffff_orphan-key-body";
    key.key_hash =
        outreach_core::domains::outreach::models::api_key::hash_key(full_key, &key.key_salt)
            .unwrap();
    app.test.store.add_api_key(key);

    let request = post_json(
        "/api/client/process-lead",
        ("x-api-key", full_key),
        lead_body("ada@acme-tools.com"),
    );
    let (status, body) = send(&app.router, request).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert_eq!(body["status"], "failed");
    assert!(body["message"]
        .as_str()
        .unwrap()
        .starts_with("Email generation failed: "));
}

#[tokio::test]
async fn jobs_are_paginated_newest_first() {
    let app = app();
    let base = Utc::now();
    for i in 0..3 {
        let mut job = lead(&app.company, &format!("lead{}@acme-tools.com", i), JobSource::ClientApi);
        job.created_at = base + chrono::Duration::seconds(i);
        app.test.store.put_job(job);
    }

    let (status, body) = send(
        &app.router,
        get("/api/client/jobs?limit=2&page=1", ("x-api-key", TEST_API_KEY)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["jobs"].as_array().unwrap().len(), 2);
    assert_eq!(body["jobs"][0]["email"], "lead2@acme-tools.com");
    assert_eq!(body["pagination"]["total"], 3);
    assert_eq!(body["pagination"]["pages"], 2);

    let (status, _) = send(
        &app.router,
        get("/api/client/jobs?status=exploded", ("x-api-key", TEST_API_KEY)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Demo form
// =============================================================================

#[tokio::test]
async fn demo_register_queues_business_lead() {
    let app = app();
    let request = post_json(
        "/api/demo/register",
        ("x-form-secret", FORM_SECRET),
        lead_body("ada@acme-tools.com"),
    );

    let (status, body) = send(&app.router, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Demo registration successful");
    let job_id: JobId = serde_json::from_value(body["jobId"].clone()).unwrap();
    let stored = app.test.store.job(job_id).unwrap();
    assert_eq!(stored.status, JobStatus::Pending);
    assert_eq!(stored.source(), JobSource::Demo);
    // Processing is left to the sweep
    assert_eq!(app.test.researcher.call_count(), 0);
}

#[tokio::test]
async fn demo_register_records_skipped_job_for_free_email() {
    let app = app();
    let request = post_json(
        "/api/demo/register",
        ("x-form-secret", FORM_SECRET),
        lead_body("ada@gmail.com"),
    );

    let (status, body) = send(&app.router, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Please use a business email address");
    let deps = app.test.server_deps();
    assert_eq!(
        deps.store
            .count_jobs(app.company.id, Some(JobStatus::Skipped))
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn demo_endpoints_require_form_secret() {
    let app = app();
    let request = post_json(
        "/api/demo/register",
        ("x-form-secret", "wrong"),
        lead_body("ada@acme-tools.com"),
    );
    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");

    let uri = format!("/api/demo/status/{}", JobId::new());
    let (status, _) = send(&app.router, get(&uri, ("x-form-secret", "wrong"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn demo_status_reports_progress() {
    let app = app();
    let job = lead(&app.company, "ada@acme-tools.com", JobSource::Demo);
    app.test.store.put_job(job.clone());

    let uri = format!("/api/demo/status/{}", job.id);
    let (status, body) = send(&app.router, get(&uri, ("x-form-secret", FORM_SECRET))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["progress"], 10);
    assert_eq!(body["statusMessage"], "Your request is pending...");
    assert!(body["timestamps"]["created"].is_string());

    let (status, body) = send(
        &app.router,
        get("/api/demo/status/not-a-job", ("x-form-secret", FORM_SECRET)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Job not found");
}

// =============================================================================
// Cron and admin
// =============================================================================

#[tokio::test]
async fn cron_sweep_requires_bearer_secret() {
    let app = app();
    let (status, _) = send(
        &app.router,
        get("/api/cron/process-queue", ("authorization", "Bearer nope")),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn cron_sweep_processes_queued_jobs() {
    let app = app();
    let (status, body) = send(&app.router, get("/api/cron/process-queue", BEARER)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "No jobs to process at this time");

    let job = lead(&app.company, "ada@acme-tools.com", JobSource::Demo);
    app.test.store.put_job(job.clone());

    let (status, body) = send(&app.router, get("/api/cron/process-queue", BEARER)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Processed 1 jobs");
    assert_eq!(body["results"][0]["status"], "sent");
    assert_eq!(app.test.managed_mailer.sent().len(), 1);
}

#[tokio::test]
async fn admin_process_job_validates_input() {
    let app = app();

    let (status, _) = send(&app.router, get("/api/admin/process-job", BEARER)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let uri = format!("/api/admin/process-job?jobId={}", JobId::new());
    let (status, _) = send(&app.router, get(&uri, BEARER)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_force_clears_live_lock_and_reprocesses() {
    let app = app();
    let mut job = lead(&app.company, "ada@acme-tools.com", JobSource::Demo);
    job.status = JobStatus::Scraping;
    job.processing_lock = Some(Utc::now());
    app.test.store.put_job(job.clone());

    let uri = format!("/api/admin/process-job?jobId={}", job.id);
    let (status, body) = send(&app.router, get(&uri, BEARER)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isLocked"], true);
    assert_eq!(body["status"], "scraping");

    let uri = format!("/api/admin/process-job?jobId={}&force=true", job.id);
    let (status, body) = send(&app.router, get(&uri, BEARER)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["originalStatus"], "scraping");
    assert_eq!(body["status"], "sent");
    assert_eq!(body["isLocked"], false);
    assert_eq!(body["emailSent"], true);
}

#[tokio::test]
async fn admin_reset_retries_failed_job() {
    let app = app();
    let mut job = lead(&app.company, "ada@acme-tools.com", JobSource::Demo);
    job.status = JobStatus::Failed;
    job.error_message = Some("Scraping failed: timeout".to_string());
    app.test.store.put_job(job.clone());

    let uri = format!("/api/admin/process-job?jobId={}&reset=true", job.id);
    let (status, body) = send(&app.router, get(&uri, BEARER)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["originalStatus"], "failed");
    assert_eq!(body["status"], "sent");
}
