//! Application setup and server configuration.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, Method,
    },
    routing::{get, post},
    Router,
};
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::Config;
use crate::kernel::ServerDeps;
use crate::server::auth::{API_KEY_HEADER, FORM_SECRET_HEADER};
use crate::server::routes::{
    admin_process_job_handler, client_jobs_handler, client_process_lead_handler,
    cron_process_queue_handler, demo_register_handler, demo_status_handler, health_handler,
};

/// Secrets and ownership settings used by the HTTP layer only.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub cron_secret: String,
    pub website_form_secret: String,
    /// Company that owns demo-form submissions
    pub demo_company_slug: String,
    /// Per-IP request rate; `None` disables rate limiting
    pub rate_limit_per_second: Option<u64>,
}

impl HttpSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            cron_secret: config.cron_secret.clone(),
            website_form_secret: config.website_form_secret.clone(),
            demo_company_slug: config.demo_company_slug.clone(),
            rate_limit_per_second: config.rate_limit_per_second,
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub deps: ServerDeps,
    pub http: Arc<HttpSettings>,
}

impl AppState {
    pub fn new(deps: ServerDeps, http: HttpSettings) -> Self {
        Self {
            deps,
            http: Arc::new(http),
        }
    }
}

/// Build the Axum application router
pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            HeaderName::from_static(API_KEY_HEADER),
            HeaderName::from_static(FORM_SECRET_HEADER),
        ]);

    let mut api = Router::new()
        .route("/api/client/process-lead", post(client_process_lead_handler))
        .route("/api/client/jobs", get(client_jobs_handler))
        .route("/api/demo/register", post(demo_register_handler))
        .route("/api/demo/status/:job_id", get(demo_status_handler))
        .route("/api/cron/process-queue", get(cron_process_queue_handler))
        .route("/api/admin/process-job", get(admin_process_job_handler));

    if let Some(per_second) = state.http.rate_limit_per_second {
        // Burst of twice the base rate, keyed by X-Forwarded-For / peer IP
        match GovernorConfigBuilder::default()
            .per_second(per_second.max(1))
            .burst_size(u32::try_from(per_second.saturating_mul(2)).unwrap_or(u32::MAX).max(1))
            .use_headers()
            .finish()
        {
            Some(config) => {
                api = api.layer(GovernorLayer {
                    config: Arc::new(config),
                });
            }
            None => warn!(per_second, "Invalid rate limit, serving without one"),
        }
    }

    api
        // Health check (no rate limit)
        .route("/health", get(health_handler))
        .layer(Extension(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
