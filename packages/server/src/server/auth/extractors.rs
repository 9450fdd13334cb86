//! Axum extractors for the three credential schemes:
//! client API keys, the demo form secret and the cron bearer secret.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{debug, warn};

use crate::domains::outreach::models::api_key::key_prefix;
use crate::domains::outreach::models::{ApiKey, Company};
use crate::domains::outreach::store::CompanyDirectory;
use crate::server::app::AppState;
use crate::server::error::ApiError;

pub const API_KEY_HEADER: &str = "x-api-key";
pub const FORM_SECRET_HEADER: &str = "x-form-secret";

/// Constant-time equality for shared secrets.
pub fn secrets_match(presented: &str, expected: &str) -> bool {
    if expected.is_empty() {
        return false;
    }
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(b"shared-secret-comparison") else {
        return false;
    };
    mac.update(expected.as_bytes());
    let expected_tag = mac.finalize().into_bytes();

    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(b"shared-secret-comparison") else {
        return false;
    };
    mac.update(presented.as_bytes());
    mac.verify_slice(&expected_tag).is_ok()
}

fn app_state(parts: &Parts) -> Result<AppState, ApiError> {
    parts
        .extensions
        .get::<AppState>()
        .cloned()
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("AppState extension missing")))
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|v| v.to_str().ok())
}

/// Company authenticated by its `x-api-key`.
#[derive(Debug, Clone)]
pub struct ClientAuth {
    pub company: Company,
    pub api_key: ApiKey,
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ClientAuth {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let state = app_state(parts)?;
        let presented = header(parts, API_KEY_HEADER).ok_or(ApiError::Unauthorized)?;
        let prefix = key_prefix(presented).ok_or(ApiError::Unauthorized)?;

        let api_key = state
            .deps
            .store
            .find_api_key(prefix)
            .await?
            .ok_or(ApiError::Unauthorized)?;

        if !api_key.verify(presented) {
            warn!(key_prefix = %prefix, "API key failed verification");
            return Err(ApiError::Unauthorized);
        }

        let company = state
            .deps
            .store
            .find_company(api_key.company_id)
            .await?
            .ok_or(ApiError::Unauthorized)?;

        if let Err(e) = state.deps.store.touch_api_key(&api_key).await {
            debug!(error = %e, "Failed to record API key use");
        }

        Ok(Self { company, api_key })
    }
}

/// Request carried the demo form's shared secret.
#[derive(Debug, Clone, Copy)]
pub struct FormSecret;

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for FormSecret {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let state = app_state(parts)?;
        let presented = header(parts, FORM_SECRET_HEADER).unwrap_or_default();

        if secrets_match(presented, &state.http.website_form_secret) {
            Ok(FormSecret)
        } else {
            Err(ApiError::Unauthorized)
        }
    }
}

/// Request carried `Authorization: Bearer <cron secret>`.
#[derive(Debug, Clone, Copy)]
pub struct CronAuth;

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CronAuth {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let state = app_state(parts)?;
        let token = header(parts, AUTHORIZATION.as_str())
            .and_then(|value| value.strip_prefix("Bearer "))
            .unwrap_or_default();

        if secrets_match(token, &state.http.cron_secret) {
            Ok(CronAuth)
        } else {
            Err(ApiError::Unauthorized)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secrets_match() {
        assert!(secrets_match("s3cret", "s3cret"));
        assert!(!secrets_match("s3cret ", "s3cret"));
        assert!(!secrets_match("", "s3cret"));
    }

    #[test]
    fn test_empty_expected_secret_never_matches() {
        assert!(!secrets_match("", ""));
    }
}
