//! Per-job mutual exclusion.
//!
//! Acquisition is a single conditional update in the store. Release is
//! retried on the configured backoff schedule; a lock that still cannot be
//! cleared afterwards is logged as stuck and left for the TTL to reclaim.

use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::common::JobId;
use crate::domains::outreach::models::LockGrant;
use crate::domains::outreach::store::JobStore;
use crate::kernel::ServerDeps;

/// Try to take the processing lock. `false` means another run holds it or
/// the job is no longer in flight.
pub async fn acquire(job_id: JobId, deps: &ServerDeps) -> Result<bool> {
    let grant = deps.store.try_lock(job_id, deps.settings.lock_ttl).await?;

    match grant {
        LockGrant::Acquired => debug!(job_id = %job_id, "Lock acquired"),
        LockGrant::Reclaimed { stale_since } => warn!(
            job_id = %job_id,
            stale_since = %stale_since,
            "Reclaimed expired processing lock"
        ),
        LockGrant::Denied => debug!(job_id = %job_id, "Lock not available"),
    }

    Ok(grant.is_granted())
}

/// Run `op` once per entry of `schedule`, sleeping that entry's delay
/// between failed attempts. Returns the attempt that succeeded, or the last
/// error once the schedule is exhausted.
pub async fn retry_with_backoff<F, Fut>(
    job_id: JobId,
    operation: &str,
    schedule: &[Duration],
    mut op: F,
) -> Result<usize>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let attempts = schedule.len().max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match op().await {
            Ok(()) => return Ok(attempt),
            Err(e) if attempt >= attempts => return Err(e),
            Err(e) => {
                let delay = schedule.get(attempt - 1).copied().unwrap_or_default();
                warn!(
                    job_id = %job_id,
                    attempt,
                    backoff_ms = delay.as_millis() as u64,
                    error = %e,
                    "{} failed; retrying",
                    operation
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Clear the lock, retrying with backoff. Returns whether it was cleared.
pub async fn release(job_id: JobId, deps: &ServerDeps) -> bool {
    let schedule = &deps.settings.release_backoff;

    match retry_with_backoff(job_id, "Lock release", schedule, || {
        deps.store.release_lock(job_id)
    })
    .await
    {
        Ok(attempt) => {
            debug!(job_id = %job_id, attempt, "Lock released");
            true
        }
        Err(e) => {
            error!(
                job_id = %job_id,
                attempts = schedule.len(),
                error = %e,
                "Processing lock is stuck; job stays unprocessable until the lock expires"
            );
            false
        }
    }
}

/// Run `body` while holding the job's lock, releasing it afterwards whatever
/// `body` returned. `Ok(None)` when the lock was not available.
pub async fn with_lock<F, Fut, T>(job_id: JobId, deps: &ServerDeps, body: F) -> Result<Option<T>>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    if !acquire(job_id, deps).await? {
        return Ok(None);
    }

    let output = body().await;
    release(job_id, deps).await;
    Ok(Some(output))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::CompanyId;
    use crate::domains::outreach::models::Job;
    use crate::kernel::TestDependencies;

    fn seeded(test: &TestDependencies) -> JobId {
        let job = Job::builder()
            .company_id(CompanyId::new())
            .first_name("Ada")
            .last_name("Lovelace")
            .email("ada@acme.com")
            .domain("acme.com")
            .build();
        let id = job.id;
        test.store.put_job(job);
        id
    }

    #[tokio::test]
    async fn test_release_survives_two_transient_failures() {
        let test = TestDependencies::new();
        let deps = test.server_deps();
        let id = seeded(&test);

        assert!(acquire(id, &deps).await.unwrap());
        test.store.fail_next_releases(2);

        assert!(release(id, &deps).await);
        assert_eq!(test.store.release_calls(), 3);
        assert!(test.store.job(id).unwrap().processing_lock.is_none());
    }

    #[tokio::test]
    async fn test_release_gives_up_after_schedule_is_exhausted() {
        let test = TestDependencies::new();
        let deps = test.server_deps();
        let id = seeded(&test);

        assert!(acquire(id, &deps).await.unwrap());
        test.store.fail_next_releases(3);

        assert!(!release(id, &deps).await);
        assert_eq!(test.store.release_calls(), 3);
        assert!(test.store.job(id).unwrap().processing_lock.is_some());
    }

    #[tokio::test]
    async fn test_release_does_not_sleep_after_final_attempt() {
        let mut test = TestDependencies::new();
        test.settings.release_backoff = vec![
            Duration::from_millis(1),
            Duration::from_millis(1),
            Duration::from_secs(60),
        ];
        let deps = test.server_deps();
        let id = seeded(&test);

        assert!(acquire(id, &deps).await.unwrap());
        test.store.fail_next_releases(3);

        let released = tokio::time::timeout(Duration::from_secs(5), release(id, &deps))
            .await
            .expect("release must give up without sleeping the last delay");
        assert!(!released);
        assert_eq!(test.store.release_calls(), 3);
    }

    #[tokio::test]
    async fn test_retry_reports_succeeding_attempt() {
        let schedule = [Duration::from_millis(1), Duration::from_millis(1)];
        let mut calls = 0;

        let attempt = retry_with_backoff(JobId::new(), "Write", &schedule, || {
            calls += 1;
            let outcome = if calls == 1 {
                Err(anyhow::anyhow!("transient"))
            } else {
                Ok(())
            };
            async move { outcome }
        })
        .await
        .unwrap();

        assert_eq!(attempt, 2);
    }

    #[tokio::test]
    async fn test_with_lock_releases_after_body() {
        let test = TestDependencies::new();
        let deps = test.server_deps();
        let id = seeded(&test);

        let out = with_lock(id, &deps, || async { 7 }).await.unwrap();

        assert_eq!(out, Some(7));
        assert!(test.store.job(id).unwrap().processing_lock.is_none());
    }

    #[tokio::test]
    async fn test_with_lock_skips_body_when_held() {
        let test = TestDependencies::new();
        let deps = test.server_deps();
        let id = seeded(&test);
        assert!(acquire(id, &deps).await.unwrap());

        let out = with_lock(id, &deps, || async { unreachable!("body must not run") })
            .await
            .unwrap();

        assert_eq!(out, None::<()>);
    }
}
