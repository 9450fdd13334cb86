//! Fill in `metadata.domain_type` on jobs created before it was cached.

use anyhow::Result;
use std::collections::BTreeMap;
use tracing::info;

use super::classify::classify_email;
use crate::domains::outreach::store::JobStore;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BackfillReport {
    pub scanned: usize,
    /// Count per domain type name
    pub by_type: BTreeMap<&'static str, usize>,
}

/// Classify and cache in batches until no job lacks a domain type.
/// A dry run classifies one batch and writes nothing.
pub async fn backfill_domain_types(
    batch_size: i64,
    dry_run: bool,
    store: &dyn JobStore,
) -> Result<BackfillReport> {
    let mut report = BackfillReport::default();

    loop {
        let jobs = store.find_missing_domain_type(batch_size).await?;
        if jobs.is_empty() {
            break;
        }

        for job in &jobs {
            let domain_type = classify_email(&job.email);
            if !dry_run {
                store.cache_domain_type(job.id, domain_type).await?;
            }
            *report.by_type.entry(domain_type.as_str()).or_default() += 1;
        }
        report.scanned += jobs.len();
        info!(batch = jobs.len(), total = report.scanned, dry_run, "Backfilled domain types");

        if dry_run {
            break;
        }
    }

    Ok(report)
}
