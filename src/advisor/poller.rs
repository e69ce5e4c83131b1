//! Fetch the "Service Limits" result and shape it into a [`LimitUpdateMap`]

use super::locator::{self, CHECK_LANGUAGE};
use super::model::{AdvisoryCheckDescriptor, DecodeError, FlaggedResource, LimitEntry, LimitUpdateMap};
use super::AdvisorApi;
use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};

/// What to do with a row that cannot be decoded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RowPolicy {
    /// Log a warning and drop the row
    #[default]
    Skip,
    /// Fail the whole poll
    Strict,
}

/// Counters from one projection pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionStats {
    pub kept: usize,
    pub other_region: usize,
    pub skipped: usize,
    pub overwritten: usize,
}

fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(raw).ok()
}

/// Keep rows for `region` and project them into a limit map.
///
/// A repeated (service, limit) pair overwrites the earlier value.
pub fn project_rows(
    descriptor: &AdvisoryCheckDescriptor,
    rows: &[FlaggedResource],
    region: &str,
    policy: RowPolicy,
) -> Result<(LimitUpdateMap, ProjectionStats), DecodeError> {
    let mut updates = LimitUpdateMap::new();
    let mut stats = ProjectionStats::default();

    for row in rows {
        if row.region.as_deref() != Some(region) {
            stats.other_region += 1;
            continue;
        }

        let entry = descriptor
            .schema
            .decode(&row.metadata)
            .and_then(|record| LimitEntry::from_record(&record));

        let entry = match (entry, policy) {
            (Ok(entry), _) => entry,
            (Err(err), RowPolicy::Strict) => return Err(err),
            (Err(err), RowPolicy::Skip) => {
                tracing::warn!(
                    resource_id = %row.resource_id,
                    "Skipping Trusted Advisor row: {}",
                    err
                );
                stats.skipped += 1;
                continue;
            }
        };

        if let Some(previous) = updates.insert(&entry.service, &entry.limit, entry.amount) {
            tracing::debug!(
                service = %entry.service,
                limit = %entry.limit,
                "Duplicate Trusted Advisor row replaces {} with {}",
                previous,
                entry.amount
            );
            stats.overwritten += 1;
        }
        stats.kept += 1;
    }

    Ok((updates, stats))
}

/// Poll Trusted Advisor for the current region's service limits.
///
/// Returns `Ok(None)` when the "Service Limits" check is not available.
pub async fn poll<A: AdvisorApi>(api: &A, policy: RowPolicy) -> Result<Option<LimitUpdateMap>> {
    tracing::info!("Beginning TrustedAdvisor poll");

    let Some(descriptor) = locator::locate_service_limits_check(api).await? else {
        tracing::error!(
            "Unable to find 'Service Limits' Trusted Advisor check; not using Trusted Advisor data."
        );
        return Ok(None);
    };

    let result = api
        .describe_check_result(&descriptor.id, CHECK_LANGUAGE)
        .await?;

    match parse_timestamp(&result.timestamp) {
        Some(as_of) => tracing::debug!(
            check_id = %descriptor.id,
            status = %result.status,
            "Got TrustedAdvisor data as of {}",
            as_of
        ),
        None => tracing::debug!(
            check_id = %descriptor.id,
            status = %result.status,
            "Got TrustedAdvisor data with unparsable timestamp {:?}",
            result.timestamp
        ),
    }

    let region = api.region();
    let (updates, stats) = project_rows(&descriptor, &result.flagged_resources, region, policy)
        .with_context(|| format!("Malformed row in Trusted Advisor check {}", descriptor.id))?;

    tracing::info!(
        region,
        services = updates.len(),
        rows = stats.kept,
        other_region = stats.other_region,
        skipped = stats.skipped,
        "Finished TrustedAdvisor poll"
    );
    Ok(Some(updates))
}
