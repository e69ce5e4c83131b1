//! Find the "Service Limits" check among the account's Trusted Advisor checks.
//!
//! Check ids differ between accounts, so the check is looked up by category
//! and name on every poll.

use super::model::{AdvisoryCheckDescriptor, CheckDescription};
use super::AdvisorApi;
use anyhow::Result;

/// Locale used when listing checks; names are matched in English
pub const CHECK_LANGUAGE: &str = "en";
pub const CHECK_CATEGORY: &str = "performance";
pub const CHECK_NAME: &str = "Service Limits";

/// First check with the exact category and name, if any
pub fn find_service_limits_check(checks: &[CheckDescription]) -> Option<&CheckDescription> {
    checks
        .iter()
        .find(|check| check.category == CHECK_CATEGORY && check.name == CHECK_NAME)
}

/// List checks and return the id and metadata schema of "Service Limits".
///
/// `Ok(None)` means the account does not expose the check, which is normal for
/// accounts without a Business or Enterprise support plan.
pub async fn locate_service_limits_check<A: AdvisorApi>(
    api: &A,
) -> Result<Option<AdvisoryCheckDescriptor>> {
    tracing::debug!("Querying Trusted Advisor checks");
    let checks = api.describe_checks(CHECK_LANGUAGE).await?;

    match find_service_limits_check(&checks) {
        Some(check) => {
            tracing::debug!(check_id = %check.id, "Found Trusted Advisor check");
            Ok(Some(AdvisoryCheckDescriptor::from(check)))
        }
        None => {
            tracing::debug!(
                "Unable to find check with category '{}' and name '{}' among {} checks",
                CHECK_CATEGORY,
                CHECK_NAME,
                checks.len()
            );
            Ok(None)
        }
    }
}
