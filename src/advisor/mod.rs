//! Trusted Advisor limit updates
//!
//! Polls the "Service Limits" Trusted Advisor check and applies the reported
//! limits onto a registry of services.
//!
//! # Architecture
//!
//! - [`connector`] - Opens the advisory API session once, on first use
//! - [`locator`] - Finds the "Service Limits" check id and its column schema
//! - [`poller`] - Fetches the check result and builds a [`LimitUpdateMap`]
//! - [`reconciler`] - Applies the map onto the caller's services
//!
//! # Example
//!
//! ```ignore
//! use ta_limits::advisor::TrustedAdvisor;
//! use ta_limits::aws::client::SessionOptions;
//!
//! async fn refresh(services: &mut HashMap<String, LimitedService>) -> anyhow::Result<()> {
//!     let mut advisor = TrustedAdvisor::new(SessionOptions::default());
//!     advisor.update_limits(services).await
//! }
//! ```

pub mod connector;
pub mod locator;
pub mod model;
pub mod poller;
pub mod reconciler;

#[cfg(test)]
pub(crate) mod testing;

use crate::aws::client::{SessionOptions, SupportClient};
use crate::service::Service;
use anyhow::Result;
use connector::{Connect, Connector};
use model::{CheckDescription, CheckResult};
use poller::RowPolicy;
use std::collections::HashMap;

pub use model::LimitUpdateMap;
pub use reconciler::ReconcileSummary;

/// The advisory API operations this crate consumes
#[allow(async_fn_in_trait)]
pub trait AdvisorApi {
    /// Region whose flagged resources are relevant to this session
    fn region(&self) -> &str;

    /// List every check available to the account
    async fn describe_checks(&self, language: &str) -> Result<Vec<CheckDescription>>;

    /// Latest result of one check
    async fn describe_check_result(&self, check_id: &str, language: &str) -> Result<CheckResult>;
}

impl Connect for SessionOptions {
    type Session = SupportClient;

    async fn establish(&self) -> Result<SupportClient> {
        SupportClient::connect(self).await
    }
}

/// Entry point: connect, poll and reconcile
pub struct TrustedAdvisor<C: Connect = SessionOptions> {
    connector: Connector<C>,
    row_policy: RowPolicy,
}

impl TrustedAdvisor<SessionOptions> {
    pub fn new(options: SessionOptions) -> Self {
        Self::with_connector(options)
    }
}

impl<C: Connect> TrustedAdvisor<C> {
    pub fn with_connector(factory: C) -> Self {
        Self {
            connector: Connector::new(factory),
            row_policy: RowPolicy::default(),
        }
    }

    /// How undecodable rows are treated (default: skip with a warning)
    pub fn with_row_policy(mut self, policy: RowPolicy) -> Self {
        self.row_policy = policy;
        self
    }

    /// Open the session if it is not open yet
    pub async fn connect(&mut self) -> Result<()> {
        self.connector.connect().await.map(|_| ())
    }

    /// Poll the current advisory limits without applying them.
    /// `None` when the "Service Limits" check is unavailable.
    pub async fn poll(&mut self) -> Result<Option<LimitUpdateMap>> {
        let policy = self.row_policy;
        let session = self.connector.connect().await?;
        poller::poll(session, policy).await
    }

    /// Poll Trusted Advisor and set the advisory limit of every known
    /// service/limit pair it reports.
    ///
    /// Unknown services and limits are logged and skipped. A missing check
    /// leaves `services` untouched and still returns `Ok(())`.
    pub async fn update_limits<S: Service>(
        &mut self,
        services: &mut HashMap<String, S>,
    ) -> Result<()> {
        self.update_limits_with_summary(services).await.map(|_| ())
    }

    /// Same as [`update_limits`](Self::update_limits), reporting what was applied
    pub async fn update_limits_with_summary<S: Service>(
        &mut self,
        services: &mut HashMap<String, S>,
    ) -> Result<Option<ReconcileSummary>> {
        let Some(updates) = self.poll().await? else {
            return Ok(None);
        };
        let summary = reconciler::apply(&updates, services)?;
        Ok(Some(summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor::testing::{check, check_result, row, CountingConnect, FakeAdvisor, SCHEMA};
    use crate::service::LimitedService;

    fn registry() -> HashMap<String, LimitedService> {
        let mut services = HashMap::new();
        services.insert(
            "EC2".to_string(),
            LimitedService::new("EC2")
                .with_limit("Running On-Demand Instances", 20)
                .with_limit("Elastic IP addresses (EIPs)", 5),
        );
        services.insert("VPC".to_string(), LimitedService::new("VPC").with_limit("VPCs", 5));
        services
    }

    fn advisor_api() -> FakeAdvisor {
        FakeAdvisor::new("us-east-1")
            .with_checks(vec![
                check("xyz", "security", "IAM Use", &[]),
                check("eW7HH0l7J9", "performance", "Service Limits", SCHEMA),
            ])
            .with_result(check_result(
                "eW7HH0l7J9",
                vec![
                    row("us-east-1", &["us-east-1", "EC2", "Running On-Demand Instances", "200"]),
                    row("us-east-1", &["us-east-1", "EC2", "Dedicated Hosts", "2"]),
                    row("us-east-1", &["us-east-1", "Foo", "Bars", "1"]),
                    row("us-west-2", &["us-west-2", "VPC", "VPCs", "50"]),
                ],
            ))
    }

    #[tokio::test]
    async fn test_update_limits_applies_known_pairs() {
        let factory = CountingConnect::new(advisor_api());
        let calls = factory.calls();
        let mut advisor = TrustedAdvisor::with_connector(factory);
        let mut services = registry();

        let summary = advisor
            .update_limits_with_summary(&mut services)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(summary.applied, 1);
        assert_eq!(summary.unknown_services, vec!["Foo".to_string()]);
        assert_eq!(summary.unknown_limits.len(), 1);

        let ec2 = &services["EC2"];
        assert_eq!(ec2.limit("Running On-Demand Instances").unwrap().advisory, Some(200));
        assert_eq!(ec2.limit("Elastic IP addresses (EIPs)").unwrap().advisory, None);
        // us-west-2 row must not leak into a us-east-1 session
        assert_eq!(services["VPC"].limit("VPCs").unwrap().advisory, None);

        advisor.update_limits(&mut services).await.unwrap();
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn test_missing_check_is_a_no_op() {
        let api = FakeAdvisor::new("us-east-1").with_checks(vec![check("a", "security", "MFA on Root Account", &[])]);
        let mut advisor = TrustedAdvisor::with_connector(CountingConnect::new(api));
        let mut services = registry();
        let before = services.clone();

        advisor.update_limits(&mut services).await.unwrap();
        assert_eq!(services, before);
    }

    #[tokio::test]
    async fn test_connection_failure_propagates() {
        let factory = CountingConnect::always_failing(advisor_api());
        let mut advisor = TrustedAdvisor::with_connector(factory);
        let mut services = registry();
        assert!(advisor.update_limits(&mut services).await.is_err());
    }

    #[tokio::test]
    async fn test_strict_policy_surfaces_bad_rows() {
        let api = FakeAdvisor::new("us-east-1")
            .with_checks(vec![check("id", "performance", "Service Limits", SCHEMA)])
            .with_result(check_result(
                "id",
                vec![row("us-east-1", &["us-east-1", "EC2", "Running On-Demand Instances", "x"])],
            ));
        let mut advisor =
            TrustedAdvisor::with_connector(CountingConnect::new(api)).with_row_policy(RowPolicy::Strict);
        let mut services = registry();
        assert!(advisor.update_limits(&mut services).await.is_err());
    }
}
