//! AWS Support Client
//!
//! Main client for the Trusted Advisor operations of the AWS Support API,
//! combining credentials and HTTP functionality.

use super::auth::{self, AwsCredentials};
use super::http::AwsHttpClient;
use crate::advisor::model::{CheckDescription, CheckResult};
use crate::advisor::AdvisorApi;
use anyhow::{Context, Result};
use aws_credential_types::Credentials;
use serde::{Deserialize, Serialize};
use url::Url;

/// Region used when nothing else configures one
pub const DEFAULT_REGION: &str = "us-east-1";

const TARGET_PREFIX: &str = "AWSSupport_20130415";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DescribeChecksRequest<'a> {
    language: &'a str,
}

#[derive(Deserialize)]
struct DescribeChecksResponse {
    #[serde(default)]
    checks: Vec<CheckDescription>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DescribeCheckResultRequest<'a> {
    check_id: &'a str,
    language: &'a str,
}

#[derive(Deserialize)]
struct DescribeCheckResultResponse {
    result: CheckResult,
}

/// Where Support API calls go and which region they are signed for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportEndpoint {
    pub url: String,
    pub signing_region: String,
}

impl SupportEndpoint {
    /// The Support API only lives in one region per partition
    pub fn for_region(region: &str) -> Self {
        let (host, signing_region) = if region.starts_with("cn-") {
            ("support.cn-north-1.amazonaws.com.cn", "cn-north-1")
        } else if region.starts_with("us-gov-") {
            ("support.us-gov-west-1.amazonaws.com", "us-gov-west-1")
        } else {
            ("support.us-east-1.amazonaws.com", "us-east-1")
        };
        Self {
            url: format!("https://{}/", host),
            signing_region: signing_region.to_string(),
        }
    }

    /// Explicit endpoint (VPC endpoints, local mocks)
    pub fn custom(url: &str, signing_region: &str) -> Result<Self> {
        let parsed = Url::parse(url).with_context(|| format!("Invalid endpoint URL: {}", url))?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            anyhow::bail!("Endpoint must be an http(s) URL with a host: {}", url);
        }
        Ok(Self {
            url: parsed.to_string(),
            signing_region: signing_region.to_string(),
        })
    }
}

/// Options for opening a Support API session
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Region whose advisory rows are kept
    pub region: Option<String>,
    /// Named profile for the credential chain
    pub profile: Option<String>,
    /// Override for the Support API URL
    pub endpoint: Option<String>,
    /// Fixed credentials instead of the default provider chain
    pub credentials: Option<Credentials>,
}

/// Main AWS Support client
#[derive(Clone)]
pub struct SupportClient {
    pub credentials: AwsCredentials,
    pub http: AwsHttpClient,
    pub endpoint: SupportEndpoint,
    region: String,
}

impl SupportClient {
    /// Open a session using the default credential chain
    pub async fn connect(options: &SessionOptions) -> Result<Self> {
        let (credentials, chain_region) = match &options.credentials {
            Some(fixed) => (AwsCredentials::from_static(fixed.clone()), None),
            None => AwsCredentials::from_default_chain(options.profile.as_deref())
                .await
                .context("Failed to initialize AWS credentials")?,
        };

        let region = options
            .region
            .clone()
            .or(chain_region)
            .unwrap_or_else(|| DEFAULT_REGION.to_string());
        if !auth::validate_region(&region) {
            anyhow::bail!("Invalid AWS region: {}", region);
        }

        let endpoint = match options.endpoint.as_deref() {
            Some(url) => {
                SupportEndpoint::custom(url, &SupportEndpoint::for_region(&region).signing_region)?
            }
            None => SupportEndpoint::for_region(&region),
        };

        Self::with_parts(credentials, endpoint, &region)
    }

    /// Build a client from already-resolved pieces
    pub fn with_parts(
        credentials: AwsCredentials,
        endpoint: SupportEndpoint,
        region: &str,
    ) -> Result<Self> {
        Ok(Self {
            credentials,
            http: AwsHttpClient::new()?,
            endpoint,
            region: region.to_string(),
        })
    }

    fn target(operation: &str) -> String {
        format!("{}.{}", TARGET_PREFIX, operation)
    }

    /// List all Trusted Advisor checks available to the account
    pub async fn describe_trusted_advisor_checks(
        &self,
        language: &str,
    ) -> Result<Vec<CheckDescription>> {
        let response: DescribeChecksResponse = self
            .http
            .post_json(
                &self.endpoint.url,
                &Self::target("DescribeTrustedAdvisorChecks"),
                &self.endpoint.signing_region,
                &self.credentials,
                &DescribeChecksRequest { language },
            )
            .await
            .context("DescribeTrustedAdvisorChecks failed")?;
        Ok(response.checks)
    }

    /// Fetch the latest result of one check
    pub async fn describe_trusted_advisor_check_result(
        &self,
        check_id: &str,
        language: &str,
    ) -> Result<CheckResult> {
        let response: DescribeCheckResultResponse = self
            .http
            .post_json(
                &self.endpoint.url,
                &Self::target("DescribeTrustedAdvisorCheckResult"),
                &self.endpoint.signing_region,
                &self.credentials,
                &DescribeCheckResultRequest { check_id, language },
            )
            .await
            .with_context(|| format!("DescribeTrustedAdvisorCheckResult failed for {}", check_id))?;
        Ok(response.result)
    }
}

impl AdvisorApi for SupportClient {
    fn region(&self) -> &str {
        &self.region
    }

    async fn describe_checks(&self, language: &str) -> Result<Vec<CheckDescription>> {
        self.describe_trusted_advisor_checks(language).await
    }

    async fn describe_check_result(&self, check_id: &str, language: &str) -> Result<CheckResult> {
        self.describe_trusted_advisor_check_result(check_id, language)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_for_region() {
        let ep = SupportEndpoint::for_region("eu-west-1");
        assert_eq!(ep.url, "https://support.us-east-1.amazonaws.com/");
        assert_eq!(ep.signing_region, "us-east-1");

        let ep = SupportEndpoint::for_region("cn-northwest-1");
        assert_eq!(ep.url, "https://support.cn-north-1.amazonaws.com.cn/");
        assert_eq!(ep.signing_region, "cn-north-1");

        let ep = SupportEndpoint::for_region("us-gov-east-1");
        assert_eq!(ep.signing_region, "us-gov-west-1");
    }

    #[test]
    fn test_custom_endpoint() {
        let ep = SupportEndpoint::custom("http://127.0.0.1:4566", "us-east-1").unwrap();
        assert_eq!(ep.url, "http://127.0.0.1:4566/");
        assert!(SupportEndpoint::custom("ftp://example.com", "us-east-1").is_err());
        assert!(SupportEndpoint::custom("not a url", "us-east-1").is_err());
    }

    #[test]
    fn test_target_names() {
        assert_eq!(
            SupportClient::target("DescribeTrustedAdvisorChecks"),
            "AWSSupport_20130415.DescribeTrustedAdvisorChecks"
        );
    }
}
