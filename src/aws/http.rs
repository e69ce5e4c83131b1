//! HTTP utilities for AWS JSON 1.1 API calls

use super::auth::{AuthError, AwsCredentials};
use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Content type of the AWS JSON 1.1 protocol
pub const AMZ_JSON_1_1: &str = "application/x-amz-json-1.1";

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut cut = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..cut], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Pull the short error code out of an AWS JSON error body.
///
/// `__type` is either a bare code or `namespace#Code`; some services use `code`.
fn aws_error_code(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let raw = value
        .get("__type")
        .or_else(|| value.get("code"))
        .and_then(|v| v.as_str())?;
    Some(raw.rsplit('#').next().unwrap_or(raw).to_string())
}

/// Non-2xx response from an AWS JSON endpoint
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("API request failed: {status}{}", code_suffix(.code))]
pub struct ApiError {
    pub status: StatusCode,
    /// Short AWS error code, e.g. `ThrottlingException`
    pub code: Option<String>,
}

fn code_suffix(code: &Option<String>) -> String {
    code.as_ref()
        .map(|c| format!(" ({})", c))
        .unwrap_or_default()
}

/// HTTP client wrapper for signed AWS JSON 1.1 calls
#[derive(Clone)]
pub struct AwsHttpClient {
    client: Client,
}

impl AwsHttpClient {
    /// Create a new HTTP client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("ta-limits/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Invoke `target` (e.g. `AWSSupport_20130415.DescribeTrustedAdvisorChecks`)
    /// at `url` and decode the JSON response.
    pub async fn post_json<B, T>(
        &self,
        url: &str,
        target: &str,
        signing_region: &str,
        credentials: &AwsCredentials,
        body: &B,
    ) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        tracing::debug!("POST {} ({})", url, target);

        let payload = serde_json::to_vec(body).context("Failed to encode request body")?;
        let signed = credentials
            .sign_post(
                url,
                signing_region,
                &[("content-type", AMZ_JSON_1_1), ("x-amz-target", target)],
                &payload,
            )
            .await?;

        let mut request = self
            .client
            .post(url)
            .header("content-type", AMZ_JSON_1_1)
            .header("x-amz-target", target);
        for (name, value) in &signed {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .body(payload)
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            // Only log sanitized/truncated error body
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));
            return Err(ApiError {
                status,
                code: aws_error_code(&body),
            }
            .into());
        }

        serde_json::from_str(&body).context("Failed to parse response JSON")
    }
}

/// Format an AWS API error for display
/// Maps well-known failures to short hints instead of raw API details
pub fn format_aws_error(error: &anyhow::Error) -> String {
    for cause in error.chain() {
        if let Some(api) = cause.downcast_ref::<ApiError>() {
            return describe_api_error(api);
        }
        if cause.downcast_ref::<AuthError>().is_some() {
            return "AWS credentials not found. Run 'aws configure' or set AWS_PROFILE.".to_string();
        }
        if let Some(e) = cause.downcast_ref::<reqwest::Error>() {
            if e.is_connect() || e.is_timeout() {
                return "Request failed. Check your network connection and try again."
                    .to_string();
            }
        }
    }

    let error_str = format!("{:#}", error);
    let sanitized = error_str
        .chars()
        .filter(|c| c.is_ascii_graphic() || *c == ' ')
        .take(80)
        .collect::<String>();

    if sanitized.len() < error_str.len() {
        format!("{}...", sanitized)
    } else {
        sanitized
    }
}

fn describe_api_error(error: &ApiError) -> String {
    let message = match error.code.as_deref() {
        Some("SubscriptionRequiredException") => {
            "Trusted Advisor requires a Business or Enterprise support plan."
        }
        Some("AccessDeniedException") => {
            "Permission denied. Check the IAM policy allows support:Describe*."
        }
        Some("UnrecognizedClientException")
        | Some("InvalidSignatureException")
        | Some("InvalidClientTokenId")
        | Some("ExpiredTokenException") => "Authentication failed. Check your AWS access keys.",
        Some("ThrottlingException") => "Rate limit exceeded. Please try again later.",
        _ => match error.status {
            StatusCode::UNAUTHORIZED => "Authentication failed. Check your AWS access keys.",
            StatusCode::FORBIDDEN => {
                "Permission denied. Check the IAM policy allows support:Describe*."
            }
            StatusCode::TOO_MANY_REQUESTS => "Rate limit exceeded. Please try again later.",
            s if s.is_server_error() => {
                "AWS Support API temporarily unavailable. Please try again."
            }
            _ => return format!("AWS Support API rejected the request: {}", error),
        },
    };
    message.to_string()
}
