//! AWS Authentication
//!
//! Resolves credentials through the standard AWS provider chain (environment,
//! shared config/credentials files, SSO, instance metadata) and signs Support
//! API requests with SigV4.

use anyhow::{Context, Result};
use aws_config::BehaviorVersion;
use aws_credential_types::provider::error::CredentialsError;
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_credential_types::Credentials;
use aws_sigv4::http_request::{sign, SignableBody, SignableRequest, SigningSettings};
use aws_sigv4::sign::v4;
use aws_smithy_runtime_api::client::identity::Identity;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use thiserror::Error;
use tokio::sync::RwLock;

/// Signing name of the AWS Support API
pub const SIGNING_SERVICE: &str = "support";

/// Refresh credentials this much before they actually expire
const CREDENTIALS_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// How long to keep credentials that carry no expiry (static keys, env vars)
const DEFAULT_CREDENTIALS_TTL: Duration = Duration::from_secs(30 * 60);

/// Credentials could not be obtained
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No AWS credentials provider found. Configure credentials or set AWS_PROFILE")]
    NoProvider,

    #[error("Failed to resolve AWS credentials")]
    Resolve(#[source] CredentialsError),
}

/// AWS credentials holder with caching
#[derive(Clone)]
pub struct AwsCredentials {
    provider: SharedCredentialsProvider,
    cache: Arc<RwLock<Option<CachedCredentials>>>,
}

#[derive(Clone)]
struct CachedCredentials {
    credentials: Credentials,
    /// When these credentials should be refreshed (with buffer applied)
    expires_at: Instant,
}

impl CachedCredentials {
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

impl AwsCredentials {
    /// Resolve credentials with the default provider chain, optionally pinned
    /// to a named profile. Also returns the region the chain resolved, if any.
    pub async fn from_default_chain(profile: Option<&str>) -> Result<(Self, Option<String>)> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(profile) = profile {
            loader = loader.profile_name(profile);
        }
        let sdk_config = loader.load().await;

        let provider = sdk_config
            .credentials_provider()
            .ok_or(AuthError::NoProvider)?;
        let region = sdk_config.region().map(|r| r.to_string());

        Ok((Self::from_provider(provider), region))
    }

    /// Use fixed credentials (tests, explicit key pairs)
    pub fn from_static(credentials: Credentials) -> Self {
        Self::from_provider(SharedCredentialsProvider::new(credentials))
    }

    fn from_provider(provider: SharedCredentialsProvider) -> Self {
        Self {
            provider,
            cache: Arc::new(RwLock::new(None)),
        }
    }

    /// Get credentials for signing, refreshing them when the cached set is stale
    pub async fn get_credentials(&self) -> Result<Credentials> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Ok(cached.credentials.clone());
                }
                tracing::debug!("Cached AWS credentials expired, resolving again");
            }
        }

        let credentials = self
            .provider
            .provide_credentials()
            .await
            .map_err(AuthError::Resolve)?;

        let ttl = credentials
            .expiry()
            .and_then(|expiry| expiry.duration_since(SystemTime::now()).ok())
            .unwrap_or(DEFAULT_CREDENTIALS_TTL);
        let expires_at = Instant::now() + ttl.saturating_sub(CREDENTIALS_EXPIRY_BUFFER);

        {
            let mut cache = self.cache.write().await;
            *cache = Some(CachedCredentials {
                credentials: credentials.clone(),
                expires_at,
            });
        }

        tracing::debug!(
            "AWS credentials cached for ~{} minutes",
            ttl.saturating_sub(CREDENTIALS_EXPIRY_BUFFER).as_secs() / 60
        );

        Ok(credentials)
    }

    /// Drop the cached credentials and resolve them again
    pub async fn refresh(&self) -> Result<Credentials> {
        {
            let mut cache = self.cache.write().await;
            *cache = None;
        }
        self.get_credentials().await
    }

    /// Compute the SigV4 headers for a POST with the given headers and body.
    ///
    /// The returned pairs (`x-amz-date`, `authorization` and, for temporary
    /// credentials, `x-amz-security-token`) must be added to the request as-is.
    pub async fn sign_post(
        &self,
        url: &str,
        signing_region: &str,
        headers: &[(&str, &str)],
        body: &[u8],
    ) -> Result<Vec<(String, String)>> {
        let identity: Identity = self.get_credentials().await?.into();

        let params = v4::SigningParams::builder()
            .identity(&identity)
            .region(signing_region)
            .name(SIGNING_SERVICE)
            .time(SystemTime::now())
            .settings(SigningSettings::default())
            .build()
            .context("Failed to build SigV4 signing parameters")?
            .into();

        let signable = SignableRequest::new(
            "POST",
            url,
            headers.iter().copied(),
            SignableBody::Bytes(body),
        )
        .context("Request is not signable")?;

        let (instructions, _signature) = sign(signable, &params)
            .context("Failed to sign request")?
            .into_parts();

        Ok(instructions
            .headers()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect())
    }
}

/// Region from the usual AWS environment variables
pub fn region_from_env() -> Option<String> {
    ["AWS_REGION", "AWS_DEFAULT_REGION"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .map(|value| value.trim().to_string())
        .find(|value| validate_region(value))
}

/// Profile from `AWS_PROFILE`
pub fn profile_from_env() -> Option<String> {
    std::env::var("AWS_PROFILE")
        .ok()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
}

/// Loose check of an AWS region name, e.g. `us-east-1` or `us-gov-west-1`.
/// Rejects anything that could not be a path/host segment.
pub fn validate_region(region: &str) -> bool {
    if region.is_empty() || region.len() > 32 {
        return false;
    }
    if region.starts_with('-') || region.ends_with('-') {
        return false;
    }
    region.contains('-')
        && region
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}
