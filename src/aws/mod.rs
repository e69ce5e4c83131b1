//! AWS API interaction module
//!
//! This module provides the transport for the AWS Support API: credential
//! resolution and SigV4 signing, the JSON 1.1 HTTP client, and typed
//! Trusted Advisor operations.
//!
//! # Module Structure
//!
//! - [`auth`] - Credentials from the default provider chain, SigV4 signing
//! - [`client`] - Support API client and endpoint selection
//! - [`http`] - HTTP utilities for AWS JSON 1.1 calls
//!
//! # Example
//!
//! ```ignore
//! use ta_limits::aws::client::{SessionOptions, SupportClient};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let client = SupportClient::connect(&SessionOptions::default()).await?;
//!     let checks = client.describe_trusted_advisor_checks("en").await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod http;
