//! Pull AWS Trusted Advisor "Service Limits" values into a registry of services.
//!
//! - [`aws`] - Support API transport (credentials, signing, HTTP)
//! - [`advisor`] - Check lookup, result polling and reconciliation
//! - [`service`] - The service capability and a stock implementation
//! - [`config`] - Persistent user configuration

pub mod advisor;
pub mod aws;
pub mod config;
pub mod service;

pub use advisor::{LimitUpdateMap, TrustedAdvisor};
pub use service::{LimitError, LimitedService, Service};
