//! Services and their named limits
//!
//! The reconciler only needs the [`Service`] capability. [`LimitedService`] is
//! the stock implementation used by the command line tool.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Why a service refused an advisory limit
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LimitError {
    #[error("unknown limit '{limit}' for service {service}")]
    UnknownLimit { service: String, limit: String },

    #[error("invalid value {value} for limit '{limit}' of service {service}")]
    InvalidValue {
        service: String,
        limit: String,
        value: i64,
    },

    #[error("unknown service '{0}'")]
    UnknownService(String),
}

/// A service that can take advisory limit values
pub trait Service {
    /// Record the advisory value for `limit`.
    /// Must fail with [`LimitError::UnknownLimit`] if the name is not recognized.
    fn set_advisory_limit(&mut self, limit: &str, value: i64) -> Result<(), LimitError>;
}

impl<S: Service + ?Sized> Service for Box<S> {
    fn set_advisory_limit(&mut self, limit: &str, value: i64) -> Result<(), LimitError> {
        (**self).set_advisory_limit(limit, value)
    }
}

/// One named limit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limit {
    pub name: String,
    pub default: i64,
    pub advisory: Option<i64>,
    /// User-supplied value; beats everything else
    pub override_value: Option<i64>,
}

impl Limit {
    pub fn new(name: &str, default: i64) -> Self {
        Self {
            name: name.to_string(),
            default,
            advisory: None,
            override_value: None,
        }
    }

    /// Override, else the advisory value, else the default
    pub fn effective(&self) -> i64 {
        self.override_value
            .or(self.advisory)
            .unwrap_or(self.default)
    }
}

/// A service with a fixed set of limits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitedService {
    pub name: String,
    limits: BTreeMap<String, Limit>,
}

impl LimitedService {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            limits: BTreeMap::new(),
        }
    }

    /// Builder-style limit registration
    pub fn with_limit(mut self, name: &str, default: i64) -> Self {
        self.limits.insert(name.to_string(), Limit::new(name, default));
        self
    }

    pub fn limit(&self, name: &str) -> Option<&Limit> {
        self.limits.get(name)
    }

    /// Limits in name order
    pub fn limits(&self) -> impl Iterator<Item = &Limit> {
        self.limits.values()
    }

    pub fn set_override(&mut self, limit: &str, value: i64) -> Result<(), LimitError> {
        let entry = self.limit_mut(limit)?;
        entry.override_value = Some(value);
        Ok(())
    }

    fn limit_mut(&mut self, limit: &str) -> Result<&mut Limit, LimitError> {
        let service = &self.name;
        self.limits
            .get_mut(limit)
            .ok_or_else(|| LimitError::UnknownLimit {
                service: service.clone(),
                limit: limit.to_string(),
            })
    }
}

impl Service for LimitedService {
    fn set_advisory_limit(&mut self, limit: &str, value: i64) -> Result<(), LimitError> {
        if value < 0 {
            return Err(LimitError::InvalidValue {
                service: self.name.clone(),
                limit: limit.to_string(),
                value,
            });
        }
        let entry = self.limit_mut(limit)?;
        entry.advisory = Some(value);
        Ok(())
    }
}

/// A user-supplied `SERVICE/LIMIT=N` value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitOverride {
    pub service: String,
    pub limit: String,
    pub value: i64,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("expected SERVICE/LIMIT=N, got {0:?}")]
pub struct OverrideParseError(String);

impl FromStr for LimitOverride {
    type Err = OverrideParseError;

    /// Limit names may contain '/' and '=', so split on the first '/' and last '='
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || OverrideParseError(s.to_string());
        let (service, rest) = s.split_once('/').ok_or_else(invalid)?;
        let (limit, value) = rest.rsplit_once('=').ok_or_else(invalid)?;
        let (service, limit) = (service.trim(), limit.trim());
        if service.is_empty() || limit.is_empty() {
            return Err(invalid());
        }
        let value = value.trim().parse::<i64>().map_err(|_| invalid())?;
        if value < 0 {
            return Err(invalid());
        }
        Ok(Self {
            service: service.to_string(),
            limit: limit.to_string(),
            value,
        })
    }
}

/// Pin limits to user-supplied values. Unknown names are errors.
pub fn apply_overrides(
    services: &mut HashMap<String, LimitedService>,
    overrides: &[LimitOverride],
) -> Result<(), LimitError> {
    for item in overrides {
        let service = services
            .get_mut(&item.service)
            .ok_or_else(|| LimitError::UnknownService(item.service.clone()))?;
        service.set_override(&item.limit, item.value)?;
        tracing::debug!(
            service = %item.service,
            limit = %item.limit,
            "Limit overridden to {}",
            item.value
        );
    }
    Ok(())
}

/// service name -> limit name -> default value
#[derive(Debug, Deserialize)]
#[serde(transparent)]
struct RegistryFile(BTreeMap<String, BTreeMap<String, i64>>);

/// Parse a YAML registry definition
pub fn registry_from_yaml(content: &str) -> Result<HashMap<String, LimitedService>> {
    let file: RegistryFile =
        serde_yaml::from_str(content).context("Failed to parse services definition")?;

    Ok(file
        .0
        .into_iter()
        .map(|(name, limits)| {
            let service = limits
                .into_iter()
                .fold(LimitedService::new(&name), |svc, (limit, default)| {
                    svc.with_limit(&limit, default)
                });
            (name, service)
        })
        .collect())
}

/// Load a YAML registry definition from disk
pub fn load_registry(path: &Path) -> Result<HashMap<String, LimitedService>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read services file {}", path.display()))?;
    registry_from_yaml(&content)
}
