//! Trusted Advisor data model
//!
//! Wire types returned by the advisory API, the positional row decoder, and
//! the per-service limit map handed from the poller to the reconciler.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Column holding the service name in "Service Limits" rows
pub const FIELD_SERVICE: &str = "Service";
/// Column holding the limit name
pub const FIELD_LIMIT_NAME: &str = "Limit Name";
/// Column holding the numeric limit
pub const FIELD_LIMIT_AMOUNT: &str = "Limit Amount";

/// One entry of `DescribeTrustedAdvisorChecks`
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CheckDescription {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub metadata: Vec<String>,
}

/// Result of `DescribeTrustedAdvisorCheckResult`
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub check_id: String,
    pub timestamp: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub flagged_resources: Vec<FlaggedResource>,
}

/// A flagged-resource row. Values line up with the check's metadata fields.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FlaggedResource {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub resource_id: String,
    #[serde(default)]
    pub is_suppressed: bool,
    #[serde(default, deserialize_with = "metadata_values")]
    pub metadata: Vec<Option<String>>,
}

/// Metadata cells come back as strings, occasionally numbers, or null
fn metadata_values<'de, D>(deserializer: D) -> Result<Vec<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Vec<Value> = Vec::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|v| match v {
            Value::Null => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        })
        .collect())
}

/// Failure to turn a flagged-resource row into a limit entry
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("row has {values} metadata values but the check defines {fields} fields")]
    LengthMismatch { fields: usize, values: usize },

    #[error("check metadata has no '{0}' field")]
    MissingField(String),

    #[error("row has no value for '{0}'")]
    NullField(String),

    #[error("'{field}' is not an integer: {value:?}")]
    InvalidAmount { field: String, value: String },
}

/// Ordered column names of a check's rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataSchema {
    fields: Vec<String>,
}

impl MetadataSchema {
    pub fn new(fields: Vec<String>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Pair each value with its column name. Lengths must match exactly.
    pub fn decode<'a>(&'a self, values: &'a [Option<String>]) -> Result<RowRecord<'a>, DecodeError> {
        if values.len() != self.fields.len() {
            return Err(DecodeError::LengthMismatch {
                fields: self.fields.len(),
                values: values.len(),
            });
        }
        let cells = self
            .fields
            .iter()
            .map(String::as_str)
            .zip(values.iter().map(Option::as_deref))
            .collect();
        Ok(RowRecord { cells })
    }
}

/// A decoded row: column name -> value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowRecord<'a> {
    cells: HashMap<&'a str, Option<&'a str>>,
}

impl<'a> RowRecord<'a> {
    pub fn get(&self, field: &str) -> Result<&'a str, DecodeError> {
        match self.cells.get(field) {
            None => Err(DecodeError::MissingField(field.to_string())),
            Some(None) => Err(DecodeError::NullField(field.to_string())),
            Some(Some(value)) => Ok(*value),
        }
    }

    pub fn get_integer(&self, field: &str) -> Result<i64, DecodeError> {
        let raw = self.get(field)?;
        raw.trim()
            .parse::<i64>()
            .map_err(|_| DecodeError::InvalidAmount {
                field: field.to_string(),
                value: raw.to_string(),
            })
    }
}

/// The located "Service Limits" check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvisoryCheckDescriptor {
    pub id: String,
    pub schema: MetadataSchema,
}

impl From<&CheckDescription> for AdvisoryCheckDescriptor {
    fn from(check: &CheckDescription) -> Self {
        Self {
            id: check.id.clone(),
            schema: MetadataSchema::new(check.metadata.clone()),
        }
    }
}

/// One projected row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitEntry {
    pub service: String,
    pub limit: String,
    pub amount: i64,
}

impl LimitEntry {
    pub fn from_record(record: &RowRecord<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            service: record.get(FIELD_SERVICE)?.to_string(),
            limit: record.get(FIELD_LIMIT_NAME)?.to_string(),
            amount: record.get_integer(FIELD_LIMIT_AMOUNT)?,
        })
    }
}

/// service name -> limit name -> advisory value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LimitUpdateMap {
    services: HashMap<String, HashMap<String, i64>>,
}

impl LimitUpdateMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, returning the one it replaced
    pub fn insert(&mut self, service: &str, limit: &str, amount: i64) -> Option<i64> {
        self.services
            .entry(service.to_string())
            .or_default()
            .insert(limit.to_string(), amount)
    }

    pub fn get(&self, service: &str, limit: &str) -> Option<i64> {
        self.services.get(service)?.get(limit).copied()
    }

    pub fn service(&self, service: &str) -> Option<&HashMap<String, i64>> {
        self.services.get(service)
    }

    /// Service names, in no particular order
    pub fn service_names(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }

    /// Number of services
    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Total number of (service, limit) pairs
    pub fn entry_count(&self) -> usize {
        self.services.values().map(HashMap::len).sum()
    }
}
