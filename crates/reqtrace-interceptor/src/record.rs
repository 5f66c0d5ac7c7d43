//! Records produced for executed statements.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Field names of [`StatementRecord`] and [`FailedQuery`]; context keys with
/// these names are never copied into a record.
pub const RECORD_FIELDS: &[&str] = &[
    "query",
    "methodName",
    "startTime",
    "delta",
    "connectionUrl",
    "callType",
    "elapsed",
    "error",
];

/// One timed execution of an instrumented statement.
///
/// Serialized as a flat JSON object: `query`, `methodName`, `startTime`
/// (epoch milliseconds), `delta` (milliseconds), `connectionUrl`, `callType`,
/// followed by the copied context fields under their own keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementRecord {
    /// SQL fixed at prepare time; `None` for plain statements
    pub query: Option<String>,
    pub method_name: String,
    pub start_time: u64,
    pub delta: Option<u64>,
    pub connection_url: Option<String>,
    pub call_type: String,
    #[serde(flatten)]
    pub context: BTreeMap<String, String>,
}

impl StatementRecord {
    /// Value of a copied context field.
    pub fn context_value(&self, key: &str) -> Option<&str> {
        self.context.get(key).map(String::as_str)
    }
}

/// A real execution that returned an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedQuery {
    pub query: Option<String>,
    pub method_name: String,
    pub start_time: u64,
    pub elapsed: u64,
    pub error: String,
    #[serde(flatten)]
    pub context: BTreeMap<String, String>,
}

impl FailedQuery {
    pub fn context_value(&self, key: &str) -> Option<&str> {
        self.context.get(key).map(String::as_str)
    }
}

pub(crate) fn epoch_millis(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH)
        .map(millis)
        .unwrap_or_default()
}

pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
