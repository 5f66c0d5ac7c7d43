//! Source-name to context-key mappings.
//!
//! A mapping is configured as a flat JSON object, for example
//! `{"X-Request-ID": "Correlation-ID", "activityid": "Activity-ID"}`, and says
//! which request header (or query parameter) feeds which context key.
//! Declaration order is preserved and decides precedence when two entries
//! target the same key.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Where a mapping reads its values from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingKind {
    Header,
    Query,
}

impl fmt::Display for MappingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingKind::Header => f.write_str("header"),
            MappingKind::Query => f.write_str("query"),
        }
    }
}

/// One `(source name, context key)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub source: String,
    pub context_key: String,
}

impl MappingEntry {
    /// ASCII case-insensitive comparison against a name seen on a request.
    pub fn matches(&self, name: &str) -> bool {
        self.source.eq_ignore_ascii_case(name)
    }
}

/// Ordered, immutable set of mapping entries for one source kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationMapping {
    kind: MappingKind,
    entries: Vec<MappingEntry>,
}

impl CorrelationMapping {
    pub fn empty(kind: MappingKind) -> Self {
        Self {
            kind,
            entries: Vec::new(),
        }
    }

    /// Parse mapping text. Blank text yields an empty mapping.
    ///
    /// Entries with an empty name or key are dropped; a non-string value or
    /// text that is not a JSON object is a [`ConfigError`].
    pub fn parse(kind: MappingKind, text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::empty(kind));
        }

        let object: serde_json::Map<String, Value> = serde_json::from_str(text)
            .map_err(|source| ConfigError::MalformedMapping { kind, source })?;

        let mut entries = Vec::with_capacity(object.len());
        for (source, value) in object {
            let context_key = match value {
                Value::String(s) => s,
                _ => return Err(ConfigError::NonStringValue { kind, key: source }),
            };
            if source.is_empty() || context_key.is_empty() {
                tracing::warn!(
                    kind = %kind,
                    source = %source,
                    context_key = %context_key,
                    "Ignoring mapping entry with empty name"
                );
                continue;
            }
            entries.push(MappingEntry {
                source,
                context_key,
            });
        }

        Ok(Self { kind, entries })
    }

    /// Build a mapping from pairs, skipping pairs with an empty side.
    pub fn from_pairs<I, S, K>(kind: MappingKind, pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, K)>,
        S: Into<String>,
        K: Into<String>,
    {
        let entries = pairs
            .into_iter()
            .map(|(s, k)| MappingEntry {
                source: s.into(),
                context_key: k.into(),
            })
            .filter(|e| !e.source.is_empty() && !e.context_key.is_empty())
            .collect();
        Self { kind, entries }
    }

    pub fn kind(&self) -> MappingKind {
        self.kind
    }

    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Context keys this mapping may write, in declaration order.
    pub fn context_keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.context_key.as_str())
    }
}
