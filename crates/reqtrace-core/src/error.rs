use crate::mapping::MappingKind;
use thiserror::Error;

/// Configuration failures. These surface at component construction, never
/// while a request is being served.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed {kind} mapping: {source}")]
    MalformedMapping {
        kind: MappingKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("{kind} mapping entry `{key}` must map to a string")]
    NonStringValue { kind: MappingKind, key: String },

    #[error("invalid header name `{name}`")]
    InvalidHeaderName { name: String },
}

/// An operation other than `close`/`is_closed` was invoked on a closed statement.
///
/// Driver error types implement `From<StatementClosedError>` so the failure
/// reaches callers as the driver's own error type.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("statement closed")]
pub struct StatementClosedError;

pub type Result<T> = std::result::Result<T, ConfigError>;
