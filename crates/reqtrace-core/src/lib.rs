//! Request correlation core types and shared utilities.

pub mod context;
pub mod correlation;
pub mod error;
pub mod ids;
pub mod mapping;
pub mod toggle;

pub use context::{ContextGuard, DiagnosticContext};
pub use correlation::DEFAULT_CORRELATION_KEY;
pub use error::{ConfigError, Result, StatementClosedError};
pub use ids::CorrelationId;
pub use mapping::{CorrelationMapping, MappingEntry, MappingKind};
pub use toggle::{InstrumentationToggle, ToggleSource};
