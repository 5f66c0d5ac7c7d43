//! Common test utilities and shared modules.

pub use crate::support::db::*;
pub use crate::support::hooks::*;
pub use crate::support::http::*;
mod fixtures;
pub use fixtures::{correlated, enabled_instrumentor, instrumentor_with};
