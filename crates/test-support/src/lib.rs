//! Shared fakes and fixtures for reqtrace test suites.

pub mod common;
pub mod support;
