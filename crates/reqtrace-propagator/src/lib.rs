//! Per-request correlation id propagation.
//!
//! Resolves a correlation id for each inbound request from configured headers
//! or query parameters (generating one when neither supplies it), publishes it
//! into the request's diagnostic context for the duration of the downstream
//! call, and removes everything it published when the call finishes.

pub mod config;
pub mod layer;
pub mod propagator;
pub mod request;

pub use config::PropagatorConfig;
pub use layer::{CorrelationLayer, CorrelationService};
pub use propagator::{CorrelationPropagator, CorrelationSource, RequestScope};
pub use request::RequestView;
