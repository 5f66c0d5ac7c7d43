//! The correlation propagator.
//!
//! Precedence for the correlation key:
//! 1. configured headers (case-insensitive names, non-empty values)
//! 2. configured query parameters, only if headers did not supply the key
//! 3. a freshly generated UUID

use crate::config::PropagatorConfig;
use crate::request::RequestView;
use http::HeaderName;
use reqtrace_core::context::{self, ContextGuard, DiagnosticContext};
use reqtrace_core::correlation::key_or_default;
use reqtrace_core::{ConfigError, CorrelationId, CorrelationMapping, MappingKind, Result};
use reqtrace_observability::spans;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{Instrument, Span};

/// Where the correlation value of a request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelationSource {
    Header,
    Query,
    Generated,
    /// Already present in an enclosing context.
    Inherited,
}

impl fmt::Display for CorrelationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CorrelationSource::Header => "header",
            CorrelationSource::Query => "query",
            CorrelationSource::Generated => "generated",
            CorrelationSource::Inherited => "inherited",
        };
        f.write_str(s)
    }
}

struct Inner {
    header_mapping: CorrelationMapping,
    query_mapping: CorrelationMapping,
    correlation_key: String,
    response_header: Option<HeaderName>,
}

/// Resolves and scopes correlation values for inbound requests.
///
/// Built once from configuration; cloning shares the parsed mappings.
#[derive(Clone)]
pub struct CorrelationPropagator {
    inner: Arc<Inner>,
}

impl fmt::Debug for CorrelationPropagator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorrelationPropagator")
            .field("header_mapping", &self.inner.header_mapping)
            .field("query_mapping", &self.inner.query_mapping)
            .field("correlation_key", &self.inner.correlation_key)
            .field("response_header", &self.inner.response_header)
            .finish()
    }
}

impl CorrelationPropagator {
    /// Build a propagator, parsing the configured mappings.
    ///
    /// Malformed mapping text or an invalid response header name is a
    /// [`ConfigError`]; the component must not start with it. A blank
    /// correlation key means `Correlation-ID`.
    pub fn new(config: &PropagatorConfig) -> Result<Self> {
        let correlation_key = key_or_default(&config.correlation_key);
        let header_mapping = CorrelationMapping::parse(
            MappingKind::Header,
            config.header_mapping.as_deref().unwrap_or_default(),
        )?;
        let query_mapping = CorrelationMapping::parse(
            MappingKind::Query,
            config.query_mapping.as_deref().unwrap_or_default(),
        )?;
        let response_header = config
            .response_header
            .as_deref()
            .map(|name| {
                HeaderName::try_from(name).map_err(|_| ConfigError::InvalidHeaderName {
                    name: name.to_string(),
                })
            })
            .transpose()?;

        tracing::debug!(
            header_entries = header_mapping.entries().len(),
            query_entries = query_mapping.entries().len(),
            correlation_key = %correlation_key,
            "Correlation propagator configured"
        );

        Ok(Self::from_parts(
            header_mapping,
            query_mapping,
            correlation_key,
            response_header,
        ))
    }

    /// Build a propagator from already parsed mappings.
    pub fn from_parts(
        header_mapping: CorrelationMapping,
        query_mapping: CorrelationMapping,
        correlation_key: impl Into<String>,
        response_header: Option<HeaderName>,
    ) -> Self {
        let correlation_key = correlation_key.into();
        Self {
            inner: Arc::new(Inner {
                header_mapping,
                query_mapping,
                correlation_key: key_or_default(&correlation_key).to_string(),
                response_header,
            }),
        }
    }

    pub fn correlation_key(&self) -> &str {
        &self.inner.correlation_key
    }

    pub fn response_header(&self) -> Option<&HeaderName> {
        self.inner.response_header.as_ref()
    }

    /// Run `next` for `request` inside a correlation scope.
    ///
    /// `next` receives the request unmodified and its output is returned
    /// unchanged. Every key published for the request is removed before this
    /// returns, and also if the returned future is dropped early or `next`
    /// panics.
    pub async fn process<R, F, Fut>(&self, request: R, next: F) -> Fut::Output
    where
        R: RequestView,
        F: FnOnce(R) -> Fut,
        Fut: Future,
    {
        let scope = self.begin(&request);
        let downstream = scope.enter(|| next(request));
        scope.run(downstream).await
    }

    /// Resolve the request's values into a new scope without running anything.
    ///
    /// The scope is seeded from the enclosing context, if there is one, so
    /// nested code still sees outer values; writes never reach the outer
    /// context.
    pub fn begin<R: RequestView + ?Sized>(&self, request: &R) -> RequestScope {
        let context = context::current()
            .map(|outer| outer.fork())
            .unwrap_or_default();
        let mut guard = ContextGuard::new(context);
        let key = self.inner.correlation_key.as_str();
        let inherited = guard.context().contains_key(key);

        self.publish_headers(request, &mut guard);
        let mut source = if guard.keys().iter().any(|k| k == key) {
            Some(CorrelationSource::Header)
        } else {
            None
        };

        if !guard.context().contains_key(key) {
            self.publish_query_params(request, &mut guard);
            if guard.context().contains_key(key) {
                source = Some(CorrelationSource::Query);
            }
        }

        let source = match source {
            Some(source) => source,
            None if guard.context().contains_key(key) && inherited => CorrelationSource::Inherited,
            None => {
                guard.set(key, CorrelationId::generate().into_string());
                CorrelationSource::Generated
            }
        };

        let correlation_id = guard
            .context()
            .get(key)
            .map(CorrelationId::from)
            .unwrap_or_else(CorrelationId::generate);

        tracing::debug!(
            correlation_id = %correlation_id,
            source = %source,
            published = guard.keys().len(),
            "Correlation id resolved"
        );

        let span = spans::request(correlation_id.as_str());
        RequestScope {
            guard,
            correlation_id,
            source,
            span,
        }
    }

    fn publish_headers<R: RequestView + ?Sized>(&self, request: &R, guard: &mut ContextGuard) {
        if self.inner.header_mapping.is_empty() {
            return;
        }
        let names = request.header_names();
        for entry in self.inner.header_mapping.entries() {
            for name in names.iter().filter(|name| entry.matches(name)) {
                if let Some(value) = request.header(name).filter(|v| !v.is_empty()) {
                    guard.set(&entry.context_key, value);
                }
            }
        }
    }

    fn publish_query_params<R: RequestView + ?Sized>(
        &self,
        request: &R,
        guard: &mut ContextGuard,
    ) {
        if self.inner.query_mapping.is_empty() {
            return;
        }
        let params = request.query_params();
        for entry in self.inner.query_mapping.entries() {
            for (_, value) in params
                .iter()
                .filter(|(name, value)| entry.matches(name) && !value.is_empty())
            {
                guard.set(&entry.context_key, value.as_str());
            }
        }
    }
}

/// Correlation values published for one request.
///
/// Dropping the scope removes every key it published.
#[derive(Debug)]
pub struct RequestScope {
    guard: ContextGuard,
    correlation_id: CorrelationId,
    source: CorrelationSource,
    span: Span,
}

impl RequestScope {
    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    pub fn source(&self) -> CorrelationSource {
        self.source
    }

    pub fn context(&self) -> &DiagnosticContext {
        self.guard.context()
    }

    /// Context keys published by this scope.
    pub fn published_keys(&self) -> &[String] {
        self.guard.keys()
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Run synchronous code (such as building the downstream future) with
    /// the scope's context and span current.
    pub fn enter<F, T>(&self, f: F) -> T
    where
        F: FnOnce() -> T,
    {
        context::with_context_sync(self.context().clone(), || self.span.in_scope(f))
    }

    /// Drive `fut` to completion inside this scope, then clean up.
    pub async fn run<F: Future>(self, fut: F) -> F::Output {
        let RequestScope { guard, span, .. } = self;
        let output = context::with_context(guard.context().clone(), fut.instrument(span)).await;
        drop(guard);
        output
    }
}
