//! Tower middleware running every request through a [`CorrelationPropagator`].

use crate::propagator::CorrelationPropagator;
use futures_util::future::BoxFuture;
use http::{HeaderValue, Request, Response};
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Layer that applies [`CorrelationService`] to a service.
#[derive(Debug, Clone)]
pub struct CorrelationLayer {
    propagator: CorrelationPropagator,
}

impl CorrelationLayer {
    pub fn new(propagator: CorrelationPropagator) -> Self {
        Self { propagator }
    }
}

impl<S> Layer<S> for CorrelationLayer {
    type Service = CorrelationService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CorrelationService {
            inner,
            propagator: self.propagator.clone(),
        }
    }
}

/// Middleware that scopes each request's correlation values around the
/// inner service and optionally echoes the id on the response.
#[derive(Debug, Clone)]
pub struct CorrelationService<S> {
    inner: S,
    propagator: CorrelationPropagator,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for CorrelationService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        let scope = self.propagator.begin(&request);
        let echo = self.propagator.response_header().cloned().and_then(|name| {
            HeaderValue::from_str(scope.correlation_id().as_str())
                .ok()
                .map(|value| (name, value))
        });

        let inner = &mut self.inner;
        let downstream = scope.enter(|| inner.call(request));

        Box::pin(async move {
            let mut response = scope.run(downstream).await?;
            if let Some((name, value)) = echo {
                response.headers_mut().insert(name, value);
            }
            Ok(response)
        })
    }
}
