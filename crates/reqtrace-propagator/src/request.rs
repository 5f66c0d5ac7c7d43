//! Read-only view of an inbound request.

use std::collections::HashSet;

/// The parts of a request the propagator reads. Implementations never
/// mutate the request.
pub trait RequestView {
    /// Distinct header names present on the request.
    fn header_names(&self) -> Vec<&str>;

    /// First value of header `name`, or `None` if absent or not valid text.
    fn header(&self, name: &str) -> Option<&str>;

    /// Decoded query parameters, first value per distinct name, in request order.
    fn query_params(&self) -> Vec<(String, String)>;
}

impl<T: RequestView + ?Sized> RequestView for &T {
    fn header_names(&self) -> Vec<&str> {
        (**self).header_names()
    }

    fn header(&self, name: &str) -> Option<&str> {
        (**self).header(name)
    }

    fn query_params(&self) -> Vec<(String, String)> {
        (**self).query_params()
    }
}

impl<B> RequestView for http::Request<B> {
    fn header_names(&self) -> Vec<&str> {
        self.headers().keys().map(|name| name.as_str()).collect()
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers().get(name).and_then(|value| value.to_str().ok())
    }

    fn query_params(&self) -> Vec<(String, String)> {
        self.uri()
            .query()
            .map(parse_query)
            .unwrap_or_default()
    }
}

/// Parse a raw query string, keeping the first value of each name.
pub fn parse_query(query: &str) -> Vec<(String, String)> {
    let mut seen = HashSet::new();
    url::form_urlencoded::parse(query.as_bytes())
        .filter(|(name, _)| seen.insert(name.to_string()))
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect()
}
