//! In-memory request implementing [`RequestView`].

use reqtrace_propagator::RequestView;

/// Request assembled header by header.
#[derive(Debug, Clone, Default)]
pub struct FakeRequest {
    headers: Vec<(String, String)>,
    query: Vec<(String, String)>,
}

impl FakeRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn query(mut self, name: &str, value: &str) -> Self {
        self.query.push((name.to_string(), value.to_string()));
        self
    }
}

impl RequestView for FakeRequest {
    fn header_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for (name, _) in &self.headers {
            if !names.iter().any(|seen| seen.eq_ignore_ascii_case(name)) {
                names.push(name);
            }
        }
        names
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    fn query_params(&self) -> Vec<(String, String)> {
        let mut params: Vec<(String, String)> = Vec::new();
        for (name, value) in &self.query {
            if !params.iter().any(|(seen, _)| seen == name) {
                params.push((name.clone(), value.clone()));
            }
        }
        params
    }
}
