use std::collections::BTreeMap;

use http::header::AUTHORIZATION;
use http::{HeaderMap, HeaderValue, Method};

/// A transport-neutral HTTP request as seen by the endpoints
///
/// Callers decode the query string and the `application/x-www-form-urlencoded`
/// body; the endpoints only read parameters and headers.
#[derive(Debug, Clone)]
pub struct EndpointRequest {
    /// HTTP method
    pub method: Method,
    /// Decoded query parameters
    pub query: BTreeMap<String, String>,
    /// Decoded form body parameters
    pub body: BTreeMap<String, String>,
    /// Request headers
    pub headers: HeaderMap,
}

impl EndpointRequest {
    /// A GET request with query parameters
    pub fn get(query: &[(&str, &str)]) -> Self {
        Self {
            method: Method::GET,
            query: to_map(query),
            body: BTreeMap::new(),
            headers: HeaderMap::new(),
        }
    }

    /// A POST request with form body parameters
    pub fn post(body: &[(&str, &str)]) -> Self {
        Self {
            method: Method::POST,
            query: BTreeMap::new(),
            body: to_map(body),
            headers: HeaderMap::new(),
        }
    }

    /// Build from a method and raw query/body strings
    pub fn from_parts(method: Method, query: Option<&str>, body: Option<&str>, headers: HeaderMap) -> Self {
        let parse = |raw: Option<&str>| {
            raw.map(|raw| {
                url::form_urlencoded::parse(raw.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default()
        };
        Self {
            method,
            query: parse(query),
            body: parse(body),
            headers,
        }
    }

    /// Change the method
    #[must_use]
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Add a header; invalid values are ignored
    #[must_use]
    pub fn with_header(mut self, name: http::header::HeaderName, value: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Add an `Authorization` header
    #[must_use]
    pub fn with_authorization(self, value: &str) -> Self {
        self.with_header(AUTHORIZATION, value)
    }

    /// The parameters of this request: the body for POST, the query otherwise
    pub fn params(&self) -> &BTreeMap<String, String> {
        if self.method == Method::POST {
            &self.body
        } else {
            &self.query
        }
    }

    /// One parameter from [`params`](Self::params)
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params().get(key).map(String::as_str)
    }

    /// One parameter, treating the empty string as absent
    pub fn non_empty_param(&self, key: &str) -> Option<&str> {
        self.param(key).filter(|v| !v.is_empty())
    }

    /// The `Authorization` header value
    pub fn authorization_header(&self) -> Option<&str> {
        self.headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok())
    }
}

fn to_map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}
