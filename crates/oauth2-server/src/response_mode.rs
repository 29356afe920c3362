//! Response modes: how authorization response parameters reach the client.
//!
//! - `query`: appended to the redirect URI query component
//! - `fragment`: placed in the redirect URI fragment
//! - `form_post`: an auto-submitting HTML form (OAuth 2.0 Form Post Response Mode)

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use http::header::{CACHE_CONTROL, CONTENT_TYPE, LOCATION, PRAGMA};
use http::{HeaderValue, Response, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{OAuth2Error, OAuth2Result};

/// Transport of authorization response parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    /// Parameters in the query string
    Query,
    /// Parameters in the URI fragment
    Fragment,
    /// Parameters in an auto-submitted HTML form
    FormPost,
}

impl ResponseMode {
    /// All modes this server understands
    pub const ALL: [Self; 3] = [Self::Query, Self::Fragment, Self::FormPost];

    /// The `response_mode` parameter value
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Fragment => "fragment",
            Self::FormPost => "form_post",
        }
    }

    /// Build the HTTP response that delivers `params` to `redirect_uri`
    ///
    /// # Errors
    ///
    /// Returns an internal error when the redirect URI cannot be parsed or the
    /// resulting `Location` would contain control characters.
    pub fn build_response(
        &self,
        redirect_uri: &str,
        params: &BTreeMap<String, String>,
    ) -> OAuth2Result<Response<String>> {
        let mut url = Url::parse(redirect_uri)
            .map_err(|e| OAuth2Error::internal(format!("Invalid redirect URI: {e}")))?;

        match self {
            Self::Query => {
                if !params.is_empty() {
                    url.query_pairs_mut().extend_pairs(params.iter());
                }
                redirect(url.as_str())
            }
            Self::Fragment => {
                let fragment = url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(params.iter())
                    .finish();
                url.set_fragment(Some(&fragment));
                redirect(url.as_str())
            }
            Self::FormPost => Ok(form_post(url.as_str(), params)),
        }
    }
}

impl fmt::Display for ResponseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseMode {
    type Err = OAuth2Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| {
                OAuth2Error::invalid_request(format!("Unsupported response mode \"{s}\"."))
            })
    }
}

fn redirect(location: &str) -> OAuth2Result<Response<String>> {
    // Header injection guard: HeaderValue rejects CR/LF but accepts other
    // obs-text bytes, so control characters are refused explicitly.
    if location.chars().any(char::is_control) {
        return Err(OAuth2Error::internal(
            "Redirect location contains control characters.",
        ));
    }
    let value = HeaderValue::from_str(location)
        .map_err(|e| OAuth2Error::internal(format!("Invalid redirect location: {e}")))?;

    let mut response = Response::new(String::new());
    *response.status_mut() = StatusCode::FOUND;
    response.headers_mut().insert(LOCATION, value);
    Ok(response)
}

fn form_post(action: &str, params: &BTreeMap<String, String>) -> Response<String> {
    let inputs: String = params
        .iter()
        .map(|(name, value)| {
            format!(
                "<input type=\"hidden\" name=\"{}\" value=\"{}\"/>",
                escape_html(name),
                escape_html(value)
            )
        })
        .collect();

    let body = format!(
        "<!DOCTYPE html><html><head><title>Authorization form</title></head>\
         <body onload=\"javascript:document.forms[0].submit()\">\
         <form method=\"post\" action=\"{}\">{}</form></body></html>",
        escape_html(action),
        inputs
    );

    let mut response = Response::new(body);
    let headers = response.headers_mut();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    response
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
