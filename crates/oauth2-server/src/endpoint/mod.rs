//! Protocol endpoints
//!
//! Endpoints take an [`EndpointRequest`] and answer with an
//! `http::Response<String>`; wiring them to a web framework is left to the
//! application. Errors are converted to responses here and nowhere else.

mod authorization;
mod introspection;
mod request;
mod revocation;
mod token;

use http::header::{CACHE_CONTROL, CONTENT_TYPE, PRAGMA};
use http::{HeaderValue, Response, StatusCode};
use serde_json::Value;

pub use authorization::AuthorizationEndpoint;
pub use introspection::TokenIntrospectionEndpoint;
pub use request::EndpointRequest;
pub use revocation::TokenRevocationEndpoint;
pub use token::{TokenEndpoint, TokenEndpointExtension};

use crate::error::{OAuth2Error, OAuth2Result};
use crate::validation::is_valid_callback_name;

/// JSON response that must not be cached (RFC 6749 §5.1)
pub(crate) fn json_response(status: StatusCode, body: &Value) -> Response<String> {
    let mut response = Response::new(body.to_string());
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    response
}

/// JSONP response (RFC 7009 §3): always 200, the payload wrapped in `callback(...)`
pub(crate) fn jsonp_response(callback: &str, body: Option<&Value>) -> Response<String> {
    let body = body.map(Value::to_string).unwrap_or_default();
    let mut response = Response::new(format!("{callback}({body});"));
    let headers = response.headers_mut();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("application/javascript; charset=utf-8"),
    );
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    response
}

/// The validated `callback` parameter of a JSONP request
pub(crate) fn jsonp_callback(request: &EndpointRequest, allowed: bool) -> OAuth2Result<Option<String>> {
    let Some(callback) = request.non_empty_param("callback") else {
        return Ok(None);
    };
    if !allowed {
        return Err(OAuth2Error::invalid_request(
            "The parameter \"callback\" is not allowed.",
        ));
    }
    if !is_valid_callback_name(callback) {
        return Err(OAuth2Error::invalid_request(
            "The parameter \"callback\" is invalid.",
        ));
    }
    Ok(Some(callback.to_string()))
}
