//! OAuth 2.0 error model.
//!
//! This module provides the single error type [`OAuth2Error`] raised at every
//! validation failure point of the authorization server core.
//!
//! ## Design Goals
//!
//! 1. **Closed taxonomy**: [`ErrorKind`] decides the HTTP shape, [`ErrorCode`]
//!    is the RFC 6749 §5.2 / RFC 7009 / OpenID Connect `error` value
//! 2. **Raise at detection**: handlers return the error immediately; only the
//!    endpoint boundary converts it with [`OAuth2Error::into_response`]
//! 3. **Wire compatible**: `{"error", "error_description"?, "error_uri"?}`
//!
//! ## Example
//!
//! ```rust
//! use oauth2_server::error::{ErrorCode, OAuth2Error, OAuth2Result};
//!
//! fn check(code: Option<&str>) -> OAuth2Result<&str> {
//!     code.ok_or_else(|| OAuth2Error::invalid_request("Missing grant type parameter(s): code."))
//! }
//!
//! let err = check(None).unwrap_err();
//! assert_eq!(err.code, ErrorCode::InvalidRequest);
//! assert_eq!(err.http_status(), 400);
//! ```

use std::collections::BTreeMap;
use std::fmt;

use http::header::{CACHE_CONTROL, CONTENT_TYPE, PRAGMA, WWW_AUTHENTICATE};
use http::{HeaderValue, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::response_mode::ResponseMode;
use crate::www_authenticate::WwwAuthenticateBuilder;

/// Result type alias for authorization server operations
pub type OAuth2Result<T> = Result<T, OAuth2Error>;

/// Error classification deciding the HTTP status and response shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed or invalid request (400, JSON body)
    BadRequest,
    /// Client or token authentication failure (401, `WWW-Authenticate` only)
    Authenticate,
    /// Access forbidden (403, headers only)
    AccessDenied,
    /// HTTP method not accepted by the endpoint (405)
    MethodNotAllowed,
    /// Feature not implemented by this server (501)
    NotImplemented,
    /// Configuration or programmer error (500)
    InternalServerError,
    /// Error delivered back to the client redirect URI (302)
    Redirect,
}

/// The `error` member of an OAuth 2.0 error response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // === RFC 6749 ===
    /// `invalid_request`
    InvalidRequest,
    /// `invalid_client`
    InvalidClient,
    /// `invalid_grant`
    InvalidGrant,
    /// `invalid_scope`
    InvalidScope,
    /// `unauthorized_client`
    UnauthorizedClient,
    /// `unsupported_grant_type`
    UnsupportedGrantType,
    /// `unsupported_response_type`
    UnsupportedResponseType,
    /// `access_denied`
    AccessDenied,
    /// `server_error`
    ServerError,
    /// `temporarily_unavailable`
    TemporarilyUnavailable,

    // === RFC 6750 / RFC 7009 ===
    /// `invalid_token`
    InvalidToken,
    /// `insufficient_scope`
    InsufficientScope,
    /// `unsupported_token_type`
    UnsupportedTokenType,

    // === OpenID Connect Core 3.1.2.6 ===
    /// `interaction_required`
    InteractionRequired,
    /// `login_required`
    LoginRequired,
    /// `account_selection_required`
    AccountSelectionRequired,
    /// `consent_required`
    ConsentRequired,
    /// `invalid_request_uri`
    InvalidRequestUri,
    /// `invalid_request_object`
    InvalidRequestObject,
    /// `request_not_supported`
    RequestNotSupported,
    /// `request_uri_not_supported`
    RequestUriNotSupported,
    /// `registration_not_supported`
    RegistrationNotSupported,

    // === Server side ===
    /// `method_not_allowed`
    MethodNotAllowed,
    /// `not_implemented`
    NotImplemented,
    /// `internal_server_error`
    InternalServerError,
}

impl ErrorCode {
    /// The wire value of this code
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::InvalidClient => "invalid_client",
            Self::InvalidGrant => "invalid_grant",
            Self::InvalidScope => "invalid_scope",
            Self::UnauthorizedClient => "unauthorized_client",
            Self::UnsupportedGrantType => "unsupported_grant_type",
            Self::UnsupportedResponseType => "unsupported_response_type",
            Self::AccessDenied => "access_denied",
            Self::ServerError => "server_error",
            Self::TemporarilyUnavailable => "temporarily_unavailable",
            Self::InvalidToken => "invalid_token",
            Self::InsufficientScope => "insufficient_scope",
            Self::UnsupportedTokenType => "unsupported_token_type",
            Self::InteractionRequired => "interaction_required",
            Self::LoginRequired => "login_required",
            Self::AccountSelectionRequired => "account_selection_required",
            Self::ConsentRequired => "consent_required",
            Self::InvalidRequestUri => "invalid_request_uri",
            Self::InvalidRequestObject => "invalid_request_object",
            Self::RequestNotSupported => "request_not_supported",
            Self::RequestUriNotSupported => "request_uri_not_supported",
            Self::RegistrationNotSupported => "registration_not_supported",
            Self::MethodNotAllowed => "method_not_allowed",
            Self::NotImplemented => "not_implemented",
            Self::InternalServerError => "internal_server_error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a redirect error is delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTarget {
    /// Redirect URI validated for the client
    pub redirect_uri: String,
    /// Transport of the error parameters
    pub response_mode: ResponseMode,
    /// `state` echoed back to the client
    pub state: Option<String>,
}

/// A single `WWW-Authenticate` challenge attached to 401 responses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticateChallenge {
    /// Authentication scheme (`Bearer`, `Basic`, ...)
    pub scheme: String,
    /// Protection realm
    pub realm: Option<String>,
}

impl AuthenticateChallenge {
    /// Create a challenge for a scheme and optional realm
    pub fn new(scheme: impl Into<String>, realm: Option<String>) -> Self {
        Self {
            scheme: scheme.into(),
            realm,
        }
    }
}

/// Authorization server error
///
/// Every validation failure in the core is one of these. The [`kind`](Self::kind)
/// selects the HTTP representation; [`code`](Self::code) and the optional
/// description and URI form the RFC 6749 §5.2 error body.
#[derive(Debug, Clone, Error)]
#[error("{code}: {}", .description.as_deref().unwrap_or("no description"))]
pub struct OAuth2Error {
    /// Error classification
    pub kind: ErrorKind,
    /// OAuth 2.0 error code
    pub code: ErrorCode,
    /// Human-readable `error_description`
    pub description: Option<String>,
    /// `error_uri` as given (encoded on the JSON body, raw in redirects)
    pub uri: Option<String>,
    /// Redirect destination (only for [`ErrorKind::Redirect`])
    pub redirect: Option<Box<RedirectTarget>>,
    /// `WWW-Authenticate` challenges (only for [`ErrorKind::Authenticate`])
    pub challenges: Vec<AuthenticateChallenge>,
}

impl OAuth2Error {
    /// Create an error with kind, code, and description
    #[must_use]
    pub fn new(kind: ErrorKind, code: ErrorCode, description: impl Into<String>) -> Self {
        Self {
            kind,
            code,
            description: Some(description.into()),
            uri: None,
            redirect: None,
            challenges: Vec::new(),
        }
    }

    /// Create a 400 error with an arbitrary code (OpenID Connect codes included)
    #[must_use]
    pub fn bad_request(code: ErrorCode, description: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, code, description)
    }

    /// Create an `invalid_request` error
    #[must_use]
    pub fn invalid_request(description: impl Into<String>) -> Self {
        Self::bad_request(ErrorCode::InvalidRequest, description)
    }

    /// Create an `invalid_grant` error
    #[must_use]
    pub fn invalid_grant(description: impl Into<String>) -> Self {
        Self::bad_request(ErrorCode::InvalidGrant, description)
    }

    /// Create an `invalid_scope` error
    #[must_use]
    pub fn invalid_scope(description: impl Into<String>) -> Self {
        Self::bad_request(ErrorCode::InvalidScope, description)
    }

    /// Create an `unauthorized_client` error
    #[must_use]
    pub fn unauthorized_client(description: impl Into<String>) -> Self {
        Self::bad_request(ErrorCode::UnauthorizedClient, description)
    }

    /// Create an `unsupported_grant_type` error
    #[must_use]
    pub fn unsupported_grant_type(description: impl Into<String>) -> Self {
        Self::bad_request(ErrorCode::UnsupportedGrantType, description)
    }

    /// Create an `unsupported_response_type` error
    #[must_use]
    pub fn unsupported_response_type(description: impl Into<String>) -> Self {
        Self::bad_request(ErrorCode::UnsupportedResponseType, description)
    }

    /// Create an `unsupported_token_type` error (RFC 7009 §2.2.1)
    #[must_use]
    pub fn unsupported_token_type(description: impl Into<String>) -> Self {
        Self::bad_request(ErrorCode::UnsupportedTokenType, description)
    }

    /// Create a 401 `invalid_client` error
    ///
    /// Attach the challenges advertised by the authentication methods with
    /// [`with_challenges`](Self::with_challenges).
    #[must_use]
    pub fn invalid_client(description: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authenticate, ErrorCode::InvalidClient, description)
    }

    /// Create a 401 `invalid_token` error
    #[must_use]
    pub fn invalid_token(description: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authenticate, ErrorCode::InvalidToken, description)
    }

    /// Create a 403 `access_denied` error
    #[must_use]
    pub fn access_denied(description: impl Into<String>) -> Self {
        Self::new(ErrorKind::AccessDenied, ErrorCode::AccessDenied, description)
    }

    /// Create a 405 error
    #[must_use]
    pub fn method_not_allowed(description: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::MethodNotAllowed,
            ErrorCode::MethodNotAllowed,
            description,
        )
    }

    /// Create a 501 error
    #[must_use]
    pub fn not_implemented(description: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::NotImplemented,
            ErrorCode::NotImplemented,
            description,
        )
    }

    /// Create a 500 `internal_server_error` (configuration or storage failure)
    #[must_use]
    pub fn internal(description: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::InternalServerError,
            ErrorCode::InternalServerError,
            description,
        )
    }

    /// Create a 302 error delivered to the client redirect URI
    ///
    /// Both the redirect URI and the transport mode are mandatory. When either
    /// is missing the result is an `internal_server_error` instead: a redirect
    /// error without a destination is a server bug, never a client error.
    #[must_use]
    pub fn redirect(
        code: ErrorCode,
        description: impl Into<String>,
        redirect_uri: Option<&str>,
        response_mode: Option<ResponseMode>,
        state: Option<&str>,
    ) -> Self {
        match (redirect_uri, response_mode) {
            (Some(redirect_uri), Some(response_mode)) => Self {
                redirect: Some(Box::new(RedirectTarget {
                    redirect_uri: redirect_uri.to_string(),
                    response_mode,
                    state: state.map(String::from),
                })),
                ..Self::new(ErrorKind::Redirect, code, description)
            },
            (None, _) => Self::internal("A redirect error requires a \"redirect_uri\"."),
            (_, None) => Self::internal("A redirect error requires a valid \"transport_mode\"."),
        }
    }

    /// Set the `error_uri`
    #[must_use]
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    /// Set the `WWW-Authenticate` challenges
    #[must_use]
    pub fn with_challenges(mut self, challenges: Vec<AuthenticateChallenge>) -> Self {
        self.challenges = challenges;
        self
    }

    /// Whether this error is a configuration/programmer error
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self.kind, ErrorKind::InternalServerError)
    }

    /// Get the HTTP status code for this error
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self.kind {
            ErrorKind::BadRequest => 400,
            ErrorKind::Authenticate => 401,
            ErrorKind::AccessDenied => 403,
            ErrorKind::MethodNotAllowed => 405,
            ErrorKind::NotImplemented => 501,
            ErrorKind::InternalServerError => 500,
            ErrorKind::Redirect => 302,
        }
    }

    /// The RFC 6749 §5.2 error body
    ///
    /// `error_uri` is percent-encoded in this representation.
    #[must_use]
    pub fn error_data(&self) -> Map<String, Value> {
        let mut data = Map::new();
        data.insert("error".to_string(), Value::from(self.code.as_str()));
        if let Some(description) = &self.description {
            data.insert("error_description".to_string(), Value::from(description.as_str()));
        }
        if let Some(uri) = &self.uri {
            data.insert(
                "error_uri".to_string(),
                Value::from(urlencoding::encode(uri).into_owned()),
            );
        }
        data
    }

    /// Convert this error into its HTTP representation
    ///
    /// - 401 carries one `WWW-Authenticate` header per challenge and no body
    /// - 403 carries no body
    /// - 302 carries the error in the redirect URI per the response mode
    /// - everything else is a JSON body
    #[must_use]
    pub fn into_response(&self) -> Response<String> {
        match self.kind {
            ErrorKind::Redirect => self.redirect_response(),
            ErrorKind::Authenticate => {
                let mut response = status_only(StatusCode::UNAUTHORIZED);
                for challenge in &self.challenges {
                    let mut builder = WwwAuthenticateBuilder::new(&challenge.scheme)
                        .with_error(self.code.as_str(), self.description.as_deref());
                    if let Some(realm) = &challenge.realm {
                        builder = builder.with_realm(realm);
                    }
                    if let Ok(value) = HeaderValue::from_str(&builder.build()) {
                        response.headers_mut().append(WWW_AUTHENTICATE, value);
                    }
                }
                response
            }
            ErrorKind::AccessDenied => status_only(StatusCode::FORBIDDEN),
            _ => {
                let status = StatusCode::from_u16(self.http_status())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                let body = Value::Object(self.error_data()).to_string();
                let mut response = status_only(status);
                *response.body_mut() = body;
                let headers = response.headers_mut();
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
                headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
                response
            }
        }
    }

    fn redirect_response(&self) -> Response<String> {
        let Some(target) = &self.redirect else {
            return Self::internal("Redirect error without destination.").into_response();
        };

        let mut params = BTreeMap::new();
        params.insert("error".to_string(), self.code.as_str().to_string());
        if let Some(description) = &self.description {
            params.insert("error_description".to_string(), description.clone());
        }
        if let Some(uri) = &self.uri {
            // Redirect parameters are encoded once by the response mode
            params.insert("error_uri".to_string(), uri.clone());
        }
        if let Some(state) = &target.state {
            params.insert("state".to_string(), state.clone());
        }

        match target
            .response_mode
            .build_response(&target.redirect_uri, &params)
        {
            Ok(response) => response,
            Err(error) => error.into_response(),
        }
    }
}

fn status_only(status: StatusCode) -> Response<String> {
    let mut response = Response::new(String::new());
    *response.status_mut() = status;
    response
}
