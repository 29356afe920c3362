use std::sync::Arc;

use http::{Method, Response};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{EndpointRequest, jsonp_callback, jsonp_response};
use crate::client_auth::ClientAuthenticator;
use crate::error::{OAuth2Error, OAuth2Result};
use crate::token_hint::TokenTypeHintManager;

/// The revocation endpoint (RFC 7009)
///
/// Unknown tokens and tokens of other clients are answered exactly like a
/// successful revocation.
#[derive(Debug)]
pub struct TokenRevocationEndpoint {
    authenticator: Arc<ClientAuthenticator>,
    hints: Arc<TokenTypeHintManager>,
    allow_get_method: bool,
    allow_jsonp_callback: bool,
}

impl TokenRevocationEndpoint {
    /// Create the endpoint accepting POST only, without JSONP
    pub fn new(authenticator: Arc<ClientAuthenticator>, hints: Arc<TokenTypeHintManager>) -> Self {
        Self {
            authenticator,
            hints,
            allow_get_method: false,
            allow_jsonp_callback: false,
        }
    }

    /// Also accept GET requests with query parameters
    #[must_use]
    pub fn allow_get_method(mut self, allow: bool) -> Self {
        self.allow_get_method = allow;
        self
    }

    /// Accept the `callback` parameter
    #[must_use]
    pub fn allow_jsonp_callback(mut self, allow: bool) -> Self {
        self.allow_jsonp_callback = allow;
        self
    }

    /// Answer a revocation request
    pub async fn handle(&self, request: &EndpointRequest) -> Response<String> {
        let callback = match jsonp_callback(request, self.allow_jsonp_callback) {
            Ok(callback) => callback,
            Err(error) => return error.into_response(),
        };
        match (self.process(request).await, callback) {
            (Ok(()), Some(callback)) => jsonp_response(&callback, None),
            (Ok(()), None) => Response::new(String::new()),
            (Err(error), Some(callback)) if !error.is_internal() => {
                jsonp_response(&callback, Some(&Value::Object(error.error_data())))
            }
            (Err(error), _) => {
                warn!(error = %error, "Revocation request rejected");
                error.into_response()
            }
        }
    }

    /// Revoke the token of a revocation request
    ///
    /// # Errors
    ///
    /// - `405` for a method other than POST (or GET when allowed)
    /// - `invalid_request` without `token`
    /// - `unsupported_token_type` for an unknown `token_type_hint`
    /// - `401 invalid_client` when client authentication fails
    pub async fn process(&self, request: &EndpointRequest) -> OAuth2Result<()> {
        let method_allowed = request.method == Method::POST
            || (self.allow_get_method && request.method == Method::GET);
        if !method_allowed {
            return Err(OAuth2Error::method_not_allowed(
                "Unsupported method for the revocation endpoint.",
            ));
        }
        let token = request
            .non_empty_param("token")
            .ok_or_else(|| OAuth2Error::invalid_request("The parameter \"token\" is mandatory."))?;
        let hint = request.non_empty_param("token_type_hint");
        if let Some(hint) = hint {
            self.hints.get(hint)?;
        }
        let client = self.authenticator.authenticate(request).await?;

        match self.hints.find(token, hint).await? {
            None => debug!(client_id = %client.id, "Revocation of an unknown token"),
            Some((_, record)) if record.client_id() != &client.id => {
                warn!(
                    client_id = %client.id,
                    owner = %record.client_id(),
                    "Revocation of a token issued to another client ignored"
                );
            }
            Some((hint, record)) => {
                hint.revoke(&record).await?;
                info!(client_id = %client.id, token_type = hint.hint(), "Token revoked");
            }
        }
        Ok(())
    }
}
