use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use http::Response;
use tracing::{debug, info, warn};

use super::EndpointRequest;
use crate::error::{ErrorCode, OAuth2Error, OAuth2Result};
use crate::model::{Client, ClientId, UserAccount};
use crate::repository::ClientRepository;
use crate::response_mode::ResponseMode;
use crate::response_type::{Authorization, ResponseType, ResponseTypeManager};
use crate::scope::ScopeManager;
use crate::validation::validate_redirect_uri;

/// The authorization endpoint (RFC 6749 §3.1)
///
/// Consent is collected by the application between the two steps:
///
/// 1. [`create_authorization`](Self::create_authorization) validates the
///    request and returns the [`Authorization`] to show to the end-user.
///    Errors here are never redirected: the redirect URI is not trusted yet.
/// 2. [`authorize`](Self::authorize) or [`deny`](Self::deny) answers the
///    client through the response mode.
pub struct AuthorizationEndpoint {
    clients: Arc<dyn ClientRepository>,
    response_types: Arc<ResponseTypeManager>,
    scopes: Arc<ScopeManager>,
}

impl std::fmt::Debug for AuthorizationEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationEndpoint")
            .field("response_types", &self.response_types.names())
            .finish_non_exhaustive()
    }
}

impl AuthorizationEndpoint {
    /// Create the endpoint
    pub fn new(
        clients: Arc<dyn ClientRepository>,
        response_types: Arc<ResponseTypeManager>,
        scopes: Arc<ScopeManager>,
    ) -> Self {
        Self {
            clients,
            response_types,
            scopes,
        }
    }

    /// Validate an authorization request for an authenticated end-user
    ///
    /// # Errors
    ///
    /// Returns a 400 error for an unknown client, an unregistered redirect
    /// URI, an unsupported response type or mode, unacceptable scopes and
    /// whatever the response type handlers reject.
    pub async fn create_authorization(
        &self,
        request: &EndpointRequest,
        user_account: UserAccount,
    ) -> OAuth2Result<Authorization> {
        let client = self.find_client(request).await?;
        let redirect_uri = Self::redirect_uri(request, &client)?;

        let response_type = request.param("response_type").unwrap_or_default().to_string();
        let handlers = self.response_types.find(&response_type)?;
        Self::check_client_may_use(&client, &response_type, &handlers)?;
        let response_mode = Self::response_mode(request, &handlers)?;

        let requested = ScopeManager::convert_to_array(request.param("scope").unwrap_or_default())?;
        let scopes = self.scopes.resolve_scopes(requested, &client)?;
        self.scopes.check_scopes_available(&scopes, &client)?;

        let authorization = Authorization::new(
            client,
            user_account,
            request.params().clone(),
            response_type,
            response_mode,
            redirect_uri,
            scopes,
            handlers,
        );
        for handler in authorization.handlers() {
            handler.check_authorization(&authorization)?;
        }

        debug!(
            client_id = %authorization.client.id,
            response_type = %authorization.response_type,
            response_mode = %authorization.response_mode,
            "Authorization request accepted"
        );
        Ok(authorization)
    }

    /// Issue the authorization response after consent
    ///
    /// Every handler prepares, then every handler finalizes; `state` is
    /// echoed back.
    ///
    /// # Errors
    ///
    /// Returns issuance and storage errors.
    pub async fn authorize(&self, mut authorization: Authorization) -> OAuth2Result<Response<String>> {
        let handlers = authorization.handlers().to_vec();
        let mut params = BTreeMap::new();
        for handler in &handlers {
            params.extend(handler.prepare_authorization(&mut authorization).await?);
        }
        for handler in &handlers {
            handler
                .finalize_authorization(&mut params, &authorization)
                .await?;
        }
        if let Some(state) = &authorization.state {
            params.insert("state".to_string(), state.clone());
        }

        info!(
            client_id = %authorization.client.id,
            user = %authorization.user_account.id,
            response_type = %authorization.response_type,
            scope = %authorization.scopes.join(" "),
            "Authorization granted"
        );
        authorization
            .response_mode
            .build_response(&authorization.redirect_uri, &params)
    }

    /// Answer `access_denied` after the end-user refused consent
    pub fn deny(&self, authorization: &Authorization) -> Response<String> {
        info!(
            client_id = %authorization.client.id,
            user = %authorization.user_account.id,
            "Authorization denied"
        );
        OAuth2Error::redirect(
            ErrorCode::AccessDenied,
            "The resource owner denied access to your client.",
            Some(&authorization.redirect_uri),
            Some(authorization.response_mode),
            authorization.state.as_deref(),
        )
        .into_response()
    }

    /// Run the whole flow for an end-user whose consent is already known
    pub async fn handle(
        &self,
        request: &EndpointRequest,
        user_account: UserAccount,
        consent_granted: bool,
    ) -> Response<String> {
        let authorization = match self.create_authorization(request, user_account).await {
            Ok(authorization) => authorization,
            Err(error) => {
                warn!(error = %error, "Authorization request rejected");
                return error.into_response();
            }
        };
        if !consent_granted {
            return self.deny(&authorization);
        }
        match self.authorize(authorization).await {
            Ok(response) => response,
            Err(error) => {
                warn!(error = %error, "Authorization failed");
                error.into_response()
            }
        }
    }

    async fn find_client(&self, request: &EndpointRequest) -> OAuth2Result<Client> {
        let client_id = request.non_empty_param("client_id").ok_or_else(|| {
            OAuth2Error::invalid_request("The parameter \"client_id\" is mandatory.")
        })?;
        self.clients
            .find(&ClientId::new(client_id))
            .await?
            .ok_or_else(|| OAuth2Error::invalid_request("Unknown client."))
    }

    /// The `redirect_uri` parameter, or the only registered URI when absent
    fn redirect_uri(request: &EndpointRequest, client: &Client) -> OAuth2Result<String> {
        match request.non_empty_param("redirect_uri") {
            Some(redirect_uri) => {
                validate_redirect_uri(redirect_uri)?;
                if !client.redirect_uris.iter().any(|uri| uri == redirect_uri) {
                    return Err(OAuth2Error::invalid_request(
                        "The specified redirect URI is not valid.",
                    ));
                }
                Ok(redirect_uri.to_string())
            }
            None => match client.redirect_uris.as_slice() {
                [only] => Ok(only.clone()),
                _ => Err(OAuth2Error::invalid_request(
                    "The parameter \"redirect_uri\" is mandatory.",
                )),
            },
        }
    }

    fn check_client_may_use(
        client: &Client,
        response_type: &str,
        handlers: &[Arc<dyn ResponseType>],
    ) -> OAuth2Result<()> {
        if !client.is_response_type_allowed(response_type) {
            return Err(OAuth2Error::unauthorized_client(format!(
                "The response type \"{response_type}\" is not allowed for this client."
            )));
        }
        for handler in handlers {
            for grant_type in handler.associated_grant_types() {
                if !client.is_grant_type_allowed(grant_type) {
                    return Err(OAuth2Error::unauthorized_client(format!(
                        "The response type \"{}\" requires the grant type \"{grant_type}\".",
                        handler.response_type()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Explicit `response_mode`, else the handlers' default
    ///
    /// Tokens never travel in the query string.
    fn response_mode(
        request: &EndpointRequest,
        handlers: &[Arc<dyn ResponseType>],
    ) -> OAuth2Result<ResponseMode> {
        let default = ResponseTypeManager::default_response_mode(handlers);
        let mode = match request.non_empty_param("response_mode") {
            Some(mode) => ResponseMode::from_str(mode)?,
            None => default,
        };
        if mode == ResponseMode::Query && default == ResponseMode::Fragment {
            return Err(OAuth2Error::invalid_request(
                "The response mode \"query\" is not allowed for this response type.",
            ));
        }
        Ok(mode)
    }
}
