use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use http::{Method, Response, StatusCode};
use serde_json::{Map, Value};
use tracing::{info, warn};

use super::{EndpointRequest, json_response};
use crate::client_auth::ClientAuthenticator;
use crate::error::{OAuth2Error, OAuth2Result};
use crate::grant_type::{GrantTypeData, GrantTypeManager};
use crate::issuer::{TokenIssuer, TokenRequest};
use crate::model::{AccessToken, RefreshToken};
use crate::scope::ScopeManager;
use crate::token_type::TokenTypeManager;

/// Adds members to successful token responses (OpenID Connect `id_token`)
#[async_trait]
pub trait TokenEndpointExtension: Send + Sync + Debug {
    /// Complete the response for an issued access token
    ///
    /// # Errors
    ///
    /// Returns issuance or storage errors; the whole response fails.
    async fn process(
        &self,
        data: &GrantTypeData,
        access_token: &AccessToken,
        response: &mut Map<String, Value>,
    ) -> OAuth2Result<()>;
}

/// The token endpoint (RFC 6749 §3.2)
///
/// Order of checks: method, `grant_type`, grant parameters, client
/// authentication, grant validation, scope reduction, consumption, issuance.
#[derive(Debug)]
pub struct TokenEndpoint {
    authenticator: Arc<ClientAuthenticator>,
    grant_types: Arc<GrantTypeManager>,
    scopes: Arc<ScopeManager>,
    token_types: Arc<TokenTypeManager>,
    issuer: Arc<TokenIssuer>,
    extensions: Vec<Arc<dyn TokenEndpointExtension>>,
}

impl TokenEndpoint {
    /// Create the endpoint without extensions
    pub fn new(
        authenticator: Arc<ClientAuthenticator>,
        grant_types: Arc<GrantTypeManager>,
        scopes: Arc<ScopeManager>,
        token_types: Arc<TokenTypeManager>,
        issuer: Arc<TokenIssuer>,
    ) -> Self {
        Self {
            authenticator,
            grant_types,
            scopes,
            token_types,
            issuer,
            extensions: Vec::new(),
        }
    }

    /// Register an extension
    #[must_use]
    pub fn with_extension(mut self, extension: Arc<dyn TokenEndpointExtension>) -> Self {
        self.extensions.push(extension);
        self
    }

    /// Answer a token request
    pub async fn handle(&self, request: &EndpointRequest) -> Response<String> {
        match self.process(request).await {
            Ok(body) => json_response(StatusCode::OK, &Value::Object(body)),
            Err(error) => {
                warn!(error = %error, "Token request rejected");
                error.into_response()
            }
        }
    }

    /// Validate a token request and issue the tokens
    ///
    /// # Errors
    ///
    /// - `405` for anything but POST
    /// - `invalid_request`, `unsupported_grant_type`, `unauthorized_client`,
    ///   `invalid_grant`, `invalid_scope` per RFC 6749 §5.2
    /// - `401 invalid_client` when client authentication fails
    pub async fn process(&self, request: &EndpointRequest) -> OAuth2Result<Map<String, Value>> {
        if request.method != Method::POST {
            return Err(OAuth2Error::method_not_allowed(
                "The token endpoint only accepts POST requests.",
            ));
        }
        let grant_type_name = request.non_empty_param("grant_type").ok_or_else(|| {
            OAuth2Error::invalid_request("The parameter \"grant_type\" is mandatory.")
        })?;
        let grant_type = self.grant_types.get(grant_type_name)?;
        grant_type.check_token_request(request)?;

        let client = self.authenticator.authenticate(request).await?;
        if !client.is_grant_type_allowed(grant_type_name) {
            return Err(OAuth2Error::unauthorized_client(format!(
                "The grant type \"{grant_type_name}\" is unauthorized for this client."
            )));
        }

        let mut data = grant_type
            .prepare_token_response(request, GrantTypeData::new(client))
            .await?;
        self.reduce_scopes(request, &mut data)?;
        let token_type = self
            .token_types
            .find_for_request(request.param("token_type"))?;

        grant_type.grant(&mut data).await?;

        let refresh_token = self.refresh_token(&data).await?;
        let mut parameters = data.parameters.clone();
        for (key, value) in token_type.additional_information() {
            parameters.insert(key, value);
        }
        let token_request = TokenRequest::new(data.resource_owner_id.clone(), data.client.id.clone())
            .with_scopes(data.scopes.clone())
            .with_parameters(parameters)
            .with_metadatas(data.metadatas.clone());
        let access_token = self
            .issuer
            .create_access_token(&token_request, refresh_token.as_ref())
            .await?;

        let mut response = access_token.response_data();
        for extension in &self.extensions {
            extension.process(&data, &access_token, &mut response).await?;
        }

        info!(
            client_id = %data.client.id,
            grant_type = grant_type_name,
            scope = %data.scopes.join(" "),
            refresh_token = refresh_token.is_some(),
            "Token issued"
        );
        Ok(response)
    }

    /// Apply the `scope` parameter
    ///
    /// Without it the grant's scopes are kept, or the client policy applies
    /// when the grant carries none.
    fn reduce_scopes(&self, request: &EndpointRequest, data: &mut GrantTypeData) -> OAuth2Result<()> {
        let requested = ScopeManager::convert_to_array(request.param("scope").unwrap_or_default())?;
        if requested.is_empty() {
            if data.available_scopes.is_none() {
                data.scopes = self.scopes.resolve_scopes(requested, &data.client)?;
                self.scopes.check_scopes_available(&data.scopes, &data.client)?;
            }
            return Ok(());
        }

        let available = data
            .available_scopes
            .clone()
            .unwrap_or_else(|| self.scopes.available_scopes_for_client(&data.client));
        if !ScopeManager::are_request_scopes_available(&requested, &available) {
            return Err(OAuth2Error::invalid_scope(format!(
                "An unsupported scope was requested. Available scopes are {}.",
                available.join(", ")
            )));
        }
        data.scopes = requested;
        Ok(())
    }

    /// A new refresh token when the grant asks for one, else the grant's own
    async fn refresh_token(&self, data: &GrantTypeData) -> OAuth2Result<Option<RefreshToken>> {
        if !data.issue_refresh_token {
            return Ok(data.refresh_token.clone());
        }
        if !data.client.is_grant_type_allowed("refresh_token") {
            return Ok(None);
        }
        let scopes = data
            .available_scopes
            .clone()
            .unwrap_or_else(|| data.scopes.clone());
        let request = TokenRequest::new(data.resource_owner_id.clone(), data.client.id.clone())
            .with_scopes(scopes);
        Ok(Some(self.issuer.create_refresh_token(&request).await?))
    }
}
