//! Token endpoint grant types (RFC 6749 §4)
//!
//! The token endpoint runs a grant type in three steps:
//!
//! 1. [`GrantType::check_token_request`] checks the grant parameters are
//!    present, before client authentication.
//! 2. [`GrantType::prepare_token_response`] validates the grant against the
//!    authenticated client and fills the [`GrantTypeData`].
//! 3. [`GrantType::grant`] consumes what must be consumed (authorization
//!    code, rotated refresh token) right before issuance. Nothing is issued
//!    when it fails.

mod authorization_code;
mod client_credentials;
mod refresh_token;

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;

pub use authorization_code::AuthorizationCodeGrantType;
pub use client_credentials::ClientCredentialsGrantType;
pub use refresh_token::RefreshTokenGrantType;

use crate::endpoint::EndpointRequest;
use crate::error::{OAuth2Error, OAuth2Result};
use crate::model::{AuthCode, Client, DataBag, RefreshToken, ResourceOwnerId};

/// What a grant type hands to the token endpoint for issuance
#[derive(Debug, Clone)]
pub struct GrantTypeData {
    /// Authenticated client
    pub client: Client,
    /// Owner of the tokens to issue
    pub resource_owner_id: ResourceOwnerId,
    /// Upper bound for the `scope` parameter; server scopes when `None`
    pub available_scopes: Option<Vec<String>>,
    /// Scopes to grant
    pub scopes: Vec<String>,
    /// Parameters of the access token
    pub parameters: DataBag,
    /// Metadatas of the access token
    pub metadatas: DataBag,
    /// Whether a new refresh token must be issued
    pub issue_refresh_token: bool,
    /// Existing refresh token the access token is linked to
    pub refresh_token: Option<RefreshToken>,
    /// Authorization code being exchanged
    pub auth_code: Option<AuthCode>,
}

impl GrantTypeData {
    /// Data for `client` acting on its own behalf
    pub fn new(client: Client) -> Self {
        Self {
            resource_owner_id: ResourceOwnerId::Client(client.id.clone()),
            client,
            available_scopes: None,
            scopes: Vec::new(),
            parameters: DataBag::new(),
            metadatas: DataBag::new(),
            issue_refresh_token: false,
            refresh_token: None,
            auth_code: None,
        }
    }
}

/// A token endpoint grant type
#[async_trait]
pub trait GrantType: Send + Sync + Debug {
    /// The `grant_type` value
    fn grant_type(&self) -> &str;

    /// Check the grant parameters are present
    ///
    /// # Errors
    ///
    /// Returns `invalid_request` for a missing parameter.
    fn check_token_request(&self, request: &EndpointRequest) -> OAuth2Result<()>;

    /// Validate the grant and describe the tokens to issue
    ///
    /// # Errors
    ///
    /// Returns `invalid_grant` (or another client error) when the grant is
    /// not acceptable for the client.
    async fn prepare_token_response(
        &self,
        request: &EndpointRequest,
        data: GrantTypeData,
    ) -> OAuth2Result<GrantTypeData>;

    /// Consume the grant right before issuance
    ///
    /// # Errors
    ///
    /// Returns `invalid_grant` when the grant was consumed concurrently.
    async fn grant(&self, _data: &mut GrantTypeData) -> OAuth2Result<()> {
        Ok(())
    }
}

/// Registry of grant types
#[derive(Debug, Default)]
pub struct GrantTypeManager {
    types: Vec<Arc<dyn GrantType>>,
}

impl GrantTypeManager {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a grant type, replacing one with the same name
    pub fn add(&mut self, grant_type: Arc<dyn GrantType>) {
        self.types
            .retain(|t| t.grant_type() != grant_type.grant_type());
        self.types.push(grant_type);
    }

    /// Whether `name` is registered
    pub fn has(&self, name: &str) -> bool {
        self.types.iter().any(|t| t.grant_type() == name)
    }

    /// Look up a grant type requested by a client
    ///
    /// # Errors
    ///
    /// Returns `unsupported_grant_type` for unregistered names.
    pub fn get(&self, name: &str) -> OAuth2Result<Arc<dyn GrantType>> {
        self.types
            .iter()
            .find(|t| t.grant_type() == name)
            .cloned()
            .ok_or_else(|| {
                OAuth2Error::unsupported_grant_type(format!(
                    "The grant type \"{name}\" is not supported by this server."
                ))
            })
    }

    /// Registered grant types
    pub fn names(&self) -> Vec<&str> {
        self.types.iter().map(|t| t.grant_type()).collect()
    }
}

/// A mandatory token request parameter
pub(crate) fn required_param<'a>(request: &'a EndpointRequest, name: &str) -> OAuth2Result<&'a str> {
    request
        .non_empty_param(name)
        .ok_or_else(|| OAuth2Error::invalid_request(format!("The parameter \"{name}\" is mandatory.")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[derive(Debug)]
    struct Noop;

    #[async_trait]
    impl GrantType for Noop {
        fn grant_type(&self) -> &str {
            "urn:example:noop"
        }

        fn check_token_request(&self, request: &EndpointRequest) -> OAuth2Result<()> {
            required_param(request, "assertion").map(|_| ())
        }

        async fn prepare_token_response(
            &self,
            _request: &EndpointRequest,
            data: GrantTypeData,
        ) -> OAuth2Result<GrantTypeData> {
            Ok(data)
        }
    }

    #[test]
    fn test_manager_lookup() {
        let mut manager = GrantTypeManager::new();
        manager.add(Arc::new(Noop));

        assert!(manager.has("urn:example:noop"));
        assert_eq!(manager.names(), vec!["urn:example:noop"]);
        assert_eq!(
            manager.get("password").unwrap_err().code,
            ErrorCode::UnsupportedGrantType
        );
    }

    #[test]
    fn test_required_param() {
        let err = Noop
            .check_token_request(&EndpointRequest::post(&[("assertion", "")]))
            .unwrap_err();
        assert_eq!(
            err.description.as_deref(),
            Some("The parameter \"assertion\" is mandatory.")
        );
    }

    #[test]
    fn test_data_defaults_to_client_owner() {
        let data = GrantTypeData::new(Client::new("svc", "client_secret_basic"));
        assert_eq!(data.resource_owner_id.as_str(), "svc");
        assert!(!data.issue_refresh_token);
    }
}
