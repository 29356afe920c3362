use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{Authorization, ResponseType};
use crate::error::{OAuth2Error, OAuth2Result};
use crate::issuer::{TokenIssuer, TokenRequest};
use crate::model::ResourceOwnerId;
use crate::pkce::PkceMethodManager;
use crate::response_mode::ResponseMode;

/// `code`: the authorization code flow (RFC 6749 §4.1)
#[derive(Debug)]
pub struct CodeResponseType {
    issuer: Arc<TokenIssuer>,
    pkce_methods: Arc<PkceMethodManager>,
    enforce_pkce_for_public_clients: bool,
    refresh_token_without_offline_access: bool,
}

impl CodeResponseType {
    /// Create the handler
    pub fn new(issuer: Arc<TokenIssuer>, pkce_methods: Arc<PkceMethodManager>) -> Self {
        Self {
            issuer,
            pkce_methods,
            enforce_pkce_for_public_clients: true,
            refresh_token_without_offline_access: false,
        }
    }

    /// Require `code_challenge` from public clients
    #[must_use]
    pub fn enforce_pkce_for_public_clients(mut self, enforce: bool) -> Self {
        self.enforce_pkce_for_public_clients = enforce;
        self
    }

    /// Flag codes for a refresh token even without `offline_access`
    #[must_use]
    pub fn refresh_token_without_offline_access(mut self, allow: bool) -> Self {
        self.refresh_token_without_offline_access = allow;
        self
    }

    /// `offline_access` is honored only with `prompt=consent`
    ///
    /// Returns whether the code must issue a refresh token.
    fn apply_offline_access_policy(&self, authorization: &mut Authorization) -> bool {
        if !authorization.has_scope("offline_access") {
            return self.refresh_token_without_offline_access;
        }
        if authorization.has_prompt("consent") {
            return true;
        }
        debug!(
            client_id = %authorization.client.id,
            "offline_access requested without prompt=consent, scope ignored"
        );
        authorization.remove_scope("offline_access");
        self.refresh_token_without_offline_access
    }
}

#[async_trait]
impl ResponseType for CodeResponseType {
    fn response_type(&self) -> &str {
        "code"
    }

    fn associated_grant_types(&self) -> Vec<&'static str> {
        vec!["authorization_code"]
    }

    fn response_mode(&self) -> ResponseMode {
        ResponseMode::Query
    }

    fn check_authorization(&self, authorization: &Authorization) -> OAuth2Result<()> {
        match authorization.query_param("code_challenge") {
            Some(_) => {
                let method = authorization
                    .query_param("code_challenge_method")
                    .unwrap_or("plain");
                if !self.pkce_methods.has(method) {
                    return Err(OAuth2Error::invalid_request(
                        "Unsupported code challenge method.",
                    ));
                }
            }
            None if self.enforce_pkce_for_public_clients && authorization.client.is_public() => {
                return Err(OAuth2Error::invalid_request(
                    "Non-confidential clients must set a proof key (PKCE) for code exchange.",
                ));
            }
            None => {}
        }
        Ok(())
    }

    async fn prepare_authorization(
        &self,
        authorization: &mut Authorization,
    ) -> OAuth2Result<BTreeMap<String, String>> {
        let issue_refresh_token = self.apply_offline_access_policy(authorization);

        let request = TokenRequest::new(
            ResourceOwnerId::UserAccount(authorization.user_account.id.clone()),
            authorization.client.id.clone(),
        )
        .with_scopes(authorization.scopes.clone());
        let code = self
            .issuer
            .create_auth_code(
                &request,
                authorization.query_params.clone(),
                &authorization.redirect_uri,
                issue_refresh_token,
            )
            .await?;

        authorization.set_data("code", code.id().as_str());
        Ok(BTreeMap::from([(
            "code".to_string(),
            code.id().as_str().to_string(),
        )]))
    }
}
