use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::{Authorization, ResponseType, to_response_parameters};
use crate::error::OAuth2Result;
use crate::issuer::{TokenIssuer, TokenRequest};
use crate::model::{DataBag, ResourceOwnerId};
use crate::response_mode::ResponseMode;
use crate::token_type::TokenTypeManager;

/// `token`: the implicit flow (RFC 6749 §4.2)
///
/// The access token travels in the fragment and never comes with a refresh
/// token.
#[derive(Debug)]
pub struct ImplicitResponseType {
    issuer: Arc<TokenIssuer>,
    token_types: Arc<TokenTypeManager>,
}

impl ImplicitResponseType {
    /// Create the handler
    pub fn new(issuer: Arc<TokenIssuer>, token_types: Arc<TokenTypeManager>) -> Self {
        Self {
            issuer,
            token_types,
        }
    }
}

#[async_trait]
impl ResponseType for ImplicitResponseType {
    fn response_type(&self) -> &str {
        "token"
    }

    fn associated_grant_types(&self) -> Vec<&'static str> {
        vec!["implicit"]
    }

    fn response_mode(&self) -> ResponseMode {
        ResponseMode::Fragment
    }

    fn check_authorization(&self, authorization: &Authorization) -> OAuth2Result<()> {
        self.token_types
            .find_for_request(authorization.query_param("token_type"))
            .map(|_| ())
    }

    async fn prepare_authorization(
        &self,
        authorization: &mut Authorization,
    ) -> OAuth2Result<BTreeMap<String, String>> {
        let token_type = self
            .token_types
            .find_for_request(authorization.query_param("token_type"))?;

        let request = TokenRequest::new(
            ResourceOwnerId::UserAccount(authorization.user_account.id.clone()),
            authorization.client.id.clone(),
        )
        .with_scopes(authorization.scopes.clone())
        .with_parameters(token_type.additional_information().into_iter().collect())
        .with_metadatas(DataBag::new().with("redirect_uri", authorization.redirect_uri.as_str()));
        let token = self.issuer.create_access_token(&request, None).await?;

        authorization.set_data("access_token", token.id().as_str());
        Ok(to_response_parameters(token.response_data()))
    }
}
