use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::{Authorization, ResponseType};
use crate::error::OAuth2Result;
use crate::issuer::{TokenIssuer, TokenRequest};
use crate::model::{DataBag, ResourceOwnerId};
use crate::response_mode::ResponseMode;
use crate::token_type::TokenTypeManager;

/// `none` (OAuth 2.0 Multiple Response Type Encoding Practices §4)
///
/// Issues an access token but returns no parameter besides `state`.
#[derive(Debug)]
pub struct NoneResponseType {
    issuer: Arc<TokenIssuer>,
    token_types: Arc<TokenTypeManager>,
}

impl NoneResponseType {
    /// Create the handler
    pub fn new(issuer: Arc<TokenIssuer>, token_types: Arc<TokenTypeManager>) -> Self {
        Self {
            issuer,
            token_types,
        }
    }
}

#[async_trait]
impl ResponseType for NoneResponseType {
    fn response_type(&self) -> &str {
        "none"
    }

    fn associated_grant_types(&self) -> Vec<&'static str> {
        vec![]
    }

    fn response_mode(&self) -> ResponseMode {
        ResponseMode::Query
    }

    async fn prepare_authorization(
        &self,
        authorization: &mut Authorization,
    ) -> OAuth2Result<BTreeMap<String, String>> {
        let token_type = self.token_types.default_type()?;
        let request = TokenRequest::new(
            ResourceOwnerId::UserAccount(authorization.user_account.id.clone()),
            authorization.client.id.clone(),
        )
        .with_scopes(authorization.scopes.clone())
        .with_parameters(token_type.additional_information().into_iter().collect())
        .with_metadatas(DataBag::new().with("redirect_uri", authorization.redirect_uri.as_str()));
        let token = self.issuer.create_access_token(&request, None).await?;

        authorization.set_data("access_token", token.id().as_str());
        Ok(BTreeMap::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::RecordingEventPublisher;
    use crate::issuer::testing::issuer;
    use crate::memory::InMemoryStore;
    use crate::model::{Client, UserAccount};

    #[tokio::test]
    async fn test_none_returns_no_parameters() {
        let store = InMemoryStore::new();
        let events = RecordingEventPublisher::new();
        let handler = NoneResponseType::new(
            Arc::new(issuer(&store, &events)),
            Arc::new(TokenTypeManager::new()),
        );
        let mut auth = Authorization::new(
            Client::new("web", "client_secret_basic"),
            UserAccount::new("alice"),
            BTreeMap::new(),
            "none".to_string(),
            ResponseMode::Query,
            "https://web.example/cb".to_string(),
            Vec::new(),
            Vec::new(),
        );

        let params = handler.prepare_authorization(&mut auth).await.unwrap();

        assert!(params.is_empty());
        assert!(auth.data("access_token").is_some());
        assert_eq!(store.access_tokens.len(), 1);
    }
}
