use async_trait::async_trait;

use super::{GrantType, GrantTypeData};
use crate::endpoint::EndpointRequest;
use crate::error::{OAuth2Error, OAuth2Result};
use crate::model::ResourceOwnerId;

/// `client_credentials` (RFC 6749 §4.4)
///
/// The client is the resource owner. No refresh token is ever issued.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientCredentialsGrantType;

#[async_trait]
impl GrantType for ClientCredentialsGrantType {
    fn grant_type(&self) -> &str {
        "client_credentials"
    }

    fn check_token_request(&self, _request: &EndpointRequest) -> OAuth2Result<()> {
        Ok(())
    }

    async fn prepare_token_response(
        &self,
        _request: &EndpointRequest,
        mut data: GrantTypeData,
    ) -> OAuth2Result<GrantTypeData> {
        if data.client.is_public() {
            return Err(OAuth2Error::unauthorized_client(
                "The client is not a confidential client.",
            ));
        }
        data.resource_owner_id = ResourceOwnerId::Client(data.client.id.clone());
        data.issue_refresh_token = false;
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::model::Client;

    #[tokio::test]
    async fn test_confidential_client_owns_its_tokens() {
        let data = ClientCredentialsGrantType
            .prepare_token_response(
                &EndpointRequest::post(&[]),
                GrantTypeData::new(Client::new("svc", "client_secret_basic")),
            )
            .await
            .unwrap();

        assert_eq!(data.resource_owner_id, ResourceOwnerId::Client("svc".into()));
        assert!(data.available_scopes.is_none());
    }

    #[tokio::test]
    async fn test_public_client_rejected() {
        let err = ClientCredentialsGrantType
            .prepare_token_response(
                &EndpointRequest::post(&[]),
                GrantTypeData::new(Client::new("spa", "none")),
            )
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::UnauthorizedClient);
    }
}
