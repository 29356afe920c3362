//! Authorization endpoint response types (RFC 6749 §3.1.1, OAuth 2.0
//! Multiple Response Type Encoding Practices)
//!
//! A request may combine several space-separated response types
//! (`code id_token`). Every handler first runs `check_authorization` before
//! consent; after consent every handler runs `prepare_authorization`, then
//! every handler runs `finalize_authorization`, so that a handler can use
//! what another one produced (the ID Token hashes the code and the access
//! token).

mod code;
mod none;
mod token;

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

pub use code::CodeResponseType;
pub use none::NoneResponseType;
pub use token::ImplicitResponseType;

use crate::error::{OAuth2Error, OAuth2Result};
use crate::model::{Client, UserAccount};
use crate::response_mode::ResponseMode;

/// State of one authorization request, shared by the response type handlers
#[derive(Debug, Clone)]
pub struct Authorization {
    /// Requesting client
    pub client: Client,
    /// Authenticated end-user
    pub user_account: UserAccount,
    /// Authorization request parameters
    pub query_params: BTreeMap<String, String>,
    /// Requested `response_type`, as sent
    pub response_type: String,
    /// Transport for the response parameters
    pub response_mode: ResponseMode,
    /// Validated redirect URI
    pub redirect_uri: String,
    /// Scopes to grant
    pub scopes: Vec<String>,
    /// `state` to echo back
    pub state: Option<String>,
    data: BTreeMap<String, Value>,
    handlers: Vec<Arc<dyn ResponseType>>,
}

impl Authorization {
    /// Create the authorization state
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: Client,
        user_account: UserAccount,
        query_params: BTreeMap<String, String>,
        response_type: String,
        response_mode: ResponseMode,
        redirect_uri: String,
        scopes: Vec<String>,
        handlers: Vec<Arc<dyn ResponseType>>,
    ) -> Self {
        let state = query_params.get("state").cloned();
        Self {
            client,
            user_account,
            query_params,
            response_type,
            response_mode,
            redirect_uri,
            scopes,
            state,
            data: BTreeMap::new(),
            handlers,
        }
    }

    /// One authorization request parameter
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query_params.get(key).map(String::as_str)
    }

    /// Whether `scope` is to be granted
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }

    /// Whether the `prompt` parameter contains `value`
    pub fn has_prompt(&self, value: &str) -> bool {
        self.query_param("prompt")
            .is_some_and(|prompt| prompt.split(' ').any(|p| p == value))
    }

    /// Remove a scope from the grant
    pub fn remove_scope(&mut self, scope: &str) {
        self.scopes.retain(|s| s != scope);
    }

    /// Share a value with the other handlers
    pub fn set_data(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    /// A value shared by another handler
    pub fn data(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// The handlers of the requested response type
    pub fn handlers(&self) -> &[Arc<dyn ResponseType>] {
        &self.handlers
    }
}

/// A response type handler
#[async_trait]
pub trait ResponseType: Send + Sync + Debug {
    /// The `response_type` value
    fn response_type(&self) -> &str;

    /// Grant types a client must also have to use this response type
    fn associated_grant_types(&self) -> Vec<&'static str>;

    /// Default transport of this handler's parameters
    fn response_mode(&self) -> ResponseMode;

    /// Validate the request before consent
    ///
    /// # Errors
    ///
    /// Returns a client error when the request is unacceptable.
    fn check_authorization(&self, _authorization: &Authorization) -> OAuth2Result<()> {
        Ok(())
    }

    /// Issue this handler's artefacts; returns its response parameters
    ///
    /// # Errors
    ///
    /// Returns issuance or storage errors.
    async fn prepare_authorization(
        &self,
        authorization: &mut Authorization,
    ) -> OAuth2Result<BTreeMap<String, String>>;

    /// Complete the response once every handler has prepared
    ///
    /// # Errors
    ///
    /// Returns issuance or storage errors.
    async fn finalize_authorization(
        &self,
        _response_parameters: &mut BTreeMap<String, String>,
        _authorization: &Authorization,
    ) -> OAuth2Result<()> {
        Ok(())
    }
}

/// Registry of response type handlers
#[derive(Debug, Default)]
pub struct ResponseTypeManager {
    types: Vec<Arc<dyn ResponseType>>,
}

impl ResponseTypeManager {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing one with the same name
    pub fn add(&mut self, response_type: Arc<dyn ResponseType>) {
        self.types
            .retain(|t| t.response_type() != response_type.response_type());
        self.types.push(response_type);
    }

    /// Whether a single response type is registered
    pub fn has(&self, name: &str) -> bool {
        self.types.iter().any(|t| t.response_type() == name)
    }

    /// Look up a single response type
    ///
    /// # Errors
    ///
    /// Returns an internal error for unregistered names.
    pub fn get(&self, name: &str) -> OAuth2Result<Arc<dyn ResponseType>> {
        self.types
            .iter()
            .find(|t| t.response_type() == name)
            .cloned()
            .ok_or_else(|| {
                OAuth2Error::internal(format!("The response type \"{name}\" is not registered."))
            })
    }

    /// Registered single response types
    pub fn names(&self) -> Vec<&str> {
        self.types.iter().map(|t| t.response_type()).collect()
    }

    /// Every response type value this server accepts, combinations included
    pub fn supported_response_types(&self) -> Vec<String> {
        let mut supported: Vec<String> = self.names().into_iter().map(String::from).collect();
        for combination in [
            "code id_token",
            "code token",
            "id_token token",
            "code id_token token",
        ] {
            if combination.split(' ').all(|part| self.has(part)) {
                supported.push(combination.to_string());
            }
        }
        supported
    }

    /// Resolve a `response_type` value into its handlers
    ///
    /// Handlers are returned in registration order.
    ///
    /// # Errors
    ///
    /// - `invalid_request` when the value is empty
    /// - `unsupported_response_type` for unknown or duplicated parts, and
    ///   for `none` combined with anything else
    pub fn find(&self, response_type: &str) -> OAuth2Result<Vec<Arc<dyn ResponseType>>> {
        let parts: Vec<&str> = response_type.split(' ').filter(|p| !p.is_empty()).collect();
        if parts.is_empty() {
            return Err(OAuth2Error::invalid_request(
                "The parameter \"response_type\" is mandatory.",
            ));
        }
        if parts.len() > 1 && parts.contains(&"none") {
            return Err(OAuth2Error::unsupported_response_type(
                "The response type \"none\" cannot be combined with other response types.",
            ));
        }
        for (i, part) in parts.iter().enumerate() {
            if parts[..i].contains(part) {
                return Err(OAuth2Error::unsupported_response_type(format!(
                    "The response type \"{part}\" appears more than once."
                )));
            }
            if !self.has(part) {
                return Err(OAuth2Error::unsupported_response_type(format!(
                    "The response type \"{part}\" is not supported by this server."
                )));
            }
        }

        Ok(self
            .types
            .iter()
            .filter(|t| parts.contains(&t.response_type()))
            .cloned()
            .collect())
    }

    /// Default mode for a set of handlers: fragment if any uses it, else query
    pub fn default_response_mode(handlers: &[Arc<dyn ResponseType>]) -> ResponseMode {
        if handlers
            .iter()
            .any(|h| h.response_mode() == ResponseMode::Fragment)
        {
            ResponseMode::Fragment
        } else {
            ResponseMode::Query
        }
    }
}

/// Flatten a JSON map into string response parameters
pub(crate) fn to_response_parameters(
    data: serde_json::Map<String, Value>,
) -> BTreeMap<String, String> {
    data.into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            (key, value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[derive(Debug)]
    struct Stub(&'static str, ResponseMode);

    #[async_trait]
    impl ResponseType for Stub {
        fn response_type(&self) -> &str {
            self.0
        }

        fn associated_grant_types(&self) -> Vec<&'static str> {
            vec![]
        }

        fn response_mode(&self) -> ResponseMode {
            self.1
        }

        async fn prepare_authorization(
            &self,
            authorization: &mut Authorization,
        ) -> OAuth2Result<BTreeMap<String, String>> {
            authorization.set_data(self.0, true);
            Ok(BTreeMap::new())
        }
    }

    fn manager() -> ResponseTypeManager {
        let mut manager = ResponseTypeManager::new();
        manager.add(Arc::new(Stub("code", ResponseMode::Query)));
        manager.add(Arc::new(Stub("id_token", ResponseMode::Fragment)));
        manager.add(Arc::new(Stub("none", ResponseMode::Query)));
        manager
    }

    #[test]
    fn test_find_combination() {
        let handlers = manager().find("id_token code").unwrap();
        let names: Vec<_> = handlers.iter().map(|h| h.response_type()).collect();
        assert_eq!(names, vec!["code", "id_token"]);
        assert_eq!(
            ResponseTypeManager::default_response_mode(&handlers),
            ResponseMode::Fragment
        );
    }

    #[test]
    fn test_find_errors() {
        let manager = manager();
        assert_eq!(manager.find("").unwrap_err().code, ErrorCode::InvalidRequest);
        assert_eq!(
            manager.find("none code").unwrap_err().code,
            ErrorCode::UnsupportedResponseType
        );
        assert_eq!(
            manager.find("token").unwrap_err().code,
            ErrorCode::UnsupportedResponseType
        );
        assert_eq!(
            manager.find("code code").unwrap_err().code,
            ErrorCode::UnsupportedResponseType
        );
    }

    #[test]
    fn test_supported_response_types() {
        assert_eq!(
            manager().supported_response_types(),
            vec!["code", "id_token", "none", "code id_token"]
        );
    }

    #[test]
    fn test_response_parameters_flattening() {
        let data = match serde_json::json!({"access_token": "t", "expires_in": 3600}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        let params = to_response_parameters(data);
        assert_eq!(params["access_token"], "t");
        assert_eq!(params["expires_in"], "3600");
    }
}
