//! Client authentication at the token, revocation and introspection endpoints
//! (RFC 6749 §2.3, OpenID Connect Core §9)

use std::fmt::Debug;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, warn};

use crate::endpoint::EndpointRequest;
use crate::error::{AuthenticateChallenge, OAuth2Error, OAuth2Result};
use crate::model::{Client, ClientId};
use crate::repository::ClientRepository;
use crate::validation::constant_time_eq;

/// Credentials extracted from a request
#[derive(Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    /// Claimed client id
    pub client_id: ClientId,
    /// Presented secret, if the method carries one
    pub secret: Option<String>,
}

impl Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// A `token_endpoint_auth_method`
pub trait TokenEndpointAuthMethod: Send + Sync + Debug {
    /// Method name as registered on clients
    fn name(&self) -> &str;

    /// Challenge advertised on authentication failure, if any
    fn challenge(&self, realm: &str) -> Option<AuthenticateChallenge>;

    /// Extract the credentials this method understands
    ///
    /// `None` means the request does not use this method.
    ///
    /// # Errors
    ///
    /// Returns `invalid_request` for credentials that are present but malformed.
    fn find_credentials(&self, request: &EndpointRequest) -> OAuth2Result<Option<ClientCredentials>>;

    /// Whether the credentials authenticate `client`
    fn is_client_authenticated(&self, client: &Client, credentials: &ClientCredentials) -> bool;
}

/// `none`: public clients identified by the `client_id` parameter
#[derive(Debug, Clone, Copy, Default)]
pub struct NoneAuthMethod;

impl TokenEndpointAuthMethod for NoneAuthMethod {
    fn name(&self) -> &str {
        "none"
    }

    fn challenge(&self, _realm: &str) -> Option<AuthenticateChallenge> {
        None
    }

    fn find_credentials(&self, request: &EndpointRequest) -> OAuth2Result<Option<ClientCredentials>> {
        if request.param("client_secret").is_some() || request.authorization_header().is_some() {
            return Ok(None);
        }
        Ok(request.non_empty_param("client_id").map(|id| ClientCredentials {
            client_id: ClientId::new(id),
            secret: None,
        }))
    }

    fn is_client_authenticated(&self, client: &Client, _credentials: &ClientCredentials) -> bool {
        client.is_public()
    }
}

/// `client_secret_basic`: HTTP Basic with form-encoded id and secret
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientSecretBasic;

impl TokenEndpointAuthMethod for ClientSecretBasic {
    fn name(&self) -> &str {
        "client_secret_basic"
    }

    fn challenge(&self, realm: &str) -> Option<AuthenticateChallenge> {
        Some(AuthenticateChallenge::new("Basic", Some(realm.to_string())))
    }

    fn find_credentials(&self, request: &EndpointRequest) -> OAuth2Result<Option<ClientCredentials>> {
        let Some(header) = request.authorization_header() else {
            return Ok(None);
        };
        let Some((scheme, encoded)) = header.split_once(' ') else {
            return Ok(None);
        };
        if !scheme.eq_ignore_ascii_case("basic") {
            return Ok(None);
        }

        let malformed = || OAuth2Error::invalid_request("Malformed Basic authorization header.");
        let decoded = STANDARD.decode(encoded.trim()).map_err(|_| malformed())?;
        let decoded = String::from_utf8(decoded).map_err(|_| malformed())?;
        let (id, secret) = decoded.split_once(':').ok_or_else(malformed)?;

        // RFC 6749 §2.3.1: both parts are form-urlencoded before encoding
        let form_decode = |value: &str| {
            urlencoding::decode(&value.replace('+', " "))
                .map(std::borrow::Cow::into_owned)
                .map_err(|_| malformed())
        };
        let id = form_decode(id)?;
        let secret = form_decode(secret)?;
        if id.is_empty() {
            return Err(malformed());
        }

        Ok(Some(ClientCredentials {
            client_id: ClientId::new(id),
            secret: Some(secret),
        }))
    }

    fn is_client_authenticated(&self, client: &Client, credentials: &ClientCredentials) -> bool {
        secrets_match(client, credentials)
    }
}

/// `client_secret_post`: `client_id` and `client_secret` body parameters
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientSecretPost;

impl TokenEndpointAuthMethod for ClientSecretPost {
    fn name(&self) -> &str {
        "client_secret_post"
    }

    fn challenge(&self, _realm: &str) -> Option<AuthenticateChallenge> {
        None
    }

    fn find_credentials(&self, request: &EndpointRequest) -> OAuth2Result<Option<ClientCredentials>> {
        match (
            request.body.get("client_id").filter(|v| !v.is_empty()),
            request.body.get("client_secret"),
        ) {
            (Some(id), Some(secret)) => Ok(Some(ClientCredentials {
                client_id: ClientId::new(id.as_str()),
                secret: Some(secret.clone()),
            })),
            _ => Ok(None),
        }
    }

    fn is_client_authenticated(&self, client: &Client, credentials: &ClientCredentials) -> bool {
        secrets_match(client, credentials)
    }
}

fn secrets_match(client: &Client, credentials: &ClientCredentials) -> bool {
    match (client.secret(), credentials.secret.as_deref()) {
        (Some(expected), Some(presented)) => constant_time_eq(expected, presented),
        _ => false,
    }
}

/// Authenticates clients with the registered methods
pub struct ClientAuthenticator {
    methods: Vec<Arc<dyn TokenEndpointAuthMethod>>,
    clients: Arc<dyn ClientRepository>,
    realm: String,
}

impl Debug for ClientAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientAuthenticator")
            .field("methods", &self.method_names())
            .field("realm", &self.realm)
            .finish_non_exhaustive()
    }
}

impl ClientAuthenticator {
    /// Authenticator with `none`, `client_secret_basic` and `client_secret_post`
    pub fn new(clients: Arc<dyn ClientRepository>, realm: impl Into<String>) -> Self {
        Self {
            methods: vec![
                Arc::new(NoneAuthMethod),
                Arc::new(ClientSecretBasic),
                Arc::new(ClientSecretPost),
            ],
            clients,
            realm: realm.into(),
        }
    }

    /// Register another method
    pub fn add_method(&mut self, method: Arc<dyn TokenEndpointAuthMethod>) {
        self.methods.retain(|m| m.name() != method.name());
        self.methods.push(method);
    }

    /// Registered method names
    pub fn method_names(&self) -> Vec<&str> {
        self.methods.iter().map(|m| m.name()).collect()
    }

    /// Challenges advertised on 401 responses
    pub fn challenges(&self) -> Vec<AuthenticateChallenge> {
        self.methods
            .iter()
            .filter_map(|m| m.challenge(&self.realm))
            .collect()
    }

    fn failure(&self, description: &str) -> OAuth2Error {
        OAuth2Error::invalid_client(description).with_challenges(self.challenges())
    }

    /// Identify and authenticate the client of a request
    ///
    /// # Errors
    ///
    /// - `invalid_request` when several methods are used at once
    /// - 401 `invalid_client` when no method applies, the client is unknown,
    ///   registered for another method, or the credentials are wrong
    pub async fn authenticate(&self, request: &EndpointRequest) -> OAuth2Result<Client> {
        let mut found = Vec::new();
        for method in &self.methods {
            if let Some(credentials) = method.find_credentials(request)? {
                found.push((method, credentials));
            }
        }

        if found.len() > 1 {
            return Err(OAuth2Error::invalid_request(
                "Only one authentication method may be used to authenticate the client.",
            ));
        }
        let Some((method, credentials)) = found.pop() else {
            return Err(self.failure("Client authentication failed."));
        };

        let Some(client) = self.clients.find(&credentials.client_id).await? else {
            debug!(client_id = %credentials.client_id, "Unknown client");
            return Err(self.failure("Client authentication failed."));
        };

        if client.token_endpoint_auth_method != method.name() {
            warn!(
                client_id = %client.id,
                registered = %client.token_endpoint_auth_method,
                used = method.name(),
                "Client used an authentication method it is not registered for"
            );
            return Err(self.failure("Client authentication failed."));
        }

        if !method.is_client_authenticated(&client, &credentials) {
            warn!(client_id = %client.id, method = method.name(), "Client authentication failed");
            return Err(self.failure("Client authentication failed."));
        }

        Ok(client)
    }
}
