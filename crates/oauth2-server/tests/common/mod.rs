//! Shared fixtures for the integration tests
//!
//! An authorization server over the in-memory store, with three clients:
//! - `web`: confidential (`client_secret_basic`), code + implicit + refresh
//! - `spa`: public (`none`), code with PKCE
//! - `svc`: confidential (`client_secret_post`), `client_credentials`

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use http::Response;
use http::header::LOCATION;
use jsonwebtoken::Algorithm;
use oauth2_server::config::ServerConfig;
use oauth2_server::endpoint::EndpointRequest;
use oauth2_server::event::RecordingEventPublisher;
use oauth2_server::memory::InMemoryStore;
use oauth2_server::model::{Client, UserAccount};
use oauth2_server::server::AuthorizationServer;
use oauth2_server::signer::JwtSigner;
use serde_json::Value;
use url::Url;

pub const ISSUER: &str = "https://auth.example.com";
pub const WEB_SECRET: &str = "web-secret";
pub const SVC_SECRET: &str = "svc-secret";
pub const WEB_REDIRECT: &str = "https://web.example/cb";
pub const SPA_REDIRECT: &str = "https://spa.example/cb";

/// RFC 7636 appendix B
pub const VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
pub const CHALLENGE: &str = "E9cRFBhQL_E1e1JxgnvDY-WwjojIqW56SwKSDyz2VsQ";

pub struct TestServer {
    pub store: InMemoryStore,
    pub events: RecordingEventPublisher,
    pub signer: Arc<JwtSigner>,
    pub server: AuthorizationServer,
}

impl TestServer {
    pub fn new() -> Self {
        Self::with_config(ServerConfig::new(ISSUER))
    }

    pub fn with_config(config: ServerConfig) -> Self {
        let store = InMemoryStore::new();
        store.clients.insert(web_client());
        store.clients.insert(spa_client());
        store.clients.insert(svc_client());
        store.user_accounts.insert(alice());

        let events = RecordingEventPublisher::new();
        let signer = Arc::new(
            JwtSigner::hmac(Algorithm::HS256, b"an-hmac-secret-of-at-least-32-bytes!")
                .expect("valid HMAC key"),
        );
        let server = AuthorizationServer::builder(config, store.repositories())
            .with_signer(signer.clone())
            .with_event_publisher(Arc::new(events.clone()))
            .build()
            .expect("valid configuration");

        Self {
            store,
            events,
            signer,
            server,
        }
    }

    /// Run the authorization endpoint for alice, consent given
    pub async fn authorize(&self, query: &[(&str, &str)]) -> Response<String> {
        self.server
            .authorization_endpoint()
            .handle(&EndpointRequest::get(query), alice(), true)
            .await
    }

    /// Obtain a code for `web` with the given scope
    pub async fn web_code(&self, scope: &str) -> String {
        let response = self
            .authorize(&[
                ("client_id", "web"),
                ("response_type", "code"),
                ("redirect_uri", WEB_REDIRECT),
                ("scope", scope),
                ("state", "xyz"),
                ("nonce", "n-0S6_WzA2Mj"),
            ])
            .await;
        query_params(&response)
            .remove("code")
            .expect("authorization response carries a code")
    }

    /// Token endpoint call authenticated as `web`
    pub async fn web_token(&self, params: &[(&str, &str)]) -> Response<String> {
        let request =
            EndpointRequest::post(params).with_authorization(&basic("web", WEB_SECRET));
        self.server.token_endpoint().handle(&request).await
    }
}

pub fn alice() -> UserAccount {
    UserAccount::new("alice")
        .with_attribute("name", "Alice Liddell")
        .with_attribute("email", "alice@example.com")
        .with_attribute("email_verified", true)
}

pub fn web_client() -> Client {
    Client::new("web", "client_secret_basic")
        .with_secret(WEB_SECRET)
        .with_redirect_uris(&[WEB_REDIRECT, "https://web.example/other"])
        .with_grant_types(&["authorization_code", "refresh_token", "implicit"])
        .with_response_types(&[
            "code",
            "token",
            "none",
            "id_token",
            "code id_token",
            "id_token token",
            "code id_token token",
        ])
}

pub fn spa_client() -> Client {
    Client::new("spa", "none")
        .with_redirect_uris(&[SPA_REDIRECT])
        .with_grant_types(&["authorization_code"])
        .with_response_types(&["code"])
}

pub fn svc_client() -> Client {
    Client::new("svc", "client_secret_post")
        .with_secret(SVC_SECRET)
        .with_grant_types(&["client_credentials"])
        .with_scope("read write")
}

pub fn basic(id: &str, secret: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{id}:{secret}")))
}

pub fn location(response: &Response<String>) -> Url {
    let location = response
        .headers()
        .get(LOCATION)
        .expect("redirect response")
        .to_str()
        .expect("ASCII location");
    Url::parse(location).expect("absolute location")
}

pub fn query_params(response: &Response<String>) -> BTreeMap<String, String> {
    location(response).query_pairs().into_owned().collect()
}

pub fn fragment_params(response: &Response<String>) -> BTreeMap<String, String> {
    let url = location(response);
    url::form_urlencoded::parse(url.fragment().unwrap_or_default().as_bytes())
        .into_owned()
        .collect()
}

pub fn json(response: &Response<String>) -> Value {
    serde_json::from_str(response.body()).expect("JSON body")
}
