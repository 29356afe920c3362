//! Authorization server assembly
//!
//! [`AuthorizationServer`] wires every component from a [`ServerConfig`]
//! and a set of [`Repositories`]. Applications that need a different
//! arrangement can build the endpoints themselves from the same parts.
//!
//! ```rust
//! use oauth2_server::config::ServerConfig;
//! use oauth2_server::memory::InMemoryStore;
//! use oauth2_server::server::AuthorizationServer;
//!
//! let store = InMemoryStore::new();
//! let server = AuthorizationServer::builder(
//!     ServerConfig::new("https://auth.example.com"),
//!     store.repositories(),
//! )
//! .build()
//! .unwrap();
//! assert!(server.grant_types().has("authorization_code"));
//! ```

use std::sync::Arc;

use tracing::info;

use crate::audit::AuditLogger;
use crate::client_auth::ClientAuthenticator;
use crate::config::ServerConfig;
use crate::endpoint::{
    AuthorizationEndpoint, TokenEndpoint, TokenIntrospectionEndpoint, TokenRevocationEndpoint,
};
use crate::error::{OAuth2Error, OAuth2Result};
use crate::event::EventPublisher;
use crate::grant_type::{
    AuthorizationCodeGrantType, ClientCredentialsGrantType, GrantTypeManager, RefreshTokenGrantType,
};
use crate::issuer::{TokenIssuer, TokenLifetimes};
use crate::pkce::PkceMethodManager;
use crate::repository::Repositories;
use crate::response_type::{
    CodeResponseType, ImplicitResponseType, NoneResponseType, ResponseTypeManager,
};
use crate::scope::{DefaultScopePolicy, ErrorScopePolicy, ScopeManager};
use crate::signer::TokenSigner;
use crate::token_hint::{
    AccessTokenTypeHint, AuthCodeTypeHint, RefreshTokenTypeHint, TokenTypeHintManager,
};
use crate::token_id::{JwtAccessTokenIdGenerator, RandomTokenIdGenerator};
use crate::token_type::TokenTypeManager;

#[cfg(feature = "openid")]
use crate::openid::{IdTokenFactory, IdTokenResponseType, OpenIdConnectExtension};

/// Builder for [`AuthorizationServer`]
#[derive(Debug)]
pub struct AuthorizationServerBuilder {
    config: ServerConfig,
    repositories: Repositories,
    signer: Option<Arc<dyn TokenSigner>>,
    events: Option<Arc<dyn EventPublisher>>,
    jwt_access_tokens: bool,
}

impl AuthorizationServerBuilder {
    /// Sign ID Tokens (and JWT access tokens) with `signer`
    ///
    /// Without a signer the `id_token` response type and the OpenID Connect
    /// token endpoint extension are not registered.
    #[must_use]
    pub fn with_signer(mut self, signer: Arc<dyn TokenSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Publish domain events to `events` instead of the audit log
    #[must_use]
    pub fn with_event_publisher(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = Some(events);
        self
    }

    /// Issue access tokens as signed JWTs; requires a signer
    #[must_use]
    pub fn with_jwt_access_tokens(mut self, enabled: bool) -> Self {
        self.jwt_access_tokens = enabled;
        self
    }

    /// Validate the configuration and assemble the server
    ///
    /// # Errors
    ///
    /// Returns an internal error for an invalid configuration, an unknown
    /// scope policy, or JWT access tokens without a signer.
    pub fn build(self) -> OAuth2Result<AuthorizationServer> {
        let Self {
            config,
            repositories,
            signer,
            events,
            jwt_access_tokens,
        } = self;
        config.validate()?;

        let events: Arc<dyn EventPublisher> = match events {
            Some(events) => events,
            None => Arc::new(AuditLogger::new(config.issuer.clone())),
        };
        let lifetimes = TokenLifetimes {
            access_token: config.access_token_lifetime,
            refresh_token: config.refresh_token_lifetime,
            auth_code: config.auth_code_lifetime,
        };
        let mut issuer = TokenIssuer::new(
            repositories.access_tokens.clone(),
            repositories.refresh_tokens.clone(),
            repositories.auth_codes.clone(),
            repositories.initial_access_tokens.clone(),
            Arc::new(RandomTokenIdGenerator::new()),
            events.clone(),
            lifetimes,
        );
        if jwt_access_tokens {
            let signer = signer.clone().ok_or_else(|| {
                OAuth2Error::internal("JWT access tokens require a signer.")
            })?;
            issuer = issuer.with_access_token_ids(Arc::new(JwtAccessTokenIdGenerator::new(
                config.issuer.clone(),
                signer,
            )));
        }
        let issuer = Arc::new(issuer);

        let mut scopes = ScopeManager::new(config.available_scopes.clone());
        scopes.add_policy(Arc::new(DefaultScopePolicy::new(config.default_scopes.clone())));
        scopes.add_policy(Arc::new(ErrorScopePolicy));
        scopes.set_default_policy(&config.scope_policy)?;
        let scopes = Arc::new(scopes);

        let token_types =
            Arc::new(TokenTypeManager::new().allow_token_type_parameter(config.allow_token_type_parameter));
        let pkce_methods = Arc::new(PkceMethodManager::with_default_methods());
        let authenticator = Arc::new(ClientAuthenticator::new(
            repositories.clients.clone(),
            config.realm.clone(),
        ));

        #[cfg(feature = "openid")]
        let id_tokens = signer.as_ref().map(|signer| {
            Arc::new(IdTokenFactory::new(
                config.issuer.clone(),
                signer.clone(),
                repositories.id_tokens.clone(),
                events.clone(),
                config.id_token_lifetime,
            ))
        });

        let mut response_types = ResponseTypeManager::new();
        response_types.add(Arc::new(
            CodeResponseType::new(issuer.clone(), pkce_methods.clone())
                .enforce_pkce_for_public_clients(config.enforce_pkce_for_public_clients)
                .refresh_token_without_offline_access(config.refresh_token_without_offline_access),
        ));
        response_types.add(Arc::new(ImplicitResponseType::new(
            issuer.clone(),
            token_types.clone(),
        )));
        response_types.add(Arc::new(NoneResponseType::new(
            issuer.clone(),
            token_types.clone(),
        )));
        #[cfg(feature = "openid")]
        if let Some(factory) = &id_tokens {
            response_types.add(Arc::new(IdTokenResponseType::new(factory.clone())));
        }
        let response_types = Arc::new(response_types);

        let mut grant_types = GrantTypeManager::new();
        grant_types.add(Arc::new(AuthorizationCodeGrantType::new(
            repositories.auth_codes.clone(),
            issuer.clone(),
            pkce_methods,
        )));
        grant_types.add(Arc::new(
            RefreshTokenGrantType::new(repositories.refresh_tokens.clone(), issuer.clone())
                .with_rotation(config.refresh_token_rotation),
        ));
        grant_types.add(Arc::new(ClientCredentialsGrantType));
        let grant_types = Arc::new(grant_types);

        let mut access_token_hint =
            AccessTokenTypeHint::new(repositories.access_tokens.clone(), issuer.clone())
                .revoke_refresh_tokens(config.refresh_tokens_revoked_with_access_tokens);
        if let Some(signer) = &signer {
            access_token_hint = access_token_hint.with_signer(signer.clone());
        }
        let mut hints = TokenTypeHintManager::new();
        hints.add(Arc::new(access_token_hint));
        hints.add(Arc::new(RefreshTokenTypeHint::new(
            repositories.refresh_tokens.clone(),
            issuer.clone(),
        )));
        hints.add(Arc::new(AuthCodeTypeHint::new(
            repositories.auth_codes.clone(),
            issuer.clone(),
        )));
        let hints = Arc::new(hints);

        let authorization_endpoint = AuthorizationEndpoint::new(
            repositories.clients.clone(),
            response_types.clone(),
            scopes.clone(),
        );
        #[cfg_attr(not(feature = "openid"), allow(unused_mut))]
        let mut token_endpoint = TokenEndpoint::new(
            authenticator.clone(),
            grant_types.clone(),
            scopes.clone(),
            token_types.clone(),
            issuer.clone(),
        );
        #[cfg(feature = "openid")]
        if let Some(factory) = &id_tokens {
            token_endpoint = token_endpoint.with_extension(Arc::new(OpenIdConnectExtension::new(
                factory.clone(),
                repositories.user_accounts.clone(),
            )));
        }
        let revocation_endpoint = TokenRevocationEndpoint::new(authenticator.clone(), hints.clone())
            .allow_get_method(config.allow_get_method)
            .allow_jsonp_callback(config.allow_jsonp_callback);
        let introspection_endpoint = TokenIntrospectionEndpoint::new(authenticator.clone(), hints.clone())
            .allow_get_method(config.allow_get_method)
            .allow_jsonp_callback(config.allow_jsonp_callback);

        info!(
            issuer = %config.issuer,
            response_types = ?response_types.supported_response_types(),
            grant_types = ?grant_types.names(),
            "Authorization server ready"
        );

        Ok(AuthorizationServer {
            config,
            issuer,
            scopes,
            token_types,
            response_types,
            grant_types,
            hints,
            authenticator,
            #[cfg(feature = "openid")]
            id_tokens,
            authorization_endpoint,
            token_endpoint,
            revocation_endpoint,
            introspection_endpoint,
        })
    }
}

/// Every component of an authorization server, assembled
#[derive(Debug)]
pub struct AuthorizationServer {
    config: ServerConfig,
    issuer: Arc<TokenIssuer>,
    scopes: Arc<ScopeManager>,
    token_types: Arc<TokenTypeManager>,
    response_types: Arc<ResponseTypeManager>,
    grant_types: Arc<GrantTypeManager>,
    hints: Arc<TokenTypeHintManager>,
    authenticator: Arc<ClientAuthenticator>,
    #[cfg(feature = "openid")]
    id_tokens: Option<Arc<IdTokenFactory>>,
    authorization_endpoint: AuthorizationEndpoint,
    token_endpoint: TokenEndpoint,
    revocation_endpoint: TokenRevocationEndpoint,
    introspection_endpoint: TokenIntrospectionEndpoint,
}

impl AuthorizationServer {
    /// Start assembling a server
    pub fn builder(config: ServerConfig, repositories: Repositories) -> AuthorizationServerBuilder {
        AuthorizationServerBuilder {
            config,
            repositories,
            signer: None,
            events: None,
            jwt_access_tokens: false,
        }
    }

    /// Configuration the server was built from
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Token factory, for grants added by the application
    pub fn issuer(&self) -> &Arc<TokenIssuer> {
        &self.issuer
    }

    /// Scope policies and charset checks
    pub fn scopes(&self) -> &Arc<ScopeManager> {
        &self.scopes
    }

    /// Registered token types
    pub fn token_types(&self) -> &Arc<TokenTypeManager> {
        &self.token_types
    }

    /// Registered response types
    pub fn response_types(&self) -> &Arc<ResponseTypeManager> {
        &self.response_types
    }

    /// Registered grant types
    pub fn grant_types(&self) -> &Arc<GrantTypeManager> {
        &self.grant_types
    }

    /// Token type hints used by revocation and introspection
    pub fn token_type_hints(&self) -> &Arc<TokenTypeHintManager> {
        &self.hints
    }

    /// Token endpoint client authentication
    pub fn client_authenticator(&self) -> &Arc<ClientAuthenticator> {
        &self.authenticator
    }

    /// ID Token factory, present when a signer was supplied
    #[cfg(feature = "openid")]
    pub fn id_token_factory(&self) -> Option<&Arc<IdTokenFactory>> {
        self.id_tokens.as_ref()
    }

    /// The authorization endpoint
    pub fn authorization_endpoint(&self) -> &AuthorizationEndpoint {
        &self.authorization_endpoint
    }

    /// The token endpoint
    pub fn token_endpoint(&self) -> &TokenEndpoint {
        &self.token_endpoint
    }

    /// The revocation endpoint (RFC 7009)
    pub fn revocation_endpoint(&self) -> &TokenRevocationEndpoint {
        &self.revocation_endpoint
    }

    /// The introspection endpoint (RFC 7662)
    pub fn introspection_endpoint(&self) -> &TokenIntrospectionEndpoint {
        &self.introspection_endpoint
    }
}
