//! # oauth2-server
//!
//! Core of an OAuth 2.0 / OpenID Connect authorization server: the protocol
//! logic behind the authorization, token, revocation and introspection
//! endpoints, without transport, storage engine, key management or consent UI.
//!
//! ## Architecture
//!
//! - [`model`] - Clients, user accounts and the token entities
//! - [`repository`] - Async storage contracts; [`memory`] ships DashMap ones
//! - [`issuer`] - The single place tokens are created and persisted
//! - [`scope`] - Scope parsing, availability checks and no-scope policies
//! - [`pkce`] - Code challenge methods (RFC 7636)
//! - [`response_type`] - `code`, `token`, `none` handlers and their combinations
//! - [`grant_type`] - `authorization_code`, `refresh_token`, `client_credentials`
//! - [`token_hint`] - Token type hints for revocation and introspection
//! - [`client_auth`] - Token endpoint client authentication
//! - [`endpoint`] - Protocol endpoints answering `http::Response<String>`
//! - [`openid`] - ID Tokens, the `id_token` response type and the token
//!   endpoint extension (feature `openid`)
//! - [`server`] - Assembles everything from a [`ServerConfig`]
//!
//! ## Feature Flags
//!
//! - `memory` (default) - In-memory repositories
//! - `openid` (default) - OpenID Connect support
//!
//! ## Standards
//!
//! - **RFC 6749** - OAuth 2.0 Authorization Framework
//! - **RFC 6750** - Bearer Token Usage
//! - **RFC 7009** - Token Revocation
//! - **RFC 7636** - Proof Key for Code Exchange (PKCE)
//! - **RFC 7662** - Token Introspection
//! - **OAuth 2.0 Multiple Response Type Encoding Practices** and **Form Post Response Mode**
//! - **OpenID Connect Core 1.0**

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod audit;
pub mod client_auth;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod event;
pub mod grant_type;
pub mod issuer;
#[cfg(feature = "memory")]
pub mod memory;
pub mod model;
#[cfg(feature = "openid")]
pub mod openid;
pub mod pkce;
pub mod repository;
pub mod response_mode;
pub mod response_type;
pub mod scope;
pub mod server;
pub mod signer;
pub mod token_hint;
pub mod token_id;
pub mod token_type;
pub mod validation;
pub mod www_authenticate;

#[doc(inline)]
pub use config::ServerConfig;

#[doc(inline)]
pub use error::{ErrorCode, ErrorKind, OAuth2Error, OAuth2Result};

#[doc(inline)]
pub use endpoint::{
    AuthorizationEndpoint, EndpointRequest, TokenEndpoint, TokenIntrospectionEndpoint,
    TokenRevocationEndpoint,
};

#[doc(inline)]
pub use server::{AuthorizationServer, AuthorizationServerBuilder};

#[cfg(feature = "memory")]
#[doc(inline)]
pub use memory::InMemoryStore;
