//! Authentication and authorization engine for the bastion administrative API.
//!
//! # Purpose
//! Gates every privileged administrative operation: RSA-signed bearer tokens,
//! CSRF binding, per-request security contexts, a capability model with
//! wildcard domain scopes, and password login.
//!
//! # How it fits
//! The HTTP layer extracts the bearer cookie, method and CSRF header into a
//! [`RequestCredentials`] and asks the [`AuthEngine`] for a [`SecurityContext`].
//! Handlers then call [`AuthEngine::check_permissions`] with the capabilities
//! they need. Users, roles and the directory service stay outside this crate
//! and are reached through the traits in [`store`].
//!
//! # Key invariants
//! - Tokens are RS256 only and always carry `exp`.
//! - State-changing requests must echo `base64(sha3_256(token))` in the CSRF
//!   header.
//! - Principal id 0 is the superuser and passes every permission check.
//! - A failed context never carries an identity.
//!
//! # Important configuration
//! - Key paths and size, token validity and leeway, cookie and header names.
//! - `require_auth = false` replaces authentication with a fixed default
//!   principal. Only for trusted deployments.
//!
//! # Examples
//! ```rust
//! use bastion_auth::{Capability, DomainScope};
//!
//! let cap: Capability = "DomainAdminRO:*".parse().unwrap();
//! assert!(cap.permits(Capability::DomainAdminReadOnly(DomainScope::Id(3))));
//! assert!(!cap.permits(Capability::DomainAdmin(DomainScope::Id(3))));
//! ```
//!
//! # Common pitfalls
//! - Tokens do not survive a restart when the generated key cannot be written.
//! - Granting `DomainAdminRO` never allows writes, even with a wildcard domain.

mod authorize;
mod capability;
mod claims;
mod context;
mod engine;
mod errors;
mod keys;
mod login;
mod principal;
mod token;

pub mod config;
pub mod csrf;
pub mod observability;
pub mod password;
pub mod store;

pub use authorize::Authorizer;
pub use capability::{
    Capability, CapabilityParseError, CapabilitySet, DomainAccess, DomainScope, satisfies,
};
pub use claims::Claims;
pub use config::{DefaultContext, SecurityConfig};
pub use context::{AuthLevel, AuthState, ContextBuilder, RequestCredentials, SecurityContext};
pub use engine::AuthEngine;
pub use errors::{AuthError, AuthResult, TokenError};
pub use keys::{KeyError, KeyStore, Keypair, SharedKeys, load_or_generate};
pub use login::{CredentialVerifier, DIRECTORY_UNAVAILABLE};
pub use principal::{AuthProvider, Principal, PrincipalId};
pub use store::{DirectoryAuthenticator, DirectoryError, PrincipalStore, StoreError, StoreResult};
pub use token::TokenCodec;
