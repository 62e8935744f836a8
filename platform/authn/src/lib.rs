//! Platform authentication boundaries.
//!
//! The identity provider and profile storage are external services. This crate
//! defines the two seams the gate talks to ([`IdentityResolver`] and
//! [`ProfileFetcher`]), the [`SessionContext`] that drives them for one request,
//! and an in-memory directory used by dev tooling and tests.

mod context;
mod identity;
mod memory;
mod readiness;

use async_trait::async_trait;
use thiserror::Error;

pub use context::{Resolution, SessionContext};
pub use identity::{Identity, ProfileRecord, SessionToken};
pub use memory::MemoryDirectory;
pub use readiness::SessionReadiness;

#[derive(Debug, Error)]
pub enum AuthnError {
    #[error("session store unavailable: {0}")]
    Unavailable(String),
    #[error("profile store error: {0}")]
    Profile(String),
}

pub type AuthnResult<T> = Result<T, AuthnError>;

/// Turns an opaque session token into an identity.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn get_identity_session(&self, token: &SessionToken) -> AuthnResult<Option<Identity>>;
}

/// Looks up the role-tagged profile for an identity.
#[async_trait]
pub trait ProfileFetcher: Send + Sync {
    async fn get_user_profile(&self, identity: &Identity) -> AuthnResult<Option<ProfileRecord>>;
}

/// Backing store that can both resolve and administer sessions.
#[async_trait]
pub trait SessionDirectory: IdentityResolver + ProfileFetcher {
    /// Remove a session; returns whether one existed.
    async fn revoke(&self, token: &SessionToken) -> AuthnResult<bool>;

    async fn ping(&self) -> bool;
}
