use std::sync::Arc;

use platform_authz::{Profile, Role, RoleState, SessionOutcome};
use tracing::{debug, warn};

use crate::{
    Identity, IdentityResolver, ProfileFetcher, ProfileRecord, SessionDirectory, SessionReadiness,
    SessionToken,
};

/// Everything learned about the caller for one request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Resolution {
    pub identity: Option<Identity>,
    pub record: Option<ProfileRecord>,
    /// Set when either lookup failed; the result is then anonymous.
    pub faulted: bool,
}

impl Resolution {
    pub fn failed() -> Self {
        Self {
            faulted: true,
            ..Self::default()
        }
    }

    pub fn role(&self) -> Option<Role> {
        self.record.map(|record| record.role)
    }

    pub fn profile(&self) -> Profile {
        self.record.map(|record| record.profile).unwrap_or_default()
    }

    pub fn role_state(&self) -> RoleState {
        RoleState::Resolved(self.role())
    }

    pub fn outcome(&self) -> SessionOutcome {
        if self.faulted {
            return SessionOutcome::Failed;
        }
        match (self.identity, self.record) {
            (None, _) => SessionOutcome::Anonymous,
            (Some(_), None) => SessionOutcome::MissingProfile,
            (Some(_), Some(record)) => SessionOutcome::Ready {
                role: Some(record.role),
                profile: record.profile,
            },
        }
    }
}

/// Explicit handle on the session services, passed into every guard.
#[derive(Clone)]
pub struct SessionContext {
    resolver: Arc<dyn IdentityResolver>,
    fetcher: Arc<dyn ProfileFetcher>,
    readiness: SessionReadiness,
}

impl SessionContext {
    pub fn new(resolver: Arc<dyn IdentityResolver>, fetcher: Arc<dyn ProfileFetcher>) -> Self {
        Self {
            resolver,
            fetcher,
            readiness: SessionReadiness::default(),
        }
    }

    pub fn from_directory<D>(directory: Arc<D>) -> Self
    where
        D: SessionDirectory + 'static,
    {
        Self::new(directory.clone(), directory)
    }

    pub fn with_readiness(mut self, readiness: SessionReadiness) -> Self {
        self.readiness = readiness;
        self
    }

    pub fn readiness(&self) -> &SessionReadiness {
        &self.readiness
    }

    /// Resolve identity then profile. Errors never escape; they yield an
    /// anonymous, faulted resolution.
    pub async fn resolve(&self, token: Option<&SessionToken>) -> Resolution {
        let Some(token) = token else {
            debug!("no session token presented");
            return Resolution::default();
        };

        let identity = match self.resolver.get_identity_session(token).await {
            Ok(Some(identity)) if identity.authenticated => identity,
            Ok(_) => return Resolution::default(),
            Err(err) => {
                warn!(error = %err, "identity resolution failed; treating caller as anonymous");
                return Resolution::failed();
            }
        };

        match self.fetcher.get_user_profile(&identity).await {
            Ok(record) => Resolution {
                identity: Some(identity),
                record,
                faulted: false,
            },
            Err(err) => {
                warn!(user_id = %identity.id, error = %err, "profile fetch failed; treating caller as anonymous");
                Resolution::failed()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AuthnError, AuthnResult, MemoryDirectory};
    use async_trait::async_trait;
    use platform_authz::Grade;
    use uuid::Uuid;

    struct BrokenStore;

    #[async_trait]
    impl IdentityResolver for BrokenStore {
        async fn get_identity_session(&self, _: &SessionToken) -> AuthnResult<Option<Identity>> {
            Err(AuthnError::Unavailable("connection refused".into()))
        }
    }

    #[async_trait]
    impl ProfileFetcher for BrokenStore {
        async fn get_user_profile(&self, _: &Identity) -> AuthnResult<Option<ProfileRecord>> {
            Err(AuthnError::Profile("timeout".into()))
        }
    }

    fn token() -> SessionToken {
        SessionToken::from(Uuid::new_v4())
    }

    #[tokio::test]
    async fn missing_token_is_anonymous() {
        let ctx = SessionContext::from_directory(Arc::new(MemoryDirectory::default()));
        let resolution = ctx.resolve(None).await;
        assert_eq!(resolution, Resolution::default());
        assert_eq!(resolution.outcome(), SessionOutcome::Anonymous);
    }

    #[tokio::test]
    async fn identity_failure_is_downgraded() {
        let ctx = SessionContext::new(Arc::new(BrokenStore), Arc::new(BrokenStore));
        let resolution = ctx.resolve(Some(&token())).await;
        assert!(resolution.faulted);
        assert_eq!(resolution.role(), None);
        assert_eq!(resolution.outcome(), SessionOutcome::Failed);
    }

    #[tokio::test]
    async fn profile_failure_is_downgraded() {
        let directory = Arc::new(MemoryDirectory::default());
        let session = directory.sign_in(Uuid::new_v4()).await;
        let ctx = SessionContext::new(directory, Arc::new(BrokenStore));
        let resolution = ctx.resolve(Some(&session)).await;
        assert!(resolution.faulted);
        assert!(resolution.identity.is_none());
    }

    #[tokio::test]
    async fn resolves_student_profile() {
        let directory = Arc::new(MemoryDirectory::default());
        let grade = Grade::new(8).unwrap();
        let user = Uuid::new_v4();
        directory.set_profile(user, ProfileRecord::student(grade)).await;
        let session = directory.sign_in(user).await;

        let ctx = SessionContext::from_directory(directory);
        let resolution = ctx.resolve(Some(&session)).await;
        assert_eq!(resolution.identity, Some(Identity::authenticated(user)));
        assert_eq!(resolution.role(), Some(Role::Student));
        assert_eq!(resolution.profile().grade(), Some(grade));
    }

    #[tokio::test]
    async fn identity_without_profile_is_reported() {
        let directory = Arc::new(MemoryDirectory::default());
        let session = directory.sign_in(Uuid::new_v4()).await;
        let ctx = SessionContext::from_directory(directory);
        let resolution = ctx.resolve(Some(&session)).await;
        assert_eq!(resolution.outcome(), SessionOutcome::MissingProfile);
    }
}
