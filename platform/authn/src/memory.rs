use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    AuthnResult, Identity, IdentityResolver, ProfileFetcher, ProfileRecord, SessionDirectory,
    SessionToken,
};

/// Process-local session directory.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    sessions: RwLock<HashMap<SessionToken, Uuid>>,
    profiles: RwLock<HashMap<Uuid, ProfileRecord>>,
}

impl MemoryDirectory {
    /// Open a fresh session for `user` and return its token.
    pub async fn sign_in(&self, user: Uuid) -> SessionToken {
        let token = SessionToken::from(Uuid::new_v4());
        self.sessions.write().await.insert(token.clone(), user);
        token
    }

    pub async fn set_profile(&self, user: Uuid, record: ProfileRecord) {
        self.profiles.write().await.insert(user, record);
    }

    pub async fn clear_profile(&self, user: Uuid) {
        self.profiles.write().await.remove(&user);
    }
}

#[async_trait]
impl IdentityResolver for MemoryDirectory {
    async fn get_identity_session(&self, token: &SessionToken) -> AuthnResult<Option<Identity>> {
        Ok(self
            .sessions
            .read()
            .await
            .get(token)
            .copied()
            .map(Identity::authenticated))
    }
}

#[async_trait]
impl ProfileFetcher for MemoryDirectory {
    async fn get_user_profile(&self, identity: &Identity) -> AuthnResult<Option<ProfileRecord>> {
        Ok(self.profiles.read().await.get(&identity.id).copied())
    }
}

#[async_trait]
impl SessionDirectory for MemoryDirectory {
    async fn revoke(&self, token: &SessionToken) -> AuthnResult<bool> {
        Ok(self.sessions.write().await.remove(token).is_some())
    }

    async fn ping(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn revoked_sessions_stop_resolving() {
        let directory = MemoryDirectory::default();
        let user = Uuid::new_v4();
        let token = directory.sign_in(user).await;
        assert_eq!(
            directory.get_identity_session(&token).await.unwrap(),
            Some(Identity::authenticated(user))
        );
        assert!(directory.revoke(&token).await.unwrap());
        assert!(!directory.revoke(&token).await.unwrap());
        assert_eq!(directory.get_identity_session(&token).await.unwrap(), None);
    }

    #[tokio::test]
    async fn profiles_can_be_cleared() {
        let directory = MemoryDirectory::default();
        let user = Uuid::new_v4();
        directory.set_profile(user, ProfileRecord::teacher()).await;
        let identity = Identity::authenticated(user);
        assert_eq!(
            directory.get_user_profile(&identity).await.unwrap(),
            Some(ProfileRecord::teacher())
        );
        directory.clear_profile(user).await;
        assert_eq!(directory.get_user_profile(&identity).await.unwrap(), None);
    }
}
