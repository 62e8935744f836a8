use async_trait::async_trait;
use chrono::Utc;
use entity::{profiles, sessions};
use platform_authn::{
    AuthnError, AuthnResult, Identity, IdentityResolver, ProfileFetcher, ProfileRecord,
    SessionDirectory, SessionToken,
};
use platform_authz::{Grade, Role};
use sea_orm::{
    ConnectionTrait, DatabaseBackend, DbErr, DeleteResult, EntityTrait, Statement,
    prelude::DateTimeWithTimeZone,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::DbPool;

/// Sessions and profiles stored in Postgres.
#[derive(Clone, Debug)]
pub struct PgSessionStore {
    pool: DbPool,
}

impl PgSessionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn unavailable(err: DbErr) -> AuthnError {
    AuthnError::Unavailable(err.to_string())
}

/// Expired rows are removed best effort; the lookup still reports no session.
fn purged(result: Result<DeleteResult, DbErr>) -> bool {
    match result {
        Ok(result) => result.rows_affected > 0,
        Err(err) => {
            warn!(error = %err, "failed to purge expired session");
            false
        }
    }
}

fn session_id(token: &SessionToken) -> Option<Uuid> {
    Uuid::parse_str(token.as_str()).ok()
}

#[async_trait]
impl IdentityResolver for PgSessionStore {
    async fn get_identity_session(&self, token: &SessionToken) -> AuthnResult<Option<Identity>> {
        let Some(id) = session_id(token) else {
            debug!("session token is not a session id");
            return Ok(None);
        };
        let Some(session) = sessions::Entity::find_by_id(id)
            .one(&self.pool)
            .await
            .map_err(unavailable)?
        else {
            return Ok(None);
        };
        let now: DateTimeWithTimeZone = Utc::now().into();
        if session.is_expired_at(now) {
            debug!(user_id = %session.user_id, "session expired");
            purged(sessions::Entity::delete_by_id(id).exec(&self.pool).await);
            return Ok(None);
        }
        Ok(Some(Identity::authenticated(session.user_id)))
    }
}

#[async_trait]
impl ProfileFetcher for PgSessionStore {
    async fn get_user_profile(&self, identity: &Identity) -> AuthnResult<Option<ProfileRecord>> {
        let row = profiles::Entity::find_by_id(identity.id)
            .one(&self.pool)
            .await
            .map_err(|err| AuthnError::Profile(err.to_string()))?;
        Ok(row.and_then(|row| record_from_row(&row)))
    }
}

#[async_trait]
impl SessionDirectory for PgSessionStore {
    async fn revoke(&self, token: &SessionToken) -> AuthnResult<bool> {
        let Some(id) = session_id(token) else {
            return Ok(false);
        };
        let result = sessions::Entity::delete_by_id(id)
            .exec(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(result.rows_affected > 0)
    }

    async fn ping(&self) -> bool {
        self.pool
            .execute(Statement::from_string(
                DatabaseBackend::Postgres,
                "SELECT 1".to_string(),
            ))
            .await
            .is_ok()
    }
}

/// Map a stored profile onto the gate's profile types.
///
/// Rows that break the role/grade pairing read as "no profile".
pub fn record_from_row(row: &profiles::Model) -> Option<ProfileRecord> {
    let Some(role) = Role::parse(&row.role) else {
        warn!(user_id = %row.user_id, role = %row.role, "unknown profile role");
        return None;
    };
    match role {
        Role::Teacher => Some(ProfileRecord::teacher()),
        Role::Student => match row.grade.map(|grade| Grade::new(i64::from(grade))) {
            Some(Ok(grade)) => Some(ProfileRecord::student(grade)),
            Some(Err(err)) => {
                warn!(user_id = %row.user_id, error = %err, "student profile has invalid grade");
                None
            }
            None => {
                warn!(user_id = %row.user_id, "student profile has no grade");
                None
            }
        },
    }
}
