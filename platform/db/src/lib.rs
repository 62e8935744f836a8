//! Database primitives: connection settings, account helpers and the
//! Postgres-backed [`PgSessionStore`].

mod accounts;
mod store;

use sea_orm::{Database, DatabaseConnection, DbErr};
use serde::Deserialize;
use thiserror::Error;

pub use accounts::{open_session, set_profile, upsert_user};
pub use store::{PgSessionStore, record_from_row};

/// Shared Postgres pool alias.
pub type DbPool = DatabaseConnection;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database url missing (env {0})")]
    MissingUrl(String),
    #[error(transparent)]
    Query(#[from] DbErr),
    #[error("user {0} not found")]
    UserNotFound(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Environment-driven connection settings.
#[derive(Clone, Debug, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_url_key")]
    env_key: String,
}

fn default_url_key() -> String {
    "DATABASE_URL".to_string()
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            env_key: default_url_key(),
        }
    }
}

impl DatabaseSettings {
    pub fn new(env_key: impl Into<String>) -> Self {
        Self {
            env_key: env_key.into(),
        }
    }

    pub fn from_env() -> Self {
        Self::default()
    }

    pub fn database_url(&self) -> DbResult<String> {
        std::env::var(&self.env_key).map_err(|_| DbError::MissingUrl(self.env_key.clone()))
    }
}

pub async fn connect(settings: &DatabaseSettings) -> DbResult<DbPool> {
    let url = settings.database_url()?;
    Ok(Database::connect(url).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_url_names_the_env_key() {
        let settings = DatabaseSettings::new("GRADEGATE_TEST_UNSET_DATABASE_URL");
        let err = settings.database_url().unwrap_err();
        assert!(err.to_string().contains("GRADEGATE_TEST_UNSET_DATABASE_URL"));
    }
}
