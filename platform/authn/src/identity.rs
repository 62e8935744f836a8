use std::fmt;

use platform_authz::{Profile, Role};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque session token as presented by the caller.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<Uuid> for SessionToken {
    fn from(value: Uuid) -> Self {
        Self(value.to_string())
    }
}

// Tokens never show up in logs.
impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(..)")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub authenticated: bool,
}

impl Identity {
    pub fn authenticated(id: Uuid) -> Self {
        Self {
            id,
            authenticated: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub profile: Profile,
    pub role: Role,
}

impl ProfileRecord {
    pub fn student(grade: platform_authz::Grade) -> Self {
        Self {
            profile: Profile::student(grade),
            role: Role::Student,
        }
    }

    pub fn teacher() -> Self {
        Self {
            profile: Profile::teacher(),
            role: Role::Teacher,
        }
    }
}
