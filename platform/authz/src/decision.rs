//! Access decisions for grade-scoped resources.
//!
//! Everything here is pure: the same inputs always produce the same
//! [`AccessDecision`], with no session or network state involved.

use serde::{Deserialize, Serialize};

use crate::grade::Grade;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "student" => Some(Role::Student),
            "teacher" => Some(Role::Teacher),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub grade: Grade,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeacherProfile {}

/// Role specific record fetched after the identity is known.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Profile {
    Student(StudentProfile),
    Teacher(TeacherProfile),
    #[default]
    None,
}

impl Profile {
    pub fn student(grade: Grade) -> Self {
        Profile::Student(StudentProfile { grade })
    }

    pub fn teacher() -> Self {
        Profile::Teacher(TeacherProfile {})
    }

    pub fn grade(&self) -> Option<Grade> {
        match self {
            Profile::Student(student) => Some(student.grade),
            Profile::Teacher(_) | Profile::None => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Profile::None)
    }
}

/// Role as seen by the gate while authentication may still be in flight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoleState {
    Loading,
    Resolved(Option<Role>),
}

impl From<Option<Role>> for RoleState {
    fn from(value: Option<Role>) -> Self {
        RoleState::Resolved(value)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DenialReason {
    GradeMismatch,
    Unauthenticated,
}

impl DenialReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DenialReason::GradeMismatch => "grade-mismatch",
            DenialReason::Unauthenticated => "unauthenticated",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Denial {
    pub reason: DenialReason,
    pub viewer_grade: Option<Grade>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AccessDecision {
    Pending,
    Granted,
    Denied(Denial),
}

impl AccessDecision {
    pub fn is_granted(&self) -> bool {
        matches!(self, AccessDecision::Granted)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, AccessDecision::Pending)
    }

    fn denied(reason: DenialReason, viewer_grade: Option<Grade>) -> Self {
        AccessDecision::Denied(Denial {
            reason,
            viewer_grade,
        })
    }
}

/// A single page load asking for a grade-scoped resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccessRequest {
    pub required_grade: Grade,
    pub role: RoleState,
    pub profile: Profile,
}

impl AccessRequest {
    pub fn decide(&self) -> AccessDecision {
        decide(self.role, &self.profile, self.required_grade)
    }
}

/// Teachers see every grade; students only their own.
pub fn decide(role: RoleState, profile: &Profile, required_grade: Grade) -> AccessDecision {
    let role = match role {
        RoleState::Loading => return AccessDecision::Pending,
        RoleState::Resolved(role) => role,
    };
    match (role, profile) {
        (Some(Role::Teacher), _) => AccessDecision::Granted,
        (Some(Role::Student), Profile::Student(student)) if student.grade == required_grade => {
            AccessDecision::Granted
        }
        (Some(Role::Student), Profile::Student(student)) => {
            AccessDecision::denied(DenialReason::GradeMismatch, Some(student.grade))
        }
        (Some(Role::Student), Profile::Teacher(_) | Profile::None) | (None, _) => {
            AccessDecision::denied(DenialReason::Unauthenticated, None)
        }
    }
}
