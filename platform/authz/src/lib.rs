//! Authorization primitives for grade-scoped content and role-protected pages.

pub mod decision;
pub mod grade;
pub mod redirect;

pub use decision::{
    AccessDecision, AccessRequest, Denial, DenialReason, Profile, Role, RoleState, StudentProfile,
    TeacherProfile, decide,
};
pub use grade::{GRADE_PATH_PREFIX, Grade, GradeError};
pub use redirect::{
    AuthOutcome, LoginRoutes, MissingProfilePolicy, RedirectPolicy, SessionOutcome,
};
