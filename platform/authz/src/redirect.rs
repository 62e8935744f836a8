//! Where role-protected pages send callers that may not see them.

use serde::{Deserialize, Serialize};

use crate::decision::{Profile, Role};

/// Login and landing paths for each role family.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRoutes {
    pub student_login: String,
    pub teacher_login: String,
    pub student_home: String,
    pub teacher_home: String,
}

impl Default for LoginRoutes {
    fn default() -> Self {
        Self {
            student_login: "/student/login".into(),
            teacher_login: "/teacher/login".into(),
            student_home: "/student/dashboard".into(),
            teacher_home: "/teacher/dashboard".into(),
        }
    }
}

impl LoginRoutes {
    pub fn login_for(&self, role: Role) -> &str {
        match role {
            Role::Student => &self.student_login,
            Role::Teacher => &self.teacher_login,
        }
    }

    pub fn home_for(&self, role: Role) -> &str {
        match role {
            Role::Student => &self.student_home,
            Role::Teacher => &self.teacher_home,
        }
    }
}

/// What to do when a valid identity has no profile attached.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingProfilePolicy {
    #[default]
    Redirect,
    Deny,
}

impl MissingProfilePolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "redirect" => Some(MissingProfilePolicy::Redirect),
            "deny" => Some(MissingProfilePolicy::Deny),
            _ => None,
        }
    }
}

/// Result of resolving the caller's session, as far as redirects care.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Resolution raised an error; treated like a failed sign-in.
    Failed,
    Anonymous,
    MissingProfile,
    Ready {
        role: Option<Role>,
        profile: Profile,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthOutcome {
    Render(Role),
    Redirect(String),
    /// Identity without profile, shown in place when the instance is set to deny.
    MissingProfile,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RedirectPolicy {
    redirect_to: String,
    allowed_roles: Vec<Role>,
    missing_profile: MissingProfilePolicy,
    routes: LoginRoutes,
}

impl Default for RedirectPolicy {
    fn default() -> Self {
        let routes = LoginRoutes::default();
        Self {
            redirect_to: routes.student_login.clone(),
            allowed_roles: vec![Role::Student, Role::Teacher],
            missing_profile: MissingProfilePolicy::default(),
            routes,
        }
    }
}

impl RedirectPolicy {
    pub fn new(routes: LoginRoutes) -> Self {
        Self {
            redirect_to: routes.student_login.clone(),
            routes,
            ..Self::default()
        }
    }

    pub fn redirect_to(mut self, path: impl Into<String>) -> Self {
        self.redirect_to = path.into();
        self
    }

    pub fn allow(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.allowed_roles = roles.into_iter().collect();
        self
    }

    pub fn on_missing_profile(mut self, policy: MissingProfilePolicy) -> Self {
        self.missing_profile = policy;
        self
    }

    pub fn routes(&self) -> &LoginRoutes {
        &self.routes
    }

    pub fn allowed_roles(&self) -> &[Role] {
        &self.allowed_roles
    }

    /// Login endpoint for the role family `redirect_to` points at.
    pub fn family_login(&self) -> &str {
        if self.redirect_to.contains("teacher") {
            &self.routes.teacher_login
        } else {
            &self.routes.student_login
        }
    }

    pub fn evaluate(&self, outcome: SessionOutcome) -> AuthOutcome {
        match outcome {
            SessionOutcome::Failed | SessionOutcome::Anonymous => {
                AuthOutcome::Redirect(self.redirect_to.clone())
            }
            SessionOutcome::MissingProfile => match self.missing_profile {
                MissingProfilePolicy::Redirect => {
                    AuthOutcome::Redirect(self.family_login().to_string())
                }
                MissingProfilePolicy::Deny => AuthOutcome::MissingProfile,
            },
            SessionOutcome::Ready { role: None, .. } => {
                AuthOutcome::Redirect(self.redirect_to.clone())
            }
            SessionOutcome::Ready {
                role: Some(role),
                profile,
            } => {
                if profile.is_none() {
                    return self.evaluate(SessionOutcome::MissingProfile);
                }
                if self.allowed_roles.contains(&role) {
                    AuthOutcome::Render(role)
                } else {
                    AuthOutcome::Redirect(self.routes.home_for(role).to_string())
                }
            }
        }
    }
}
