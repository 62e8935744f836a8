use platform_authn::{Identity, Resolution, SessionContext, SessionToken};
use platform_authz::{AuthOutcome, Profile, RedirectPolicy, Role};
use tracing::{debug, instrument};

/// Role context handed to the children of a protected page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoleScope {
    identity: Identity,
    role: Role,
    profile: Profile,
}

impl RoleScope {
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Protected<C> {
    Render(C),
    Redirect(String),
    MissingProfile,
}

/// Wrapper for pages that need any signed-in role from an allow-set.
#[derive(Clone)]
pub struct AuthGate {
    ctx: SessionContext,
    policy: RedirectPolicy,
}

impl AuthGate {
    pub fn new(ctx: SessionContext, policy: RedirectPolicy) -> Self {
        Self { ctx, policy }
    }

    pub fn policy(&self) -> &RedirectPolicy {
        &self.policy
    }

    #[instrument(name = "auth_gate.render", skip_all)]
    pub async fn render<C>(
        &self,
        token: Option<&SessionToken>,
        child: impl FnOnce(&RoleScope) -> C,
    ) -> Protected<C> {
        self.ctx.readiness().wait().await;
        let resolution = self.ctx.resolve(token).await;
        match self.policy.evaluate(resolution.outcome()) {
            AuthOutcome::Render(role) => match scope(&resolution, role) {
                Some(scope) => Protected::Render(child(&scope)),
                None => Protected::Redirect(self.policy.family_login().to_string()),
            },
            AuthOutcome::Redirect(path) => {
                debug!(target_path = %path, "auth gate redirecting");
                Protected::Redirect(path)
            }
            AuthOutcome::MissingProfile => Protected::MissingProfile,
        }
    }
}

fn scope(resolution: &Resolution, role: Role) -> Option<RoleScope> {
    Some(RoleScope {
        identity: resolution.identity?,
        role,
        profile: resolution.profile(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use platform_authn::{
        AuthnError, AuthnResult, IdentityResolver, MemoryDirectory, ProfileRecord,
    };
    use platform_authz::{Grade, MissingProfilePolicy};
    use std::sync::Arc;
    use uuid::Uuid;

    struct Offline;

    #[async_trait]
    impl IdentityResolver for Offline {
        async fn get_identity_session(&self, _: &SessionToken) -> AuthnResult<Option<Identity>> {
            Err(AuthnError::Unavailable("storage offline".into()))
        }
    }

    async fn setup(record: Option<ProfileRecord>) -> (Arc<MemoryDirectory>, SessionToken) {
        let directory = Arc::new(MemoryDirectory::default());
        let user = Uuid::new_v4();
        if let Some(record) = record {
            directory.set_profile(user, record).await;
        }
        let token = directory.sign_in(user).await;
        (directory, token)
    }

    #[tokio::test]
    async fn unauthenticated_goes_to_student_login_by_default() {
        let directory = Arc::new(MemoryDirectory::default());
        let gate = AuthGate::new(
            SessionContext::from_directory(directory),
            RedirectPolicy::default(),
        );
        let outcome = gate.render(None, |_| ()).await;
        assert_eq!(outcome, Protected::Redirect("/student/login".into()));
    }

    #[tokio::test]
    async fn resolver_failure_routes_to_redirect_target() {
        let directory = Arc::new(MemoryDirectory::default());
        let gate = AuthGate::new(
            SessionContext::new(Arc::new(Offline), directory),
            RedirectPolicy::default().redirect_to("/teacher/login"),
        );
        let token = SessionToken::new("anything").unwrap();
        let outcome = gate.render(Some(&token), |_| ()).await;
        assert_eq!(outcome, Protected::Redirect("/teacher/login".into()));
    }

    #[tokio::test]
    async fn allowed_role_renders_with_scope() {
        let grade = Grade::new(12).unwrap();
        let (directory, token) = setup(Some(ProfileRecord::student(grade))).await;
        let gate = AuthGate::new(
            SessionContext::from_directory(directory),
            RedirectPolicy::default().allow([Role::Student]),
        );
        let outcome = gate
            .render(Some(&token), |scope| (scope.role(), scope.profile().grade()))
            .await;
        assert_eq!(outcome, Protected::Render((Role::Student, Some(grade))));
    }

    #[tokio::test]
    async fn wrong_role_is_sent_home() {
        let (directory, token) = setup(Some(ProfileRecord::teacher())).await;
        let gate = AuthGate::new(
            SessionContext::from_directory(directory),
            RedirectPolicy::default().allow([Role::Student]),
        );
        let outcome = gate.render(Some(&token), |_| ()).await;
        assert_eq!(outcome, Protected::Redirect("/teacher/dashboard".into()));
    }

    #[tokio::test]
    async fn missing_profile_follows_instance_policy() {
        let (directory, token) = setup(None).await;
        let ctx = SessionContext::from_directory(directory);

        let redirecting = AuthGate::new(
            ctx.clone(),
            RedirectPolicy::default().redirect_to("/teacher/login"),
        );
        assert_eq!(
            redirecting.render(Some(&token), |_| ()).await,
            Protected::Redirect("/teacher/login".into())
        );

        let denying = AuthGate::new(
            ctx,
            RedirectPolicy::default().on_missing_profile(MissingProfilePolicy::Deny),
        );
        assert_eq!(
            denying.render(Some(&token), |_| ()).await,
            Protected::MissingProfile
        );
    }
}
