use async_graphql::SimpleObject;
use platform_authn::Resolution;
use platform_authz::AccessDecision;

#[derive(Clone, Debug, SimpleObject)]
pub struct MePayload {
    pub id: String,
    pub role: Option<String>,
    pub grade: Option<i32>,
}

impl MePayload {
    pub fn from_resolution(resolution: &Resolution) -> Option<Self> {
        let identity = resolution.identity?;
        Some(Self {
            id: identity.id.to_string(),
            role: resolution.role().map(|role| role.as_str().to_string()),
            grade: resolution.profile().grade().map(|grade| i32::from(grade.value())),
        })
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct AccessPayload {
    pub status: String,
    pub reason: Option<String>,
    pub viewer_grade: Option<i32>,
}

impl From<AccessDecision> for AccessPayload {
    fn from(decision: AccessDecision) -> Self {
        match decision {
            AccessDecision::Pending => Self {
                status: "pending".into(),
                reason: None,
                viewer_grade: None,
            },
            AccessDecision::Granted => Self {
                status: "granted".into(),
                reason: None,
                viewer_grade: None,
            },
            AccessDecision::Denied(denial) => Self {
                status: "denied".into(),
                reason: Some(denial.reason.as_str().to_string()),
                viewer_grade: denial.viewer_grade.map(|grade| i32::from(grade.value())),
            },
        }
    }
}
