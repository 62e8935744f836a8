use std::collections::HashSet;

use anyhow::{Context, Result, anyhow, bail};
use axum::http::HeaderValue;
use axum_extra::extract::cookie::Key;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use platform_authz::{Grade, LoginRoutes, MissingProfilePolicy, RedirectPolicy, Role};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub cookie_key: Key,
    pub cors_allowed_origins: Vec<HeaderValue>,
    pub routes: LoginRoutes,
    pub session_ready_delay_ms: u64,
    pub missing_profile: MissingProfilePolicy,
    pub grade_routes: Vec<Grade>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let cookie_secret = lookup("COOKIE_SECRET_BASE64").context("COOKIE_SECRET_BASE64 missing")?;
        let secret_bytes = STANDARD
            .decode(cookie_secret.trim())
            .context("invalid COOKIE_SECRET_BASE64")?;
        if secret_bytes.len() < 64 {
            return Err(anyhow!(
                "COOKIE_SECRET_BASE64 must decode to at least 64 bytes"
            ));
        }
        let cookie_key = Key::from(&secret_bytes[..64]);

        let cors_allowed_origins = parse_origins(
            &lookup("CORS_ALLOWED_ORIGINS").unwrap_or_else(|| "http://localhost:5173".into()),
        )?;

        let defaults = LoginRoutes::default();
        let routes = LoginRoutes {
            student_login: lookup("STUDENT_LOGIN_PATH").unwrap_or(defaults.student_login),
            teacher_login: lookup("TEACHER_LOGIN_PATH").unwrap_or(defaults.teacher_login),
            student_home: lookup("STUDENT_HOME_PATH").unwrap_or(defaults.student_home),
            teacher_home: lookup("TEACHER_HOME_PATH").unwrap_or(defaults.teacher_home),
        };

        let session_ready_delay_ms = match lookup("SESSION_READY_DELAY_MS") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("invalid SESSION_READY_DELAY_MS {raw:?}"))?,
            None => 0,
        };

        let missing_profile = match lookup("MISSING_PROFILE_POLICY") {
            Some(raw) => MissingProfilePolicy::parse(&raw)
                .ok_or_else(|| anyhow!("MISSING_PROFILE_POLICY must be deny or redirect, got {raw:?}"))?,
            None => MissingProfilePolicy::Deny,
        };

        let grade_routes = match lookup("GRADE_ROUTES") {
            Some(raw) => split_list(&raw)
                .iter()
                .map(|path| {
                    Grade::from_resource_path(path)
                        .with_context(|| format!("invalid grade route {path:?}"))
                })
                .collect::<Result<Vec<_>>>()?,
            None => Grade::all().collect(),
        };
        check_routes(&routes, &grade_routes)?;

        Ok(Self {
            cookie_key,
            cors_allowed_origins,
            routes,
            session_ready_delay_ms,
            missing_profile,
            grade_routes,
        })
    }

    /// Policy for a dashboard only `role` may open.
    pub fn dashboard_policy(&self, role: Role) -> RedirectPolicy {
        RedirectPolicy::new(self.routes.clone())
            .redirect_to(self.routes.login_for(role))
            .allow([role])
    }
}

/// Credentials are allowed, so a wildcard or empty list is not acceptable.
fn parse_origins(raw: &str) -> Result<Vec<HeaderValue>> {
    let origins = split_list(raw);
    if origins.is_empty() {
        bail!("CORS_ALLOWED_ORIGINS must list at least one origin");
    }
    origins
        .iter()
        .map(|origin| {
            if origin == "*" {
                bail!("CORS_ALLOWED_ORIGINS cannot be `*` when credentials are allowed");
            }
            origin
                .parse::<HeaderValue>()
                .with_context(|| format!("invalid CORS origin {origin:?}"))
        })
        .collect()
}

/// Every mounted path must be absolute and registered once.
fn check_routes(routes: &LoginRoutes, grades: &[Grade]) -> Result<()> {
    let fixed = [
        ("/health", "health"),
        ("/logout", "logout"),
        ("/graphql", "graphql"),
        (routes.student_home.as_str(), "STUDENT_HOME_PATH"),
        (routes.teacher_home.as_str(), "TEACHER_HOME_PATH"),
        (routes.student_login.as_str(), "STUDENT_LOGIN_PATH"),
        (routes.teacher_login.as_str(), "TEACHER_LOGIN_PATH"),
    ];
    let grade_paths = grades
        .iter()
        .map(|grade| (grade.root_path(), "GRADE_ROUTES"))
        .collect::<Vec<_>>();

    let mut seen = HashSet::new();
    let all = fixed
        .into_iter()
        .chain(grade_paths.iter().map(|(path, source)| (path.as_str(), *source)));
    for (path, source) in all {
        if !path.starts_with('/') {
            bail!("{source} path {path:?} must start with `/`");
        }
        if !seen.insert(path) {
            bail!("{source} path {path:?} is already routed");
        }
    }
    Ok(())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
        .collect()
}
