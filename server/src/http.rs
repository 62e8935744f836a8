use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use anyhow::Context;
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::{
    Json, Router,
    extract::{FromRef, State},
    http::{self, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, Key, PrivateCookieJar};
use platform_authn::{SessionContext, SessionDirectory, SessionReadiness, SessionToken};
use platform_authz::{Grade, RedirectPolicy, Role};
use platform_gate::{AuthGate, GuardOptions, Protected, Rendered, RouteGuard};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    graphql::{SchemaType, Viewer, build_schema},
};

pub const SESSION_COOKIE: &str = "__Host-gg_session";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub directory: Arc<dyn SessionDirectory>,
    pub session: SessionContext,
    pub schema: SchemaType,
    pub cookie_key: Key,
}

impl AppState {
    pub fn new<D>(config: Arc<AppConfig>, directory: Arc<D>) -> Self
    where
        D: SessionDirectory + 'static,
    {
        let session = SessionContext::from_directory(directory.clone()).with_readiness(
            SessionReadiness::from_millis(config.session_ready_delay_ms),
        );
        Self {
            cookie_key: config.cookie_key.clone(),
            config,
            directory,
            session,
            schema: build_schema(),
        }
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

#[derive(Clone, Debug)]
pub struct ServeConfig {
    addr: SocketAddr,
}

impl ServeConfig {
    pub fn new(host: IpAddr, port: u16) -> Self {
        Self {
            addr: SocketAddr::from((host, port)),
        }
    }
}

pub async fn serve(config: ServeConfig, state: AppState) -> anyhow::Result<()> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;

    info!(%config.addr, "gradegate server listening");
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;
    Ok(())
}

fn cors_layer(origins: &[HeaderValue]) -> CorsLayer {
    CorsLayer::new()
        .allow_credentials(true)
        .allow_headers([http::header::CONTENT_TYPE, http::header::AUTHORIZATION])
        .allow_methods([Method::POST, Method::GET])
        .allow_origin(AllowOrigin::list(origins.iter().cloned()))
}

pub fn build_router(state: AppState) -> Router {
    let request_id = MakeRequestUuid;
    let header_name = HeaderName::from_static("x-request-id");
    let config = state.config.clone();

    let mut router = Router::new()
        .route("/health", get(health_handler))
        .route(&config.routes.student_home, get(student_dashboard))
        .route(&config.routes.teacher_home, get(teacher_dashboard))
        .route(&config.routes.student_login, get(student_login))
        .route(&config.routes.teacher_login, get(teacher_login))
        .route("/logout", post(logout_handler))
        .route("/graphql", post(graphql_handler));

    for grade in config.grade_routes.iter().copied() {
        router = router.route(
            &grade.root_path(),
            get(
                move |State(state): State<AppState>, jar: PrivateCookieJar, headers: HeaderMap| async move {
                    grade_page(grade, state, session_token(&jar, &headers)).await
                },
            ),
        );
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(header_name.clone(), request_id))
                .layer(PropagateRequestIdLayer::new(header_name))
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&config.cors_allowed_origins)),
        )
        .with_state(state)
}

/// Bearer header first, then the session cookie.
fn session_token(jar: &PrivateCookieJar, headers: &HeaderMap) -> Option<SessionToken> {
    let bearer = headers
        .get(http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .and_then(SessionToken::new);
    bearer.or_else(|| {
        jar.get(SESSION_COOKIE)
            .and_then(|cookie| SessionToken::new(cookie.value()))
    })
}

#[derive(Serialize)]
struct GradePage {
    grade: Grade,
    title: String,
    href: String,
}

#[instrument(name = "http.grade_page", skip_all, fields(grade = grade.value()))]
async fn grade_page(grade: Grade, state: AppState, token: Option<SessionToken>) -> Response {
    let options = GuardOptions {
        missing_profile: state.config.missing_profile,
        login: RedirectPolicy::new(state.config.routes.clone()),
    };
    let guard = RouteGuard::mount(state.session.clone(), options, token, grade);
    guard.settled().await;
    match guard.render(|| GradePage {
        grade,
        title: grade.content_label(),
        href: grade.root_path(),
    }) {
        Rendered::Content(page) => Json(page).into_response(),
        Rendered::Denied(view) => (StatusCode::FORBIDDEN, Json(view)).into_response(),
        Rendered::Redirect(path) => Redirect::to(&path).into_response(),
        Rendered::Placeholder => {
            warn!("grade gate did not settle");
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}

#[derive(Serialize)]
struct DashboardPage {
    user_id: Uuid,
    role: Role,
    grade: Option<Grade>,
}

#[derive(Serialize)]
struct MissingProfileBody {
    reason: &'static str,
}

async fn dashboard(state: &AppState, role: Role, token: Option<SessionToken>) -> Response {
    let gate = AuthGate::new(state.session.clone(), state.config.dashboard_policy(role));
    let outcome = gate
        .render(token.as_ref(), |scope| DashboardPage {
            user_id: scope.identity().id,
            role: scope.role(),
            grade: scope.profile().grade(),
        })
        .await;
    match outcome {
        Protected::Render(page) => Json(page).into_response(),
        Protected::Redirect(path) => Redirect::to(&path).into_response(),
        Protected::MissingProfile => (
            StatusCode::FORBIDDEN,
            Json(MissingProfileBody {
                reason: "missing-profile",
            }),
        )
            .into_response(),
    }
}

#[instrument(name = "http.student_dashboard", skip_all)]
async fn student_dashboard(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    headers: HeaderMap,
) -> Response {
    dashboard(&state, Role::Student, session_token(&jar, &headers)).await
}

#[instrument(name = "http.teacher_dashboard", skip_all)]
async fn teacher_dashboard(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    headers: HeaderMap,
) -> Response {
    dashboard(&state, Role::Teacher, session_token(&jar, &headers)).await
}

async fn student_login() -> &'static str {
    "Sign in with your student account to continue."
}

async fn teacher_login() -> &'static str {
    "Sign in with your teacher account to continue."
}

async fn logout_handler(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    headers: HeaderMap,
) -> (PrivateCookieJar, StatusCode) {
    if let Some(token) = session_token(&jar, &headers) {
        if let Err(err) = state.directory.revoke(&token).await {
            warn!(error = %err, "failed to revoke session");
        }
    }
    let jar = jar.remove(Cookie::build((SESSION_COOKIE, "")).path("/").build());
    (jar, StatusCode::NO_CONTENT)
}

async fn graphql_handler(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    headers: HeaderMap,
    request: GraphQLRequest,
) -> GraphQLResponse {
    let token = session_token(&jar, &headers);
    state.session.readiness().wait().await;
    let resolution = state.session.resolve(token.as_ref()).await;
    let req = request.into_inner().data(Viewer(resolution));
    state.schema.execute(req).await.into()
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let store_ok = state.directory.ping().await;
    Json(HealthResponse {
        ok: store_ok,
        store_ok,
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    store_ok: bool,
    version: &'static str,
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install CTRL+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    ctrl_c.await;

    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    };
}
