//! Grade gate for a single protected view.
//!
//! A [`RouteGuard`] starts in [`GuardState::Loading`], resolves the caller in a
//! background task and settles exactly once per (session, grade) key. A new key
//! resets to `Loading`; results from superseded keys or from a guard that has
//! been dropped are discarded. Session readiness is awaited by a separate task
//! started at mount, so re-keying never restarts it.

use std::sync::Arc;

use platform_authn::{Resolution, SessionContext, SessionReadiness, SessionToken};
use platform_authz::{
    AccessDecision, Grade, MissingProfilePolicy, RedirectPolicy, SessionOutcome, decide,
};
use tokio::{
    sync::watch,
    task::JoinHandle,
};
use tracing::{debug, info};

use crate::view::DenialView;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardState {
    Loading,
    Granted,
    Denied(DenialView),
    /// Only reached when the instance redirects callers without a profile.
    Redirect(String),
}

impl GuardState {
    pub fn is_loading(&self) -> bool {
        matches!(self, GuardState::Loading)
    }
}

/// Branch to show for the current state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rendered<C> {
    Placeholder,
    Content(C),
    Denied(DenialView),
    Redirect(String),
}

#[derive(Clone, Debug)]
pub struct GuardOptions {
    pub missing_profile: MissingProfilePolicy,
    pub login: RedirectPolicy,
}

impl Default for GuardOptions {
    fn default() -> Self {
        Self {
            missing_profile: MissingProfilePolicy::Deny,
            login: RedirectPolicy::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct GuardKey {
    token: Option<SessionToken>,
    required_grade: Grade,
}

/// Observable state of a guard, tagged with the resolution it belongs to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardSnapshot {
    pub generation: u64,
    pub required_grade: Grade,
    pub state: GuardState,
}

pub struct RouteGuard {
    ctx: SessionContext,
    options: Arc<GuardOptions>,
    key: GuardKey,
    slot: Arc<watch::Sender<GuardSnapshot>>,
    ready: watch::Receiver<bool>,
    readiness: Option<JoinHandle<()>>,
    inflight: Option<JoinHandle<()>>,
}

impl RouteGuard {
    /// Mount a guard and start resolving. Must be called inside a tokio runtime.
    pub fn mount(
        ctx: SessionContext,
        options: GuardOptions,
        token: Option<SessionToken>,
        required_grade: Grade,
    ) -> Self {
        let (slot, _) = watch::channel(GuardSnapshot {
            generation: 0,
            required_grade,
            state: GuardState::Loading,
        });
        let (ready, readiness) = watch_readiness(ctx.readiness().clone());
        let mut guard = Self {
            ctx,
            options: Arc::new(options),
            key: GuardKey {
                token,
                required_grade,
            },
            slot: Arc::new(slot),
            ready,
            readiness,
            inflight: None,
        };
        guard.start();
        guard
    }

    /// Feed new dependencies. Unchanged inputs keep the settled state.
    pub fn update(&mut self, token: Option<SessionToken>, required_grade: Grade) {
        let key = GuardKey {
            token,
            required_grade,
        };
        if key == self.key {
            return;
        }
        self.key = key;
        self.start();
    }

    pub fn required_grade(&self) -> Grade {
        self.key.required_grade
    }

    pub fn state(&self) -> GuardState {
        self.slot.borrow().state.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<GuardSnapshot> {
        self.slot.subscribe()
    }

    /// Wait until the current key has been decided.
    pub async fn settled(&self) -> GuardState {
        let mut rx = self.slot.subscribe();
        match rx.wait_for(|snapshot| !snapshot.state.is_loading()).await {
            Ok(snapshot) => snapshot.state.clone(),
            Err(_) => GuardState::Loading,
        }
    }

    pub fn render<C>(&self, content: impl FnOnce() -> C) -> Rendered<C> {
        match self.state() {
            GuardState::Loading => Rendered::Placeholder,
            GuardState::Granted => Rendered::Content(content()),
            GuardState::Denied(view) => Rendered::Denied(view),
            GuardState::Redirect(path) => Rendered::Redirect(path),
        }
    }

    fn start(&mut self) {
        if let Some(handle) = self.inflight.take() {
            handle.abort();
        }
        let key = self.key.clone();
        let mut generation = 0;
        self.slot.send_modify(|snapshot| {
            snapshot.generation += 1;
            snapshot.required_grade = key.required_grade;
            snapshot.state = GuardState::Loading;
            generation = snapshot.generation;
        });
        debug!(generation, grade = key.required_grade.value(), "route guard loading");

        let ctx = self.ctx.clone();
        let options = self.options.clone();
        let slot = self.slot.clone();
        let mut ready = self.ready.clone();
        self.inflight = Some(tokio::spawn(async move {
            // Err only when the readiness task is gone, i.e. after unmount.
            let _ = ready.wait_for(|ready| *ready).await;
            let resolution = ctx.resolve(key.token.as_ref()).await;
            let state = settle(&resolution, key.required_grade, &options);
            if !apply(&slot, generation, state) {
                debug!(generation, "discarding stale guard resolution");
            }
        }));
    }
}

impl Drop for RouteGuard {
    fn drop(&mut self) {
        if let Some(handle) = self.inflight.take() {
            handle.abort();
        }
        if let Some(handle) = self.readiness.take() {
            handle.abort();
        }
        // Invalidate whatever is still running so nothing lands after unmount.
        self.slot.send_modify(|snapshot| snapshot.generation += 1);
    }
}

/// Start waiting for session readiness once for the lifetime of a guard.
fn watch_readiness(readiness: SessionReadiness) -> (watch::Receiver<bool>, Option<JoinHandle<()>>) {
    if matches!(readiness, SessionReadiness::Immediate) {
        let (_, rx) = watch::channel(true);
        return (rx, None);
    }
    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(async move {
        readiness.wait().await;
        debug!("session readiness reached");
        let _ = tx.send(true);
    });
    (rx, Some(handle))
}

fn settle(resolution: &Resolution, required_grade: Grade, options: &GuardOptions) -> GuardState {
    if resolution.outcome() == SessionOutcome::MissingProfile
        && options.missing_profile == MissingProfilePolicy::Redirect
    {
        let target = options.login.family_login().to_string();
        info!(target_path = %target, "identity has no profile; redirecting");
        return GuardState::Redirect(target);
    }

    match decide(resolution.role_state(), &resolution.profile(), required_grade) {
        AccessDecision::Granted => GuardState::Granted,
        AccessDecision::Denied(denial) => {
            info!(
                grade = required_grade.value(),
                reason = denial.reason.as_str(),
                "grade gate denied access"
            );
            GuardState::Denied(DenialView::new(required_grade, denial))
        }
        AccessDecision::Pending => GuardState::Loading,
    }
}

/// Store a decided state if it still belongs to the current generation.
fn apply(slot: &watch::Sender<GuardSnapshot>, generation: u64, state: GuardState) -> bool {
    slot.send_if_modified(|snapshot| {
        if snapshot.generation != generation || !snapshot.state.is_loading() {
            return false;
        }
        snapshot.state = state;
        true
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use platform_authn::{AuthnResult, Identity, IdentityResolver, MemoryDirectory, ProfileRecord};
    use platform_authz::{DenialReason, LoginRoutes};
    use std::time::Duration;
    use tokio::sync::{Mutex, mpsc, oneshot};
    use uuid::Uuid;

    fn grade(value: i64) -> Grade {
        Grade::new(value).unwrap()
    }

    /// Identity lookups that wait on test-controlled gates, one per call.
    struct Gated {
        inner: Arc<MemoryDirectory>,
        gates: Mutex<Vec<oneshot::Receiver<()>>>,
        entered: mpsc::UnboundedSender<()>,
    }

    #[async_trait]
    impl IdentityResolver for Gated {
        async fn get_identity_session(&self, token: &SessionToken) -> AuthnResult<Option<Identity>> {
            let gate = {
                let mut gates = self.gates.lock().await;
                if gates.is_empty() { None } else { Some(gates.remove(0)) }
            };
            let _ = self.entered.send(());
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            self.inner.get_identity_session(token).await
        }
    }

    async fn student_session(directory: &MemoryDirectory, own: i64) -> SessionToken {
        let user = Uuid::new_v4();
        directory
            .set_profile(user, ProfileRecord::student(grade(own)))
            .await;
        directory.sign_in(user).await
    }

    fn memory_ctx(directory: Arc<MemoryDirectory>) -> SessionContext {
        SessionContext::from_directory(directory)
    }

    #[tokio::test]
    async fn other_grade_student_is_denied_after_loading() {
        let directory = Arc::new(MemoryDirectory::default());
        let token = student_session(&directory, 6).await;
        let guard = RouteGuard::mount(
            memory_ctx(directory),
            GuardOptions::default(),
            Some(token),
            grade(7),
        );
        assert_eq!(guard.state(), GuardState::Loading);
        assert_eq!(guard.render(|| "content"), Rendered::Placeholder);

        match guard.settled().await {
            GuardState::Denied(view) => {
                assert_eq!(view.reason, DenialReason::GradeMismatch);
                assert_eq!(view.viewer_grade, Some(grade(6)));
                assert_eq!(view.required_grade, grade(7));
            }
            other => panic!("expected denial, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn same_grade_student_is_granted_after_loading() {
        let directory = Arc::new(MemoryDirectory::default());
        let token = student_session(&directory, 7).await;
        let guard = RouteGuard::mount(
            memory_ctx(directory),
            GuardOptions::default(),
            Some(token),
            grade(7),
        );
        assert_eq!(guard.state(), GuardState::Loading);
        assert_eq!(guard.settled().await, GuardState::Granted);
        assert_eq!(guard.render(|| "content"), Rendered::Content("content"));
    }

    #[tokio::test]
    async fn teacher_sees_content_for_any_grade() {
        let directory = Arc::new(MemoryDirectory::default());
        let user = Uuid::new_v4();
        directory.set_profile(user, ProfileRecord::teacher()).await;
        let token = directory.sign_in(user).await;
        let guard = RouteGuard::mount(
            memory_ctx(directory),
            GuardOptions::default(),
            Some(token),
            grade(10),
        );
        assert_eq!(guard.settled().await, GuardState::Granted);
    }

    #[tokio::test]
    async fn anonymous_caller_gets_denial_without_grade_shortcut() {
        let directory = Arc::new(MemoryDirectory::default());
        let guard = RouteGuard::mount(memory_ctx(directory), GuardOptions::default(), None, grade(8));
        let GuardState::Denied(view) = guard.settled().await else {
            panic!("anonymous caller must be denied");
        };
        assert_eq!(view.reason, DenialReason::Unauthenticated);
        assert_eq!(view.viewer_grade, None);
        assert_eq!(view.actions.len(), 1);
    }

    #[tokio::test]
    async fn missing_profile_policy_is_per_instance() {
        let directory = Arc::new(MemoryDirectory::default());
        let token = directory.sign_in(Uuid::new_v4()).await;

        let deny = RouteGuard::mount(
            memory_ctx(directory.clone()),
            GuardOptions::default(),
            Some(token.clone()),
            grade(9),
        );
        assert!(matches!(deny.settled().await, GuardState::Denied(_)));

        let options = GuardOptions {
            missing_profile: MissingProfilePolicy::Redirect,
            login: RedirectPolicy::new(LoginRoutes::default()),
        };
        let redirect = RouteGuard::mount(memory_ctx(directory), options, Some(token), grade(9));
        assert_eq!(
            redirect.settled().await,
            GuardState::Redirect("/student/login".into())
        );
    }

    #[tokio::test]
    async fn same_inputs_do_not_reset_a_decided_guard() {
        let directory = Arc::new(MemoryDirectory::default());
        let token = student_session(&directory, 11).await;
        let mut guard = RouteGuard::mount(
            memory_ctx(directory),
            GuardOptions::default(),
            Some(token.clone()),
            grade(11),
        );
        assert_eq!(guard.settled().await, GuardState::Granted);
        let generation = guard.subscribe().borrow().generation;
        guard.update(Some(token), grade(11));
        assert_eq!(guard.state(), GuardState::Granted);
        assert_eq!(guard.subscribe().borrow().generation, generation);
    }

    #[tokio::test]
    async fn grade_change_mid_resolution_applies_only_latest() {
        let directory = Arc::new(MemoryDirectory::default());
        let token = student_session(&directory, 7).await;
        let (release_first, first_gate) = oneshot::channel();
        let (entered_tx, mut entered) = mpsc::unbounded_channel();
        let gated = Arc::new(Gated {
            inner: directory.clone(),
            gates: Mutex::new(vec![first_gate]),
            entered: entered_tx,
        });
        let ctx = SessionContext::new(gated, directory);

        let mut guard = RouteGuard::mount(ctx, GuardOptions::default(), Some(token.clone()), grade(6));
        entered.recv().await.unwrap();

        guard.update(Some(token), grade(7));
        assert_eq!(guard.state(), GuardState::Loading);
        assert_eq!(guard.settled().await, GuardState::Granted);

        let _ = release_first.send(());
        tokio::time::sleep(Duration::from_millis(10)).await;
        let snapshot = guard.subscribe().borrow().clone();
        assert_eq!(snapshot.required_grade, grade(7));
        assert_eq!(snapshot.state, GuardState::Granted);
    }

    #[tokio::test]
    async fn stale_generation_is_not_applied() {
        let (slot, _) = watch::channel(GuardSnapshot {
            generation: 2,
            required_grade: grade(7),
            state: GuardState::Loading,
        });
        assert!(!apply(&slot, 1, GuardState::Granted));
        assert!(slot.borrow().state.is_loading());
        assert!(apply(&slot, 2, GuardState::Granted));
        assert!(!apply(&slot, 2, GuardState::Redirect("/".into())));
        assert_eq!(slot.borrow().state, GuardState::Granted);
    }

    #[tokio::test]
    async fn unmount_discards_in_flight_resolution() {
        let directory = Arc::new(MemoryDirectory::default());
        let token = student_session(&directory, 8).await;
        let (release, gate) = oneshot::channel();
        let (entered_tx, mut entered) = mpsc::unbounded_channel();
        let gated = Arc::new(Gated {
            inner: directory.clone(),
            gates: Mutex::new(vec![gate]),
            entered: entered_tx,
        });
        let guard = RouteGuard::mount(
            SessionContext::new(gated, directory),
            GuardOptions::default(),
            Some(token),
            grade(8),
        );
        entered.recv().await.unwrap();
        let observer = guard.subscribe();
        drop(guard);

        let _ = release.send(());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(observer.borrow().state.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn readiness_wait_happens_once_per_mount() {
        let directory = Arc::new(MemoryDirectory::default());
        let token = student_session(&directory, 9).await;
        let ctx = memory_ctx(directory)
            .with_readiness(SessionReadiness::Delay(Duration::from_millis(500)));
        let started = tokio::time::Instant::now();
        let mut guard = RouteGuard::mount(ctx, GuardOptions::default(), Some(token.clone()), grade(9));
        assert_eq!(guard.settled().await, GuardState::Granted);
        assert!(started.elapsed() >= Duration::from_millis(500));

        let second = tokio::time::Instant::now();
        guard.update(Some(token), grade(10));
        assert!(matches!(guard.settled().await, GuardState::Denied(_)));
        assert!(second.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn grade_change_during_readiness_keeps_original_deadline() {
        let directory = Arc::new(MemoryDirectory::default());
        let token = student_session(&directory, 7).await;
        let ctx = memory_ctx(directory)
            .with_readiness(SessionReadiness::Delay(Duration::from_millis(500)));
        let started = tokio::time::Instant::now();
        let mut guard = RouteGuard::mount(ctx, GuardOptions::default(), Some(token.clone()), grade(6));

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(guard.state(), GuardState::Loading);
        guard.update(Some(token), grade(7));
        assert_eq!(guard.state(), GuardState::Loading);

        assert_eq!(guard.settled().await, GuardState::Granted);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(500));
        assert!(elapsed < Duration::from_millis(600), "waited {elapsed:?}");
    }

    #[tokio::test]
    async fn pending_signal_holds_every_key_until_ready() {
        let directory = Arc::new(MemoryDirectory::default());
        let token = student_session(&directory, 8).await;
        let (ready_tx, ready_rx) = watch::channel(false);
        let ctx = memory_ctx(directory).with_readiness(SessionReadiness::Signal(ready_rx));
        let mut guard = RouteGuard::mount(ctx, GuardOptions::default(), Some(token.clone()), grade(7));

        tokio::task::yield_now().await;
        guard.update(Some(token), grade(8));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(guard.state(), GuardState::Loading);

        ready_tx.send(true).unwrap();
        assert_eq!(guard.settled().await, GuardState::Granted);
    }
}
