//! Route authorization for the admin area.
//!
//! A [`RouteGuard`] starts in `Loading`, subscribes to identity changes,
//! fetches the current identity once, and settles on `Authorized` or
//! `Unauthorized`. Every failure path lands on `Unauthorized`.

mod hosted;
mod identity;
mod session;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub use hosted::{HostedIdentity, HostedIdentityConfig, HostedIdentityProvider};
pub use identity::{
    Identity, IdentityEvent, IdentityEventKind, IdentityNotice, IdentityProvider,
    IdentitySubscription, Viewer, identity_for_viewer, resolve_identity,
};
pub use session::SessionStore;

pub const DEFAULT_SIGN_IN_PATH: &str = "/admin/login";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardState {
    Loading,
    Authorized,
    Unauthorized,
}

impl GuardState {
    pub fn from_identity(identity: &Identity) -> Self {
        if identity.viewer_id.is_some() && identity.is_privileged {
            Self::Authorized
        } else {
            Self::Unauthorized
        }
    }

    pub fn is_settled(self) -> bool {
        self != Self::Loading
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub location: String,
    /// Replace the current history entry instead of pushing a new one.
    pub replace: bool,
}

/// What the guarded route shows for the current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardView<T> {
    /// Neutral progress indicator; neither the subtree nor a redirect.
    Pending,
    Redirect(Redirect),
    Render(T),
}

pub const DEFAULT_SETTLE_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardConfig {
    pub sign_in_path: String,
    /// How long [`RouteGuard::settled_in_time`] waits before giving up.
    pub settle_timeout: Duration,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            sign_in_path: DEFAULT_SIGN_IN_PATH.to_owned(),
            settle_timeout: DEFAULT_SETTLE_TIMEOUT,
        }
    }
}

impl GuardConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = match std::env::var("FOLIO_SIGN_IN_PATH") {
            Ok(raw) => Self::parse(&raw).with_context(|| {
                format!("invalid FOLIO_SIGN_IN_PATH={raw:?}. expected an absolute path")
            })?,
            Err(_) => Self::default(),
        };
        if let Ok(raw) = std::env::var("FOLIO_GUARD_TIMEOUT_SECS") {
            let secs = raw.trim().parse::<u64>().with_context(|| {
                format!("invalid FOLIO_GUARD_TIMEOUT_SECS={raw:?}. expected whole seconds")
            })?;
            config.settle_timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }

    pub fn with_settle_timeout(mut self, settle_timeout: Duration) -> Self {
        self.settle_timeout = settle_timeout;
        self
    }

    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let path = raw.trim();
        if path.is_empty() {
            return Ok(Self::default());
        }
        if !path.starts_with('/') || path.starts_with("//") {
            anyhow::bail!("sign-in path must be a local absolute path: {path}");
        }
        Ok(Self {
            sign_in_path: path.to_owned(),
            ..Self::default()
        })
    }
}

/// A mounted guard. Dropping it (or calling [`RouteGuard::unmount`]) stops
/// the driver task, which releases the identity subscription; results that
/// arrive afterwards are discarded.
#[derive(Debug)]
pub struct RouteGuard {
    state: watch::Receiver<GuardState>,
    driver: Option<JoinHandle<()>>,
    config: GuardConfig,
}

impl RouteGuard {
    /// Must be called from within a tokio runtime.
    pub fn mount(provider: Arc<dyn IdentityProvider>, config: GuardConfig) -> Self {
        let (state_tx, state_rx) = watch::channel(GuardState::Loading);
        // Subscribe before fetching so a sign-in racing the fetch is not lost.
        let subscription = provider.subscribe();
        let driver = tokio::spawn(drive(provider, subscription, state_tx));

        Self {
            state: state_rx,
            driver: Some(driver),
            config,
        }
    }

    pub fn state(&self) -> GuardState {
        *self.state.borrow()
    }

    /// Waits until the guard leaves `Loading`.
    pub async fn settled(&mut self) -> GuardState {
        match self.state.wait_for(|state| state.is_settled()).await {
            Ok(state) => *state,
            // The driver ended without deciding; fail closed.
            Err(_) => GuardState::Unauthorized,
        }
    }

    /// Like [`RouteGuard::settled`], bounded by the configured settle timeout.
    /// `None` means the guard is still `Loading`.
    pub async fn settled_in_time(&mut self) -> Option<GuardState> {
        let timeout = self.config.settle_timeout;
        match tokio::time::timeout(timeout, self.settled()).await {
            Ok(state) => Some(state),
            Err(_) => {
                tracing::warn!(?timeout, "route guard did not settle in time");
                None
            }
        }
    }

    /// Waits for the next state change. `None` once the driver has stopped.
    pub async fn changed(&mut self) -> Option<GuardState> {
        self.state.changed().await.ok()?;
        Some(*self.state.borrow_and_update())
    }

    pub fn view<T>(&self, render: impl FnOnce() -> T) -> GuardView<T> {
        match self.state() {
            GuardState::Loading => GuardView::Pending,
            GuardState::Unauthorized => GuardView::Redirect(Redirect {
                location: self.config.sign_in_path.clone(),
                replace: true,
            }),
            GuardState::Authorized => GuardView::Render(render()),
        }
    }

    /// Stops the driver and waits until its subscription has been released.
    pub async fn unmount(mut self) {
        if let Some(driver) = self.driver.take() {
            driver.abort();
            let _ = driver.await;
        }
    }
}

impl Drop for RouteGuard {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
    }
}

async fn drive(
    provider: Arc<dyn IdentityProvider>,
    mut subscription: IdentitySubscription,
    state: watch::Sender<GuardState>,
) {
    let initial = resolve_identity(provider.as_ref());
    tokio::pin!(initial);
    let mut initial_pending = true;
    let mut subscribed = true;

    while initial_pending || subscribed {
        tokio::select! {
            identity = &mut initial, if initial_pending => {
                initial_pending = false;
                publish(&state, &identity, "initial fetch");
            }
            notice = subscription.recv(), if subscribed => match notice {
                Some(IdentityNotice::Changed(event)) => {
                    let identity = identity_for_viewer(provider.as_ref(), event.viewer).await;
                    publish(&state, &identity, "identity change");
                }
                Some(IdentityNotice::Missed(skipped)) => {
                    tracing::warn!(skipped, "identity subscription lagged; refetching");
                    let identity = resolve_identity(provider.as_ref()).await;
                    publish(&state, &identity, "identity resync");
                }
                None => {
                    tracing::debug!("identity change stream closed");
                    subscribed = false;
                }
            },
        }
    }
}

fn publish(state: &watch::Sender<GuardState>, identity: &Identity, source: &'static str) {
    let next = GuardState::from_identity(identity);
    let changed = state.send_if_modified(|current| {
        if *current == next {
            return false;
        }
        *current = next;
        true
    });
    if changed {
        tracing::debug!(
            ?next,
            source,
            viewer_id = identity.viewer_id.as_deref(),
            "route guard state changed"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::sync::{Notify, broadcast};

    use super::*;

    #[derive(Clone, Copy)]
    enum Outcome {
        Absent,
        Failed,
        Viewer { privileged: bool },
        PrivilegeLookupFails,
    }

    struct FakeProvider {
        outcome: Mutex<Outcome>,
        gate: Option<Arc<Notify>>,
        events: broadcast::Sender<IdentityEvent>,
    }

    impl FakeProvider {
        fn new(outcome: Outcome) -> Arc<Self> {
            let (events, _) = broadcast::channel(8);
            Arc::new(Self {
                outcome: Mutex::new(outcome),
                gate: None,
                events,
            })
        }

        fn gated(outcome: Outcome, gate: Arc<Notify>) -> Arc<Self> {
            let (events, _) = broadcast::channel(8);
            Arc::new(Self {
                outcome: Mutex::new(outcome),
                gate: Some(gate),
                events,
            })
        }

        fn set(&self, outcome: Outcome) {
            *self.outcome.lock().unwrap() = outcome;
        }

        fn emit(&self, kind: IdentityEventKind, viewer: Option<&str>) {
            let _ = self.events.send(IdentityEvent {
                kind,
                viewer: viewer.map(|id| Viewer {
                    id: id.to_owned(),
                    email: None,
                }),
            });
        }
    }

    #[async_trait]
    impl IdentityProvider for FakeProvider {
        async fn fetch_current_viewer(&self) -> anyhow::Result<Option<Viewer>> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            let outcome = *self.outcome.lock().unwrap();
            match outcome {
                Outcome::Absent => Ok(None),
                Outcome::Failed => anyhow::bail!("backend unavailable"),
                Outcome::Viewer { .. } | Outcome::PrivilegeLookupFails => Ok(Some(Viewer {
                    id: "viewer-1".to_owned(),
                    email: Some("me@example.com".to_owned()),
                })),
            }
        }

        async fn fetch_is_privileged(&self, _viewer: &Viewer) -> anyhow::Result<bool> {
            let outcome = *self.outcome.lock().unwrap();
            match outcome {
                Outcome::Viewer { privileged } => Ok(privileged),
                Outcome::PrivilegeLookupFails => anyhow::bail!("admins table unavailable"),
                Outcome::Absent | Outcome::Failed => Ok(false),
            }
        }

        fn subscribe(&self) -> IdentitySubscription {
            IdentitySubscription::new(self.events.subscribe())
        }
    }

    async fn settle(provider: Arc<FakeProvider>) -> (GuardState, GuardView<&'static str>) {
        let mut guard = RouteGuard::mount(provider, GuardConfig::default());
        let state = tokio::time::timeout(Duration::from_secs(5), guard.settled())
            .await
            .expect("guard settles");
        (state, guard.view(|| "admin"))
    }

    fn sign_in_redirect() -> GuardView<&'static str> {
        GuardView::Redirect(Redirect {
            location: DEFAULT_SIGN_IN_PATH.to_owned(),
            replace: true,
        })
    }

    #[tokio::test]
    async fn fails_closed_for_absent_failed_or_unprivileged_identity() {
        for outcome in [
            Outcome::Absent,
            Outcome::Failed,
            Outcome::Viewer { privileged: false },
            Outcome::PrivilegeLookupFails,
        ] {
            let (state, view) = settle(FakeProvider::new(outcome)).await;
            assert_eq!(state, GuardState::Unauthorized);
            assert_eq!(view, sign_in_redirect());
        }
    }

    #[tokio::test]
    async fn privileged_viewer_renders_subtree() {
        let (state, view) = settle(FakeProvider::new(Outcome::Viewer { privileged: true })).await;
        assert_eq!(state, GuardState::Authorized);
        assert_eq!(view, GuardView::Render("admin"));
    }

    #[tokio::test]
    async fn loading_renders_neither_subtree_nor_redirect() {
        let gate = Arc::new(Notify::new());
        let provider = FakeProvider::gated(Outcome::Viewer { privileged: true }, gate.clone());
        let mut guard = RouteGuard::mount(provider, GuardConfig::default());

        let mut rendered = false;
        let view = guard.view(|| rendered = true);
        assert_eq!(view, GuardView::Pending);
        assert!(!rendered);

        gate.notify_one();
        assert_eq!(guard.settled().await, GuardState::Authorized);
    }

    #[tokio::test]
    async fn change_events_re_evaluate_privilege() {
        let provider = FakeProvider::new(Outcome::Absent);
        let mut guard = RouteGuard::mount(provider.clone(), GuardConfig::default());
        assert_eq!(guard.settled().await, GuardState::Unauthorized);

        provider.set(Outcome::Viewer { privileged: true });
        provider.emit(IdentityEventKind::SignedIn, Some("viewer-1"));
        assert_eq!(guard.changed().await, Some(GuardState::Authorized));

        provider.set(Outcome::Absent);
        provider.emit(IdentityEventKind::SignedOut, None);
        assert_eq!(guard.changed().await, Some(GuardState::Unauthorized));
    }

    #[tokio::test]
    async fn event_clears_loading_before_fetch_resolves() {
        let gate = Arc::new(Notify::new());
        let provider = FakeProvider::gated(Outcome::Viewer { privileged: true }, gate);
        let mut guard = RouteGuard::mount(provider.clone(), GuardConfig::default());
        assert_eq!(guard.state(), GuardState::Loading);

        provider.emit(IdentityEventKind::SignedIn, Some("viewer-1"));
        assert_eq!(guard.settled().await, GuardState::Authorized);
    }

    #[tokio::test]
    async fn unmount_releases_subscription() {
        let provider = FakeProvider::new(Outcome::Viewer { privileged: true });
        let mut guard = RouteGuard::mount(provider.clone(), GuardConfig::default());
        guard.settled().await;
        assert_eq!(provider.events.receiver_count(), 1);

        guard.unmount().await;
        assert_eq!(provider.events.receiver_count(), 0);
    }

    #[tokio::test]
    async fn unmount_before_fetch_resolves_ignores_late_result() {
        let gate = Arc::new(Notify::new());
        let provider = FakeProvider::gated(Outcome::Viewer { privileged: true }, gate.clone());
        let guard = RouteGuard::mount(provider.clone(), GuardConfig::default());
        let mut observer = guard.state.clone();

        guard.unmount().await;
        gate.notify_one();

        assert_eq!(*observer.borrow_and_update(), GuardState::Loading);
        assert!(observer.changed().await.is_err());
        assert_eq!(provider.events.receiver_count(), 0);
    }

    #[tokio::test]
    async fn guard_that_cannot_settle_stays_pending() {
        let gate = Arc::new(Notify::new());
        let provider = FakeProvider::gated(Outcome::Viewer { privileged: true }, gate);
        let config = GuardConfig::default().with_settle_timeout(Duration::from_millis(50));
        let mut guard = RouteGuard::mount(provider, config);

        assert_eq!(guard.settled_in_time().await, None);
        assert_eq!(guard.view(|| "admin"), GuardView::Pending);
    }

    #[test]
    fn sign_in_path_must_be_local() {
        assert_eq!(
            GuardConfig::parse("").unwrap().sign_in_path,
            DEFAULT_SIGN_IN_PATH
        );
        assert_eq!(GuardConfig::parse(" /login ").unwrap().sign_in_path, "/login");
        assert!(GuardConfig::parse("https://evil.example").is_err());
        assert!(GuardConfig::parse("//evil.example").is_err());
    }
}
