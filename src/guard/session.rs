use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{RwLock, broadcast};

use crate::guard::identity::{
    IdentityEvent, IdentityEventKind, IdentityProvider, IdentitySubscription, Viewer,
};

const EVENT_CAPACITY: usize = 16;

/// In-process identity store: the signed-in viewer, the admin set, and a
/// change stream that sign-in/sign-out publish to.
#[derive(Debug, Clone)]
pub struct SessionStore {
    inner: Arc<SessionInner>,
}

#[derive(Debug)]
struct SessionInner {
    current: RwLock<Option<Viewer>>,
    admins: RwLock<HashSet<String>>,
    events: broadcast::Sender<IdentityEvent>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_admins(std::iter::empty::<String>())
    }

    pub fn with_admins<I, S>(admins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(SessionInner {
                current: RwLock::new(None),
                admins: RwLock::new(admins.into_iter().map(Into::into).collect()),
                events,
            }),
        }
    }

    pub async fn current_viewer(&self) -> Option<Viewer> {
        self.inner.current.read().await.clone()
    }

    pub async fn sign_in(&self, viewer: Viewer) {
        *self.inner.current.write().await = Some(viewer.clone());
        tracing::info!(viewer_id = %viewer.id, "viewer signed in");
        self.publish(IdentityEventKind::SignedIn, Some(viewer));
    }

    pub async fn sign_out(&self) {
        let previous = self.inner.current.write().await.take();
        if let Some(viewer) = &previous {
            tracing::info!(viewer_id = %viewer.id, "viewer signed out");
        }
        self.publish(IdentityEventKind::SignedOut, None);
    }

    pub async fn grant_admin(&self, viewer_id: &str) {
        self.inner.admins.write().await.insert(viewer_id.to_owned());
        self.publish_if_current(viewer_id).await;
    }

    pub async fn revoke_admin(&self, viewer_id: &str) {
        self.inner.admins.write().await.remove(viewer_id);
        self.publish_if_current(viewer_id).await;
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.events.receiver_count()
    }

    async fn publish_if_current(&self, viewer_id: &str) {
        let current = self.current_viewer().await;
        if current.as_ref().is_some_and(|viewer| viewer.id == viewer_id) {
            self.publish(IdentityEventKind::UserUpdated, current);
        }
    }

    fn publish(&self, kind: IdentityEventKind, viewer: Option<Viewer>) {
        // No subscribers is not an error.
        let _ = self.inner.events.send(IdentityEvent { kind, viewer });
    }
}

#[async_trait]
impl IdentityProvider for SessionStore {
    async fn fetch_current_viewer(&self) -> anyhow::Result<Option<Viewer>> {
        Ok(self.current_viewer().await)
    }

    async fn fetch_is_privileged(&self, viewer: &Viewer) -> anyhow::Result<bool> {
        Ok(self.inner.admins.read().await.contains(&viewer.id))
    }

    fn subscribe(&self) -> IdentitySubscription {
        IdentitySubscription::new(self.inner.events.subscribe())
    }
}
