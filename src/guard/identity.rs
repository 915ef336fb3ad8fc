use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewer {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Point-in-time answer to "who is looking, and may they administer?".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub viewer_id: Option<String>,
    pub is_privileged: bool,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityEventKind {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityEvent {
    pub kind: IdentityEventKind,
    pub viewer: Option<Viewer>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityNotice {
    Changed(IdentityEvent),
    /// The subscriber fell behind and this many events were dropped.
    Missed(u64),
}

/// Registration on an identity change stream. Dropping it unsubscribes.
#[derive(Debug)]
pub struct IdentitySubscription {
    receiver: broadcast::Receiver<IdentityEvent>,
}

impl IdentitySubscription {
    pub fn new(receiver: broadcast::Receiver<IdentityEvent>) -> Self {
        Self { receiver }
    }

    /// Next notice, or `None` once the publisher is gone.
    pub async fn recv(&mut self) -> Option<IdentityNotice> {
        match self.receiver.recv().await {
            Ok(event) => Some(IdentityNotice::Changed(event)),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                Some(IdentityNotice::Missed(skipped))
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn fetch_current_viewer(&self) -> anyhow::Result<Option<Viewer>>;

    /// Whether `viewer` may administer. Asked about a specific viewer, so an
    /// event and the privilege answer always describe the same person.
    async fn fetch_is_privileged(&self, viewer: &Viewer) -> anyhow::Result<bool>;

    fn subscribe(&self) -> IdentitySubscription;
}

/// Fetches the current identity. Errors count as "no identity".
pub async fn resolve_identity(provider: &dyn IdentityProvider) -> Identity {
    let viewer = match provider.fetch_current_viewer().await {
        Ok(viewer) => viewer,
        Err(err) => {
            tracing::warn!(error = ?err, "identity fetch failed; treating viewer as signed out");
            None
        }
    };
    identity_for_viewer(provider, viewer).await
}

/// Completes an identity for a viewer already known, e.g. from a change event.
pub async fn identity_for_viewer(
    provider: &dyn IdentityProvider,
    viewer: Option<Viewer>,
) -> Identity {
    let Some(viewer) = viewer else {
        return Identity::anonymous();
    };

    let is_privileged = match provider.fetch_is_privileged(&viewer).await {
        Ok(is_privileged) => is_privileged,
        Err(err) => {
            tracing::warn!(
                viewer_id = %viewer.id,
                error = ?err,
                "privilege lookup failed; treating viewer as unprivileged"
            );
            false
        }
    };

    Identity {
        viewer_id: Some(viewer.id),
        is_privileged,
    }
}
