use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::broadcast;
use url::Url;

use crate::guard::identity::{IdentityEvent, IdentityProvider, IdentitySubscription, Viewer};

/// Per-request bound on calls to the identity service.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for the hosted auth/database service.
#[derive(Debug, Clone)]
pub struct HostedIdentityConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl HostedIdentityConfig {
    /// `Ok(None)` when `FOLIO_IDENTITY_URL` is unset.
    pub fn from_env() -> anyhow::Result<Option<Self>> {
        let Some(base_url) = std::env::var("FOLIO_IDENTITY_URL")
            .ok()
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
        else {
            return Ok(None);
        };
        let api_key = std::env::var("FOLIO_IDENTITY_API_KEY")
            .context("FOLIO_IDENTITY_API_KEY is required when FOLIO_IDENTITY_URL is set")?;
        let mut config = Self::new(&base_url, api_key.trim())?;
        if let Ok(raw) = std::env::var("FOLIO_IDENTITY_TIMEOUT_SECS") {
            let secs = raw.trim().parse::<u64>().with_context(|| {
                format!("invalid FOLIO_IDENTITY_TIMEOUT_SECS={raw:?}. expected whole seconds")
            })?;
            config = config.with_timeout(Duration::from_secs(secs));
        }
        Ok(Some(config))
    }

    pub fn new(base_url: &str, api_key: &str) -> anyhow::Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_owned();
        let parsed =
            Url::parse(&base_url).with_context(|| format!("parse identity url: {base_url}"))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            anyhow::bail!("identity url scheme must be http/https: {base_url}");
        }
        if api_key.is_empty() {
            anyhow::bail!("identity api key is empty");
        }
        Ok(Self {
            base_url,
            api_key: api_key.to_owned(),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn user_endpoint(&self) -> String {
        format!("{}/auth/v1/user", self.base_url)
    }

    fn admins_endpoint(&self, viewer_id: &str) -> anyhow::Result<Url> {
        let mut url = Url::parse(&format!("{}/rest/v1/admins", self.base_url))
            .context("build admins endpoint")?;
        url.query_pairs_mut()
            .append_pair("select", "user_id")
            .append_pair("user_id", &format!("eq.{viewer_id}"));
        Ok(url)
    }
}

/// Shared client plus settings; hands out one provider per access token.
#[derive(Debug, Clone)]
pub struct HostedIdentity {
    client: reqwest::Client,
    config: Arc<HostedIdentityConfig>,
}

impl HostedIdentity {
    pub fn new(config: HostedIdentityConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("build identity http client")?;
        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    pub fn provider(&self, access_token: Option<&str>) -> HostedIdentityProvider {
        let (events, _) = broadcast::channel(1);
        HostedIdentityProvider {
            client: self.client.clone(),
            config: Arc::clone(&self.config),
            access_token: access_token.map(str::to_owned),
            events,
        }
    }
}

/// Identity of the viewer holding `access_token`, as seen by the hosted service.
///
/// The service offers no push channel to this process, so the change stream
/// stays silent for the provider's lifetime.
#[derive(Debug, Clone)]
pub struct HostedIdentityProvider {
    client: reqwest::Client,
    config: Arc<HostedIdentityConfig>,
    access_token: Option<String>,
    events: broadcast::Sender<IdentityEvent>,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

#[async_trait]
impl IdentityProvider for HostedIdentityProvider {
    async fn fetch_current_viewer(&self) -> anyhow::Result<Option<Viewer>> {
        let Some(token) = &self.access_token else {
            return Ok(None);
        };

        let endpoint = self.config.user_endpoint();
        let response = self
            .client
            .get(&endpoint)
            .header("apikey", &self.config.api_key)
            .bearer_auth(token)
            .send()
            .await
            .with_context(|| format!("GET {endpoint}"))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("identity service error ({status}): {body}");
        }

        let user: UserResponse = response.json().await.context("parse user response")?;
        Ok(Some(Viewer {
            id: user.id,
            email: user.email,
        }))
    }

    async fn fetch_is_privileged(&self, viewer: &Viewer) -> anyhow::Result<bool> {
        let Some(token) = &self.access_token else {
            return Ok(false);
        };

        let endpoint = self.config.admins_endpoint(&viewer.id)?;
        let response = self
            .client
            .get(endpoint.clone())
            .header("apikey", &self.config.api_key)
            .bearer_auth(token)
            .send()
            .await
            .with_context(|| format!("GET {endpoint}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("admins lookup failed ({status}): {body}");
        }

        let rows: Vec<serde_json::Value> =
            response.json().await.context("parse admins response")?;
        Ok(!rows.is_empty())
    }

    fn subscribe(&self) -> IdentitySubscription {
        IdentitySubscription::new(self.events.subscribe())
    }
}
