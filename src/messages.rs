use std::path::{Path, PathBuf};

use anyhow::Context as _;
use async_trait::async_trait;
use chrono::Utc;
use tokio::fs;
use tokio::sync::Mutex;

use crate::content::read_json;
use crate::formats::{Message, MessageStatus, NewMessage};

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn send(&self, message: NewMessage) -> anyhow::Result<Message>;
    /// Newest first.
    async fn list(&self) -> anyhow::Result<Vec<Message>>;
    async fn get(&self, id: &str) -> anyhow::Result<Option<Message>>;
    async fn update_status(
        &self,
        id: &str,
        status: MessageStatus,
    ) -> anyhow::Result<Option<Message>>;
    /// `false` when no message had that id.
    async fn delete(&self, id: &str) -> anyhow::Result<bool>;

    async fn mark_as_read(&self, id: &str) -> anyhow::Result<Option<Message>> {
        self.update_status(id, MessageStatus::Read).await
    }
}

/// Contact messages kept in `messages.json` under the data directory.
#[derive(Debug)]
pub struct LocalFsMessageStore {
    path: PathBuf,
    // Serialises read-modify-write cycles on the file.
    lock: Mutex<()>,
}

impl LocalFsMessageStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: base_dir.into().join("messages.json"),
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> anyhow::Result<Vec<Message>> {
        let messages = read_json(&self.path)
            .await
            .with_context(|| format!("read: {}", self.path.display()))?;
        Ok(messages.unwrap_or_default())
    }

    async fn save(&self, messages: &[Message]) -> anyhow::Result<()> {
        write_json_atomic(&self.path, &messages)
            .await
            .context("write messages.json")
    }
}

#[async_trait]
impl MessageStore for LocalFsMessageStore {
    async fn send(&self, message: NewMessage) -> anyhow::Result<Message> {
        let message = validate(message)?;
        let _guard = self.lock.lock().await;

        let mut messages = self.load().await?;
        let stored = Message {
            id: uuid::Uuid::new_v4().to_string(),
            name: message.name,
            email: message.email,
            subject: message.subject,
            message: message.message,
            status: MessageStatus::Unread,
            created_at: Utc::now(),
        };
        messages.push(stored.clone());
        self.save(&messages).await?;

        tracing::info!(message_id = %stored.id, "stored contact message");
        Ok(stored)
    }

    async fn list(&self) -> anyhow::Result<Vec<Message>> {
        let _guard = self.lock.lock().await;
        let mut messages = self.load().await?;
        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(messages)
    }

    async fn get(&self, id: &str) -> anyhow::Result<Option<Message>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.into_iter().find(|m| m.id == id))
    }

    async fn update_status(
        &self,
        id: &str,
        status: MessageStatus,
    ) -> anyhow::Result<Option<Message>> {
        let _guard = self.lock.lock().await;
        let mut messages = self.load().await?;
        let Some(message) = messages.iter_mut().find(|m| m.id == id) else {
            return Ok(None);
        };
        message.status = status;
        let updated = message.clone();
        self.save(&messages).await?;
        Ok(Some(updated))
    }

    async fn delete(&self, id: &str) -> anyhow::Result<bool> {
        let _guard = self.lock.lock().await;
        let mut messages = self.load().await?;
        let before = messages.len();
        messages.retain(|m| m.id != id);
        if messages.len() == before {
            return Ok(false);
        }
        self.save(&messages).await?;
        Ok(true)
    }
}

/// Trims every field and rejects messages the inbox could not act on.
pub fn validate(message: NewMessage) -> anyhow::Result<NewMessage> {
    let name = message.name.trim();
    let email = message.email.trim();
    let body = message.message.trim();
    if name.is_empty() {
        anyhow::bail!("name is required");
    }
    if body.is_empty() {
        anyhow::bail!("message is required");
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
        _ => anyhow::bail!("email is invalid: {email}"),
    }
    let subject = message
        .subject
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty());

    Ok(NewMessage {
        name: name.to_owned(),
        email: email.to_owned(),
        subject,
        message: body.to_owned(),
    })
}

async fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("path has no parent: {}", path.display()))?;
    fs::create_dir_all(parent)
        .await
        .with_context(|| format!("create parent dir: {}", parent.display()))?;

    let tmp_path = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));
    let data = serde_json::to_vec_pretty(value).context("serialize json")?;
    fs::write(&tmp_path, &data)
        .await
        .with_context(|| format!("write tmp: {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("rename tmp to final: {}", path.display()))?;
    Ok(())
}
