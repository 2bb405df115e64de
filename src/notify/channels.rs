//! Delivery transports for notifications.

use super::{Notification, Priority};
use anyhow::{Context, Result};
use async_trait::async_trait;
use console::style;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// A named transport a [`Notification`] can be delivered through.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &str;

    async fn deliver(&self, notification: &Notification) -> Result<()>;
}

/// Prints notifications to stderr with terminal styling.
#[derive(Debug, Default, Clone)]
pub struct ConsoleChannel;

impl ConsoleChannel {
    pub const NAME: &'static str = "console";
}

#[async_trait]
impl NotificationChannel for ConsoleChannel {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn deliver(&self, notification: &Notification) -> Result<()> {
        let marker = match notification.priority {
            Priority::High => style("!").red().bold(),
            Priority::Normal => style("*").cyan(),
            Priority::Low => style("-").dim(),
        };
        eprintln!(
            "{} {} {}",
            marker,
            style(&notification.subject).bold(),
            style(format!("-> {}", notification.recipient)).dim()
        );
        for line in notification.content.lines() {
            eprintln!("  {}", line);
        }
        Ok(())
    }
}

/// Appends one JSON line per notification to an outbox file.
#[derive(Debug, Clone)]
pub struct FileChannel {
    path: PathBuf,
}

impl FileChannel {
    pub const NAME: &'static str = "file";

    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl NotificationChannel for FileChannel {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn deliver(&self, notification: &Notification) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let mut line = serde_json::to_string(notification)
            .context("Failed to serialize notification")?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open outbox {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .await
            .with_context(|| format!("Failed to write outbox {}", self.path.display()))?;
        file.flush().await?;
        Ok(())
    }
}
