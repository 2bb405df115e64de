//! Notification fan-out to reviewers.
//!
//! Every notification is built from a template (subject pattern and
//! priority) plus formatted content, delivered on each enabled channel
//! concurrently, and then recorded in the store together with the
//! per-channel outcomes. A failing or unknown channel never prevents delivery
//! on the others.
//!
//! ## Usage
//!
//! ```no_run
//! use review_gate::notify::{ConsoleChannel, NotificationManager};
//! use review_gate::store::MemoryStore;
//! use std::sync::Arc;
//!
//! # use review_gate::{errors::GateResult, gate::ReviewRequest};
//! # async fn example(request: ReviewRequest) -> GateResult<()> {
//! let manager = NotificationManager::new(Arc::new(MemoryStore::new()), "team-lead")
//!     .with_channel(ConsoleChannel)
//!     .with_enabled(["console"]);
//!
//! let report = manager.send_review_request(&request).await?;
//! println!("sent {} (any delivered: {})", report.notification_id, report.success);
//! # Ok(())
//! # }
//! ```

pub mod channels;
pub mod format;
pub mod templates;

pub use channels::{ConsoleChannel, FileChannel, NotificationChannel};

use crate::errors::GateResult;
use crate::gate::{BlockReport, ReviewRequest};
use crate::store::{RecordStore, Records};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use templates::{priority_for_review, template_for};
use uuid::Uuid;

/// Store collection holding delivered notifications.
pub const NOTIFICATIONS_COLLECTION: &str = "notifications";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ReviewRequest,
    Blocking,
    Completion,
    Reminder,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ReviewRequest => "review_request",
            Self::Blocking => "blocking",
            Self::Completion => "completion",
            Self::Reminder => "reminder",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

/// Delivery outcome on one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChannelOutcome {
    pub fn delivered() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

pub type ChannelResults = BTreeMap<String, ChannelOutcome>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub kind: NotificationKind,
    pub subject: String,
    pub recipient: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default)]
    pub delivery: ChannelResults,
}

impl Notification {
    pub fn new(
        kind: NotificationKind,
        subject: impl Into<String>,
        recipient: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: format!("notif-{}", Uuid::new_v4().simple()),
            kind,
            subject: subject.into(),
            recipient: recipient.into(),
            content: content.into(),
            timestamp: Utc::now(),
            priority: template_for(kind).priority,
            request_id: None,
            delivery: ChannelResults::new(),
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }
}

/// Result of one send operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendReport {
    /// True when at least one channel delivered.
    pub success: bool,
    pub notification_id: String,
    pub results: ChannelResults,
}

/// Builds, delivers and records notifications.
pub struct NotificationManager {
    channels: HashMap<String, Arc<dyn NotificationChannel>>,
    enabled: Vec<String>,
    recipient: String,
    records: Records<Notification>,
}

impl NotificationManager {
    pub fn new(store: Arc<dyn RecordStore>, recipient: impl Into<String>) -> Self {
        Self {
            channels: HashMap::new(),
            enabled: Vec::new(),
            recipient: recipient.into(),
            records: Records::new(store, NOTIFICATIONS_COLLECTION),
        }
    }

    /// Register a transport under its own name.
    pub fn with_channel(mut self, channel: impl NotificationChannel + 'static) -> Self {
        self.channels
            .insert(channel.name().to_string(), Arc::new(channel));
        self
    }

    /// Channel names to deliver on, in order. Names without a registered
    /// transport are reported as unknown at send time.
    pub fn with_enabled<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enabled = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn enabled_channels(&self) -> &[String] {
        &self.enabled
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    pub fn load(&self, id: &str) -> GateResult<Option<Notification>> {
        self.records.read(id)
    }

    pub fn notification_ids(&self) -> GateResult<Vec<String>> {
        self.records.ids()
    }

    /// Attempt delivery on every enabled channel and collect the outcomes.
    pub async fn send_through_channels(&self, notification: &Notification) -> ChannelResults {
        let attempts = self.enabled.iter().map(|name| async move {
            let outcome = match self.channels.get(name) {
                None => ChannelOutcome::failed("Unknown channel"),
                Some(channel) => match channel.deliver(notification).await {
                    Ok(()) => ChannelOutcome::delivered(),
                    Err(e) => ChannelOutcome::failed(format!("{:#}", e)),
                },
            };
            tracing::debug!(
                channel = %name,
                notification = %notification.id,
                success = outcome.success,
                "notification delivery attempted"
            );
            (name.clone(), outcome)
        });
        join_all(attempts).await.into_iter().collect()
    }

    async fn dispatch(&self, mut notification: Notification) -> GateResult<SendReport> {
        let results = self.send_through_channels(&notification).await;
        notification.delivery = results.clone();
        self.records.create(&notification.id, &notification)?;

        let success = results.values().any(|o| o.success);
        if !success {
            tracing::warn!(
                notification = %notification.id,
                kind = %notification.kind,
                "notification was not delivered on any channel"
            );
        }
        Ok(SendReport {
            success,
            notification_id: notification.id,
            results,
        })
    }

    pub async fn send_review_request(&self, request: &ReviewRequest) -> GateResult<SendReport> {
        let template = template_for(NotificationKind::ReviewRequest);
        let detail = format!("{} {} risk", request.priority, request.risk_level);
        let notification = Notification::new(
            NotificationKind::ReviewRequest,
            template.render_subject(&request.id, &detail),
            &request.reviewer,
            format::review_request_content(request),
        )
        .with_priority(priority_for_review(template.priority, request.priority))
        .with_request_id(&request.id);
        self.dispatch(notification).await
    }

    pub async fn send_blocking_notification(&self, report: &BlockReport) -> GateResult<SendReport> {
        let template = template_for(NotificationKind::Blocking);
        let notification = Notification::new(
            NotificationKind::Blocking,
            template.render_subject("", report.stopped_at.label()),
            &self.recipient,
            format::blocking_content(report),
        );
        self.dispatch(notification).await
    }

    pub async fn send_completion_notification(
        &self,
        request: &ReviewRequest,
    ) -> GateResult<SendReport> {
        let template = template_for(NotificationKind::Completion);
        let notification = Notification::new(
            NotificationKind::Completion,
            template.render_subject(&request.id, &request.status.to_string()),
            &self.recipient,
            format::completion_content(request),
        )
        .with_request_id(&request.id);
        self.dispatch(notification).await
    }

    pub async fn send_reminder(
        &self,
        request: &ReviewRequest,
        now: DateTime<Utc>,
    ) -> GateResult<SendReport> {
        let template = template_for(NotificationKind::Reminder);
        let expires = request.expires_at.format("%Y-%m-%d %H:%M UTC").to_string();
        let notification = Notification::new(
            NotificationKind::Reminder,
            template.render_subject(&request.id, &expires),
            &request.reviewer,
            format::reminder_content(request, now),
        )
        .with_priority(priority_for_review(template.priority, request.priority))
        .with_request_id(&request.id);
        self.dispatch(notification).await
    }
}
