//! The staged review gate.
//!
//! A change set moves through a fixed state machine:
//!
//! ```text
//! Layer1Check --fail--> Blocked@layer1
//!     | pass
//! Layer2Check --fail--> Blocked@layer2
//!     | pass
//! HumanReviewRequested --> Approved | ChangesRequested
//! ```
//!
//! Layers are evaluated strictly in order and the first failure
//! short-circuits into a [`BlockReport`]. When both automated layers pass,
//! the [`RiskClassifier`] decides where the human reviewer should look, a
//! [`ReviewRequest`] is persisted and the reviewer is notified.
//!
//! Request ids are the only externally addressable identifiers. Every
//! id-addressed operation runs [`validate_request_id`] first.
//!
//! ## Example
//!
//! ```no_run
//! use review_gate::gate::{ChangeSetContext, GateOrchestrator, GateSettings, LayerResult};
//! use review_gate::notify::NotificationManager;
//! use review_gate::store::MemoryStore;
//! use std::sync::Arc;
//!
//! # async fn example() -> review_gate::errors::GateResult<()> {
//! let store = Arc::new(MemoryStore::new());
//! let notifier = NotificationManager::new(store.clone(), "team-lead");
//! let gate = GateOrchestrator::new(store, notifier, GateSettings::default());
//!
//! let passed = LayerResult { pass: true, results: vec![] };
//! let outcome = gate
//!     .orchestrate_review(
//!         &ChangeSetContext::new(vec!["src/auth/login.js".into()]),
//!         Some(&passed),
//!         Some(&passed),
//!     )
//!     .await?;
//! assert_eq!(outcome.status(), "pending_human_review");
//! # Ok(())
//! # }
//! ```

pub mod layers;
pub mod request;

pub use layers::{
    BlockReport, ChangeSetContext, CheckResult, FixCommands, FixRecommendation, GateLayer, Issue,
    IssueCounts, LayerCheck, LayerResult, LayerSummary, Severity, block, check_layer_passed,
    determine_severity, recommend_fix,
};
pub use request::{
    AutomatedSummary, EstimatePolicy, FocusAreas, ReviewDecision, ReviewRequest, ReviewResult,
    ReviewStatus, new_request_id, validate_request_id,
};

use crate::errors::{GateError, GateResult};
use crate::notify::{NotificationManager, SendReport};
use crate::risk::RiskClassifier;
use crate::store::{RecordStore, Records};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Store collection holding review requests.
pub const REVIEWS_COLLECTION: &str = "reviews";
/// Store collection holding one marker per pending review.
pub const PENDING_COLLECTION: &str = "pending";

/// Default hours before a review request expires.
pub const DEFAULT_EXPIRY_HOURS: i64 = 24;
/// Default hours before expiry at which reminders start.
pub const DEFAULT_REMINDER_WINDOW_HOURS: i64 = 4;

/// Entry in the pending set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PendingMarker {
    id: String,
    expires_at: DateTime<Utc>,
}

/// A change set awaiting human review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingReview {
    pub review_request: ReviewRequest,
    /// `None` when the notification could not be recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_id: Option<String>,
}

/// Result of running a change set through the gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GateOutcome {
    Blocked(BlockReport),
    PendingHumanReview(PendingReview),
}

impl GateOutcome {
    pub fn pass(&self) -> bool {
        matches!(self, Self::PendingHumanReview(_))
    }

    pub fn status(&self) -> &'static str {
        match self {
            Self::Blocked(_) => "blocked",
            Self::PendingHumanReview(_) => "pending_human_review",
        }
    }

    pub fn stopped_at(&self) -> Option<GateLayer> {
        match self {
            Self::Blocked(report) => Some(report.stopped_at),
            Self::PendingHumanReview(_) => None,
        }
    }

    pub fn review_request(&self) -> Option<&ReviewRequest> {
        match self {
            Self::Blocked(_) => None,
            Self::PendingHumanReview(pending) => Some(&pending.review_request),
        }
    }

    /// JSON form with a top-level `pass` flag next to `status`.
    pub fn to_json(&self) -> GateResult<Value> {
        let mut value = serde_json::to_value(self).map_err(|source| GateError::Serialization {
            what: "gate outcome".to_string(),
            source,
        })?;
        if let Value::Object(map) = &mut value {
            map.insert("pass".to_string(), Value::Bool(self.pass()));
        }
        Ok(value)
    }
}

/// Policy knobs for the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct GateSettings {
    pub reviewer: String,
    pub expiry: Duration,
    pub reminder_window: Duration,
    pub estimate: EstimatePolicy,
    pub fix_commands: FixCommands,
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            reviewer: "team-lead".to_string(),
            expiry: Duration::hours(DEFAULT_EXPIRY_HOURS),
            reminder_window: Duration::hours(DEFAULT_REMINDER_WINDOW_HOURS),
            estimate: EstimatePolicy::default(),
            fix_commands: FixCommands::default(),
        }
    }
}

impl GateSettings {
    pub fn with_reviewer(mut self, reviewer: impl Into<String>) -> Self {
        self.reviewer = reviewer.into();
        self
    }

    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.expiry = expiry;
        self
    }

    pub fn with_reminder_window(mut self, window: Duration) -> Self {
        self.reminder_window = window;
        self
    }

    pub fn with_estimate(mut self, estimate: EstimatePolicy) -> Self {
        self.estimate = estimate;
        self
    }
}

/// Drives change sets through the gate and manages their review requests.
pub struct GateOrchestrator {
    classifier: RiskClassifier,
    notifier: NotificationManager,
    requests: Records<ReviewRequest>,
    pending: Records<PendingMarker>,
    settings: GateSettings,
}

impl GateOrchestrator {
    pub fn new(
        store: Arc<dyn RecordStore>,
        notifier: NotificationManager,
        settings: GateSettings,
    ) -> Self {
        Self {
            classifier: RiskClassifier::default(),
            notifier,
            requests: Records::new(Arc::clone(&store), REVIEWS_COLLECTION),
            pending: Records::new(store, PENDING_COLLECTION),
            settings,
        }
    }

    pub fn with_classifier(mut self, classifier: RiskClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn settings(&self) -> &GateSettings {
        &self.settings
    }

    pub fn notifier(&self) -> &NotificationManager {
        &self.notifier
    }

    pub fn check_layer_passed(&self, result: Option<&LayerResult>, label: &str) -> LayerCheck {
        check_layer_passed(result, label)
    }

    /// Evaluate Layer1 then Layer2; request a human review when both pass.
    ///
    /// A missing layer result blocks at that layer. Notification failures are
    /// logged and do not change the outcome.
    pub async fn orchestrate_review(
        &self,
        context: &ChangeSetContext,
        layer1: Option<&LayerResult>,
        layer2: Option<&LayerResult>,
    ) -> GateResult<GateOutcome> {
        tracing::info!(files = context.changed_files.len(), "evaluating change set");

        let layer1_check = check_layer_passed(layer1, GateLayer::Layer1.label());
        if !layer1_check.pass {
            return Ok(self.blocked(&layer1_check, GateLayer::Layer1).await);
        }
        let layer2_check = check_layer_passed(layer2, GateLayer::Layer2.label());
        if !layer2_check.pass {
            return Ok(self.blocked(&layer2_check, GateLayer::Layer2).await);
        }

        let request = self.build_request(context, layer1, layer2)?;
        self.save_request(&request)?;
        tracing::info!(
            id = %request.id,
            priority = %request.priority,
            risk = %request.risk_level,
            "human review requested"
        );

        let notification_id = self
            .notify("review request", self.notifier.send_review_request(&request).await)
            .map(|report| report.notification_id);

        Ok(GateOutcome::PendingHumanReview(PendingReview {
            review_request: request,
            notification_id,
        }))
    }

    async fn blocked(&self, check: &LayerCheck, layer: GateLayer) -> GateOutcome {
        let report = block(check, layer, Utc::now(), &self.settings.fix_commands);
        tracing::warn!(stopped_at = %layer, reason = %report.reason, "change set blocked");
        self.notify(
            "blocking",
            self.notifier.send_blocking_notification(&report).await,
        );
        GateOutcome::Blocked(report)
    }

    fn notify(&self, what: &str, sent: GateResult<SendReport>) -> Option<SendReport> {
        match sent {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::warn!(error = %e, "failed to record {} notification", what);
                None
            }
        }
    }

    fn build_request(
        &self,
        context: &ChangeSetContext,
        layer1: Option<&LayerResult>,
        layer2: Option<&LayerResult>,
    ) -> GateResult<ReviewRequest> {
        let reviewer = self.settings.reviewer.trim();
        if reviewer.is_empty() {
            return Err(GateError::MissingReviewer);
        }

        let recommendation = self.classifier.recommend(context, layer2);
        let priority = self.classifier.calculate_priority(&recommendation);
        let estimated_time = self
            .settings
            .estimate
            .estimate(recommendation.primary.len(), recommendation.secondary.len());
        let created_at = Utc::now();

        Ok(ReviewRequest {
            id: new_request_id(),
            reviewer: reviewer.to_string(),
            focus_areas: FocusAreas {
                primary: recommendation.primary,
                secondary: recommendation.secondary,
            },
            skip_areas: recommendation.skip,
            automated_summary: AutomatedSummary {
                layer1: layer1.map(LayerResult::summary).unwrap_or_default(),
                layer2: layer2.map(LayerResult::summary).unwrap_or_default(),
            },
            estimated_time,
            priority,
            risk_level: recommendation.risk_level,
            summary: recommendation.summary,
            changed_files: context.changed_files.clone(),
            created_at,
            expires_at: created_at + self.settings.expiry,
            status: ReviewStatus::Pending,
            review_result: None,
            completed_at: None,
        })
    }

    /// Persist a new request; pending requests also join the pending set.
    pub fn save_request(&self, request: &ReviewRequest) -> GateResult<()> {
        validate_request_id(&request.id)?;
        self.requests.create(&request.id, request)?;
        if request.is_pending() {
            self.pending.create(
                &request.id,
                &PendingMarker {
                    id: request.id.clone(),
                    expires_at: request.expires_at,
                },
            )?;
        }
        Ok(())
    }

    pub fn load_request(&self, id: &str) -> GateResult<ReviewRequest> {
        validate_request_id(id)?;
        self.requests
            .read(id)?
            .ok_or_else(|| GateError::RequestNotFound { id: id.to_string() })
    }

    /// Record the human verdict on a pending request.
    pub async fn complete_review(
        &self,
        id: &str,
        result: ReviewResult,
    ) -> GateResult<ReviewRequest> {
        let mut request = self.load_request(id)?;
        if !request.is_pending() {
            return Err(GateError::RequestNotPending {
                id: id.to_string(),
                status: request.status.to_string(),
            });
        }

        let result = match result.reviewed_by {
            Some(_) => result,
            None => result.with_reviewer(request.reviewer.clone()),
        };
        request.status = result.decision.status();
        request.review_result = Some(result);
        request.completed_at = Some(Utc::now());

        self.requests.update(id, &request)?;
        self.pending.delete(id)?;
        tracing::info!(id = %id, status = %request.status, "review completed");

        self.notify(
            "completion",
            self.notifier.send_completion_notification(&request).await,
        );
        Ok(request)
    }

    /// Every request still in the pending set, oldest first.
    pub fn pending_requests(&self) -> GateResult<Vec<ReviewRequest>> {
        let mut requests = Vec::new();
        for id in self.pending.ids()? {
            match self.requests.read(&id)? {
                Some(request) if request.is_pending() => requests.push(request),
                Some(_) | None => {
                    tracing::warn!(id = %id, "dropping stale pending marker");
                    self.pending.delete(&id)?;
                }
            }
        }
        requests.sort_by_key(|r| r.created_at);
        Ok(requests)
    }

    /// Remind reviewers of pending requests expiring within the reminder
    /// window, or already expired.
    pub async fn send_reminders(&self, now: DateTime<Utc>) -> GateResult<Vec<SendReport>> {
        let mut sent = Vec::new();
        for request in self.pending_requests()? {
            if request.expires_at - now > self.settings.reminder_window {
                continue;
            }
            if let Some(report) = self.notify(
                "reminder",
                self.notifier.send_reminder(&request, now).await,
            ) {
                sent.push(report);
            }
        }
        Ok(sent)
    }
}
