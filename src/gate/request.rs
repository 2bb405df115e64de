//! Human review requests and their id rules.

use crate::errors::{GateError, GateResult};
use crate::risk::{FocusArea, ReviewPriority, RiskLevel};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;
use uuid::Uuid;

use super::LayerSummary;

static REQUEST_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.-]+$").unwrap());

/// Accept ids made only of `[A-Za-z0-9_.-]`; reject everything else.
///
/// Ids are never sanitized. Anything outside the allow-list is refused before
/// it reaches a storage key.
pub fn validate_request_id(id: &str) -> GateResult<()> {
    if REQUEST_ID_REGEX.is_match(id) {
        Ok(())
    } else {
        Err(GateError::InvalidRequestId { id: id.to_string() })
    }
}

pub fn new_request_id() -> String {
    format!("hr-{}", Uuid::new_v4().simple())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    #[default]
    Pending,
    Approved,
    ChangesRequested,
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Approved => write!(f, "approved"),
            Self::ChangesRequested => write!(f, "changes_requested"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    RequestChanges,
}

impl ReviewDecision {
    pub fn status(&self) -> ReviewStatus {
        match self {
            Self::Approve => ReviewStatus::Approved,
            Self::RequestChanges => ReviewStatus::ChangesRequested,
        }
    }
}

/// The human reviewer's verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResult {
    pub decision: ReviewDecision,
    #[serde(default)]
    pub comments: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<String>,
}

impl ReviewResult {
    pub fn approve() -> Self {
        Self {
            decision: ReviewDecision::Approve,
            comments: String::new(),
            reviewed_by: None,
        }
    }

    pub fn request_changes(comments: impl Into<String>) -> Self {
        Self {
            decision: ReviewDecision::RequestChanges,
            comments: comments.into(),
            reviewed_by: None,
        }
    }

    pub fn with_comments(mut self, comments: impl Into<String>) -> Self {
        self.comments = comments.into();
        self
    }

    pub fn with_reviewer(mut self, reviewer: impl Into<String>) -> Self {
        self.reviewed_by = Some(reviewer.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusAreas {
    pub primary: Vec<FocusArea>,
    pub secondary: Vec<FocusArea>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomatedSummary {
    pub layer1: LayerSummary,
    pub layer2: LayerSummary,
}

/// A change set that passed both automated layers and awaits a human.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    pub id: String,
    pub reviewer: String,
    pub focus_areas: FocusAreas,
    pub skip_areas: Vec<String>,
    pub automated_summary: AutomatedSummary,
    /// Minutes.
    pub estimated_time: f64,
    pub priority: ReviewPriority,
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub changed_files: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub status: ReviewStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_result: Option<ReviewResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ReviewRequest {
    pub fn is_pending(&self) -> bool {
        self.status == ReviewStatus::Pending
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Reviewer time estimate: a base plus a per-area cost.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EstimatePolicy {
    #[serde(default = "default_base_minutes")]
    pub base_minutes: f64,
    #[serde(default = "default_per_primary_minutes")]
    pub per_primary_minutes: f64,
    #[serde(default = "default_per_secondary_minutes")]
    pub per_secondary_minutes: f64,
}

fn default_base_minutes() -> f64 {
    10.0
}

fn default_per_primary_minutes() -> f64 {
    5.0
}

fn default_per_secondary_minutes() -> f64 {
    2.5
}

impl Default for EstimatePolicy {
    fn default() -> Self {
        Self {
            base_minutes: default_base_minutes(),
            per_primary_minutes: default_per_primary_minutes(),
            per_secondary_minutes: default_per_secondary_minutes(),
        }
    }
}

impl EstimatePolicy {
    pub fn estimate(&self, primary: usize, secondary: usize) -> f64 {
        self.base_minutes
            + self.per_primary_minutes * primary as f64
            + self.per_secondary_minutes * secondary as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_allow_listed_ids() {
        for id in ["hr-1234", "abc_DEF.9", "a", "v1.2-rc"] {
            assert!(validate_request_id(id).is_ok(), "{id}");
        }
    }

    #[test]
    fn rejects_everything_else() {
        for id in ["", "../etc/passwd", "a/b", "a\\b", "<script>", "a;rm", "`id`", "a b", "$(x)"] {
            let err = validate_request_id(id).unwrap_err();
            assert!(err.to_string().starts_with("Invalid request ID"), "{id}");
        }
    }

    #[test]
    fn generated_ids_are_valid_and_unique() {
        let a = new_request_id();
        let b = new_request_id();
        assert!(a.starts_with("hr-"));
        assert_ne!(a, b);
        assert!(validate_request_id(&a).is_ok());
    }

    #[test]
    fn default_estimate() {
        let policy = EstimatePolicy::default();
        assert_eq!(policy.estimate(0, 0), 10.0);
        assert_eq!(policy.estimate(3, 2), 30.0);
        assert_eq!(policy.estimate(1, 1), 17.5);
    }

    #[test]
    fn decision_maps_to_status() {
        assert_eq!(ReviewDecision::Approve.status(), ReviewStatus::Approved);
        assert_eq!(
            ReviewDecision::RequestChanges.status(),
            ReviewStatus::ChangesRequested
        );
        assert_eq!(ReviewStatus::ChangesRequested.to_string(), "changes_requested");
    }
}
