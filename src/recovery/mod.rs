//! Retry-versus-escalate decisions for failed stages.
//!
//! A failed stage is retried with the same approach while it has attempts
//! left. Once `attempts >= max_retries` the failure is handed to a human: an
//! escalation report is written capturing the stage, the error and every
//! attempt, and its path is returned with the decision.
//!
//! [`RetryingExecutor`] drives the loop and guards it with a circuit breaker
//! keyed by stage id, so a systematically failing dependency escalates as soon
//! as its breaker opens rather than after the attempt budget runs out.
//!
//! ## Example
//!
//! ```no_run
//! use review_gate::recovery::{RecoveryRequest, RecoveryStage, RecoveryStrategy};
//!
//! # async fn example() -> review_gate::errors::GateResult<()> {
//! let recovery = RecoveryStage::new(".gate/escalations");
//! let decision = recovery
//!     .decide(&RecoveryRequest::new("layer1-checks", "lint crashed", 1))
//!     .await?;
//! assert_eq!(decision.strategy, RecoveryStrategy::RetrySameApproach);
//! # Ok(())
//! # }
//! ```

pub mod runner;

pub use runner::{RetryOutcome, RetryingExecutor};

use crate::errors::{GateError, GateResult};
use crate::stage::{ExecutionStage, StageContext, StageRecorder, StageResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Attempts allowed before a failing stage is escalated.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecoveryStrategy {
    RetrySameApproach,
    EscalateToHuman,
}

impl fmt::Display for RecoveryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RetrySameApproach => write!(f, "RETRY_SAME_APPROACH"),
            Self::EscalateToHuman => write!(f, "ESCALATE_TO_HUMAN"),
        }
    }
}

/// One failed attempt at running a stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    pub attempt: u32,
    pub error: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub duration_ms: u64,
}

/// Input to a recovery decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryRequest {
    pub failed_stage_id: String,
    pub error: String,
    pub attempts: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub history: Vec<AttemptRecord>,
}

impl RecoveryRequest {
    pub fn new(failed_stage_id: &str, error: &str, attempts: u32) -> Self {
        Self {
            failed_stage_id: failed_stage_id.to_string(),
            error: error.to_string(),
            attempts,
            max_retries: DEFAULT_MAX_RETRIES,
            history: Vec::new(),
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_history(mut self, history: Vec<AttemptRecord>) -> Self {
        self.history = history;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryDecision {
    pub strategy: RecoveryStrategy,
    pub should_retry: bool,
    pub escalated: bool,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_path: Option<PathBuf>,
}

impl RecoveryDecision {
    fn retry(reason: String) -> Self {
        Self {
            strategy: RecoveryStrategy::RetrySameApproach,
            should_retry: true,
            escalated: false,
            reason,
            report_path: None,
        }
    }

    fn escalate(reason: String, report_path: PathBuf) -> Self {
        Self {
            strategy: RecoveryStrategy::EscalateToHuman,
            should_retry: false,
            escalated: true,
            reason,
            report_path: Some(report_path),
        }
    }
}

/// Persisted record handed to a human after retries are exhausted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscalationReport {
    pub failed_stage_id: String,
    pub error: String,
    pub attempts: u32,
    pub max_retries: u32,
    pub reason: String,
    pub history: Vec<AttemptRecord>,
    pub created_at: DateTime<Utc>,
    pub next_steps: Vec<String>,
}

/// Decides how to handle a failed stage and writes escalation reports.
#[derive(Debug, Clone)]
pub struct RecoveryStage {
    escalation_dir: PathBuf,
    max_retries: u32,
}

impl RecoveryStage {
    pub const STAGE_ID: &'static str = "recovery";

    pub fn new(escalation_dir: impl AsRef<Path>) -> Self {
        Self {
            escalation_dir: escalation_dir.as_ref().to_path_buf(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Default retry budget for requests built from stage context.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn escalation_dir(&self) -> &Path {
        &self.escalation_dir
    }

    pub async fn decide(&self, request: &RecoveryRequest) -> GateResult<RecoveryDecision> {
        if request.attempts < request.max_retries {
            tracing::info!(
                stage = %request.failed_stage_id,
                attempt = request.attempts,
                max_retries = request.max_retries,
                "retrying failed stage"
            );
            return Ok(RecoveryDecision::retry(format!(
                "Attempt {} of {} failed; retrying",
                request.attempts, request.max_retries
            )));
        }

        self.escalate(
            request,
            &format!("Retries exhausted after {} attempt(s)", request.attempts),
        )
        .await
    }

    /// Escalate regardless of the attempt counter.
    pub async fn escalate(
        &self,
        request: &RecoveryRequest,
        reason: &str,
    ) -> GateResult<RecoveryDecision> {
        let report = EscalationReport {
            failed_stage_id: request.failed_stage_id.clone(),
            error: request.error.clone(),
            attempts: request.attempts,
            max_retries: request.max_retries,
            reason: reason.to_string(),
            history: request.history.clone(),
            created_at: Utc::now(),
            next_steps: vec![
                format!("Inspect the failing stage '{}'", request.failed_stage_id),
                "Fix the underlying cause or re-run the stage manually".to_string(),
                "Reset the stage's circuit breaker once the dependency is healthy".to_string(),
            ],
        };
        let path = self.write_report(&report).await?;
        tracing::warn!(
            stage = %request.failed_stage_id,
            report = %path.display(),
            "escalating failed stage to human"
        );
        Ok(RecoveryDecision::escalate(reason.to_string(), path))
    }

    async fn write_report(&self, report: &EscalationReport) -> GateResult<PathBuf> {
        tokio::fs::create_dir_all(&self.escalation_dir)
            .await
            .map_err(|source| GateError::Storage {
                path: self.escalation_dir.clone(),
                source,
            })?;

        // Stage ids never reach the path; the file name is generated.
        let filename = format!(
            "escalation-{}-{}.json",
            report.created_at.format("%Y%m%dT%H%M%S"),
            &Uuid::new_v4().simple().to_string()[..8]
        );
        let path = self.escalation_dir.join(filename);
        let json =
            serde_json::to_string_pretty(report).map_err(|source| GateError::Serialization {
                what: "escalation report".to_string(),
                source,
            })?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|source| GateError::Storage {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }

    /// Load a previously written escalation report.
    pub fn load_report(path: &Path) -> GateResult<EscalationReport> {
        let content = fs::read_to_string(path).map_err(|source| GateError::Storage {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| GateError::Serialization {
            what: "escalation report".to_string(),
            source,
        })
    }
}

#[async_trait]
impl ExecutionStage for RecoveryStage {
    fn stage_id(&self) -> &str {
        Self::STAGE_ID
    }

    fn required_fields(&self) -> &[&'static str] {
        &["failedStageId", "error", "attempts"]
    }

    async fn execute(&self, context: &StageContext) -> GateResult<StageResult> {
        let mut recorder = StageRecorder::new(Self::STAGE_ID);
        if !recorder.require_fields(context, self.required_fields()) {
            return Ok(recorder.finish(false));
        }

        let Some(attempts) = context.get_u32("attempts") else {
            recorder.fail("Context field 'attempts' must be a non-negative integer");
            return Ok(recorder.finish(false));
        };
        let failed_stage_id = context.get_str("failedStageId").unwrap_or_default();
        let error = context
            .get("error")
            .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
            .unwrap_or_default();
        let max_retries = context.get_u32("maxRetries").unwrap_or(self.max_retries);

        let request = RecoveryRequest::new(failed_stage_id, &error, attempts)
            .with_max_retries(max_retries);
        let decision = match self.decide(&request).await {
            Ok(decision) => decision,
            Err(e) => {
                recorder.fail(format!("Failed to record recovery decision: {}", e));
                return Ok(recorder.finish(false));
            }
        };

        recorder.info(format!("{}: {}", decision.strategy, decision.reason));
        if let Some(path) = &decision.report_path {
            recorder.artifact(
                "escalation-report",
                path.display().to_string(),
                serde_json::json!({ "failedStageId": failed_stage_id, "attempts": attempts }),
            );
        }
        recorder.artifact(
            "recovery-decision",
            format!("recovery/{}", failed_stage_id),
            serde_json::to_value(&decision).unwrap_or_default(),
        );
        Ok(recorder.finish(true))
    }
}
