//! Standardized pipeline-stage contract.
//!
//! Every stage implements [`ExecutionStage`] and reports through the same
//! [`StageResult`] shape, so callers never special-case a stage by identity.
//! A [`StageRecorder`] collects artifacts, leveled logs and errors while a
//! stage runs and finalizes them into an immutable result with timing.
//!
//! Stages are looked up by id through an explicitly constructed
//! [`StageRegistry`]; there is no process-wide registry.
//!
//! ## Example
//!
//! ```
//! use review_gate::stage::{StageContext, StageRecorder};
//!
//! let context = StageContext::new().with("changeSet", serde_json::json!({"files": 2}));
//! assert!(context.missing_fields(&["changeSet", "reviewer"]) == vec!["reviewer".to_string()]);
//!
//! let mut recorder = StageRecorder::new("layer1-checks");
//! recorder.info("running lint");
//! let result = recorder.finish(true);
//! assert!(result.success);
//! assert_eq!(result.logs.len(), 1);
//! ```

pub mod layer_check;
pub mod registry;

pub use layer_check::LayerCheckStage;
pub use registry::{StageConstructor, StageRegistry};

use crate::errors::{GateError, GateResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Lifecycle status of a stage run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageStatus {
    #[default]
    Pending,
    Running,
    Success,
    Failed,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
        };
        write!(f, "{}", s)
    }
}

/// Severity of a stage log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// A file or record produced by a stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    #[serde(rename = "type")]
    pub artifact_type: String,
    pub path: String,
    #[serde(default)]
    pub metadata: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub message: String,
    pub level: LogLevel,
    pub timestamp: DateTime<Utc>,
}

/// Outcome of one stage run. Built only by [`StageRecorder::finish`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageResult {
    pub stage_id: String,
    pub status: StageStatus,
    pub success: bool,
    pub artifacts: Vec<Artifact>,
    pub errors: Vec<String>,
    pub logs: Vec<LogEntry>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Human readable duration, e.g. `"2.5s"`.
    pub duration: String,
    pub duration_ms: u64,
}

impl StageResult {
    /// First recorded error, if any.
    pub fn first_error(&self) -> Option<&str> {
        self.errors.first().map(String::as_str)
    }

    pub fn artifacts_of_type<'a>(
        &'a self,
        artifact_type: &'a str,
    ) -> impl Iterator<Item = &'a Artifact> {
        self.artifacts
            .iter()
            .filter(move |a| a.artifact_type == artifact_type)
    }
}

/// Accumulates the side effects of a running stage.
#[derive(Debug)]
pub struct StageRecorder {
    stage_id: String,
    start_time: DateTime<Utc>,
    advisory_timeout: Option<Duration>,
    artifacts: Vec<Artifact>,
    errors: Vec<String>,
    logs: Vec<LogEntry>,
}

impl StageRecorder {
    pub fn new(stage_id: impl Into<String>) -> Self {
        Self {
            stage_id: stage_id.into(),
            start_time: Utc::now(),
            advisory_timeout: None,
            artifacts: Vec::new(),
            errors: Vec::new(),
            logs: Vec::new(),
        }
    }

    /// Set a soft deadline. Overrunning it only produces a warning.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.advisory_timeout = Some(timeout);
        self
    }

    pub fn stage_id(&self) -> &str {
        &self.stage_id
    }

    pub fn artifact(
        &mut self,
        artifact_type: impl Into<String>,
        path: impl Into<String>,
        metadata: Value,
    ) {
        self.artifacts.push(Artifact {
            artifact_type: artifact_type.into(),
            path: path.into(),
            metadata,
        });
    }

    pub fn log(&mut self, level: LogLevel, message: impl Into<String>) {
        self.logs.push(LogEntry {
            message: message.into(),
            level,
            timestamp: Utc::now(),
        });
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    /// Record an error both in the error list and the log.
    pub fn fail(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.error(message.clone());
        self.errors.push(message);
    }

    /// Check required context fields, recording a failure when any is missing.
    ///
    /// Returns `true` when all fields are present.
    pub fn require_fields(&mut self, context: &StageContext, fields: &[&str]) -> bool {
        let missing = context.missing_fields(fields);
        if missing.is_empty() {
            return true;
        }
        self.fail(format!(
            "Missing required context fields: {}",
            missing.join(", ")
        ));
        false
    }

    /// Finalize into an immutable result.
    pub fn finish(mut self, success: bool) -> StageResult {
        let end_time = Utc::now();
        let duration_ms =
            u64::try_from((end_time - self.start_time).num_milliseconds()).unwrap_or(0);

        if let Some(timeout) = self.advisory_timeout {
            let budget_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
            if duration_ms > budget_ms {
                tracing::warn!(
                    stage = %self.stage_id,
                    elapsed_ms = duration_ms,
                    budget_ms,
                    "stage exceeded advisory timeout"
                );
                self.warn(format!(
                    "Stage exceeded advisory timeout of {} (took {})",
                    format_duration(budget_ms),
                    format_duration(duration_ms)
                ));
            }
        }

        let success = success && self.errors.is_empty();
        StageResult {
            stage_id: self.stage_id,
            status: if success {
                StageStatus::Success
            } else {
                StageStatus::Failed
            },
            success,
            artifacts: self.artifacts,
            errors: self.errors,
            logs: self.logs,
            start_time: self.start_time,
            end_time,
            duration: format_duration(duration_ms),
            duration_ms,
        }
    }
}

/// Format milliseconds for humans: `350ms`, `2.5s`, `1m 5s`, `1h 2m`.
pub fn format_duration(ms: u64) -> String {
    if ms < 1_000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1_000.0)
    } else if ms < 3_600_000 {
        format!("{}m {}s", ms / 60_000, (ms % 60_000) / 1_000)
    } else {
        format!("{}h {}m", ms / 3_600_000, (ms % 3_600_000) / 60_000)
    }
}

/// Keyed input handed to a stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageContext {
    fields: Map<String, Value>,
}

impl StageContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.fields.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key).filter(|v| !v.is_null())
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_u32(&self, key: &str) -> Option<u32> {
        self.get(key)
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
    }

    /// Names of `required` fields that are absent or null, in input order.
    pub fn missing_fields(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|field| self.get(field).is_none())
            .map(|field| field.to_string())
            .collect()
    }
}

/// Shared settings handed to stage constructors by the registry.
#[derive(Debug, Clone)]
pub struct OrchestratorContext {
    /// Root of the gate's state directory (normally `.gate`).
    pub gate_dir: PathBuf,
    pub max_retries: u32,
    pub stage_timeout: Duration,
}

impl OrchestratorContext {
    pub fn new(gate_dir: impl Into<PathBuf>) -> Self {
        Self {
            gate_dir: gate_dir.into(),
            max_retries: crate::recovery::DEFAULT_MAX_RETRIES,
            stage_timeout: Duration::from_secs(300),
        }
    }

    pub fn escalation_dir(&self) -> PathBuf {
        self.gate_dir.join("escalations")
    }
}

/// Contract implemented by every pipeline stage.
///
/// `execute` has a default body that fails with
/// [`GateError::UnimplementedStage`]: a stage registered without overriding
/// it is a defect and surfaces immediately.
#[async_trait]
pub trait ExecutionStage: Send + Sync {
    fn stage_id(&self) -> &str;

    /// Context fields the stage cannot run without.
    fn required_fields(&self) -> &[&'static str] {
        &[]
    }

    async fn execute(&self, _context: &StageContext) -> GateResult<StageResult> {
        Err(GateError::UnimplementedStage {
            stage_id: self.stage_id().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Placeholder;

    #[async_trait]
    impl ExecutionStage for Placeholder {
        fn stage_id(&self) -> &str {
            "placeholder"
        }
    }

    #[tokio::test]
    async fn base_execute_fails_loud() {
        let err = Placeholder.execute(&StageContext::new()).await.unwrap_err();
        match err {
            GateError::UnimplementedStage { stage_id } => assert_eq!(stage_id, "placeholder"),
            other => panic!("Expected UnimplementedStage, got {other:?}"),
        }
    }

    #[test]
    fn format_duration_ranges() {
        assert_eq!(format_duration(0), "0ms");
        assert_eq!(format_duration(350), "350ms");
        assert_eq!(format_duration(2_500), "2.5s");
        assert_eq!(format_duration(65_000), "1m 5s");
        assert_eq!(format_duration(3_720_000), "1h 2m");
    }

    #[test]
    fn recorder_keeps_order_of_artifacts_and_logs() {
        let mut recorder = StageRecorder::new("s");
        recorder.artifact("report", "a.json", json!({}));
        recorder.artifact("report", "b.json", json!({"n": 1}));
        recorder.info("first");
        recorder.warn("second");
        let result = recorder.finish(true);

        assert_eq!(result.status, StageStatus::Success);
        let paths: Vec<_> = result.artifacts.iter().map(|a| a.path.as_str()).collect();
        assert_eq!(paths, vec!["a.json", "b.json"]);
        assert_eq!(result.logs[0].level, LogLevel::Info);
        assert_eq!(result.logs[1].level, LogLevel::Warn);
        assert!(result.end_time >= result.start_time);
    }

    #[test]
    fn recorded_error_forces_failure() {
        let mut recorder = StageRecorder::new("s");
        recorder.fail("bad input");
        let result = recorder.finish(true);
        assert!(!result.success);
        assert_eq!(result.status, StageStatus::Failed);
        assert_eq!(result.first_error(), Some("bad input"));
        assert_eq!(result.logs[0].level, LogLevel::Error);
    }

    #[test]
    fn require_fields_reports_missing_names() {
        let context = StageContext::new().with("a", json!(1)).with("b", Value::Null);
        let mut recorder = StageRecorder::new("s");
        assert!(!recorder.require_fields(&context, &["a", "b", "c"]));
        let result = recorder.finish(true);
        assert_eq!(
            result.first_error(),
            Some("Missing required context fields: b, c")
        );
    }

    #[test]
    fn advisory_timeout_only_warns() {
        let mut recorder = StageRecorder::new("slow").with_timeout(Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(20));
        recorder.info("done");
        let result = recorder.finish(true);
        assert!(result.success);
        assert!(
            result
                .logs
                .iter()
                .any(|l| l.level == LogLevel::Warn && l.message.contains("advisory timeout"))
        );
    }

    #[test]
    fn stage_result_serializes_camel_case() {
        let result = StageRecorder::new("s").finish(true);
        let value = serde_json::to_value(&result).unwrap();
        assert!(value.get("stageId").is_some());
        assert!(value.get("durationMs").is_some());
        assert_eq!(value["status"], "SUCCESS");
    }

    #[test]
    fn context_typed_getters() {
        let context = StageContext::new()
            .with("attempts", json!(2))
            .with("error", json!("timeout"));
        assert_eq!(context.get_u32("attempts"), Some(2));
        assert_eq!(context.get_str("error"), Some("timeout"));
        assert_eq!(context.get_str("attempts"), None);
    }
}
