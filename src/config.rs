//! Configuration for the review gate, read from `.gate/gate.toml`.
//!
//! Settings are layered: file, then environment, then CLI. Every section and
//! field is optional; anything missing falls back to the defaults below.
//!
//! # Configuration File Format
//!
//! ```toml
//! [review]
//! reviewer = "team-lead"
//! expiry_hours = 24
//! reminder_window_hours = 4
//!
//! [estimate]
//! base_minutes = 10.0
//! per_primary_minutes = 5.0
//! per_secondary_minutes = 2.5
//!
//! [risk]
//! code_quality_threshold = 5
//!
//! [breaker]
//! failure_threshold = 5
//! success_threshold = 3
//! reset_timeout_ms = 60000
//!
//! [recovery]
//! max_retries = 3
//! stage_timeout_secs = 300
//!
//! [notifications]
//! channels = ["console", "file"]
//! recipient = "team-lead"
//!
//! [fix]
//! lint_fix = "npm run lint -- --fix"
//! test = "npm test"
//! ```
//!
//! `REVIEW_GATE_REVIEWER` overrides the reviewer and `REVIEW_GATE_CHANNELS`
//! (comma-separated) overrides the channel list.

use crate::circuit::{CircuitBreakerConfig, CircuitBreakerRegistry};
use crate::gate::{EstimatePolicy, FixCommands, GateOrchestrator, GateSettings};
use crate::notify::{ConsoleChannel, FileChannel, NotificationManager};
use crate::recovery::{DEFAULT_MAX_RETRIES, RecoveryStage, RetryingExecutor};
use crate::risk::{DEFAULT_CODE_QUALITY_THRESHOLD, RiskClassifier};
use crate::stage::OrchestratorContext;
use crate::store::{FileStore, RecordStore};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Name of the state directory inside a project.
pub const GATE_DIR: &str = ".gate";
/// Name of the config file inside the state directory.
pub const CONFIG_FILE: &str = "gate.toml";

pub const REVIEWER_ENV: &str = "REVIEW_GATE_REVIEWER";
pub const CHANNELS_ENV: &str = "REVIEW_GATE_CHANNELS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewSection {
    #[serde(default = "default_reviewer")]
    pub reviewer: String,
    #[serde(default = "default_expiry_hours")]
    pub expiry_hours: i64,
    #[serde(default = "default_reminder_window_hours")]
    pub reminder_window_hours: i64,
}

fn default_reviewer() -> String {
    "team-lead".to_string()
}

fn default_expiry_hours() -> i64 {
    crate::gate::DEFAULT_EXPIRY_HOURS
}

fn default_reminder_window_hours() -> i64 {
    crate::gate::DEFAULT_REMINDER_WINDOW_HOURS
}

impl Default for ReviewSection {
    fn default() -> Self {
        Self {
            reviewer: default_reviewer(),
            expiry_hours: default_expiry_hours(),
            reminder_window_hours: default_reminder_window_hours(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskSection {
    #[serde(default = "default_code_quality_threshold")]
    pub code_quality_threshold: u32,
}

fn default_code_quality_threshold() -> u32 {
    DEFAULT_CODE_QUALITY_THRESHOLD
}

impl Default for RiskSection {
    fn default() -> Self {
        Self {
            code_quality_threshold: default_code_quality_threshold(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoverySection {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Advisory; exceeding it only logs a warning.
    #[serde(default = "default_stage_timeout_secs")]
    pub stage_timeout_secs: u64,
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_stage_timeout_secs() -> u64 {
    300
}

impl Default for RecoverySection {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            stage_timeout_secs: default_stage_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationsSection {
    #[serde(default = "default_channels")]
    pub channels: Vec<String>,
    /// Recipient of blocking and completion notices.
    #[serde(default = "default_reviewer")]
    pub recipient: String,
    /// Outbox for the `file` channel, relative to the gate directory.
    #[serde(default = "default_outbox")]
    pub outbox: String,
}

fn default_channels() -> Vec<String> {
    vec!["console".to_string(), "file".to_string()]
}

fn default_outbox() -> String {
    "outbox/notifications.jsonl".to_string()
}

impl Default for NotificationsSection {
    fn default() -> Self {
        Self {
            channels: default_channels(),
            recipient: default_reviewer(),
            outbox: default_outbox(),
        }
    }
}

/// Top-level structure of `gate.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GateToml {
    #[serde(default)]
    pub review: ReviewSection,
    #[serde(default)]
    pub estimate: EstimatePolicy,
    #[serde(default)]
    pub risk: RiskSection,
    #[serde(default)]
    pub breaker: CircuitBreakerConfig,
    #[serde(default)]
    pub recovery: RecoverySection,
    #[serde(default)]
    pub notifications: NotificationsSection,
    #[serde(default)]
    pub fix: FixCommands,
}

impl GateToml {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse gate.toml")
    }

    /// Load `<gate_dir>/gate.toml`, or defaults when it does not exist.
    pub fn load_or_default(gate_dir: &Path) -> Result<Self> {
        let config_path = gate_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize gate.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Reviewer handle (env -> file).
    pub fn reviewer(&self) -> String {
        std::env::var(REVIEWER_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| self.review.reviewer.clone())
    }

    /// Enabled channel names (env -> file).
    pub fn channels(&self) -> Vec<String> {
        match std::env::var(CHANNELS_ENV) {
            Ok(value) if !value.trim().is_empty() => value
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            _ => self.notifications.channels.clone(),
        }
    }

    /// Problems that would make the gate misbehave.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.review.reviewer.trim().is_empty() {
            warnings.push(
                "review.reviewer is empty; human review requests will be rejected".to_string(),
            );
        }
        if self.review.expiry_hours <= 0 {
            warnings.push(format!(
                "review.expiry_hours must be positive (got {})",
                self.review.expiry_hours
            ));
        }
        if self.review.reminder_window_hours < 0 {
            warnings.push(format!(
                "review.reminder_window_hours must not be negative (got {})",
                self.review.reminder_window_hours
            ));
        }
        if self.breaker.failure_threshold == 0 || self.breaker.success_threshold == 0 {
            warnings.push("breaker thresholds must be at least 1".to_string());
        }
        for channel in &self.notifications.channels {
            if channel != ConsoleChannel::NAME && channel != FileChannel::NAME {
                warnings.push(format!("Unknown notification channel '{}'", channel));
            }
        }
        warnings
    }
}

/// Resolved configuration for one project.
#[derive(Debug, Clone)]
pub struct GateConfig {
    pub project_dir: PathBuf,
    pub gate_dir: PathBuf,
    pub toml: GateToml,
}

impl GateConfig {
    pub fn new(project_dir: PathBuf) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let gate_dir = project_dir.join(GATE_DIR);
        let toml = GateToml::load_or_default(&gate_dir)?;
        Ok(Self {
            project_dir,
            gate_dir,
            toml,
        })
    }

    pub fn config_file(&self) -> PathBuf {
        self.gate_dir.join(CONFIG_FILE)
    }

    pub fn escalation_dir(&self) -> PathBuf {
        self.gate_dir.join("escalations")
    }

    pub fn outbox_path(&self) -> PathBuf {
        self.gate_dir.join(&self.toml.notifications.outbox)
    }

    pub fn settings(&self) -> GateSettings {
        GateSettings {
            reviewer: self.toml.reviewer(),
            expiry: chrono::Duration::hours(self.toml.review.expiry_hours),
            reminder_window: chrono::Duration::hours(self.toml.review.reminder_window_hours),
            estimate: self.toml.estimate,
            fix_commands: self.toml.fix.clone(),
        }
    }

    pub fn store(&self) -> Arc<dyn RecordStore> {
        Arc::new(FileStore::new(&self.gate_dir))
    }

    pub fn notifier(&self, store: Arc<dyn RecordStore>) -> NotificationManager {
        NotificationManager::new(store, self.toml.notifications.recipient.clone())
            .with_channel(ConsoleChannel)
            .with_channel(FileChannel::new(self.outbox_path()))
            .with_enabled(self.toml.channels())
    }

    pub fn orchestrator(&self) -> GateOrchestrator {
        let store = self.store();
        let notifier = self.notifier(Arc::clone(&store));
        GateOrchestrator::new(store, notifier, self.settings())
            .with_classifier(RiskClassifier::new(self.toml.risk.code_quality_threshold))
    }

    pub fn orchestrator_context(&self) -> OrchestratorContext {
        OrchestratorContext {
            gate_dir: self.gate_dir.clone(),
            max_retries: self.toml.recovery.max_retries,
            stage_timeout: Duration::from_secs(self.toml.recovery.stage_timeout_secs),
        }
    }

    pub fn retrying_executor(&self) -> RetryingExecutor {
        RetryingExecutor::new(
            Arc::new(CircuitBreakerRegistry::new(self.toml.breaker)),
            RecoveryStage::new(self.escalation_dir())
                .with_max_retries(self.toml.recovery.max_retries),
        )
    }

    pub fn validate(&self) -> Vec<String> {
        self.toml.validate()
    }
}
