//! Layer results, pass/fail evaluation, severity and fix recommendations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Automated review finding counts reported by a Layer2 tool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueCounts {
    #[serde(default)]
    pub critical: u32,
    #[serde(default)]
    pub high: u32,
    #[serde(default)]
    pub medium: u32,
}

impl IssueCounts {
    /// Counts come from external tools; the sum saturates rather than wraps.
    pub fn total(&self) -> u32 {
        self.critical
            .saturating_add(self.high)
            .saturating_add(self.medium)
    }
}

/// One sub-check inside a layer result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub check: String,
    pub pass: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issues: Option<IssueCounts>,
}

/// Outcome of an automated layer as reported by its runner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerResult {
    pub pass: bool,
    #[serde(default)]
    pub results: Vec<CheckResult>,
}

impl LayerResult {
    /// Sum of every finding count across sub-checks.
    pub fn total_findings(&self) -> u32 {
        self.results
            .iter()
            .filter_map(|r| r.issues)
            .fold(0u32, |acc, i| acc.saturating_add(i.total()))
    }

    pub fn critical_findings(&self) -> u32 {
        self.results
            .iter()
            .filter_map(|r| r.issues)
            .fold(0u32, |acc, i| acc.saturating_add(i.critical))
    }

    /// One-line summary used in review requests and notifications.
    pub fn summary(&self) -> LayerSummary {
        let passed = self.results.iter().filter(|r| r.pass).count();
        LayerSummary {
            pass: self.pass,
            checks_run: self.results.len(),
            checks_passed: passed,
            findings: self.total_findings(),
        }
    }
}

/// Condensed view of a layer for the reviewer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerSummary {
    pub pass: bool,
    pub checks_run: usize,
    pub checks_passed: usize,
    pub findings: u32,
}

impl fmt::Display for LayerSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}/{} checks passed, {} finding(s))",
            if self.pass { "passed" } else { "failed" },
            self.checks_passed,
            self.checks_run,
            self.findings
        )
    }
}

/// Files touched by the change set under review.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSetContext {
    #[serde(default)]
    pub changed_files: Vec<String>,
}

impl ChangeSetContext {
    pub fn new(changed_files: Vec<String>) -> Self {
        Self { changed_files }
    }
}

/// Which automated layer stopped the change set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateLayer {
    Layer1,
    Layer2,
}

impl GateLayer {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Layer1 => "Layer 1",
            Self::Layer2 => "Layer 2",
        }
    }
}

impl fmt::Display for GateLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Layer1 => write!(f, "layer1"),
            Self::Layer2 => write!(f, "layer2"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// A failed sub-check extracted from a layer result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub check: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issues: Option<IssueCounts>,
}

/// Pass/fail evaluation of one layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerCheck {
    pub pass: bool,
    pub reason: String,
    pub checks_passed: Vec<String>,
    pub issues: Vec<Issue>,
}

/// Evaluate a layer. A missing result blocks; it is never a skip.
pub fn check_layer_passed(result: Option<&LayerResult>, label: &str) -> LayerCheck {
    let Some(result) = result else {
        return LayerCheck {
            pass: false,
            reason: format!("{} not executed", label),
            checks_passed: Vec::new(),
            issues: Vec::new(),
        };
    };

    let checks_passed = result
        .results
        .iter()
        .filter(|r| r.pass)
        .map(|r| r.check.clone())
        .collect();
    let issues: Vec<Issue> = result
        .results
        .iter()
        .filter(|r| !r.pass)
        .map(|r| Issue {
            check: r.check.clone(),
            message: r.message.clone(),
            detail: r.error.clone(),
            issues: r.issues,
        })
        .collect();

    let reason = if result.pass {
        format!("{} passed", label)
    } else if issues.is_empty() {
        format!("{} failed", label)
    } else {
        format!("{} failed: {} check(s) failed", label, issues.len())
    };

    LayerCheck {
        pass: result.pass,
        reason,
        checks_passed,
        issues,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CheckKind {
    Lint,
    Test,
    Review,
    Other,
}

const TEST_WORDS: &[&str] = &["test", "tests", "jest", "vitest", "pytest", "e2e"];
const LINT_WORDS: &[&str] = &[
    "lint", "linter", "eslint", "clippy", "format", "fmt", "rustfmt", "prettier",
];
const REVIEW_WORDS: &[&str] = &["review", "coderabbit", "ai"];

/// Classify a check by the words in its name (`unit-tests`, `ai_review`),
/// never by substrings.
fn check_kind(check: &str) -> CheckKind {
    let words: Vec<String> = check
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    let has_any = |list: &[&str]| words.iter().any(|w| list.contains(&w.as_str()));

    if has_any(TEST_WORDS) {
        CheckKind::Test
    } else if has_any(LINT_WORDS) {
        CheckKind::Lint
    } else if has_any(REVIEW_WORDS) {
        CheckKind::Review
    } else {
        CheckKind::Other
    }
}

pub fn determine_severity(issue: &Issue) -> Severity {
    let critical_findings = issue.issues.map(|i| i.critical).unwrap_or(0);
    match check_kind(&issue.check) {
        CheckKind::Test => Severity::Critical,
        _ if critical_findings >= 1 => Severity::Critical,
        CheckKind::Lint => Severity::High,
        _ => Severity::Medium,
    }
}

/// Commands suggested in fix recommendations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixCommands {
    #[serde(default = "default_lint_fix")]
    pub lint_fix: String,
    #[serde(default = "default_test")]
    pub test: String,
}

fn default_lint_fix() -> String {
    "npm run lint -- --fix".to_string()
}

fn default_test() -> String {
    "npm test".to_string()
}

impl Default for FixCommands {
    fn default() -> Self {
        Self {
            lint_fix: default_lint_fix(),
            test: default_test(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixRecommendation {
    pub check: String,
    pub severity: Severity,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

pub fn recommend_fix(issue: &Issue, commands: &FixCommands) -> FixRecommendation {
    let severity = determine_severity(issue);
    let (action, command) = match check_kind(&issue.check) {
        CheckKind::Lint => (
            format!("Run the linter autofix, then fix what remains: {}", issue.message),
            Some(commands.lint_fix.clone()),
        ),
        CheckKind::Test => (
            format!("Fix the failing tests and re-run the suite: {}", issue.message),
            Some(commands.test.clone()),
        ),
        CheckKind::Review => {
            let counts = issue.issues.unwrap_or_default();
            (
                format!(
                    "Address the automated review findings ({} critical, {} high, {} medium)",
                    counts.critical, counts.high, counts.medium
                ),
                None,
            )
        }
        CheckKind::Other => (
            format!("Investigate and fix the '{}' check: {}", issue.check, issue.message),
            None,
        ),
    };
    FixRecommendation {
        check: issue.check.clone(),
        severity,
        action,
        command,
    }
}

/// Why and where a change set was stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockReport {
    pub stopped_at: GateLayer,
    pub message: String,
    pub reason: String,
    pub fix_recommendations: Vec<FixRecommendation>,
    /// Highest severity among the issues; `None` when the layer never ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    pub timestamp: DateTime<Utc>,
}

pub fn block(
    check: &LayerCheck,
    stopped_at: GateLayer,
    timestamp: DateTime<Utc>,
    commands: &FixCommands,
) -> BlockReport {
    let message = match stopped_at {
        GateLayer::Layer1 => format!(
            "Blocked at Layer 1 (automated checks): {}. Fix the failing checks before review can proceed.",
            check.reason
        ),
        GateLayer::Layer2 => format!(
            "Blocked at Layer 2 (automated review): {}. Address the review findings before a human review is requested.",
            check.reason
        ),
    };
    let fix_recommendations: Vec<FixRecommendation> = check
        .issues
        .iter()
        .map(|issue| recommend_fix(issue, commands))
        .collect();
    let severity = fix_recommendations.iter().map(|r| r.severity).max();

    BlockReport {
        stopped_at,
        message,
        reason: check.reason.clone(),
        fix_recommendations,
        severity,
        timestamp,
    }
}
