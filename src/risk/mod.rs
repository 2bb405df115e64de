//! Risk classification that routes human reviewer attention.
//!
//! Changed file paths are split into lowercase tokens (path separators,
//! punctuation and camelCase boundaries) and matched against keyword lists
//! per [`RiskCategory`]. The resulting [`FocusAnalysis`] drives which areas a
//! human reviewer is asked to concentrate on and which they may skip.
//!
//! ## Example
//!
//! ```
//! use review_gate::risk::{RiskCategory, RiskClassifier, RiskLevel};
//!
//! let classifier = RiskClassifier::default();
//! let analysis = classifier.analyze_changed_files(&[
//!     "src/auth/login.js".to_string(),
//!     "src/utils/password.js".to_string(),
//! ]);
//! assert_eq!(analysis.files_in(RiskCategory::Security).len(), 2);
//! assert_eq!(analysis.risk_level, RiskLevel::Critical);
//! ```

pub mod questions;

pub use questions::review_questions;

use crate::gate::{ChangeSetContext, LayerResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Areas the reviewer is told they may skip; automation covers them.
pub const SKIP_AREAS: [&str; 3] = ["syntax", "formatting", "simple-logic"];

/// Default number of Layer2 findings above which code quality becomes a
/// primary focus area.
pub const DEFAULT_CODE_QUALITY_THRESHOLD: u32 = 5;

const MAX_PRIMARY: usize = 3;
const MAX_SECONDARY: usize = 2;

/// A category of change that deserves reviewer attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskCategory {
    Security,
    Architecture,
    DataIntegrity,
    BusinessLogic,
    Api,
    Ux,
    Configuration,
    Performance,
    FrameworkInternal,
    CodeQuality,
}

impl RiskCategory {
    /// Categories assigned from file paths.
    pub const CLASSIFIED: [RiskCategory; 9] = [
        Self::Security,
        Self::Api,
        Self::DataIntegrity,
        Self::Ux,
        Self::BusinessLogic,
        Self::Architecture,
        Self::FrameworkInternal,
        Self::Configuration,
        Self::Performance,
    ];

    /// Primary-area ranking, highest first.
    pub const PRIMARY_PRIORITY: [RiskCategory; 9] = [
        Self::Security,
        Self::Architecture,
        Self::DataIntegrity,
        Self::BusinessLogic,
        Self::Api,
        Self::Ux,
        Self::Configuration,
        Self::Performance,
        Self::FrameworkInternal,
    ];

    /// Lower-priority categories eligible as secondary areas.
    pub const SECONDARY: [RiskCategory; 4] = [
        Self::Ux,
        Self::Configuration,
        Self::Performance,
        Self::FrameworkInternal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Security => "security",
            Self::Architecture => "architecture",
            Self::DataIntegrity => "data-integrity",
            Self::BusinessLogic => "business-logic",
            Self::Api => "api",
            Self::Ux => "ux",
            Self::Configuration => "configuration",
            Self::Performance => "performance",
            Self::FrameworkInternal => "framework-internal",
            Self::CodeQuality => "code-quality",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Security => "security-sensitive code",
            Self::Architecture => "core architecture",
            Self::DataIntegrity => "data storage or migrations",
            Self::BusinessLogic => "business rules",
            Self::Api => "public API surface",
            Self::Ux => "user-facing UI",
            Self::Configuration => "configuration",
            Self::Performance => "performance-sensitive paths",
            Self::FrameworkInternal => "framework internals",
            Self::CodeQuality => "code quality",
        }
    }

    fn keywords(&self) -> &'static [&'static str] {
        match self {
            Self::Security => &[
                "auth", "authentication", "authorization", "login", "logout", "signin", "signup",
                "password", "passwd", "token", "session", "crypto", "encrypt", "decrypt",
                "secret", "secrets", "permission", "permissions", "oauth", "jwt", "credential",
                "credentials", "security", "acl", "csrf", "sanitize",
            ],
            Self::Api => &[
                "api", "apis", "endpoint", "endpoints", "route", "routes", "router",
                "controller", "controllers", "handler", "handlers", "graphql", "rest", "rpc",
                "openapi", "swagger",
            ],
            Self::DataIntegrity => &[
                "db", "database", "migration", "migrations", "migrate", "schema", "schemas",
                "model", "models", "sql", "transaction", "transactions", "repository", "orm",
                "query", "queries", "seed", "seeds",
            ],
            Self::Ux => &[
                "ui", "component", "components", "view", "views", "page", "pages", "css",
                "scss", "sass", "less", "style", "styles", "layout", "layouts", "frontend",
                "jsx", "tsx", "vue", "svelte", "html",
            ],
            Self::BusinessLogic => &[
                "service", "services", "billing", "payment", "payments", "order", "orders",
                "pricing", "invoice", "invoices", "checkout", "cart", "workflow", "workflows",
                "domain", "rules", "subscription",
            ],
            Self::Architecture => &[
                "core", "kernel", "architecture", "infrastructure", "infra", "bootstrap",
                "plugin", "plugins", "registry", "container", "dependency", "di",
            ],
            Self::FrameworkInternal => &[
                "framework", "internal", "internals", "vendor", "runtime", "engine", "hooks",
                "middleware",
            ],
            Self::Configuration => &[
                "config", "configs", "configuration", "settings", "env", "dotenv", "yaml",
                "yml", "toml", "ini", "dockerfile", "docker", "compose",
            ],
            Self::Performance => &[
                "perf", "performance", "cache", "caches", "caching", "cached", "benchmark",
                "benchmarks", "bench", "benches", "profiling", "profiler", "optimize",
                "optimization", "throughput", "latency",
            ],
            // Injected from automated review findings, never from paths.
            Self::CodeQuality => &[],
        }
    }
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low,
    High,
    Critical,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::High => "high",
            Self::Critical => "critical",
        };
        write!(f, "{}", s)
    }
}

/// Urgency of a human review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ReviewPriority {
    P0,
    P1,
    P2,
}

impl fmt::Display for ReviewPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::P0 => "P0",
            Self::P1 => "P1",
            Self::P2 => "P2",
        };
        write!(f, "{}", s)
    }
}

/// Per-category classification of a change set. Derived, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusAnalysis {
    /// Only categories with at least one file appear.
    pub categories: BTreeMap<RiskCategory, Vec<String>>,
    pub risk_level: RiskLevel,
    pub highlights: Vec<String>,
}

impl FocusAnalysis {
    pub fn files_in(&self, category: RiskCategory) -> &[String] {
        self.categories
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has(&self, category: RiskCategory) -> bool {
        !self.files_in(category).is_empty()
    }
}

/// An area the reviewer should concentrate on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusArea {
    pub area: String,
    pub reason: String,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub questions: Vec<String>,
}

/// Reviewer guidance for one change set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub primary: Vec<FocusArea>,
    pub secondary: Vec<FocusArea>,
    pub skip: Vec<String>,
    pub summary: String,
    pub highlighted_aspects: Vec<String>,
    pub risk_level: RiskLevel,
}

/// Keyword-driven classifier for changed files.
#[derive(Debug, Clone)]
pub struct RiskClassifier {
    code_quality_threshold: u32,
}

impl Default for RiskClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_CODE_QUALITY_THRESHOLD)
    }
}

/// Split a path into lowercase tokens on punctuation and camelCase humps.
fn tokenize(path: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for c in path.chars() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

impl RiskClassifier {
    pub fn new(code_quality_threshold: u32) -> Self {
        Self {
            code_quality_threshold,
        }
    }

    /// Categories a single path falls into (possibly none).
    pub fn classify_path(&self, path: &str) -> Vec<RiskCategory> {
        let tokens = tokenize(path);
        RiskCategory::CLASSIFIED
            .into_iter()
            .filter(|category| {
                let keywords = category.keywords();
                tokens.iter().any(|t| keywords.contains(&t.as_str()))
            })
            .collect()
    }

    pub fn analyze_changed_files(&self, paths: &[String]) -> FocusAnalysis {
        let mut categories: BTreeMap<RiskCategory, Vec<String>> = BTreeMap::new();
        for path in paths {
            for category in self.classify_path(path) {
                categories.entry(category).or_default().push(path.clone());
            }
        }

        let has = |c: RiskCategory| categories.get(&c).is_some_and(|f| !f.is_empty());
        let risk_level = if has(RiskCategory::Security) || has(RiskCategory::Architecture) {
            RiskLevel::Critical
        } else if has(RiskCategory::DataIntegrity) {
            RiskLevel::High
        } else {
            RiskLevel::Low
        };

        let mut highlights = Vec::new();
        if let Some(files) = categories.get(&RiskCategory::Api) {
            highlights.push(format!(
                "API changes in {} file(s): check backward compatibility for consumers",
                files.len()
            ));
        }
        if let Some(files) = categories.get(&RiskCategory::DataIntegrity) {
            highlights.push(format!(
                "Database/migration changes in {} file(s): verify data safety and rollback",
                files.len()
            ));
        }
        if let Some(files) = categories.get(&RiskCategory::Ux) {
            highlights.push(format!(
                "UI changes in {} file(s): check user-facing behavior and accessibility",
                files.len()
            ));
        }

        FocusAnalysis {
            categories,
            risk_level,
            highlights,
        }
    }

    fn focus_area(&self, category: RiskCategory, analysis: &FocusAnalysis) -> FocusArea {
        let files = analysis.files_in(category).to_vec();
        let reason = match files.first() {
            Some(first) => format!(
                "{} file(s) touch {} (e.g. {})",
                files.len(),
                category.label(),
                first
            ),
            None => format!("Touches {}", category.label()),
        };
        FocusArea {
            area: category.as_str().to_string(),
            reason,
            files,
            questions: review_questions(category.as_str()),
        }
    }

    /// Top areas by fixed priority, plus a synthetic code-quality area when
    /// Layer2 reported more findings than the configured threshold.
    pub fn determine_primary_areas(
        &self,
        analysis: &FocusAnalysis,
        layer2: Option<&LayerResult>,
    ) -> Vec<FocusArea> {
        let findings = layer2.map(LayerResult::total_findings).unwrap_or(0);
        let needs_code_quality = findings > self.code_quality_threshold;
        let slots = if needs_code_quality {
            MAX_PRIMARY - 1
        } else {
            MAX_PRIMARY
        };

        let mut areas: Vec<FocusArea> = RiskCategory::PRIMARY_PRIORITY
            .into_iter()
            .filter(|c| analysis.has(*c))
            .take(slots)
            .map(|c| self.focus_area(c, analysis))
            .collect();

        if needs_code_quality {
            areas.push(FocusArea {
                area: RiskCategory::CodeQuality.as_str().to_string(),
                reason: format!(
                    "Automated review reported {} finding(s) (threshold {})",
                    findings, self.code_quality_threshold
                ),
                files: Vec::new(),
                questions: review_questions(RiskCategory::CodeQuality.as_str()),
            });
        }
        areas
    }

    pub fn determine_secondary_areas(
        &self,
        analysis: &FocusAnalysis,
        primary: &[FocusArea],
    ) -> Vec<FocusArea> {
        RiskCategory::SECONDARY
            .into_iter()
            .filter(|c| analysis.has(*c))
            .filter(|c| !primary.iter().any(|p| p.area == c.as_str()))
            .take(MAX_SECONDARY)
            .map(|c| self.focus_area(c, analysis))
            .collect()
    }

    pub fn recommend(
        &self,
        context: &ChangeSetContext,
        layer2: Option<&LayerResult>,
    ) -> Recommendation {
        let analysis = self.analyze_changed_files(&context.changed_files);
        let primary = self.determine_primary_areas(&analysis, layer2);
        let secondary = self.determine_secondary_areas(&analysis, &primary);

        let focus = if primary.is_empty() {
            "no high-risk areas detected".to_string()
        } else {
            format!(
                "focus on {}",
                primary
                    .iter()
                    .map(|a| a.area.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        };
        let summary = format!(
            "{} file(s) changed, risk level {}: {}",
            context.changed_files.len(),
            analysis.risk_level,
            focus
        );

        Recommendation {
            primary,
            secondary,
            skip: SKIP_AREAS.iter().map(|s| s.to_string()).collect(),
            summary,
            highlighted_aspects: analysis.highlights,
            risk_level: analysis.risk_level,
        }
    }

    pub fn calculate_priority(&self, recommendation: &Recommendation) -> ReviewPriority {
        let primary_has =
            |c: RiskCategory| recommendation.primary.iter().any(|a| a.area == c.as_str());
        if primary_has(RiskCategory::Security) || primary_has(RiskCategory::Architecture) {
            ReviewPriority::P0
        } else if primary_has(RiskCategory::BusinessLogic)
            || recommendation
                .secondary
                .iter()
                .any(|a| a.area == RiskCategory::BusinessLogic.as_str())
        {
            ReviewPriority::P1
        } else {
            ReviewPriority::P2
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::{CheckResult, IssueCounts};

    fn files(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    fn layer2_with_findings(critical: u32, high: u32, medium: u32) -> LayerResult {
        LayerResult {
            pass: true,
            results: vec![CheckResult {
                check: "ai-review".into(),
                pass: true,
                message: "reviewed".into(),
                error: None,
                issues: Some(IssueCounts {
                    critical,
                    high,
                    medium,
                }),
            }],
        }
    }

    #[test]
    fn tokenize_splits_paths_and_camel_case() {
        assert_eq!(
            tokenize("src/api/UserController.ts"),
            vec!["src", "api", "user", "controller", "ts"]
        );
        assert_eq!(
            tokenize("db/migrations/001_init.sql"),
            vec!["db", "migrations", "001", "init", "sql"]
        );
    }

    #[test]
    fn security_files_are_critical() {
        let analysis = RiskClassifier::default()
            .analyze_changed_files(&files(&["src/auth/login.js", "src/utils/password.js"]));
        assert_eq!(analysis.files_in(RiskCategory::Security).len(), 2);
        assert_eq!(analysis.risk_level, RiskLevel::Critical);
    }

    #[test]
    fn empty_change_set_is_low_risk() {
        let analysis = RiskClassifier::default().analyze_changed_files(&[]);
        assert!(analysis.categories.is_empty());
        assert_eq!(analysis.risk_level, RiskLevel::Low);
        assert!(analysis.highlights.is_empty());
    }

    #[test]
    fn data_integrity_is_high_with_highlight() {
        let analysis = RiskClassifier::default()
            .analyze_changed_files(&files(&["db/migrations/002_add_index.sql"]));
        assert_eq!(analysis.risk_level, RiskLevel::High);
        assert!(analysis.highlights[0].starts_with("Database/migration"));
    }

    #[test]
    fn file_can_fall_into_several_categories() {
        let categories = RiskClassifier::default().classify_path("src/api/auth/routes.ts");
        assert!(categories.contains(&RiskCategory::Security));
        assert!(categories.contains(&RiskCategory::Api));
    }

    #[test]
    fn primary_areas_follow_priority_and_cap() {
        let classifier = RiskClassifier::default();
        let analysis = classifier.analyze_changed_files(&files(&[
            "src/api/routes.ts",
            "src/services/billing.ts",
            "src/db/schema.sql",
            "src/auth/session.ts",
            "src/core/registry.ts",
        ]));
        let primary = classifier.determine_primary_areas(&analysis, None);
        let areas: Vec<_> = primary.iter().map(|a| a.area.as_str()).collect();
        assert_eq!(areas, vec!["security", "architecture", "data-integrity"]);
        assert!(!primary[0].questions.is_empty());
        assert!(primary[0].reason.contains("src/auth/session.ts"));
    }

    #[test]
    fn many_findings_inject_code_quality() {
        let classifier = RiskClassifier::new(5);
        let analysis = classifier.analyze_changed_files(&files(&["README.md"]));
        let primary =
            classifier.determine_primary_areas(&analysis, Some(&layer2_with_findings(0, 3, 3)));
        assert_eq!(primary.len(), 1);
        assert_eq!(primary[0].area, "code-quality");

        let few =
            classifier.determine_primary_areas(&analysis, Some(&layer2_with_findings(0, 1, 1)));
        assert!(few.is_empty());
    }

    #[test]
    fn code_quality_keeps_primary_at_three() {
        let classifier = RiskClassifier::new(0);
        let analysis = classifier.analyze_changed_files(&files(&[
            "src/auth/a.ts",
            "src/core/b.ts",
            "src/db/c.ts",
            "src/services/d.ts",
        ]));
        let primary =
            classifier.determine_primary_areas(&analysis, Some(&layer2_with_findings(1, 0, 0)));
        assert_eq!(primary.len(), 3);
        assert_eq!(primary[2].area, "code-quality");
    }

    #[test]
    fn secondary_excludes_primary_and_caps_at_two() {
        let classifier = RiskClassifier::default();
        let analysis = classifier.analyze_changed_files(&files(&[
            "src/components/Button.tsx",
            "config/settings.yaml",
            "src/framework/runtime.ts",
        ]));
        let primary = classifier.determine_primary_areas(&analysis, None);
        let secondary = classifier.determine_secondary_areas(&analysis, &primary);
        assert!(secondary.len() <= 2);
        for area in &secondary {
            assert!(!primary.iter().any(|p| p.area == area.area));
        }
    }

    #[test]
    fn performance_paths_reach_secondary_areas() {
        let classifier = RiskClassifier::default();
        assert_eq!(
            classifier.classify_path("src/cache/lru.rs"),
            vec![RiskCategory::Performance]
        );
        assert_eq!(
            classifier.classify_path("benches/throughput.rs"),
            vec![RiskCategory::Performance]
        );

        let analysis = classifier.analyze_changed_files(&files(&[
            "src/auth/a.ts",
            "src/core/b.ts",
            "src/db/c.ts",
            "src/cache/lru.rs",
        ]));
        let primary = classifier.determine_primary_areas(&analysis, None);
        assert!(!primary.iter().any(|p| p.area == "performance"));
        let secondary = classifier.determine_secondary_areas(&analysis, &primary);
        assert_eq!(secondary.len(), 1);
        assert_eq!(secondary[0].area, "performance");
        assert_eq!(secondary[0].files, vec!["src/cache/lru.rs".to_string()]);
    }

    #[test]
    fn recommend_composes_all_parts() {
        let classifier = RiskClassifier::default();
        let context = ChangeSetContext::new(files(&["src/auth/login.js", "src/api/users.ts"]));
        let rec = classifier.recommend(&context, None);
        assert_eq!(rec.primary[0].area, "security");
        assert_eq!(rec.skip, vec!["syntax", "formatting", "simple-logic"]);
        assert!(rec.summary.contains("critical"));
        assert!(rec.highlighted_aspects.iter().any(|h| h.starts_with("API")));
    }

    #[test]
    fn priority_levels() {
        let classifier = RiskClassifier::default();
        let p0 = classifier.recommend(&ChangeSetContext::new(files(&["src/auth/x.ts"])), None);
        assert_eq!(classifier.calculate_priority(&p0), ReviewPriority::P0);

        let p1 =
            classifier.recommend(&ChangeSetContext::new(files(&["src/billing/invoice.ts"])), None);
        assert_eq!(classifier.calculate_priority(&p1), ReviewPriority::P1);

        let p2 = classifier.recommend(&ChangeSetContext::new(files(&["docs/guide.md"])), None);
        assert_eq!(classifier.calculate_priority(&p2), ReviewPriority::P2);
    }

    #[test]
    fn categories_serialize_kebab_case() {
        let analysis = RiskClassifier::default().analyze_changed_files(&files(&["db/model.rs"]));
        let value = serde_json::to_value(&analysis).unwrap();
        assert!(value["categories"].get("data-integrity").is_some());
        assert_eq!(value["riskLevel"], "high");
    }
}
