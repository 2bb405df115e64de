//! Plain-text bodies for each notification kind.

use crate::gate::{BlockReport, ReviewRequest};
use crate::risk::FocusArea;
use chrono::{DateTime, Utc};
use std::fmt::Write;

fn write_areas(out: &mut String, title: &str, areas: &[FocusArea]) {
    if areas.is_empty() {
        return;
    }
    let _ = writeln!(out, "{}:", title);
    for (i, area) in areas.iter().enumerate() {
        let _ = writeln!(out, "  {}. {}: {}", i + 1, area.area, area.reason);
        for question in &area.questions {
            let _ = writeln!(out, "     - {}", question);
        }
    }
}

/// Body of a review request. Carries everything the reviewer needs without
/// opening the stored record.
pub fn review_request_content(request: &ReviewRequest) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Review request: {}", request.id);
    let _ = writeln!(out, "Reviewer: {}", request.reviewer);
    let _ = writeln!(out, "Priority: {} (risk {})", request.priority, request.risk_level);
    let _ = writeln!(out, "Estimated time: {} minutes", request.estimated_time);
    let _ = writeln!(out, "Expires: {}", request.expires_at.to_rfc3339());
    let _ = writeln!(out);
    let _ = writeln!(out, "Automated summary:");
    let _ = writeln!(out, "  Layer 1: {}", request.automated_summary.layer1);
    let _ = writeln!(out, "  Layer 2: {}", request.automated_summary.layer2);
    let _ = writeln!(out);
    write_areas(&mut out, "Primary focus areas", &request.focus_areas.primary);
    write_areas(&mut out, "Secondary focus areas", &request.focus_areas.secondary);
    let _ = writeln!(out, "Skip (covered by automation): {}", request.skip_areas.join(", "));
    out
}

pub fn blocking_content(report: &BlockReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", report.message);
    if let Some(severity) = report.severity {
        let _ = writeln!(out, "Severity: {}", severity);
    }
    if !report.fix_recommendations.is_empty() {
        let _ = writeln!(out, "Fix recommendations:");
        for fix in &report.fix_recommendations {
            let _ = write!(out, "  - [{}] {}: {}", fix.severity, fix.check, fix.action);
            if let Some(command) = &fix.command {
                let _ = write!(out, " (run `{}`)", command);
            }
            let _ = writeln!(out);
        }
    }
    out
}

pub fn completion_content(request: &ReviewRequest) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Review {} is {}", request.id, request.status);
    if let Some(result) = &request.review_result {
        if let Some(by) = &result.reviewed_by {
            let _ = writeln!(out, "Reviewed by: {}", by);
        }
        if !result.comments.is_empty() {
            let _ = writeln!(out, "Comments: {}", result.comments);
        }
    }
    out
}

pub fn reminder_content(request: &ReviewRequest, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    let remaining = request.expires_at - now;
    if remaining.num_seconds() <= 0 {
        let _ = writeln!(out, "Review {} has expired and is still pending.", request.id);
    } else {
        let _ = writeln!(
            out,
            "Review {} expires in {}h {}m.",
            request.id,
            remaining.num_hours(),
            remaining.num_minutes() % 60
        );
    }
    let _ = writeln!(out, "Reviewer: {}", request.reviewer);
    let _ = writeln!(out, "Estimated time: {} minutes", request.estimated_time);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::{AutomatedSummary, FocusAreas, LayerSummary, ReviewStatus};
    use crate::risk::{ReviewPriority, RiskLevel, review_questions};

    fn request() -> ReviewRequest {
        let now = Utc::now();
        ReviewRequest {
            id: "hr-abc".into(),
            reviewer: "team-lead".into(),
            focus_areas: FocusAreas {
                primary: vec![FocusArea {
                    area: "security".into(),
                    reason: "1 file(s) touch security-sensitive code".into(),
                    files: vec!["src/auth/login.js".into()],
                    questions: review_questions("security"),
                }],
                secondary: Vec::new(),
            },
            skip_areas: vec!["syntax".into(), "formatting".into(), "simple-logic".into()],
            automated_summary: AutomatedSummary {
                layer1: LayerSummary {
                    pass: true,
                    checks_run: 2,
                    checks_passed: 2,
                    findings: 0,
                },
                layer2: LayerSummary {
                    pass: true,
                    checks_run: 1,
                    checks_passed: 1,
                    findings: 3,
                },
            },
            estimated_time: 15.0,
            priority: ReviewPriority::P0,
            risk_level: RiskLevel::Critical,
            summary: String::new(),
            changed_files: vec!["src/auth/login.js".into()],
            created_at: now,
            expires_at: now + chrono::Duration::hours(24),
            status: ReviewStatus::Pending,
            review_result: None,
            completed_at: None,
        }
    }

    #[test]
    fn review_request_content_embeds_required_fields() {
        let request = request();
        let content = review_request_content(&request);
        assert!(content.contains("hr-abc"));
        assert!(content.contains("team-lead"));
        assert!(content.contains("15 minutes"));
        assert!(content.contains(&request.expires_at.to_rfc3339()));
        assert!(content.contains("Layer 1: passed (2/2"));
        assert!(content.contains("Layer 2: passed (1/1 checks passed, 3 finding(s))"));
        assert!(content.contains("1. security"));
        assert!(content.contains(&review_questions("security")[0]));
        assert!(content.contains("syntax, formatting, simple-logic"));
    }

    #[test]
    fn reminder_mentions_expiry() {
        let mut request = request();
        let now = request.created_at;
        assert!(reminder_content(&request, now).contains("expires in 24h 0m"));
        request.expires_at = now - chrono::Duration::minutes(1);
        assert!(reminder_content(&request, now).contains("has expired"));
    }
}
