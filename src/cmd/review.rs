//! Gate and review-request commands: `review`, `complete`, `pending`, `show`, `remind`.

use anyhow::{Context, Result};
use console::style;
use review_gate::config::GateConfig;
use review_gate::gate::{ChangeSetContext, LayerResult, ReviewResult};
use std::path::{Path, PathBuf};

/// Read a layer result file. A missing file means the layer never ran.
fn read_layer(path: Option<&Path>, label: &str) -> Result<Option<LayerResult>> {
    let Some(path) = path else {
        return Ok(None);
    };
    if !path.exists() {
        tracing::warn!(layer = label, path = %path.display(), "layer result file not found");
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {} result: {}", label, path.display()))?;
    let result = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {} result: {}", label, path.display()))?;
    Ok(Some(result))
}

/// Run the gate for one change set and print the outcome as JSON.
///
/// Returns whether the change set passed both automated layers.
pub async fn cmd_review(
    project_dir: &Path,
    layer1: Option<PathBuf>,
    layer2: Option<PathBuf>,
    files: Vec<String>,
) -> Result<bool> {
    let config = GateConfig::new(project_dir.to_path_buf())?;
    let gate = config.orchestrator();

    let layer1 = read_layer(layer1.as_deref(), "layer1")?;
    let layer2 = read_layer(layer2.as_deref(), "layer2")?;
    let context = ChangeSetContext::new(files);

    let outcome = gate
        .orchestrate_review(&context, layer1.as_ref(), layer2.as_ref())
        .await
        .context("Gate evaluation failed")?;

    println!("{}", serde_json::to_string_pretty(&outcome.to_json()?)?);
    Ok(outcome.pass())
}

pub async fn cmd_complete(
    project_dir: &Path,
    id: &str,
    approve: bool,
    comments: Option<String>,
    reviewer: Option<String>,
) -> Result<()> {
    let config = GateConfig::new(project_dir.to_path_buf())?;
    let gate = config.orchestrator();

    let mut result = if approve {
        ReviewResult::approve()
    } else {
        ReviewResult::request_changes("")
    };
    if let Some(comments) = comments {
        result = result.with_comments(comments);
    }
    if let Some(reviewer) = reviewer {
        result = result.with_reviewer(reviewer);
    }

    let request = gate
        .complete_review(id, result)
        .await
        .with_context(|| format!("Failed to complete review {}", id))?;
    println!("Review {} marked {}", style(&request.id).cyan(), style(request.status).bold());
    Ok(())
}

pub fn cmd_pending(project_dir: &Path) -> Result<()> {
    let config = GateConfig::new(project_dir.to_path_buf())?;
    let requests = config.orchestrator().pending_requests()?;

    if requests.is_empty() {
        println!("No pending review requests.");
        return Ok(());
    }

    println!("Pending review requests:");
    println!();
    for request in requests {
        let areas: Vec<&str> = request
            .focus_areas
            .primary
            .iter()
            .map(|a| a.area.as_str())
            .collect();
        println!(
            "  {} {} {} ~{} min, expires {}",
            style(&request.id).cyan(),
            style(request.priority).bold(),
            request.reviewer,
            request.estimated_time,
            request.expires_at.format("%Y-%m-%d %H:%M UTC")
        );
        if !areas.is_empty() {
            println!("      focus: {}", areas.join(", "));
        }
    }
    Ok(())
}

pub fn cmd_show(project_dir: &Path, id: &str) -> Result<()> {
    let config = GateConfig::new(project_dir.to_path_buf())?;
    let request = config
        .orchestrator()
        .load_request(id)
        .with_context(|| format!("Failed to load review {}", id))?;
    println!("{}", serde_json::to_string_pretty(&request)?);
    Ok(())
}

pub async fn cmd_remind(project_dir: &Path) -> Result<()> {
    let config = GateConfig::new(project_dir.to_path_buf())?;
    let sent = config
        .orchestrator()
        .send_reminders(chrono::Utc::now())
        .await?;
    println!("Sent {} reminder(s).", sent.len());
    Ok(())
}
