//! Stage registry commands: `stage list`, `stage run`.

use anyhow::{Context, Result};
use review_gate::config::GateConfig;
use review_gate::stage::{StageContext, StageRegistry};
use std::path::Path;

pub fn cmd_stage_list() -> Result<()> {
    let registry = StageRegistry::with_builtin_stages();
    for stage in registry.available_stages() {
        println!("{}", stage);
    }
    Ok(())
}

/// Run one registered stage under retry and its circuit breaker; prints the
/// outcome as JSON.
pub async fn cmd_stage_run(
    project_dir: &Path,
    stage_id: &str,
    context_file: &Path,
) -> Result<bool> {
    let config = GateConfig::new(project_dir.to_path_buf())?;
    let registry = StageRegistry::with_builtin_stages();
    let stage = registry.create_executor(stage_id, &config.orchestrator_context())?;

    let content = std::fs::read_to_string(context_file)
        .with_context(|| format!("Failed to read context file: {}", context_file.display()))?;
    let context: StageContext = serde_json::from_str(&content).with_context(|| {
        format!("Context file must be a JSON object: {}", context_file.display())
    })?;

    let outcome = config
        .retrying_executor()
        .run(stage.as_ref(), &context)
        .await
        .with_context(|| format!("Stage {} failed to run", stage_id))?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(outcome.succeeded())
}
