//! `review-gate init`: create the `.gate/` state directory.
//!
//! ```text
//! .gate/
//! ├── gate.toml        # Configuration (defaults written on first init)
//! ├── reviews/         # One JSON record per review request
//! ├── pending/         # Markers for requests awaiting a human
//! ├── notifications/   # Every notification sent, with delivery outcomes
//! ├── escalations/     # Reports for stages handed to a human
//! └── outbox/          # JSON-lines outbox of the `file` channel
//! ```

use crate::config::{CONFIG_FILE, GATE_DIR, GateToml};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

const SUBDIRS: [&str; 5] = ["reviews", "pending", "notifications", "escalations", "outbox"];

#[derive(Debug)]
pub struct InitResult {
    pub gate_dir: PathBuf,
    /// False when the directory already existed.
    pub created: bool,
}

/// Create `.gate/` under `project_dir`, or complete an existing one.
///
/// An existing `gate.toml` is never overwritten.
pub fn init_gate(project_dir: &Path) -> Result<InitResult> {
    let gate_dir = get_gate_dir(project_dir);
    let created = !gate_dir.exists();

    for sub in SUBDIRS {
        let dir = gate_dir.join(sub);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    }

    let config_file = gate_dir.join(CONFIG_FILE);
    if !config_file.exists() {
        GateToml::default().save(&config_file)?;
    }

    Ok(InitResult { gate_dir, created })
}

pub fn is_initialized(project_dir: &Path) -> bool {
    get_gate_dir(project_dir).exists()
}

pub fn get_gate_dir(project_dir: &Path) -> PathBuf {
    project_dir.join(GATE_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_init_creates_structure_and_config() {
        let dir = tempdir().unwrap();
        let result = init_gate(dir.path()).unwrap();

        assert!(result.created);
        for sub in SUBDIRS {
            assert!(result.gate_dir.join(sub).is_dir(), "{sub}");
        }
        let toml = GateToml::load(&result.gate_dir.join(CONFIG_FILE)).unwrap();
        assert_eq!(toml, GateToml::default());
    }

    #[test]
    fn test_init_twice_keeps_existing_config() {
        let dir = tempdir().unwrap();
        init_gate(dir.path()).unwrap();
        let config_file = get_gate_dir(dir.path()).join(CONFIG_FILE);
        std::fs::write(&config_file, "[review]\nreviewer = \"erin\"\n").unwrap();

        let again = init_gate(dir.path()).unwrap();
        assert!(!again.created);
        let toml = GateToml::load(&config_file).unwrap();
        assert_eq!(toml.review.reviewer, "erin");
    }

    #[test]
    fn test_is_initialized() {
        let dir = tempdir().unwrap();
        assert!(!is_initialized(dir.path()));
        init_gate(dir.path()).unwrap();
        assert!(is_initialized(dir.path()));
    }
}
