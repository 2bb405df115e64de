//! Project initialization command.

use anyhow::Result;

pub fn cmd_init(project_dir: &std::path::Path) -> Result<()> {
    use review_gate::init::{init_gate, is_initialized};

    let was_initialized = is_initialized(project_dir);
    let result = init_gate(project_dir)?;

    if result.created {
        println!("Initialized review gate at {}", result.gate_dir.display());
        println!();
        println!("Created directory structure:");
        println!("  .gate/");
        println!("  ├── gate.toml       # Reviewer, estimate, breaker and channel settings");
        println!("  ├── reviews/        # Review requests");
        println!("  ├── pending/        # Requests awaiting a human");
        println!("  ├── notifications/  # Sent notifications");
        println!("  ├── escalations/    # Escalation reports");
        println!("  └── outbox/         # File channel outbox");
        println!();
        println!("Next steps:");
        println!("  1. Set the reviewer in .gate/gate.toml");
        println!("  2. Run `review-gate review --layer1 l1.json --layer2 l2.json --files <paths>`");
    } else if was_initialized {
        println!(
            "Review gate already initialized at {}",
            result.gate_dir.display()
        );
        println!("Directory structure verified.");
    }

    Ok(())
}
