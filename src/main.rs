use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;

/// Exit code when a change set is blocked by an automated layer.
const EXIT_BLOCKED: i32 = 2;

#[derive(Parser)]
#[command(name = "review-gate")]
#[command(version, about = "Staged change-review gate: automated checks, automated review, then a focused human review")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the .gate/ directory with a default gate.toml
    Init,
    /// Run a change set through the gate
    Review {
        /// Layer 1 (automated checks) result JSON
        #[arg(long)]
        layer1: Option<PathBuf>,
        /// Layer 2 (automated review) result JSON
        #[arg(long)]
        layer2: Option<PathBuf>,
        /// Changed files, comma-separated
        #[arg(long, value_delimiter = ',')]
        files: Vec<String>,
    },
    /// Record the human verdict on a pending review
    Complete {
        id: String,
        #[arg(long, conflicts_with = "request_changes")]
        approve: bool,
        #[arg(long)]
        request_changes: bool,
        #[arg(long)]
        comments: Option<String>,
        /// Reviewer name (defaults to the assigned reviewer)
        #[arg(long)]
        reviewer: Option<String>,
    },
    /// List reviews awaiting a human
    Pending,
    /// Print one review request as JSON
    Show { id: String },
    /// Send reminders for reviews close to expiry
    Remind,
    /// Inspect or run pipeline stages
    Stage {
        #[command(subcommand)]
        command: StageCommands,
    },
    /// View or initialize configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum StageCommands {
    /// List registered stage ids
    List,
    /// Run a stage with retry, recovery and a circuit breaker
    Run {
        stage_id: String,
        /// JSON object used as the stage context
        #[arg(long)]
        context: PathBuf,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the configuration and effective values
    Show,
    /// Write a default gate.toml
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    review_gate::logging::init_logging(cli.verbose, cli.log_json);

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        Commands::Init => cmd::cmd_init(&project_dir)?,
        Commands::Review {
            layer1,
            layer2,
            files,
        } => {
            let passed =
                cmd::cmd_review(&project_dir, layer1.clone(), layer2.clone(), files.clone()).await?;
            if !passed {
                std::process::exit(EXIT_BLOCKED);
            }
        }
        Commands::Complete {
            id,
            approve,
            request_changes,
            comments,
            reviewer,
        } => {
            if !approve && !request_changes {
                anyhow::bail!("Specify either --approve or --request-changes");
            }
            cmd::cmd_complete(&project_dir, id, *approve, comments.clone(), reviewer.clone()).await?
        }
        Commands::Pending => cmd::cmd_pending(&project_dir)?,
        Commands::Show { id } => cmd::cmd_show(&project_dir, id)?,
        Commands::Remind => cmd::cmd_remind(&project_dir).await?,
        Commands::Stage { command } => match command {
            StageCommands::List => cmd::cmd_stage_list()?,
            StageCommands::Run { stage_id, context } => {
                if !cmd::cmd_stage_run(&project_dir, stage_id, context).await? {
                    std::process::exit(1);
                }
            }
        },
        Commands::Config { command } => cmd::cmd_config(&project_dir, command.clone())?,
    }

    Ok(())
}
