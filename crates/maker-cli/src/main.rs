mod cmd;

use clap::{Parser, Subcommand};
use cmd::{batch::BatchSubcommand, config::ConfigSubcommand, step::StepSubcommand};
use maker_cli::root;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "maker",
    about = "Resumable task ledger: steps, batches, checkpoints and final artifacts",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .maker/ or .git/)
    #[arg(long, global = true, env = "MAKER_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize maker in the current project
    Init,

    /// Create a task record from a decomposition
    Create {
        /// Task description
        #[arg(required = true)]
        description: Vec<String>,
        /// Step name, in order (repeatable)
        #[arg(long = "step", value_name = "NAME")]
        steps: Vec<String>,
        /// YAML plan file with explicit batches ({ batches: [[...], ...] })
        #[arg(long, conflicts_with = "steps")]
        plan: Option<PathBuf>,
        /// Steps per batch for --step lists (default: config batch_size)
        #[arg(long)]
        batch_size: Option<u32>,
        /// Use this task id instead of a generated one
        #[arg(long)]
        id: Option<String>,
    },

    /// List task records
    List,

    /// Show a task's batches, steps and resume point
    Show { id: String },

    /// Print where to pick up a task
    Resume { id: String },

    /// Start or record individual steps
    Step {
        #[command(subcommand)]
        subcommand: StepSubcommand,
    },

    /// Checkpoint batches
    Batch {
        #[command(subcommand)]
        subcommand: BatchSubcommand,
    },

    /// Write the combined artifact and mark the task completed
    Finalize {
        id: String,
        /// File holding the combined artifact ('-' for stdin)
        #[arg(long)]
        file: PathBuf,
    },

    /// Replace a task's decomposition (only before any step completes)
    Redecompose {
        id: String,
        #[arg(long = "step", value_name = "NAME")]
        steps: Vec<String>,
        #[arg(long, conflicts_with = "steps")]
        plan: Option<PathBuf>,
        #[arg(long)]
        batch_size: Option<u32>,
    },

    /// Delete a task record
    Delete {
        id: String,
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },

    /// Inspect and validate configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root, cli.json),
        Commands::Create {
            description,
            steps,
            plan,
            batch_size,
            id,
        } => cmd::task::create(
            &root,
            &description.join(" "),
            cmd::PlanArgs {
                steps,
                plan,
                batch_size,
            },
            id.as_deref(),
            cli.json,
        ),
        Commands::List => cmd::task::list(&root, cli.json),
        Commands::Show { id } => cmd::task::show(&root, &id, cli.json),
        Commands::Resume { id } => cmd::task::resume(&root, &id, cli.json),
        Commands::Step { subcommand } => cmd::step::run(&root, subcommand, cli.json),
        Commands::Batch { subcommand } => cmd::batch::run(&root, subcommand, cli.json),
        Commands::Finalize { id, file } => cmd::task::finalize(&root, &id, &file, cli.json),
        Commands::Redecompose {
            id,
            steps,
            plan,
            batch_size,
        } => cmd::task::redecompose(
            &root,
            &id,
            cmd::PlanArgs {
                steps,
                plan,
                batch_size,
            },
            cli.json,
        ),
        Commands::Delete { id, yes } => cmd::task::delete(&root, &id, yes, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
