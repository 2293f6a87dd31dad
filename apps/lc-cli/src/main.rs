//! # lc-cli
//!
//! Command-line interface to the Governed Change Execution Core.
//!
//! Operators and the surrounding surfaces (REST transport, web console,
//! agent runtime) all drive the same `lc_executor::Gcec` facade this binary
//! wraps — `lc` is a thin front door over the §6 boundary operations, not a
//! second implementation of them.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "lc", version, about = "LonelyCat governed change execution core")]
struct Cli {
    /// Workspace root (defaults to the current directory).
    #[arg(long, global = true, default_value = ".")]
    workspace: PathBuf,

    /// Path to the policy snapshot (YAML). Defaults to built-in policy if absent.
    #[arg(long, global = true)]
    policy: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a plan+changeset against WriteGate and, if permitted, apply it.
    Submit {
        /// Path to a serialized ChangePlan JSON document.
        #[arg(long)]
        plan: PathBuf,
        /// Path to a serialized ChangeSet JSON document.
        #[arg(long)]
        changeset: PathBuf,
        /// Who/what is submitting (manual, agent, retry, repair, scheduled).
        #[arg(long, default_value = "manual")]
        trigger: commands::submit::TriggerArg,
    },
    /// Record a human sign-off on a NEED_APPROVAL decision.
    Approve {
        decision_id: uuid::Uuid,
        #[arg(long)]
        by: String,
        #[arg(long)]
        note: Option<String>,
    },
    /// List executions, optionally filtered.
    List {
        #[arg(long)]
        status: Option<commands::filters::StatusArg>,
        #[arg(long)]
        verdict: Option<commands::filters::VerdictArg>,
        #[arg(long)]
        correlation_id: Option<String>,
        #[arg(long, default_value = "50")]
        limit: i64,
    },
    /// Show one execution's record and step log.
    Show { execution_id: String },
    /// Tail an execution's step-event stream.
    Events {
        execution_id: String,
        #[arg(long, default_value = "20")]
        tail: usize,
    },
    /// Show an execution's lineage (ancestors/descendants/siblings).
    Lineage {
        execution_id: String,
        #[arg(long, default_value = "20")]
        depth: usize,
    },
    /// List every execution sharing a correlation id, ordered by start time.
    Correlation { correlation_id: String },
    /// Find executions similar to a given one.
    Similar {
        execution_id: String,
        #[arg(long, default_value = "5")]
        limit: usize,
        #[arg(long, default_value = "0.0")]
        min_similarity: f64,
        /// Which similarity query to run: the combined score, error text
        /// only, or affected paths only.
        #[arg(long, value_enum, default_value = "combined")]
        by: commands::filters::SimilarByArg,
    },
    /// Reconstruct an execution summary purely from its four-piece artifact set.
    Replay { execution_id: String },
    /// Print aggregate execution statistics.
    Stats,
    /// Run offline reflection analysis and write `.lonelycat/reflection/hints_7d.json`.
    Reflect {
        #[arg(long, default_value = "7")]
        window_days: i64,
    },
    /// Synthesize a case-based repair draft for a failed execution.
    Repair {
        execution_id: String,
        #[arg(long, default_value = "5")]
        limit: usize,
        #[arg(long, default_value = "0.0")]
        min_similarity: f64,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let cli = Cli::parse();
    let workspace = cli.workspace.canonicalize().unwrap_or(cli.workspace);
    let policy = commands::load_policy(cli.policy.as_deref())?;
    let gcec = lc_executor::Gcec::open(&workspace, policy)?;

    match cli.command {
        Commands::Submit { plan, changeset, trigger } => commands::submit::execute(&gcec, &plan, &changeset, trigger),
        Commands::Approve { decision_id, by, note } => commands::approve::execute(&gcec, decision_id, &by, note),
        Commands::List { status, verdict, correlation_id, limit } => {
            commands::list::execute(&gcec, status, verdict, correlation_id, limit)
        }
        Commands::Show { execution_id } => commands::show::execute(&gcec, &execution_id),
        Commands::Events { execution_id, tail } => commands::show::events(&gcec, &execution_id, tail),
        Commands::Lineage { execution_id, depth } => commands::show::lineage(&gcec, &execution_id, depth),
        Commands::Correlation { correlation_id } => commands::show::correlation(&gcec, &correlation_id),
        Commands::Similar { execution_id, limit, min_similarity, by } => {
            commands::reflect::similar(&gcec, &execution_id, limit, min_similarity, by)
        }
        Commands::Replay { execution_id } => commands::show::replay(&gcec, &execution_id),
        Commands::Stats => commands::show::stats(&gcec),
        Commands::Reflect { window_days } => commands::reflect::build_hints(&gcec, &workspace, window_days),
        Commands::Repair { execution_id, limit, min_similarity } => {
            commands::reflect::repair(&gcec, &execution_id, limit, min_similarity)
        }
    }
}
