//! CardPlay CLI - compile, check, repair and render card graph projects.

mod commands;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cardplay")]
#[command(author, version, about = "CardPlay graph engine CLI", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered cards and their ports and parameters
    Cards(commands::cards::CardsArgs),

    /// Report graph issues in a project
    Lint(commands::lint::LintArgs),

    /// Apply suggested fixes to a project
    Fix(commands::fix::FixArgs),

    /// Show the compiled execution plan
    Plan(commands::plan::PlanArgs),

    /// Evaluate a project offline and write its outputs
    Render(commands::render::RenderArgs),

    /// Record a window into a replay trace
    Trace(commands::trace::TraceArgs),

    /// Replay a trace against the current project
    Replay(commands::replay::ReplayArgs),

    /// List and export the factory projects
    Projects(commands::projects::ProjectsArgs),
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Cards(args) => commands::cards::run(args),
        Commands::Lint(args) => commands::lint::run(args),
        Commands::Fix(args) => commands::fix::run(args),
        Commands::Plan(args) => commands::plan::run(args),
        Commands::Render(args) => commands::render::run(args),
        Commands::Trace(args) => commands::trace::run(args),
        Commands::Replay(args) => commands::replay::run(args),
        Commands::Projects(args) => commands::projects::run(args),
    }
}
