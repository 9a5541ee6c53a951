//! Replay command: verify a project against a recorded trace.

use std::path::PathBuf;

use cardplay_core::{ReplayOutcome, TraceEntry, replay};
use clap::Args;

use super::common::{load_project, print_issues};

#[derive(Args)]
pub struct ReplayArgs {
    /// Factory project name or project file path
    project: String,

    /// Trace file written by 'cardplay trace'
    trace: PathBuf,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

pub fn run(args: ReplayArgs) -> anyhow::Result<()> {
    let project = load_project(&args.project)?;
    let text = std::fs::read_to_string(&args.trace)
        .map_err(|e| anyhow::anyhow!("failed to read trace '{}': {e}", args.trace.display()))?;
    let entry = TraceEntry::from_json(&text)?;

    let plan = project.compiler().compile(&project.graph, &project.registries);
    let report = replay(&entry, &project.executor(), &plan, &project.graph, &project.registries)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Replaying {} of '{}'", entry.window, project.name);
        if report.structure_changed {
            println!("  graph structure changed since recording");
        }
        match &report.outcome {
            ReplayOutcome::Match => println!("  match ({} outputs)", entry.outputs.len()),
            ReplayOutcome::Mismatch(diffs) => {
                println!("  mismatch on {} port(s):", diffs.len());
                print_issues(&report.issues());
            }
        }
    }

    if !report.is_match() {
        anyhow::bail!("replay of '{}' does not match the trace", project.name);
    }
    Ok(())
}
