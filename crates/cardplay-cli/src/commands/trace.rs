//! Trace command: record one window for later replay.

use std::collections::BTreeSet;
use std::path::PathBuf;

use cardplay_core::{TickWindow, record};
use clap::Args;

use super::common::{load_project, parse_port, parse_window};

#[derive(Args)]
pub struct TraceArgs {
    /// Factory project name or project file path
    project: String,

    /// Tick window to record (FROM..TO)
    #[arg(short, long, value_parser = parse_window, default_value = "0..96")]
    window: TickWindow,

    /// Restrict the trace to this output (node:port); repeatable
    #[arg(long = "watch", value_name = "NODE:PORT", value_parser = parse_port)]
    watch: Vec<String>,

    /// Evaluate this many ticks before recording, so the trace starts
    /// from warmed-up card state
    #[arg(long, default_value = "0")]
    warmup: i64,

    /// Trace file to write
    #[arg(short, long, default_value = "trace.json")]
    output: PathBuf,
}

pub fn run(args: TraceArgs) -> anyhow::Result<()> {
    let project = load_project(&args.project)?;
    let plan = project.compiler().compile(&project.graph, &project.registries);
    let mut executor = project.executor();
    let transport = project.transport();

    if args.warmup > 0 {
        let from = args.window.from - args.warmup;
        let warmup = TickWindow::new(from, args.window.from);
        executor.evaluate(&plan, &project.graph, &project.registries, warmup, &transport.at(from))?;
    }

    let watched = (!args.watch.is_empty()).then(|| args.watch.iter().cloned().collect::<BTreeSet<_>>());
    let (entry, eval) = record(
        &mut executor,
        &plan,
        &project.graph,
        &project.registries,
        args.window,
        &transport.at(args.window.from),
        watched,
    )?;

    std::fs::write(&args.output, entry.to_json()?)?;
    println!("Recorded {} of '{}'", args.window, project.name);
    println!("  structure: {}", entry.structure_hash);
    for (port, summary) in &entry.outputs {
        println!("  {port:24} {} x{} {}", summary.kind, summary.len, &summary.hash[..12.min(summary.hash.len())]);
    }
    if !eval.diagnostics.is_empty() {
        println!("  ({} diagnostics during the window)", eval.diagnostics.len());
    }
    println!("Saved: {}", args.output.display());
    Ok(())
}
