//! Offline render command.
//!
//! Evaluates a project chunk by chunk, as a host would during playback,
//! then writes event streams as JSON and audio buffers as 32-bit float WAV.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use cardplay_core::{AudioBuffer, CardCategory, Issue, RuntimeValue, Tick, TickWindow, port_key};
use clap::Args;
use hound::{SampleFormat, WavSpec, WavWriter};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::common::{load_project, parse_port, parse_window, print_issues};

#[derive(Args)]
pub struct RenderArgs {
    /// Factory project name or project file path
    project: String,

    /// Tick window to render (FROM..TO)
    #[arg(short, long, value_parser = parse_window, default_value = "0..384")]
    window: TickWindow,

    /// Ticks per evaluate call (default: one beat)
    #[arg(long)]
    chunk: Option<Tick>,

    /// Output directory
    #[arg(short, long, default_value = "render")]
    out_dir: PathBuf,

    /// Output port to write, as node:port (default: every sink output)
    #[arg(long = "port", value_name = "NODE:PORT", value_parser = parse_port)]
    ports: Vec<String>,

    /// Hide the progress bar
    #[arg(short, long)]
    quiet: bool,
}

pub fn run(args: RenderArgs) -> anyhow::Result<()> {
    let project = load_project(&args.project)?;
    let plan = project.compiler().compile(&project.graph, &project.registries);
    let mut executor = project.executor();
    let transport = project.transport();

    let chunk = args.chunk.unwrap_or(Tick::from(transport.ppq));
    if chunk <= 0 {
        anyhow::bail!("Chunk size must be at least one tick");
    }
    let chunks = args.window.batches(chunk);

    let pb = ProgressBar::new(chunks.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({eta})")?
            .progress_chars("##-"),
    );
    if args.quiet {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    }

    let mut values: BTreeMap<String, RuntimeValue> = BTreeMap::new();
    let mut diagnostics: Vec<Issue> = Vec::new();
    let mut captured = Vec::new();
    for window in chunks {
        let eval = executor.evaluate(&plan, &project.graph, &project.registries, window, &transport.at(window.from))?;
        for (key, value) in eval.values {
            match values.get_mut(&key) {
                Some(existing) => existing.append(value),
                None => {
                    values.insert(key, value);
                }
            }
        }
        for issue in eval.diagnostics {
            if !diagnostics.contains(&issue) {
                diagnostics.push(issue);
            }
        }
        if !eval.captured.is_empty() || eval.dropped_events > 0 {
            captured.push(serde_json::json!({
                "window": window,
                "events": eval.captured,
                "dropped": eval.dropped_events,
            }));
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    let ports = if args.ports.is_empty() {
        sink_ports(&project.graph, &project.registries)
    } else {
        args.ports.clone()
    };

    std::fs::create_dir_all(&args.out_dir)?;
    println!("Rendered {} of '{}'", args.window, project.name);
    for key in &ports {
        let Some(value) = values.get(key) else {
            tracing::warn!(port = %key, "no value produced");
            println!("  {key}: no value");
            continue;
        };
        let stem = key.replace(':', "_");
        match value {
            RuntimeValue::AudioBuffer(buffer) => {
                let path = args.out_dir.join(format!("{stem}.wav"));
                write_wav(&path, buffer)?;
                println!("  {key}: {} frames -> {}", buffer.samples.len(), path.display());
            }
            RuntimeValue::EventStream(events) => {
                let path = args.out_dir.join(format!("{stem}.json"));
                std::fs::write(&path, serde_json::to_string_pretty(events)?)?;
                println!("  {key}: {} events -> {}", events.len(), path.display());
            }
            RuntimeValue::Control(level) => {
                let path = args.out_dir.join(format!("{stem}.json"));
                std::fs::write(&path, serde_json::to_string_pretty(level)?)?;
                println!("  {key}: {level} -> {}", path.display());
            }
        }
    }

    if !captured.is_empty() {
        let path = args.out_dir.join("captured.json");
        std::fs::write(&path, serde_json::to_string_pretty(&captured)?)?;
        println!("  capture -> {}", path.display());
    }

    if !diagnostics.is_empty() {
        println!();
        println!("Diagnostics ({}):", diagnostics.len());
        print_issues(&diagnostics);
    }
    Ok(())
}

/// Output keys of every sink node, in node order.
fn sink_ports(graph: &cardplay_core::Graph, registries: &cardplay_core::RegistrySet) -> Vec<String> {
    graph
        .nodes()
        .filter_map(|node| {
            let def = registries.card(&node.card_type)?;
            (def.category == CardCategory::Sink).then_some((node, def))
        })
        .flat_map(|(node, def)| {
            def.ports
                .outputs
                .iter()
                .map(move |port| port_key(node.id.as_str(), &port.name))
        })
        .collect()
}

/// Writes a mono 32-bit float WAV file.
fn write_wav(path: &Path, buffer: &AudioBuffer) -> anyhow::Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: buffer.sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(path, spec)?;
    for &sample in &buffer.samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}
