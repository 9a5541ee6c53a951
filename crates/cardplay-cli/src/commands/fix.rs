//! Fix command: plan and apply repairs, optionally as a preview.

use std::path::PathBuf;

use cardplay_config::ProjectFile;
use cardplay_core::{FixPolicy, apply_fixes, fix_to_fixed_point, plan_fixes};
use clap::Args;

use super::common::{load_project, print_issues};

#[derive(Args)]
pub struct FixArgs {
    /// Factory project name or project file path
    project: String,

    /// Insert provisional nodes and show them without committing
    #[arg(long, conflicts_with = "output")]
    preview: bool,

    /// Also break cycles by inserting delay cards
    #[arg(long)]
    break_cycles: bool,

    /// Maximum lint-plan-apply rounds
    #[arg(long, default_value = "8")]
    rounds: usize,

    /// Write the repaired project here (TOML, or JSON by extension)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

pub fn run(args: FixArgs) -> anyhow::Result<()> {
    let project = load_project(&args.project)?;
    let policy = FixPolicy {
        preview: args.preview,
        break_cycles: args.break_cycles,
    };

    if args.preview {
        let fixes = plan_fixes(&project.lint(), &policy);
        let previewed = apply_fixes(&project.graph, &fixes, &project.registries, &policy);
        println!("Planned fixes ({}):", fixes.len());
        for fix in &fixes {
            println!("  {fix}");
        }
        let provisional: Vec<_> = previewed.nodes().filter(|n| n.provisional).collect();
        println!();
        println!("Preview nodes ({}):", provisional.len());
        for node in provisional {
            println!("  {} ({})", node.id, node.card_type);
        }
        return Ok(());
    }

    let report = fix_to_fixed_point(&project.graph, &project.registries, &policy, args.rounds);
    println!("Applied {} fix(es) in {} round(s):", report.applied.len(), report.rounds);
    for fix in &report.applied {
        println!("  {fix}");
    }
    println!();
    if report.remaining.is_empty() {
        println!("No issues remain.");
    } else {
        println!("Remaining issues ({}):", report.remaining.len());
        print_issues(&report.remaining);
    }

    if let Some(path) = &args.output {
        let file = ProjectFile::from_graph(project.name.clone(), &report.graph, &project.containers, project.settings)?;
        file.save(path)?;
        println!();
        println!("Saved: {}", path.display());
    }
    Ok(())
}
