//! Plan command: show the execution order a project compiles to.

use cardplay_core::Compiler;
use clap::Args;

use super::common::{load_project, print_issues};

#[derive(Args)]
pub struct PlanArgs {
    /// Factory project name or project file path
    project: String,

    /// Print the plan as JSON
    #[arg(long)]
    json: bool,
}

pub fn run(args: PlanArgs) -> anyhow::Result<()> {
    let project = load_project(&args.project)?;
    let plan = Compiler::new().compile(&project.graph, &project.registries);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&*plan)?);
        return Ok(());
    }

    println!("Project: {}", project.name);
    println!("Structure: {}", plan.structure_hash);
    println!("Registry generation: {}", plan.generation);
    println!();
    println!("Execution order:");
    for (i, node) in plan.topo_order.iter().enumerate() {
        let card_type = project.graph.node(node.as_str()).map_or("?", |n| n.card_type.as_str());
        println!("  {:3}. {:20} {}", i + 1, node.as_str(), card_type);
    }

    if plan.is_cyclic() {
        println!();
        println!("Cut dependencies:");
        for (from, to) in &plan.cuts {
            println!("  {from} -> {to}");
        }
    }
    if !plan.issues.is_empty() {
        println!();
        println!("Issues ({}):", plan.issues.len());
        print_issues(&plan.issues);
    }
    Ok(())
}
