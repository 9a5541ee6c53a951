//! Project lint command.

use cardplay_core::{Severity, coverage};
use clap::Args;

use super::common::{load_project, print_issues};

#[derive(Args)]
pub struct LintArgs {
    /// Factory project name or project file path
    project: String,

    /// Fail when any issue has error severity
    #[arg(long)]
    strict: bool,

    /// Print issues and coverage as JSON
    #[arg(long)]
    json: bool,
}

pub fn run(args: LintArgs) -> anyhow::Result<()> {
    let project = load_project(&args.project)?;
    let issues = project.lint();
    let report = coverage(&project.graph, &project.registries, &issues);
    let errors = issues.iter().filter(|i| i.severity == Severity::Error).count();

    if args.json {
        let out = serde_json::json!({
            "project": project.name,
            "issues": issues,
            "coverage": report,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("Project: {}", project.name);
        println!(
            "Graph: {} nodes, {} edges, {:.0}% of inputs connected",
            report.nodes,
            report.edges,
            report.input_coverage() * 100.0
        );
        println!();
        if issues.is_empty() {
            println!("No issues.");
        } else {
            println!("Issues ({}):", issues.len());
            print_issues(&issues);
            println!();
            println!("Run 'cardplay fix {}' to apply the suggested fixes.", args.project);
        }
    }

    if args.strict && errors > 0 {
        anyhow::bail!("{errors} error(s) in '{}'", project.name);
    }
    Ok(())
}
