//! Shared CLI helpers used across multiple commands.

use std::path::Path;

use cardplay_config::{Project, ProjectFile, get_factory_project, parse_endpoint};
use cardplay_core::{Issue, Severity, Tick, TickWindow, port_key};

/// Parse a `FROM..TO` tick window for clap's `value_parser`.
pub fn parse_window(s: &str) -> Result<TickWindow, String> {
    let (from, to) = s
        .split_once("..")
        .ok_or_else(|| format!("Invalid window: '{s}' (expected FROM..TO in ticks)"))?;
    let from: Tick = from
        .trim()
        .parse()
        .map_err(|_| format!("Invalid window start: '{from}'"))?;
    let to: Tick = to.trim().parse().map_err(|_| format!("Invalid window end: '{to}'"))?;
    if to <= from {
        return Err(format!("Empty window: {s}"));
    }
    Ok(TickWindow::new(from, to))
}

/// Parse a `node:port` endpoint into an output key.
pub fn parse_port(s: &str) -> Result<String, String> {
    parse_endpoint(s)
        .map(|(node, port)| port_key(node, port))
        .ok_or_else(|| format!("Invalid port: '{s}' (expected node:port)"))
}

/// Load a project file by factory name or path.
pub fn load_project_file(name: &str) -> anyhow::Result<ProjectFile> {
    if let Some(project) = get_factory_project(name) {
        return Ok(project);
    }

    let path = Path::new(name);
    if path.exists() {
        return Ok(ProjectFile::load(path)?);
    }

    anyhow::bail!("Project '{name}' not found. Use 'cardplay projects' to see the factory projects.")
}

/// Load and hydrate a project over the builtin registries.
pub fn load_project(name: &str) -> anyhow::Result<Project> {
    let file = load_project_file(name)?;
    let project = file.hydrate(cardplay_registry::builtin_registry()?)?;
    tracing::info!(project = %project.name, nodes = project.graph.node_count(), "loaded");
    Ok(project)
}

/// Print issues with their suggested fixes. Returns the number of errors.
pub fn print_issues(issues: &[Issue]) -> usize {
    for issue in issues {
        println!("  {issue}");
        for fix in &issue.suggestions {
            println!("      fix: {fix}");
        }
    }
    issues.iter().filter(|i| i.severity == Severity::Error).count()
}
