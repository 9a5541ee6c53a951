//! Factory project commands.

use std::path::PathBuf;

use cardplay_config::{factory_projects, get_factory_project};
use clap::{Args, Subcommand};

use super::common::load_project_file;

#[derive(Args)]
pub struct ProjectsArgs {
    #[command(subcommand)]
    command: Option<ProjectsCommand>,
}

#[derive(Subcommand)]
enum ProjectsCommand {
    /// List the factory projects (default)
    List,

    /// Show the cards, stacks and edges of a project
    Show {
        /// Factory project name or project file path
        name: String,
    },

    /// Write a factory project to a file for editing
    Export {
        /// Factory project name
        name: String,

        /// Destination (TOML, or JSON by extension)
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub fn run(args: ProjectsArgs) -> anyhow::Result<()> {
    match args.command.unwrap_or(ProjectsCommand::List) {
        ProjectsCommand::List => list_projects(),
        ProjectsCommand::Show { name } => show_project(&name),
        ProjectsCommand::Export { name, path, force } => export_project(&name, path, force),
    }
}

fn list_projects() -> anyhow::Result<()> {
    println!("Factory Projects:");
    println!("=================");
    for project in factory_projects() {
        let desc = project.description.as_deref().unwrap_or("");
        println!("  {:12} - {}", project.name, desc);
    }
    println!();
    println!("Use 'cardplay projects show <name>' for details.");
    Ok(())
}

fn show_project(name: &str) -> anyhow::Result<()> {
    let project = load_project_file(name)?;

    println!("Project: {}", project.name);
    println!("{}", "=".repeat(9 + project.name.len()));
    if let Some(desc) = &project.description {
        println!();
        println!("{desc}");
    }
    println!();
    let transport = &project.engine.transport;
    println!("Transport: {} bpm, {} ppq, {} Hz", transport.bpm, transport.ppq, transport.sample_rate);
    if !project.packs.is_empty() {
        println!("Packs: {}", project.packs.join(", "));
    }

    println!();
    println!("Cards ({}):", project.cards.len());
    for card in &project.cards {
        println!("  {:10} {}", card.id, card.card_type);
        for (key, value) in &card.params {
            println!("      {key} = {value}");
        }
    }

    if !project.stacks.is_empty() {
        println!();
        println!("Stacks:");
        for stack in &project.stacks {
            println!("  {} [{:?}]: {}", stack.id, stack.mode, stack.cards.join(" -> "));
        }
    }
    if !project.edges.is_empty() {
        println!();
        println!("Edges:");
        for edge in &project.edges {
            println!("  {edge}");
        }
    }
    if !project.containers.is_empty() {
        println!();
        println!("Containers:");
        for (name, events) in &project.containers {
            println!("  {name}: {} events", events.len());
        }
    }
    Ok(())
}

fn export_project(name: &str, path: PathBuf, force: bool) -> anyhow::Result<()> {
    let project =
        get_factory_project(name).ok_or_else(|| anyhow::anyhow!("Factory project '{name}' not found"))?;

    if path.exists() && !force {
        anyhow::bail!("'{}' already exists. Use --force to overwrite.", path.display());
    }
    project.save(&path)?;
    println!("Exported '{}' to {}", project.name, path.display());
    Ok(())
}
