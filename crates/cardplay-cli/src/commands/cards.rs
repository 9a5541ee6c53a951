//! Card listing and information command.

#![allow(clippy::print_literal)] // Table headers use literal strings intentionally

use cardplay_core::{CardCategory, CardDefinition, PortSpec, Provenance, RegistrySet};
use cardplay_registry::{BUNDLED, builtin_registry, bundled_pack, category_description};
use clap::Args;

const CATEGORIES: [CardCategory; 7] = [
    CardCategory::Generator,
    CardCategory::Transform,
    CardCategory::Audio,
    CardCategory::Adapter,
    CardCategory::Merge,
    CardCategory::Delay,
    CardCategory::Sink,
];

#[derive(Args)]
pub struct CardsArgs {
    /// Show details for a specific card type
    #[arg(value_name = "CARD")]
    card: Option<String>,

    /// Include cards from the bundled packs
    #[arg(long)]
    packs: bool,

    /// Print definitions as JSON
    #[arg(long)]
    json: bool,
}

pub fn run(args: CardsArgs) -> anyhow::Result<()> {
    let mut registries = builtin_registry()?;
    if args.packs {
        for id in BUNDLED {
            if let Some(pack) = bundled_pack(id) {
                registries.install_pack(pack)?;
            }
        }
    }

    if let Some(card_type) = &args.card {
        let def = registries
            .card(card_type)
            .ok_or_else(|| anyhow::anyhow!("Unknown card type: {card_type} (try --packs for pack cards)"))?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&describe_json(def))?);
        } else {
            show_card(def);
        }
        return Ok(());
    }

    if args.json {
        let all: Vec<_> = registries.cards().list().map(describe_json).collect();
        println!("{}", serde_json::to_string_pretty(&all)?);
        return Ok(());
    }

    list_cards(&registries);
    Ok(())
}

fn list_cards(registries: &RegistrySet) {
    println!("Available Cards");
    println!("===============");

    for category in CATEGORIES {
        let cards: Vec<&CardDefinition> = registries.cards().in_category(category).collect();
        if cards.is_empty() {
            continue;
        }
        println!();
        println!("{} - {}", category.name(), category_description(category));
        for def in cards {
            let origin = match &def.provenance {
                Provenance::Builtin => String::new(),
                Provenance::Pack { id, version } => format!(" [{id} {version}]"),
            };
            println!("  {:24} {}{}", def.card_type, def.description, origin);
        }
    }

    println!();
    println!("Use 'cardplay cards <type>' for ports and parameters.");
}

fn show_card(def: &CardDefinition) {
    println!("{}", def.card_type);
    println!("{}", "=".repeat(def.card_type.len()));
    println!();
    println!("{}", def.description);
    println!("Category: {}", def.category.name());
    if let Provenance::Pack { id, version } = &def.provenance {
        println!("Pack: {id} {version}");
    }
    if !def.capabilities.is_empty() {
        let caps: Vec<&str> = def.capabilities.iter().map(String::as_str).collect();
        println!("Capabilities: {}", caps.join(", "));
    }

    println!();
    println!("Ports:");
    for port in &def.ports.inputs {
        println!("  in   {:10} {:12}{}", port.name, port.port_type, flags(port));
    }
    for port in &def.ports.outputs {
        println!("  out  {:10} {}", port.name, port.port_type);
    }

    if !def.params.is_empty() {
        println!();
        println!("Parameters:");
        println!();
        println!("  {:12}  {:10}  {:16}  {}", "Name", "Default", "Range", "Description");
        println!("  {:12}  {:10}  {:16}  {}", "----", "-------", "-----", "-----------");
        for param in &def.params {
            let range = match (param.min, param.max) {
                (Some(min), Some(max)) => format!("{min} .. {max}"),
                _ => String::new(),
            };
            println!(
                "  {:12}  {:10}  {:16}  {}",
                param.name,
                param.default.to_string(),
                range,
                param.description
            );
        }
    }

    if !def.state.is_empty() {
        println!();
        let fields: Vec<&str> = def.state.iter().map(|(name, _)| name.as_str()).collect();
        println!("State: {}", fields.join(", "));
    }
}

fn flags(port: &PortSpec) -> String {
    let mut flags = Vec::new();
    if port.optional {
        flags.push("optional");
    }
    if port.multi {
        flags.push("multi");
    }
    if port.feedback {
        flags.push("feedback");
    }
    if flags.is_empty() {
        String::new()
    } else {
        format!(" ({})", flags.join(", "))
    }
}

fn describe_json(def: &CardDefinition) -> serde_json::Value {
    serde_json::json!({
        "type": def.card_type,
        "category": def.category.name(),
        "description": def.description,
        "provenance": def.provenance,
        "ports": def.ports,
        "params": def.params,
    })
}
