//! Stack compilation.
//!
//! A [`Stack`] is a declarative composition of card instances. It is never
//! executed directly: [`compile_stack()`] flattens it into nodes and edges of
//! a [`Graph`] and reports the ports the stack exposes to its surroundings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::card::PortSpec;
use crate::diag::{FixAction, Issue, IssueKind, insert_adapter};
use crate::graph::{Endpoint, Graph, GraphNode, NodeId, describe_adapter};
use crate::param::Params;
use crate::registry::RegistrySet;

/// How member cards are composed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StackMode {
    /// Each card feeds the next.
    #[default]
    Serial,
    /// Cards run side by side.
    Parallel,
}

/// How the stack presents its members.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StackBehavior {
    /// All members are active.
    #[default]
    Layer,
    /// One member is active, chosen by tab.
    Tabs,
    /// One member is active, chosen by switch.
    Switch,
}

impl StackBehavior {
    /// Returns true for "exactly one of N" behaviors.
    pub fn is_exclusive(&self) -> bool {
        matches!(self, StackBehavior::Tabs | StackBehavior::Switch)
    }
}

/// A user card instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardInstance {
    /// Instance id; becomes the node id.
    pub id: String,
    /// Card type.
    pub card_type: String,
    /// User parameters.
    #[serde(default)]
    pub params: Params,
}

impl CardInstance {
    /// Creates an instance with default parameters.
    pub fn new(id: &str, card_type: &str) -> Self {
        Self {
            id: id.to_string(),
            card_type: card_type.to_string(),
            params: Params::new(),
        }
    }
}

/// Explicit wiring between two members of a serial stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBinding {
    /// Producer instance id.
    pub from_card: String,
    /// Producer output port.
    pub from_port: String,
    /// Consumer instance id.
    pub to_card: String,
    /// Consumer input port.
    pub to_port: String,
}

/// A declarative composition of card instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stack {
    /// Stack id.
    pub id: String,
    /// Member instance ids in order.
    pub cards: Vec<String>,
    /// Composition mode.
    #[serde(default)]
    pub mode: StackMode,
    /// Presentation behavior.
    #[serde(default)]
    pub behavior: StackBehavior,
    /// Explicit bindings; positional wiring is used for pairs without any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bindings: Vec<PortBinding>,
    /// Active member for tabs and switch stacks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_card_index: Option<usize>,
}

impl Stack {
    /// A serial layer stack over `cards`.
    pub fn serial(id: &str, cards: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            cards: cards.iter().map(|c| (*c).to_string()).collect(),
            mode: StackMode::Serial,
            behavior: StackBehavior::Layer,
            bindings: Vec::new(),
            active_card_index: None,
        }
    }

    /// A parallel layer stack over `cards`.
    pub fn parallel(id: &str, cards: &[&str]) -> Self {
        Self {
            mode: StackMode::Parallel,
            ..Self::serial(id, cards)
        }
    }

    /// Switches the behavior.
    pub fn with_behavior(mut self, behavior: StackBehavior, active: Option<usize>) -> Self {
        self.behavior = behavior;
        self.active_card_index = active;
        self
    }

    /// Adds an explicit binding.
    pub fn bind(mut self, from_card: &str, from_port: &str, to_card: &str, to_port: &str) -> Self {
        self.bindings.push(PortBinding {
            from_card: from_card.to_string(),
            from_port: from_port.to_string(),
            to_card: to_card.to_string(),
            to_port: to_port.to_string(),
        });
        self
    }
}

/// A port a compiled stack exposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposedPort {
    /// Port name.
    pub name: String,
    /// Port type.
    pub port_type: String,
    /// Member ports behind it.
    pub endpoints: Vec<Endpoint>,
}

/// Outer signature of a compiled stack plus the issues found.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StackInterface {
    /// Stack inputs.
    pub inputs: Vec<ExposedPort>,
    /// Stack outputs.
    pub outputs: Vec<ExposedPort>,
    /// Active member of a tabs or switch stack.
    pub active: Option<NodeId>,
    /// Problems found while compiling.
    pub issues: Vec<Issue>,
}

/// Options for [`compile_stack()`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StackOptions {
    /// Insert adapter nodes on type-incompatible serial wiring.
    pub auto_fix: bool,
}

/// Flattens `stack` into `graph`.
///
/// Member instances are looked up in `instances` and added as nodes; serial
/// stacks are wired pairwise, other stacks only contribute nodes.
pub fn compile_stack(
    graph: &mut Graph,
    stack: &Stack,
    instances: &[CardInstance],
    registries: &RegistrySet,
    options: StackOptions,
) -> StackInterface {
    let by_id: BTreeMap<&str, &CardInstance> = instances.iter().map(|i| (i.id.as_str(), i)).collect();
    let mut interface = StackInterface::default();
    let mut members: Vec<NodeId> = Vec::new();

    for card in &stack.cards {
        let Some(instance) = by_id.get(card.as_str()) else {
            interface.issues.push(
                Issue::new(
                    IssueKind::DanglingReference,
                    format!("Stack `{}` lists card `{card}`, which is not defined", stack.id),
                )
                .node(card.as_str()),
            );
            continue;
        };
        if members.iter().any(|m| m.as_str() == card) || graph.contains_node(card) {
            interface.issues.push(
                Issue::new(
                    IssueKind::DuplicateId,
                    format!("Card `{card}` appears more than once (stack `{}`)", stack.id),
                )
                .node(card.as_str()),
            );
            continue;
        }
        if registries.card(&instance.card_type).is_none() {
            interface.issues.push(
                Issue::new(
                    IssueKind::UnknownCardType,
                    format!("Card `{card}` has unknown type `{}`", instance.card_type),
                )
                .node(card.as_str()),
            );
        }
        let mut node = GraphNode::new(card.as_str(), &instance.card_type);
        node.params = instance.params.clone();
        if let Ok(id) = graph.add_node(node) {
            members.push(id);
        }
    }

    let ports_of = |id: &NodeId| -> Vec<(NodeId, PortSpec, bool)> {
        let Some(def) = graph.node(id.as_str()).and_then(|n| n.resolved_ports(registries)) else {
            return Vec::new();
        };
        def.inputs
            .iter()
            .map(|p| (id.clone(), p.clone(), true))
            .chain(def.outputs.iter().map(|p| (id.clone(), p.clone(), false)))
            .collect()
    };
    let member_ports: Vec<Vec<(NodeId, PortSpec, bool)>> = members.iter().map(ports_of).collect();

    if stack.mode == StackMode::Serial && !stack.behavior.is_exclusive() {
        for pair in members.windows(2) {
            wire_pair(graph, stack, &pair[0], &pair[1], registries, options, &mut interface);
        }
        if let Some(first) = member_ports.first() {
            interface.inputs = expose(first.iter().filter(|p| p.2));
        }
        if let Some(last) = member_ports.last() {
            interface.outputs = expose(last.iter().filter(|p| !p.2));
        }
    } else {
        let all = member_ports.iter().flatten();
        interface.inputs = union_inputs(stack, all.clone().filter(|p| p.2), registries, &mut interface.issues);
        interface.outputs = expose(all.filter(|p| !p.2));
    }

    if stack.behavior.is_exclusive() {
        match stack.active_card_index {
            Some(index) if index < members.len() => interface.active = Some(members[index].clone()),
            Some(index) => interface.issues.push(Issue::new(
                IssueKind::DanglingReference,
                format!(
                    "Stack `{}` selects card {index} but has {} members",
                    stack.id,
                    members.len()
                ),
            )),
            None => {}
        }
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(
        stack = %stack.id,
        members = members.len(),
        issues = interface.issues.len(),
        "compile_stack: done"
    );
    interface
}

fn expose<'a>(ports: impl Iterator<Item = &'a (NodeId, PortSpec, bool)>) -> Vec<ExposedPort> {
    ports
        .map(|(node, spec, _)| ExposedPort {
            name: spec.name.clone(),
            port_type: spec.port_type.clone(),
            endpoints: vec![Endpoint::new(node.clone(), &spec.name)],
        })
        .collect()
}

/// Union of inputs deduplicated by `(name, type)`. Same-named ports with
/// incompatible types are reported.
fn union_inputs<'a>(
    stack: &Stack,
    ports: impl Iterator<Item = &'a (NodeId, PortSpec, bool)>,
    registries: &RegistrySet,
    issues: &mut Vec<Issue>,
) -> Vec<ExposedPort> {
    let types = registries.types();
    let mut union: Vec<ExposedPort> = Vec::new();
    for (node, spec, _) in ports {
        let endpoint = Endpoint::new(node.clone(), &spec.name);
        if let Some(existing) = union
            .iter_mut()
            .find(|p| p.name == spec.name && p.port_type == spec.port_type)
        {
            existing.endpoints.push(endpoint);
            continue;
        }
        if let Some(clash) = union.iter().find(|p| {
            p.name == spec.name
                && !types.is_compatible(&p.port_type, &spec.port_type)
                && !types.is_compatible(&spec.port_type, &p.port_type)
        }) {
            let mut issue = Issue::new(
                IssueKind::PortConflict,
                format!(
                    "Stack `{}` needs input `{}` as both `{}` and `{}`",
                    stack.id, spec.name, clash.port_type, spec.port_type
                ),
            )
            .at_port(&spec.name)
            .node(node.clone());
            for other in &clash.endpoints {
                issue = issue.node(other.node.clone());
            }
            issues.push(issue);
        }
        union.push(ExposedPort {
            name: spec.name.clone(),
            port_type: spec.port_type.clone(),
            endpoints: vec![endpoint],
        });
    }
    union
}

fn wire_pair(
    graph: &mut Graph,
    stack: &Stack,
    from: &NodeId,
    to: &NodeId,
    registries: &RegistrySet,
    options: StackOptions,
    interface: &mut StackInterface,
) {
    let (Some(out_ports), Some(in_ports)) = (
        graph.node(from.as_str()).and_then(|n| n.resolved_ports(registries)).cloned(),
        graph.node(to.as_str()).and_then(|n| n.resolved_ports(registries)).cloned(),
    ) else {
        return;
    };

    let bound: Vec<_> = stack
        .bindings
        .iter()
        .filter(|b| b.from_card == from.as_str() && b.to_card == to.as_str())
        .collect();
    let mut pairs: Vec<(PortSpec, PortSpec)> = Vec::new();
    if bound.is_empty() {
        let inputs: Vec<&PortSpec> = in_ports.inputs.iter().filter(|p| !p.feedback).collect();
        if out_ports.outputs.len() != inputs.len() {
            interface.issues.push(
                Issue::new(
                    IssueKind::ArityMismatch,
                    format!(
                        "`{from}` has {} outputs but `{to}` has {} inputs; wiring the first {}",
                        out_ports.outputs.len(),
                        inputs.len(),
                        out_ports.outputs.len().min(inputs.len())
                    ),
                )
                .node(from.clone())
                .node(to.clone()),
            );
        }
        pairs.extend(
            out_ports
                .outputs
                .iter()
                .zip(inputs)
                .map(|(o, i)| (o.clone(), i.clone())),
        );
    } else {
        for binding in bound {
            match (out_ports.output(&binding.from_port), in_ports.input(&binding.to_port)) {
                (Some(o), Some(i)) => pairs.push((o.clone(), i.clone())),
                _ => interface.issues.push(
                    Issue::new(
                        IssueKind::DanglingReference,
                        format!(
                            "Binding {}.{} -> {}.{} names a port that does not exist",
                            binding.from_card, binding.from_port, binding.to_card, binding.to_port
                        ),
                    )
                    .node(from.clone())
                    .node(to.clone()),
                ),
            }
        }
    }

    let types = registries.types();
    for (out, inp) in pairs {
        let edge = graph.connect(from.as_str(), &out.name, to.as_str(), &inp.name);
        if types.is_directly_compatible(&out.port_type, &inp.port_type) {
            continue;
        }
        let path = types.cheapest_adapter_path(&out.port_type, &inp.port_type);
        let advice = path
            .as_ref()
            .map_or_else(|| "no adapter path is registered".to_string(), describe_adapter);
        let mut issue = Issue::new(
            IssueKind::TypeIncompatible,
            format!(
                "Port `{}` (type `{}`) cannot connect to `{}` (type `{}`); {advice}",
                out.name, out.port_type, inp.name, inp.port_type
            ),
        )
        .node(from.clone())
        .node(to.clone())
        .edge(edge)
        .at_port(&inp.name);
        if let Some(path) = path {
            if options.auto_fix && insert_adapter(graph, edge, &path, registries, false) {
                continue;
            }
            issue = issue.suggest(FixAction::InsertAdapter { edge, path });
        }
        interface.issues.push(issue);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{CardCategory, CardDefinition, CardError, ProcessContext};
    use crate::diag::count_kind;
    use crate::graph::validate;
    use crate::types::{AdapterEdge, PortTypeDef};
    use crate::value::ValueKind;

    fn noop(_: &mut ProcessContext<'_>) -> Result<(), CardError> {
        Ok(())
    }

    fn registries() -> RegistrySet {
        let mut set = RegistrySet::new();
        set.register_port_type(PortTypeDef::new("notes", ValueKind::EventStream)).unwrap();
        set.register_port_type(PortTypeDef::new("cv", ValueKind::Control)).unwrap();
        set.register_card(
            CardDefinition::new("gen", CardCategory::Generator, noop).output(PortSpec::new("out", "notes")),
        )
        .unwrap();
        set.register_card(
            CardDefinition::new("fx", CardCategory::Transform, noop)
                .input(PortSpec::new("in", "notes"))
                .output(PortSpec::new("out", "notes")),
        )
        .unwrap();
        set.register_card(
            CardDefinition::new("cvfx", CardCategory::Transform, noop)
                .input(PortSpec::new("in", "cv"))
                .output(PortSpec::new("out", "cv")),
        )
        .unwrap();
        set.register_card(
            CardDefinition::new("n2c", CardCategory::Adapter, noop)
                .input(PortSpec::new("in", "notes"))
                .output(PortSpec::new("out", "cv")),
        )
        .unwrap();
        set.register_adapter(AdapterEdge::new("notes", "cv", "n2c", 1)).unwrap();
        set
    }

    fn instances() -> Vec<CardInstance> {
        vec![
            CardInstance::new("g", "gen"),
            CardInstance::new("f", "fx"),
            CardInstance::new("c", "cvfx"),
        ]
    }

    #[test]
    fn serial_wires_positionally() {
        let reg = registries();
        let mut g = Graph::new();
        let iface = compile_stack(&mut g, &Stack::serial("s", &["g", "f"]), &instances(), &reg, StackOptions::default());
        assert!(iface.issues.is_empty());
        assert_eq!(g.edge_count(), 1);
        assert!(iface.inputs.is_empty());
        assert_eq!(iface.outputs[0].endpoints[0].to_string(), "f.out");
    }

    #[test]
    fn serial_mismatch_is_reported_then_fixed() {
        let reg = registries();
        let stack = Stack::serial("s", &["g", "c"]);

        let mut plain = Graph::new();
        let iface = compile_stack(&mut plain, &stack, &instances(), &reg, StackOptions::default());
        assert_eq!(count_kind(&iface.issues, IssueKind::TypeIncompatible), 1);
        assert_eq!(count_kind(&validate(&plain, &reg), IssueKind::TypeIncompatible), 1);

        let mut fixed = Graph::new();
        let iface = compile_stack(&mut fixed, &stack, &instances(), &reg, StackOptions { auto_fix: true });
        assert!(iface.issues.is_empty());
        assert_eq!(fixed.node_count(), 3);
        assert!(validate(&fixed, &reg).is_empty());
    }

    #[test]
    fn arity_mismatch_is_flagged() {
        let reg = registries();
        let mut g = Graph::new();
        let iface = compile_stack(&mut g, &Stack::serial("s", &["f", "g"]), &instances(), &reg, StackOptions::default());
        assert_eq!(count_kind(&iface.issues, IssueKind::ArityMismatch), 1);
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn parallel_unions_inputs() {
        let reg = registries();
        let mut g = Graph::new();
        let mut cards = instances();
        cards.push(CardInstance::new("f2", "fx"));
        let iface = compile_stack(&mut g, &Stack::parallel("p", &["f", "f2", "c"]), &cards, &reg, StackOptions::default());
        assert_eq!(iface.inputs.len(), 2);
        assert_eq!(iface.inputs[0].endpoints.len(), 2);
        // `in` as notes and as cv: notes adapts into cv, so no conflict.
        assert_eq!(count_kind(&iface.issues, IssueKind::PortConflict), 0);
        assert_eq!(iface.outputs.len(), 3);
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn tabs_track_active_card() {
        let reg = registries();
        let mut g = Graph::new();
        let stack = Stack::serial("t", &["f", "c"]).with_behavior(StackBehavior::Tabs, Some(1));
        let iface = compile_stack(&mut g, &stack, &instances(), &reg, StackOptions::default());
        assert_eq!(iface.active.as_ref().map(NodeId::as_str), Some("c"));
        assert_eq!(g.edge_count(), 0);
        assert_eq!(iface.inputs.len(), 2);
    }

    #[test]
    fn missing_and_duplicate_members() {
        let reg = registries();
        let mut g = Graph::new();
        let iface = compile_stack(&mut g, &Stack::serial("s", &["g", "nope", "g"]), &instances(), &reg, StackOptions::default());
        assert_eq!(count_kind(&iface.issues, IssueKind::DanglingReference), 1);
        assert_eq!(count_kind(&iface.issues, IssueKind::DuplicateId), 1);
        assert_eq!(g.node_count(), 1);
    }
}
