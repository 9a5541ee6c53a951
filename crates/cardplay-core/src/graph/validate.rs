//! Structural validation.
//!
//! [`validate()`] runs four passes in a fixed order and returns every issue
//! it finds: dangling references, wrong-direction edges, type
//! incompatibility, then implicit fan-in. An edge flagged by an earlier pass
//! is not examined by later ones.

use std::collections::{BTreeMap, BTreeSet};

use crate::card::PortSpec;
use crate::diag::{FixAction, Issue, IssueKind};
use crate::registry::RegistrySet;
use crate::types::AdapterPath;

use super::edge::{Edge, EdgeId};
use super::model::Graph;

/// Where an edge endpoint landed when resolved against its node's ports.
enum Resolved<'a> {
    /// Node exists and the port exists in the expected direction.
    Port(&'a PortSpec),
    /// Node exists but its ports are not known (unregistered card type).
    Opaque,
    /// The port exists only in the opposite direction.
    Reversed,
    /// The node or port does not exist.
    Missing,
}

fn resolve_output<'a>(graph: &'a Graph, registries: &'a RegistrySet, edge: &Edge) -> Resolved<'a> {
    let Some(node) = graph.node(edge.from.node.as_str()) else {
        return Resolved::Missing;
    };
    let Some(ports) = node.resolved_ports(registries) else {
        return Resolved::Opaque;
    };
    match (ports.output(&edge.from.port), ports.input(&edge.from.port)) {
        (Some(spec), _) => Resolved::Port(spec),
        (None, Some(_)) => Resolved::Reversed,
        (None, None) => Resolved::Missing,
    }
}

fn resolve_input<'a>(graph: &'a Graph, registries: &'a RegistrySet, edge: &Edge) -> Resolved<'a> {
    let Some(node) = graph.node(edge.to.node.as_str()) else {
        return Resolved::Missing;
    };
    let Some(ports) = node.resolved_ports(registries) else {
        return Resolved::Opaque;
    };
    match (ports.input(&edge.to.port), ports.output(&edge.to.port)) {
        (Some(spec), _) => Resolved::Port(spec),
        (None, Some(_)) => Resolved::Reversed,
        (None, None) => Resolved::Missing,
    }
}

/// Human-readable form of an adapter suggestion, e.g.
/// "insert a `Render` adapter (cost 2)?".
pub fn describe_adapter(path: &AdapterPath) -> String {
    match path.card_types.as_slice() {
        [] => "no adapter is needed".to_string(),
        [single] => format!("insert a `{single}` adapter (cost {})?", path.total_cost),
        many => {
            let chain = many
                .iter()
                .map(|c| format!("`{c}`"))
                .collect::<Vec<_>>()
                .join(" then ");
            format!("insert adapters {chain} (cost {})?", path.total_cost)
        }
    }
}

/// Validates a graph against the registries, returning all issues found.
pub fn validate(graph: &Graph, registries: &RegistrySet) -> Vec<Issue> {
    let mut issues = Vec::new();
    let mut flagged: BTreeSet<EdgeId> = BTreeSet::new();
    let resolved: Vec<(EdgeId, &Edge, Resolved<'_>, Resolved<'_>)> = graph
        .edges()
        .map(|(id, e)| (id, e, resolve_output(graph, registries, e), resolve_input(graph, registries, e)))
        .collect();

    // 1. Dangling references.
    for (id, edge, from, to) in &resolved {
        let missing_node = [&edge.from, &edge.to]
            .into_iter()
            .find(|end| !graph.contains_node(end.node.as_str()));
        let message = if let Some(end) = missing_node {
            format!("Edge {id} ({edge}) references missing node `{}`", end.node)
        } else if matches!(from, Resolved::Missing) {
            format!(
                "Edge {id} ({edge}) references missing port `{}` on `{}`",
                edge.from.port, edge.from.node
            )
        } else if matches!(to, Resolved::Missing) {
            format!(
                "Edge {id} ({edge}) references missing port `{}` on `{}`",
                edge.to.port, edge.to.node
            )
        } else {
            continue;
        };
        flagged.insert(*id);
        issues.push(
            Issue::new(IssueKind::DanglingReference, message)
                .edge(*id)
                .suggest(FixAction::RemoveEdge { edge: *id }),
        );
    }

    // 2. Wrong direction.
    for (id, edge, from, to) in &resolved {
        if flagged.contains(id) {
            continue;
        }
        let message = match (from, to) {
            (Resolved::Reversed, _) => format!(
                "Edge {id} leaves `{}`, which is an input of `{}`; edges run from outputs to inputs",
                edge.from.port, edge.from.node
            ),
            (_, Resolved::Reversed) => format!(
                "Edge {id} enters `{}`, which is an output of `{}`; edges run from outputs to inputs",
                edge.to.port, edge.to.node
            ),
            _ => continue,
        };
        flagged.insert(*id);
        issues.push(
            Issue::new(IssueKind::WrongEdgeDirection, message)
                .node(edge.from.node.clone())
                .node(edge.to.node.clone())
                .edge(*id)
                .suggest(FixAction::RemoveEdge { edge: *id }),
        );
    }

    // 3. Type incompatibility.
    let types = registries.types();
    for (id, edge, from, to) in &resolved {
        if flagged.contains(id) {
            continue;
        }
        let (Resolved::Port(out), Resolved::Port(inp)) = (from, to) else {
            continue;
        };
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
        .node(edge.from.node.clone())
        .node(edge.to.node.clone())
        .edge(*id)
        .at_port(&inp.name);
        if let Some(path) = path {
            issue = issue.suggest(FixAction::InsertAdapter { edge: *id, path });
        }
        flagged.insert(*id);
        issues.push(issue);
    }

    // 4. Implicit fan-in. Type-mismatched edges still count as producers.
    let mut fan_in: BTreeMap<(&str, &str), (Vec<EdgeId>, &PortSpec)> = BTreeMap::new();
    for (id, edge, from, to) in &resolved {
        if flagged.contains(id) && !matches!((from, to), (Resolved::Port(_), Resolved::Port(_))) {
            continue;
        }
        if let Resolved::Port(spec) = to {
            fan_in
                .entry((edge.to.node.as_str(), edge.to.port.as_str()))
                .or_insert_with(|| (Vec::new(), *spec))
                .0
                .push(*id);
        }
    }
    for ((node, port), (edges, spec)) in fan_in {
        if edges.len() < 2 || spec.multi {
            continue;
        }
        let merge = registries.cards().merge_card_for(&spec.port_type, types);
        let advice = merge.map_or_else(
            || format!("no merge card is registered for `{}`", spec.port_type),
            |m| format!("insert a `{}` merge node", m.card_type),
        );
        let mut issue = Issue::new(
            IssueKind::ImplicitFanIn,
            format!(
                "Input `{node}.{port}` has {} producers but accepts one; {advice}",
                edges.len()
            ),
        )
        .node(node)
        .at_port(port);
        for edge in &edges {
            issue = issue.edge(*edge);
        }
        if let Some(m) = merge {
            issue = issue.suggest(FixAction::InsertMerge {
                node: node.into(),
                port: port.to_string(),
                merge_card: m.card_type.clone(),
                edges,
            });
        }
        issues.push(issue);
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(issues = issues.len(), "validate: done");
    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{CardCategory, CardDefinition, CardError, PortSpec, ProcessContext};
    use crate::diag::count_kind;
    use crate::graph::GraphNode;
    use crate::types::{AdapterEdge, PortTypeDef};
    use crate::value::ValueKind;

    fn noop(_: &mut ProcessContext<'_>) -> Result<(), CardError> {
        Ok(())
    }

    fn registries() -> RegistrySet {
        let mut set = RegistrySet::new();
        set.register_port_type(PortTypeDef::new("Audio", ValueKind::AudioBuffer)).unwrap();
        set.register_port_type(PortTypeDef::new("Control", ValueKind::Control)).unwrap();
        set.register_card(
            CardDefinition::new("Osc", CardCategory::Generator, noop).output(PortSpec::new("out", "Control")),
        )
        .unwrap();
        set.register_card(
            CardDefinition::new("Out", CardCategory::Sink, noop).input(PortSpec::new("in", "Audio")),
        )
        .unwrap();
        set.register_card(
            CardDefinition::new("Render", CardCategory::Adapter, noop)
                .input(PortSpec::new("in", "Control"))
                .output(PortSpec::new("out", "Audio")),
        )
        .unwrap();
        set.register_adapter(AdapterEdge::new("Control", "Audio", "Render", 2)).unwrap();
        set
    }

    #[test]
    fn type_mismatch_suggests_adapter() {
        let reg = registries();
        let mut g = Graph::new();
        g.add_node(GraphNode::new("osc", "Osc")).unwrap();
        g.add_node(GraphNode::new("out", "Out")).unwrap();
        g.connect("osc", "out", "out", "in");
        let issues = validate(&g, &reg);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::TypeIncompatible);
        assert_eq!(
            issues[0].message,
            "Port `out` (type `Control`) cannot connect to `in` (type `Audio`); insert a `Render` adapter (cost 2)?"
        );
        assert!(matches!(
            &issues[0].suggestions[0],
            FixAction::InsertAdapter { path, .. } if path.total_cost == 2
        ));
    }

    #[test]
    fn passes_run_in_order() {
        let reg = registries();
        let mut g = Graph::new();
        g.add_node(GraphNode::new("osc", "Osc")).unwrap();
        g.add_node(GraphNode::new("out", "Out")).unwrap();
        g.connect("osc", "out", "out", "in"); // type mismatch
        g.connect("out", "in", "osc", "out"); // wrong direction
        g.connect("ghost", "out", "out", "in"); // dangling
        let kinds: Vec<_> = validate(&g, &reg).iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            [
                IssueKind::DanglingReference,
                IssueKind::WrongEdgeDirection,
                IssueKind::TypeIncompatible
            ]
        );
    }

    #[test]
    fn missing_port_is_dangling() {
        let reg = registries();
        let mut g = Graph::new();
        g.add_node(GraphNode::new("osc", "Osc")).unwrap();
        g.add_node(GraphNode::new("render", "Render")).unwrap();
        g.connect("osc", "nope", "render", "in");
        let issues = validate(&g, &reg);
        assert_eq!(count_kind(&issues, IssueKind::DanglingReference), 1);
    }

    #[test]
    fn fan_in_is_reported_once_per_port() {
        let reg = registries();
        let mut g = Graph::new();
        g.add_node(GraphNode::new("p1", "Osc")).unwrap();
        g.add_node(GraphNode::new("p2", "Osc")).unwrap();
        g.add_node(GraphNode::new("r", "Render")).unwrap();
        g.connect("p1", "out", "r", "in");
        g.connect("p2", "out", "r", "in");
        let issues = validate(&g, &reg);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::ImplicitFanIn);
        assert_eq!(issues[0].edges.len(), 2);
        // No merge card registered for Control.
        assert!(issues[0].suggestions.is_empty());
    }

    #[test]
    fn unknown_cards_are_opaque() {
        let reg = registries();
        let mut g = Graph::new();
        g.add_node(GraphNode::new("a", "Mystery")).unwrap();
        g.add_node(GraphNode::new("b", "Out")).unwrap();
        g.connect("a", "whatever", "b", "in");
        assert!(validate(&g, &reg).is_empty());
    }
}
