//! Explicit normalization pass.
//!
//! Never run implicitly by compilation. Used before diffing graphs or
//! producing stable reports.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::registry::RegistrySet;

use super::edge::Edge;
use super::model::Graph;
use super::node::NodeId;

/// What [`normalize()`] removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeReport {
    /// Nodes dropped for having an unregistered card type.
    pub dropped_nodes: Vec<NodeId>,
    /// Edges dropped for referencing missing nodes or ports.
    pub dropped_edges: Vec<Edge>,
    /// Number of duplicate edges collapsed.
    pub duplicate_edges: usize,
}

impl NormalizeReport {
    /// Returns true if nothing was removed.
    pub fn is_clean(&self) -> bool {
        self.dropped_nodes.is_empty() && self.dropped_edges.is_empty() && self.duplicate_edges == 0
    }
}

/// Returns a canonical copy of `graph`.
///
/// Nodes whose card type is unknown and that carry no explicit ports are
/// dropped, then edges referencing missing nodes or ports. Identical edges
/// are collapsed and the survivors renumbered in sorted order starting at
/// `e0`.
pub fn normalize(graph: &Graph, registries: &RegistrySet) -> (Graph, NormalizeReport) {
    let mut report = NormalizeReport::default();
    let mut out = Graph::new();

    for node in graph.nodes() {
        if node.ports.is_none() && registries.card(&node.card_type).is_none() {
            report.dropped_nodes.push(node.id.clone());
            continue;
        }
        // Ids come from a map, so they cannot collide.
        let _ = out.add_node(node.clone());
    }

    let mut kept: BTreeSet<Edge> = BTreeSet::new();
    let mut edges: Vec<&Edge> = graph.edges().map(|(_, e)| e).collect();
    edges.sort();
    for edge in edges {
        let from_ok = out
            .node(edge.from.node.as_str())
            .and_then(|n| n.resolved_ports(registries))
            .is_some_and(|p| p.output(&edge.from.port).is_some());
        let to_ok = out
            .node(edge.to.node.as_str())
            .and_then(|n| n.resolved_ports(registries))
            .is_some_and(|p| p.input(&edge.to.port).is_some());
        if !from_ok || !to_ok {
            report.dropped_edges.push(edge.clone());
        } else if !kept.insert(edge.clone()) {
            report.duplicate_edges += 1;
        }
    }
    for edge in kept {
        out.add_edge(edge);
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(
        dropped_nodes = report.dropped_nodes.len(),
        dropped_edges = report.dropped_edges.len(),
        duplicates = report.duplicate_edges,
        "normalize: done"
    );
    (out, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{CardCategory, CardDefinition, CardError, PortSpec, ProcessContext};
    use crate::graph::{EdgeId, GraphNode};
    use crate::types::PortTypeDef;
    use crate::value::ValueKind;

    fn noop(_: &mut ProcessContext<'_>) -> Result<(), CardError> {
        Ok(())
    }

    fn registries() -> RegistrySet {
        let mut set = RegistrySet::new();
        set.register_port_type(PortTypeDef::new("cv", ValueKind::Control)).unwrap();
        set.register_card(
            CardDefinition::new("pass", CardCategory::Transform, noop)
            .input(PortSpec::new("in", "cv").optional())
            .output(PortSpec::new("out", "cv")),
        )
        .unwrap();
        set
    }

    #[test]
    fn drops_unknown_nodes_and_their_edges() {
        let reg = registries();
        let mut g = Graph::new();
        g.add_node(GraphNode::new("a", "pass")).unwrap();
        g.add_node(GraphNode::new("x", "unknown")).unwrap();
        g.connect("x", "out", "a", "in");
        let (n, report) = normalize(&g, &reg);
        assert_eq!(report.dropped_nodes, [NodeId::from("x")]);
        assert_eq!(report.dropped_edges.len(), 1);
        assert_eq!(n.node_count(), 1);
        assert_eq!(n.edge_count(), 0);
    }

    #[test]
    fn dedupes_and_renumbers() {
        let reg = registries();
        let mut g = Graph::new();
        g.add_node(GraphNode::new("b", "pass")).unwrap();
        g.add_node(GraphNode::new("a", "pass")).unwrap();
        g.connect("b", "out", "a", "in");
        g.connect("a", "out", "b", "in");
        g.connect("b", "out", "a", "in");
        let (n, report) = normalize(&g, &reg);
        assert_eq!(report.duplicate_edges, 1);
        let edges: Vec<_> = n.edges().map(|(id, e)| (id, e.to_string())).collect();
        assert_eq!(
            edges,
            [
                (EdgeId(0), "a.out -> b.in".to_string()),
                (EdgeId(1), "b.out -> a.in".to_string())
            ]
        );
        assert_eq!(n.structure_hash(), normalize(&n, &reg).0.structure_hash());
    }
}
