//! Coverage report: a summary of what a graph uses and how well it is wired.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::graph::{Graph, StructureHash};
use crate::registry::RegistrySet;

use super::issue::{Issue, IssueKind};

/// Graph coverage summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageReport {
    /// Structure hash of the graph.
    pub structure_hash: StructureHash,
    /// Number of nodes.
    pub nodes: usize,
    /// Number of edges.
    pub edges: usize,
    /// Node count per card type.
    pub card_types: BTreeMap<String, usize>,
    /// Node count per pack id; builtins are listed under `builtin`.
    pub provenance: BTreeMap<String, usize>,
    /// Input ports with at least one producer.
    pub connected_inputs: usize,
    /// All known input ports.
    pub total_inputs: usize,
    /// Issue count per kind.
    pub issues: BTreeMap<IssueKind, usize>,
}

impl CoverageReport {
    /// Connected share of input ports, 1.0 for graphs without inputs.
    pub fn input_coverage(&self) -> f64 {
        if self.total_inputs == 0 {
            1.0
        } else {
            self.connected_inputs as f64 / self.total_inputs as f64
        }
    }
}

/// Summarizes `graph` together with a set of lint issues.
pub fn coverage(graph: &Graph, registries: &RegistrySet, issues: &[Issue]) -> CoverageReport {
    let mut card_types: BTreeMap<String, usize> = BTreeMap::new();
    let mut provenance: BTreeMap<String, usize> = BTreeMap::new();
    let mut connected_inputs = 0;
    let mut total_inputs = 0;
    for node in graph.nodes() {
        *card_types.entry(node.card_type.clone()).or_default() += 1;
        let source = registries
            .card(&node.card_type)
            .map_or("unknown", |d| d.provenance.pack_id().unwrap_or("builtin"));
        *provenance.entry(source.to_string()).or_default() += 1;
        if let Some(ports) = node.resolved_ports(registries) {
            for input in &ports.inputs {
                total_inputs += 1;
                if graph.edges_into(node.id.as_str(), &input.name).next().is_some() {
                    connected_inputs += 1;
                }
            }
        }
    }
    let mut counts: BTreeMap<IssueKind, usize> = BTreeMap::new();
    for issue in issues {
        *counts.entry(issue.kind).or_default() += 1;
    }
    CoverageReport {
        structure_hash: graph.structure_hash(),
        nodes: graph.node_count(),
        edges: graph.edge_count(),
        card_types,
        provenance,
        connected_inputs,
        total_inputs,
        issues: counts,
    }
}
