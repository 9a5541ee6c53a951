//! Fix planning and application.
//!
//! [`plan_fixes()`] turns issues into an ordered list of [`FixAction`]s and
//! [`apply_fixes()`] applies them to a copy of the graph. Nothing here
//! mutates the caller's graph, so a host can preview a fix and commit it
//! later.

use serde::{Deserialize, Serialize};

use crate::card::CardCategory;
use crate::graph::{Edge, EdgeId, Endpoint, Graph, GraphNode, NodeId};
use crate::registry::RegistrySet;
use crate::types::AdapterPath;

use super::issue::{FixAction, Issue, IssueKind};
use super::lint::lint;

/// Controls how fixes are planned and applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixPolicy {
    /// Insert merge, adapter and delay nodes as provisional preview nodes
    /// and leave existing provisional nodes alone.
    #[serde(default)]
    pub preview: bool,
    /// Break cycles by inserting delay nodes where a delay card exists.
    #[serde(default)]
    pub break_cycles: bool,
}

impl FixPolicy {
    /// Concrete fixes, cycles left alone.
    pub fn commit() -> Self {
        Self::default()
    }

    /// Provisional fixes for preview.
    pub fn preview() -> Self {
        Self {
            preview: true,
            ..Self::default()
        }
    }
}

fn rank(fix: &FixAction) -> u8 {
    match fix {
        FixAction::RemoveEdge { .. } => 0,
        FixAction::InsertMerge { .. } => 1,
        FixAction::InsertAdapter { .. } => 2,
        FixAction::InsertDelay { .. } => 3,
        FixAction::Materialize { .. } => 4,
    }
}

/// Plans concrete mutations for the mechanically fixable issues.
///
/// The result is ordered: edge removals, then merges, then adapters, then
/// delays, then materializations. Within a group, issue order is kept.
/// Issues without an automatic fix contribute nothing.
pub fn plan_fixes(issues: &[Issue], policy: &FixPolicy) -> Vec<FixAction> {
    let mut plan: Vec<FixAction> = Vec::new();
    for issue in issues {
        let wanted = |fix: &&FixAction| match (issue.kind, fix) {
            (IssueKind::DanglingReference | IssueKind::WrongEdgeDirection, FixAction::RemoveEdge { .. })
            | (IssueKind::ImplicitFanIn, FixAction::InsertMerge { .. })
            | (IssueKind::TypeIncompatible, FixAction::InsertAdapter { .. }) => true,
            (IssueKind::CycleDetected, FixAction::InsertDelay { .. }) => policy.break_cycles,
            (IssueKind::ProvisionalNode, FixAction::Materialize { .. }) => !policy.preview,
            _ => false,
        };
        if let Some(fix) = issue.suggestions.iter().find(wanted) {
            if !plan.contains(fix) {
                plan.push(fix.clone());
            }
        }
    }
    plan.sort_by_key(rank);
    plan
}

/// Applies `fixes` in order to a copy of `graph`.
///
/// A fix whose target no longer exists (for example an adapter on an edge
/// that an earlier merge replaced) is skipped.
pub fn apply_fixes(graph: &Graph, fixes: &[FixAction], registries: &RegistrySet, policy: &FixPolicy) -> Graph {
    let mut out = graph.clone();
    for fix in fixes {
        let applied = match fix {
            FixAction::RemoveEdge { edge } => out.remove_edge(*edge).is_ok(),
            FixAction::InsertAdapter { edge, path } => insert_adapter(&mut out, *edge, path, registries, policy.preview),
            FixAction::InsertMerge {
                node,
                port,
                merge_card,
                edges,
            } => insert_merge(&mut out, node, port, merge_card, edges, registries, policy.preview),
            FixAction::InsertDelay { edge, delay_card } => {
                insert_delay(&mut out, *edge, delay_card, registries, policy.preview)
            }
            FixAction::Materialize { node } => out.node_mut(node.as_str()).is_some_and(|n| {
                n.provisional = false;
                true
            }),
        };
        #[cfg(feature = "tracing")]
        if applied {
            tracing::debug!("fix: applied {fix}");
        } else {
            tracing::debug!("fix: skipped {fix}");
        }
        #[cfg(not(feature = "tracing"))]
        let _ = applied;
    }
    out
}

/// Replaces `edge` with a chain of adapter nodes following `path`.
///
/// Returns false, leaving the graph untouched, if the edge is gone or an
/// adapter card is not registered.
pub(crate) fn insert_adapter(
    graph: &mut Graph,
    edge: EdgeId,
    path: &AdapterPath,
    registries: &RegistrySet,
    provisional: bool,
) -> bool {
    let Some(original) = graph.edge(edge).cloned() else {
        return false;
    };
    let mut stages = Vec::with_capacity(path.card_types.len());
    for card in &path.card_types {
        let Some(def) = registries.card(card) else {
            return false;
        };
        let (Some(input), Some(output)) = (def.ports.inputs.first(), def.ports.outputs.first()) else {
            return false;
        };
        stages.push((card.as_str(), input.name.clone(), output.name.clone()));
    }
    if stages.is_empty() || graph.remove_edge(edge).is_err() {
        return false;
    }
    let mut upstream = original.from;
    for (card, input, output) in stages {
        let id = insert_node(graph, card, &original.to.node, provisional);
        graph.add_edge(Edge::new(upstream, Endpoint::new(id.clone(), &input)));
        upstream = Endpoint::new(id, &output);
    }
    graph.add_edge(Edge::new(upstream, original.to));
    true
}

fn insert_merge(
    graph: &mut Graph,
    node: &NodeId,
    port: &str,
    merge_card: &str,
    edges: &[EdgeId],
    registries: &RegistrySet,
    provisional: bool,
) -> bool {
    let live: Vec<(EdgeId, Edge)> = edges
        .iter()
        .filter_map(|id| graph.edge(*id).map(|e| (*id, e.clone())))
        .filter(|(_, e)| e.to.node == *node && e.to.port == port)
        .collect();
    if live.len() < 2 {
        return false;
    }
    let Some(def) = registries.card(merge_card) else {
        return false;
    };
    let (Some(input), Some(output)) = (def.ports.inputs.first(), def.ports.outputs.first()) else {
        return false;
    };
    let (input, output) = (input.name.clone(), output.name.clone());
    let merge = insert_node(graph, merge_card, node, provisional);
    for (id, edge) in live {
        let _ = graph.remove_edge(id);
        graph.add_edge(Edge::new(edge.from, Endpoint::new(merge.clone(), &input)));
    }
    graph.add_edge(Edge::new(
        Endpoint::new(merge, &output),
        Endpoint::new(node.clone(), port),
    ));
    true
}

fn insert_delay(graph: &mut Graph, edge: EdgeId, delay_card: &str, registries: &RegistrySet, provisional: bool) -> bool {
    let Some(original) = graph.edge(edge).cloned() else {
        return false;
    };
    let Some(def) = registries.card(delay_card) else {
        return false;
    };
    let input = def
        .ports
        .inputs
        .iter()
        .find(|p| p.feedback)
        .or_else(|| def.ports.inputs.first());
    let (Some(input), Some(output)) = (input, def.ports.outputs.first()) else {
        return false;
    };
    let (input, output) = (input.name.clone(), output.name.clone());
    if graph.remove_edge(edge).is_err() {
        return false;
    }
    let id = insert_node(graph, delay_card, &original.to.node, provisional);
    graph.add_edge(Edge::new(original.from, Endpoint::new(id.clone(), &input)));
    graph.add_edge(Edge::new(Endpoint::new(id, &output), original.to));
    true
}

/// Adds a synthetic node named after its card and the node it serves.
fn insert_node(graph: &mut Graph, card_type: &str, serves: &NodeId, provisional: bool) -> NodeId {
    let id = graph.unique_node_id(&format!("{card_type}~{serves}"));
    let mut node = GraphNode::new(id.clone(), card_type);
    node.provisional = provisional;
    // The id was just checked to be free.
    let _ = graph.add_node(node);
    id
}

fn materialize_where(graph: &Graph, registries: &RegistrySet, keep: impl Fn(CardCategory) -> bool) -> Graph {
    let mut out = graph.clone();
    for node in out.nodes_mut() {
        let category = registries.card(&node.card_type).map(|d| d.category);
        if node.provisional && category.is_some_and(&keep) {
            node.provisional = false;
        }
    }
    out
}

/// Makes every provisional merge node concrete.
pub fn materialize_merge_nodes(graph: &Graph, registries: &RegistrySet) -> Graph {
    materialize_where(graph, registries, |c| c == CardCategory::Merge)
}

/// Makes every provisional adapter and delay node concrete.
pub fn materialize_synthetic_adapters(graph: &Graph, registries: &RegistrySet) -> Graph {
    materialize_where(graph, registries, |c| matches!(c, CardCategory::Adapter | CardCategory::Delay))
}

/// Outcome of [`fix_to_fixed_point()`].
#[derive(Debug, Clone, PartialEq)]
pub struct FixReport {
    /// The repaired graph.
    pub graph: Graph,
    /// Rounds of lint, plan and apply that changed the graph.
    pub rounds: usize,
    /// Every fix applied, in order.
    pub applied: Vec<FixAction>,
    /// Issues left after the last round.
    pub remaining: Vec<Issue>,
}

/// Lints, plans and applies fixes until nothing changes or `max_rounds`
/// is reached.
pub fn fix_to_fixed_point(
    graph: &Graph,
    registries: &RegistrySet,
    policy: &FixPolicy,
    max_rounds: usize,
) -> FixReport {
    let mut current = graph.clone();
    let mut applied = Vec::new();
    let mut rounds = 0;
    let mut issues = lint(&current, registries);
    while rounds < max_rounds {
        let plan = plan_fixes(&issues, policy);
        if plan.is_empty() {
            break;
        }
        let next = apply_fixes(&current, &plan, registries, policy);
        if next == current {
            break;
        }
        current = next;
        applied.extend(plan);
        rounds += 1;
        issues = lint(&current, registries);
    }
    #[cfg(feature = "tracing")]
    tracing::debug!(rounds, remaining = issues.len(), "fix: fixed point reached");
    FixReport {
        graph: current,
        rounds,
        applied,
        remaining: issues,
    }
}
