//! Deterministic topological ordering with best-effort cycle cutting.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::diag::{FixAction, Issue, IssueKind};
use crate::graph::{EdgeId, Graph, NodeId};
use crate::registry::RegistrySet;

/// Result of [`topo_order()`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopoResult {
    /// Every node of the graph, dependencies first.
    pub order: Vec<NodeId>,
    /// Dependencies removed to break cycles, in cut order.
    pub cuts: Vec<(NodeId, NodeId)>,
    /// One `CycleDetected` issue per cut.
    pub issues: Vec<Issue>,
}

/// Node-level dependency pairs. Edges into feedback inputs and edges
/// touching missing nodes do not order the graph.
fn dependencies(graph: &Graph, registries: &RegistrySet) -> BTreeSet<(NodeId, NodeId)> {
    graph
        .edges()
        .filter(|(_, e)| graph.contains_node(e.from.node.as_str()))
        .filter(|(_, e)| {
            graph
                .node(e.to.node.as_str())
                .is_some_and(|n| {
                    !n.resolved_ports(registries)
                        .and_then(|p| p.input(&e.to.port))
                        .is_some_and(|spec| spec.feedback)
                })
        })
        .map(|(_, e)| (e.from.node.clone(), e.to.node.clone()))
        .collect()
}

/// Shortest path from `start` to `goal` over `pairs`, visiting
/// neighbours in ascending id order. Both ends are included.
fn shortest_path(pairs: &BTreeSet<(NodeId, NodeId)>, start: &NodeId, goal: &NodeId) -> Option<Vec<NodeId>> {
    let mut parent: BTreeMap<&NodeId, &NodeId> = BTreeMap::new();
    let mut seen: BTreeSet<&NodeId> = BTreeSet::from([start]);
    let mut queue = VecDeque::from([start]);
    while let Some(current) = queue.pop_front() {
        if current == goal {
            let mut path = vec![current.clone()];
            let mut cursor = current;
            while let Some(prev) = parent.get(cursor) {
                path.push((*prev).clone());
                cursor = *prev;
            }
            path.reverse();
            return Some(path);
        }
        // Pairs are sorted, so successors come out in id order.
        for (_, next) in pairs.range((current.clone(), NodeId::new(""))..).take_while(|(f, _)| f == current) {
            if seen.insert(next) {
                parent.insert(next, current);
                queue.push_back(next);
            }
        }
    }
    None
}

/// Orders the nodes of `graph` with Kahn's algorithm.
///
/// Among runnable nodes the smallest id always goes first. When the sort
/// stalls on a cycle, the smallest remaining dependency `(from, to)` for
/// which `to` reaches `from` is cut, a `CycleDetected` issue describing the
/// cycle is recorded, and the sort continues. Every node ends up in the
/// order exactly once.
pub fn topo_order(graph: &Graph, registries: &RegistrySet) -> TopoResult {
    let mut pairs = dependencies(graph, registries);
    let mut in_degree: BTreeMap<NodeId, usize> = graph.nodes().map(|n| (n.id.clone(), 0)).collect();
    for (_, to) in &pairs {
        if let Some(d) = in_degree.get_mut(to) {
            *d += 1;
        }
    }

    let mut ready: BTreeSet<NodeId> = in_degree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(id, _)| id.clone())
        .collect();
    let mut result = TopoResult::default();

    while result.order.len() < in_degree.len() {
        if let Some(next) = ready.pop_first() {
            let successors: Vec<NodeId> = pairs
                .iter()
                .filter(|(from, _)| *from == next)
                .map(|(_, to)| to.clone())
                .collect();
            for to in successors {
                pairs.remove(&(next.clone(), to.clone()));
                if let Some(d) = in_degree.get_mut(&to) {
                    *d -= 1;
                    if *d == 0 {
                        ready.insert(to);
                    }
                }
            }
            result.order.push(next);
            continue;
        }

        // Stalled: every remaining pair lies between unfinished nodes.
        let Some((cut, path)) = pairs.iter().find_map(|(from, to)| {
            shortest_path(&pairs, to, from).map(|back| ((from.clone(), to.clone()), back))
        }) else {
            break;
        };
        pairs.remove(&cut);
        if let Some(d) = in_degree.get_mut(&cut.1) {
            *d -= 1;
            if *d == 0 {
                ready.insert(cut.1.clone());
            }
        }
        let mut cycle = vec![cut.0.clone()];
        cycle.extend(path);
        #[cfg(feature = "tracing")]
        tracing::debug!(from = %cut.0, to = %cut.1, "topo: cut cycle dependency");
        result.issues.push(cycle_issue(graph, registries, &cut, cycle));
        result.cuts.push(cut);
    }

    #[cfg(feature = "tracing")]
    tracing::debug!("topo: {} nodes in order, {} cuts", result.order.len(), result.cuts.len());
    result
}

fn cycle_issue(graph: &Graph, registries: &RegistrySet, cut: &(NodeId, NodeId), cycle: Vec<NodeId>) -> Issue {
    let cut_edges: Vec<EdgeId> = graph
        .outgoing(cut.0.as_str())
        .filter(|(_, e)| e.to.node == cut.1)
        .map(|(id, _)| id)
        .collect();
    let path_text = cycle
        .iter()
        .map(NodeId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ");
    let mut issue = Issue::new(
        IssueKind::CycleDetected,
        format!(
            "Cycle {path_text}; ordered by cutting `{}` -> `{}`. Remove that edge or insert a one-window delay",
            cut.0, cut.1
        ),
    )
    .with_cycle(cycle.clone());
    let mut members: Vec<NodeId> = cycle;
    members.pop();
    for node in members {
        issue = issue.node(node);
    }
    for id in &cut_edges {
        issue = issue.edge(*id);
    }
    let Some(&first) = cut_edges.first() else {
        return issue;
    };
    issue = issue.suggest(FixAction::RemoveEdge { edge: first });
    let delay = graph.edge(first).and_then(|edge| {
        let out = graph
            .node(edge.from.node.as_str())?
            .resolved_ports(registries)?
            .output(&edge.from.port)?;
        let inp = graph
            .node(edge.to.node.as_str())?
            .resolved_ports(registries)?
            .input(&edge.to.port)?;
        registries
            .cards()
            .delay_card_for(&out.port_type, &inp.port_type, registries.types())
    });
    if let Some(def) = delay {
        issue = issue.suggest(FixAction::InsertDelay {
            edge: first,
            delay_card: def.card_type.clone(),
        });
    }
    issue
}
