//! Lint: validation plus project-level checks.

use crate::compile::topo_order;
use crate::graph::{Graph, validate};
use crate::param::check_params;
use crate::registry::RegistrySet;

use super::issue::{FixAction, Issue, IssueKind};

/// Lints a graph.
///
/// Issues come out in a fixed order: unknown card types, unknown port
/// types, the [`validate()`] passes, invalid parameters, cycles, unused
/// nodes, then provisional nodes.
pub fn lint(graph: &Graph, registries: &RegistrySet) -> Vec<Issue> {
    let mut issues = Vec::new();
    let types = registries.types();

    for node in graph.nodes() {
        if node.ports.is_none() && registries.card(&node.card_type).is_none() {
            issues.push(
                Issue::new(
                    IssueKind::UnknownCardType,
                    format!("Node `{}` uses unknown card type `{}`", node.id, node.card_type),
                )
                .node(node.id.clone()),
            );
        }
    }

    for node in graph.nodes() {
        let Some(ports) = &node.ports else { continue };
        for port in ports.inputs.iter().chain(&ports.outputs) {
            if !types.is_known(&port.port_type) {
                issues.push(
                    Issue::new(
                        IssueKind::UnknownPortType,
                        format!(
                            "Port `{}.{}` uses unknown port type `{}`",
                            node.id, port.name, port.port_type
                        ),
                    )
                    .node(node.id.clone())
                    .at_port(&port.name),
                );
            }
        }
    }

    issues.extend(validate(graph, registries));

    for node in graph.nodes() {
        let Some(def) = registries.card(&node.card_type) else {
            continue;
        };
        for error in check_params(&def.params, &node.params) {
            issues.push(
                Issue::new(IssueKind::InvalidParam, format!("Node `{}`: {error}", node.id)).node(node.id.clone()),
            );
        }
    }

    issues.extend(topo_order(graph, registries).issues);

    if graph.node_count() > 1 {
        for node in graph.nodes() {
            let id = node.id.as_str();
            if graph.incoming(id).next().is_none() && graph.outgoing(id).next().is_none() {
                issues.push(
                    Issue::new(IssueKind::UnusedNode, format!("Node `{id}` is not connected")).node(id),
                );
            }
        }
    }

    for node in graph.nodes().filter(|n| n.provisional) {
        issues.push(
            Issue::new(
                IssueKind::ProvisionalNode,
                format!("Node `{}` is a preview and must be materialized before saving", node.id),
            )
            .node(node.id.clone())
            .suggest(FixAction::Materialize { node: node.id.clone() }),
        );
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(issues = issues.len(), "lint: done");
    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{CardCategory, CardDefinition, CardError, PortSet, PortSpec, ProcessContext};
    use crate::diag::count_kind;
    use crate::graph::GraphNode;
    use crate::param::ParamSpec;
    use crate::types::PortTypeDef;
    use crate::value::ValueKind;

    fn noop(_: &mut ProcessContext<'_>) -> Result<(), CardError> {
        Ok(())
    }

    fn registries() -> RegistrySet {
        let mut set = RegistrySet::new();
        set.register_port_type(PortTypeDef::new("cv", ValueKind::Control)).unwrap();
        set.register_card(
            CardDefinition::new("gain", CardCategory::Transform, noop)
                .input(PortSpec::new("in", "cv").optional())
                .output(PortSpec::new("out", "cv"))
                .param(ParamSpec::number("amount", 0.0, 2.0, 1.0)),
        )
        .unwrap();
        set
    }

    #[test]
    fn structural_problems_surface() {
        let reg = registries();
        let mut g = Graph::new();
        g.add_node(GraphNode::new("a", "gain").with_param("amount", 9.0)).unwrap();
        g.add_node(GraphNode::new("b", "missing")).unwrap();
        let virtual_ports = PortSet {
            inputs: vec![PortSpec::new("in", "wat")],
            outputs: Vec::new(),
        };
        g.add_node(GraphNode::new("v", "virtual").with_ports(virtual_ports)).unwrap();
        let issues = lint(&g, &reg);
        let kinds: Vec<_> = issues.iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            [
                IssueKind::UnknownCardType,
                IssueKind::UnknownPortType,
                IssueKind::InvalidParam,
                IssueKind::UnusedNode,
                IssueKind::UnusedNode,
                IssueKind::UnusedNode,
            ]
        );
    }

    #[test]
    fn clean_graph_lints_clean() {
        let reg = registries();
        let mut g = Graph::new();
        g.add_node(GraphNode::new("a", "gain")).unwrap();
        g.add_node(GraphNode::new("b", "gain")).unwrap();
        g.connect("a", "out", "b", "in");
        assert!(lint(&g, &reg).is_empty());
    }

    #[test]
    fn cycles_are_linted() {
        let reg = registries();
        let mut g = Graph::new();
        g.add_node(GraphNode::new("a", "gain")).unwrap();
        g.add_node(GraphNode::new("b", "gain")).unwrap();
        g.connect("a", "out", "b", "in");
        g.connect("b", "out", "a", "in");
        assert_eq!(count_kind(&lint(&g, &reg), IssueKind::CycleDetected), 1);
    }
}
