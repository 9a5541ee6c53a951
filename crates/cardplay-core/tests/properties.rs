//! Property-based tests for plan compilation and graph repair.
//!
//! Random graphs of pass-through cards check ordering, determinism,
//! plan-cache stability and that automatic fixes converge.

mod common;

use std::collections::BTreeMap;

use cardplay_core::{
    CaptureConfig, Compiler, Evaluation, Executor, ExecutorConfig, FixPolicy, Graph, GraphNode,
    IssueKind, OverflowPolicy, ParamValue, TickWindow, TransportState, count_kind,
    fix_to_fixed_point, topo_order, validate,
};
use proptest::prelude::*;

fn node_id(i: usize) -> String {
    format!("n{i:02}")
}

fn build(nodes: usize, edges: &[(usize, usize)], reversed: bool) -> Graph {
    let mut g = Graph::new();
    let mut ids: Vec<usize> = (0..nodes).collect();
    if reversed {
        ids.reverse();
    }
    for i in ids {
        g.add_node(GraphNode::new(node_id(i), "pass")).unwrap();
    }
    let mut wiring: Vec<&(usize, usize)> = edges.iter().collect();
    if reversed {
        wiring.reverse();
    }
    for (from, to) in wiring {
        g.connect(&node_id(*from), "out", &node_id(*to), "in");
    }
    g
}

fn graph_strategy(forward_only: bool) -> impl Strategy<Value = (usize, Vec<(usize, usize)>)> {
    (2usize..12).prop_flat_map(move |n| {
        let edge = (0..n, 0..n).prop_filter_map("self loop", move |(a, b)| {
            if a == b {
                None
            } else if forward_only {
                Some((a.min(b), a.max(b)))
            } else {
                Some((a, b))
            }
        });
        (Just(n), prop::collection::vec(edge, 0..24))
    })
}

/// Compiles and evaluates `graph` from scratch with event capture on.
fn evaluate_fresh(graph: &Graph, window: TickWindow) -> Evaluation {
    let regs = common::registries();
    let plan = Compiler::new().compile(graph, &regs);
    let config = ExecutorConfig {
        capture: Some(CaptureConfig {
            capacity: 16,
            overflow: OverflowPolicy::DropOldest,
        }),
        ..ExecutorConfig::default()
    };
    let transport = TransportState::new(120.0, 96).with_sample_rate(48_000);
    Executor::new(config)
        .evaluate(&plan, graph, &regs, window, &transport.at(window.from))
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Every node appears exactly once in the plan, cycles or not.
    #[test]
    fn plan_covers_every_node((n, edges) in graph_strategy(false)) {
        let regs = common::registries();
        let graph = build(n, &edges, false);
        let result = topo_order(&graph, &regs);

        let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
        for id in &result.order {
            *seen.entry(id.as_str()).or_default() += 1;
        }
        prop_assert_eq!(seen.len(), n, "missing nodes in {:?}", result.order);
        prop_assert!(seen.values().all(|c| *c == 1), "duplicates in {:?}", result.order);
        prop_assert_eq!(result.cuts.len(), count_kind(&result.issues, IssueKind::CycleDetected));
    }

    /// On acyclic graphs every producer runs before its consumer.
    #[test]
    fn acyclic_plan_respects_edges((n, edges) in graph_strategy(true)) {
        let regs = common::registries();
        let graph = build(n, &edges, false);
        let plan = Compiler::new().compile(&graph, &regs);

        prop_assert!(!plan.is_cyclic());
        for (from, to) in &edges {
            let a = plan.position(&node_id(*from)).unwrap();
            let b = plan.position(&node_id(*to)).unwrap();
            prop_assert!(a < b, "{} ran after {}", node_id(*from), node_id(*to));
        }
    }

    /// Among ready nodes the lexicographically smallest runs first.
    #[test]
    fn unconnected_nodes_run_in_id_order(n in 1usize..20) {
        let regs = common::registries();
        let graph = build(n, &[], true);
        let order: Vec<String> = topo_order(&graph, &regs).order.iter().map(ToString::to_string).collect();
        let expected: Vec<String> = (0..n).map(node_id).collect();
        prop_assert_eq!(order, expected);
    }

    /// Insertion order changes neither the structure hash nor the plan.
    #[test]
    fn plan_is_independent_of_insertion_order((n, edges) in graph_strategy(false)) {
        let regs = common::registries();
        let a = build(n, &edges, false);
        let b = build(n, &edges, true);

        prop_assert_eq!(a.structure_hash(), b.structure_hash());
        let mut compiler = Compiler::new();
        let first = compiler.compile(&a, &regs);
        let second = compiler.compile(&b, &regs);
        prop_assert_eq!(&first.topo_order, &second.topo_order);
        prop_assert_eq!(compiler.stats().plans_built, 1);
    }

    /// Parameter edits reuse the cached plan.
    #[test]
    fn param_edits_keep_the_plan((n, edges) in graph_strategy(false), value in -100i64..100) {
        let regs = common::registries();
        let mut graph = build(n, &edges, false);
        let mut compiler = Compiler::new();
        let before = compiler.compile(&graph, &regs);
        graph.set_param(&node_id(0), "gain", ParamValue::Int(value)).unwrap();
        let after = compiler.compile(&graph, &regs);

        prop_assert_eq!(before.structure_hash.clone(), after.structure_hash.clone());
        prop_assert_eq!(compiler.stats().cache_hits, 1);
    }

    /// Two fresh runs over the same graph and window agree exactly.
    #[test]
    fn evaluation_is_repeatable((n, edges) in graph_strategy(false), from in 0i64..400, per_beat in 1i64..8) {
        let mut graph = build(n, &edges, false);
        graph.add_node(GraphNode::new("src", "pulse")).unwrap();
        graph.set_param("src", "per_beat", ParamValue::Int(per_beat)).unwrap();
        graph.connect("src", "out", &node_id(0), "in");
        let window = TickWindow::new(from, from + 192);

        let first = evaluate_fresh(&graph, window);
        let second = evaluate_fresh(&graph, window);

        prop_assert_eq!(&first.values, &second.values);
        prop_assert_eq!(&first.diagnostics, &second.diagnostics);
        prop_assert_eq!(
            serde_json::to_string(&first.captured).unwrap(),
            serde_json::to_string(&second.captured).unwrap()
        );
        prop_assert!(!first.captured.is_empty());
        prop_assert_eq!(first.dropped_events, second.dropped_events);
    }

    /// Committed fixes remove every fan-in and a second pass has nothing to do.
    #[test]
    fn fixes_reach_a_fixed_point((n, edges) in graph_strategy(false)) {
        let regs = common::registries();
        let graph = build(n, &edges, false);
        let report = fix_to_fixed_point(&graph, &regs, &FixPolicy::commit(), 8);

        let issues = validate(&report.graph, &regs);
        prop_assert_eq!(count_kind(&issues, IssueKind::ImplicitFanIn), 0, "{:?}", issues);
        let again = fix_to_fixed_point(&report.graph, &regs, &FixPolicy::commit(), 8);
        prop_assert_eq!(again.rounds, 0);
        prop_assert_eq!(again.graph, report.graph);
    }
}
