//! Tick-window evaluation of compiled plans.

use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::card::{CardDefinition, PortSet, ProcessContext};
use crate::compile::CompiledPlan;
use crate::diag::{Issue, IssueKind};
use crate::graph::{Graph, NodeId, StructureHash};
use crate::param::CardState;
use crate::registry::RegistrySet;
use crate::time::{Tick, TickWindow, TransportState};
use crate::value::{Containers, RuntimeValue, ValueKind, port_key, sort_events};

use super::log::InvocationRecord;
use super::queue::{CaptureConfig, CapturedEvent, EventQueue};

/// Structural precondition failures. Everything else becomes an [`Issue`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    /// A planned node uses a card type the registries do not know.
    #[error("node '{node}' uses unregistered card type '{card_type}'")]
    UnknownCardType {
        /// Node id.
        node: NodeId,
        /// Card type.
        card_type: String,
    },
    /// The plan was compiled for a different graph structure.
    #[error("plan {plan} does not match graph {graph}")]
    StalePlan {
        /// Hash the plan was compiled for.
        plan: StructureHash,
        /// Hash of the graph handed in.
        graph: StructureHash,
    },
    /// The plan names a node missing from the graph.
    #[error("planned node '{0}' is not in the graph")]
    NodeNotInGraph(NodeId),
}

/// Execution budget. Evaluation halts before the first node that would
/// exceed it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
    /// Maximum node invocations per `evaluate` call.
    #[serde(default)]
    pub max_invocations: Option<u64>,
    /// Maximum wall-clock milliseconds per `evaluate` call.
    #[serde(default)]
    pub max_wall_ms: Option<u64>,
}

/// Executor settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Split windows into batches of this many ticks.
    #[serde(default)]
    pub batch_ticks: Option<Tick>,
    /// Execution budget.
    #[serde(default)]
    pub budget: Budget,
    /// Capture emitted events into a ring buffer.
    #[serde(default)]
    pub capture: Option<CaptureConfig>,
    /// Record a processor log.
    #[serde(default)]
    pub processor_log: bool,
}

/// Carry-over state of an executor: card states plus values latched for
/// feedback inputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutorSnapshot {
    /// Card state per node.
    #[serde(default)]
    pub states: BTreeMap<NodeId, CardState>,
    /// Last window's values feeding feedback inputs, by producer port key.
    #[serde(default)]
    pub latched: BTreeMap<String, RuntimeValue>,
}

/// Result of one `evaluate` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Output values keyed by `"node:port"`.
    pub values: BTreeMap<String, RuntimeValue>,
    /// Evaluation-time issues.
    pub diagnostics: Vec<Issue>,
    /// Captured events when capture is enabled.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub captured: Vec<CapturedEvent>,
    /// Events lost to the capture overflow policy.
    #[serde(default)]
    pub dropped_events: u64,
    /// Processor log when enabled.
    #[serde(skip)]
    pub log: Vec<InvocationRecord>,
    /// Number of card invocations.
    pub invocations: u64,
    /// True if the budget stopped evaluation early.
    pub halted: bool,
}

impl Evaluation {
    /// Value of one output port.
    pub fn value(&self, node: &str, port: &str) -> Option<&RuntimeValue> {
        self.values.get(&port_key(node, port))
    }

    /// Events of one event-stream output port, empty when absent.
    pub fn events(&self, node: &str, port: &str) -> &[crate::value::Event] {
        self.value(node, port).and_then(RuntimeValue::as_events).unwrap_or(&[])
    }

    fn push_diagnostic(&mut self, issue: Issue) {
        if !self.diagnostics.contains(&issue) {
            self.diagnostics.push(issue);
        }
    }

    fn absorb(&mut self, batch: Evaluation) {
        for (key, value) in batch.values {
            match self.values.get_mut(&key) {
                Some(existing) => existing.append(value),
                None => {
                    self.values.insert(key, value);
                }
            }
        }
        for issue in batch.diagnostics {
            self.push_diagnostic(issue);
        }
        self.log.extend(batch.log);
        self.invocations += batch.invocations;
        self.halted |= batch.halted;
    }
}

/// Runs compiled plans over tick windows and owns per-node state.
///
/// Evaluation is single-threaded: nodes run strictly in plan order and each
/// node's state is touched only by its own invocation.
#[derive(Debug, Clone, Default)]
pub struct Executor {
    config: ExecutorConfig,
    snapshot: ExecutorSnapshot,
    containers: Containers,
}

struct Run<'a> {
    started: Instant,
    queue: Option<EventQueue>,
    overflow_reported: bool,
    registries: &'a RegistrySet,
}

impl Executor {
    /// Creates an executor.
    pub fn new(config: ExecutorConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Supplies named containers read by container-backed cards.
    pub fn with_containers(mut self, containers: Containers) -> Self {
        self.containers = containers;
        self
    }

    /// Replaces the containers.
    pub fn set_containers(&mut self, containers: Containers) {
        self.containers = containers;
    }

    /// Settings.
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// State of one node, if it has run.
    pub fn state(&self, node: &str) -> Option<&CardState> {
        self.snapshot.states.get(node)
    }

    /// Copy of the carry-over state.
    pub fn snapshot(&self) -> ExecutorSnapshot {
        self.snapshot.clone()
    }

    /// Replaces the carry-over state.
    pub fn restore(&mut self, snapshot: ExecutorSnapshot) {
        self.snapshot = snapshot;
    }

    /// Forgets all state.
    pub fn reset(&mut self) {
        self.snapshot = ExecutorSnapshot::default();
    }

    /// Evaluates `plan` over `window`.
    ///
    /// Fails only on structural preconditions; degraded nodes are reported
    /// in [`Evaluation::diagnostics`].
    pub fn evaluate(
        &mut self,
        plan: &CompiledPlan,
        graph: &Graph,
        registries: &RegistrySet,
        window: TickWindow,
        transport: &TransportState,
    ) -> Result<Evaluation, EvalError> {
        let current = graph.structure_hash();
        if current != plan.structure_hash {
            return Err(EvalError::StalePlan {
                plan: plan.structure_hash.clone(),
                graph: current,
            });
        }
        for id in &plan.topo_order {
            let node = graph
                .node(id.as_str())
                .ok_or_else(|| EvalError::NodeNotInGraph(id.clone()))?;
            if registries.card(&node.card_type).is_none() {
                return Err(EvalError::UnknownCardType {
                    node: id.clone(),
                    card_type: node.card_type.clone(),
                });
            }
        }

        let mut run = Run {
            started: Instant::now(),
            queue: self.config.capture.map(EventQueue::new),
            overflow_reported: false,
            registries,
        };
        let windows = match self.config.batch_ticks {
            Some(batch) if batch > 0 && window.len() > batch && batch_safe(plan, graph, registries) => {
                window.batches(batch)
            }
            _ => vec![window],
        };
        #[cfg(feature = "tracing")]
        tracing::debug!(window = %window, batches = windows.len(), "evaluate: start");

        let mut result = Evaluation::default();
        for batch in windows {
            let evaluation = self.run_window(plan, graph, batch, transport, &mut run, result.invocations);
            result.absorb(evaluation);
            if result.halted {
                break;
            }
        }
        self.latch_feedback(graph, registries, &result.values);
        if let Some(queue) = run.queue {
            result.dropped_events = queue.dropped();
            result.captured = queue.into_events();
        }
        if !self.config.processor_log {
            result.log.clear();
        }
        Ok(result)
    }

    fn run_window(
        &mut self,
        plan: &CompiledPlan,
        graph: &Graph,
        window: TickWindow,
        transport: &TransportState,
        run: &mut Run<'_>,
        invocations_before: u64,
    ) -> Evaluation {
        let registries = run.registries;
        let types = registries.types();
        let frames = transport.frames_in(&window);
        let empty = |port_type: &str| {
            RuntimeValue::empty(
                types.kind_of(port_type).unwrap_or(ValueKind::EventStream),
                frames,
                transport.sample_rate,
            )
        };

        let mut out = Evaluation::default();
        // Output keys of nodes that were skipped or failed.
        let mut absent: BTreeMap<String, NodeId> = BTreeMap::new();

        for id in &plan.topo_order {
            let Some((node, def)) = graph
                .node(id.as_str())
                .and_then(|n| registries.card(&n.card_type).map(|d| (n, d)))
            else {
                continue;
            };
            let ports: &PortSet = node.ports.as_ref().unwrap_or(&def.ports);

            if let Some(reason) = self.budget_exceeded(invocations_before + out.invocations, run.started) {
                #[cfg(feature = "tracing")]
                tracing::debug!(node = %id, "evaluate: budget exceeded ({reason})");
                out.push_diagnostic(
                    Issue::new(
                        IssueKind::BudgetExceeded,
                        format!("Evaluation stopped before `{id}`: {reason}"),
                    )
                    .node(id.clone()),
                );
                out.halted = true;
                break;
            }

            // Gather inputs.
            let mut inputs: BTreeMap<String, Vec<RuntimeValue>> = BTreeMap::new();
            let mut missing: Vec<&str> = Vec::new();
            for spec in &ports.inputs {
                let mut edges: Vec<_> = graph.edges_into(id.as_str(), &spec.name).collect();
                edges.sort_by(|a, b| a.1.from.cmp(&b.1.from).then(a.0.cmp(&b.0)));
                let expected = types.kind_of(&spec.port_type);
                let mut values = Vec::with_capacity(edges.len().max(1));
                for (_, edge) in &edges {
                    let key = port_key(edge.from.node.as_str(), &edge.from.port);
                    let value = if spec.feedback {
                        self.snapshot.latched.get(&key).cloned()
                    } else {
                        out.values.get(&key).cloned()
                    };
                    let value = match value {
                        Some(v) => v,
                        None if spec.feedback => empty(&spec.port_type),
                        None => {
                            let origin = absent.get(&key).unwrap_or(&edge.from.node);
                            out.push_diagnostic(
                                Issue::new(
                                    IssueKind::UnresolvedInput,
                                    format!(
                                        "Input `{id}.{}` received no value from `{}` (inherited from `{origin}`); using an empty value",
                                        spec.name, edge.from
                                    ),
                                )
                                .node(id.clone())
                                .node(origin.clone())
                                .at_port(&spec.name),
                            );
                            empty(&spec.port_type)
                        }
                    };
                    let value = match expected {
                        Some(kind) if value.kind() != kind => {
                            out.push_diagnostic(
                                Issue::new(
                                    IssueKind::KindMismatch,
                                    format!(
                                        "Input `{id}.{}` expects {kind} but received {}; using an empty value",
                                        spec.name,
                                        value.kind()
                                    ),
                                )
                                .node(id.clone())
                                .at_port(&spec.name),
                            );
                            empty(&spec.port_type)
                        }
                        _ => value,
                    };
                    values.push(value);
                }
                if values.is_empty() {
                    if spec.optional || spec.feedback {
                        values.push(empty(&spec.port_type));
                    } else {
                        missing.push(&spec.name);
                        continue;
                    }
                }
                inputs.insert(spec.name.clone(), values);
            }

            if !missing.is_empty() {
                #[cfg(feature = "tracing")]
                tracing::debug!(node = %id, ?missing, "evaluate: skipped, unresolved inputs");
                for port in &missing {
                    out.push_diagnostic(
                        Issue::new(
                            IssueKind::UnresolvedInput,
                            format!("Required input `{id}.{port}` is not connected; node skipped"),
                        )
                        .node(id.clone())
                        .at_port(port),
                    );
                }
                mark_absent(&mut absent, id, ports);
                continue;
            }

            let mut record = InvocationRecord::new(id, &node.card_type, window);
            record.record_inputs(&inputs);
            let outputs = match self.invoke(def, id, node, window, transport, &inputs, &mut record.duration) {
                Ok(outputs) => outputs,
                Err(message) => {
                    out.push_diagnostic(
                        Issue::new(
                            IssueKind::CardFailed,
                            format!("Card `{id}` ({}) failed: {message}", node.card_type),
                        )
                        .node(id.clone()),
                    );
                    record.notes.push(message);
                    mark_absent(&mut absent, id, ports);
                    out.invocations += 1;
                    out.log.push(record);
                    continue;
                }
            };
            out.invocations += 1;
            record.record_outputs(&outputs);

            let mut outputs = outputs;
            for spec in &ports.outputs {
                let key = port_key(id.as_str(), &spec.name);
                let Some(mut value) = outputs.remove(&spec.name) else {
                    record.notes.push(format!("no value for `{}`", spec.name));
                    absent.insert(key, id.clone());
                    continue;
                };
                if let Some(kind) = types.kind_of(&spec.port_type) {
                    if value.kind() != kind {
                        out.push_diagnostic(
                            Issue::new(
                                IssueKind::KindMismatch,
                                format!(
                                    "Output `{id}.{}` should carry {kind} but produced {}",
                                    spec.name,
                                    value.kind()
                                ),
                            )
                            .node(id.clone())
                            .at_port(&spec.name),
                        );
                        absent.insert(key, id.clone());
                        continue;
                    }
                }
                if let RuntimeValue::EventStream(events) = &mut value {
                    sort_events(events);
                    if let Some(queue) = run.queue.as_mut() {
                        for event in events.iter() {
                            if let Err(full) = queue.push(id, &spec.name, event) {
                                if !run.overflow_reported {
                                    run.overflow_reported = true;
                                    out.push_diagnostic(
                                        Issue::new(
                                            IssueKind::QueueOverflow,
                                            format!("Event capture stopped at `{id}.{}`: {full}", spec.name),
                                        )
                                        .node(id.clone())
                                        .at_port(&spec.name),
                                    );
                                }
                            }
                        }
                    }
                }
                out.values.insert(key, value);
            }
            for extra in outputs.keys() {
                record.notes.push(format!("undeclared output `{extra}` ignored"));
            }
            if self.config.processor_log {
                out.log.push(record);
            }
        }

        out
    }

    /// Keeps the values feeding feedback inputs for the next `evaluate` call.
    fn latch_feedback(&mut self, graph: &Graph, registries: &RegistrySet, values: &BTreeMap<String, RuntimeValue>) {
        let mut feedback_sources: BTreeSet<String> = BTreeSet::new();
        for (_, edge) in graph.edges() {
            let is_feedback = graph
                .node(edge.to.node.as_str())
                .and_then(|n| n.resolved_ports(registries))
                .and_then(|p| p.input(&edge.to.port))
                .is_some_and(|spec| spec.feedback);
            if is_feedback {
                feedback_sources.insert(port_key(edge.from.node.as_str(), &edge.from.port));
            }
        }
        self.snapshot.latched = feedback_sources
            .into_iter()
            .filter_map(|key| values.get(&key).cloned().map(|value| (key, value)))
            .collect();
    }

    #[allow(clippy::too_many_arguments)]
    fn invoke(
        &mut self,
        def: &CardDefinition,
        id: &NodeId,
        node: &crate::graph::GraphNode,
        window: TickWindow,
        transport: &TransportState,
        inputs: &BTreeMap<String, Vec<RuntimeValue>>,
        duration: &mut Duration,
    ) -> Result<BTreeMap<String, RuntimeValue>, String> {
        let state = self
            .snapshot
            .states
            .entry(id.clone())
            .or_insert_with(|| def.initial_state());
        let before = state.clone();
        let started = Instant::now();
        let mut ctx = ProcessContext::new(
            id.as_str(),
            window,
            transport,
            def.reader(&node.params),
            state,
            inputs,
            &self.containers,
        );
        let result = def.processor.process(&mut ctx);
        let outputs = ctx.into_outputs();
        *duration = started.elapsed();
        match result {
            Ok(()) => Ok(outputs),
            Err(err) => {
                // A failed invocation leaves the state as it was.
                if let Some(state) = self.snapshot.states.get_mut(id) {
                    *state = before;
                }
                Err(err.to_string())
            }
        }
    }

    fn budget_exceeded(&self, invocations: u64, started: Instant) -> Option<String> {
        let budget = self.config.budget;
        if let Some(max) = budget.max_invocations {
            if invocations >= max {
                return Some(format!("{max} invocations used"));
            }
        }
        if let Some(ms) = budget.max_wall_ms {
            if started.elapsed() >= Duration::from_millis(ms) {
                return Some(format!("{ms} ms elapsed"));
            }
        }
        None
    }
}

/// Batches concatenate into the single-window result only when no planned
/// node reduces a window to one control value or reads a feedback input.
fn batch_safe(plan: &CompiledPlan, graph: &Graph, registries: &RegistrySet) -> bool {
    let types = registries.types();
    let safe = plan.topo_order.iter().all(|id| {
        graph
            .node(id.as_str())
            .and_then(|n| n.resolved_ports(registries))
            .is_some_and(|ports| {
                ports.inputs.iter().all(|spec| !spec.feedback)
                    && ports
                        .outputs
                        .iter()
                        .all(|spec| types.kind_of(&spec.port_type) != Some(ValueKind::Control))
            })
    });
    if !safe {
        #[cfg(feature = "tracing")]
        tracing::debug!("evaluate: plan has control or feedback ports, evaluating the window whole");
    }
    safe
}

fn mark_absent(absent: &mut BTreeMap<String, NodeId>, id: &NodeId, ports: &PortSet) {
    for spec in &ports.outputs {
        absent.insert(port_key(id.as_str(), &spec.name), id.clone());
    }
}
