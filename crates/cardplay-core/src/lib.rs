//! CardPlay Core - typed card graphs, deterministic plans and window evaluation
//!
//! This crate is the runtime engine behind CardPlay: it compiles typed
//! graphs of cards into deterministic execution plans, evaluates those plans
//! over tick windows, diagnoses and repairs broken wiring, and verifies
//! behavior by replaying recorded windows.
//!
//! # Core Abstractions
//!
//! ## Registries
//!
//! - [`TypeRegistry`] - Port types, protocols and weighted adapter edges
//! - [`CardRegistry`] - Card definitions keyed by card type
//! - [`RegistrySet`] - Both tables plus a generation counter, passed explicitly
//! - [`PackManifest`] - Transactional installation of third-party cards
//!
//! ## Graph Model
//!
//! - [`Graph`] - Nodes and typed port-to-port edges
//! - [`validate`] - Dangling, direction, type and fan-in checks
//! - [`normalize`] - Canonical copy for diffing and stable reports
//!
//! ## Compilation
//!
//! - [`compile_stack`] - Serial, parallel and tabbed stacks into graph nodes
//! - [`Compiler`] - Topological plans cached by structure hash
//!
//! ## Evaluation
//!
//! - [`Executor`] - Runs a [`CompiledPlan`] over a [`TickWindow`]
//! - [`record`] / [`replay`] - Lockstep verification of recorded windows
//!
//! ## Diagnostics
//!
//! - [`lint`], [`plan_fixes`], [`apply_fixes`], [`fix_to_fixed_point`]
//! - [`materialize_merge_nodes`], [`materialize_synthetic_adapters`]
//!
//! # Example
//!
//! ```rust,ignore
//! use cardplay_core::{Compiler, Executor, ExecutorConfig, TickWindow, TransportState};
//!
//! let mut compiler = Compiler::new();
//! let plan = compiler.compile(&graph, &registries);
//! let mut executor = Executor::new(ExecutorConfig::default());
//! let eval = executor.evaluate(&plan, &graph, &registries, TickWindow::new(0, 96), &TransportState::default())?;
//! for event in eval.events("out", "out") {
//!     println!("{} @ {}", event.id, event.start);
//! }
//! ```
//!
//! # Design Principles
//!
//! - **Deterministic**: ties in the execution order break by node id, and
//!   nothing in evaluation depends on time or randomness
//! - **Collect, don't throw**: graph problems are [`Issue`] values with
//!   suggested fixes; only structural preconditions return errors
//! - **No globals**: registries are ordinary values owned by the host

pub mod card;
pub mod compile;
pub mod diag;
pub mod exec;
pub mod graph;
pub mod pack;
pub mod param;
pub mod registry;
pub mod replay;
pub mod time;
pub mod types;
pub mod value;

// Re-export main types at crate root
pub use card::{
    CardCategory, CardDefinition, CardError, CardProcessor, CardRegistry, PortSet, PortSpec,
    ProcessContext, Provenance,
};
pub use compile::{
    CardInstance, CompileStats, CompiledPlan, Compiler, ExposedPort, PortBinding, Stack,
    StackBehavior, StackInterface, StackMode, StackOptions, TopoResult, compile_stack, topo_order,
};
pub use diag::{
    CoverageReport, FixAction, FixPolicy, FixReport, Issue, IssueKind, Severity, apply_fixes,
    count_kind, coverage, fix_to_fixed_point, lint, materialize_merge_nodes,
    materialize_synthetic_adapters, plan_fixes,
};
pub use exec::{
    Budget, CaptureConfig, CapturedEvent, EvalError, Evaluation, Executor, ExecutorConfig,
    ExecutorSnapshot, InvocationRecord, OverflowPolicy,
};
pub use graph::{
    Edge, EdgeId, Endpoint, Graph, GraphError, GraphNode, NodeId, NormalizeReport, StructureHash,
    normalize, validate,
};
pub use pack::PackManifest;
pub use param::{CardState, ParamError, ParamReader, ParamSpec, ParamValue, Params, check_params};
pub use registry::{RegistryError, RegistrySet};
pub use replay::{PortDiff, ReplayOutcome, ReplayReport, TraceEntry, ValueSummary, record, replay};
pub use time::{Tick, TickWindow, TransportMode, TransportState};
pub use types::{AdapterEdge, AdapterPath, MethodSig, PortTypeDef, ProtocolDef, TypeRegistry};
pub use value::{AudioBuffer, Containers, Event, RuntimeValue, ValueKind, port_key, sort_events};
