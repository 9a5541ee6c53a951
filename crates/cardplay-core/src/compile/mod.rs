//! Compilation: stacks into graphs, graphs into cached execution plans.

mod cache;
mod stack;
mod topo;

pub use cache::{CompileStats, CompiledPlan, Compiler, DEFAULT_CACHE_CAPACITY};
pub use stack::{
    CardInstance, ExposedPort, PortBinding, Stack, StackBehavior, StackInterface, StackMode,
    StackOptions, compile_stack,
};
pub use topo::{TopoResult, topo_order};
