//! Compiled plans and the structural plan cache.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::diag::{Issue, Severity};
use crate::graph::{Graph, NodeId, StructureHash, validate};
use crate::registry::RegistrySet;

use super::topo::topo_order;

/// Default number of plans kept by a [`Compiler`].
pub const DEFAULT_CACHE_CAPACITY: usize = 64;

/// A deterministic execution order for one graph structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledPlan {
    /// Nodes in execution order.
    pub topo_order: Vec<NodeId>,
    /// Structure hash of the compiled graph.
    pub structure_hash: StructureHash,
    /// Registry generation the plan was compiled against.
    pub generation: u64,
    /// Dependencies cut to order cyclic graphs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cuts: Vec<(NodeId, NodeId)>,
    /// Validation and cycle issues found while compiling.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<Issue>,
}

impl CompiledPlan {
    /// Returns true if a cycle had to be cut.
    pub fn is_cyclic(&self) -> bool {
        !self.cuts.is_empty()
    }

    /// Returns true if any issue has error severity.
    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    /// Position of `node` in the execution order.
    pub fn position(&self, node: &str) -> Option<usize> {
        self.topo_order.iter().position(|n| n.as_str() == node)
    }
}

/// Cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileStats {
    /// Plans computed from scratch.
    pub plans_built: u64,
    /// Compiles answered from the cache.
    pub cache_hits: u64,
}

/// Compiles graphs into plans, caching by `(structure hash, registry generation)`.
///
/// Parameter edits leave the structure hash unchanged and therefore hit the
/// cache; adding or removing nodes and edges, or changing the registries,
/// forces a rebuild.
#[derive(Debug, Clone)]
pub struct Compiler {
    cache: HashMap<(StructureHash, u64), Arc<CompiledPlan>>,
    capacity: usize,
    stats: CompileStats,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }
}

impl Compiler {
    /// Creates a compiler with the default cache capacity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a compiler keeping at most `capacity` plans (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cache: HashMap::new(),
            capacity: capacity.max(1),
            stats: CompileStats::default(),
        }
    }

    /// Compiles `graph`, reusing a cached plan when the structure is known.
    pub fn compile(&mut self, graph: &Graph, registries: &RegistrySet) -> Arc<CompiledPlan> {
        let key = (graph.structure_hash(), registries.generation());
        if let Some(plan) = self.cache.get(&key) {
            self.stats.cache_hits += 1;
            #[cfg(feature = "tracing")]
            tracing::debug!(hash = key.0.short(), "compile: cache hit");
            return Arc::clone(plan);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(hash = key.0.short(), "compile: cache miss");
        let mut issues = validate(graph, registries);
        let topo = topo_order(graph, registries);
        issues.extend(topo.issues);
        let plan = Arc::new(CompiledPlan {
            topo_order: topo.order,
            structure_hash: key.0.clone(),
            generation: key.1,
            cuts: topo.cuts,
            issues,
        });
        self.stats.plans_built += 1;

        // Older generations can never hit again.
        self.cache.retain(|(_, generation), _| *generation == key.1);
        if self.cache.len() >= self.capacity {
            self.cache.clear();
        }
        self.cache.insert(key, Arc::clone(&plan));
        plan
    }

    /// Cache counters.
    pub fn stats(&self) -> CompileStats {
        self.stats
    }

    /// Number of cached plans.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Drops every cached plan.
    pub fn clear(&mut self) {
        self.cache.clear();
    }
}
