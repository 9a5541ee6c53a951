//! Graph edges.
//!
//! An [`Edge`] connects an output port of one node to an input port of
//! another. Edges are identified by an [`EdgeId`] assigned sequentially by the
//! owning graph; identity is never part of the structure hash.

use serde::{Deserialize, Serialize};

use super::node::NodeId;

/// Unique identifier for an edge within a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub u32);

impl EdgeId {
    /// Returns the raw numeric identifier.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl core::fmt::Display for EdgeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// A `(node, port)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Endpoint {
    /// Node id.
    pub node: NodeId,
    /// Port name.
    pub port: String,
}

impl Endpoint {
    /// Creates an endpoint.
    pub fn new(node: impl Into<NodeId>, port: &str) -> Self {
        Self {
            node: node.into(),
            port: port.to_string(),
        }
    }
}

impl core::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}", self.node, self.port)
    }
}

/// Directed connection from an output port to an input port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    /// Producer side.
    pub from: Endpoint,
    /// Consumer side.
    pub to: Endpoint,
}

impl Edge {
    /// Creates an edge.
    pub fn new(from: Endpoint, to: Endpoint) -> Self {
        Self { from, to }
    }
}

impl core::fmt::Display for Edge {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}
