//! The mutable graph model.
//!
//! [`Graph`] stores nodes keyed by id and edges keyed by [`EdgeId`]. Mutation
//! is deliberately permissive: edges may reference missing nodes or ports and
//! inputs may receive several producers. Such problems are reported by
//! [`validate()`](super::validate) and repaired by the diagnostics layer
//! instead of being rejected here, so a loaded project is never silently
//! truncated.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::param::ParamValue;

use super::edge::{Edge, EdgeId, Endpoint};
use super::hash::{StructureHash, structure_hash};
use super::node::{GraphNode, NodeId};

/// Errors from graph mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// The specified node was not found in the graph.
    #[error("node '{0}' not found")]
    NodeNotFound(NodeId),
    /// The specified edge was not found in the graph.
    #[error("edge {0} not found")]
    EdgeNotFound(EdgeId),
    /// A node with this id already exists.
    #[error("node '{0}' already exists")]
    DuplicateNode(NodeId),
}

/// Nodes and typed port-to-port edges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    nodes: BTreeMap<NodeId, GraphNode>,
    edges: BTreeMap<EdgeId, Edge>,
    next_edge: u32,
}

impl Graph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    // --- Node mutations ---

    /// Adds a node. Ids must be unique.
    pub fn add_node(&mut self, node: GraphNode) -> Result<NodeId, GraphError> {
        if self.nodes.contains_key(&node.id) {
            return Err(GraphError::DuplicateNode(node.id));
        }
        let id = node.id.clone();
        #[cfg(feature = "tracing")]
        tracing::debug!(node = %id, card_type = %node.card_type, "graph_add: node");
        self.nodes.insert(id.clone(), node);
        Ok(id)
    }

    /// Removes a node and every edge touching it.
    pub fn remove_node(&mut self, id: &str) -> Result<GraphNode, GraphError> {
        let node = self
            .nodes
            .remove(id)
            .ok_or_else(|| GraphError::NodeNotFound(NodeId::from(id)))?;
        self.edges
            .retain(|_, e| e.from.node.as_str() != id && e.to.node.as_str() != id);
        #[cfg(feature = "tracing")]
        tracing::debug!(node = id, "graph_remove: node");
        Ok(node)
    }

    /// Sets one parameter on a node. Parameters are not structural.
    pub fn set_param(
        &mut self,
        id: &str,
        name: &str,
        value: impl Into<ParamValue>,
    ) -> Result<(), GraphError> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| GraphError::NodeNotFound(NodeId::from(id)))?;
        node.params.insert(name.to_string(), value.into());
        Ok(())
    }

    // --- Edge mutations ---

    /// Connects `from_node.from_port` to `to_node.to_port`.
    pub fn connect(&mut self, from_node: &str, from_port: &str, to_node: &str, to_port: &str) -> EdgeId {
        self.add_edge(Edge::new(
            Endpoint::new(from_node, from_port),
            Endpoint::new(to_node, to_port),
        ))
    }

    /// Adds an edge without checking it.
    pub fn add_edge(&mut self, edge: Edge) -> EdgeId {
        let id = EdgeId(self.next_edge);
        self.next_edge += 1;
        #[cfg(feature = "tracing")]
        tracing::debug!(edge = %id, "graph_connect: {edge}");
        self.edges.insert(id, edge);
        id
    }

    /// Removes an edge.
    pub fn remove_edge(&mut self, id: EdgeId) -> Result<Edge, GraphError> {
        let edge = self.edges.remove(&id).ok_or(GraphError::EdgeNotFound(id))?;
        #[cfg(feature = "tracing")]
        tracing::debug!(edge = %id, "graph_disconnect: {edge}");
        Ok(edge)
    }

    // --- Queries ---

    /// Looks up a node.
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    /// Looks up a node mutably.
    pub fn node_mut(&mut self, id: &str) -> Option<&mut GraphNode> {
        self.nodes.get_mut(id)
    }

    /// Returns true if the node exists.
    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Looks up an edge.
    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(&id)
    }

    /// Nodes in ascending id order.
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    /// Mutable nodes in ascending id order.
    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut GraphNode> {
        self.nodes.values_mut()
    }

    /// Edges in ascending id order.
    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, &Edge)> {
        self.edges.iter().map(|(id, e)| (*id, e))
    }

    /// Edges arriving at `node`, in edge id order.
    pub fn incoming<'a>(&'a self, node: &'a str) -> impl Iterator<Item = (EdgeId, &'a Edge)> + 'a {
        self.edges().filter(move |(_, e)| e.to.node.as_str() == node)
    }

    /// Edges leaving `node`, in edge id order.
    pub fn outgoing<'a>(&'a self, node: &'a str) -> impl Iterator<Item = (EdgeId, &'a Edge)> + 'a {
        self.edges().filter(move |(_, e)| e.from.node.as_str() == node)
    }

    /// Edges arriving at one input port.
    pub fn edges_into<'a>(
        &'a self,
        node: &'a str,
        port: &'a str,
    ) -> impl Iterator<Item = (EdgeId, &'a Edge)> + 'a {
        self.incoming(node).filter(move |(_, e)| e.to.port == port)
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Returns a fresh node id based on `base`, suffixed until unused.
    pub fn unique_node_id(&self, base: &str) -> NodeId {
        if !self.nodes.contains_key(base) {
            return NodeId::from(base);
        }
        (2u32..)
            .map(|n| format!("{base}#{n}"))
            .find(|candidate| !self.nodes.contains_key(candidate.as_str()))
            .map(NodeId::from)
            .unwrap_or_else(|| NodeId::from(base))
    }

    /// Order-independent hash over node ids, card types, explicit ports
    /// and edge endpoints. Parameters are excluded.
    pub fn structure_hash(&self) -> StructureHash {
        structure_hash(self)
    }
}
