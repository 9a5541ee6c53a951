//! Graph nodes.
//!
//! A [`GraphNode`] wraps a card instance: its card type, user parameters,
//! and optionally an explicit [`PortSet`] for virtual nodes whose ports are
//! not derived from a registered definition. Provisional nodes are merge or
//! adapter nodes inserted for preview; they must be materialized before the
//! graph is persisted.

use serde::{Deserialize, Serialize};

use crate::card::PortSet;
use crate::param::{ParamValue, Params};
use crate::registry::RegistrySet;

/// Node identifier, unique within a graph. Orders lexicographically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    /// Creates an id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrows the id text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for NodeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl core::borrow::Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A card instance placed in a graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Node identifier.
    pub id: NodeId,
    /// Card type of the instance.
    pub card_type: String,
    /// User-set parameters.
    #[serde(default)]
    pub params: Params,
    /// Explicit ports; `None` means "use the card definition".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports: Option<PortSet>,
    /// Inserted for preview and not yet materialized.
    #[serde(default)]
    pub provisional: bool,
}

impl GraphNode {
    /// A concrete node with default parameters.
    pub fn new(id: impl Into<NodeId>, card_type: &str) -> Self {
        Self {
            id: id.into(),
            card_type: card_type.to_string(),
            params: Params::new(),
            ports: None,
            provisional: false,
        }
    }

    /// Sets one parameter.
    pub fn with_param(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }

    /// Gives the node explicit ports.
    pub fn with_ports(mut self, ports: PortSet) -> Self {
        self.ports = Some(ports);
        self
    }

    /// Marks the node provisional.
    pub fn provisional(mut self) -> Self {
        self.provisional = true;
        self
    }

    /// Concrete ports: explicit ports first, then the card definition.
    pub fn resolved_ports<'a>(&'a self, registries: &'a RegistrySet) -> Option<&'a PortSet> {
        self.ports
            .as_ref()
            .or_else(|| registries.card(&self.card_type).map(|d| &d.ports))
    }
}
