//! Transactional pack installation.
//!
//! A pack bundles port types, protocols, card definitions and adapter edges.
//! Installation validates everything against a scratch copy of the registry
//! set and only commits when every entry registers cleanly, so a broken pack
//! never leaves the registries half-populated.

use crate::card::{CardDefinition, Provenance};
use crate::registry::{RegistryError, RegistrySet};
use crate::types::{AdapterEdge, PortTypeDef, ProtocolDef};

/// Contents of an installable pack.
#[derive(Debug, Clone)]
pub struct PackManifest {
    /// Pack identifier.
    pub id: String,
    /// Pack version.
    pub version: String,
    /// Protocols, registered first.
    pub protocols: Vec<ProtocolDef>,
    /// Port types.
    pub port_types: Vec<PortTypeDef>,
    /// Card definitions; their provenance is overwritten with this pack's.
    pub cards: Vec<CardDefinition>,
    /// Adapter edges, registered last.
    pub adapters: Vec<AdapterEdge>,
}

impl PackManifest {
    /// An empty manifest.
    pub fn new(id: &str, version: &str) -> Self {
        Self {
            id: id.to_string(),
            version: version.to_string(),
            protocols: Vec::new(),
            port_types: Vec::new(),
            cards: Vec::new(),
            adapters: Vec::new(),
        }
    }

    /// Adds a card.
    pub fn card(mut self, def: CardDefinition) -> Self {
        self.cards.push(def);
        self
    }

    /// Adds a port type.
    pub fn port_type(mut self, def: PortTypeDef) -> Self {
        self.port_types.push(def);
        self
    }

    /// Adds a protocol.
    pub fn protocol(mut self, def: ProtocolDef) -> Self {
        self.protocols.push(def);
        self
    }

    /// Adds an adapter edge.
    pub fn adapter(mut self, edge: AdapterEdge) -> Self {
        self.adapters.push(edge);
        self
    }
}

impl RegistrySet {
    /// Installs a pack, all or nothing.
    pub fn install_pack(&mut self, pack: PackManifest) -> Result<(), RegistryError> {
        let mut scratch = self.clone();
        let provenance = Provenance::Pack {
            id: pack.id.clone(),
            version: pack.version.clone(),
        };
        for protocol in pack.protocols {
            scratch.register_protocol(protocol)?;
        }
        for port_type in pack.port_types {
            scratch.register_port_type(port_type)?;
        }
        for card in pack.cards {
            scratch.register_card(card.with_provenance(provenance.clone()))?;
        }
        for adapter in pack.adapters {
            scratch.register_adapter(adapter)?;
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(pack = %pack.id, version = %pack.version, "registry: pack installed");
        *self = scratch;
        Ok(())
    }
}
