//! The registry set passed explicitly into compile, evaluate and lint.
//!
//! [`RegistrySet`] bundles the [`TypeRegistry`] and the [`CardRegistry`]
//! together with a generation counter. Every successful registration or
//! pack uninstall bumps the generation, which invalidates cached plans.
//! Hosts build one set per session (or per test) and extend it as packs
//! are installed; nothing here is process-global.

use thiserror::Error;

use crate::card::{CardDefinition, CardRegistry};
use crate::types::{AdapterEdge, PortTypeDef, ProtocolDef, TypeRegistry};

/// Registration failures. A failed registration leaves the tables untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A different definition already uses this name.
    #[error("duplicate {kind} registration: '{name}'")]
    DuplicateRegistration {
        /// Table the name collides in.
        kind: &'static str,
        /// Colliding name.
        name: String,
    },
    /// A referenced port type is not registered.
    #[error("unknown port type '{0}'")]
    UnknownPortType(String),
    /// A referenced protocol is not registered.
    #[error("unknown protocol '{0}'")]
    UnknownProtocol(String),
    /// A referenced card type is not registered.
    #[error("unknown card type '{0}'")]
    UnknownCardType(String),
    /// The definition is malformed.
    #[error("invalid definition: {0}")]
    InvalidDefinition(String),
}

/// Type tables plus card definitions.
#[derive(Debug, Clone, Default)]
pub struct RegistrySet {
    types: TypeRegistry,
    cards: CardRegistry,
    generation: u64,
}

impl RegistrySet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Port type, protocol and adapter tables.
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// Card definitions.
    pub fn cards(&self) -> &CardRegistry {
        &self.cards
    }

    /// Counter bumped by every change to the tables.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Looks up a card definition.
    pub fn card(&self, card_type: &str) -> Option<&CardDefinition> {
        self.cards.get(card_type)
    }

    /// Registers a port type.
    pub fn register_port_type(&mut self, def: PortTypeDef) -> Result<(), RegistryError> {
        let changed = self.types.register_port_type(def)?;
        self.bump(changed);
        Ok(())
    }

    /// Registers a protocol.
    pub fn register_protocol(&mut self, def: ProtocolDef) -> Result<(), RegistryError> {
        let changed = self.types.register_protocol(def)?;
        self.bump(changed);
        Ok(())
    }

    /// Registers an adapter edge. The adapter card must already be registered.
    pub fn register_adapter(&mut self, edge: AdapterEdge) -> Result<(), RegistryError> {
        if !self.cards.contains(&edge.card_type) {
            return Err(RegistryError::UnknownCardType(edge.card_type));
        }
        let changed = self.types.register_adapter(edge)?;
        self.bump(changed);
        Ok(())
    }

    /// Registers a card definition.
    pub fn register_card(&mut self, def: CardDefinition) -> Result<(), RegistryError> {
        #[cfg(feature = "tracing")]
        let card_type = def.card_type.clone();
        let changed = self.cards.register(def, &self.types)?;
        #[cfg(feature = "tracing")]
        if changed {
            tracing::debug!(card_type = %card_type, "registry: card registered");
        }
        self.bump(changed);
        Ok(())
    }

    /// Removes every card a pack installed. Returns the removed card types.
    ///
    /// Port types, protocols and adapter edges stay: the type tables only grow.
    pub fn uninstall_pack(&mut self, pack_id: &str) -> Vec<String> {
        let removed = self.cards.remove_pack(pack_id);
        self.bump(!removed.is_empty());
        #[cfg(feature = "tracing")]
        tracing::debug!(pack = pack_id, removed = removed.len(), "registry: pack uninstalled");
        removed
    }

    fn bump(&mut self, changed: bool) {
        if changed {
            self.generation += 1;
        }
    }
}
