//! Port type, protocol and adapter tables.
//!
//! [`TypeRegistry`] answers two questions for everything above it:
//! can a value of port type `a` flow into a port of type `b`
//! ([`is_compatible`](TypeRegistry::is_compatible)), and if not directly,
//! which chain of adapter cards bridges them most cheaply
//! ([`cheapest_adapter_path`](TypeRegistry::cheapest_adapter_path)).
//!
//! Tables only grow. Re-registering an identical definition is a no-op;
//! registering a different definition under a known name is rejected.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

use serde::{Deserialize, Serialize};

use crate::registry::RegistryError;
use crate::value::ValueKind;

/// A named port type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortTypeDef {
    /// Type name, e.g. `audio` or `EventStream<NoteEvent>`.
    pub name: String,
    /// Value kind carried by ports of this type.
    pub kind: ValueKind,
    /// Types this one may flow into without an adapter.
    #[serde(default)]
    pub compatible_with: BTreeSet<String>,
    /// Protocols this type implements.
    #[serde(default)]
    pub protocols: BTreeSet<String>,
    /// Optional structural payload description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

impl PortTypeDef {
    /// A type with no compatibility relations.
    pub fn new(name: &str, kind: ValueKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            compatible_with: BTreeSet::new(),
            protocols: BTreeSet::new(),
            payload: None,
        }
    }

    /// Declares that this type may flow into `other` directly.
    pub fn compatible_with(mut self, other: &str) -> Self {
        self.compatible_with.insert(other.to_string());
        self
    }

    /// Declares that this type implements `protocol`.
    pub fn implements(mut self, protocol: &str) -> Self {
        self.protocols.insert(protocol.to_string());
        self
    }

    /// Attaches a payload description.
    pub fn with_payload(mut self, payload: &str) -> Self {
        self.payload = Some(payload.to_string());
        self
    }
}

/// One method of a protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodSig {
    /// Method name.
    pub name: String,
    /// Free-form signature, e.g. `(tick) -> event[]`.
    pub signature: String,
}

/// A named bundle of method signatures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolDef {
    /// Protocol name.
    pub name: String,
    /// Required methods.
    #[serde(default)]
    pub methods: Vec<MethodSig>,
}

impl ProtocolDef {
    /// A protocol with no methods.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            methods: Vec::new(),
        }
    }

    /// Adds a method signature.
    pub fn method(mut self, name: &str, signature: &str) -> Self {
        self.methods.push(MethodSig {
            name: name.to_string(),
            signature: signature.to_string(),
        });
        self
    }
}

/// Directed conversion between two port types through an adapter card.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AdapterEdge {
    /// Source port type.
    pub from: String,
    /// Target port type.
    pub to: String,
    /// Card type performing the conversion.
    pub card_type: String,
    /// Non-negative cost, additive along a path.
    pub cost: u32,
}

impl AdapterEdge {
    /// Creates an adapter edge.
    pub fn new(from: &str, to: &str, card_type: &str, cost: u32) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            card_type: card_type.to_string(),
            cost,
        }
    }
}

/// A chain of adapter cards turning one port type into another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterPath {
    /// Adapter card types in application order.
    pub card_types: Vec<String>,
    /// Intermediate port types visited, including both ends.
    pub port_types: Vec<String>,
    /// Sum of the edge costs.
    pub total_cost: u32,
}

impl AdapterPath {
    /// Returns true for the zero-hop identity path.
    pub fn is_identity(&self) -> bool {
        self.card_types.is_empty()
    }
}

impl core::fmt::Display for AdapterPath {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.card_types.is_empty() {
            return f.write_str("identity");
        }
        write!(f, "{} (cost {})", self.card_types.join(" -> "), self.total_cost)
    }
}

/// Port type, protocol and adapter lookup tables.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    port_types: BTreeMap<String, PortTypeDef>,
    protocols: BTreeMap<String, ProtocolDef>,
    /// Adapter edges grouped by source type.
    adapters: BTreeMap<String, Vec<AdapterEdge>>,
}

impl TypeRegistry {
    /// Creates empty tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a port type.
    ///
    /// Every protocol it claims must already be registered.
    pub fn register_port_type(&mut self, def: PortTypeDef) -> Result<bool, RegistryError> {
        if let Some(existing) = self.port_types.get(&def.name) {
            return if *existing == def {
                Ok(false)
            } else {
                Err(RegistryError::DuplicateRegistration {
                    kind: "port type",
                    name: def.name,
                })
            };
        }
        if def.name.trim().is_empty() {
            return Err(RegistryError::InvalidDefinition(
                "port type name must not be empty".to_string(),
            ));
        }
        if self.protocols.contains_key(&def.name) {
            return Err(RegistryError::DuplicateRegistration {
                kind: "port type",
                name: def.name,
            });
        }
        if let Some(missing) = def.protocols.iter().find(|p| !self.protocols.contains_key(*p)) {
            return Err(RegistryError::UnknownProtocol(missing.clone()));
        }
        self.port_types.insert(def.name.clone(), def);
        Ok(true)
    }

    /// Registers a protocol.
    pub fn register_protocol(&mut self, def: ProtocolDef) -> Result<bool, RegistryError> {
        if let Some(existing) = self.protocols.get(&def.name) {
            return if *existing == def {
                Ok(false)
            } else {
                Err(RegistryError::DuplicateRegistration {
                    kind: "protocol",
                    name: def.name,
                })
            };
        }
        if self.port_types.contains_key(&def.name) {
            return Err(RegistryError::DuplicateRegistration {
                kind: "protocol",
                name: def.name,
            });
        }
        self.protocols.insert(def.name.clone(), def);
        Ok(true)
    }

    /// Registers an adapter edge. Both port types must be known.
    ///
    /// The same `(from, to, card_type)` with a different cost is a duplicate.
    pub fn register_adapter(&mut self, edge: AdapterEdge) -> Result<bool, RegistryError> {
        for ty in [&edge.from, &edge.to] {
            if !self.port_types.contains_key(ty) {
                return Err(RegistryError::UnknownPortType(ty.clone()));
            }
        }
        let list = self.adapters.entry(edge.from.clone()).or_default();
        if let Some(existing) = list
            .iter()
            .find(|e| e.to == edge.to && e.card_type == edge.card_type)
        {
            return if *existing == edge {
                Ok(false)
            } else {
                Err(RegistryError::DuplicateRegistration {
                    kind: "adapter",
                    name: format!("{} -> {} via {}", edge.from, edge.to, edge.card_type),
                })
            };
        }
        list.push(edge);
        list.sort_by(|a, b| (&a.to, &a.card_type).cmp(&(&b.to, &b.card_type)));
        Ok(true)
    }

    /// Looks up a port type.
    pub fn port_type(&self, name: &str) -> Option<&PortTypeDef> {
        self.port_types.get(name)
    }

    /// Looks up a protocol.
    pub fn protocol(&self, name: &str) -> Option<&ProtocolDef> {
        self.protocols.get(name)
    }

    /// Returns true if `name` is a known port type or protocol.
    ///
    /// Ports may be typed by a protocol, accepting any implementor.
    pub fn is_known(&self, name: &str) -> bool {
        self.port_types.contains_key(name) || self.protocols.contains_key(name)
    }

    /// Value kind carried by `name`.
    ///
    /// A protocol-typed port takes the kind of its implementors when they
    /// all agree.
    pub fn kind_of(&self, name: &str) -> Option<ValueKind> {
        if let Some(def) = self.port_types.get(name) {
            return Some(def.kind);
        }
        let mut kinds = self
            .port_types
            .values()
            .filter(|t| t.protocols.contains(name))
            .map(|t| t.kind);
        let first = kinds.next()?;
        kinds.all(|k| k == first).then_some(first)
    }

    /// All port types, sorted by name.
    pub fn port_types(&self) -> impl Iterator<Item = &PortTypeDef> {
        self.port_types.values()
    }

    /// All protocols, sorted by name.
    pub fn protocols(&self) -> impl Iterator<Item = &ProtocolDef> {
        self.protocols.values()
    }

    /// All adapter edges, sorted by source then target.
    pub fn adapters(&self) -> impl Iterator<Item = &AdapterEdge> {
        self.adapters.values().flatten()
    }

    /// Compatibility without adapters: identity, a declared
    /// `compatible_with` relation, or `b` being a protocol `a` implements.
    pub fn is_directly_compatible(&self, a: &str, b: &str) -> bool {
        if a == b {
            return true;
        }
        let Some(def) = self.port_types.get(a) else {
            return false;
        };
        def.compatible_with.contains(b) || def.protocols.contains(b)
    }

    /// Compatibility including zero-or-more-hop adapter paths.
    pub fn is_compatible(&self, a: &str, b: &str) -> bool {
        self.is_directly_compatible(a, b) || self.cheapest_adapter_path(a, b).is_some()
    }

    /// Cheapest chain of adapters from `a` to `b`.
    ///
    /// Dijkstra over the adapter edges. Among equal-cost paths the one whose
    /// card-type sequence sorts first wins. Identical types yield the empty
    /// identity path; a target reached through a direct compatibility
    /// relation also counts as arrived.
    pub fn cheapest_adapter_path(&self, a: &str, b: &str) -> Option<AdapterPath> {
        if a == b {
            return Some(AdapterPath {
                card_types: Vec::new(),
                port_types: vec![a.to_string()],
                total_cost: 0,
            });
        }

        // Heap entries order by (cost, card sequence), giving the tie-break.
        let mut heap: BinaryHeap<Reverse<(u32, Vec<String>, Vec<String>)>> = BinaryHeap::new();
        let mut settled: BTreeSet<String> = BTreeSet::new();
        heap.push(Reverse((0, Vec::new(), vec![a.to_string()])));

        while let Some(Reverse((cost, cards, types))) = heap.pop() {
            let Some(current) = types.last().cloned() else {
                continue;
            };
            if !cards.is_empty() && self.is_directly_compatible(&current, b) {
                return Some(AdapterPath {
                    card_types: cards,
                    port_types: types,
                    total_cost: cost,
                });
            }
            if !settled.insert(current.clone()) {
                continue;
            }
            for edge in self.adapters.get(&current).into_iter().flatten() {
                if settled.contains(&edge.to) {
                    continue;
                }
                let mut next_cards = cards.clone();
                next_cards.push(edge.card_type.clone());
                let mut next_types = types.clone();
                next_types.push(edge.to.clone());
                heap.push(Reverse((cost.saturating_add(edge.cost), next_cards, next_types)));
            }
        }
        None
    }
}
