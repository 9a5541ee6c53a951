//! Card definitions and the card definition registry.
//!
//! A [`CardDefinition`] couples a signature (typed input/output ports,
//! parameter schema, state schema) with a [`CardProcessor`]. Definitions are
//! immutable once registered and keyed by their card type.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::param::{CardState, ParamReader, ParamSpec, ParamValue, Params};
use crate::registry::RegistryError;
use crate::time::{TickWindow, TransportState};
use crate::types::TypeRegistry;
use crate::value::{AudioBuffer, Containers, Event, RuntimeValue};

/// Role of a card, used for listing and for fix planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardCategory {
    /// Produces values from parameters and containers.
    Generator,
    /// Reshapes events.
    Transform,
    /// Produces or processes audio.
    Audio,
    /// Converts between port types; inserted on type mismatches.
    Adapter,
    /// Mediates fan-in into a single port.
    Merge,
    /// Delays a value by one window to break feedback cycles.
    Delay,
    /// Terminal output.
    Sink,
}

impl CardCategory {
    /// Human-readable name.
    pub const fn name(&self) -> &'static str {
        match self {
            CardCategory::Generator => "Generator",
            CardCategory::Transform => "Transform",
            CardCategory::Audio => "Audio",
            CardCategory::Adapter => "Adapter",
            CardCategory::Merge => "Merge",
            CardCategory::Delay => "Delay",
            CardCategory::Sink => "Sink",
        }
    }
}

/// Where a definition came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum Provenance {
    /// Shipped with the host.
    #[default]
    Builtin,
    /// Installed from a pack.
    Pack {
        /// Pack identifier.
        id: String,
        /// Pack version.
        version: String,
    },
}

impl Provenance {
    /// Pack identifier, if any.
    pub fn pack_id(&self) -> Option<&str> {
        match self {
            Provenance::Builtin => None,
            Provenance::Pack { id, .. } => Some(id),
        }
    }
}

/// A named, typed port on a card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortSpec {
    /// Port name, unique within its direction.
    pub name: String,
    /// Port type name.
    pub port_type: String,
    /// Input may stay unconnected; it then receives an empty value.
    #[serde(default)]
    pub optional: bool,
    /// Input accepts any number of producers.
    #[serde(default)]
    pub multi: bool,
    /// Input reads the previous window's value and does not order the graph.
    #[serde(default)]
    pub feedback: bool,
}

impl PortSpec {
    /// A required single-producer port.
    pub fn new(name: &str, port_type: &str) -> Self {
        Self {
            name: name.to_string(),
            port_type: port_type.to_string(),
            optional: false,
            multi: false,
            feedback: false,
        }
    }

    /// Marks the port optional.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Marks the port as accepting fan-in.
    pub fn multi(mut self) -> Self {
        self.multi = true;
        self
    }

    /// Marks the port as a one-window feedback input.
    pub fn feedback(mut self) -> Self {
        self.feedback = true;
        self
    }
}

/// Resolved input and output ports of a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortSet {
    /// Input ports in declaration order.
    #[serde(default)]
    pub inputs: Vec<PortSpec>,
    /// Output ports in declaration order.
    #[serde(default)]
    pub outputs: Vec<PortSpec>,
}

impl PortSet {
    /// Finds an input port.
    pub fn input(&self, name: &str) -> Option<&PortSpec> {
        self.inputs.iter().find(|p| p.name == name)
    }

    /// Finds an output port.
    pub fn output(&self, name: &str) -> Option<&PortSpec> {
        self.outputs.iter().find(|p| p.name == name)
    }
}

/// Error raised by a card's processing function.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CardError {
    /// A required input was absent or of the wrong shape.
    #[error("missing input '{0}'")]
    MissingInput(String),
    /// A parameter value cannot be used.
    #[error("invalid parameter: {0}")]
    InvalidParam(String),
    /// Any other failure.
    #[error("{0}")]
    Failed(String),
}

/// Processing function of a card.
///
/// Implementations must be synchronous and deterministic in
/// `(inputs, params, state, window, transport)`.
pub trait CardProcessor: Send + Sync {
    /// Computes the outputs for one window.
    fn process(&self, ctx: &mut ProcessContext<'_>) -> Result<(), CardError>;
}

impl<F> CardProcessor for F
where
    F: Fn(&mut ProcessContext<'_>) -> Result<(), CardError> + Send + Sync,
{
    fn process(&self, ctx: &mut ProcessContext<'_>) -> Result<(), CardError> {
        self(ctx)
    }
}

/// Everything a card sees during one invocation.
pub struct ProcessContext<'a> {
    /// Node being evaluated.
    pub node: &'a str,
    /// Window being evaluated.
    pub window: TickWindow,
    /// Transport valid for the window.
    pub transport: &'a TransportState,
    /// Parameters with schema defaults applied.
    pub params: ParamReader<'a>,
    /// Carry-over state of this instance.
    pub state: &'a mut CardState,
    inputs: &'a BTreeMap<String, Vec<RuntimeValue>>,
    containers: &'a Containers,
    outputs: BTreeMap<String, RuntimeValue>,
}

impl<'a> ProcessContext<'a> {
    /// Assembles a context. Used by the executor and by card tests.
    pub fn new(
        node: &'a str,
        window: TickWindow,
        transport: &'a TransportState,
        params: ParamReader<'a>,
        state: &'a mut CardState,
        inputs: &'a BTreeMap<String, Vec<RuntimeValue>>,
        containers: &'a Containers,
    ) -> Self {
        Self {
            node,
            window,
            transport,
            params,
            state,
            inputs,
            containers,
            outputs: BTreeMap::new(),
        }
    }

    /// First value on an input port.
    pub fn input(&self, port: &str) -> Option<&RuntimeValue> {
        self.inputs.get(port).and_then(|v| v.first())
    }

    /// All values on an input port, in producer order.
    pub fn inputs(&self, port: &str) -> &[RuntimeValue] {
        self.inputs.get(port).map_or(&[], Vec::as_slice)
    }

    /// Events of the first value on `port`, empty when absent.
    pub fn events(&self, port: &str) -> &[Event] {
        self.input(port).and_then(RuntimeValue::as_events).unwrap_or(&[])
    }

    /// Audio buffer of the first value on `port`.
    pub fn audio(&self, port: &str) -> Option<&AudioBuffer> {
        self.input(port).and_then(RuntimeValue::as_audio)
    }

    /// Control scalar of the first value on `port`.
    pub fn control(&self, port: &str) -> Option<f64> {
        self.input(port).and_then(RuntimeValue::as_control)
    }

    /// Host-supplied container by name.
    pub fn container(&self, name: &str) -> Option<&[Event]> {
        self.containers.get(name).map(Vec::as_slice)
    }

    /// Number of audio frames in the current window.
    pub fn frames(&self) -> usize {
        self.transport.frames_in(&self.window)
    }

    /// Absolute frame index of the window start.
    pub fn first_frame(&self) -> i64 {
        self.transport.tick_to_frame(self.window.from)
    }

    /// Stores the value for an output port.
    pub fn set_output(&mut self, port: &str, value: RuntimeValue) {
        self.outputs.insert(port.to_string(), value);
    }

    /// Consumes the context, returning the produced outputs.
    pub fn into_outputs(self) -> BTreeMap<String, RuntimeValue> {
        self.outputs
    }
}

/// A registered card type.
#[derive(Clone)]
pub struct CardDefinition {
    /// Card type identifier.
    pub card_type: String,
    /// One-line description.
    pub description: String,
    /// Role.
    pub category: CardCategory,
    /// Typed ports.
    pub ports: PortSet,
    /// Parameter schema.
    pub params: Vec<ParamSpec>,
    /// State schema: field names with initial values.
    pub state: Vec<(String, ParamValue)>,
    /// Origin.
    pub provenance: Provenance,
    /// Capabilities the host must grant before side-effecting calls.
    pub capabilities: BTreeSet<String>,
    /// Processing function.
    pub processor: Arc<dyn CardProcessor>,
}

impl core::fmt::Debug for CardDefinition {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CardDefinition")
            .field("card_type", &self.card_type)
            .field("category", &self.category)
            .field("ports", &self.ports)
            .field("params", &self.params)
            .field("provenance", &self.provenance)
            .finish_non_exhaustive()
    }
}

impl CardDefinition {
    /// Starts a definition with no ports.
    pub fn new(
        card_type: &str,
        category: CardCategory,
        processor: impl CardProcessor + 'static,
    ) -> Self {
        Self {
            card_type: card_type.to_string(),
            description: String::new(),
            category,
            ports: PortSet::default(),
            params: Vec::new(),
            state: Vec::new(),
            provenance: Provenance::Builtin,
            capabilities: BTreeSet::new(),
            processor: Arc::new(processor),
        }
    }

    /// Sets the description.
    pub fn describe(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Appends an input port.
    pub fn input(mut self, port: PortSpec) -> Self {
        self.ports.inputs.push(port);
        self
    }

    /// Appends an output port.
    pub fn output(mut self, port: PortSpec) -> Self {
        self.ports.outputs.push(port);
        self
    }

    /// Appends a parameter.
    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    /// Appends a state field with its initial value.
    pub fn state_field(mut self, name: &str, initial: impl Into<ParamValue>) -> Self {
        self.state.push((name.to_string(), initial.into()));
        self
    }

    /// Sets the provenance.
    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }

    /// Declares a required capability.
    pub fn capability(mut self, capability: &str) -> Self {
        self.capabilities.insert(capability.to_string());
        self
    }

    /// Fresh state built from the state schema.
    pub fn initial_state(&self) -> CardState {
        self.state.iter().cloned().collect()
    }

    /// Parameter view over `values` with this card's defaults.
    pub fn reader<'a>(&'a self, values: &'a Params) -> ParamReader<'a> {
        ParamReader::new(&self.params, values)
    }

    /// True when the declared signature (everything but the processor) matches.
    pub fn same_signature(&self, other: &CardDefinition) -> bool {
        self.card_type == other.card_type
            && self.category == other.category
            && self.ports == other.ports
            && self.params == other.params
            && self.state == other.state
            && self.provenance == other.provenance
            && self.capabilities == other.capabilities
    }

    fn check(&self, types: &TypeRegistry) -> Result<(), RegistryError> {
        if self.card_type.trim().is_empty() {
            return Err(RegistryError::InvalidDefinition(
                "card type must not be empty".to_string(),
            ));
        }
        for (direction, ports) in [("input", &self.ports.inputs), ("output", &self.ports.outputs)] {
            let mut seen = BTreeSet::new();
            for port in ports {
                if !seen.insert(port.name.as_str()) {
                    return Err(RegistryError::InvalidDefinition(format!(
                        "card '{}' declares {direction} port '{}' twice",
                        self.card_type, port.name
                    )));
                }
                if !types.is_known(&port.port_type) {
                    return Err(RegistryError::UnknownPortType(port.port_type.clone()));
                }
            }
        }
        let mut seen = BTreeSet::new();
        if let Some(dup) = self.params.iter().find(|p| !seen.insert(p.name.as_str())) {
            return Err(RegistryError::InvalidDefinition(format!(
                "card '{}' declares parameter '{}' twice",
                self.card_type, dup.name
            )));
        }
        match self.category {
            CardCategory::Merge => {
                let ok = self.ports.inputs.len() == 1
                    && self.ports.inputs[0].multi
                    && self.ports.outputs.len() == 1;
                if !ok {
                    return Err(RegistryError::InvalidDefinition(format!(
                        "merge card '{}' needs one multi input and one output",
                        self.card_type
                    )));
                }
            }
            CardCategory::Adapter => {
                if self.ports.inputs.is_empty() || self.ports.outputs.is_empty() {
                    return Err(RegistryError::InvalidDefinition(format!(
                        "adapter card '{}' needs an input and an output",
                        self.card_type
                    )));
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Card definitions keyed by card type.
#[derive(Debug, Clone, Default)]
pub struct CardRegistry {
    definitions: BTreeMap<String, CardDefinition>,
}

impl CardRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and registers a definition.
    ///
    /// Returns `Ok(false)` when an identical signature is already registered.
    pub fn register(&mut self, def: CardDefinition, types: &TypeRegistry) -> Result<bool, RegistryError> {
        if let Some(existing) = self.definitions.get(&def.card_type) {
            return if existing.same_signature(&def) {
                Ok(false)
            } else {
                Err(RegistryError::DuplicateRegistration {
                    kind: "card",
                    name: def.card_type,
                })
            };
        }
        def.check(types)?;
        self.definitions.insert(def.card_type.clone(), def);
        Ok(true)
    }

    /// Looks up a definition.
    pub fn get(&self, card_type: &str) -> Option<&CardDefinition> {
        self.definitions.get(card_type)
    }

    /// Returns true if `card_type` is registered.
    pub fn contains(&self, card_type: &str) -> bool {
        self.definitions.contains_key(card_type)
    }

    /// All definitions sorted by card type.
    pub fn list(&self) -> impl Iterator<Item = &CardDefinition> {
        self.definitions.values()
    }

    /// Definitions in one category.
    pub fn in_category(&self, category: CardCategory) -> impl Iterator<Item = &CardDefinition> {
        self.definitions.values().filter(move |d| d.category == category)
    }

    /// Number of definitions.
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Merge card able to mediate fan-in into a port of `port_type`.
    ///
    /// An exact output-type match wins; otherwise any merge card of the same
    /// value kind whose output flows directly into `port_type`. Candidates are
    /// scanned in card-type order.
    pub fn merge_card_for(&self, port_type: &str, types: &TypeRegistry) -> Option<&CardDefinition> {
        let merges = || self.in_category(CardCategory::Merge);
        merges()
            .find(|d| d.ports.outputs[0].port_type == port_type)
            .or_else(|| {
                let kind = types.kind_of(port_type)?;
                merges().find(|d| {
                    let out = &d.ports.outputs[0].port_type;
                    types.kind_of(out) == Some(kind) && types.is_directly_compatible(out, port_type)
                })
            })
    }

    /// Delay card that can sit on an edge carrying `from_type` into `to_type`.
    pub fn delay_card_for(&self, from_type: &str, to_type: &str, types: &TypeRegistry) -> Option<&CardDefinition> {
        self.in_category(CardCategory::Delay).find(|d| {
            match (d.ports.inputs.first(), d.ports.outputs.first()) {
                (Some(input), Some(output)) => {
                    types.is_directly_compatible(from_type, &input.port_type)
                        && types.is_directly_compatible(&output.port_type, to_type)
                }
                _ => false,
            }
        })
    }

    pub(crate) fn remove_pack(&mut self, pack_id: &str) -> Vec<String> {
        let doomed: Vec<String> = self
            .definitions
            .values()
            .filter(|d| d.provenance.pack_id() == Some(pack_id))
            .map(|d| d.card_type.clone())
            .collect();
        for card_type in &doomed {
            self.definitions.remove(card_type);
        }
        doomed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PortTypeDef;
    use crate::value::ValueKind;

    fn types() -> TypeRegistry {
        let mut t = TypeRegistry::new();
        t.register_port_type(PortTypeDef::new("notes", ValueKind::EventStream)).unwrap();
        t
    }

    fn noop(_: &mut ProcessContext<'_>) -> Result<(), CardError> {
        Ok(())
    }

    #[test]
    fn rejects_empty_card_type() {
        let mut cards = CardRegistry::new();
        let err = cards
            .register(CardDefinition::new("", CardCategory::Transform, noop), &types())
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidDefinition(_)));
    }

    #[test]
    fn rejects_unknown_port_type() {
        let mut cards = CardRegistry::new();
        let def = CardDefinition::new("x", CardCategory::Transform, noop)
            .input(PortSpec::new("in", "mystery"));
        assert_eq!(
            cards.register(def, &types()),
            Err(RegistryError::UnknownPortType("mystery".into()))
        );
    }

    #[test]
    fn rejects_duplicate_port_names() {
        let mut cards = CardRegistry::new();
        let def = CardDefinition::new("x", CardCategory::Transform, noop)
            .output(PortSpec::new("out", "notes"))
            .output(PortSpec::new("out", "notes"));
        assert!(matches!(
            cards.register(def, &types()),
            Err(RegistryError::InvalidDefinition(_))
        ));
    }

    #[test]
    fn same_name_in_both_directions_is_allowed() {
        let mut cards = CardRegistry::new();
        let def = CardDefinition::new("x", CardCategory::Transform, noop)
            .input(PortSpec::new("io", "notes"))
            .output(PortSpec::new("io", "notes"));
        assert_eq!(cards.register(def, &types()), Ok(true));
    }

    #[test]
    fn identical_signature_is_idempotent() {
        let mut cards = CardRegistry::new();
        let make = || {
            CardDefinition::new("x", CardCategory::Transform, noop).output(PortSpec::new("out", "notes"))
        };
        assert_eq!(cards.register(make(), &types()), Ok(true));
        assert_eq!(cards.register(make(), &types()), Ok(false));
        let different = make().input(PortSpec::new("in", "notes"));
        assert!(matches!(
            cards.register(different, &types()),
            Err(RegistryError::DuplicateRegistration { .. })
        ));
    }

    #[test]
    fn merge_cards_need_multi_input() {
        let mut cards = CardRegistry::new();
        let def = CardDefinition::new("m", CardCategory::Merge, noop)
            .input(PortSpec::new("in", "notes"))
            .output(PortSpec::new("out", "notes"));
        assert!(cards.register(def, &types()).is_err());
    }

    #[test]
    fn merge_lookup_by_port_type() {
        let t = types();
        let mut cards = CardRegistry::new();
        cards
            .register(
                CardDefinition::new("merge.notes", CardCategory::Merge, noop)
                    .input(PortSpec::new("in", "notes").multi())
                    .output(PortSpec::new("out", "notes")),
                &t,
            )
            .unwrap();
        assert_eq!(
            cards.merge_card_for("notes", &t).map(|d| d.card_type.as_str()),
            Some("merge.notes")
        );
        assert!(cards.merge_card_for("audio", &t).is_none());
    }
}
