//! Builtin cards and types for CardPlay.
//!
//! This crate fills a [`RegistrySet`] with everything a host needs out of
//! the box: port types, the adapters between them, and a small library of
//! cards covering every role the engine knows about.
//!
//! # Contents
//!
//! - **Port types**: `notes` (event stream), `audio`, `control`, plus the
//!   `EventStream` protocol
//! - **Generators**: `gen.pulse`, `gen.clip`, `ctl.constant`
//! - **Transforms**: `fx.transpose`, `fx.quantize`, `fx.velocity`
//! - **Audio**: `synth.sine`, `fx.gain`
//! - **Routing**: adapters, merges, feedback delays and sinks
//! - **Packs**: bundled packs such as `arp`, installed on demand
//!
//! # Example
//!
//! ```rust
//! use cardplay_core::CardCategory;
//! use cardplay_registry::builtin_registry;
//!
//! let registries = builtin_registry().unwrap();
//! for card in registries.cards().in_category(CardCategory::Merge) {
//!     println!("{}: {}", card.card_type, card.description);
//! }
//! assert!(registries.card("gen.pulse").is_some());
//! ```

pub mod audio;
pub mod generators;
pub mod packs;
pub mod routing;
pub mod transforms;
pub mod types;

use cardplay_core::{CardCategory, CardDefinition, RegistryError, RegistrySet};

pub use packs::{BUNDLED, bundled_pack};
pub use types::{AUDIO, CONTROL, EVENT_STREAM, NOTES};

/// Every builtin card definition, grouped by module.
pub fn all_cards() -> Vec<CardDefinition> {
    let mut cards = generators::cards();
    cards.extend(transforms::cards());
    cards.extend(audio::cards());
    cards.extend(routing::cards());
    cards
}

/// Registers the builtin protocols, port types, cards and adapters.
///
/// Safe to call on a set that already holds them: identical definitions
/// re-register as no-ops.
pub fn install_builtins(set: &mut RegistrySet) -> Result<(), RegistryError> {
    for protocol in types::protocols() {
        set.register_protocol(protocol)?;
    }
    for port_type in types::port_types() {
        set.register_port_type(port_type)?;
    }
    for card in all_cards() {
        set.register_card(card)?;
    }
    for adapter in types::adapters() {
        set.register_adapter(adapter)?;
    }
    Ok(())
}

/// A fresh registry set holding the builtins.
pub fn builtin_registry() -> Result<RegistrySet, RegistryError> {
    let mut set = RegistrySet::new();
    install_builtins(&mut set)?;
    Ok(set)
}

/// One-line description of a card category for listings.
pub const fn category_description(category: CardCategory) -> &'static str {
    match category {
        CardCategory::Generator => "Produce events or control values from parameters and containers",
        CardCategory::Transform => "Reshape event streams",
        CardCategory::Audio => "Render or process audio",
        CardCategory::Adapter => "Convert between port types",
        CardCategory::Merge => "Give fan-in a single owner",
        CardCategory::Delay => "Feed the previous window back into a cycle",
        CardCategory::Sink => "Expose final outputs",
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::BTreeMap;

    use cardplay_core::{
        CardDefinition, CardError, CardState, Containers, ParamValue, Params, ProcessContext,
        RuntimeValue, TickWindow, TransportState,
    };

    /// Builtin card by type.
    pub fn card(card_type: &str) -> CardDefinition {
        super::all_cards()
            .into_iter()
            .find(|c| c.card_type == card_type)
            .unwrap()
    }

    /// Runs one card outside a graph, keeping its state between runs.
    pub struct Harness {
        pub def: CardDefinition,
        pub params: Params,
        pub inputs: BTreeMap<String, Vec<RuntimeValue>>,
        pub state: CardState,
        pub containers: Containers,
        pub transport: TransportState,
    }

    impl Harness {
        pub fn new(def: CardDefinition) -> Self {
            let state = def.initial_state();
            Self {
                def,
                params: Params::new(),
                inputs: BTreeMap::new(),
                state,
                containers: Containers::new(),
                transport: TransportState::new(120.0, 96).with_sample_rate(48_000),
            }
        }

        pub fn param(mut self, name: &str, value: ParamValue) -> Self {
            self.params.insert(name.to_string(), value);
            self
        }

        pub fn input(mut self, port: &str, value: RuntimeValue) -> Self {
            self.inputs.entry(port.to_string()).or_default().push(value);
            self
        }

        pub fn clear_inputs(&mut self) {
            self.inputs.clear();
        }

        pub fn run(&mut self, window: TickWindow) -> Result<BTreeMap<String, RuntimeValue>, CardError> {
            let mut ctx = ProcessContext::new(
                "node",
                window,
                &self.transport,
                self.def.reader(&self.params),
                &mut self.state,
                &self.inputs,
                &self.containers,
            );
            self.def.processor.process(&mut ctx)?;
            Ok(ctx.into_outputs())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn builtins_register_cleanly() {
        let set = builtin_registry().unwrap();
        assert_eq!(set.cards().len(), all_cards().len());
        assert_eq!(set.types().port_types().count(), 3);
        assert_eq!(set.types().adapters().count(), 2);
    }

    #[test]
    fn reinstall_is_a_no_op() {
        let mut set = builtin_registry().unwrap();
        let generation = set.generation();
        install_builtins(&mut set).unwrap();
        assert_eq!(set.generation(), generation);
    }

    #[test]
    fn card_types_are_unique() {
        let cards = all_cards();
        let names: BTreeSet<&str> = cards.iter().map(|c| c.card_type.as_str()).collect();
        assert_eq!(names.len(), cards.len());
    }

    #[test]
    fn notes_reach_audio_through_two_adapters() {
        let set = builtin_registry().unwrap();
        let path = set.types().cheapest_adapter_path(NOTES, AUDIO).unwrap();
        assert_eq!(path.card_types, vec!["adapt.notes-to-control", "adapt.control-to-audio"]);
        assert_eq!(path.total_cost, 3);
    }

    #[test]
    fn every_value_type_has_merge_and_delay() {
        let set = builtin_registry().unwrap();
        for ty in [NOTES, AUDIO, CONTROL] {
            assert!(set.cards().merge_card_for(ty, set.types()).is_some(), "merge for {ty}");
            assert!(set.cards().delay_card_for(ty, ty, set.types()).is_some(), "delay for {ty}");
        }
    }

    #[test]
    fn every_category_is_described() {
        let set = builtin_registry().unwrap();
        for card in set.cards().list() {
            assert!(!category_description(card.category).is_empty());
            assert!(!card.description.is_empty(), "{} has no description", card.card_type);
        }
    }
}
