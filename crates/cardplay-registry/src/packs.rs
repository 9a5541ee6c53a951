//! Packs bundled with the host, installable by id.
//!
//! Bundled packs exercise the same transactional path as third-party packs:
//! their cards carry `Provenance::Pack` and disappear again on uninstall.

use cardplay_core::{
    CardCategory, CardDefinition, CardError, PackManifest, ParamSpec, PortSpec, PortTypeDef,
    ProcessContext, RuntimeValue, ValueKind,
};

use crate::types::{EVENT_STREAM, NOTES};

/// Chord events produced by the arpeggiator pack; flow into `notes` ports.
pub const CHORDS: &str = "chords";

/// Ids of the bundled packs.
pub const BUNDLED: &[&str] = &["arp"];

/// Looks up a bundled pack.
pub fn bundled_pack(id: &str) -> Option<PackManifest> {
    match id {
        "arp" => Some(arp_pack()),
        _ => None,
    }
}

fn arp_pack() -> PackManifest {
    PackManifest::new("arp", "0.1.0")
        .port_type(
            PortTypeDef::new(CHORDS, ValueKind::EventStream)
                .implements(EVENT_STREAM)
                .compatible_with(NOTES),
        )
        .card(
            CardDefinition::new("arp.up", CardCategory::Transform, arpeggiate)
                .describe("Splits each note into a rising arpeggio")
                .input(PortSpec::new("in", NOTES))
                .output(PortSpec::new("out", CHORDS))
                .param(ParamSpec::integer("steps", 1, 8, 3))
                .param(ParamSpec::integer("interval", 1, 12, 4)),
        )
}

/// Replaces each note with `steps` shorter notes climbing by `interval`.
pub fn arpeggiate(ctx: &mut ProcessContext<'_>) -> Result<(), CardError> {
    let steps = ctx.params.i64_or("steps", 3).max(1);
    let interval = ctx.params.i64_or("interval", 4);
    let mut events = Vec::new();
    for note in ctx.events("in") {
        let slice = (note.duration / steps).max(1);
        let base = note.payload_i64("pitch").unwrap_or(60);
        for i in 0..steps {
            let mut step = note.clone();
            step.id = format!("{}.{i}", note.id);
            step.start = note.start + i * slice;
            step.duration = slice;
            if let Some(map) = step.payload.as_object_mut() {
                map.insert("pitch".to_string(), (base + i * interval).clamp(0, 127).into());
            }
            events.push(step);
        }
    }
    ctx.set_output("out", RuntimeValue::EventStream(events));
    Ok(())
}
