//! Builtin port types, protocols and adapter edges.

use cardplay_core::{AdapterEdge, PortTypeDef, ProtocolDef, ValueKind};

/// Note events.
pub const NOTES: &str = "notes";
/// Mono audio.
pub const AUDIO: &str = "audio";
/// Control scalar.
pub const CONTROL: &str = "control";
/// Protocol shared by every event-stream port type.
pub const EVENT_STREAM: &str = "EventStream";

/// Builtin protocols. Registered before the port types that implement them.
pub fn protocols() -> Vec<ProtocolDef> {
    vec![ProtocolDef::new(EVENT_STREAM).method("events", "(window) -> [Event]")]
}

/// Builtin port types.
pub fn port_types() -> Vec<PortTypeDef> {
    vec![
        PortTypeDef::new(NOTES, ValueKind::EventStream)
            .implements(EVENT_STREAM)
            .with_payload("{ pitch: int, velocity: int }"),
        PortTypeDef::new(AUDIO, ValueKind::AudioBuffer),
        PortTypeDef::new(CONTROL, ValueKind::Control),
    ]
}

/// Builtin adapter edges. The adapter cards must be registered first.
///
/// `notes -> audio` has no direct adapter; it resolves through `control`
/// at a total cost of 3.
pub fn adapters() -> Vec<AdapterEdge> {
    vec![
        AdapterEdge::new(NOTES, CONTROL, "adapt.notes-to-control", 1),
        AdapterEdge::new(CONTROL, AUDIO, "adapt.control-to-audio", 2),
    ]
}
