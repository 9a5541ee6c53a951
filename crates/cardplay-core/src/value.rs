//! Runtime values exchanged between card ports.
//!
//! Every value carries an explicit [`ValueKind`] discriminant. Port types
//! declare the kind they transport, and the executor checks kinds before and
//! after each card invocation instead of trusting an untyped payload.

use serde::{Deserialize, Serialize};

use crate::time::Tick;

/// The closed set of value shapes a port can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueKind {
    /// Ordered sequence of timestamped events.
    EventStream,
    /// Fixed-length block of audio samples.
    AudioBuffer,
    /// Single control scalar for the window.
    Control,
}

impl ValueKind {
    /// Short label used in messages and logs.
    pub const fn name(&self) -> &'static str {
        match self {
            ValueKind::EventStream => "event-stream",
            ValueKind::AudioBuffer => "audio-buffer",
            ValueKind::Control => "control",
        }
    }
}

impl core::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// A timestamped event, e.g. a note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Stable identifier, unique within the stream that produced it.
    pub id: String,
    /// Event kind tag (`"note"`, `"cc"`, ...).
    pub kind: String,
    /// Start tick.
    pub start: Tick,
    /// Duration in ticks.
    pub duration: Tick,
    /// Kind-specific payload.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Event {
    /// Creates a note event with `pitch` and `velocity` in its payload.
    pub fn note(id: impl Into<String>, start: Tick, duration: Tick, pitch: i64, velocity: i64) -> Self {
        Self {
            id: id.into(),
            kind: "note".to_string(),
            start,
            duration,
            payload: serde_json::json!({ "pitch": pitch, "velocity": velocity }),
        }
    }

    /// Tick at which the event ends.
    pub fn end(&self) -> Tick {
        self.start + self.duration
    }

    /// Reads an integer payload field.
    pub fn payload_i64(&self, key: &str) -> Option<i64> {
        self.payload.get(key).and_then(serde_json::Value::as_i64)
    }

    /// Reads a numeric payload field.
    pub fn payload_f64(&self, key: &str) -> Option<f64> {
        self.payload.get(key).and_then(serde_json::Value::as_f64)
    }
}

/// Sorts events by start tick, keeping insertion order for equal starts.
pub fn sort_events(events: &mut [Event]) {
    events.sort_by_key(|e| e.start);
}

/// Mono block of audio samples at a stated sample rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioBuffer {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Sample data.
    pub samples: Vec<f32>,
}

impl AudioBuffer {
    /// Creates a zeroed buffer of `frames` samples.
    pub fn silent(frames: usize, sample_rate: u32) -> Self {
        Self {
            sample_rate,
            samples: vec![0.0; frames],
        }
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true if the buffer holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Adds `other` into this buffer sample by sample, growing it if needed.
    pub fn mix_in(&mut self, other: &AudioBuffer) {
        if self.samples.len() < other.samples.len() {
            self.samples.resize(other.samples.len(), 0.0);
        }
        for (dst, src) in self.samples.iter_mut().zip(&other.samples) {
            *dst += *src;
        }
    }
}

/// A value produced on one output port for one evaluation window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "kebab-case")]
pub enum RuntimeValue {
    /// Events ordered by `start`.
    EventStream(Vec<Event>),
    /// Audio samples.
    AudioBuffer(AudioBuffer),
    /// Control scalar.
    Control(f64),
}

impl RuntimeValue {
    /// The kind discriminant of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            RuntimeValue::EventStream(_) => ValueKind::EventStream,
            RuntimeValue::AudioBuffer(_) => ValueKind::AudioBuffer,
            RuntimeValue::Control(_) => ValueKind::Control,
        }
    }

    /// Empty value of `kind`: no events, `frames` of silence, or zero.
    pub fn empty(kind: ValueKind, frames: usize, sample_rate: u32) -> Self {
        match kind {
            ValueKind::EventStream => RuntimeValue::EventStream(Vec::new()),
            ValueKind::AudioBuffer => RuntimeValue::AudioBuffer(AudioBuffer::silent(frames, sample_rate)),
            ValueKind::Control => RuntimeValue::Control(0.0),
        }
    }

    /// Number of elements: events, samples, or 1 for a control value.
    pub fn len(&self) -> usize {
        match self {
            RuntimeValue::EventStream(events) => events.len(),
            RuntimeValue::AudioBuffer(buffer) => buffer.len(),
            RuntimeValue::Control(_) => 1,
        }
    }

    /// Returns true for an event stream or audio buffer with no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrows the events of an event-stream value.
    pub fn as_events(&self) -> Option<&[Event]> {
        match self {
            RuntimeValue::EventStream(events) => Some(events),
            _ => None,
        }
    }

    /// Borrows the buffer of an audio value.
    pub fn as_audio(&self) -> Option<&AudioBuffer> {
        match self {
            RuntimeValue::AudioBuffer(buffer) => Some(buffer),
            _ => None,
        }
    }

    /// Returns the scalar of a control value.
    pub fn as_control(&self) -> Option<f64> {
        match self {
            RuntimeValue::Control(value) => Some(*value),
            _ => None,
        }
    }

    /// Appends a later window's value of the same kind onto this one.
    ///
    /// Events are concatenated (they are already in tick order across
    /// consecutive windows), audio is concatenated, and control takes the
    /// later value. Values of different kinds are left untouched.
    pub fn append(&mut self, later: RuntimeValue) {
        match (self, later) {
            (RuntimeValue::EventStream(events), RuntimeValue::EventStream(more)) => {
                events.extend(more);
                sort_events(events);
            }
            (RuntimeValue::AudioBuffer(buffer), RuntimeValue::AudioBuffer(more)) => {
                buffer.samples.extend(more.samples);
            }
            (RuntimeValue::Control(value), RuntimeValue::Control(next)) => *value = next,
            _ => {}
        }
    }
}

/// Named event streams supplied by the host (project containers).
pub type Containers = std::collections::BTreeMap<String, Vec<Event>>;

/// Key under which an output value is stored: `"{node}:{port}"`.
pub fn port_key(node: &str, port: &str) -> String {
    format!("{node}:{port}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_is_stable_for_equal_starts() {
        let mut events = vec![
            Event::note("b", 10, 1, 60, 100),
            Event::note("a", 0, 1, 60, 100),
            Event::note("c", 10, 1, 62, 100),
        ];
        sort_events(&mut events);
        let ids: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[test]
    fn empty_values_match_kind() {
        assert_eq!(RuntimeValue::empty(ValueKind::Control, 0, 0).kind(), ValueKind::Control);
        let audio = RuntimeValue::empty(ValueKind::AudioBuffer, 64, 48_000);
        assert_eq!(audio.len(), 64);
        assert!(RuntimeValue::empty(ValueKind::EventStream, 64, 48_000).is_empty());
    }

    #[test]
    fn append_concatenates_audio() {
        let mut a = RuntimeValue::AudioBuffer(AudioBuffer::silent(4, 48_000));
        a.append(RuntimeValue::AudioBuffer(AudioBuffer::silent(3, 48_000)));
        assert_eq!(a.len(), 7);
    }

    #[test]
    fn mix_in_sums_and_grows() {
        let mut a = AudioBuffer { sample_rate: 1, samples: vec![1.0, 1.0] };
        let b = AudioBuffer { sample_rate: 1, samples: vec![0.5, 0.5, 0.5] };
        a.mix_in(&b);
        assert_eq!(a.samples, vec![1.5, 1.5, 0.5]);
    }

    #[test]
    fn tagged_serialization() {
        let json = serde_json::to_string(&RuntimeValue::Control(0.25)).unwrap();
        assert_eq!(json, r#"{"kind":"control","data":0.25}"#);
    }

    #[test]
    fn port_key_format() {
        assert_eq!(port_key("osc", "out"), "osc:out");
    }
}
