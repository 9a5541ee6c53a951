//! Low-overhead processor log.
//!
//! Records the shape of every invocation (per-port kind and length,
//! duration, notes) without retaining payloads.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::graph::NodeId;
use crate::time::TickWindow;
use crate::value::{RuntimeValue, ValueKind};

/// Shape of one port value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortShape {
    /// Port name.
    pub port: String,
    /// Value kind.
    pub kind: ValueKind,
    /// Element count.
    pub len: usize,
}

impl PortShape {
    fn of(port: &str, value: &RuntimeValue) -> Self {
        Self {
            port: port.to_string(),
            kind: value.kind(),
            len: value.len(),
        }
    }
}

/// One invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationRecord {
    /// Node invoked.
    pub node: NodeId,
    /// Its card type.
    pub card_type: String,
    /// Window evaluated.
    pub window: TickWindow,
    /// Input shapes, one per value.
    pub inputs: Vec<PortShape>,
    /// Output shapes.
    pub outputs: Vec<PortShape>,
    /// Wall-clock time spent in the card.
    pub duration: Duration,
    /// Error and degradation notes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl InvocationRecord {
    pub(crate) fn new(node: &NodeId, card_type: &str, window: TickWindow) -> Self {
        Self {
            node: node.clone(),
            card_type: card_type.to_string(),
            window,
            inputs: Vec::new(),
            outputs: Vec::new(),
            duration: Duration::ZERO,
            notes: Vec::new(),
        }
    }

    pub(crate) fn record_inputs(&mut self, inputs: &BTreeMap<String, Vec<RuntimeValue>>) {
        self.inputs = inputs
            .iter()
            .flat_map(|(port, values)| values.iter().map(move |v| PortShape::of(port, v)))
            .collect();
    }

    pub(crate) fn record_outputs(&mut self, outputs: &BTreeMap<String, RuntimeValue>) {
        self.outputs = outputs.iter().map(|(port, v)| PortShape::of(port, v)).collect();
    }
}

/// Per-card-type totals over a log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardTiming {
    /// Invocations.
    pub calls: u64,
    /// Total time.
    pub total: Duration,
}

/// Sums durations per card type.
pub fn summarize(log: &[InvocationRecord]) -> BTreeMap<String, CardTiming> {
    let mut totals: BTreeMap<String, CardTiming> = BTreeMap::new();
    for record in log {
        let entry = totals.entry(record.card_type.clone()).or_default();
        entry.calls += 1;
        entry.total += record.duration;
    }
    totals
}
