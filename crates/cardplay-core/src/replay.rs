//! Replay and lockstep verification.
//!
//! [`record()`] evaluates a window and keeps a compact summary of the
//! outputs (kind, length, content hash) together with the executor state
//! the run started from. [`replay()`] re-runs the same window against the
//! current graph from that state and reports every port whose summary
//! differs.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::compile::CompiledPlan;
use crate::diag::{Issue, IssueKind};
use crate::exec::{EvalError, Evaluation, Executor, ExecutorSnapshot};
use crate::graph::{Graph, StructureHash, digest_hex};
use crate::registry::RegistrySet;
use crate::time::{TickWindow, TransportState};
use crate::value::{RuntimeValue, ValueKind};

/// Compact, comparable summary of one runtime value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueSummary {
    /// Value kind.
    pub kind: ValueKind,
    /// Event count, sample count, or 1.
    pub len: usize,
    /// SHA-256 over the content.
    pub hash: String,
    /// Sample rate for audio values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
}

impl ValueSummary {
    /// Summarizes a value.
    pub fn of(value: &RuntimeValue) -> Self {
        let (hash, sample_rate) = match value {
            RuntimeValue::EventStream(events) => {
                (digest_hex(&serde_json::to_vec(events).unwrap_or_default()), None)
            }
            RuntimeValue::AudioBuffer(buffer) => {
                let bytes: Vec<u8> = buffer.samples.iter().flat_map(|s| s.to_le_bytes()).collect();
                (digest_hex(&bytes), Some(buffer.sample_rate))
            }
            RuntimeValue::Control(v) => (digest_hex(&v.to_bits().to_le_bytes()), None),
        };
        Self {
            kind: value.kind(),
            len: value.len(),
            hash,
            sample_rate,
        }
    }
}

impl core::fmt::Display for ValueSummary {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} x{} #{}", self.kind, self.len, &self.hash[..self.hash.len().min(12)])?;
        if let Some(sr) = self.sample_rate {
            write!(f, " @{sr}Hz")?;
        }
        Ok(())
    }
}

/// A recorded window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    /// Structure hash of the plan that was run.
    pub structure_hash: StructureHash,
    /// Window evaluated.
    pub window: TickWindow,
    /// Transport for the window.
    pub transport: TransportState,
    /// Executor state before the run.
    pub initial_state: ExecutorSnapshot,
    /// Output summaries by `"node:port"`.
    pub outputs: BTreeMap<String, ValueSummary>,
    /// Ports restricted to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watched: Option<BTreeSet<String>>,
}

impl TraceEntry {
    /// Serializes to pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parses JSON.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

fn summarize(evaluation: &Evaluation, watched: Option<&BTreeSet<String>>) -> BTreeMap<String, ValueSummary> {
    evaluation
        .values
        .iter()
        .filter(|(key, _)| watched.is_none_or(|w| w.contains(*key)))
        .map(|(key, value)| (key.clone(), ValueSummary::of(value)))
        .collect()
}

/// Evaluates `window` and records a trace entry.
///
/// `watched` restricts the trace to the given `"node:port"` keys.
pub fn record(
    executor: &mut Executor,
    plan: &CompiledPlan,
    graph: &Graph,
    registries: &RegistrySet,
    window: TickWindow,
    transport: &TransportState,
    watched: Option<BTreeSet<String>>,
) -> Result<(TraceEntry, Evaluation), EvalError> {
    let initial_state = executor.snapshot();
    let evaluation = executor.evaluate(plan, graph, registries, window, transport)?;
    let entry = TraceEntry {
        structure_hash: plan.structure_hash.clone(),
        window,
        transport: *transport,
        initial_state,
        outputs: summarize(&evaluation, watched.as_ref()),
        watched,
    };
    Ok((entry, evaluation))
}

/// One disagreeing port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDiff {
    /// `"node:port"` key.
    pub port: String,
    /// Recorded summary; `None` if the port is new.
    pub expected: Option<ValueSummary>,
    /// Replayed summary; `None` if the port disappeared.
    pub actual: Option<ValueSummary>,
}

/// Verdict of a replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "diffs", rename_all = "lowercase")]
pub enum ReplayOutcome {
    /// Every summarized output matched.
    Match,
    /// Some ports disagree.
    Mismatch(Vec<PortDiff>),
}

/// Result of [`replay()`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayReport {
    /// Verdict.
    pub outcome: ReplayOutcome,
    /// True if the graph structure changed since recording.
    pub structure_changed: bool,
    /// Diagnostics of the replayed evaluation.
    pub diagnostics: Vec<Issue>,
}

impl ReplayReport {
    /// Returns true on a match.
    pub fn is_match(&self) -> bool {
        self.outcome == ReplayOutcome::Match
    }

    /// One `ReplayMismatch` issue per differing port.
    pub fn issues(&self) -> Vec<Issue> {
        let ReplayOutcome::Mismatch(diffs) = &self.outcome else {
            return Vec::new();
        };
        diffs
            .iter()
            .map(|d| {
                let show = |s: &Option<ValueSummary>| s.as_ref().map_or_else(|| "nothing".to_string(), ToString::to_string);
                let node = d.port.rsplit_once(':').map_or(d.port.as_str(), |(node, _)| node);
                Issue::new(
                    IssueKind::ReplayMismatch,
                    format!(
                        "Port `{}` replayed {} but {} was recorded",
                        d.port,
                        show(&d.actual),
                        show(&d.expected)
                    ),
                )
                .node(node)
            })
            .collect()
    }
}

/// Re-runs a recorded window against the current graph.
///
/// A clone of `executor` is rewound to the recorded initial state, so the
/// caller's executor is left untouched.
pub fn replay(
    entry: &TraceEntry,
    executor: &Executor,
    plan: &CompiledPlan,
    graph: &Graph,
    registries: &RegistrySet,
) -> Result<ReplayReport, EvalError> {
    let mut scratch = executor.clone();
    scratch.restore(entry.initial_state.clone());
    let evaluation = scratch.evaluate(plan, graph, registries, entry.window, &entry.transport)?;
    let actual = summarize(&evaluation, entry.watched.as_ref());

    let keys: BTreeSet<&String> = entry.outputs.keys().chain(actual.keys()).collect();
    let diffs: Vec<PortDiff> = keys
        .into_iter()
        .filter_map(|key| {
            let expected = entry.outputs.get(key);
            let got = actual.get(key);
            (expected != got).then(|| PortDiff {
                port: key.clone(),
                expected: expected.cloned(),
                actual: got.cloned(),
            })
        })
        .collect();

    #[cfg(feature = "tracing")]
    tracing::debug!(diffs = diffs.len(), "replay: compared {} ports", entry.outputs.len());
    Ok(ReplayReport {
        outcome: if diffs.is_empty() {
            ReplayOutcome::Match
        } else {
            ReplayOutcome::Mismatch(diffs)
        },
        structure_changed: plan.structure_hash != entry.structure_hash,
        diagnostics: evaluation.diagnostics,
    })
}
