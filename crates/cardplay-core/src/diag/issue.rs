//! Issues and suggested fixes.
//!
//! Graph-level and evaluation-level problems are collected as [`Issue`]
//! values instead of being raised as errors. Every issue names the nodes,
//! edges and port it concerns, carries a message meant for the user, and
//! lists the mechanical [`FixAction`]s that would resolve it.

use serde::{Deserialize, Serialize};

use crate::graph::{EdgeId, NodeId};
use crate::types::AdapterPath;

/// Issue taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueKind {
    /// A node references a card type that is not registered.
    UnknownCardType,
    /// A port references a type that is not registered.
    UnknownPortType,
    /// An edge points at a missing node or port.
    DanglingReference,
    /// An edge leaves an input or enters an output.
    WrongEdgeDirection,
    /// Connected port types are not directly compatible.
    TypeIncompatible,
    /// Several producers feed one single-producer input.
    ImplicitFanIn,
    /// The dependency graph contains a cycle.
    CycleDetected,
    /// A required input had no value at evaluation time.
    UnresolvedInput,
    /// Evaluation stopped at the execution budget.
    BudgetExceeded,
    /// Replayed outputs differ from the recorded trace.
    ReplayMismatch,
    /// Serial neighbours expose different numbers of ports.
    ArityMismatch,
    /// Parallel members need one port name with different types.
    PortConflict,
    /// A value of the wrong kind reached or left a card.
    KindMismatch,
    /// A card's processing function returned an error.
    CardFailed,
    /// The capture queue hit its capacity under the error policy.
    QueueOverflow,
    /// A node has no connections at all.
    UnusedNode,
    /// The same id was declared twice.
    DuplicateId,
    /// A parameter is unknown, mistyped, or out of range.
    InvalidParam,
    /// A provisional node has not been materialized.
    ProvisionalNode,
}

impl IssueKind {
    /// Stable tag used in messages and reports.
    pub const fn name(&self) -> &'static str {
        match self {
            IssueKind::UnknownCardType => "UnknownCardType",
            IssueKind::UnknownPortType => "UnknownPortType",
            IssueKind::DanglingReference => "DanglingReference",
            IssueKind::WrongEdgeDirection => "WrongEdgeDirection",
            IssueKind::TypeIncompatible => "TypeIncompatible",
            IssueKind::ImplicitFanIn => "ImplicitFanIn",
            IssueKind::CycleDetected => "CycleDetected",
            IssueKind::UnresolvedInput => "UnresolvedInput",
            IssueKind::BudgetExceeded => "BudgetExceeded",
            IssueKind::ReplayMismatch => "ReplayMismatch",
            IssueKind::ArityMismatch => "ArityMismatch",
            IssueKind::PortConflict => "PortConflict",
            IssueKind::KindMismatch => "KindMismatch",
            IssueKind::CardFailed => "CardFailed",
            IssueKind::QueueOverflow => "QueueOverflow",
            IssueKind::UnusedNode => "UnusedNode",
            IssueKind::DuplicateId => "DuplicateId",
            IssueKind::InvalidParam => "InvalidParam",
            IssueKind::ProvisionalNode => "ProvisionalNode",
        }
    }

    /// Default severity for this kind.
    pub const fn severity(&self) -> Severity {
        match self {
            IssueKind::UnusedNode | IssueKind::ProvisionalNode => Severity::Info,
            IssueKind::CycleDetected
            | IssueKind::UnresolvedInput
            | IssueKind::BudgetExceeded
            | IssueKind::ReplayMismatch
            | IssueKind::QueueOverflow
            | IssueKind::ArityMismatch => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl core::fmt::Display for IssueKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// How serious an issue is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational.
    Info,
    /// The graph runs, possibly degraded.
    Warning,
    /// The graph is not canonical.
    Error,
}

impl Severity {
    /// Lowercase label.
    pub const fn name(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

/// A concrete, mechanical repair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum FixAction {
    /// Replace an edge with a chain of adapter nodes.
    InsertAdapter {
        /// Edge to bridge.
        edge: EdgeId,
        /// Adapter chain to insert.
        path: AdapterPath,
    },
    /// Route several producers into an input through a merge node.
    InsertMerge {
        /// Consumer node.
        node: NodeId,
        /// Consumer input port.
        port: String,
        /// Merge card type to instantiate.
        merge_card: String,
        /// Edges feeding the port.
        edges: Vec<EdgeId>,
    },
    /// Delete an edge.
    RemoveEdge {
        /// Edge to delete.
        edge: EdgeId,
    },
    /// Break a cycle with a one-window delay node on an edge.
    InsertDelay {
        /// Edge to delay.
        edge: EdgeId,
        /// Delay card type to instantiate.
        delay_card: String,
    },
    /// Turn a provisional node into a concrete one.
    Materialize {
        /// Provisional node.
        node: NodeId,
    },
}

impl core::fmt::Display for FixAction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            FixAction::InsertAdapter { edge, path } => write!(f, "insert adapter {path} on {edge}"),
            FixAction::InsertMerge {
                node, port, merge_card, ..
            } => write!(f, "insert `{merge_card}` before {node}.{port}"),
            FixAction::RemoveEdge { edge } => write!(f, "remove {edge}"),
            FixAction::InsertDelay { edge, delay_card } => write!(f, "insert `{delay_card}` on {edge}"),
            FixAction::Materialize { node } => write!(f, "materialize {node}"),
        }
    }
}

/// One diagnosed problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// Kind tag.
    pub kind: IssueKind,
    /// Severity.
    pub severity: Severity,
    /// Actionable message.
    pub message: String,
    /// Offending nodes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<NodeId>,
    /// Offending edges.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub edges: Vec<EdgeId>,
    /// Port concerned, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    /// Cycle path for `CycleDetected`, first node repeated at the end.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cycle: Vec<NodeId>,
    /// Suggested repairs, best first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<FixAction>,
}

impl Issue {
    /// Creates an issue with the kind's default severity.
    pub fn new(kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.severity(),
            message: message.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
            port: None,
            cycle: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    /// Names an offending node.
    pub fn node(mut self, id: impl Into<NodeId>) -> Self {
        self.nodes.push(id.into());
        self
    }

    /// Names an offending edge.
    pub fn edge(mut self, id: EdgeId) -> Self {
        self.edges.push(id);
        self
    }

    /// Names the port concerned.
    pub fn at_port(mut self, port: &str) -> Self {
        self.port = Some(port.to_string());
        self
    }

    /// Attaches a cycle path.
    pub fn with_cycle(mut self, cycle: Vec<NodeId>) -> Self {
        self.cycle = cycle;
        self
    }

    /// Adds a suggested fix.
    pub fn suggest(mut self, fix: FixAction) -> Self {
        self.suggestions.push(fix);
        self
    }

    /// Overrides the severity.
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Returns true if at least one suggestion exists.
    pub fn is_fixable(&self) -> bool {
        !self.suggestions.is_empty()
    }
}

impl core::fmt::Display for Issue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "[{}] {}: {}", self.severity.name(), self.kind, self.message)
    }
}

/// Counts issues of one kind.
pub fn count_kind(issues: &[Issue], kind: IssueKind) -> usize {
    issues.iter().filter(|i| i.kind == kind).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_context() {
        let issue = Issue::new(IssueKind::ImplicitFanIn, "two producers")
            .node("mix")
            .edge(EdgeId(0))
            .edge(EdgeId(1))
            .at_port("in");
        assert_eq!(issue.severity, Severity::Error);
        assert_eq!(issue.edges, [EdgeId(0), EdgeId(1)]);
        assert_eq!(issue.port.as_deref(), Some("in"));
        assert!(!issue.is_fixable());
        assert_eq!(issue.to_string(), "[error] ImplicitFanIn: two producers");
    }

    #[test]
    fn serializes_with_kebab_tags() {
        let issue = Issue::new(IssueKind::CycleDetected, "loop").suggest(FixAction::RemoveEdge { edge: EdgeId(3) });
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["kind"], "cycle-detected");
        assert_eq!(json["severity"], "warning");
        assert_eq!(json["suggestions"][0]["op"], "remove-edge");
        let back: Issue = serde_json::from_value(json).unwrap();
        assert_eq!(back, issue);
    }
}
