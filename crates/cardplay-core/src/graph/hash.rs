//! Structural hashing.
//!
//! The structure hash covers the canonical (sorted) node and edge sets only.
//! Parameters, state, provisional flags and edge ids are excluded, so two
//! graphs built in different orders with the same structure hash equal and
//! share a compiled plan.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::model::Graph;

/// Hex-encoded SHA-256 over a graph's canonical structure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StructureHash(pub String);

impl StructureHash {
    /// First 12 hex digits, for logs and CLI output.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl core::fmt::Display for StructureHash {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hex-encodes a SHA-256 digest of `bytes`.
pub fn digest_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

pub(crate) fn structure_hash(graph: &Graph) -> StructureHash {
    let mut hasher = Sha256::new();
    // Nodes iterate in id order already.
    for node in graph.nodes() {
        hasher.update(b"n\x1f");
        hasher.update(node.id.as_str().as_bytes());
        hasher.update(b"\x1f");
        hasher.update(node.card_type.as_bytes());
        if let Some(ports) = &node.ports {
            let ports = serde_json::to_string(ports).unwrap_or_default();
            hasher.update(b"\x1f");
            hasher.update(ports.as_bytes());
        }
        hasher.update(b"\x1e");
    }
    let mut edges: Vec<_> = graph.edges().map(|(_, e)| e).collect();
    edges.sort();
    for edge in edges {
        for part in [
            edge.from.node.as_str(),
            edge.from.port.as_str(),
            edge.to.node.as_str(),
            edge.to.port.as_str(),
        ] {
            hasher.update(b"e\x1f");
            hasher.update(part.as_bytes());
        }
        hasher.update(b"\x1e");
    }
    StructureHash(hasher.finalize().iter().map(|b| format!("{b:02x}")).collect())
}
