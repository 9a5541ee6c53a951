//! Graph model: nodes, edges, validation, normalization and hashing.

mod edge;
mod hash;
mod model;
mod node;
mod normalize;
mod validate;

pub use edge::{Edge, EdgeId, Endpoint};
pub use hash::{StructureHash, digest_hex};
pub use model::{Graph, GraphError};
pub use node::{GraphNode, NodeId};
pub use normalize::{NormalizeReport, normalize};
pub use validate::{describe_adapter, validate};
