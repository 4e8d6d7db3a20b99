//! The shared incident graph: types, store and per-case views.

mod snapshot;
mod store;
mod types;

pub use snapshot::{CaseSnapshot, CaseSummary};
pub use store::{GraphStore, MutationSink};
pub use types::{Edge, EdgeKind, GeoPoint, Mutation, Node, NodeData, NodeKind};
