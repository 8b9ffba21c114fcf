//! Graph data: decoding responses, the live model, edge geometry and search.

/// Typed response decoding.
pub mod decode;
/// Per-pass edge shapes.
pub mod geometry;
/// The merged graph.
pub mod model;
/// Property search.
pub mod search;
/// Records, model elements and references.
pub mod types;

pub use decode::{DecodeError, decode};
pub use model::{GraphModel, MergeOutcome};
pub use types::*;
