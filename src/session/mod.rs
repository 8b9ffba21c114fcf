//! The live session: merged graph, fetched properties and layout runs.

/// Merging fragments and scheduling layout runs.
pub mod merge;
/// Property prefetch and element details.
pub mod prefetch;
/// Where property records come from.
pub mod source;

pub use merge::MergeCoordinator;
pub use prefetch::{Details, DetailsLoader, PrefetchStatus, PropsPrefetcher};
pub use source::{ElementSource, SourceError, StaticSource, fetch_records};
