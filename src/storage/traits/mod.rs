//! Storage backend traits.

mod cache;
mod graph;

pub use cache::ConflictCacheBackend;
pub use graph::{GraphBackend, GraphStats};
