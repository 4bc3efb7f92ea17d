//! Storage layer abstraction.
//!
//! The graph store holds entities, relationships and the conflict-path cache:
//! - **Graph**: entity/relationship upserts, queries and the atomic merge
//! - **Cache**: time-bounded conflict-path entries keyed by party pair

// Allow cast precision loss for counts reported as floats.
#![allow(clippy::cast_precision_loss)]
// Allow significant_drop_tightening - dropping database connections slightly early
// provides no meaningful benefit.
#![allow(clippy::significant_drop_tightening)]
// Allow match_same_arms for explicit enum handling.
#![allow(clippy::match_same_arms)]

pub mod graph;
pub mod traits;

pub use graph::{InMemoryGraphBackend, SqliteGraphBackend};
pub use traits::{ConflictCacheBackend, GraphBackend, GraphStats};

use std::path::PathBuf;

/// Default database file name inside the data directory.
pub const DEFAULT_DB_FILE: &str = "conflict_graph.db";

/// Returns the platform data directory for the application.
///
/// Falls back to `./.conflict-graph` if no home directory can be determined.
#[must_use]
pub fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("org", "conflict-graph", "conflict-graph").map_or_else(
        || PathBuf::from(".conflict-graph"),
        |dirs| dirs.data_dir().to_path_buf(),
    )
}
