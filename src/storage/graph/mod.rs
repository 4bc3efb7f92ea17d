//! Graph storage backends for the conflict graph.
//!
//! This module provides implementations of the [`GraphBackend`] and
//! [`ConflictCacheBackend`] traits.
//!
//! # Available Backends
//!
//! | Backend | Use Case | Features |
//! |---------|----------|----------|
//! | [`SqliteGraphBackend`] | Default; embedded | WAL, transactional merge |
//! | [`InMemoryGraphBackend`] | Testing | Fast, no persistence |
//!
//! # Example
//!
//! ```rust
//! use conflict_graph::models::{DataSource, EntityId, Relationship, RelationshipMetadata, RelationshipQuery};
//! use conflict_graph::storage::graph::SqliteGraphBackend;
//! use conflict_graph::storage::traits::GraphBackend;
//!
//! let backend = SqliteGraphBackend::in_memory().unwrap();
//! let edge = Relationship::new(
//!     EntityId::new("jane"),
//!     EntityId::new("acme"),
//!     RelationshipMetadata::employment(None, None, None),
//!     DataSource::ProfessionalNetwork,
//! );
//! backend.store_relationship(&edge).unwrap();
//! backend.store_relationship(&edge).unwrap();
//!
//! let stored = backend.query_relationships(&RelationshipQuery::new()).unwrap();
//! assert_eq!(stored.len(), 1);
//! ```

mod memory;
mod sqlite;

pub use memory::InMemoryGraphBackend;
pub use sqlite::SqliteGraphBackend;

// Re-export traits for convenience
pub use crate::storage::traits::{ConflictCacheBackend, GraphBackend, GraphStats};
