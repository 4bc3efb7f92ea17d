//! # Conflict Graph
//!
//! Conflict-of-interest detection over an entity relationship graph.
//!
//! People, organizations, court cases, donations, lobbying filings and events
//! are modeled as a directed graph. Given a subject (a prospective neutral
//! decision-maker) and an opposing party, the engine searches for bounded-depth
//! paths between them and scores each path by relationship strength,
//! confidence and age.
//!
//! ## Features
//!
//! - Pluggable graph stores (`SQLite` persistent, in-memory for tests)
//! - Breadth-first enumeration of every simple path up to a depth limit
//! - Deterministic risk scoring with age decay and GREEN/YELLOW/RED levels
//! - Lobbying conflict checks (direct and via a shared employer)
//! - Relationship inference: co-authorship, events, shared employment
//! - Duplicate detection and transactional entity merge
//! - Quarterly aggregation of donations, lobbying and case involvement
//!
//! ## Example
//!
//! ```rust
//! use conflict_graph::models::{DataSource, Entity, EntityId, EntityType, Relationship, RelationshipMetadata};
//! use conflict_graph::services::{GraphService, PathOptions};
//! use conflict_graph::storage::InMemoryGraphBackend;
//!
//! let service = GraphService::new(InMemoryGraphBackend::new());
//! service.upsert_entity(&Entity::new(EntityId::new("neutral-1"), EntityType::Neutral, "Jane Roe")).unwrap();
//! service.upsert_entity(&Entity::new(EntityId::new("acme"), EntityType::Organization, "Acme Corp")).unwrap();
//! service
//!     .upsert_relationship(&Relationship::new(
//!         EntityId::new("neutral-1"),
//!         EntityId::new("acme"),
//!         RelationshipMetadata::employment(None, None, None),
//!         DataSource::Manual,
//!     ))
//!     .unwrap();
//!
//! let assessment = service
//!     .analyze_conflict(&EntityId::new("neutral-1"), &EntityId::new("acme"), &PathOptions::default())
//!     .unwrap();
//! assert_eq!(assessment.total_paths, 1);
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod config;
pub mod gc;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;

pub use config::ConflictGraphConfig;
pub use models::{
    ConflictAssessment, DataSource, Entity, EntityId, EntityType, Path, Relationship,
    RelationshipMetadata, RelationshipType, RiskLevel,
};
pub use services::{DataAggregator, GraphService, RelationshipDetector, RiskCalculator};
pub use storage::{
    ConflictCacheBackend, GraphBackend, InMemoryGraphBackend, SqliteGraphBackend,
};

/// Error type for conflict graph operations.
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Missing or identical party ids, depth out of range, bad confidence |
/// | `NotFound` | An entity required by a write or merge does not exist |
/// | `OperationFailed` | Store queries fail, locks are poisoned, (de)serialization fails |
/// | `InconsistentState` | A merge left references behind |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A referenced record does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Kind of record (entity, relationship).
        kind: &'static str,
        /// Identifier that was looked up.
        id: String,
    },

    /// An operation failed.
    ///
    /// Raised when:
    /// - `SQLite` statements fail
    /// - A lock guarding the in-memory store is poisoned
    /// - Stored metadata cannot be serialized or parsed
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// The store was observed in a state that violates a graph invariant.
    #[error("inconsistent state: {0}")]
    InconsistentState(String),
}

impl Error {
    /// Builds an [`Error::OperationFailed`] from an operation name and any displayable cause.
    pub fn operation(operation: &str, cause: impl std::fmt::Display) -> Self {
        Self::OperationFailed {
            operation: operation.to_string(),
            cause: cause.to_string(),
        }
    }
}

/// Result type alias for conflict graph operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in seconds.
///
/// Falls back to 0 if the system clock is before the Unix epoch.
///
/// ```rust
/// use conflict_graph::current_timestamp;
///
/// assert!(current_timestamp() > 0);
/// ```
#[must_use]
pub fn current_timestamp() -> i64 {
    chrono::Utc::now().timestamp().max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("subject id is empty".to_string());
        assert_eq!(err.to_string(), "invalid input: subject id is empty");

        let err = Error::OperationFailed {
            operation: "store_entity".to_string(),
            cause: "disk full".to_string(),
        };
        assert_eq!(err.to_string(), "operation 'store_entity' failed: disk full");

        let err = Error::NotFound {
            kind: "entity",
            id: "acme".to_string(),
        };
        assert_eq!(err.to_string(), "entity not found: acme");
    }

    #[test]
    fn test_operation_helper() {
        let err = Error::operation("get_entity", "Lock poisoned");
        assert!(matches!(
            err,
            Error::OperationFailed { ref operation, ref cause }
                if operation == "get_entity" && cause == "Lock poisoned"
        ));
    }

    #[test]
    fn test_current_timestamp() {
        assert!(current_timestamp() > 1_600_000_000);
    }
}
