//! Graph backend trait for the conflict graph store.
//!
//! # Available Implementations
//!
//! | Backend | Use Case | Features |
//! |---------|----------|----------|
//! | `SqliteGraphBackend` | Default; embedded | WAL, transactional merge |
//! | `InMemoryGraphBackend` | Testing | Fast, no persistence |
//!
//! # Error Modes and Guarantees
//!
//! All backends return `Result<T>` with errors propagated via [`crate::Error`].
//! Store failures surface as [`crate::Error::OperationFailed`] naming the
//! operation.
//!
//! ## Entity Operations
//!
//! | Operation | Complexity | Notes |
//! |-----------|------------|-------|
//! | `store_entity` | O(1) | Upsert by id |
//! | `get_entity` | O(1) | By ID lookup |
//! | `query_entities` | O(n) | Filters, ordered by name then id |
//! | `delete_entity` | O(k) | k = relationship count |
//!
//! ## Relationship Operations
//!
//! | Operation | Complexity | Notes |
//! |-----------|------------|-------|
//! | `store_relationship` | O(1) | Upsert on the active `(source, target, type)` tuple |
//! | `query_relationships` | O(log n) | Insertion order |
//! | `merge_entity_into` | O(k) | Atomic |

use crate::Result;
use crate::models::{
    Entity, EntityId, EntityQuery, EntityType, MergeOutcome, Relationship, RelationshipQuery,
    RelationshipType,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Trait for conflict graph backends.
///
/// # Implementor Notes
///
/// - Methods use `&self` to enable sharing via `Arc`
/// - Use interior mutability (e.g., `Mutex<Connection>`) for mutable state
/// - At most one active relationship may exist per `(source, target, type)`
/// - Symmetric relationships arrive canonicalized (lower id as source)
/// - `merge_entity_into` must apply completely or not at all
pub trait GraphBackend: Send + Sync {
    // ========================================================================
    // Entity Operations
    // ========================================================================

    /// Stores an entity, replacing any entity with the same ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn store_entity(&self, entity: &Entity) -> Result<()>;

    /// Retrieves an entity by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup operation fails.
    fn get_entity(&self, id: &EntityId) -> Result<Option<Entity>>;

    /// Queries entities, ordered by name then id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query operation fails.
    fn query_entities(&self, query: &EntityQuery) -> Result<Vec<Entity>>;

    /// Deletes an entity and every relationship touching it.
    ///
    /// Returns `true` if the entity was deleted, `false` if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the deletion operation fails.
    fn delete_entity(&self, id: &EntityId) -> Result<bool>;

    // ========================================================================
    // Relationship Operations
    // ========================================================================

    /// Upserts a relationship.
    ///
    /// If an active relationship with the same `(source, target, type)` exists
    /// it is updated in place. Otherwise a new record is inserted.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn store_relationship(&self, relationship: &Relationship) -> Result<()>;

    /// Queries relationships in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query operation fails.
    fn query_relationships(&self, query: &RelationshipQuery) -> Result<Vec<Relationship>>;

    /// Marks the active relationship for the tuple inactive.
    ///
    /// Returns `true` if an active relationship was found.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    fn deactivate_relationship(
        &self,
        source: &EntityId,
        target: &EntityId,
        relationship_type: RelationshipType,
    ) -> Result<bool>;

    /// Folds `merge` into `keep` in a single atomic step.
    ///
    /// Edges between the two are dropped, re-pointed edges that would collide
    /// with an existing active edge are deactivated, every remaining edge is
    /// re-pointed, the merged entity's name and aliases become aliases of
    /// `keep`, and `merge` is deleted.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] if either entity is missing, or an
    /// operation error if the store fails; nothing is changed in either case.
    fn merge_entity_into(&self, keep: &EntityId, merge: &EntityId) -> Result<MergeOutcome>;

    // ========================================================================
    // Utility Operations
    // ========================================================================

    /// Returns statistics about the graph.
    ///
    /// # Errors
    ///
    /// Returns an error if the statistics query fails.
    fn get_stats(&self) -> Result<GraphStats>;

    /// Clears all graph data.
    ///
    /// # Errors
    ///
    /// Returns an error if the clear operation fails.
    fn clear(&self) -> Result<()>;
}

/// Statistics about the graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    /// Total number of entities.
    pub entity_count: usize,
    /// Entities by type.
    pub entities_by_type: HashMap<EntityType, usize>,
    /// Total number of relationships, active or not.
    pub relationship_count: usize,
    /// Active relationships.
    pub active_relationship_count: usize,
    /// Active relationships by type.
    pub relationships_by_type: HashMap<RelationshipType, usize>,
}
