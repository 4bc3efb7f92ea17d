//! Read-side views of an entity's neighborhood.

use super::graph::{DataSource, EntityId, EntityType, Relationship, RelationshipType};
use super::risk::PartyRef;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Orientation of an edge relative to the entity being inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeDirection {
    /// The entity is the source.
    Outgoing,
    /// The entity is the target.
    Incoming,
}

/// A relationship with its counterparty resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRelationship {
    /// The stored relationship.
    pub relationship: Relationship,
    /// Orientation relative to the inspected entity.
    pub direction: EdgeDirection,
    /// The other endpoint with its display name.
    pub counterparty: PartyRef,
    /// Type of the other endpoint, if it exists.
    pub counterparty_type: Option<EntityType>,
}

/// Filters for listing an entity's relationships.
#[derive(Debug, Clone, Default)]
pub struct RelationshipListOptions {
    /// Allowed relationship types; empty means all.
    pub relationship_types: Vec<RelationshipType>,
    /// Restrict to one orientation.
    pub direction: Option<EdgeDirection>,
    /// Include deactivated edges.
    pub include_inactive: bool,
    /// Drop edges below this confidence.
    pub min_confidence: Option<f64>,
    /// Maximum number of results.
    pub limit: Option<usize>,
}

impl RelationshipListOptions {
    /// Creates options listing every active edge.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to the given types.
    #[must_use]
    pub fn with_types(mut self, types: &[RelationshipType]) -> Self {
        self.relationship_types = types.to_vec();
        self
    }

    /// Restricts to one orientation.
    #[must_use]
    pub const fn with_direction(mut self, direction: EdgeDirection) -> Self {
        self.direction = Some(direction);
        self
    }

    /// Includes deactivated edges.
    #[must_use]
    pub const fn including_inactive(mut self) -> Self {
        self.include_inactive = true;
        self
    }

    /// Drops edges below the confidence.
    #[must_use]
    pub const fn with_min_confidence(mut self, confidence: f64) -> Self {
        self.min_confidence = Some(confidence);
        self
    }

    /// Caps the number of results.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Filters for [`find_entities`](crate::services::GraphService::find_entities).
#[derive(Debug, Clone, Default)]
pub struct EntityFilter {
    /// Case-insensitive substring of the name or an alias.
    pub name: Option<String>,
    /// Restrict to one data source.
    pub data_source: Option<DataSource>,
    /// Required metadata key/value pairs.
    pub metadata: Vec<(String, String)>,
    /// Maximum number of results.
    pub limit: Option<usize>,
    /// Results to skip.
    pub offset: usize,
}

impl EntityFilter {
    /// Creates an empty filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Filters by name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Filters by data source.
    #[must_use]
    pub const fn with_data_source(mut self, data_source: DataSource) -> Self {
        self.data_source = Some(data_source);
        self
    }

    /// Requires a metadata value.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }

    /// Caps the number of results.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips results.
    #[must_use]
    pub const fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

/// Summary of an entity's active connections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkStats {
    /// Inspected entity.
    pub entity_id: EntityId,
    /// Active edges touching the entity.
    pub total: usize,
    /// Edges where the entity is the source.
    pub outgoing: usize,
    /// Edges where the entity is the target.
    pub incoming: usize,
    /// Edge counts per relationship type.
    pub by_type: BTreeMap<RelationshipType, usize>,
    /// Distinct counterparties.
    pub unique_connections: usize,
    /// Mean confidence; zero without edges.
    pub average_confidence: f64,
    /// Heaviest edges by `weight x confidence`, strongest first.
    pub strongest_connections: Vec<EnrichedRelationship>,
}
