//! Paths between entities and the cached conflict-path entries built from them.

use super::graph::{EntityId, Relationship, RelationshipMetadata, RelationshipType};
use super::risk::RiskLevel;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One hop of a [`Path`], in traversal order.
///
/// `source`/`target` reflect the direction the path walks the edge, which for
/// an edge followed backwards is the reverse of the stored orientation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathEdge {
    /// Node the hop starts from.
    pub source: EntityId,
    /// Node the hop arrives at.
    pub target: EntityId,
    /// Type of the traversed relationship.
    pub relationship_type: RelationshipType,
    /// Weight recorded on the relationship.
    pub weight: i32,
    /// Confidence of the relationship.
    pub confidence: f64,
    /// Relationship payload.
    pub metadata: RelationshipMetadata,
}

impl PathEdge {
    /// Builds a hop from a stored relationship walked from `from`.
    #[must_use]
    pub fn from_relationship(rel: &Relationship, from: &EntityId) -> Self {
        let (source, target) = if &rel.source == from {
            (rel.source.clone(), rel.target.clone())
        } else {
            (rel.target.clone(), rel.source.clone())
        };
        Self {
            source,
            target,
            relationship_type: rel.relationship_type(),
            weight: rel.weight,
            confidence: rel.confidence,
            metadata: rel.metadata.clone(),
        }
    }
}

/// A simple path through the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    /// Node sequence; `nodes.len() == edges.len() + 1`.
    pub nodes: Vec<EntityId>,
    /// Edge sequence.
    pub edges: Vec<PathEdge>,
    /// Sum of the recorded edge weights.
    pub total_weight: i32,
}

impl Path {
    /// Starts an empty path at `origin`.
    #[must_use]
    pub fn start(origin: EntityId) -> Self {
        Self {
            nodes: vec![origin],
            edges: Vec::new(),
            total_weight: 0,
        }
    }

    /// Returns a copy extended by one hop.
    #[must_use]
    pub fn extended(&self, edge: PathEdge) -> Self {
        let mut next = self.clone();
        next.total_weight += edge.weight;
        next.nodes.push(edge.target.clone());
        next.edges.push(edge);
        next
    }

    /// Number of edges.
    #[must_use]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Returns true if the path has no edges.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Last node of the path.
    #[must_use]
    pub fn head(&self) -> Option<&EntityId> {
        self.nodes.last()
    }

    /// Returns true if no node repeats and the node/edge counts line up.
    #[must_use]
    pub fn is_simple(&self) -> bool {
        let unique: HashSet<&EntityId> = self.nodes.iter().collect();
        unique.len() == self.nodes.len() && self.nodes.len() == self.edges.len() + 1
    }
}

/// Which edge orientations path search may follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Follow edges from either endpoint.
    #[default]
    Both,
    /// Follow edges from their source only; symmetric types are still followed both ways.
    Outgoing,
}

/// Options for path search and conflict analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathOptions {
    /// Maximum number of edges per path.
    pub max_depth: usize,
    /// Restrict traversal to these relationship types.
    pub relationship_types: Option<Vec<RelationshipType>>,
    /// Skip the cache read.
    pub bypass_cache: bool,
    /// Edge orientation rule.
    pub direction: Direction,
}

impl Default for PathOptions {
    fn default() -> Self {
        Self {
            max_depth: Self::DEFAULT_MAX_DEPTH,
            relationship_types: None,
            bypass_cache: false,
            direction: Direction::Both,
        }
    }
}

impl PathOptions {
    /// Default maximum depth.
    pub const DEFAULT_MAX_DEPTH: usize = 3;

    /// Sets the maximum depth.
    #[must_use]
    pub const fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Restricts traversal to the given relationship types.
    #[must_use]
    pub fn with_types(mut self, types: &[RelationshipType]) -> Self {
        let mut types = types.to_vec();
        types.sort();
        types.dedup();
        self.relationship_types = Some(types);
        self
    }

    /// Forces a fresh search.
    #[must_use]
    pub const fn bypassing_cache(mut self) -> Self {
        self.bypass_cache = true;
        self
    }

    /// Sets the direction rule.
    #[must_use]
    pub const fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Returns true if the type may be traversed.
    #[must_use]
    pub fn allows(&self, relationship_type: RelationshipType) -> bool {
        self.relationship_types
            .as_ref()
            .is_none_or(|types| types.contains(&relationship_type))
    }
}

/// Paths returned by a search, with cache provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSearchResult {
    /// Discovered paths in discovery order.
    pub paths: Vec<Path>,
    /// True if served from the conflict-path cache.
    pub from_cache: bool,
}

/// Cached result of one subject-vs-opposing-party search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictPathEntry {
    /// Subject (search origin).
    pub subject_id: EntityId,
    /// Opposing party (search target).
    pub opposing_id: EntityId,
    /// Discovered paths.
    pub paths: Vec<Path>,
    /// Depth the paths were searched with.
    pub max_depth: usize,
    /// Type filter the paths were searched with.
    pub relationship_types: Option<Vec<RelationshipType>>,
    /// Direction rule the paths were searched with.
    pub direction: Direction,
    /// Risk score of the paths.
    pub risk_score: f64,
    /// Risk level of the paths.
    pub risk_level: RiskLevel,
    /// Human-readable recommendation.
    pub recommendation: String,
    /// Unix seconds when the entry was written.
    pub created_at: i64,
    /// Unix seconds after which the entry is stale.
    pub expires_at: i64,
}

impl ConflictPathEntry {
    /// Returns true if the entry is still inside its validity window.
    #[must_use]
    pub const fn is_valid_at(&self, now: i64) -> bool {
        self.expires_at > now
    }

    /// Returns true if the entry was produced by a search with these options.
    #[must_use]
    pub fn matches_options(&self, options: &PathOptions) -> bool {
        self.max_depth == options.max_depth
            && self.relationship_types == options.relationship_types
            && self.direction == options.direction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::graph::DataSource;

    fn employment(a: &str, b: &str) -> Relationship {
        Relationship::new(
            EntityId::new(a),
            EntityId::new(b),
            RelationshipMetadata::employment(None, None, None),
            DataSource::Manual,
        )
    }

    #[test]
    fn test_path_edge_reversed_walk() {
        let rel = employment("a", "b");
        let forward = PathEdge::from_relationship(&rel, &EntityId::new("a"));
        assert_eq!(forward.source.as_str(), "a");
        assert_eq!(forward.target.as_str(), "b");

        let backward = PathEdge::from_relationship(&rel, &EntityId::new("b"));
        assert_eq!(backward.source.as_str(), "b");
        assert_eq!(backward.target.as_str(), "a");
        assert_eq!(backward.weight, 10);
    }

    #[test]
    fn test_path_extension() {
        let rel1 = employment("a", "b");
        let rel2 = employment("b", "c");
        let path = Path::start(EntityId::new("a"))
            .extended(PathEdge::from_relationship(&rel1, &EntityId::new("a")))
            .extended(PathEdge::from_relationship(&rel2, &EntityId::new("b")));

        assert_eq!(path.len(), 2);
        assert_eq!(path.total_weight, 20);
        assert_eq!(path.head(), Some(&EntityId::new("c")));
        assert!(path.is_simple());
    }

    #[test]
    fn test_path_options_allows() {
        let options = PathOptions::default();
        assert!(options.allows(RelationshipType::Donation));
        assert_eq!(options.max_depth, 3);

        let options = options.with_types(&[RelationshipType::Employment, RelationshipType::Employment]);
        assert_eq!(
            options.relationship_types,
            Some(vec![RelationshipType::Employment])
        );
        assert!(!options.allows(RelationshipType::Donation));
    }

    #[test]
    fn test_cache_entry_validity() {
        let entry = ConflictPathEntry {
            subject_id: EntityId::new("a"),
            opposing_id: EntityId::new("b"),
            paths: Vec::new(),
            max_depth: 3,
            relationship_types: None,
            direction: Direction::Both,
            risk_score: 0.0,
            risk_level: RiskLevel::Green,
            recommendation: String::new(),
            created_at: 100,
            expires_at: 200,
        };
        assert!(entry.is_valid_at(199));
        assert!(!entry.is_valid_at(200));
        assert!(entry.matches_options(&PathOptions::default()));
        assert!(!entry.matches_options(&PathOptions::default().with_max_depth(2)));
    }
}
