//! Graph service: the write contract, path search and conflict analysis.
//!
//! Path search enumerates every simple path between two entities up to a
//! depth limit with a breadth-first work queue. Each queue entry carries its
//! own node sequence, edge sequence, cumulative weight and visited set, so
//! diamond-shaped connections are reported once per route rather than
//! collapsed.
//!
//! Results are cached per `(subject, opposing)` pair in the conflict-path
//! cache and reused while unexpired and produced by identical options.
//!
//! # Example
//!
//! ```rust
//! use conflict_graph::models::{DataSource, Entity, EntityId, EntityType, PathOptions, Relationship, RelationshipMetadata};
//! use conflict_graph::services::GraphService;
//! use conflict_graph::storage::InMemoryGraphBackend;
//!
//! let service = GraphService::new(InMemoryGraphBackend::new());
//! for (id, kind) in [("judge", EntityType::Neutral), ("firm", EntityType::Organization), ("client", EntityType::Organization)] {
//!     service.upsert_entity(&Entity::new(EntityId::new(id), kind, id)).unwrap();
//! }
//! service.upsert_relationship(&Relationship::new(
//!     EntityId::new("judge"), EntityId::new("firm"),
//!     RelationshipMetadata::employment(None, None, None), DataSource::Manual,
//! )).unwrap();
//! service.upsert_relationship(&Relationship::new(
//!     EntityId::new("firm"), EntityId::new("client"),
//!     RelationshipMetadata::same_case("24-cv-7", None), DataSource::CourtRecords,
//! )).unwrap();
//!
//! let paths = service
//!     .find_paths(&EntityId::new("judge"), &EntityId::new("client"), &PathOptions::default())
//!     .unwrap();
//! assert_eq!(paths.len(), 1);
//! assert_eq!(paths[0].len(), 2);
//! ```

use crate::config::{ConflictGraphConfig, SearchConfig};
use crate::models::{
    ConflictAssessment, ConflictPathEntry, Direction, EdgeDirection, EnrichedRelationship, Entity,
    EntityFilter, EntityId, EntityQuery, EntityType, LobbyingConflict, LobbyingConflictAssessment,
    LobbyingConnection, LobbyingSeverity, MultiPartyAssessment, NetworkStats, PartyRef, PartyRisk,
    Path, PathEdge, PathOptions, PathSearchResult, Relationship, RelationshipListOptions,
    RelationshipMetadata, RelationshipQuery, RelationshipType,
};
use crate::services::RiskCalculator;
use crate::storage::traits::{ConflictCacheBackend, GraphBackend};
use crate::{Error, Result, current_timestamp};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Number of edges reported in [`NetworkStats::strongest_connections`].
const STRONGEST_CONNECTIONS: usize = 5;

/// High-level service over a graph store.
///
/// # Thread Safety
///
/// The service holds no mutable state of its own; it is `Send + Sync`
/// whenever the backend is, and may be shared behind an `Arc`.
pub struct GraphService<B: GraphBackend + ConflictCacheBackend> {
    backend: Arc<B>,
    calculator: RiskCalculator,
    search: SearchConfig,
}

/// One pending route in the breadth-first work queue.
struct Frontier {
    path: Path,
    visited: HashSet<EntityId>,
}

impl<B: GraphBackend + ConflictCacheBackend> GraphService<B> {
    /// Creates a service with default configuration.
    pub fn new(backend: B) -> Self {
        Self::with_shared_backend(Arc::new(backend))
    }

    /// Creates a service over a shared backend with default configuration.
    #[must_use]
    pub fn with_shared_backend(backend: Arc<B>) -> Self {
        Self {
            backend,
            calculator: RiskCalculator::default(),
            search: SearchConfig::default(),
        }
    }

    /// Creates a service using the search and scoring sections of `config`.
    #[must_use]
    pub fn with_config(backend: Arc<B>, config: &ConflictGraphConfig) -> Self {
        Self {
            backend,
            calculator: RiskCalculator::new(config.scoring.clamped()),
            search: config.search.clamped(),
        }
    }

    /// Returns a reference to the underlying backend.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns the shared backend handle.
    #[must_use]
    pub fn shared_backend(&self) -> Arc<B> {
        Arc::clone(&self.backend)
    }

    /// Returns the risk calculator.
    #[must_use]
    pub const fn calculator(&self) -> &RiskCalculator {
        &self.calculator
    }

    /// Returns the search settings.
    #[must_use]
    pub const fn search_config(&self) -> &SearchConfig {
        &self.search
    }

    /// Path options using the configured default depth.
    #[must_use]
    pub fn default_path_options(&self) -> PathOptions {
        PathOptions::default().with_max_depth(self.search.default_max_depth)
    }

    // =========================================================================
    // Write Contract
    // =========================================================================

    /// Inserts or updates an entity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a blank id or name, or a store error.
    #[instrument(skip(self, entity), fields(entity_id = %entity.id, entity_type = %entity.entity_type))]
    pub fn upsert_entity(&self, entity: &Entity) -> Result<()> {
        if entity.id.is_blank() {
            return Err(Error::InvalidInput("entity id is empty".to_string()));
        }
        if entity.name.trim().is_empty() {
            return Err(Error::InvalidInput(format!(
                "entity {} has an empty name",
                entity.id
            )));
        }
        self.backend.store_entity(entity)
    }

    /// Inserts or updates a relationship on its active tuple.
    ///
    /// Symmetric relationships are stored with the lower id as source.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a confidence outside [0, 1] or a
    /// self-loop, [`Error::NotFound`] if an endpoint does not exist, or a
    /// store error.
    #[instrument(
        skip(self, relationship),
        fields(
            source = %relationship.source,
            target = %relationship.target,
            relationship_type = %relationship.relationship_type()
        )
    )]
    pub fn upsert_relationship(&self, relationship: &Relationship) -> Result<()> {
        if !(0.0..=1.0).contains(&relationship.confidence) {
            return Err(Error::InvalidInput(format!(
                "confidence {} is outside [0, 1]",
                relationship.confidence
            )));
        }
        Self::validate_pair(&relationship.source, &relationship.target)?;
        for endpoint in [&relationship.source, &relationship.target] {
            if self.backend.get_entity(endpoint)?.is_none() {
                return Err(Error::NotFound {
                    kind: "entity",
                    id: endpoint.to_string(),
                });
            }
        }

        let mut relationship = relationship.clone();
        relationship.canonicalize();
        self.backend.store_relationship(&relationship)?;

        metrics::counter!(
            "conflict_graph_relationships_upserted_total",
            "relationship_type" => relationship.relationship_type().as_str()
        )
        .increment(1);
        Ok(())
    }

    /// Marks the active edge for the tuple inactive.
    ///
    /// Returns false if no active edge matched.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub fn deactivate_relationship(
        &self,
        source: &EntityId,
        target: &EntityId,
        relationship_type: RelationshipType,
    ) -> Result<bool> {
        let (source, target) = if relationship_type.is_symmetric() && target < source {
            (target, source)
        } else {
            (source, target)
        };
        self.backend
            .deactivate_relationship(source, target, relationship_type)
    }

    /// Looks up an entity.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub fn get_entity(&self, id: &EntityId) -> Result<Option<Entity>> {
        self.backend.get_entity(id)
    }

    // =========================================================================
    // Path Search
    // =========================================================================

    /// Finds every simple path from `source` to `target` within the options.
    ///
    /// Paths are returned in discovery order: shorter paths first, ties in
    /// (neighbor id, relationship type) order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for missing or identical ids or a
    /// depth outside `1..=max_depth_limit`, or the first store error hit.
    pub fn find_paths(
        &self,
        source: &EntityId,
        target: &EntityId,
        options: &PathOptions,
    ) -> Result<Vec<Path>> {
        self.find_paths_detailed(source, target, options)
            .map(|result| result.paths)
    }

    /// Same as [`Self::find_paths`], also reporting whether the cache served the result.
    ///
    /// # Errors
    ///
    /// See [`Self::find_paths`].
    #[instrument(skip(self, options), fields(source = %source, target = %target, max_depth = options.max_depth))]
    pub fn find_paths_detailed(
        &self,
        source: &EntityId,
        target: &EntityId,
        options: &PathOptions,
    ) -> Result<PathSearchResult> {
        Self::validate_pair(source, target)?;
        self.validate_options(options)?;

        let now = current_timestamp();
        if !options.bypass_cache
            && let Some(entry) = self.backend.get_conflict_path(source, target)?
            && entry.is_valid_at(now)
            && entry.matches_options(options)
        {
            metrics::counter!("conflict_graph_cache_hits_total").increment(1);
            tracing::debug!(paths = entry.paths.len(), "Conflict-path cache hit");
            return Ok(PathSearchResult {
                paths: entry.paths,
                from_cache: true,
            });
        }
        metrics::counter!("conflict_graph_cache_misses_total").increment(1);

        let start = Instant::now();
        let paths = self.search_paths(source, target, options)?;
        metrics::histogram!("conflict_graph_path_search_duration_ms")
            .record(start.elapsed().as_secs_f64() * 1000.0);
        tracing::debug!(
            paths = paths.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "Path search complete"
        );

        self.write_cache_entry(source, target, options, &paths, now)?;

        Ok(PathSearchResult {
            paths,
            from_cache: false,
        })
    }

    fn validate_pair(source: &EntityId, target: &EntityId) -> Result<()> {
        if source.is_blank() {
            return Err(Error::InvalidInput("source entity id is empty".to_string()));
        }
        if target.is_blank() {
            return Err(Error::InvalidInput("target entity id is empty".to_string()));
        }
        if source == target {
            return Err(Error::InvalidInput(format!(
                "source and target are the same entity: {source}"
            )));
        }
        Ok(())
    }

    fn validate_options(&self, options: &PathOptions) -> Result<()> {
        let limit = self.search.max_depth_limit;
        if options.max_depth == 0 || options.max_depth > limit {
            return Err(Error::InvalidInput(format!(
                "max_depth {} is outside 1..={limit}",
                options.max_depth
            )));
        }
        Ok(())
    }

    fn search_paths(
        &self,
        source: &EntityId,
        target: &EntityId,
        options: &PathOptions,
    ) -> Result<Vec<Path>> {
        let mut found = Vec::new();
        let mut queue = VecDeque::from([Frontier {
            path: Path::start(source.clone()),
            visited: HashSet::from([source.clone()]),
        }]);
        let mut expanded = 0_u64;

        while let Some(frontier) = queue.pop_front() {
            if frontier.path.len() >= options.max_depth {
                continue;
            }
            let Some(node) = frontier.path.head().cloned() else {
                continue;
            };

            expanded += 1;
            for edge in self.neighbor_edges(&node, options)? {
                if frontier.visited.contains(&edge.target) {
                    continue;
                }
                let reached_target = &edge.target == target;
                let next_node = edge.target.clone();
                let path = frontier.path.extended(edge);
                if reached_target {
                    found.push(path);
                    continue;
                }
                let mut visited = frontier.visited.clone();
                visited.insert(next_node);
                queue.push_back(Frontier { path, visited });
            }
        }

        metrics::counter!("conflict_graph_nodes_expanded_total").increment(expanded);
        Ok(found)
    }

    /// Traversable hops out of `node`, ordered by (neighbor id, type).
    fn neighbor_edges(&self, node: &EntityId, options: &PathOptions) -> Result<Vec<PathEdge>> {
        let mut query = RelationshipQuery::new().involving(node.clone());
        if let Some(types) = &options.relationship_types {
            query = query.with_types(types);
        }

        let mut edges: Vec<PathEdge> = self
            .backend
            .query_relationships(&query)?
            .iter()
            .filter(|rel| rel.is_active && options.allows(rel.relationship_type()))
            .filter(|rel| match options.direction {
                Direction::Both => true,
                Direction::Outgoing => {
                    &rel.source == node || rel.relationship_type().is_symmetric()
                },
            })
            .map(|rel| PathEdge::from_relationship(rel, node))
            .collect();

        edges.sort_by(|a, b| {
            a.target
                .cmp(&b.target)
                .then(a.relationship_type.cmp(&b.relationship_type))
        });
        Ok(edges)
    }

    fn write_cache_entry(
        &self,
        source: &EntityId,
        target: &EntityId,
        options: &PathOptions,
        paths: &[Path],
        now: i64,
    ) -> Result<()> {
        let assessment = self.calculator.calculate_risk_score(paths);
        let entry = ConflictPathEntry {
            subject_id: source.clone(),
            opposing_id: target.clone(),
            paths: paths.to_vec(),
            max_depth: options.max_depth,
            relationship_types: options.relationship_types.clone(),
            direction: options.direction,
            risk_score: assessment.risk_score,
            risk_level: assessment.risk_level,
            recommendation: assessment.recommendation,
            created_at: now,
            expires_at: now.saturating_add(self.search.cache_ttl_secs),
        };
        self.backend.upsert_conflict_path(&entry)
    }

    // =========================================================================
    // Conflict Analysis
    // =========================================================================

    /// Analyzes the connection between a subject and an opposing party.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] before any graph work for missing or
    /// identical ids, or the first store error hit.
    #[instrument(skip(self, options), fields(subject = %subject, opposing = %opposing))]
    pub fn analyze_conflict(
        &self,
        subject: &EntityId,
        opposing: &EntityId,
        options: &PathOptions,
    ) -> Result<ConflictAssessment> {
        if subject.is_blank() || opposing.is_blank() {
            return Err(Error::InvalidInput(
                "subject and opposing party ids are required".to_string(),
            ));
        }
        if subject == opposing {
            return Err(Error::InvalidInput(format!(
                "subject and opposing party are the same entity: {subject}"
            )));
        }

        let search = self.find_paths_detailed(subject, opposing, options)?;
        let assessment = self.calculator.calculate_risk_score(&search.paths);

        let result = ConflictAssessment {
            subject: self.party_ref(subject)?,
            opposing_party: self.party_ref(opposing)?,
            risk_score: assessment.risk_score,
            risk_level: assessment.risk_level,
            recommendation: assessment.recommendation,
            total_paths: assessment.total_paths,
            strongest_path: assessment.strongest_path,
            all_path_scores: assessment.all_path_scores,
            analyzed_at: chrono::Utc::now(),
            from_cache: search.from_cache,
        };

        metrics::counter!(
            "conflict_graph_analyses_total",
            "risk_level" => result.risk_level.as_str()
        )
        .increment(1);
        tracing::info!(
            risk_score = result.risk_score,
            risk_level = %result.risk_level,
            total_paths = result.total_paths,
            from_cache = result.from_cache,
            "Conflict analysis complete"
        );
        Ok(result)
    }

    /// Analyzes one subject against several opposing parties.
    ///
    /// # Errors
    ///
    /// Returns the first per-party error; partial results are discarded.
    #[instrument(skip(self, parties, options), fields(subject = %subject, parties = parties.len()))]
    pub fn analyze_against_parties(
        &self,
        subject: &EntityId,
        parties: &[EntityId],
        options: &PathOptions,
    ) -> Result<MultiPartyAssessment> {
        let assessments = parties
            .iter()
            .map(|party| self.analyze_conflict(subject, party, options))
            .collect::<Result<Vec<_>>>()?;
        let risks: Vec<PartyRisk> = assessments.iter().map(PartyRisk::from).collect();
        let aggregate = self.calculator.calculate_aggregate_risk(&risks);
        Ok(MultiPartyAssessment {
            assessments,
            aggregate,
        })
    }

    /// Checks for lobbying ties between the parties.
    ///
    /// Direct ties are lobbying edges between the two parties. Indirect ties
    /// go through an organization the subject works for (or shares an
    /// employer at) that lobbies with the opposing party.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for missing or identical ids, or a store error.
    #[instrument(skip(self), fields(subject = %subject, opposing = %opposing))]
    pub fn check_lobbying_conflicts(
        &self,
        subject: &EntityId,
        opposing: &EntityId,
    ) -> Result<LobbyingConflictAssessment> {
        Self::validate_pair(subject, opposing)?;

        let direct: Vec<LobbyingConflict> = self
            .lobbying_edges_between(subject, opposing)?
            .into_iter()
            .map(|rel| lobbying_conflict(LobbyingConnection::Direct, None, rel))
            .collect();

        let mut indirect = Vec::new();
        for intermediary in self.employers_of(subject, opposing)? {
            for rel in self.lobbying_edges_between(&intermediary, opposing)? {
                indirect.push(lobbying_conflict(
                    LobbyingConnection::Indirect,
                    Some(intermediary.clone()),
                    rel,
                ));
            }
        }

        let points = self.calculator.scoring().lobbying;
        let raw = u32::try_from(direct.len())
            .unwrap_or(u32::MAX)
            .saturating_mul(points.direct)
            .saturating_add(
                u32::try_from(indirect.len())
                    .unwrap_or(u32::MAX)
                    .saturating_mul(points.indirect),
            );
        let conflict_score = raw.min(100);

        tracing::debug!(
            direct = direct.len(),
            indirect = indirect.len(),
            conflict_score,
            "Lobbying check complete"
        );

        Ok(LobbyingConflictAssessment {
            subject: subject.clone(),
            opposing_party: opposing.clone(),
            direct,
            indirect,
            conflict_score,
            severity: LobbyingSeverity::from_score(conflict_score),
        })
    }

    fn lobbying_edges_between(&self, a: &EntityId, b: &EntityId) -> Result<Vec<Relationship>> {
        let query = RelationshipQuery::new()
            .involving(a.clone())
            .with_type(RelationshipType::Lobbying);
        Ok(self
            .backend
            .query_relationships(&query)?
            .into_iter()
            .filter(|rel| rel.other_end(a) == Some(b))
            .collect())
    }

    /// Organizations tied to the subject by employment, in first-seen order.
    fn employers_of(&self, subject: &EntityId, opposing: &EntityId) -> Result<Vec<EntityId>> {
        let query = RelationshipQuery::new()
            .involving(subject.clone())
            .with_types(&[
                RelationshipType::Employment,
                RelationshipType::SharedEmployer,
            ]);

        let mut seen = HashSet::new();
        let mut employers = Vec::new();
        for rel in self.backend.query_relationships(&query)? {
            let employer = match &rel.metadata {
                RelationshipMetadata::SharedEmployer { employer_id, .. } => Some(employer_id),
                _ if rel.source == *subject => Some(&rel.target),
                _ => None,
            };
            if let Some(employer) = employer
                && employer != opposing
                && employer != subject
                && seen.insert(employer.clone())
            {
                employers.push(employer.clone());
            }
        }
        Ok(employers)
    }

    // =========================================================================
    // Read Contract
    // =========================================================================

    /// Lists an entity's relationships with counterparties resolved.
    ///
    /// Ordered strongest first by `weight x confidence`, ties in store order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a blank id, or a store error.
    pub fn get_entity_relationships(
        &self,
        entity: &EntityId,
        options: &RelationshipListOptions,
    ) -> Result<Vec<EnrichedRelationship>> {
        if entity.is_blank() {
            return Err(Error::InvalidInput("entity id is empty".to_string()));
        }

        let mut query = RelationshipQuery::new()
            .involving(entity.clone())
            .with_types(&options.relationship_types);
        if options.include_inactive {
            query = query.include_inactive();
        }

        let mut names: HashMap<EntityId, Option<Entity>> = HashMap::new();
        let mut enriched = Vec::new();
        for rel in self.backend.query_relationships(&query)? {
            let direction = if &rel.source == entity {
                EdgeDirection::Outgoing
            } else {
                EdgeDirection::Incoming
            };
            if options.direction.is_some_and(|d| d != direction) {
                continue;
            }
            if options
                .min_confidence
                .is_some_and(|min| rel.confidence < min)
            {
                continue;
            }
            let Some(other) = rel.other_end(entity).cloned() else {
                continue;
            };
            let counterparty = match names.get(&other) {
                Some(cached) => cached.clone(),
                None => {
                    let found = self.backend.get_entity(&other)?;
                    names.insert(other.clone(), found.clone());
                    found
                },
            };
            enriched.push(EnrichedRelationship {
                counterparty: PartyRef {
                    name: counterparty
                        .as_ref()
                        .map_or_else(|| other.to_string(), |e| e.name.clone()),
                    id: other,
                },
                counterparty_type: counterparty.map(|e| e.entity_type),
                direction,
                relationship: rel,
            });
        }

        enriched.sort_by(|a, b| strength(&b.relationship).total_cmp(&strength(&a.relationship)));
        if let Some(limit) = options.limit {
            enriched.truncate(limit);
        }
        Ok(enriched)
    }

    /// Finds entities of a type.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub fn find_entities(
        &self,
        entity_type: EntityType,
        filter: &EntityFilter,
    ) -> Result<Vec<Entity>> {
        let mut query = EntityQuery::new()
            .with_type(entity_type)
            .with_offset(filter.offset);
        if let Some(name) = &filter.name {
            query = query.with_name(name.clone());
        }
        if let Some(data_source) = filter.data_source {
            query = query.with_data_source(data_source);
        }
        if let Some(limit) = filter.limit {
            query = query.with_limit(limit);
        }
        for (key, value) in &filter.metadata {
            query = query.with_metadata(key.clone(), value.clone());
        }
        self.backend.query_entities(&query)
    }

    /// Summarizes an entity's active connections.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a blank id, or a store error.
    pub fn get_network_stats(&self, entity: &EntityId) -> Result<NetworkStats> {
        let relationships =
            self.get_entity_relationships(entity, &RelationshipListOptions::new())?;

        let outgoing = relationships
            .iter()
            .filter(|r| r.direction == EdgeDirection::Outgoing)
            .count();
        let mut by_type: BTreeMap<RelationshipType, usize> = BTreeMap::new();
        for r in &relationships {
            *by_type
                .entry(r.relationship.relationship_type())
                .or_default() += 1;
        }
        let unique_connections = relationships
            .iter()
            .map(|r| &r.counterparty.id)
            .collect::<HashSet<_>>()
            .len();

        #[allow(clippy::cast_precision_loss)]
        let average_confidence = if relationships.is_empty() {
            0.0
        } else {
            relationships
                .iter()
                .map(|r| r.relationship.confidence)
                .sum::<f64>()
                / relationships.len() as f64
        };

        Ok(NetworkStats {
            entity_id: entity.clone(),
            total: relationships.len(),
            outgoing,
            incoming: relationships.len() - outgoing,
            by_type,
            unique_connections,
            average_confidence,
            strongest_connections: relationships
                .into_iter()
                .take(STRONGEST_CONNECTIONS)
                .collect(),
        })
    }

    /// Purges expired conflict-path cache entries.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub fn clear_expired_cache(&self) -> Result<usize> {
        let purged = self
            .backend
            .purge_expired_conflict_paths(current_timestamp())?;
        tracing::info!(purged, "Cleared expired conflict-path cache entries");
        Ok(purged)
    }

    fn party_ref(&self, id: &EntityId) -> Result<PartyRef> {
        let name = self
            .backend
            .get_entity(id)?
            .map_or_else(|| id.to_string(), |e| e.name);
        Ok(PartyRef {
            id: id.clone(),
            name,
        })
    }
}

fn strength(rel: &Relationship) -> f64 {
    f64::from(rel.weight) * rel.confidence
}

fn lobbying_conflict(
    connection: LobbyingConnection,
    intermediary: Option<EntityId>,
    rel: Relationship,
) -> LobbyingConflict {
    LobbyingConflict {
        connection,
        intermediary,
        source: rel.source,
        target: rel.target,
        metadata: rel.metadata,
        confidence: rel.confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DataSource, RiskLevel};
    use crate::storage::InMemoryGraphBackend;

    fn service() -> GraphService<InMemoryGraphBackend> {
        GraphService::new(InMemoryGraphBackend::new())
    }

    fn id(s: &str) -> EntityId {
        EntityId::new(s)
    }

    fn add_entity(service: &GraphService<InMemoryGraphBackend>, key: &str, kind: EntityType) {
        service
            .upsert_entity(&Entity::new(id(key), kind, key.to_uppercase()))
            .unwrap();
    }

    fn connect(
        service: &GraphService<InMemoryGraphBackend>,
        source: &str,
        target: &str,
        metadata: RelationshipMetadata,
    ) {
        service
            .upsert_relationship(&Relationship::new(
                id(source),
                id(target),
                metadata,
                DataSource::Manual,
            ))
            .unwrap();
    }

    fn employment() -> RelationshipMetadata {
        RelationshipMetadata::employment(None, None, None)
    }

    fn lobbying() -> RelationshipMetadata {
        RelationshipMetadata::Lobbying {
            registrant: Some("K Street LLP".to_string()),
            client: None,
            amount: Some(40_000.0),
            filing_date: None,
            issues: vec!["TAX".to_string()],
        }
    }

    /// a - b - d and a - c - d, plus a direct a - d donation.
    fn diamond() -> GraphService<InMemoryGraphBackend> {
        let service = service();
        for key in ["a", "b", "c", "d"] {
            add_entity(&service, key, EntityType::Organization);
        }
        connect(&service, "a", "b", employment());
        connect(&service, "b", "d", RelationshipMetadata::same_case("1", None));
        connect(&service, "a", "c", employment());
        connect(&service, "c", "d", RelationshipMetadata::same_case("2", None));
        connect(
            &service,
            "a",
            "d",
            RelationshipMetadata::donation(500.0, None, None, None),
        );
        service
    }

    #[test]
    fn test_diamond_paths_not_collapsed() {
        let service = diamond();
        let paths = service
            .find_paths(&id("a"), &id("d"), &PathOptions::default())
            .unwrap();

        assert_eq!(paths.len(), 3);
        assert_eq!(paths[0].len(), 1);
        assert_eq!(paths[1].nodes, vec![id("a"), id("b"), id("d")]);
        assert_eq!(paths[2].nodes, vec![id("a"), id("c"), id("d")]);
        for path in &paths {
            assert!(path.is_simple());
        }
    }

    #[test]
    fn test_depth_limit_respected() {
        let service = diamond();
        let paths = service
            .find_paths(
                &id("a"),
                &id("d"),
                &PathOptions::default().with_max_depth(1),
            )
            .unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].edges[0].relationship_type, RelationshipType::Donation);
    }

    #[test]
    fn test_type_filter() {
        let service = diamond();
        let options = PathOptions::default()
            .with_types(&[RelationshipType::Employment, RelationshipType::SameCase]);
        let paths = service.find_paths(&id("a"), &id("d"), &options).unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths.iter().all(|p| p.len() == 2));
    }

    #[test]
    fn test_outgoing_direction_blocks_reverse_edges() {
        let service = service();
        for key in ["x", "y"] {
            add_entity(&service, key, EntityType::Organization);
        }
        connect(&service, "y", "x", employment());

        let both = service
            .find_paths(&id("x"), &id("y"), &PathOptions::default())
            .unwrap();
        assert_eq!(both.len(), 1);
        assert_eq!(both[0].edges[0].source, id("x"));

        let outgoing = service
            .find_paths(
                &id("x"),
                &id("y"),
                &PathOptions::default()
                    .with_direction(Direction::Outgoing)
                    .bypassing_cache(),
            )
            .unwrap();
        assert!(outgoing.is_empty());
    }

    #[test]
    fn test_inactive_edges_not_followed() {
        let service = diamond();
        assert!(
            service
                .deactivate_relationship(&id("a"), &id("d"), RelationshipType::Donation)
                .unwrap()
        );
        let paths = service
            .find_paths(
                &id("a"),
                &id("d"),
                &PathOptions::default().bypassing_cache(),
            )
            .unwrap();
        assert_eq!(paths.len(), 2);
    }

    #[test]
    fn test_validation_errors() {
        let service = diamond();
        let defaults = PathOptions::default();
        assert!(matches!(
            service.find_paths(&id("a"), &id("a"), &defaults),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            service.find_paths(&id(""), &id("a"), &defaults),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            service.find_paths(&id("a"), &id("d"), &defaults.clone().with_max_depth(0)),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            service.find_paths(&id("a"), &id("d"), &defaults.with_max_depth(7)),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            service.analyze_conflict(&id("a"), &id(" "), &PathOptions::default()),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_cache_hit_requires_matching_options() {
        let service = diamond();
        let options = PathOptions::default();

        let first = service
            .find_paths_detailed(&id("a"), &id("d"), &options)
            .unwrap();
        assert!(!first.from_cache);

        let second = service
            .find_paths_detailed(&id("a"), &id("d"), &options)
            .unwrap();
        assert!(second.from_cache);
        assert_eq!(first.paths, second.paths);

        let other_depth = service
            .find_paths_detailed(&id("a"), &id("d"), &options.clone().with_max_depth(2))
            .unwrap();
        assert!(!other_depth.from_cache);

        let bypass = service
            .find_paths_detailed(&id("a"), &id("d"), &options.bypassing_cache())
            .unwrap();
        assert!(!bypass.from_cache);
    }

    #[test]
    fn test_expired_cache_entry_is_recomputed() {
        let config = ConflictGraphConfig {
            search: SearchConfig {
                cache_ttl_secs: 0,
                ..SearchConfig::default()
            },
            ..ConflictGraphConfig::default()
        };
        let backend = Arc::new(InMemoryGraphBackend::new());
        let service = GraphService::with_config(Arc::clone(&backend), &config);
        for key in ["a", "b"] {
            add_entity(&service, key, EntityType::Organization);
        }
        connect(&service, "a", "b", employment());

        let options = PathOptions::default();
        service.find_paths(&id("a"), &id("b"), &options).unwrap();
        let again = service
            .find_paths_detailed(&id("a"), &id("b"), &options)
            .unwrap();
        assert!(!again.from_cache);
        assert_eq!(service.clear_expired_cache().unwrap(), 1);
    }

    #[test]
    fn test_analyze_conflict_employment_is_yellow() {
        let service = service();
        add_entity(&service, "neutral", EntityType::Neutral);
        add_entity(&service, "acme", EntityType::Organization);
        connect(&service, "neutral", "acme", employment());

        let assessment = service
            .analyze_conflict(&id("neutral"), &id("acme"), &PathOptions::default())
            .unwrap();
        assert_eq!(assessment.total_paths, 1);
        assert!((assessment.risk_score - 10.0).abs() < 1e-9);
        assert_eq!(assessment.risk_level, RiskLevel::Yellow);
        assert_eq!(assessment.subject.name, "NEUTRAL");
        assert_eq!(assessment.opposing_party.name, "ACME");
        assert!(!assessment.from_cache);

        let cached = service.backend().get_conflict_path(&id("neutral"), &id("acme")).unwrap();
        assert_eq!(cached.map(|e| e.risk_level), Some(RiskLevel::Yellow));
    }

    #[test]
    fn test_analyze_unknown_entities_is_green() {
        let service = service();
        let assessment = service
            .analyze_conflict(&id("ghost-1"), &id("ghost-2"), &PathOptions::default())
            .unwrap();
        assert_eq!(assessment.total_paths, 0);
        assert_eq!(assessment.risk_level, RiskLevel::Green);
        assert_eq!(assessment.subject.name, "ghost-1");
    }

    #[test]
    fn test_analyze_against_parties() {
        let service = diamond();
        add_entity(&service, "e", EntityType::Organization);
        let result = service
            .analyze_against_parties(&id("a"), &[id("d"), id("e")], &PathOptions::default())
            .unwrap();
        assert_eq!(result.assessments.len(), 2);
        assert_eq!(result.aggregate.total_parties, 2);
        assert_eq!(result.aggregate.highest_party, Some(id("d")));
        assert_eq!(result.aggregate.highest_level, RiskLevel::Red);
        assert_eq!(result.aggregate.flagged_parties, 1);

        assert!(
            service
                .analyze_against_parties(&id("a"), &[id("a")], &PathOptions::default())
                .is_err()
        );
    }

    #[test]
    fn test_upsert_relationship_validation() {
        let service = service();
        add_entity(&service, "a", EntityType::Organization);

        let missing = Relationship::new(id("a"), id("zz"), employment(), DataSource::Manual);
        assert!(matches!(
            service.upsert_relationship(&missing),
            Err(Error::NotFound { kind: "entity", .. })
        ));

        add_entity(&service, "b", EntityType::Organization);
        let mut bad = Relationship::new(id("a"), id("b"), employment(), DataSource::Manual);
        bad.confidence = 1.2;
        assert!(matches!(
            service.upsert_relationship(&bad),
            Err(Error::InvalidInput(_))
        ));
        bad.confidence = f64::NAN;
        assert!(matches!(
            service.upsert_relationship(&bad),
            Err(Error::InvalidInput(_))
        ));

        let self_loop = Relationship::new(id("a"), id("a"), employment(), DataSource::Manual);
        assert!(matches!(
            service.upsert_relationship(&self_loop),
            Err(Error::InvalidInput(_))
        ));

        assert!(matches!(
            service.upsert_entity(&Entity::new(id(""), EntityType::Neutral, "x")),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_symmetric_edges_stored_canonically() {
        let service = service();
        add_entity(&service, "p1", EntityType::Neutral);
        add_entity(&service, "p2", EntityType::Neutral);
        let mut rel = Relationship::new(
            id("p2"),
            id("p1"),
            RelationshipMetadata::CoAuthorship {
                publications: Vec::new(),
            },
            DataSource::Publications,
        );
        rel.source = id("p2");
        rel.target = id("p1");
        service.upsert_relationship(&rel).unwrap();

        let stored = service
            .backend()
            .query_relationships(&RelationshipQuery::new())
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].source, id("p1"));

        assert!(
            service
                .deactivate_relationship(&id("p2"), &id("p1"), RelationshipType::CoAuthorship)
                .unwrap()
        );
    }

    #[test]
    fn test_lobbying_direct_and_indirect() {
        let service = service();
        add_entity(&service, "neutral", EntityType::Neutral);
        add_entity(&service, "firm", EntityType::Organization);
        add_entity(&service, "agency", EntityType::GovernmentAgency);
        connect(&service, "neutral", "firm", employment());
        connect(&service, "firm", "agency", lobbying());
        connect(&service, "neutral", "agency", lobbying());

        let result = service
            .check_lobbying_conflicts(&id("neutral"), &id("agency"))
            .unwrap();
        assert_eq!(result.direct.len(), 1);
        assert_eq!(result.indirect.len(), 1);
        assert_eq!(result.indirect[0].intermediary, Some(id("firm")));
        assert_eq!(result.conflict_score, 70);
        assert_eq!(result.severity, LobbyingSeverity::High);
        assert!(result.has_conflict());
    }

    #[test]
    fn test_lobbying_indirect_only_and_none() {
        let service = service();
        add_entity(&service, "neutral", EntityType::Neutral);
        add_entity(&service, "firm", EntityType::Organization);
        add_entity(&service, "agency", EntityType::GovernmentAgency);
        add_entity(&service, "other", EntityType::Organization);
        connect(&service, "neutral", "firm", employment());
        connect(&service, "agency", "firm", lobbying());

        let result = service
            .check_lobbying_conflicts(&id("neutral"), &id("agency"))
            .unwrap();
        assert!(result.direct.is_empty());
        assert_eq!(result.conflict_score, 20);
        assert_eq!(result.severity, LobbyingSeverity::Low);

        let clean = service
            .check_lobbying_conflicts(&id("neutral"), &id("other"))
            .unwrap();
        assert_eq!(clean.conflict_score, 0);
        assert_eq!(clean.severity, LobbyingSeverity::None);
        assert!(!clean.has_conflict());
    }

    #[test]
    fn test_with_config_clamps_scoring_thresholds() {
        let mut config = ConflictGraphConfig::default();
        config.scoring.green_threshold = f64::NAN;
        config.scoring.red_threshold = 5.0;

        let service = GraphService::with_config(Arc::new(InMemoryGraphBackend::new()), &config);
        let scoring = service.calculator().scoring();
        assert!((scoring.green_threshold - 5.0).abs() < f64::EPSILON);
        assert_eq!(service.calculator().determine_level(4.0), RiskLevel::Green);
        assert_eq!(service.calculator().determine_level(5.0), RiskLevel::Red);
    }

    #[test]
    fn test_lobbying_ignores_employees_of_subject() {
        let service = service();
        add_entity(&service, "employee", EntityType::Neutral);
        add_entity(&service, "acme", EntityType::Organization);
        add_entity(&service, "agency", EntityType::GovernmentAgency);
        connect(&service, "employee", "acme", employment());
        connect(&service, "employee", "agency", lobbying());

        let result = service
            .check_lobbying_conflicts(&id("acme"), &id("agency"))
            .unwrap();
        assert!(result.direct.is_empty());
        assert!(result.indirect.is_empty());
        assert_eq!(result.conflict_score, 0);
        assert_eq!(result.severity, LobbyingSeverity::None);
    }

    #[test]
    fn test_entity_relationships_and_stats() {
        let service = diamond();
        let listed = service
            .get_entity_relationships(&id("a"), &RelationshipListOptions::new())
            .unwrap();
        assert_eq!(listed.len(), 3);
        assert_eq!(
            listed[0].relationship.relationship_type(),
            RelationshipType::Employment
        );
        assert_eq!(listed[0].counterparty.name, "B");
        assert_eq!(listed[2].relationship.relationship_type(), RelationshipType::Donation);

        let incoming = service
            .get_entity_relationships(
                &id("d"),
                &RelationshipListOptions::new().with_direction(EdgeDirection::Incoming),
            )
            .unwrap();
        assert_eq!(incoming.len(), 3);

        let stats = service.get_network_stats(&id("a")).unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.outgoing, 3);
        assert_eq!(stats.incoming, 0);
        assert_eq!(stats.unique_connections, 3);
        assert_eq!(stats.by_type.get(&RelationshipType::Employment), Some(&2));
        assert!((stats.average_confidence - 1.0).abs() < f64::EPSILON);
        assert_eq!(stats.strongest_connections.len(), 3);
    }

    #[test]
    fn test_find_entities() {
        let service = diamond();
        add_entity(&service, "jane", EntityType::Neutral);
        let orgs = service
            .find_entities(EntityType::Organization, &EntityFilter::new())
            .unwrap();
        assert_eq!(orgs.len(), 4);

        let named = service
            .find_entities(EntityType::Neutral, &EntityFilter::new().with_name("jan"))
            .unwrap();
        assert_eq!(named.len(), 1);
        assert_eq!(named[0].id, id("jane"));
    }
}
