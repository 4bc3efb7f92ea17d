//! In-memory graph backend for testing.
//!
//! Provides a fast, non-persistent implementation of [`GraphBackend`] and
//! [`ConflictCacheBackend`] for use in unit tests and tooling.

use crate::models::{
    ConflictPathEntry, Entity, EntityId, EntityQuery, MergeOutcome, Relationship,
    RelationshipQuery, RelationshipType,
};
use crate::storage::traits::{ConflictCacheBackend, GraphBackend, GraphStats};
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::instrument;

type CacheKey = (EntityId, EntityId);

/// In-memory graph backend for testing.
///
/// Uses `RwLock` for thread-safe access with reader-writer semantics.
/// Locks are always taken in the order entities, relationships, cache.
/// Data is not persisted between runs.
///
/// # Example
///
/// ```rust
/// use conflict_graph::storage::{GraphBackend, InMemoryGraphBackend};
/// use conflict_graph::models::{Entity, EntityId, EntityType};
///
/// let backend = InMemoryGraphBackend::new();
/// backend
///     .store_entity(&Entity::new(EntityId::new("acme"), EntityType::Organization, "Acme"))
///     .unwrap();
/// assert_eq!(backend.entity_count(), 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryGraphBackend {
    entities: RwLock<HashMap<EntityId, Entity>>,
    relationships: RwLock<Vec<Relationship>>,
    cache: RwLock<HashMap<CacheKey, ConflictPathEntry>>,
}

fn read<'a, T>(lock: &'a RwLock<T>, operation: &str) -> Result<RwLockReadGuard<'a, T>> {
    lock.read()
        .map_err(|_| Error::operation(operation, "Lock poisoned"))
}

fn write<'a, T>(lock: &'a RwLock<T>, operation: &str) -> Result<RwLockWriteGuard<'a, T>> {
    lock.write()
        .map_err(|_| Error::operation(operation, "Lock poisoned"))
}

impl InMemoryGraphBackend {
    /// Creates a new empty in-memory graph backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of entities stored.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.read().map(|e| e.len()).unwrap_or(0)
    }

    /// Returns the number of relationships stored, active or not.
    #[must_use]
    pub fn relationship_count(&self) -> usize {
        self.relationships.read().map(|r| r.len()).unwrap_or(0)
    }
}

/// Re-points every edge touching `merge` at `keep` inside one relationship list.
///
/// Edges between the pair are dropped first so no self-loop can appear.
/// An active edge whose re-pointed tuple already has an active edge is
/// deactivated instead of duplicated.
fn repoint_relationships(
    rels: &mut Vec<Relationship>,
    keep: &EntityId,
    merge: &EntityId,
) -> MergeOutcome {
    let before = rels.len();
    rels.retain(|r| !(r.involves(keep) && r.involves(merge)));
    let mut outcome = MergeOutcome {
        removed: before - rels.len(),
        ..MergeOutcome::default()
    };

    for i in 0..rels.len() {
        if !rels[i].involves(merge) {
            continue;
        }
        let mut candidate = rels[i].clone();
        if &candidate.source == merge {
            candidate.source = keep.clone();
        }
        if &candidate.target == merge {
            candidate.target = keep.clone();
        }
        candidate.canonicalize();

        if candidate.is_active
            && rels
                .iter()
                .enumerate()
                .any(|(j, r)| j != i && r.is_active && r.same_tuple(&candidate))
        {
            candidate.is_active = false;
            outcome.deactivated += 1;
        }
        rels[i] = candidate;
        outcome.repointed += 1;
    }

    outcome
}

impl GraphBackend for InMemoryGraphBackend {
    fn store_entity(&self, entity: &Entity) -> Result<()> {
        let mut entities = write(&self.entities, "store_entity")?;
        entities.insert(entity.id.clone(), entity.clone());
        Ok(())
    }

    fn get_entity(&self, id: &EntityId) -> Result<Option<Entity>> {
        let entities = read(&self.entities, "get_entity")?;
        Ok(entities.get(id).cloned())
    }

    fn query_entities(&self, query: &EntityQuery) -> Result<Vec<Entity>> {
        let entities = read(&self.entities, "query_entities")?;

        let limit = query.limit.unwrap_or(EntityQuery::DEFAULT_LIMIT);
        let offset = query.offset.unwrap_or(0);

        let mut results: Vec<Entity> = entities
            .values()
            .filter(|e| query.matches(e))
            .cloned()
            .collect();

        results.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));

        Ok(results.into_iter().skip(offset).take(limit).collect())
    }

    fn delete_entity(&self, id: &EntityId) -> Result<bool> {
        let mut entities = write(&self.entities, "delete_entity")?;
        let mut rels = write(&self.relationships, "delete_entity")?;

        let existed = entities.remove(id).is_some();
        if existed {
            rels.retain(|r| !r.involves(id));
        }
        Ok(existed)
    }

    fn store_relationship(&self, relationship: &Relationship) -> Result<()> {
        let mut rels = write(&self.relationships, "store_relationship")?;

        let mut incoming = relationship.clone();
        incoming.canonicalize();

        // An inactive record matches a stored historical edge with identical metadata.
        let slot = rels
            .iter()
            .position(|r| r.is_active && r.same_tuple(&incoming))
            .or_else(|| {
                rels.iter().position(|r| {
                    !incoming.is_active
                        && !r.is_active
                        && r.same_tuple(&incoming)
                        && r.metadata == incoming.metadata
                })
            });

        match slot {
            Some(index) => rels[index] = incoming,
            None => rels.push(incoming),
        }
        Ok(())
    }

    fn query_relationships(&self, query: &RelationshipQuery) -> Result<Vec<Relationship>> {
        let rels = read(&self.relationships, "query_relationships")?;

        let matching = rels.iter().filter(|r| query.matches(r)).cloned();
        Ok(match query.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        })
    }

    fn deactivate_relationship(
        &self,
        source: &EntityId,
        target: &EntityId,
        relationship_type: RelationshipType,
    ) -> Result<bool> {
        let mut rels = write(&self.relationships, "deactivate_relationship")?;

        let (source, target) = if relationship_type.is_symmetric() && target < source {
            (target, source)
        } else {
            (source, target)
        };

        let found = rels.iter_mut().find(|r| {
            r.is_active
                && &r.source == source
                && &r.target == target
                && r.relationship_type() == relationship_type
        });
        if let Some(rel) = found {
            rel.is_active = false;
            return Ok(true);
        }
        Ok(false)
    }

    #[instrument(skip(self), fields(keep = %keep, merge = %merge))]
    fn merge_entity_into(&self, keep: &EntityId, merge: &EntityId) -> Result<MergeOutcome> {
        let mut entities = write(&self.entities, "merge_entity_into")?;
        let mut rels = write(&self.relationships, "merge_entity_into")?;

        let mut kept = entities.get(keep).cloned().ok_or_else(|| Error::NotFound {
            kind: "entity",
            id: keep.to_string(),
        })?;
        let merged = entities.get(merge).cloned().ok_or_else(|| Error::NotFound {
            kind: "entity",
            id: merge.to_string(),
        })?;

        let mut outcome = repoint_relationships(&mut rels, keep, merge);
        for name in merged.all_names() {
            if kept.add_alias(name) {
                outcome.aliases_added += 1;
            }
        }
        kept.last_updated = crate::current_timestamp();

        entities.remove(merge);
        entities.insert(keep.clone(), kept);

        metrics::counter!("graph_entities_merged_total").increment(1);
        Ok(outcome)
    }

    fn get_stats(&self) -> Result<GraphStats> {
        let entities = read(&self.entities, "get_stats")?;
        let rels = read(&self.relationships, "get_stats")?;

        let mut stats = GraphStats {
            entity_count: entities.len(),
            relationship_count: rels.len(),
            ..GraphStats::default()
        };
        for entity in entities.values() {
            *stats.entities_by_type.entry(entity.entity_type).or_insert(0) += 1;
        }
        for rel in rels.iter().filter(|r| r.is_active) {
            stats.active_relationship_count += 1;
            *stats
                .relationships_by_type
                .entry(rel.relationship_type())
                .or_insert(0) += 1;
        }
        Ok(stats)
    }

    fn clear(&self) -> Result<()> {
        write(&self.entities, "clear")?.clear();
        write(&self.relationships, "clear")?.clear();
        write(&self.cache, "clear")?.clear();
        Ok(())
    }
}

impl ConflictCacheBackend for InMemoryGraphBackend {
    fn get_conflict_path(
        &self,
        subject: &EntityId,
        opposing: &EntityId,
    ) -> Result<Option<ConflictPathEntry>> {
        let cache = read(&self.cache, "get_conflict_path")?;
        Ok(cache.get(&(subject.clone(), opposing.clone())).cloned())
    }

    fn upsert_conflict_path(&self, entry: &ConflictPathEntry) -> Result<()> {
        let mut cache = write(&self.cache, "upsert_conflict_path")?;
        cache.insert(
            (entry.subject_id.clone(), entry.opposing_id.clone()),
            entry.clone(),
        );
        Ok(())
    }

    fn purge_expired_conflict_paths(&self, now: i64) -> Result<usize> {
        let mut cache = write(&self.cache, "purge_expired_conflict_paths")?;
        let before = cache.len();
        cache.retain(|_, entry| entry.is_valid_at(now));
        Ok(before - cache.len())
    }

    fn count_expired_conflict_paths(&self, now: i64) -> Result<usize> {
        let cache = read(&self.cache, "count_expired_conflict_paths")?;
        Ok(cache.values().filter(|e| !e.is_valid_at(now)).count())
    }

    fn conflict_path_count(&self) -> Result<usize> {
        Ok(read(&self.cache, "conflict_path_count")?.len())
    }
}
