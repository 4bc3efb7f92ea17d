//! `SQLite` graph backend for the conflict graph.
//!
//! Stores entities, relationships and the conflict-path cache in a single
//! database file. Relationship payloads and aliases are stored as JSON.

// SQLite returns i64 for counts and depths; they are non-negative and small.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
// Closures are needed to adapt rusqlite's Error type.
#![allow(clippy::redundant_closure_for_method_calls)]

use crate::models::{
    ConflictPathEntry, DataSource, Direction, Entity, EntityId, EntityQuery, EntityType,
    MergeOutcome, Relationship, RelationshipMetadata, RelationshipQuery, RelationshipType,
    RiskLevel,
};
use crate::storage::traits::{ConflictCacheBackend, GraphBackend, GraphStats};
use crate::{Error, Result};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::instrument;

const ENTITY_COLUMNS: &str = "id, entity_type, name, aliases, metadata, data_source, last_updated";

const RELATIONSHIP_COLUMNS: &str = "source_id, target_id, metadata, weight, confidence, \
     data_source, is_active, last_verified";

const CACHE_COLUMNS: &str = "subject_id, opposing_id, paths, max_depth, relationship_types, \
     direction, risk_score, risk_level, recommendation, created_at, expires_at";

/// Helper to acquire mutex lock with poison recovery.
fn acquire_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("Graph SQLite mutex was poisoned, recovering");
            metrics::counter!("graph_sqlite_mutex_poison_recovery_total").increment(1);
            poisoned.into_inner()
        },
    }
}

/// Wraps a decoding failure for a text column as a rusqlite error.
fn conversion_error(
    column: usize,
    cause: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, cause.into())
}

fn to_json<T: serde::Serialize>(value: &T, operation: &str) -> Result<String> {
    serde_json::to_string(value).map_err(|e| Error::operation(operation, e))
}

/// `SQLite`-based graph backend.
///
/// # Concurrency Model
///
/// Uses a `Mutex<Connection>` for thread-safe access. WAL mode and `busy_timeout`
/// handle concurrent access from other processes.
///
/// # Schema
///
/// - `graph_entities`: entity nodes
/// - `graph_relationships`: directed edges; a partial unique index keeps one
///   active edge per `(source_id, target_id, relationship_type)`
/// - `conflict_paths`: cached search results keyed by party pair
pub struct SqliteGraphBackend {
    /// Connection to the `SQLite` database.
    conn: Mutex<Connection>,
    /// Path to the database (None for in-memory).
    db_path: Option<PathBuf>,
}

impl SqliteGraphBackend {
    /// Opens (or creates) a graph database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::operation("create_graph_data_dir", e))?;
        }
        let conn =
            Connection::open(&db_path).map_err(|e| Error::operation("open_graph_sqlite", e))?;

        let backend = Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
        };

        backend.initialize()?;
        Ok(backend)
    }

    /// Creates an in-memory `SQLite` graph backend (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::operation("open_graph_sqlite_memory", e))?;

        let backend = Self {
            conn: Mutex::new(conn),
            db_path: None,
        };

        backend.initialize()?;
        Ok(backend)
    }

    /// Returns the database path.
    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Initializes the database schema.
    fn initialize(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);

        // Enable WAL mode for better concurrent read performance
        let _ = conn.pragma_update(None, "journal_mode", "WAL");
        let _ = conn.pragma_update(None, "synchronous", "NORMAL");
        let _ = conn.pragma_update(None, "busy_timeout", "5000");

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS graph_entities (
                id TEXT PRIMARY KEY,
                entity_type TEXT NOT NULL,
                name TEXT NOT NULL,
                aliases TEXT NOT NULL DEFAULT '[]',
                metadata TEXT NOT NULL DEFAULT '{}',
                data_source TEXT NOT NULL,
                last_updated INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS graph_relationships (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_id TEXT NOT NULL,
                target_id TEXT NOT NULL,
                relationship_type TEXT NOT NULL,
                metadata TEXT NOT NULL,
                weight INTEGER NOT NULL,
                confidence REAL NOT NULL DEFAULT 1.0,
                data_source TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                last_verified INTEGER NOT NULL
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_graph_relationships_active_tuple
                ON graph_relationships(source_id, target_id, relationship_type)
                WHERE is_active = 1;
            CREATE TABLE IF NOT EXISTS conflict_paths (
                subject_id TEXT NOT NULL,
                opposing_id TEXT NOT NULL,
                paths TEXT NOT NULL,
                max_depth INTEGER NOT NULL,
                relationship_types TEXT,
                direction TEXT NOT NULL,
                risk_score REAL NOT NULL,
                risk_level TEXT NOT NULL,
                recommendation TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                PRIMARY KEY (subject_id, opposing_id)
            );",
        )
        .map_err(|e| Error::operation("create_graph_schema", e))?;

        Self::create_indexes(&conn);

        Ok(())
    }

    /// Creates secondary indexes for optimized queries.
    fn create_indexes(conn: &Connection) {
        let _ = conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_graph_entities_type ON graph_entities(entity_type)",
            [],
        );
        let _ = conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_graph_entities_name ON graph_entities(name)",
            [],
        );
        let _ = conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_graph_relationships_source ON graph_relationships(source_id)",
            [],
        );
        let _ = conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_graph_relationships_target ON graph_relationships(target_id)",
            [],
        );
        let _ = conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_graph_relationships_type ON graph_relationships(relationship_type)",
            [],
        );
        let _ = conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_conflict_paths_expires ON conflict_paths(expires_at)",
            [],
        );
    }

    /// Parses an entity from a row selected with [`ENTITY_COLUMNS`].
    fn parse_entity_row(row: &Row<'_>) -> rusqlite::Result<Entity> {
        let id: String = row.get(0)?;
        let entity_type_str: String = row.get(1)?;
        let name: String = row.get(2)?;
        let aliases_json: String = row.get(3)?;
        let metadata_json: String = row.get(4)?;
        let data_source_str: String = row.get(5)?;
        let last_updated: i64 = row.get(6)?;

        let entity_type = EntityType::parse(&entity_type_str)
            .ok_or_else(|| conversion_error(1, format!("unknown entity type: {entity_type_str}")))?;
        let data_source = DataSource::parse(&data_source_str)
            .ok_or_else(|| conversion_error(5, format!("unknown data source: {data_source_str}")))?;
        let aliases = serde_json::from_str(&aliases_json).map_err(|e| conversion_error(3, e))?;
        let metadata = serde_json::from_str(&metadata_json).map_err(|e| conversion_error(4, e))?;

        Ok(Entity {
            id: EntityId::new(id),
            entity_type,
            name,
            aliases,
            metadata,
            data_source,
            last_updated,
        })
    }

    /// Parses a relationship from a row selected with [`RELATIONSHIP_COLUMNS`].
    fn parse_relationship_row(row: &Row<'_>) -> rusqlite::Result<Relationship> {
        let source: String = row.get(0)?;
        let target: String = row.get(1)?;
        let metadata_json: String = row.get(2)?;
        let weight: i32 = row.get(3)?;
        let confidence: f64 = row.get(4)?;
        let data_source_str: String = row.get(5)?;
        let is_active: bool = row.get(6)?;
        let last_verified: i64 = row.get(7)?;

        let metadata: RelationshipMetadata =
            serde_json::from_str(&metadata_json).map_err(|e| conversion_error(2, e))?;
        let data_source = DataSource::parse(&data_source_str)
            .ok_or_else(|| conversion_error(5, format!("unknown data source: {data_source_str}")))?;

        Ok(Relationship {
            source: EntityId::new(source),
            target: EntityId::new(target),
            metadata,
            weight,
            confidence,
            data_source,
            is_active,
            last_verified,
        })
    }

    /// Parses a cache entry from a row selected with [`CACHE_COLUMNS`].
    fn parse_cache_row(row: &Row<'_>) -> rusqlite::Result<ConflictPathEntry> {
        let subject_id: String = row.get(0)?;
        let opposing_id: String = row.get(1)?;
        let paths_json: String = row.get(2)?;
        let max_depth: i64 = row.get(3)?;
        let types_json: Option<String> = row.get(4)?;
        let direction_json: String = row.get(5)?;
        let risk_score: f64 = row.get(6)?;
        let risk_level_str: String = row.get(7)?;
        let recommendation: String = row.get(8)?;
        let created_at: i64 = row.get(9)?;
        let expires_at: i64 = row.get(10)?;

        let paths = serde_json::from_str(&paths_json).map_err(|e| conversion_error(2, e))?;
        let relationship_types = types_json
            .map(|json| serde_json::from_str::<Vec<RelationshipType>>(&json))
            .transpose()
            .map_err(|e| conversion_error(4, e))?;
        let direction: Direction =
            serde_json::from_str(&direction_json).map_err(|e| conversion_error(5, e))?;
        let risk_level = RiskLevel::parse(&risk_level_str)
            .ok_or_else(|| conversion_error(7, format!("unknown risk level: {risk_level_str}")))?;

        Ok(ConflictPathEntry {
            subject_id: EntityId::new(subject_id),
            opposing_id: EntityId::new(opposing_id),
            paths,
            max_depth: max_depth as usize,
            relationship_types,
            direction,
            risk_score,
            risk_level,
            recommendation,
            created_at,
            expires_at,
        })
    }

    fn load_entity(conn: &Connection, id: &EntityId, operation: &str) -> Result<Option<Entity>> {
        conn.query_row(
            &format!("SELECT {ENTITY_COLUMNS} FROM graph_entities WHERE id = ?1"),
            params![id.as_str()],
            Self::parse_entity_row,
        )
        .optional()
        .map_err(|e| Error::operation(operation, e))
    }

    fn write_entity(conn: &Connection, entity: &Entity, operation: &str) -> Result<()> {
        let aliases_json = to_json(&entity.aliases, operation)?;
        let metadata_json = to_json(&entity.metadata, operation)?;

        conn.execute(
            "INSERT INTO graph_entities (
                id, entity_type, name, aliases, metadata, data_source, last_updated
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                entity_type = excluded.entity_type,
                name = excluded.name,
                aliases = excluded.aliases,
                metadata = excluded.metadata,
                data_source = excluded.data_source,
                last_updated = excluded.last_updated",
            params![
                entity.id.as_str(),
                entity.entity_type.as_str(),
                entity.name,
                aliases_json,
                metadata_json,
                entity.data_source.as_str(),
                entity.last_updated,
            ],
        )
        .map_err(|e| Error::operation(operation, e))?;
        Ok(())
    }

    /// Returns the row id of the active edge for a tuple, excluding `exclude`.
    fn find_active_tuple(
        tx: &Transaction<'_>,
        source: &EntityId,
        target: &EntityId,
        relationship_type: RelationshipType,
        exclude: Option<i64>,
        operation: &str,
    ) -> Result<Option<i64>> {
        tx.query_row(
            "SELECT id FROM graph_relationships
             WHERE source_id = ?1 AND target_id = ?2 AND relationship_type = ?3
               AND is_active = 1 AND id != ?4",
            params![
                source.as_str(),
                target.as_str(),
                relationship_type.as_str(),
                exclude.unwrap_or(-1),
            ],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| Error::operation(operation, e))
    }

    /// Finds a stored inactive edge recording the same fact.
    fn find_inactive_fact(
        tx: &Transaction<'_>,
        rel: &Relationship,
        metadata_json: &str,
    ) -> Result<Option<i64>> {
        tx.query_row(
            "SELECT id FROM graph_relationships
             WHERE source_id = ?1 AND target_id = ?2 AND relationship_type = ?3
               AND is_active = 0 AND metadata = ?4
             ORDER BY id LIMIT 1",
            params![
                rel.source.as_str(),
                rel.target.as_str(),
                rel.relationship_type().as_str(),
                metadata_json,
            ],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| Error::operation("store_relationship_lookup_inactive", e))
    }
}

impl GraphBackend for SqliteGraphBackend {
    // ========================================================================
    // Entity Operations
    // ========================================================================

    #[instrument(skip(self, entity), fields(entity_id = %entity.id))]
    fn store_entity(&self, entity: &Entity) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        Self::write_entity(&conn, entity, "store_entity")?;
        metrics::counter!("graph_entities_stored_total").increment(1);
        Ok(())
    }

    #[instrument(skip(self), fields(entity_id = %id))]
    fn get_entity(&self, id: &EntityId) -> Result<Option<Entity>> {
        let conn = acquire_lock(&self.conn);
        Self::load_entity(&conn, id, "get_entity")
    }

    #[instrument(skip(self, query))]
    fn query_entities(&self, query: &EntityQuery) -> Result<Vec<Entity>> {
        let conn = acquire_lock(&self.conn);

        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(entity_type) = query.entity_type {
            conditions.push(format!("entity_type = ?{}", params.len() + 1));
            params.push(Box::new(entity_type.as_str().to_string()));
        }
        if let Some(data_source) = query.data_source {
            conditions.push(format!("data_source = ?{}", params.len() + 1));
            params.push(Box::new(data_source.as_str().to_string()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        let sql =
            format!("SELECT {ENTITY_COLUMNS} FROM graph_entities {where_clause} ORDER BY name, id");

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| Error::operation("query_entities_prepare", e))?;
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), Self::parse_entity_row)
            .map_err(|e| Error::operation("query_entities", e))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::operation("query_entities", e))?;

        // Name and metadata filters need alias/JSON semantics shared with the in-memory store.
        Ok(rows
            .into_iter()
            .filter(|e| query.matches(e))
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(EntityQuery::DEFAULT_LIMIT))
            .collect())
    }

    #[instrument(skip(self), fields(entity_id = %id))]
    fn delete_entity(&self, id: &EntityId) -> Result<bool> {
        let mut conn = acquire_lock(&self.conn);
        let tx = conn
            .transaction()
            .map_err(|e| Error::operation("delete_entity", e))?;

        tx.execute(
            "DELETE FROM graph_relationships WHERE source_id = ?1 OR target_id = ?1",
            params![id.as_str()],
        )
        .map_err(|e| Error::operation("delete_entity_relationships", e))?;
        let rows = tx
            .execute(
                "DELETE FROM graph_entities WHERE id = ?1",
                params![id.as_str()],
            )
            .map_err(|e| Error::operation("delete_entity", e))?;

        tx.commit()
            .map_err(|e| Error::operation("delete_entity_commit", e))?;

        if rows > 0 {
            metrics::counter!("graph_entities_deleted_total").increment(1);
        }
        Ok(rows > 0)
    }

    // ========================================================================
    // Relationship Operations
    // ========================================================================

    #[instrument(skip(self, relationship), fields(
        source = %relationship.source,
        target = %relationship.target,
        relationship_type = %relationship.relationship_type()
    ))]
    fn store_relationship(&self, relationship: &Relationship) -> Result<()> {
        let mut rel = relationship.clone();
        rel.canonicalize();
        let metadata_json = to_json(&rel.metadata, "store_relationship")?;
        let relationship_type = rel.relationship_type();

        let mut conn = acquire_lock(&self.conn);
        let tx = conn
            .transaction()
            .map_err(|e| Error::operation("store_relationship", e))?;

        let existing = match Self::find_active_tuple(
            &tx,
            &rel.source,
            &rel.target,
            relationship_type,
            None,
            "store_relationship_lookup",
        )? {
            Some(row_id) => Some(row_id),
            None if !rel.is_active => Self::find_inactive_fact(&tx, &rel, &metadata_json)?,
            None => None,
        };

        match existing {
            Some(row_id) => {
                tx.execute(
                    "UPDATE graph_relationships SET
                        metadata = ?1, weight = ?2, confidence = ?3, data_source = ?4,
                        is_active = ?5, last_verified = ?6
                     WHERE id = ?7",
                    params![
                        metadata_json,
                        rel.weight,
                        rel.confidence,
                        rel.data_source.as_str(),
                        rel.is_active,
                        rel.last_verified,
                        row_id,
                    ],
                )
                .map_err(|e| Error::operation("store_relationship_update", e))?;
            },
            None => {
                tx.execute(
                    "INSERT INTO graph_relationships (
                        source_id, target_id, relationship_type, metadata, weight,
                        confidence, data_source, is_active, last_verified
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        rel.source.as_str(),
                        rel.target.as_str(),
                        relationship_type.as_str(),
                        metadata_json,
                        rel.weight,
                        rel.confidence,
                        rel.data_source.as_str(),
                        rel.is_active,
                        rel.last_verified,
                    ],
                )
                .map_err(|e| Error::operation("store_relationship_insert", e))?;
            },
        }

        tx.commit()
            .map_err(|e| Error::operation("store_relationship_commit", e))?;

        metrics::counter!("graph_relationships_stored_total").increment(1);
        Ok(())
    }

    #[instrument(skip(self, query))]
    fn query_relationships(&self, query: &RelationshipQuery) -> Result<Vec<Relationship>> {
        let conn = acquire_lock(&self.conn);

        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref source) = query.source {
            conditions.push(format!("source_id = ?{}", params.len() + 1));
            params.push(Box::new(source.as_str().to_string()));
        }
        if let Some(ref target) = query.target {
            conditions.push(format!("target_id = ?{}", params.len() + 1));
            params.push(Box::new(target.as_str().to_string()));
        }
        if let Some(ref involving) = query.involving {
            let idx = params.len() + 1;
            conditions.push(format!("(source_id = ?{idx} OR target_id = ?{idx})"));
            params.push(Box::new(involving.as_str().to_string()));
        }
        if !query.relationship_types.is_empty() {
            let placeholders: Vec<String> = query
                .relationship_types
                .iter()
                .map(|t| {
                    params.push(Box::new(t.as_str().to_string()));
                    format!("?{}", params.len())
                })
                .collect();
            conditions.push(format!(
                "relationship_type IN ({})",
                placeholders.join(", ")
            ));
        }
        if query.active_only {
            conditions.push("is_active = 1".to_string());
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        let limit_clause = query
            .limit
            .map_or_else(String::new, |limit| format!("LIMIT {limit}"));
        let sql = format!(
            "SELECT {RELATIONSHIP_COLUMNS} FROM graph_relationships {where_clause} ORDER BY id {limit_clause}"
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| Error::operation("query_relationships_prepare", e))?;
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let relationships = stmt
            .query_map(param_refs.as_slice(), Self::parse_relationship_row)
            .map_err(|e| Error::operation("query_relationships", e))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::operation("query_relationships", e))?;

        Ok(relationships)
    }

    #[instrument(skip(self))]
    fn deactivate_relationship(
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

        let conn = acquire_lock(&self.conn);
        let rows = conn
            .execute(
                "UPDATE graph_relationships SET is_active = 0
                 WHERE source_id = ?1 AND target_id = ?2 AND relationship_type = ?3
                   AND is_active = 1",
                params![source.as_str(), target.as_str(), relationship_type.as_str()],
            )
            .map_err(|e| Error::operation("deactivate_relationship", e))?;
        Ok(rows > 0)
    }

    #[instrument(skip(self), fields(keep = %keep, merge = %merge))]
    fn merge_entity_into(&self, keep: &EntityId, merge: &EntityId) -> Result<MergeOutcome> {
        let mut conn = acquire_lock(&self.conn);
        let tx = conn
            .transaction()
            .map_err(|e| Error::operation("merge_entity_into", e))?;

        let mut kept = Self::load_entity(&tx, keep, "merge_entity_into")?.ok_or_else(|| {
            Error::NotFound {
                kind: "entity",
                id: keep.to_string(),
            }
        })?;
        let merged = Self::load_entity(&tx, merge, "merge_entity_into")?.ok_or_else(|| {
            Error::NotFound {
                kind: "entity",
                id: merge.to_string(),
            }
        })?;

        let removed = tx
            .execute(
                "DELETE FROM graph_relationships
                 WHERE (source_id = ?1 AND target_id = ?2) OR (source_id = ?2 AND target_id = ?1)",
                params![keep.as_str(), merge.as_str()],
            )
            .map_err(|e| Error::operation("merge_remove_between", e))?;
        let mut outcome = MergeOutcome {
            removed,
            ..MergeOutcome::default()
        };

        let affected: Vec<(i64, Relationship)> = {
            let mut stmt = tx
                .prepare(&format!(
                    "SELECT {RELATIONSHIP_COLUMNS}, id FROM graph_relationships
                     WHERE source_id = ?1 OR target_id = ?1 ORDER BY id"
                ))
                .map_err(|e| Error::operation("merge_load_edges", e))?;
            stmt.query_map(params![merge.as_str()], |row| {
                Ok((row.get(8)?, Self::parse_relationship_row(row)?))
            })
            .map_err(|e| Error::operation("merge_load_edges", e))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::operation("merge_load_edges", e))?
        };

        for (row_id, mut rel) in affected {
            if &rel.source == merge {
                rel.source = keep.clone();
            }
            if &rel.target == merge {
                rel.target = keep.clone();
            }
            rel.canonicalize();

            let mut is_active = rel.is_active;
            if is_active
                && Self::find_active_tuple(
                    &tx,
                    &rel.source,
                    &rel.target,
                    rel.relationship_type(),
                    Some(row_id),
                    "merge_collision_check",
                )?
                .is_some()
            {
                is_active = false;
                outcome.deactivated += 1;
            }

            tx.execute(
                "UPDATE graph_relationships SET source_id = ?1, target_id = ?2, is_active = ?3
                 WHERE id = ?4",
                params![rel.source.as_str(), rel.target.as_str(), is_active, row_id],
            )
            .map_err(|e| Error::operation("merge_repoint", e))?;
            outcome.repointed += 1;
        }

        for name in merged.all_names() {
            if kept.add_alias(name) {
                outcome.aliases_added += 1;
            }
        }
        kept.last_updated = crate::current_timestamp();
        Self::write_entity(&tx, &kept, "merge_update_kept")?;

        tx.execute(
            "DELETE FROM graph_entities WHERE id = ?1",
            params![merge.as_str()],
        )
        .map_err(|e| Error::operation("merge_delete_entity", e))?;

        tx.commit()
            .map_err(|e| Error::operation("merge_entity_into_commit", e))?;

        metrics::counter!("graph_entities_merged_total").increment(1);
        Ok(outcome)
    }

    // ========================================================================
    // Utility Operations
    // ========================================================================

    #[instrument(skip(self))]
    fn get_stats(&self) -> Result<GraphStats> {
        let conn = acquire_lock(&self.conn);
        let mut stats = GraphStats::default();

        let grouped = |sql: &str, operation: &str| -> Result<Vec<(String, i64)>> {
            let mut stmt = conn
                .prepare(sql)
                .map_err(|e| Error::operation(operation, e))?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
                .map_err(|e| Error::operation(operation, e))?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| Error::operation(operation, e))?;
            Ok(rows)
        };

        for (type_str, count) in grouped(
            "SELECT entity_type, COUNT(*) FROM graph_entities GROUP BY entity_type",
            "get_stats_entities",
        )? {
            if let Some(entity_type) = EntityType::parse(&type_str) {
                stats.entities_by_type.insert(entity_type, count as usize);
            }
            stats.entity_count += count as usize;
        }

        for (type_str, count) in grouped(
            "SELECT relationship_type, COUNT(*) FROM graph_relationships
             WHERE is_active = 1 GROUP BY relationship_type",
            "get_stats_relationships",
        )? {
            if let Some(rel_type) = RelationshipType::parse(&type_str) {
                stats.relationships_by_type.insert(rel_type, count as usize);
            }
            stats.active_relationship_count += count as usize;
        }

        let total: i64 = conn
            .query_row("SELECT COUNT(*) FROM graph_relationships", [], |row| {
                row.get(0)
            })
            .map_err(|e| Error::operation("get_stats_total", e))?;
        stats.relationship_count = total as usize;

        Ok(stats)
    }

    #[instrument(skip(self))]
    fn clear(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        conn.execute_batch(
            "DELETE FROM graph_relationships;
             DELETE FROM graph_entities;
             DELETE FROM conflict_paths;",
        )
        .map_err(|e| Error::operation("clear_graph", e))?;
        Ok(())
    }
}

impl ConflictCacheBackend for SqliteGraphBackend {
    #[instrument(skip(self), fields(subject = %subject, opposing = %opposing))]
    fn get_conflict_path(
        &self,
        subject: &EntityId,
        opposing: &EntityId,
    ) -> Result<Option<ConflictPathEntry>> {
        let conn = acquire_lock(&self.conn);
        conn.query_row(
            &format!(
                "SELECT {CACHE_COLUMNS} FROM conflict_paths WHERE subject_id = ?1 AND opposing_id = ?2"
            ),
            params![subject.as_str(), opposing.as_str()],
            Self::parse_cache_row,
        )
        .optional()
        .map_err(|e| Error::operation("get_conflict_path", e))
    }

    #[instrument(skip(self, entry), fields(subject = %entry.subject_id, opposing = %entry.opposing_id))]
    fn upsert_conflict_path(&self, entry: &ConflictPathEntry) -> Result<()> {
        let paths_json = to_json(&entry.paths, "upsert_conflict_path")?;
        let types_json = entry
            .relationship_types
            .as_ref()
            .map(|types| to_json(types, "upsert_conflict_path"))
            .transpose()?;
        let direction_json = to_json(&entry.direction, "upsert_conflict_path")?;

        let conn = acquire_lock(&self.conn);
        conn.execute(
            &format!(
                "INSERT INTO conflict_paths ({CACHE_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 ON CONFLICT(subject_id, opposing_id) DO UPDATE SET
                    paths = excluded.paths,
                    max_depth = excluded.max_depth,
                    relationship_types = excluded.relationship_types,
                    direction = excluded.direction,
                    risk_score = excluded.risk_score,
                    risk_level = excluded.risk_level,
                    recommendation = excluded.recommendation,
                    created_at = excluded.created_at,
                    expires_at = excluded.expires_at"
            ),
            params![
                entry.subject_id.as_str(),
                entry.opposing_id.as_str(),
                paths_json,
                entry.max_depth as i64,
                types_json,
                direction_json,
                entry.risk_score,
                entry.risk_level.as_str(),
                entry.recommendation,
                entry.created_at,
                entry.expires_at,
            ],
        )
        .map_err(|e| Error::operation("upsert_conflict_path", e))?;
        Ok(())
    }

    #[instrument(skip(self))]
    fn purge_expired_conflict_paths(&self, now: i64) -> Result<usize> {
        let conn = acquire_lock(&self.conn);
        conn.execute(
            "DELETE FROM conflict_paths WHERE expires_at <= ?1",
            params![now],
        )
        .map_err(|e| Error::operation("purge_expired_conflict_paths", e))
    }

    fn count_expired_conflict_paths(&self, now: i64) -> Result<usize> {
        let conn = acquire_lock(&self.conn);
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM conflict_paths WHERE expires_at <= ?1",
                params![now],
                |row| row.get(0),
            )
            .map_err(|e| Error::operation("count_expired_conflict_paths", e))?;
        Ok(count as usize)
    }

    fn conflict_path_count(&self) -> Result<usize> {
        let conn = acquire_lock(&self.conn);
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM conflict_paths", [], |row| row.get(0))
            .map_err(|e| Error::operation("conflict_path_count", e))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn backend() -> SqliteGraphBackend {
        SqliteGraphBackend::in_memory().unwrap()
    }

    fn employment(source: &str, target: &str) -> Relationship {
        Relationship::new(
            EntityId::new(source),
            EntityId::new(target),
            RelationshipMetadata::employment(
                Some("Partner".to_string()),
                NaiveDate::from_ymd_opt(2015, 1, 1),
                None,
            ),
            DataSource::ProfessionalNetwork,
        )
    }

    #[test]
    fn test_entity_round_trip_with_metadata() {
        let backend = backend();
        let entity = Entity::new(EntityId::new("acme"), EntityType::Organization, "Acme Corp")
            .with_alias("ACME")
            .with_metadata("industry", "defense")
            .with_data_source(DataSource::LobbyingDisclosure);
        backend.store_entity(&entity).unwrap();

        let loaded = backend.get_entity(&entity.id).unwrap().unwrap();
        assert_eq!(loaded, entity);
        assert!(backend.get_entity(&EntityId::new("missing")).unwrap().is_none());
    }

    #[test]
    fn test_query_entities_filters_and_orders() {
        let backend = backend();
        for (id, name, industry) in [
            ("o2", "Zenith Energy", "energy"),
            ("o1", "Acme Energy", "energy"),
            ("o3", "Beta Defense", "defense"),
        ] {
            backend
                .store_entity(
                    &Entity::new(EntityId::new(id), EntityType::Organization, name)
                        .with_metadata("industry", industry),
                )
                .unwrap();
        }

        let found = backend
            .query_entities(&EntityQuery::new().with_metadata("industry", "energy"))
            .unwrap();
        let names: Vec<&str> = found.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Acme Energy", "Zenith Energy"]);

        let paged = backend
            .query_entities(&EntityQuery::new().with_offset(1).with_limit(1))
            .unwrap();
        assert_eq!(paged[0].name, "Beta Defense");
    }

    #[test]
    fn test_relationship_upsert_single_active_row() {
        let backend = backend();
        backend.store_relationship(&employment("n1", "acme")).unwrap();
        backend
            .store_relationship(&employment("n1", "acme").with_confidence(0.6))
            .unwrap();

        let rels = backend
            .query_relationships(&RelationshipQuery::new().include_inactive())
            .unwrap();
        assert_eq!(rels.len(), 1);
        assert!((rels[0].confidence - 0.6).abs() < f64::EPSILON);
        assert_eq!(rels[0].metadata, employment("n1", "acme").metadata);
    }

    #[test]
    fn test_inactive_relationship_reingestion_updates_in_place() {
        let backend = backend();
        let historical = employment("n1", "acme").inactive();
        backend.store_relationship(&historical).unwrap();
        backend
            .store_relationship(&historical.clone().with_confidence(0.3))
            .unwrap();

        let rels = backend
            .query_relationships(&RelationshipQuery::new().include_inactive())
            .unwrap();
        assert_eq!(rels.len(), 1);
        assert!(!rels[0].is_active);
        assert!((rels[0].confidence - 0.3).abs() < f64::EPSILON);

        backend.store_relationship(&employment("n1", "acme")).unwrap();
        let rels = backend
            .query_relationships(&RelationshipQuery::new().include_inactive())
            .unwrap();
        assert_eq!(rels.len(), 2);
        assert_eq!(rels.iter().filter(|r| r.is_active).count(), 1);
    }

    #[test]
    fn test_query_relationships_type_and_involving_filters() {
        let backend = backend();
        backend.store_relationship(&employment("n1", "acme")).unwrap();
        backend
            .store_relationship(&Relationship::new(
                EntityId::new("n1"),
                EntityId::new("pac"),
                RelationshipMetadata::donation(500.0, None, None, None),
                DataSource::CampaignFinance,
            ))
            .unwrap();

        let donations = backend
            .query_relationships(
                &RelationshipQuery::new()
                    .involving(EntityId::new("pac"))
                    .with_type(RelationshipType::Donation),
            )
            .unwrap();
        assert_eq!(donations.len(), 1);

        let all = backend
            .query_relationships(&RelationshipQuery::new().involving(EntityId::new("n1")))
            .unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].relationship_type(), RelationshipType::Employment);
    }

    #[test]
    fn test_merge_is_complete() {
        let backend = backend();
        backend
            .store_entity(&Entity::new(EntityId::new("keep"), EntityType::Neutral, "Jane Roe"))
            .unwrap();
        backend
            .store_entity(&Entity::new(EntityId::new("dup"), EntityType::Neutral, "Jane Roe Esq"))
            .unwrap();
        backend.store_relationship(&employment("keep", "acme")).unwrap();
        backend.store_relationship(&employment("dup", "acme")).unwrap();
        backend.store_relationship(&employment("dup", "globex")).unwrap();
        backend.store_relationship(&employment("globex", "dup")).unwrap();

        let outcome = backend
            .merge_entity_into(&EntityId::new("keep"), &EntityId::new("dup"))
            .unwrap();
        assert_eq!(outcome.repointed, 3);
        assert_eq!(outcome.deactivated, 1);
        assert_eq!(outcome.aliases_added, 1);

        let stragglers = backend
            .query_relationships(
                &RelationshipQuery::new()
                    .involving(EntityId::new("dup"))
                    .include_inactive(),
            )
            .unwrap();
        assert!(stragglers.is_empty());
        assert!(backend.get_entity(&EntityId::new("dup")).unwrap().is_none());
        let kept = backend.get_entity(&EntityId::new("keep")).unwrap().unwrap();
        assert!(kept.matches_name("Jane Roe Esq"));
    }

    #[test]
    fn test_cache_upsert_and_purge() {
        let backend = backend();
        let entry = ConflictPathEntry {
            subject_id: EntityId::new("n1"),
            opposing_id: EntityId::new("acme"),
            paths: Vec::new(),
            max_depth: 3,
            relationship_types: Some(vec![RelationshipType::Employment]),
            direction: Direction::Both,
            risk_score: 0.0,
            risk_level: RiskLevel::Green,
            recommendation: "clear".to_string(),
            created_at: 100,
            expires_at: 200,
        };
        backend.upsert_conflict_path(&entry).unwrap();
        backend.upsert_conflict_path(&entry).unwrap();
        assert_eq!(backend.conflict_path_count().unwrap(), 1);

        let loaded = backend
            .get_conflict_path(&entry.subject_id, &entry.opposing_id)
            .unwrap()
            .unwrap();
        assert_eq!(loaded, entry);

        assert_eq!(backend.count_expired_conflict_paths(150).unwrap(), 0);
        assert_eq!(backend.purge_expired_conflict_paths(200).unwrap(), 1);
        assert_eq!(backend.conflict_path_count().unwrap(), 0);
    }

    #[test]
    fn test_file_backed_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("graph.db");
        {
            let backend = SqliteGraphBackend::new(&path).unwrap();
            backend.store_relationship(&employment("n1", "acme")).unwrap();
        }
        let reopened = SqliteGraphBackend::new(&path).unwrap();
        assert_eq!(reopened.db_path(), Some(path.as_path()));
        assert_eq!(reopened.get_stats().unwrap().active_relationship_count, 1);
    }
}
