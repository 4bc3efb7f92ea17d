//! Conflict-path cache expiry.
//!
//! Cached entries carry an `expires_at` timestamp set when the search ran.
//! Reads already ignore stale entries; the sweep reclaims their storage.

use crate::Result;
use crate::storage::ConflictCacheBackend;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, instrument};

/// Result of a cache sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct SweepResult {
    /// Entries in the cache when the sweep started.
    pub entries_before: usize,

    /// Entries that were (or would be) purged.
    pub entries_purged: usize,

    /// Whether this was a dry run (no actual changes made).
    pub dry_run: bool,

    /// Duration of the sweep in milliseconds.
    pub duration_ms: u64,
}

impl SweepResult {
    /// Returns `true` if any entries were expired.
    #[must_use]
    pub const fn has_expired_entries(&self) -> bool {
        self.entries_purged > 0
    }

    /// Returns a human-readable summary of the sweep.
    #[must_use]
    pub fn summary(&self) -> String {
        let action = if self.dry_run { "would purge" } else { "purged" };

        if self.entries_purged == 0 {
            format!(
                "No expired conflict paths found ({} entries checked in {}ms)",
                self.entries_before, self.duration_ms
            )
        } else {
            format!(
                "{} {} expired conflict paths - checked {} in {}ms",
                action, self.entries_purged, self.entries_before, self.duration_ms
            )
        }
    }
}

/// Purges expired conflict-path cache entries.
///
/// # Thread Safety
///
/// The service holds an `Arc` reference to the cache backend,
/// making it safe to share across threads.
pub struct CacheExpiryService<C: ConflictCacheBackend> {
    cache: Arc<C>,
}

impl<C: ConflictCacheBackend> CacheExpiryService<C> {
    /// Creates a new expiry service.
    #[must_use]
    pub const fn new(cache: Arc<C>) -> Self {
        Self { cache }
    }

    /// Purges entries that have expired as of now.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache backend fails.
    pub fn sweep(&self, dry_run: bool) -> Result<SweepResult> {
        self.sweep_at(crate::current_timestamp(), dry_run)
    }

    /// Purges entries with `expires_at <= now`.
    ///
    /// With `dry_run` the expired entries are only counted.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache backend fails.
    #[instrument(
        name = "conflict_graph.gc.cache_expiry",
        skip(self),
        fields(component = "gc", operation = "cache_expiry", dry_run = dry_run)
    )]
    #[allow(clippy::cast_precision_loss)]
    pub fn sweep_at(&self, now: i64, dry_run: bool) -> Result<SweepResult> {
        let start = Instant::now();
        let entries_before = self.cache.conflict_path_count()?;

        let entries_purged = if dry_run {
            self.cache.count_expired_conflict_paths(now)?
        } else {
            self.cache.purge_expired_conflict_paths(now)?
        };

        let result = SweepResult {
            entries_before,
            entries_purged,
            dry_run,
            duration_ms: duration_to_millis(start.elapsed()),
        };

        metrics::counter!(
            "gc_cache_expiry_runs_total",
            "dry_run" => if dry_run { "true" } else { "false" }
        )
        .increment(1);
        metrics::gauge!("gc_cache_expiry_purged").set(result.entries_purged as f64);
        metrics::histogram!("gc_cache_expiry_duration_ms").record(result.duration_ms as f64);

        info!(
            entries_before = result.entries_before,
            entries_purged = result.entries_purged,
            duration_ms = result.duration_ms,
            dry_run,
            "Cache expiry sweep completed"
        );

        Ok(result)
    }
}

fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConflictPathEntry, Direction, EntityId, RiskLevel};
    use crate::storage::InMemoryGraphBackend;

    fn entry(subject: &str, expires_at: i64) -> ConflictPathEntry {
        ConflictPathEntry {
            subject_id: EntityId::new(subject),
            opposing_id: EntityId::new("opposing"),
            paths: Vec::new(),
            max_depth: 3,
            relationship_types: None,
            direction: Direction::Both,
            risk_score: 0.0,
            risk_level: RiskLevel::Green,
            recommendation: String::new(),
            created_at: 0,
            expires_at,
        }
    }

    fn seeded() -> Arc<InMemoryGraphBackend> {
        let backend = Arc::new(InMemoryGraphBackend::new());
        backend.upsert_conflict_path(&entry("stale", 100)).unwrap();
        backend.upsert_conflict_path(&entry("edge", 500)).unwrap();
        backend.upsert_conflict_path(&entry("fresh", 1_000)).unwrap();
        backend
    }

    #[test]
    fn test_sweep_purges_expired() {
        let backend = seeded();
        let service = CacheExpiryService::new(Arc::clone(&backend));

        let result = service.sweep_at(500, false).unwrap();
        assert_eq!(result.entries_before, 3);
        assert_eq!(result.entries_purged, 2);
        assert!(result.has_expired_entries());
        assert!(result.summary().starts_with("purged 2"));
        assert_eq!(backend.conflict_path_count().unwrap(), 1);
    }

    #[test]
    fn test_dry_run_changes_nothing() {
        let backend = seeded();
        let service = CacheExpiryService::new(Arc::clone(&backend));

        let result = service.sweep_at(500, true).unwrap();
        assert_eq!(result.entries_purged, 2);
        assert!(result.summary().starts_with("would purge 2"));
        assert_eq!(backend.conflict_path_count().unwrap(), 3);
    }

    #[test]
    fn test_nothing_expired() {
        let service = CacheExpiryService::new(seeded());
        let result = service.sweep_at(0, false).unwrap();
        assert!(!result.has_expired_entries());
        assert!(result.summary().starts_with("No expired conflict paths"));
    }
}
