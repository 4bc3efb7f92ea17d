//! Conflict-path cache trait.
//!
//! Entries are keyed by `(subject, opposing)` and overwritten on every fresh
//! search. Only the graph service and the expiry sweep touch them.

use crate::Result;
use crate::models::{ConflictPathEntry, EntityId};

/// Storage for cached conflict-path entries.
pub trait ConflictCacheBackend: Send + Sync {
    /// Returns the entry for the pair, expired or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    fn get_conflict_path(
        &self,
        subject: &EntityId,
        opposing: &EntityId,
    ) -> Result<Option<ConflictPathEntry>>;

    /// Inserts or replaces the entry for the pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn upsert_conflict_path(&self, entry: &ConflictPathEntry) -> Result<()>;

    /// Deletes entries with `expires_at <= now` and returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn purge_expired_conflict_paths(&self, now: i64) -> Result<usize>;

    /// Counts entries with `expires_at <= now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the count fails.
    fn count_expired_conflict_paths(&self, now: i64) -> Result<usize>;

    /// Counts all entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the count fails.
    fn conflict_path_count(&self) -> Result<usize>;
}
