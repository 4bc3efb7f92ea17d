//! Inputs and outputs of relationship inference jobs.

use super::graph::{EntityId, EntityType};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A publication with its authors, as delivered by a publication collector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationRecord {
    /// Title; identifies the publication.
    pub title: String,
    /// Author entity IDs.
    pub authors: Vec<EntityId>,
    /// Publication date.
    pub published_date: Option<NaiveDate>,
    /// Journal, conference or publisher.
    pub venue: Option<String>,
}

/// An event with its attendees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Event name.
    pub name: String,
    /// Event date; part of the event identity.
    pub date: Option<NaiveDate>,
    /// Location.
    pub location: Option<String>,
    /// Attendee entity IDs with their roles.
    pub attendees: Vec<Attendee>,
}

/// An event attendee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendee {
    /// Attendee entity.
    pub entity_id: EntityId,
    /// Role at the event.
    pub role: Option<String>,
}

/// What to do about a pair of similar entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DuplicateAction {
    /// Near-identical; merge automatically.
    Merge,
    /// Similar; a human should decide.
    Review,
}

impl fmt::Display for DuplicateAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Merge => write!(f, "MERGE"),
            Self::Review => write!(f, "REVIEW"),
        }
    }
}

/// A pair of entities that look like the same real-world thing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateCandidate {
    /// First entity (earlier in name order).
    pub first: EntityId,
    /// Second entity.
    pub second: EntityId,
    /// Type shared by both.
    pub entity_type: EntityType,
    /// Best similarity across names and aliases, in [0, 1].
    pub similarity: f64,
    /// Names that produced the best similarity.
    pub matched_names: (String, String),
    /// Recommended action.
    pub action: DuplicateAction,
}

/// What an entity merge changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeOutcome {
    /// Edges re-pointed from the merged entity to the kept one.
    pub repointed: usize,
    /// Edges deactivated because an equivalent active edge already existed.
    pub deactivated: usize,
    /// Edges between the two entities, dropped.
    pub removed: usize,
    /// Aliases added to the kept entity.
    pub aliases_added: usize,
}

/// Summary of one inference pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceReport {
    /// Companies examined.
    pub companies_scanned: usize,
    /// Shared-employer edges written.
    pub edges_written: usize,
    /// Companies whose inference failed.
    pub failures: usize,
    /// Wall-clock time.
    pub duration_ms: u64,
}

impl InferenceReport {
    /// One-line summary for logs and the CLI.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "scanned {} companies, wrote {} shared-employer edges, {} failures ({}ms)",
            self.companies_scanned, self.edges_written, self.failures, self.duration_ms
        )
    }
}
