//! Risk and conflict assessment results.

use super::graph::{EntityId, RelationshipMetadata};
use super::path::Path;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Traffic-light risk level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    /// No meaningful connection.
    Green,
    /// Connection worth disclosing.
    Yellow,
    /// Connection likely disqualifying.
    Red,
}

impl RiskLevel {
    /// Returns the level as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Green => "GREEN",
            Self::Yellow => "YELLOW",
            Self::Red => "RED",
        }
    }

    /// Parses a level from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "GREEN" => Some(Self::Green),
            "YELLOW" => Some(Self::Yellow),
            "RED" => Some(Self::Red),
            _ => None,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of scoring a set of paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Highest single-path score.
    pub risk_score: f64,
    /// Level derived from the score.
    pub risk_level: RiskLevel,
    /// Human-readable guidance.
    pub recommendation: String,
    /// Number of scored paths.
    pub total_paths: usize,
    /// First path achieving the highest score.
    pub strongest_path: Option<Path>,
    /// Score of every path, in input order.
    pub all_path_scores: Vec<f64>,
}

/// Full result of a subject-vs-opposing-party analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictAssessment {
    /// Subject reference.
    pub subject: PartyRef,
    /// Opposing party reference.
    pub opposing_party: PartyRef,
    /// Highest single-path score.
    pub risk_score: f64,
    /// Level derived from the score.
    pub risk_level: RiskLevel,
    /// Human-readable guidance.
    pub recommendation: String,
    /// Number of discovered paths.
    pub total_paths: usize,
    /// Strongest path.
    pub strongest_path: Option<Path>,
    /// Score of every path, in discovery order.
    pub all_path_scores: Vec<f64>,
    /// When the analysis ran.
    pub analyzed_at: DateTime<Utc>,
    /// True if paths came from the conflict-path cache.
    pub from_cache: bool,
}

/// An entity reference with its display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyRef {
    /// Entity ID.
    pub id: EntityId,
    /// Display name; the id when the entity is unknown.
    pub name: String,
}

/// Risk of one subject against one opposing party, input to aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartyRisk {
    /// Opposing party.
    pub party: EntityId,
    /// Score against that party.
    pub risk_score: f64,
    /// Level against that party.
    pub risk_level: RiskLevel,
}

impl From<&ConflictAssessment> for PartyRisk {
    fn from(assessment: &ConflictAssessment) -> Self {
        Self {
            party: assessment.opposing_party.id.clone(),
            risk_score: assessment.risk_score,
            risk_level: assessment.risk_level,
        }
    }
}

/// Reduction of many per-party risks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRisk {
    /// Worst level across parties.
    pub highest_level: RiskLevel,
    /// Highest score across parties.
    pub highest_score: f64,
    /// Party with the highest score (first on ties).
    pub highest_party: Option<EntityId>,
    /// Parties above green.
    pub flagged_parties: usize,
    /// Parties considered.
    pub total_parties: usize,
}

/// Multi-party analysis output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiPartyAssessment {
    /// One assessment per opposing party, in input order.
    pub assessments: Vec<ConflictAssessment>,
    /// Reduced view.
    pub aggregate: AggregateRisk,
}

/// Severity on the lobbying conflict scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LobbyingSeverity {
    /// No lobbying ties.
    None,
    /// Score below 40.
    Low,
    /// Score below 70.
    Medium,
    /// Score of 70 or more.
    High,
}

impl LobbyingSeverity {
    /// Maps a 0-100 conflict score to a severity.
    #[must_use]
    pub const fn from_score(score: u32) -> Self {
        match score {
            0 => Self::None,
            1..40 => Self::Low,
            40..70 => Self::Medium,
            _ => Self::High,
        }
    }

    /// Returns the severity as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for LobbyingSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a lobbying tie connects the parties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LobbyingConnection {
    /// Lobbying edge between subject and opposing party.
    Direct,
    /// Subject's employer has a lobbying edge with the opposing party.
    Indirect,
}

/// A single lobbying tie.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LobbyingConflict {
    /// Direct or via an employer.
    pub connection: LobbyingConnection,
    /// Employer for indirect ties.
    pub intermediary: Option<EntityId>,
    /// Source of the lobbying edge.
    pub source: EntityId,
    /// Target of the lobbying edge.
    pub target: EntityId,
    /// Lobbying payload.
    pub metadata: RelationshipMetadata,
    /// Confidence of the lobbying edge.
    pub confidence: f64,
}

/// Result of a lobbying conflict check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LobbyingConflictAssessment {
    /// Subject.
    pub subject: EntityId,
    /// Opposing party.
    pub opposing_party: EntityId,
    /// Direct ties.
    pub direct: Vec<LobbyingConflict>,
    /// Indirect ties.
    pub indirect: Vec<LobbyingConflict>,
    /// Score on a 0-100 scale.
    pub conflict_score: u32,
    /// Severity of the score.
    pub severity: LobbyingSeverity,
}

impl LobbyingConflictAssessment {
    /// Returns true if any tie was found.
    #[must_use]
    pub fn has_conflict(&self) -> bool {
        !self.direct.is_empty() || !self.indirect.is_empty()
    }
}
