//! Data models for the conflict graph.
//!
//! This module contains all the core data structures used throughout the system.

mod aggregation;
pub mod graph;
mod inference;
mod network;
mod path;
mod risk;

pub use aggregation::{
    CaseSummary, DonationSummary, IndustrySummary, LobbyingSummary, Quarter, QuarterBucket,
    RankedCounterparty, Share, TimeWindow,
};
pub use graph::{
    DataSource, Entity, EntityId, EntityQuery, EntityType, PublicationRef, Relationship,
    RelationshipMetadata, RelationshipQuery, RelationshipType,
};
pub use inference::{
    Attendee, DuplicateAction, DuplicateCandidate, EventRecord, InferenceReport, MergeOutcome,
    PublicationRecord,
};
pub use network::{
    EdgeDirection, EnrichedRelationship, EntityFilter, NetworkStats, RelationshipListOptions,
};
pub use path::{ConflictPathEntry, Direction, Path, PathEdge, PathOptions, PathSearchResult};
pub use risk::{
    AggregateRisk, ConflictAssessment, LobbyingConflict, LobbyingConflictAssessment,
    LobbyingConnection, LobbyingSeverity, MultiPartyAssessment, PartyRef, PartyRisk,
    RiskAssessment, RiskLevel,
};
