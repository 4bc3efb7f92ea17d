// Allow non-const functions that use f64::clamp
#![allow(clippy::missing_const_for_fn)]

//! Graph types for the conflict-of-interest relationship graph.
//!
//! # Entity Types
//!
//! | Type | Description | Examples |
//! |------|-------------|----------|
//! | `Neutral` | Person acting as a neutral | Mediators, arbitrators, judges |
//! | `Organization` | Companies, firms, associations | "Acme Corp", "Smith & Jones LLP" |
//! | `GovernmentAgency` | Public bodies | "Department of Energy" |
//! | `Contractor` | Government contractors | "Lockheed Martin" |
//! | `Publication` | Papers, articles, books | "On Arbitration Ethics" |
//! | `Event` | Conferences, panels, dinners | "ABA Annual Meeting 2024" |
//!
//! # Relationship Types
//!
//! | Type | Default weight | Symmetric |
//! |------|---------------:|:---------:|
//! | `Employment` | 10 | no |
//! | `SameCase` | 8 | no |
//! | `CoAuthorship` | 7 | yes |
//! | `Donation` | 6 | no |
//! | `SharedEvent` | 5 | no |
//! | `AdversarialCounsel` | -5 | no |
//! | `Lobbying` | 6 | no |
//! | `SharedEmployer` | 10 | yes |
//!
//! The relationship type is never stored next to its payload: it is derived
//! from the [`RelationshipMetadata`] variant, so a donation edge always
//! carries donation metadata.
//!
//! # Example
//!
//! ```rust
//! use conflict_graph::models::{DataSource, Entity, EntityId, EntityType, Relationship, RelationshipMetadata, RelationshipType};
//!
//! let neutral = Entity::new(EntityId::new("n-1"), EntityType::Neutral, "Jane Roe")
//!     .with_alias("J. Roe")
//!     .with_metadata("bar_number", "12345");
//!
//! let donation = Relationship::new(
//!     neutral.id.clone(),
//!     EntityId::new("pac-9"),
//!     RelationshipMetadata::donation(2_500.0, None, Some("Democratic".to_string()), None),
//!     DataSource::CampaignFinance,
//! );
//! assert_eq!(donation.relationship_type(), RelationshipType::Donation);
//! assert_eq!(donation.weight, 6);
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;

/// Unique identifier for a graph entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(String);

impl EntityId {
    /// Creates a new entity ID from a string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a new unique entity ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("ent_{}", uuid::Uuid::now_v7().simple()))
    }

    /// Builds a deterministic ID from a prefix and a set of identifying parts.
    ///
    /// Parts are trimmed and lowercased before hashing, so re-deriving the id
    /// for the same publication title or event name yields the same entity.
    #[must_use]
    pub fn derived(prefix: &str, parts: &[&str]) -> Self {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part.trim().to_lowercase().as_bytes());
            hasher.update([0x1f]);
        }
        let digest = hex::encode(hasher.finalize());
        Self(format!("{prefix}_{}", &digest[..16]))
    }

    /// Returns the entity ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the identifier is empty or whitespace.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Type of entity in the conflict graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// Person acting as a neutral decision-maker.
    Neutral,
    /// Company, firm, association or PAC.
    Organization,
    /// Government body.
    GovernmentAgency,
    /// Government contractor.
    Contractor,
    /// Paper, article or book.
    Publication,
    /// Conference, panel or other gathering.
    Event,
}

impl EntityType {
    /// Returns all entity type variants.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Neutral,
            Self::Organization,
            Self::GovernmentAgency,
            Self::Contractor,
            Self::Publication,
            Self::Event,
        ]
    }

    /// Returns the entity type as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Neutral => "neutral",
            Self::Organization => "organization",
            Self::GovernmentAgency => "government_agency",
            Self::Contractor => "contractor",
            Self::Publication => "publication",
            Self::Event => "event",
        }
    }

    /// Parses an entity type from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "neutral" | "person" | "mediator" | "arbitrator" | "judge" => Some(Self::Neutral),
            "organization" | "org" | "company" | "firm" => Some(Self::Organization),
            "government_agency" | "agency" | "government" => Some(Self::GovernmentAgency),
            "contractor" | "vendor" => Some(Self::Contractor),
            "publication" | "paper" | "article" => Some(Self::Publication),
            "event" | "conference" => Some(Self::Event),
            _ => None,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown entity type: {s}"))
    }
}

/// Origin of an entity or relationship record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    /// Campaign-finance filings.
    CampaignFinance,
    /// Court dockets.
    CourtRecords,
    /// Lobbying disclosure reports.
    LobbyingDisclosure,
    /// Professional networking profiles.
    ProfessionalNetwork,
    /// Publication indexes.
    Publications,
    /// Entered by an operator.
    Manual,
    /// Produced by an inference job rather than observed directly.
    Inferred,
}

impl DataSource {
    /// Returns the data source as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CampaignFinance => "campaign_finance",
            Self::CourtRecords => "court_records",
            Self::LobbyingDisclosure => "lobbying_disclosure",
            Self::ProfessionalNetwork => "professional_network",
            Self::Publications => "publications",
            Self::Manual => "manual",
            Self::Inferred => "inferred",
        }
    }

    /// Parses a data source from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "campaign_finance" | "fec" => Some(Self::CampaignFinance),
            "court_records" | "courts" => Some(Self::CourtRecords),
            "lobbying_disclosure" | "lobbying" | "lda" => Some(Self::LobbyingDisclosure),
            "professional_network" | "linkedin" => Some(Self::ProfessionalNetwork),
            "publications" | "publication" => Some(Self::Publications),
            "manual" => Some(Self::Manual),
            "inferred" => Some(Self::Inferred),
            _ => None,
        }
    }

    /// Returns true if the record was produced by inference.
    #[must_use]
    pub const fn is_inferred(&self) -> bool {
        matches!(self, Self::Inferred)
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A node in the conflict graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique identifier for this entity.
    pub id: EntityId,
    /// Type of entity.
    pub entity_type: EntityType,
    /// Canonical name.
    pub name: String,
    /// Alternate names used for fuzzy matching.
    pub aliases: Vec<String>,
    /// Type-specific attributes (`industry`, `party`, `bar_number`, ...).
    pub metadata: HashMap<String, String>,
    /// Where the record came from.
    pub data_source: DataSource,
    /// Unix seconds of the last upsert.
    pub last_updated: i64,
}

impl Entity {
    /// Creates a new entity with a manual data source.
    #[must_use]
    pub fn new(id: EntityId, entity_type: EntityType, name: impl Into<String>) -> Self {
        Self {
            id,
            entity_type,
            name: name.into(),
            aliases: Vec::new(),
            metadata: HashMap::new(),
            data_source: DataSource::Manual,
            last_updated: crate::current_timestamp(),
        }
    }

    /// Adds an alias; existing aliases (case-insensitive) and the canonical name are ignored.
    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.add_alias(alias);
        self
    }

    /// Adds multiple aliases.
    #[must_use]
    pub fn with_aliases(mut self, aliases: impl IntoIterator<Item = impl Into<String>>) -> Self {
        for alias in aliases {
            self.add_alias(alias);
        }
        self
    }

    /// Adds a metadata attribute.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Sets the data source.
    #[must_use]
    pub fn with_data_source(mut self, data_source: DataSource) -> Self {
        self.data_source = data_source;
        self
    }

    /// Inserts an alias in place. Returns true if the alias set changed.
    pub fn add_alias(&mut self, alias: impl Into<String>) -> bool {
        let alias = alias.into();
        let trimmed = alias.trim();
        if trimmed.is_empty() || self.matches_name(trimmed) {
            return false;
        }
        self.aliases.push(trimmed.to_string());
        true
    }

    /// Returns true if this entity matches a name (canonical or alias).
    #[must_use]
    pub fn matches_name(&self, name: &str) -> bool {
        let name_lower = name.to_lowercase();
        self.name.to_lowercase() == name_lower
            || self.aliases.iter().any(|a| a.to_lowercase() == name_lower)
    }

    /// Returns the canonical name followed by every alias.
    pub fn all_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

/// Type of relationship between entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    /// Person employed by an organization.
    Employment,
    /// Both parties appear on the same court case.
    SameCase,
    /// Co-authors of a publication.
    CoAuthorship,
    /// Financial donation.
    Donation,
    /// Attendance at a shared event.
    SharedEvent,
    /// Opposing counsel on a case; reduces risk.
    AdversarialCounsel,
    /// Lobbying registrant/client relationship.
    Lobbying,
    /// Overlapping employment at the same employer.
    SharedEmployer,
}

impl RelationshipType {
    /// Returns all relationship type variants.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Employment,
            Self::SameCase,
            Self::CoAuthorship,
            Self::Donation,
            Self::SharedEvent,
            Self::AdversarialCounsel,
            Self::Lobbying,
            Self::SharedEmployer,
        ]
    }

    /// Returns the relationship type as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Employment => "employment",
            Self::SameCase => "same_case",
            Self::CoAuthorship => "co_authorship",
            Self::Donation => "donation",
            Self::SharedEvent => "shared_event",
            Self::AdversarialCounsel => "adversarial_counsel",
            Self::Lobbying => "lobbying",
            Self::SharedEmployer => "shared_employer",
        }
    }

    /// Default ingestion weight for this type.
    #[must_use]
    pub const fn default_weight(&self) -> i32 {
        match self {
            Self::Employment | Self::SharedEmployer => 10,
            Self::SameCase => 8,
            Self::CoAuthorship => 7,
            Self::Donation | Self::Lobbying => 6,
            Self::SharedEvent => 5,
            Self::AdversarialCounsel => -5,
        }
    }

    /// Returns true if the relationship reads the same in both directions.
    #[must_use]
    pub const fn is_symmetric(&self) -> bool {
        matches!(self, Self::CoAuthorship | Self::SharedEmployer)
    }

    /// Parses a relationship type from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "employment" | "employed_by" | "works_at" => Some(Self::Employment),
            "same_case" | "case" => Some(Self::SameCase),
            "co_authorship" | "coauthorship" | "coauthor" => Some(Self::CoAuthorship),
            "donation" | "donated_to" | "contribution" => Some(Self::Donation),
            "shared_event" | "event" | "attended" => Some(Self::SharedEvent),
            "adversarial_counsel" | "adversarial" | "opposing_counsel" => {
                Some(Self::AdversarialCounsel)
            },
            "lobbying" | "lobbied" => Some(Self::Lobbying),
            "shared_employer" | "former_colleague" => Some(Self::SharedEmployer),
            _ => None,
        }
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RelationshipType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown relationship type: {s}"))
    }
}

/// A publication reference carried by a co-authorship edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationRef {
    /// Publication title.
    pub title: String,
    /// Publication date, if known.
    pub published_date: Option<NaiveDate>,
    /// Journal, conference or publisher.
    pub venue: Option<String>,
}

/// Type-specific payload of a relationship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelationshipMetadata {
    /// Employment of a person by an organization.
    Employment {
        /// Job title or role.
        role: Option<String>,
        /// First day of employment.
        start_date: Option<NaiveDate>,
        /// Last day of employment; `None` while ongoing.
        end_date: Option<NaiveDate>,
    },
    /// Shared involvement on a court case.
    SameCase {
        /// Docket number.
        case_number: String,
        /// Court name.
        court: Option<String>,
        /// Role on the case (counsel, party, neutral).
        role: Option<String>,
        /// Filing date.
        filed_date: Option<NaiveDate>,
    },
    /// Co-authorship across one or more publications.
    CoAuthorship {
        /// Publications shared by the authors, unique by title.
        publications: Vec<PublicationRef>,
    },
    /// Financial donation.
    Donation {
        /// Amount in USD.
        amount: f64,
        /// Recipient display name.
        recipient: Option<String>,
        /// Recipient party affiliation.
        party: Option<String>,
        /// Contribution date.
        date: Option<NaiveDate>,
        /// Election cycle (e.g. 2024).
        election_cycle: Option<i32>,
    },
    /// Attendance at an event.
    SharedEvent {
        /// Event name.
        event_name: String,
        /// Event date.
        event_date: Option<NaiveDate>,
        /// Attendee role (speaker, panelist, attendee).
        role: Option<String>,
    },
    /// Opposing counsel on a case.
    AdversarialCounsel {
        /// Docket number.
        case_number: String,
        /// Date of the matter.
        date: Option<NaiveDate>,
        /// Outcome, if recorded.
        outcome: Option<String>,
    },
    /// Lobbying disclosure filing.
    Lobbying {
        /// Lobbying firm.
        registrant: Option<String>,
        /// Client on whose behalf lobbying occurred.
        client: Option<String>,
        /// Reported amount in USD.
        amount: Option<f64>,
        /// Filing date.
        filing_date: Option<NaiveDate>,
        /// Issue areas lobbied on.
        issues: Vec<String>,
    },
    /// Overlapping employment at the same employer.
    SharedEmployer {
        /// The employer both people worked for.
        employer_id: EntityId,
        /// Employer display name.
        employer_name: Option<String>,
        /// First day both were employed.
        overlap_start: NaiveDate,
        /// Last day both were employed; `None` while both still are.
        overlap_end: Option<NaiveDate>,
        /// Whole months of overlap.
        overlap_months: u32,
    },
}

impl RelationshipMetadata {
    /// Employment metadata.
    #[must_use]
    pub const fn employment(
        role: Option<String>,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Self {
        Self::Employment {
            role,
            start_date,
            end_date,
        }
    }

    /// Same-case metadata.
    #[must_use]
    pub fn same_case(case_number: impl Into<String>, filed_date: Option<NaiveDate>) -> Self {
        Self::SameCase {
            case_number: case_number.into(),
            court: None,
            role: None,
            filed_date,
        }
    }

    /// Donation metadata.
    #[must_use]
    pub const fn donation(
        amount: f64,
        recipient: Option<String>,
        party: Option<String>,
        date: Option<NaiveDate>,
    ) -> Self {
        Self::Donation {
            amount,
            recipient,
            party,
            date,
            election_cycle: None,
        }
    }

    /// Returns the relationship type implied by this payload.
    #[must_use]
    pub const fn relationship_type(&self) -> RelationshipType {
        match self {
            Self::Employment { .. } => RelationshipType::Employment,
            Self::SameCase { .. } => RelationshipType::SameCase,
            Self::CoAuthorship { .. } => RelationshipType::CoAuthorship,
            Self::Donation { .. } => RelationshipType::Donation,
            Self::SharedEvent { .. } => RelationshipType::SharedEvent,
            Self::AdversarialCounsel { .. } => RelationshipType::AdversarialCounsel,
            Self::Lobbying { .. } => RelationshipType::Lobbying,
            Self::SharedEmployer { .. } => RelationshipType::SharedEmployer,
        }
    }

    /// Date used to age the relationship.
    ///
    /// Ongoing relationships (employment without an end date, a shared
    /// employer overlap still in progress) have no date and count as current.
    #[must_use]
    pub fn event_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Employment { end_date, .. } => *end_date,
            Self::SameCase { filed_date, .. } => *filed_date,
            Self::CoAuthorship { publications } => {
                publications.iter().filter_map(|p| p.published_date).max()
            },
            Self::Donation { date, .. } | Self::AdversarialCounsel { date, .. } => *date,
            Self::SharedEvent { event_date, .. } => *event_date,
            Self::Lobbying { filing_date, .. } => *filing_date,
            Self::SharedEmployer { overlap_end, .. } => *overlap_end,
        }
    }

    /// Date used to place the relationship in a reporting time bucket.
    ///
    /// Unlike [`Self::event_date`], employment falls back to its start date.
    #[must_use]
    pub fn reporting_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Employment {
                start_date,
                end_date,
                ..
            } => end_date.or(*start_date),
            Self::SharedEmployer { overlap_start, .. } => Some(*overlap_start),
            other => other.event_date(),
        }
    }

    /// Adds a publication to co-authorship metadata, keyed by title.
    ///
    /// Returns true if the publication was new. No-op for other variants.
    pub fn add_publication(&mut self, publication: PublicationRef) -> bool {
        let Self::CoAuthorship { publications } = self else {
            return false;
        };
        let key = publication.title.trim().to_lowercase();
        if publications
            .iter()
            .any(|p| p.title.trim().to_lowercase() == key)
        {
            return false;
        }
        publications.push(publication);
        true
    }
}

/// A directed, typed, weighted edge between two entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    /// Source entity ID.
    pub source: EntityId,
    /// Target entity ID.
    pub target: EntityId,
    /// Type-specific payload; determines the relationship type.
    pub metadata: RelationshipMetadata,
    /// Signed weight recorded at ingestion.
    pub weight: i32,
    /// Confidence score (0.0 to 1.0); 1.0 means independently verified.
    pub confidence: f64,
    /// Where the record came from.
    pub data_source: DataSource,
    /// False marks a historical or superseded edge.
    pub is_active: bool,
    /// Unix seconds of the last observation.
    pub last_verified: i64,
}

impl Relationship {
    /// Creates an active, fully confident relationship with the default weight for its type.
    #[must_use]
    pub fn new(
        source: EntityId,
        target: EntityId,
        metadata: RelationshipMetadata,
        data_source: DataSource,
    ) -> Self {
        let weight = metadata.relationship_type().default_weight();
        let mut rel = Self {
            source,
            target,
            metadata,
            weight,
            confidence: 1.0,
            data_source,
            is_active: true,
            last_verified: crate::current_timestamp(),
        };
        rel.canonicalize();
        rel
    }

    /// Orders symmetric relationships with the lower id as source.
    pub fn canonicalize(&mut self) {
        if self.relationship_type().is_symmetric() && self.target < self.source {
            std::mem::swap(&mut self.source, &mut self.target);
        }
    }

    /// Sets the confidence score.
    #[must_use]
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Overrides the ingestion weight.
    #[must_use]
    pub const fn with_weight(mut self, weight: i32) -> Self {
        self.weight = weight;
        self
    }

    /// Marks the relationship inactive.
    #[must_use]
    pub const fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Returns the relationship type.
    #[must_use]
    pub const fn relationship_type(&self) -> RelationshipType {
        self.metadata.relationship_type()
    }

    /// Returns true if the edge touches the entity.
    #[must_use]
    pub fn involves(&self, id: &EntityId) -> bool {
        &self.source == id || &self.target == id
    }

    /// Returns the endpoint opposite to `id`, if the edge touches it.
    #[must_use]
    pub fn other_end(&self, id: &EntityId) -> Option<&EntityId> {
        if &self.source == id {
            Some(&self.target)
        } else if &self.target == id {
            Some(&self.source)
        } else {
            None
        }
    }

    /// Returns true if both relationships describe the same logical fact.
    #[must_use]
    pub fn same_tuple(&self, other: &Self) -> bool {
        self.source == other.source
            && self.target == other.target
            && self.relationship_type() == other.relationship_type()
    }
}

/// Query parameters for searching entities.
#[derive(Debug, Clone, Default)]
pub struct EntityQuery {
    /// Filter by entity type.
    pub entity_type: Option<EntityType>,
    /// Case-insensitive substring of the name or an alias.
    pub name: Option<String>,
    /// Filter by data source.
    pub data_source: Option<DataSource>,
    /// Metadata attributes that must all match exactly.
    pub metadata: Vec<(String, String)>,
    /// Maximum number of results.
    pub limit: Option<usize>,
    /// Offset for pagination.
    pub offset: Option<usize>,
}

impl EntityQuery {
    /// Default page size when no limit is given.
    pub const DEFAULT_LIMIT: usize = 100;

    /// Creates a new empty query.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entity_type: None,
            name: None,
            data_source: None,
            metadata: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Filters by entity type.
    #[must_use]
    pub const fn with_type(mut self, entity_type: EntityType) -> Self {
        self.entity_type = Some(entity_type);
        self
    }

    /// Filters by name substring.
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

    /// Requires a metadata attribute.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }

    /// Sets the maximum number of results.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the pagination offset.
    #[must_use]
    pub const fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns true if the entity satisfies every filter except paging.
    #[must_use]
    pub fn matches(&self, entity: &Entity) -> bool {
        if self.entity_type.is_some_and(|t| t != entity.entity_type) {
            return false;
        }
        if self.data_source.is_some_and(|s| s != entity.data_source) {
            return false;
        }
        if let Some(ref name) = self.name {
            let needle = name.to_lowercase();
            if !entity
                .all_names()
                .any(|n| n.to_lowercase().contains(&needle))
            {
                return false;
            }
        }
        self.metadata
            .iter()
            .all(|(k, v)| entity.metadata.get(k).is_some_and(|found| found == v))
    }
}

/// Query parameters for searching relationships.
#[derive(Debug, Clone, Default)]
pub struct RelationshipQuery {
    /// Filter by source entity.
    pub source: Option<EntityId>,
    /// Filter by target entity.
    pub target: Option<EntityId>,
    /// Filter by either endpoint.
    pub involving: Option<EntityId>,
    /// Allowed relationship types; empty means all.
    pub relationship_types: Vec<RelationshipType>,
    /// Only return active edges.
    pub active_only: bool,
    /// Maximum number of results.
    pub limit: Option<usize>,
}

impl RelationshipQuery {
    /// Creates a new query over active edges.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            source: None,
            target: None,
            involving: None,
            relationship_types: Vec::new(),
            active_only: true,
            limit: None,
        }
    }

    /// Filters by source entity.
    #[must_use]
    pub fn from(mut self, entity_id: EntityId) -> Self {
        self.source = Some(entity_id);
        self
    }

    /// Filters by target entity.
    #[must_use]
    pub fn to(mut self, entity_id: EntityId) -> Self {
        self.target = Some(entity_id);
        self
    }

    /// Filters by either endpoint.
    #[must_use]
    pub fn involving(mut self, entity_id: EntityId) -> Self {
        self.involving = Some(entity_id);
        self
    }

    /// Adds an allowed relationship type.
    #[must_use]
    pub fn with_type(mut self, relationship_type: RelationshipType) -> Self {
        if !self.relationship_types.contains(&relationship_type) {
            self.relationship_types.push(relationship_type);
        }
        self
    }

    /// Replaces the allowed relationship types.
    #[must_use]
    pub fn with_types(mut self, types: &[RelationshipType]) -> Self {
        self.relationship_types = types.to_vec();
        self
    }

    /// Includes inactive edges.
    #[must_use]
    pub const fn include_inactive(mut self) -> Self {
        self.active_only = false;
        self
    }

    /// Sets the maximum number of results.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns true if the relationship satisfies every filter except the limit.
    #[must_use]
    pub fn matches(&self, rel: &Relationship) -> bool {
        if self.active_only && !rel.is_active {
            return false;
        }
        if self.source.as_ref().is_some_and(|s| s != &rel.source) {
            return false;
        }
        if self.target.as_ref().is_some_and(|t| t != &rel.target) {
            return false;
        }
        if self.involving.as_ref().is_some_and(|id| !rel.involves(id)) {
            return false;
        }
        self.relationship_types.is_empty()
            || self.relationship_types.contains(&rel.relationship_type())
    }
}
