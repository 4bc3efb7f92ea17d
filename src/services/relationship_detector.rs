//! Relationship inference and duplicate detection.
//!
//! Batch jobs that derive edges the collectors never see directly:
//!
//! - co-authorship between every pair of authors on a publication
//! - attendance edges from people to an event
//! - shared employment between people whose employment at the same
//!   organization overlapped in time
//!
//! plus name-similarity duplicate detection and a verified entity merge.

use crate::config::InferenceConfig;
use crate::models::{
    DataSource, DuplicateAction, DuplicateCandidate, Entity, EntityId, EntityQuery, EntityType,
    EventRecord, InferenceReport, MergeOutcome, PublicationRecord, PublicationRef, Relationship,
    RelationshipMetadata, RelationshipQuery, RelationshipType,
};
use crate::storage::traits::GraphBackend;
use crate::{Error, Result};
use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

static PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{L}\p{N}\s]").unwrap_or_else(|_| unreachable!()));

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap_or_else(|_| unreachable!()));

/// Lowercases, strips punctuation and collapses whitespace.
///
/// ```rust
/// use conflict_graph::services::normalize_name;
///
/// assert_eq!(normalize_name("  Smith,  Jones & Co. "), "smith jones co");
/// ```
#[must_use]
pub fn normalize_name(name: &str) -> String {
    let lower = name.to_lowercase();
    let stripped = PUNCTUATION.replace_all(&lower, "");
    WHITESPACE.replace_all(stripped.trim(), " ").into_owned()
}

/// Normalized Levenshtein similarity of two normalized names, in [0, 1].
///
/// Two empty names are identical.
#[must_use]
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let similarity = 1.0 - levenshtein(&a, &b) as f64 / longest as f64;
    similarity
}

/// Two-row edit distance.
fn levenshtein(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr: Vec<usize> = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Whole months from `start` to `end`, zero if `end` precedes `start`.
fn months_between(start: NaiveDate, end: NaiveDate) -> u32 {
    if end < start {
        return 0;
    }
    let mut months = (end.year() - start.year()) * 12 + end.month0() as i32 - start.month0() as i32;
    if end.day() < start.day() {
        months -= 1;
    }
    u32::try_from(months.max(0)).unwrap_or(0)
}

/// An employment edge with a known start, reduced to what overlap needs.
struct Stint {
    person: EntityId,
    start: NaiveDate,
    end: Option<NaiveDate>,
}

/// Overlap of two stints at one employer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Overlap {
    start: NaiveDate,
    end: Option<NaiveDate>,
    months: u32,
}

/// Writes inferred relationships into a graph store.
pub struct RelationshipDetector<B: GraphBackend> {
    backend: Arc<B>,
    config: InferenceConfig,
}

impl<B: GraphBackend> RelationshipDetector<B> {
    /// Creates a detector with default thresholds.
    #[must_use]
    pub fn new(backend: Arc<B>) -> Self {
        Self::with_config(backend, InferenceConfig::default())
    }

    /// Creates a detector with the given thresholds.
    #[must_use]
    pub fn with_config(backend: Arc<B>, config: InferenceConfig) -> Self {
        Self {
            backend,
            config: config.clamped(),
        }
    }

    /// Returns the thresholds in use.
    #[must_use]
    pub const fn config(&self) -> &InferenceConfig {
        &self.config
    }

    // =========================================================================
    // Co-authorship and Events
    // =========================================================================

    /// Records a publication and links every pair of its authors.
    ///
    /// The co-authorship edge for a pair is shared across publications: a new
    /// publication is appended to its list, a known one is a no-op. Authors
    /// missing from the store are skipped.
    ///
    /// Returns the number of edges written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a blank title, or a store error.
    #[instrument(skip(self, record), fields(title = %record.title, authors = record.authors.len()))]
    pub fn detect_coauthorship(&self, record: &PublicationRecord) -> Result<usize> {
        let title = record.title.trim();
        if title.is_empty() {
            return Err(Error::InvalidInput("publication title is empty".to_string()));
        }

        let mut publication = Entity::new(
            EntityId::derived("pub", &[title]),
            EntityType::Publication,
            title,
        )
        .with_data_source(DataSource::Publications);
        if let Some(venue) = &record.venue {
            publication = publication.with_metadata("venue", venue.clone());
        }
        if let Some(date) = record.published_date {
            publication = publication.with_metadata("published_date", date.to_string());
        }
        self.backend.store_entity(&publication)?;

        let authors = self.known_entities(&record.authors)?;
        let reference = PublicationRef {
            title: title.to_string(),
            published_date: record.published_date,
            venue: record.venue.clone(),
        };

        let mut written = 0;
        for (i, first) in authors.iter().enumerate() {
            for second in authors.iter().skip(i + 1) {
                if self.link_coauthors(first, second, &reference)? {
                    written += 1;
                }
            }
        }

        metrics::counter!("conflict_graph_inferred_edges_total", "kind" => "co_authorship")
            .increment(written as u64);
        tracing::debug!(written, "Co-authorship inference complete");
        Ok(written)
    }

    /// Writes or extends the co-authorship edge for a pair with `first < second`.
    fn link_coauthors(
        &self,
        first: &EntityId,
        second: &EntityId,
        reference: &PublicationRef,
    ) -> Result<bool> {
        let query = RelationshipQuery::new()
            .from(first.clone())
            .to(second.clone())
            .with_type(RelationshipType::CoAuthorship);

        let relationship = match self.backend.query_relationships(&query)?.into_iter().next() {
            Some(mut existing) => {
                if !existing.metadata.add_publication(reference.clone()) {
                    return Ok(false);
                }
                existing.last_verified = crate::current_timestamp();
                existing
            },
            None => Relationship::new(
                first.clone(),
                second.clone(),
                RelationshipMetadata::CoAuthorship {
                    publications: vec![reference.clone()],
                },
                DataSource::Publications,
            )
            .with_confidence(self.config.coauthorship_confidence),
        };
        self.backend.store_relationship(&relationship)?;
        Ok(true)
    }

    /// Records an event and links every attendee to it.
    ///
    /// Returns the number of edges written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a blank event name, or a store error.
    #[instrument(skip(self, record), fields(event = %record.name, attendees = record.attendees.len()))]
    pub fn record_event_attendance(&self, record: &EventRecord) -> Result<usize> {
        let name = record.name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("event name is empty".to_string()));
        }

        let date = record.date.map(|d| d.to_string()).unwrap_or_default();
        let event_id = EntityId::derived("evt", &[name, date.as_str()]);
        let mut event = Entity::new(event_id.clone(), EntityType::Event, name)
            .with_data_source(DataSource::Inferred);
        if !date.is_empty() {
            event = event.with_metadata("date", date);
        }
        if let Some(location) = &record.location {
            event = event.with_metadata("location", location.clone());
        }
        self.backend.store_entity(&event)?;

        let mut seen = BTreeSet::new();
        let mut written = 0;
        for attendee in &record.attendees {
            if attendee.entity_id.is_blank() || !seen.insert(attendee.entity_id.clone()) {
                continue;
            }
            if self.backend.get_entity(&attendee.entity_id)?.is_none() {
                tracing::warn!(attendee = %attendee.entity_id, "Skipping unknown attendee");
                continue;
            }
            let edge = Relationship::new(
                attendee.entity_id.clone(),
                event_id.clone(),
                RelationshipMetadata::SharedEvent {
                    event_name: name.to_string(),
                    event_date: record.date,
                    role: attendee.role.clone(),
                },
                DataSource::Inferred,
            )
            .with_confidence(self.config.event_confidence);
            self.backend.store_relationship(&edge)?;
            written += 1;
        }

        metrics::counter!("conflict_graph_inferred_edges_total", "kind" => "shared_event")
            .increment(written as u64);
        Ok(written)
    }

    /// Existing, distinct, non-blank ids in ascending order.
    fn known_entities(&self, ids: &[EntityId]) -> Result<Vec<EntityId>> {
        let unique: BTreeSet<&EntityId> = ids.iter().filter(|id| !id.is_blank()).collect();
        let mut known = Vec::with_capacity(unique.len());
        for id in unique {
            if self.backend.get_entity(id)?.is_some() {
                known.push(id.clone());
            } else {
                tracing::warn!(entity_id = %id, "Skipping unknown author");
            }
        }
        Ok(known)
    }

    // =========================================================================
    // Shared Employment
    // =========================================================================

    /// Links people whose employment at `company` overlapped, as of today.
    ///
    /// # Errors
    ///
    /// See [`Self::detect_shared_employment_at`].
    pub fn detect_shared_employment(&self, company: &EntityId) -> Result<usize> {
        self.detect_shared_employment_at(company, chrono::Utc::now().date_naive())
    }

    /// Links people whose employment at `company` overlapped, treating open
    /// stints as running until `today`.
    ///
    /// Employment edges without a start date are skipped. When a pair already
    /// has a shared-employer edge for a different employer with a longer
    /// overlap, that edge is kept.
    ///
    /// Returns the number of edges written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the company does not exist, or a store error.
    #[instrument(skip(self), fields(company = %company))]
    pub fn detect_shared_employment_at(&self, company: &EntityId, today: NaiveDate) -> Result<usize> {
        let employer = self.backend.get_entity(company)?.ok_or_else(|| Error::NotFound {
            kind: "entity",
            id: company.to_string(),
        })?;

        let query = RelationshipQuery::new()
            .to(company.clone())
            .with_type(RelationshipType::Employment);
        let stints: Vec<Stint> = self
            .backend
            .query_relationships(&query)?
            .into_iter()
            .filter_map(|rel| match rel.metadata {
                RelationshipMetadata::Employment {
                    start_date: Some(start),
                    end_date,
                    ..
                } => Some(Stint {
                    person: rel.source,
                    start,
                    end: end_date,
                }),
                _ => None,
            })
            .collect();

        let mut overlaps: BTreeMap<(EntityId, EntityId), Overlap> = BTreeMap::new();
        for (i, a) in stints.iter().enumerate() {
            for b in stints.iter().skip(i + 1) {
                if a.person == b.person {
                    continue;
                }
                let Some(overlap) = stint_overlap(a, b, today) else {
                    continue;
                };
                let key = if a.person < b.person {
                    (a.person.clone(), b.person.clone())
                } else {
                    (b.person.clone(), a.person.clone())
                };
                overlaps
                    .entry(key)
                    .and_modify(|best| {
                        if overlap.months > best.months {
                            *best = overlap;
                        }
                    })
                    .or_insert(overlap);
            }
        }

        let mut written = 0;
        for ((first, second), overlap) in overlaps {
            if self.has_stronger_shared_employer(&first, &second, company, overlap.months)? {
                continue;
            }
            let edge = Relationship::new(
                first,
                second,
                RelationshipMetadata::SharedEmployer {
                    employer_id: company.clone(),
                    employer_name: Some(employer.name.clone()),
                    overlap_start: overlap.start,
                    overlap_end: overlap.end,
                    overlap_months: overlap.months,
                },
                DataSource::Inferred,
            )
            .with_confidence(self.config.shared_employment_confidence);
            self.backend.store_relationship(&edge)?;
            written += 1;
        }

        metrics::counter!("conflict_graph_inferred_edges_total", "kind" => "shared_employer")
            .increment(written as u64);
        tracing::debug!(stints = stints.len(), written, "Shared employment inference complete");
        Ok(written)
    }

    fn has_stronger_shared_employer(
        &self,
        first: &EntityId,
        second: &EntityId,
        company: &EntityId,
        months: u32,
    ) -> Result<bool> {
        let query = RelationshipQuery::new()
            .from(first.clone())
            .to(second.clone())
            .with_type(RelationshipType::SharedEmployer);
        Ok(self
            .backend
            .query_relationships(&query)?
            .iter()
            .any(|rel| match &rel.metadata {
                RelationshipMetadata::SharedEmployer {
                    employer_id,
                    overlap_months,
                    ..
                } => employer_id != company && *overlap_months > months,
                _ => false,
            }))
    }

    /// Runs shared-employment inference for each company.
    ///
    /// Failures are logged and counted; they never abort the pass.
    #[instrument(skip(self, companies), fields(companies = companies.len()))]
    pub fn run_inference_pass(&self, companies: &[EntityId]) -> InferenceReport {
        let start = Instant::now();
        let mut report = InferenceReport::default();

        for company in companies {
            report.companies_scanned += 1;
            match self.detect_shared_employment(company) {
                Ok(written) => report.edges_written += written,
                Err(e) => {
                    report.failures += 1;
                    tracing::warn!(company = %company, error = %e, "Shared employment inference failed");
                },
            }
        }

        report.duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        tracing::info!(
            companies_scanned = report.companies_scanned,
            edges_written = report.edges_written,
            failures = report.failures,
            duration_ms = report.duration_ms,
            "Inference pass complete"
        );
        report
    }

    // =========================================================================
    // Duplicates
    // =========================================================================

    /// Finds pairs of same-typed entities with near-identical names.
    ///
    /// Compares every name and alias of each pair (O(n^2) pairs) and keeps the
    /// best match. Results are ordered by similarity, highest first.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    #[instrument(skip(self))]
    pub fn find_duplicates(&self, entity_type: EntityType) -> Result<Vec<DuplicateCandidate>> {
        let entities = self.backend.query_entities(
            &EntityQuery::new()
                .with_type(entity_type)
                .with_limit(usize::MAX),
        )?;
        let names: Vec<Vec<(String, String)>> = entities
            .iter()
            .map(|e| {
                e.all_names()
                    .map(|n| (n.to_string(), normalize_name(n)))
                    .filter(|(_, normalized)| !normalized.is_empty())
                    .collect()
            })
            .collect();

        let indexed: Vec<(&Entity, &Vec<(String, String)>)> = entities.iter().zip(&names).collect();
        let mut candidates = Vec::new();
        for (i, (first, first_names)) in indexed.iter().enumerate() {
            for (second, second_names) in indexed.iter().skip(i + 1) {
                let Some((similarity, matched)) = best_match(first_names, second_names) else {
                    continue;
                };
                let action = if similarity >= self.config.merge_threshold {
                    DuplicateAction::Merge
                } else if similarity >= self.config.review_threshold {
                    DuplicateAction::Review
                } else {
                    continue;
                };
                let (first, second, matched) = if second.id < first.id {
                    (second, first, (matched.1, matched.0))
                } else {
                    (first, second, matched)
                };
                candidates.push(DuplicateCandidate {
                    first: first.id.clone(),
                    second: second.id.clone(),
                    entity_type,
                    similarity,
                    matched_names: matched,
                    action,
                });
            }
        }

        candidates.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then_with(|| (&a.first, &a.second).cmp(&(&b.first, &b.second)))
        });
        tracing::debug!(
            entities = entities.len(),
            candidates = candidates.len(),
            "Duplicate scan complete"
        );
        Ok(candidates)
    }

    /// Merges `merge` into `keep` and verifies nothing references `merge` afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for blank or identical ids,
    /// [`Error::NotFound`] if either entity is missing,
    /// [`Error::InconsistentState`] if verification fails, or a store error.
    #[instrument(skip(self), fields(keep = %keep, merge = %merge))]
    pub fn merge_duplicate_entities(&self, keep: &EntityId, merge: &EntityId) -> Result<MergeOutcome> {
        if keep.is_blank() || merge.is_blank() {
            return Err(Error::InvalidInput("merge requires two entity ids".to_string()));
        }
        if keep == merge {
            return Err(Error::InvalidInput(format!(
                "cannot merge entity {keep} into itself"
            )));
        }
        for id in [keep, merge] {
            if self.backend.get_entity(id)?.is_none() {
                return Err(Error::NotFound {
                    kind: "entity",
                    id: id.to_string(),
                });
            }
        }

        let outcome = self.backend.merge_entity_into(keep, merge)?;

        let leftovers = self
            .backend
            .query_relationships(&RelationshipQuery::new().involving(merge.clone()).include_inactive())?;
        if !leftovers.is_empty() {
            return Err(Error::InconsistentState(format!(
                "{} relationships still reference merged entity {merge}",
                leftovers.len()
            )));
        }
        if self.backend.get_entity(merge)?.is_some() {
            return Err(Error::InconsistentState(format!(
                "merged entity {merge} still exists"
            )));
        }

        tracing::info!(
            repointed = outcome.repointed,
            deactivated = outcome.deactivated,
            removed = outcome.removed,
            aliases_added = outcome.aliases_added,
            "Entities merged"
        );
        Ok(outcome)
    }
}

fn stint_overlap(a: &Stint, b: &Stint, today: NaiveDate) -> Option<Overlap> {
    let start = a.start.max(b.start);
    let end = a.end.unwrap_or(today).min(b.end.unwrap_or(today));
    if start > end {
        return None;
    }
    let recorded_end = match (a.end, b.end) {
        (None, None) => None,
        _ => Some(end),
    };
    Some(Overlap {
        start,
        end: recorded_end,
        months: months_between(start, end),
    })
}

/// Best similarity across two name lists, with the names that produced it.
fn best_match(
    first: &[(String, String)],
    second: &[(String, String)],
) -> Option<(f64, (String, String))> {
    let mut best: Option<(f64, (String, String))> = None;
    for (raw_a, norm_a) in first {
        for (raw_b, norm_b) in second {
            let similarity = name_similarity(norm_a, norm_b);
            if best.as_ref().is_none_or(|(top, _)| similarity > *top) {
                best = Some((similarity, (raw_a.clone(), raw_b.clone())));
            }
        }
    }
    best
}
