//! Time-windowed roll-ups over donation, lobbying and case edges.
//!
//! Every summary only counts active edges with a reporting date inside the
//! window. Quarterly buckets are chronological and only cover quarters with
//! activity.

use crate::models::{
    CaseSummary, DonationSummary, EntityId, EntityQuery, EntityType, IndustrySummary,
    LobbyingSummary, Quarter, QuarterBucket, RankedCounterparty, Relationship,
    RelationshipMetadata, RelationshipQuery, RelationshipType, Share, TimeWindow,
};
use crate::storage::traits::GraphBackend;
use crate::Result;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::instrument;

/// Number of ranked counterparties kept by default.
pub const DEFAULT_TOP_N: usize = 10;

const UNSPECIFIED: &str = "unspecified";

/// Running count and amount.
#[derive(Debug, Clone, Copy, Default)]
struct Totals {
    count: usize,
    amount: f64,
}

impl Totals {
    fn add(&mut self, amount: f64) {
        self.count += 1;
        self.amount += amount;
    }
}

/// Accumulates one summary's buckets.
#[derive(Debug, Default)]
struct Tally {
    total: Totals,
    quarterly: BTreeMap<Quarter, Totals>,
    counterparties: HashMap<EntityId, Totals>,
    categories: BTreeMap<String, Totals>,
}

impl Tally {
    fn record(&mut self, quarter: Quarter, amount: f64) {
        self.total.add(amount);
        self.quarterly.entry(quarter).or_default().add(amount);
    }

    fn counterparty(&mut self, id: &EntityId, amount: f64) {
        self.counterparties.entry(id.clone()).or_default().add(amount);
    }

    fn category(&mut self, label: Option<&str>, amount: f64) {
        let label = label
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(UNSPECIFIED);
        self.categories.entry(label.to_string()).or_default().add(amount);
    }

    fn quarterly(&self) -> Vec<QuarterBucket> {
        self.quarterly
            .iter()
            .map(|(quarter, totals)| QuarterBucket {
                period: quarter.to_string(),
                count: totals.count,
                amount: totals.amount,
            })
            .collect()
    }

    /// Shares by amount, or by count when nothing carries an amount.
    #[allow(clippy::cast_precision_loss)]
    fn shares(&self) -> Vec<Share> {
        let by_amount = self.categories.values().any(|t| t.amount > 0.0);
        let denominator: f64 = if by_amount {
            self.categories.values().map(|t| t.amount).sum()
        } else {
            self.categories.values().map(|t| t.count as f64).sum()
        };

        let mut shares: Vec<Share> = self
            .categories
            .iter()
            .map(|(label, totals)| {
                let numerator = if by_amount {
                    totals.amount
                } else {
                    totals.count as f64
                };
                Share {
                    label: label.clone(),
                    count: totals.count,
                    amount: totals.amount,
                    percentage: if denominator > 0.0 {
                        numerator / denominator * 100.0
                    } else {
                        0.0
                    },
                }
            })
            .collect();
        shares.sort_by(|a, b| {
            b.percentage
                .total_cmp(&a.percentage)
                .then_with(|| a.label.cmp(&b.label))
        });
        shares
    }
}

/// Read-only reporting over a graph store.
pub struct DataAggregator<B: GraphBackend> {
    backend: Arc<B>,
    top_n: usize,
}

impl<B: GraphBackend> DataAggregator<B> {
    /// Creates an aggregator keeping [`DEFAULT_TOP_N`] ranked counterparties.
    #[must_use]
    pub const fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            top_n: DEFAULT_TOP_N,
        }
    }

    /// Sets how many ranked counterparties each summary keeps.
    #[must_use]
    pub const fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    /// Donations made by the entity within the window.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    #[instrument(skip(self))]
    pub fn donation_summary(&self, entity: &EntityId, window: TimeWindow) -> Result<DonationSummary> {
        let mut tally = Tally::default();
        self.tally_donations(entity, window, &mut tally)?;

        Ok(DonationSummary {
            entity_id: entity.clone(),
            window,
            total_count: tally.total.count,
            total_amount: tally.total.amount,
            quarterly: tally.quarterly(),
            top_recipients: self.ranked(&tally)?,
            party_breakdown: tally.shares(),
        })
    }

    /// Lobbying filings involving the entity within the window.
    ///
    /// Issue shares are by filing count; a filing with several issues counts
    /// once per issue.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    #[instrument(skip(self))]
    pub fn lobbying_summary(&self, entity: &EntityId, window: TimeWindow) -> Result<LobbyingSummary> {
        let query = RelationshipQuery::new()
            .involving(entity.clone())
            .with_type(RelationshipType::Lobbying);

        let mut tally = Tally::default();
        for (quarter, rel) in self.in_window(&query, window)? {
            let RelationshipMetadata::Lobbying { amount, issues, .. } = &rel.metadata else {
                continue;
            };
            let amount = amount.unwrap_or(0.0);
            tally.record(quarter, amount);
            if let Some(other) = rel.other_end(entity) {
                tally.counterparty(other, amount);
            }
            if issues.is_empty() {
                tally.category(None, 0.0);
            }
            for issue in issues {
                tally.category(Some(issue), 0.0);
            }
        }

        Ok(LobbyingSummary {
            entity_id: entity.clone(),
            window,
            total_filings: tally.total.count,
            total_amount: tally.total.amount,
            quarterly: tally.quarterly(),
            top_counterparties: self.ranked(&tally)?,
            issue_breakdown: tally.shares(),
        })
    }

    /// Court case involvement of the entity within the window.
    ///
    /// Opponents are the counterparties of adversarial-counsel edges.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    #[instrument(skip(self))]
    pub fn case_summary(&self, entity: &EntityId, window: TimeWindow) -> Result<CaseSummary> {
        let query = RelationshipQuery::new()
            .involving(entity.clone())
            .with_types(&[RelationshipType::SameCase, RelationshipType::AdversarialCounsel]);

        let mut tally = Tally::default();
        let mut cases = BTreeSet::new();
        for (quarter, rel) in self.in_window(&query, window)? {
            match &rel.metadata {
                RelationshipMetadata::SameCase {
                    case_number, role, ..
                } => {
                    cases.insert(case_number.trim().to_uppercase());
                    tally.category(role.as_deref(), 0.0);
                },
                RelationshipMetadata::AdversarialCounsel { case_number, .. } => {
                    cases.insert(case_number.trim().to_uppercase());
                    tally.category(Some("adversarial counsel"), 0.0);
                    if let Some(other) = rel.other_end(entity) {
                        tally.counterparty(other, 0.0);
                    }
                },
                _ => continue,
            }
            tally.record(quarter, 0.0);
        }

        Ok(CaseSummary {
            entity_id: entity.clone(),
            window,
            distinct_cases: cases.len(),
            total_involvements: tally.total.count,
            quarterly: tally.quarterly(),
            top_opponents: self.ranked(&tally)?,
            role_breakdown: tally.shares(),
        })
    }

    /// Donations from every organization or contractor tagged with the industry.
    ///
    /// The industry is matched exactly against the `industry` metadata key.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    #[instrument(skip(self))]
    pub fn industry_summary(&self, industry: &str, window: TimeWindow) -> Result<IndustrySummary> {
        let mut members = Vec::new();
        for entity_type in [EntityType::Organization, EntityType::Contractor] {
            let query = EntityQuery::new()
                .with_type(entity_type)
                .with_metadata("industry", industry)
                .with_limit(usize::MAX);
            members.extend(self.backend.query_entities(&query)?);
        }

        let mut tally = Tally::default();
        for member in &members {
            self.tally_donations(&member.id, window, &mut tally)?;
        }
        tracing::debug!(members = members.len(), donations = tally.total.count, "Industry roll-up");

        Ok(IndustrySummary {
            industry: industry.to_string(),
            window,
            member_count: members.len(),
            total_count: tally.total.count,
            total_amount: tally.total.amount,
            quarterly: tally.quarterly(),
            top_recipients: self.ranked(&tally)?,
            party_breakdown: tally.shares(),
        })
    }

    fn tally_donations(&self, donor: &EntityId, window: TimeWindow, tally: &mut Tally) -> Result<()> {
        let query = RelationshipQuery::new()
            .from(donor.clone())
            .with_type(RelationshipType::Donation);
        for (quarter, rel) in self.in_window(&query, window)? {
            let RelationshipMetadata::Donation { amount, party, .. } = &rel.metadata else {
                continue;
            };
            tally.record(quarter, *amount);
            tally.counterparty(&rel.target, *amount);
            tally.category(party.as_deref(), *amount);
        }
        Ok(())
    }

    /// Active matches dated inside the window, with their quarter.
    fn in_window(
        &self,
        query: &RelationshipQuery,
        window: TimeWindow,
    ) -> Result<Vec<(Quarter, Relationship)>> {
        Ok(self
            .backend
            .query_relationships(query)?
            .into_iter()
            .filter(|rel| rel.is_active)
            .filter_map(|rel| {
                let date = rel.metadata.reporting_date()?;
                window.contains(date).then_some((Quarter::of(date), rel))
            })
            .collect())
    }

    /// Top counterparties by amount, then count, then id.
    fn ranked(&self, tally: &Tally) -> Result<Vec<RankedCounterparty>> {
        let mut ranked: Vec<(&EntityId, &Totals)> = tally.counterparties.iter().collect();
        ranked.sort_by(|(a_id, a), (b_id, b)| {
            b.amount
                .total_cmp(&a.amount)
                .then_with(|| b.count.cmp(&a.count))
                .then_with(|| a_id.cmp(b_id))
        });

        ranked
            .into_iter()
            .take(self.top_n)
            .map(|(id, totals)| {
                let name = self
                    .backend
                    .get_entity(id)?
                    .map_or_else(|| id.to_string(), |e| e.name);
                Ok(RankedCounterparty {
                    entity_id: id.clone(),
                    name,
                    count: totals.count,
                    amount: totals.amount,
                })
            })
            .collect()
    }
}
