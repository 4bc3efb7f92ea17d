//! Reporting roll-ups over the graph.

use super::graph::EntityId;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Inclusive date window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// First day included.
    pub start: NaiveDate,
    /// Last day included.
    pub end: NaiveDate,
}

impl TimeWindow {
    /// Creates a window, swapping the bounds if given in reverse.
    #[must_use]
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    /// Window covering the given number of days up to and including `end`.
    #[must_use]
    pub fn trailing_days(end: NaiveDate, days: u32) -> Self {
        Self::new(end - chrono::Days::new(u64::from(days)), end)
    }

    /// Returns true if the date lies in the window.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Calendar quarter, ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Quarter {
    /// Calendar year.
    pub year: i32,
    /// Quarter number, 1 to 4.
    pub quarter: u32,
}

impl Quarter {
    /// Quarter containing the date.
    #[must_use]
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            quarter: date.month0() / 3 + 1,
        }
    }
}

impl fmt::Display for Quarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-Q{}", self.year, self.quarter)
    }
}

/// Activity in one quarter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuarterBucket {
    /// Label such as `2024-Q3`.
    pub period: String,
    /// Number of records.
    pub count: usize,
    /// Summed amount in USD (zero when records carry none).
    pub amount: f64,
}

/// A counterparty ranked by volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCounterparty {
    /// Counterparty entity.
    pub entity_id: EntityId,
    /// Display name.
    pub name: String,
    /// Number of records.
    pub count: usize,
    /// Summed amount in USD.
    pub amount: f64,
}

/// Share of a category in a breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Share {
    /// Category label.
    pub label: String,
    /// Number of records.
    pub count: usize,
    /// Summed amount in USD.
    pub amount: f64,
    /// Percentage of the breakdown total, 0 to 100.
    pub percentage: f64,
}

/// Donation roll-up for one donor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DonationSummary {
    /// Donor.
    pub entity_id: EntityId,
    /// Window covered.
    pub window: TimeWindow,
    /// Number of donations.
    pub total_count: usize,
    /// Summed amount in USD.
    pub total_amount: f64,
    /// Chronological quarterly buckets.
    pub quarterly: Vec<QuarterBucket>,
    /// Top recipients by amount.
    pub top_recipients: Vec<RankedCounterparty>,
    /// Share by recipient party.
    pub party_breakdown: Vec<Share>,
}

/// Lobbying roll-up for one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LobbyingSummary {
    /// Entity.
    pub entity_id: EntityId,
    /// Window covered.
    pub window: TimeWindow,
    /// Number of filings.
    pub total_filings: usize,
    /// Summed reported amount in USD.
    pub total_amount: f64,
    /// Chronological quarterly buckets.
    pub quarterly: Vec<QuarterBucket>,
    /// Top counterparties by amount.
    pub top_counterparties: Vec<RankedCounterparty>,
    /// Share by issue area.
    pub issue_breakdown: Vec<Share>,
}

/// Case involvement roll-up for one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseSummary {
    /// Entity.
    pub entity_id: EntityId,
    /// Window covered.
    pub window: TimeWindow,
    /// Distinct case numbers.
    pub distinct_cases: usize,
    /// Number of case edges.
    pub total_involvements: usize,
    /// Chronological quarterly buckets.
    pub quarterly: Vec<QuarterBucket>,
    /// Most frequent adversarial counterparties.
    pub top_opponents: Vec<RankedCounterparty>,
    /// Share by role on the case.
    pub role_breakdown: Vec<Share>,
}

/// Donation roll-up for an industry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndustrySummary {
    /// Industry label as stored in entity metadata.
    pub industry: String,
    /// Window covered.
    pub window: TimeWindow,
    /// Organizations tagged with the industry.
    pub member_count: usize,
    /// Number of donations.
    pub total_count: usize,
    /// Summed amount in USD.
    pub total_amount: f64,
    /// Chronological quarterly buckets.
    pub quarterly: Vec<QuarterBucket>,
    /// Top recipients by amount.
    pub top_recipients: Vec<RankedCounterparty>,
    /// Share by recipient party.
    pub party_breakdown: Vec<Share>,
}
