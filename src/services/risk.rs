//! Risk scoring of paths between two parties.
//!
//! A path scores the sum of its edges, each edge contributing
//! `weight(type) x confidence x age_multiplier(event_date)`. The overall
//! score is the best single path; levels come from [`ScoringConfig`].
//!
//! | Age of event | Multiplier |
//! |--------------|------------|
//! | < 1 year | 1.0 |
//! | 1-3 years | 0.9 |
//! | 3-5 years | 0.7 |
//! | 5-10 years | 0.5 |
//! | >= 10 years | 0.3 |
//!
//! Ages are whole calendar years. Undated and future-dated edges count as
//! current.

use crate::config::ScoringConfig;
use crate::models::{
    AggregateRisk, Path, PathEdge, PartyRisk, RelationshipMetadata, RiskAssessment, RiskLevel,
};
use chrono::NaiveDate;
use std::fmt::Write as _;

/// Scores paths with a fixed scoring policy.
#[derive(Debug, Clone, Default)]
pub struct RiskCalculator {
    scoring: ScoringConfig,
}

impl RiskCalculator {
    /// Creates a calculator with the given policy.
    #[must_use]
    pub const fn new(scoring: ScoringConfig) -> Self {
        Self { scoring }
    }

    /// Returns the scoring policy.
    #[must_use]
    pub const fn scoring(&self) -> &ScoringConfig {
        &self.scoring
    }

    /// Decay factor for an event of the given date as seen on `today`.
    ///
    /// Age is counted in whole calendar years, so each band starts on the
    /// anniversary of the event.
    #[must_use]
    pub fn age_multiplier(event_date: Option<NaiveDate>, today: NaiveDate) -> f64 {
        let Some(years) = event_date.and_then(|date| today.years_since(date)) else {
            return 1.0;
        };

        match years {
            0 => 1.0,
            1..=2 => 0.9,
            3..=4 => 0.7,
            5..=9 => 0.5,
            _ => 0.3,
        }
    }

    /// Contribution of one edge.
    #[must_use]
    pub fn score_edge(&self, edge: &PathEdge, today: NaiveDate) -> f64 {
        f64::from(self.scoring.weights.weight(edge.relationship_type))
            * edge.confidence
            * Self::age_multiplier(edge.metadata.event_date(), today)
    }

    /// Score of one path.
    #[must_use]
    pub fn score_path(&self, path: &Path, today: NaiveDate) -> f64 {
        path.edges.iter().map(|e| self.score_edge(e, today)).sum()
    }

    /// Maps a score to a level.
    #[must_use]
    pub fn determine_level(&self, score: f64) -> RiskLevel {
        self.scoring.level_for(score)
    }

    /// Scores paths as of the current UTC date.
    #[must_use]
    pub fn calculate_risk_score(&self, paths: &[Path]) -> RiskAssessment {
        self.calculate_risk_score_at(paths, chrono::Utc::now().date_naive())
    }

    /// Scores paths as of `today`.
    #[must_use]
    pub fn calculate_risk_score_at(&self, paths: &[Path], today: NaiveDate) -> RiskAssessment {
        let all_path_scores: Vec<f64> = paths.iter().map(|p| self.score_path(p, today)).collect();

        let mut best: Option<(usize, f64)> = None;
        for (i, score) in all_path_scores.iter().copied().enumerate() {
            if best.is_none_or(|(_, top)| score > top) {
                best = Some((i, score));
            }
        }

        let risk_score = best.map_or(0.0, |(_, score)| score);
        let strongest_path = best.and_then(|(i, _)| paths.get(i)).cloned();
        let risk_level = self.determine_level(risk_score);
        let recommendation = self.recommendation(risk_level, strongest_path.as_ref());

        RiskAssessment {
            risk_score,
            risk_level,
            recommendation,
            total_paths: paths.len(),
            strongest_path,
            all_path_scores,
        }
    }

    /// Level-keyed guidance naming the heaviest edge of the strongest path.
    #[must_use]
    pub fn recommendation(&self, level: RiskLevel, strongest: Option<&Path>) -> String {
        let Some(path) = strongest.filter(|p| !p.is_empty()) else {
            return "No connections found between the parties. Clear to proceed.".to_string();
        };

        let mut text = match level {
            RiskLevel::Green => {
                "Low risk: only weak or dated connections were found. Clear to proceed.".to_string()
            },
            RiskLevel::Yellow => {
                "Moderate risk: disclose the connection to all parties before proceeding."
                    .to_string()
            },
            RiskLevel::Red => {
                "High risk: a strong connection was found. Recusal is recommended.".to_string()
            },
        };

        if let Some(edge) = self.heaviest_edge(path) {
            let _ = write!(
                text,
                " Strongest link: {} ({} -> {}).",
                describe_edge(&edge.metadata),
                edge.source,
                edge.target
            );
        }
        if path.len() > 1 {
            let _ = write!(text, " Connection spans {} hops.", path.len());
        }
        text
    }

    /// Reduces per-party risks to the worst case.
    #[must_use]
    pub fn calculate_aggregate_risk(&self, risks: &[PartyRisk]) -> AggregateRisk {
        let mut highest: Option<&PartyRisk> = None;
        for risk in risks {
            if highest.is_none_or(|h| risk.risk_score > h.risk_score) {
                highest = Some(risk);
            }
        }

        AggregateRisk {
            highest_level: risks
                .iter()
                .map(|r| r.risk_level)
                .max()
                .unwrap_or(RiskLevel::Green),
            highest_score: highest.map_or(0.0, |h| h.risk_score),
            highest_party: highest.map(|h| h.party.clone()),
            flagged_parties: risks
                .iter()
                .filter(|r| r.risk_level > RiskLevel::Green)
                .count(),
            total_parties: risks.len(),
        }
    }

    fn heaviest_edge<'a>(&self, path: &'a Path) -> Option<&'a PathEdge> {
        let mut heaviest: Option<&PathEdge> = None;
        for edge in &path.edges {
            let weight = self.scoring.weights.weight(edge.relationship_type);
            if heaviest
                .is_none_or(|h| weight > self.scoring.weights.weight(h.relationship_type))
            {
                heaviest = Some(edge);
            }
        }
        heaviest
    }
}

fn describe_edge(metadata: &RelationshipMetadata) -> String {
    match metadata {
        RelationshipMetadata::Employment {
            role,
            start_date,
            end_date,
        } => {
            let role = role.as_deref().unwrap_or("employee");
            match (start_date, end_date) {
                (_, None) => format!("current employment as {role}"),
                (Some(start), Some(end)) => format!("employment as {role} from {start} to {end}"),
                (None, Some(end)) => format!("employment as {role} until {end}"),
            }
        },
        RelationshipMetadata::SameCase {
            case_number, role, ..
        } => match role {
            Some(role) => format!("involvement in case {case_number} as {role}"),
            None => format!("involvement in case {case_number}"),
        },
        RelationshipMetadata::CoAuthorship { publications } => match publications.as_slice() {
            [only] => format!("co-authorship of \"{}\"", only.title),
            many => format!("co-authorship of {} publications", many.len()),
        },
        RelationshipMetadata::Donation {
            amount,
            recipient,
            date,
            ..
        } => {
            let mut text = format!("donation of ${amount:.2}");
            if let Some(recipient) = recipient {
                let _ = write!(text, " to {recipient}");
            }
            if let Some(date) = date {
                let _ = write!(text, " on {date}");
            }
            text
        },
        RelationshipMetadata::SharedEvent {
            event_name, role, ..
        } => match role {
            Some(role) => format!("attendance at {event_name} as {role}"),
            None => format!("attendance at {event_name}"),
        },
        RelationshipMetadata::AdversarialCounsel { case_number, .. } => {
            format!("opposing counsel in case {case_number}")
        },
        RelationshipMetadata::Lobbying {
            client, registrant, ..
        } => match (registrant, client) {
            (Some(registrant), Some(client)) => {
                format!("lobbying by {registrant} on behalf of {client}")
            },
            (None, Some(client)) => format!("lobbying on behalf of {client}"),
            (Some(registrant), None) => format!("lobbying by {registrant}"),
            (None, None) => "lobbying filing".to_string(),
        },
        RelationshipMetadata::SharedEmployer {
            employer_id,
            employer_name,
            overlap_months,
            ..
        } => {
            let employer = employer_name
                .clone()
                .unwrap_or_else(|| employer_id.to_string());
            format!("{overlap_months} months of overlapping employment at {employer}")
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DataSource, EntityId, Relationship};
    use test_case::test_case;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn today() -> NaiveDate {
        date(2024, 6, 1)
    }

    fn single_edge_path(metadata: RelationshipMetadata, confidence: f64) -> Path {
        let rel = Relationship::new(
            EntityId::new("a"),
            EntityId::new("b"),
            metadata,
            DataSource::Manual,
        )
        .with_confidence(confidence);
        let origin = EntityId::new("a");
        Path::start(origin.clone()).extended(PathEdge::from_relationship(&rel, &origin))
    }

    #[test]
    fn test_no_paths_is_green_zero() {
        let assessment = RiskCalculator::default().calculate_risk_score_at(&[], today());
        assert!(assessment.risk_score.abs() < f64::EPSILON);
        assert_eq!(assessment.risk_level, RiskLevel::Green);
        assert_eq!(assessment.total_paths, 0);
        assert!(assessment.strongest_path.is_none());
        assert!(assessment.recommendation.contains("Clear to proceed"));
    }

    #[test]
    fn test_current_employment_is_yellow() {
        let path = single_edge_path(RelationshipMetadata::employment(None, None, None), 1.0);
        let assessment = RiskCalculator::default().calculate_risk_score_at(&[path], today());
        assert!((assessment.risk_score - 10.0).abs() < 1e-9);
        assert_eq!(assessment.risk_level, RiskLevel::Yellow);
        assert!(assessment.recommendation.contains("disclose"));
        assert!(assessment.recommendation.contains("current employment"));
    }

    #[test]
    fn test_max_path_wins_and_first_tie_is_strongest() {
        let strong = single_edge_path(RelationshipMetadata::employment(None, None, None), 1.0);
        let weak = single_edge_path(RelationshipMetadata::employment(None, None, None), 0.4);
        let assessment = RiskCalculator::default()
            .calculate_risk_score_at(&[weak.clone(), strong.clone(), strong.clone()], today());

        assert!((assessment.risk_score - 10.0).abs() < 1e-9);
        assert_eq!(assessment.strongest_path, Some(strong));
        assert_eq!(assessment.all_path_scores.len(), 3);
        assert!((assessment.all_path_scores[0] - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_uses_configured_weight_not_recorded_weight() {
        let rel = Relationship::new(
            EntityId::new("a"),
            EntityId::new("b"),
            RelationshipMetadata::same_case("1:24-cv-1", None),
            DataSource::CourtRecords,
        )
        .with_weight(100);
        let path = Path::start(EntityId::new("a"))
            .extended(PathEdge::from_relationship(&rel, &EntityId::new("a")));
        let assessment = RiskCalculator::default().calculate_risk_score_at(&[path], today());
        assert!((assessment.risk_score - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_adversarial_counsel_lowers_path_score() {
        let a = EntityId::new("a");
        let b = EntityId::new("b");
        let c = EntityId::new("c");
        let employment = Relationship::new(
            a.clone(),
            b.clone(),
            RelationshipMetadata::employment(None, None, None),
            DataSource::Manual,
        );
        let adversarial = Relationship::new(
            b.clone(),
            c,
            RelationshipMetadata::AdversarialCounsel {
                case_number: "X-1".to_string(),
                date: None,
                outcome: None,
            },
            DataSource::CourtRecords,
        );
        let path = Path::start(a.clone())
            .extended(PathEdge::from_relationship(&employment, &a))
            .extended(PathEdge::from_relationship(&adversarial, &b));

        let score = RiskCalculator::default().score_path(&path, today());
        assert!((score - 5.0).abs() < 1e-9);
    }

    #[test_case(None, 1.0 ; "undated")]
    #[test_case(Some(date(2025, 1, 1)), 1.0 ; "future")]
    #[test_case(Some(date(2024, 5, 1)), 1.0 ; "one month")]
    #[test_case(Some(date(2023, 5, 1)), 0.9 ; "just over one year")]
    #[test_case(Some(date(2021, 5, 1)), 0.7 ; "just over three years")]
    #[test_case(Some(date(2019, 5, 1)), 0.5 ; "just over five years")]
    #[test_case(Some(date(2014, 5, 1)), 0.3 ; "just over ten years")]
    #[test_case(Some(date(1990, 1, 1)), 0.3 ; "decades")]
    fn test_age_multiplier(event: Option<NaiveDate>, expected: f64) {
        let multiplier = RiskCalculator::age_multiplier(event, today());
        assert!((multiplier - expected).abs() < f64::EPSILON);
    }

    #[test_case(date(2022, 6, 1), date(2023, 6, 1), 0.9 ; "one year no leap day")]
    #[test_case(date(2023, 6, 1), date(2024, 6, 1), 0.9 ; "one year across leap day")]
    #[test_case(date(2023, 6, 2), date(2024, 6, 1), 1.0 ; "day before first anniversary")]
    #[test_case(date(2020, 6, 1), date(2023, 6, 1), 0.7 ; "three years")]
    #[test_case(date(2020, 6, 2), date(2023, 6, 1), 0.9 ; "day before third anniversary")]
    #[test_case(date(2018, 6, 1), date(2023, 6, 1), 0.5 ; "five years")]
    #[test_case(date(2019, 6, 1), date(2024, 6, 1), 0.5 ; "five years two leap days")]
    #[test_case(date(2013, 6, 1), date(2023, 6, 1), 0.3 ; "ten years two leap days")]
    #[test_case(date(2014, 6, 1), date(2024, 6, 1), 0.3 ; "ten years three leap days")]
    #[test_case(date(2014, 6, 2), date(2024, 6, 1), 0.5 ; "day before tenth anniversary")]
    #[test_case(date(2020, 2, 29), date(2021, 2, 28), 1.0 ; "leap day event before anniversary")]
    #[test_case(date(2020, 2, 29), date(2021, 3, 1), 0.9 ; "leap day event after anniversary")]
    fn test_age_multiplier_anniversaries(event: NaiveDate, on: NaiveDate, expected: f64) {
        let multiplier = RiskCalculator::age_multiplier(Some(event), on);
        assert!((multiplier - expected).abs() < f64::EPSILON);
    }

    #[test_case(7.99, RiskLevel::Green ; "below green threshold")]
    #[test_case(8.0, RiskLevel::Yellow ; "at green threshold")]
    #[test_case(14.99, RiskLevel::Yellow ; "below red threshold")]
    #[test_case(15.0, RiskLevel::Red ; "at red threshold")]
    fn test_determine_level(score: f64, expected: RiskLevel) {
        assert_eq!(RiskCalculator::default().determine_level(score), expected);
    }

    #[test]
    fn test_old_employment_decays() {
        let path = single_edge_path(
            RelationshipMetadata::employment(
                Some("Partner".to_string()),
                Some(date(2005, 1, 1)),
                Some(date(2012, 1, 1)),
            ),
            1.0,
        );
        let assessment = RiskCalculator::default().calculate_risk_score_at(&[path], today());
        assert!((assessment.risk_score - 3.0).abs() < 1e-9);
        assert_eq!(assessment.risk_level, RiskLevel::Green);
        assert!(assessment.recommendation.contains("Partner"));
    }

    #[test]
    fn test_aggregate_risk() {
        let calculator = RiskCalculator::default();
        let risks = vec![
            PartyRisk {
                party: EntityId::new("p1"),
                risk_score: 3.0,
                risk_level: RiskLevel::Green,
            },
            PartyRisk {
                party: EntityId::new("p2"),
                risk_score: 16.0,
                risk_level: RiskLevel::Red,
            },
            PartyRisk {
                party: EntityId::new("p3"),
                risk_score: 9.0,
                risk_level: RiskLevel::Yellow,
            },
        ];

        let aggregate = calculator.calculate_aggregate_risk(&risks);
        assert_eq!(aggregate.highest_level, RiskLevel::Red);
        assert!((aggregate.highest_score - 16.0).abs() < f64::EPSILON);
        assert_eq!(aggregate.highest_party, Some(EntityId::new("p2")));
        assert_eq!(aggregate.flagged_parties, 2);
        assert_eq!(aggregate.total_parties, 3);

        let empty = calculator.calculate_aggregate_risk(&[]);
        assert_eq!(empty.highest_level, RiskLevel::Green);
        assert!(empty.highest_party.is_none());
    }
}
