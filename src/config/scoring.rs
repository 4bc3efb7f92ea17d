//! Scoring policy: relationship weights, level thresholds and lobbying points.

use crate::models::{RelationshipType, RiskLevel};
use serde::{Deserialize, Serialize};

/// Weight applied per relationship type when scoring a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationshipWeights {
    /// Employment.
    pub employment: i32,
    /// Same-case involvement.
    pub same_case: i32,
    /// Co-authorship.
    pub co_authorship: i32,
    /// Donation.
    pub donation: i32,
    /// Shared-event attendance.
    pub shared_event: i32,
    /// Adversarial counsel (negative).
    pub adversarial_counsel: i32,
    /// Lobbying.
    pub lobbying: i32,
    /// Shared employer.
    pub shared_employer: i32,
}

impl Default for RelationshipWeights {
    fn default() -> Self {
        Self {
            employment: RelationshipType::Employment.default_weight(),
            same_case: RelationshipType::SameCase.default_weight(),
            co_authorship: RelationshipType::CoAuthorship.default_weight(),
            donation: RelationshipType::Donation.default_weight(),
            shared_event: RelationshipType::SharedEvent.default_weight(),
            adversarial_counsel: RelationshipType::AdversarialCounsel.default_weight(),
            lobbying: RelationshipType::Lobbying.default_weight(),
            shared_employer: RelationshipType::SharedEmployer.default_weight(),
        }
    }
}

impl RelationshipWeights {
    /// Returns the weight for a relationship type.
    #[must_use]
    pub const fn weight(&self, relationship_type: RelationshipType) -> i32 {
        match relationship_type {
            RelationshipType::Employment => self.employment,
            RelationshipType::SameCase => self.same_case,
            RelationshipType::CoAuthorship => self.co_authorship,
            RelationshipType::Donation => self.donation,
            RelationshipType::SharedEvent => self.shared_event,
            RelationshipType::AdversarialCounsel => self.adversarial_counsel,
            RelationshipType::Lobbying => self.lobbying,
            RelationshipType::SharedEmployer => self.shared_employer,
        }
    }
}

/// Points awarded per lobbying tie on the 0-100 lobbying scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LobbyingPoints {
    /// Points per direct tie.
    pub direct: u32,
    /// Points per indirect tie.
    pub indirect: u32,
}

impl Default for LobbyingPoints {
    fn default() -> Self {
        Self {
            direct: 50,
            indirect: 20,
        }
    }
}

/// Scoring policy passed to the risk calculator at construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Per-type weights.
    pub weights: RelationshipWeights,
    /// Scores below this are green.
    pub green_threshold: f64,
    /// Scores at or above this are red.
    pub red_threshold: f64,
    /// Lobbying scale points.
    pub lobbying: LobbyingPoints,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: RelationshipWeights::default(),
            green_threshold: Self::DEFAULT_GREEN_THRESHOLD,
            red_threshold: Self::DEFAULT_RED_THRESHOLD,
            lobbying: LobbyingPoints::default(),
        }
    }
}

impl ScoringConfig {
    /// Default upper bound (exclusive) of the green band.
    pub const DEFAULT_GREEN_THRESHOLD: f64 = 8.0;
    /// Default lower bound (inclusive) of the red band.
    pub const DEFAULT_RED_THRESHOLD: f64 = 15.0;

    /// Maps a score to its level.
    #[must_use]
    pub fn level_for(&self, score: f64) -> RiskLevel {
        if score >= self.red_threshold {
            RiskLevel::Red
        } else if score >= self.green_threshold {
            RiskLevel::Yellow
        } else {
            RiskLevel::Green
        }
    }

    /// Forces usable thresholds: non-finite values fall back to the defaults
    /// and the green threshold never exceeds the red one.
    #[must_use]
    pub fn clamped(mut self) -> Self {
        if !self.green_threshold.is_finite() {
            self.green_threshold = Self::DEFAULT_GREEN_THRESHOLD;
        }
        if !self.red_threshold.is_finite() {
            self.red_threshold = Self::DEFAULT_RED_THRESHOLD;
        }
        self.green_threshold = self.green_threshold.min(self.red_threshold);
        self
    }

    /// Returns an error message if a threshold is not a finite number or the
    /// thresholds are out of order.
    #[must_use]
    pub fn validate(&self) -> Option<String> {
        if !self.green_threshold.is_finite() || !self.red_threshold.is_finite() {
            return Some(format!(
                "thresholds must be finite (green {}, red {})",
                self.green_threshold, self.red_threshold
            ));
        }
        if self.green_threshold > self.red_threshold {
            return Some(format!(
                "green threshold {} exceeds red threshold {}",
                self.green_threshold, self.red_threshold
            ));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_match_type_table() {
        let weights = RelationshipWeights::default();
        for t in RelationshipType::all() {
            assert_eq!(weights.weight(*t), t.default_weight());
        }
    }

    #[test]
    fn test_level_boundaries() {
        let scoring = ScoringConfig::default();
        assert_eq!(scoring.level_for(0.0), RiskLevel::Green);
        assert_eq!(scoring.level_for(7.99), RiskLevel::Green);
        assert_eq!(scoring.level_for(8.0), RiskLevel::Yellow);
        assert_eq!(scoring.level_for(14.99), RiskLevel::Yellow);
        assert_eq!(scoring.level_for(15.0), RiskLevel::Red);
        assert_eq!(scoring.level_for(-5.0), RiskLevel::Green);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let scoring: ScoringConfig = toml::from_str(
            r"
            red_threshold = 20.0
            [weights]
            donation = 3
            ",
        )
        .unwrap();
        assert_eq!(scoring.weights.donation, 3);
        assert_eq!(scoring.weights.employment, 10);
        assert!((scoring.green_threshold - 8.0).abs() < f64::EPSILON);
        assert_eq!(scoring.level_for(16.0), RiskLevel::Yellow);
        assert!(scoring.validate().is_none());
    }

    #[test]
    fn test_inverted_thresholds_clamp_to_red() {
        let scoring = ScoringConfig {
            green_threshold: 20.0,
            red_threshold: 10.0,
            ..ScoringConfig::default()
        };
        assert!(scoring.validate().is_some());

        let clamped = scoring.clamped();
        assert!((clamped.green_threshold - 10.0).abs() < f64::EPSILON);
        assert!(clamped.validate().is_none());
        assert_eq!(clamped.level_for(9.0), RiskLevel::Green);
        assert_eq!(clamped.level_for(10.0), RiskLevel::Red);
    }

    #[test]
    fn test_non_finite_thresholds_fall_back_to_defaults() {
        let scoring = ScoringConfig {
            green_threshold: f64::NAN,
            red_threshold: f64::INFINITY,
            ..ScoringConfig::default()
        };
        assert!(scoring.validate().is_some());

        let clamped = scoring.clamped();
        assert_eq!(clamped, ScoringConfig::default());
        assert_eq!(clamped.level_for(10.0), RiskLevel::Yellow);
    }
}
