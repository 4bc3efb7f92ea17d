//! Property-based tests for path search and scoring.
//!
//! Uses proptest to verify invariants across random inputs:
//! - Every discovered path is simple and within the depth limit
//! - Every discovered path connects the requested endpoints
//! - Age decay never increases with age
//! - Name similarity is bounded, symmetric and reflexive
//! - Risk scores never go negative for non-adversarial edges

// Property tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use chrono::{Days, NaiveDate};
use conflict_graph::models::{
    DataSource, Entity, EntityId, EntityType, PathOptions, Relationship, RelationshipMetadata,
    RiskLevel,
};
use conflict_graph::services::{GraphService, RiskCalculator, name_similarity, normalize_name};
use conflict_graph::storage::InMemoryGraphBackend;
use proptest::prelude::*;

fn node(i: usize) -> EntityId {
    EntityId::new(format!("n{i:02}"))
}

/// Builds a service over `count` nodes joined by the given employment edges.
fn graph(count: usize, edges: &[(usize, usize)]) -> GraphService<InMemoryGraphBackend> {
    let service = GraphService::new(InMemoryGraphBackend::new());
    for i in 0..count {
        service
            .upsert_entity(&Entity::new(node(i), EntityType::Neutral, format!("Node {i}")))
            .unwrap();
    }
    for &(a, b) in edges {
        if a == b {
            continue;
        }
        service
            .upsert_relationship(&Relationship::new(
                node(a),
                node(b),
                RelationshipMetadata::employment(None, None, None),
                DataSource::Manual,
            ))
            .unwrap();
    }
    service
}

fn edges_strategy(count: usize) -> impl Strategy<Value = Vec<(usize, usize)>> {
    prop::collection::vec((0..count, 0..count), 0..24)
}

// ============================================================================
// Path Search
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: paths are simple, bounded by depth, and join source to target.
    #[test]
    fn prop_paths_are_simple_and_bounded(
        edges in edges_strategy(8),
        depth in 1usize..=4,
        source in 0usize..8,
        target in 0usize..8,
    ) {
        prop_assume!(source != target);
        let service = graph(8, &edges);
        let options = PathOptions::default().with_max_depth(depth).bypassing_cache();

        let paths = service.find_paths(&node(source), &node(target), &options).unwrap();
        for path in &paths {
            prop_assert!(path.len() <= depth);
            prop_assert!(!path.is_empty());
            prop_assert!(path.is_simple());
            prop_assert_eq!(path.nodes.first(), Some(&node(source)));
            prop_assert_eq!(path.head(), Some(&node(target)));
        }
    }

    /// Property: raising the depth limit never loses paths.
    #[test]
    fn prop_deeper_search_finds_superset(
        edges in edges_strategy(6),
        depth in 1usize..=3,
    ) {
        let service = graph(6, &edges);
        let shallow_options = PathOptions::default().with_max_depth(depth).bypassing_cache();
        let deep_options = PathOptions::default().with_max_depth(depth + 1).bypassing_cache();
        let shallow = service.find_paths(&node(0), &node(5), &shallow_options).unwrap();
        let deep = service.find_paths(&node(0), &node(5), &deep_options).unwrap();
        prop_assert!(deep.len() >= shallow.len());
        for path in &shallow {
            prop_assert!(deep.contains(path));
        }
    }

    /// Property: analysis of employment-only graphs is never negative, and
    /// the level agrees with the score.
    #[test]
    fn prop_analysis_level_matches_score(edges in edges_strategy(6)) {
        let service = graph(6, &edges);
        let assessment = service
            .analyze_conflict(&node(0), &node(5), &PathOptions::default())
            .unwrap();
        prop_assert!(assessment.risk_score >= 0.0);
        prop_assert_eq!(
            assessment.risk_level,
            service.calculator().determine_level(assessment.risk_score)
        );
        if assessment.total_paths == 0 {
            prop_assert_eq!(assessment.risk_level, RiskLevel::Green);
        }
    }
}

// ============================================================================
// Scoring
// ============================================================================

proptest! {
    /// Property: the age multiplier is non-increasing in age and stays in (0, 1].
    #[test]
    fn prop_age_multiplier_monotone(younger in 0u64..8000, extra in 0u64..8000) {
        let today = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let recent = today - Days::new(younger);
        let older = recent - Days::new(extra);

        let m_recent = RiskCalculator::age_multiplier(Some(recent), today);
        let m_older = RiskCalculator::age_multiplier(Some(older), today);
        prop_assert!(m_older <= m_recent);
        prop_assert!(m_recent <= 1.0 && m_older > 0.0);
    }

    /// Property: future-dated events count as current.
    #[test]
    fn prop_future_events_are_current(ahead in 0u64..5000) {
        let today = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let future = today + Days::new(ahead);
        let multiplier = RiskCalculator::age_multiplier(Some(future), today);
        prop_assert!((multiplier - 1.0).abs() < f64::EPSILON);
    }
}

// ============================================================================
// Name Similarity
// ============================================================================

proptest! {
    /// Property: similarity is bounded, symmetric and reflexive.
    #[test]
    fn prop_similarity_bounds(a in "[a-z ]{0,20}", b in "[a-z ]{0,20}") {
        let ab = name_similarity(&a, &b);
        let ba = name_similarity(&b, &a);
        prop_assert!((0.0..=1.0).contains(&ab));
        prop_assert!((ab - ba).abs() < 1e-12);
        prop_assert!((name_similarity(&a, &a) - 1.0).abs() < f64::EPSILON);
    }

    /// Property: normalization is idempotent.
    #[test]
    fn prop_normalize_idempotent(s in "[A-Za-z0-9 .,&'-]{0,40}") {
        let once = normalize_name(&s);
        prop_assert_eq!(normalize_name(&once), once.clone());
        prop_assert!(!once.starts_with(' ') && !once.ends_with(' '));
        prop_assert!(!once.contains("  "));
    }
}
