//! Business logic services.
//!
//! Services orchestrate storage backends and provide high-level operations:
//! path search and conflict analysis, risk scoring, relationship inference
//! and reporting roll-ups.

mod aggregation;
mod graph;
mod relationship_detector;
mod risk;

pub use aggregation::{DEFAULT_TOP_N, DataAggregator};
pub use graph::GraphService;
pub use relationship_detector::{RelationshipDetector, name_similarity, normalize_name};
pub use risk::RiskCalculator;

pub use crate::models::PathOptions;
