//! Configuration management.
//!
//! Configuration is read from a TOML file and then overlaid with
//! `CONFLICT_GRAPH_*` environment variables.
//!
//! ```toml
//! data_dir = "/var/lib/conflict-graph"
//!
//! [search]
//! default_max_depth = 3
//! max_depth_limit = 6
//! cache_ttl_secs = 604800
//!
//! [scoring]
//! green_threshold = 8.0
//! red_threshold = 15.0
//!
//! [scoring.weights]
//! employment = 10
//!
//! [jobs]
//! cache_sweep_interval_secs = 3600
//! companies = ["acme"]
//!
//! [logging]
//! filter = "conflict_graph=debug"
//! format = "json"
//! ```

mod scoring;

pub use scoring::{LobbyingPoints, RelationshipWeights, ScoringConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Prefix of every environment override.
pub const ENV_PREFIX: &str = "CONFLICT_GRAPH_";

/// Main configuration for the conflict graph.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictGraphConfig {
    /// Directory holding the `SQLite` database.
    pub data_dir: PathBuf,
    /// Path search settings.
    pub search: SearchConfig,
    /// Scoring policy.
    pub scoring: ScoringConfig,
    /// Inference thresholds.
    pub inference: InferenceConfig,
    /// Scheduled job settings.
    pub jobs: JobsConfig,
    /// Logging settings, resolved by [`crate::observability`].
    pub logging: LoggingSettings,
}

/// Path search settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Depth used when a caller does not pick one.
    pub default_max_depth: usize,
    /// Largest depth a caller may request.
    pub max_depth_limit: usize,
    /// Lifetime of conflict-path cache entries.
    pub cache_ttl_secs: i64,
}

impl SearchConfig {
    /// Hard ceiling for `max_depth_limit`; path counts grow exponentially with depth.
    pub const MAX_DEPTH_CEILING: usize = 10;
    /// Seven days.
    pub const DEFAULT_CACHE_TTL_SECS: i64 = 7 * 24 * 60 * 60;

    /// Forces the values into their valid ranges.
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.max_depth_limit = self.max_depth_limit.clamp(1, Self::MAX_DEPTH_CEILING);
        self.default_max_depth = self.default_max_depth.clamp(1, self.max_depth_limit);
        self.cache_ttl_secs = self.cache_ttl_secs.max(0);
        self
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_max_depth: 3,
            max_depth_limit: 6,
            cache_ttl_secs: Self::DEFAULT_CACHE_TTL_SECS,
        }
    }
}

/// Confidence values and similarity thresholds used by inference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Confidence recorded on inferred co-authorship edges.
    pub coauthorship_confidence: f64,
    /// Confidence recorded on inferred shared-employer edges.
    pub shared_employment_confidence: f64,
    /// Confidence recorded on event attendance edges.
    pub event_confidence: f64,
    /// Similarity at or above which duplicates should be merged.
    pub merge_threshold: f64,
    /// Similarity at or above which duplicates should be reviewed.
    pub review_threshold: f64,
}

impl InferenceConfig {
    /// Forces the values into [0, 1] with `review_threshold <= merge_threshold`.
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.coauthorship_confidence = self.coauthorship_confidence.clamp(0.0, 1.0);
        self.shared_employment_confidence = self.shared_employment_confidence.clamp(0.0, 1.0);
        self.event_confidence = self.event_confidence.clamp(0.0, 1.0);
        self.merge_threshold = self.merge_threshold.clamp(0.0, 1.0);
        self.review_threshold = self.review_threshold.clamp(0.0, self.merge_threshold);
        self
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            coauthorship_confidence: 0.95,
            shared_employment_confidence: 0.85,
            event_confidence: 1.0,
            merge_threshold: 0.95,
            review_threshold: 0.85,
        }
    }
}

/// Scheduled maintenance job settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// Seconds between expired-cache sweeps.
    pub cache_sweep_interval_secs: u64,
    /// Seconds between shared-employment inference passes.
    pub inference_interval_secs: u64,
    /// Organizations scanned by the inference pass.
    pub companies: Vec<String>,
}

impl JobsConfig {
    /// Shortest interval accepted for either job.
    pub const MIN_INTERVAL_SECS: u64 = 60;

    /// Forces intervals to at least [`Self::MIN_INTERVAL_SECS`].
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.cache_sweep_interval_secs =
            self.cache_sweep_interval_secs.max(Self::MIN_INTERVAL_SECS);
        self.inference_interval_secs = self.inference_interval_secs.max(Self::MIN_INTERVAL_SECS);
        self
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            cache_sweep_interval_secs: 60 * 60,
            inference_interval_secs: 7 * 24 * 60 * 60,
            companies: Vec::new(),
        }
    }
}

/// Logging section of the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive, e.g. `info` or `conflict_graph=debug`.
    pub filter: Option<String>,
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// Append log output to this file instead of stderr.
    pub file: Option<PathBuf>,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ConfigFile {
    /// Data directory.
    pub data_dir: Option<String>,
    /// Search section.
    pub search: Option<SearchConfig>,
    /// Scoring section.
    pub scoring: Option<ScoringConfig>,
    /// Inference section.
    pub inference: Option<InferenceConfig>,
    /// Jobs section.
    pub jobs: Option<JobsConfig>,
    /// Logging section.
    pub logging: Option<LoggingSettings>,
}

impl Default for ConflictGraphConfig {
    fn default() -> Self {
        Self {
            data_dir: crate::storage::default_data_dir(),
            search: SearchConfig::default(),
            scoring: ScoringConfig::default(),
            inference: InferenceConfig::default(),
            jobs: JobsConfig::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl ConflictGraphConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// scoring thresholds are out of order.
    pub fn load_from_file(path: &Path) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            crate::Error::operation("read_config_file", format!("{}: {e}", path.display()))
        })?;

        Self::parse(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid configuration.
    pub fn parse(contents: &str) -> crate::Result<Self> {
        let file: ConfigFile =
            toml::from_str(contents).map_err(|e| crate::Error::operation("parse_config_file", e))?;

        if let Some(problem) = file.scoring.as_ref().and_then(ScoringConfig::validate) {
            return Err(crate::Error::InvalidInput(problem));
        }
        Ok(Self::from_config_file(file))
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the following paths in order:
    /// 1. Platform-specific config dir (`~/Library/Application Support/conflict-graph/` on macOS)
    /// 2. XDG config dir (`~/.config/conflict-graph/` for Unix compatibility)
    ///
    /// Returns default configuration if no config file is found.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };

        let platform_config = base_dirs
            .config_dir()
            .join("conflict-graph")
            .join("config.toml");
        if platform_config.exists() {
            match Self::load_from_file(&platform_config) {
                Ok(config) => return config,
                Err(e) => tracing::warn!(
                    path = %platform_config.display(),
                    error = %e,
                    "Ignoring unreadable config file"
                ),
            }
        }

        let xdg_config = base_dirs
            .home_dir()
            .join(".config")
            .join("conflict-graph")
            .join("config.toml");
        if xdg_config.exists() {
            match Self::load_from_file(&xdg_config) {
                Ok(config) => return config,
                Err(e) => tracing::warn!(
                    path = %xdg_config.display(),
                    error = %e,
                    "Ignoring unreadable config file"
                ),
            }
        }

        Self::default()
    }

    /// Converts a `ConfigFile` to `ConflictGraphConfig`.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(data_dir) = file.data_dir {
            config.data_dir = PathBuf::from(data_dir);
        }
        if let Some(search) = file.search {
            config.search = search.clamped();
        }
        if let Some(scoring) = file.scoring {
            config.scoring = scoring.clamped();
        }
        if let Some(inference) = file.inference {
            config.inference = inference.clamped();
        }
        if let Some(jobs) = file.jobs {
            config.jobs = jobs.clamped();
        }
        if let Some(logging) = file.logging {
            config.logging = logging;
        }

        config
    }

    /// Applies `CONFLICT_GRAPH_*` overrides from the process environment.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Applies `CONFLICT_GRAPH_*` overrides read through `lookup`.
    ///
    /// Reads:
    /// - `CONFLICT_GRAPH_DATA_DIR`
    /// - `CONFLICT_GRAPH_MAX_DEPTH`, `CONFLICT_GRAPH_MAX_DEPTH_LIMIT`
    /// - `CONFLICT_GRAPH_CACHE_TTL_SECS`
    /// - `CONFLICT_GRAPH_CACHE_SWEEP_INTERVAL_SECS`, `CONFLICT_GRAPH_INFERENCE_INTERVAL_SECS`
    /// - `CONFLICT_GRAPH_INFERENCE_COMPANIES` (comma-separated)
    ///
    /// Unparseable values are ignored. Results are clamped to valid ranges.
    #[must_use]
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(dir) = var("DATA_DIR").filter(|d| !d.trim().is_empty()) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(limit) = var("MAX_DEPTH_LIMIT").and_then(|v| v.parse::<usize>().ok()) {
            self.search.max_depth_limit = limit;
        }
        if let Some(depth) = var("MAX_DEPTH").and_then(|v| v.parse::<usize>().ok()) {
            self.search.default_max_depth = depth;
        }
        if let Some(ttl) = var("CACHE_TTL_SECS").and_then(|v| v.parse::<i64>().ok()) {
            self.search.cache_ttl_secs = ttl;
        }
        if let Some(secs) = var("CACHE_SWEEP_INTERVAL_SECS").and_then(|v| v.parse::<u64>().ok()) {
            self.jobs.cache_sweep_interval_secs = secs;
        }
        if let Some(secs) = var("INFERENCE_INTERVAL_SECS").and_then(|v| v.parse::<u64>().ok()) {
            self.jobs.inference_interval_secs = secs;
        }
        if let Some(companies) = var("INFERENCE_COMPANIES") {
            self.jobs.companies = companies
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(String::from)
                .collect();
        }

        self.search = self.search.clamped();
        self.jobs = self.jobs.clamped();
        self
    }

    /// Sets the data directory.
    #[must_use]
    pub fn with_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_dir = path.into();
        self
    }

    /// Path of the `SQLite` database inside the data directory.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(crate::storage::DEFAULT_DB_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ConflictGraphConfig::default();
        assert_eq!(config.search.default_max_depth, 3);
        assert_eq!(config.search.max_depth_limit, 6);
        assert_eq!(config.search.cache_ttl_secs, 604_800);
        assert_eq!(config.jobs.cache_sweep_interval_secs, 3600);
        assert_eq!(config.jobs.inference_interval_secs, 604_800);
        assert!((config.inference.merge_threshold - 0.95).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_full_file() {
        let config = ConflictGraphConfig::parse(
            r#"
            data_dir = "/tmp/graph"

            [search]
            max_depth_limit = 4

            [scoring.weights]
            employment = 12

            [inference]
            merge_threshold = 0.9

            [jobs]
            companies = ["acme", "globex"]

            [logging]
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/graph"));
        assert_eq!(config.search.max_depth_limit, 4);
        assert_eq!(config.search.default_max_depth, 3);
        assert_eq!(config.scoring.weights.employment, 12);
        assert_eq!(config.scoring.weights.same_case, 8);
        assert!((config.inference.merge_threshold - 0.9).abs() < f64::EPSILON);
        assert!((config.inference.review_threshold - 0.85).abs() < f64::EPSILON);
        assert_eq!(config.jobs.companies, vec!["acme", "globex"]);
        assert_eq!(config.logging.format.as_deref(), Some("json"));
        assert_eq!(
            config.database_path(),
            PathBuf::from("/tmp/graph").join(crate::storage::DEFAULT_DB_FILE)
        );
    }

    #[test]
    fn test_parse_rejects_inverted_thresholds() {
        let result = ConflictGraphConfig::parse(
            r"
            [scoring]
            green_threshold = 20.0
            red_threshold = 10.0
            ",
        );
        assert!(matches!(result, Err(crate::Error::InvalidInput(_))));
    }

    #[test]
    fn test_parse_rejects_non_finite_threshold() {
        let result = ConflictGraphConfig::parse(
            r"
            [scoring]
            green_threshold = nan
            ",
        );
        assert!(matches!(result, Err(crate::Error::InvalidInput(_))));
    }

    #[test]
    fn test_parse_rejects_invalid_toml() {
        let result = ConflictGraphConfig::parse("data_dir = [");
        assert!(matches!(result, Err(crate::Error::OperationFailed { .. })));
    }

    #[test]
    fn test_search_clamping() {
        let search = SearchConfig {
            default_max_depth: 9,
            max_depth_limit: 50,
            cache_ttl_secs: -5,
        }
        .clamped();
        assert_eq!(search.max_depth_limit, SearchConfig::MAX_DEPTH_CEILING);
        assert_eq!(search.default_max_depth, 9);
        assert_eq!(search.cache_ttl_secs, 0);

        let search = SearchConfig {
            default_max_depth: 0,
            max_depth_limit: 0,
            cache_ttl_secs: 10,
        }
        .clamped();
        assert_eq!(search.max_depth_limit, 1);
        assert_eq!(search.default_max_depth, 1);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("CONFLICT_GRAPH_DATA_DIR", "/srv/graph"),
            ("CONFLICT_GRAPH_MAX_DEPTH", "4"),
            ("CONFLICT_GRAPH_CACHE_TTL_SECS", "120"),
            ("CONFLICT_GRAPH_CACHE_SWEEP_INTERVAL_SECS", "5"),
            ("CONFLICT_GRAPH_INFERENCE_COMPANIES", "acme, globex,,"),
            ("CONFLICT_GRAPH_INFERENCE_INTERVAL_SECS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let config = ConflictGraphConfig::default()
            .with_overrides_from(|key| vars.get(key).map(|v| (*v).to_string()));

        assert_eq!(config.data_dir, PathBuf::from("/srv/graph"));
        assert_eq!(config.search.default_max_depth, 4);
        assert_eq!(config.search.cache_ttl_secs, 120);
        assert_eq!(
            config.jobs.cache_sweep_interval_secs,
            JobsConfig::MIN_INTERVAL_SECS
        );
        assert_eq!(config.jobs.inference_interval_secs, 604_800);
        assert_eq!(config.jobs.companies, vec!["acme", "globex"]);
    }

    #[test]
    fn test_inference_clamping() {
        let inference = InferenceConfig {
            merge_threshold: 0.8,
            review_threshold: 0.9,
            coauthorship_confidence: 1.5,
            ..InferenceConfig::default()
        }
        .clamped();
        assert!((inference.review_threshold - 0.8).abs() < f64::EPSILON);
        assert!((inference.coauthorship_confidence - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[search]\ncache_ttl_secs = 60\n").unwrap();

        let config = ConflictGraphConfig::load_from_file(&path).unwrap();
        assert_eq!(config.search.cache_ttl_secs, 60);

        let missing = ConflictGraphConfig::load_from_file(&dir.path().join("nope.toml"));
        assert!(missing.is_err());
    }
}
