//! Structured logging configuration.

use crate::config::LoggingSettings;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Environment variable holding an `EnvFilter` directive.
pub const LOG_FILTER_ENV: &str = "CONFLICT_GRAPH_LOG";
/// Environment variable selecting `pretty` or `json` output.
pub const LOG_FORMAT_ENV: &str = "CONFLICT_GRAPH_LOG_FORMAT";
/// Environment variable naming a log file.
pub const LOG_FILE_ENV: &str = "CONFLICT_GRAPH_LOG_FILE";

const DEFAULT_FILTER: &str = "warn,conflict_graph=info";
const VERBOSE_FILTER: &str = "info,conflict_graph=debug";

/// Output format of the fmt layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parses a format name, defaulting to pretty.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Resolved logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// `EnvFilter` directive.
    pub filter: String,
    /// Output format.
    pub format: LogFormat,
    /// Optional file to append to.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
            format: LogFormat::Pretty,
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Resolves logging from config settings and the process environment.
    ///
    /// Precedence: environment, then config file, then the default. `verbose`
    /// raises the default filter but never overrides an explicit one.
    #[must_use]
    pub fn from_settings(settings: Option<&LoggingSettings>, verbose: bool) -> Self {
        Self::resolve(settings, verbose, |key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_settings`] with an injectable variable lookup.
    #[must_use]
    pub fn resolve(
        settings: Option<&LoggingSettings>,
        verbose: bool,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

        let filter = non_empty(lookup(LOG_FILTER_ENV))
            .or_else(|| non_empty(settings.and_then(|s| s.filter.clone())))
            .unwrap_or_else(|| {
                if verbose {
                    VERBOSE_FILTER.to_string()
                } else {
                    DEFAULT_FILTER.to_string()
                }
            });

        let format = non_empty(lookup(LOG_FORMAT_ENV))
            .or_else(|| non_empty(settings.and_then(|s| s.format.clone())))
            .map_or(LogFormat::Pretty, |f| LogFormat::parse(&f));

        let file = non_empty(lookup(LOG_FILE_ENV))
            .map(PathBuf::from)
            .or_else(|| settings.and_then(|s| s.file.clone()));

        Self {
            filter,
            format,
            file,
        }
    }

    /// Builds the `EnvFilter`, falling back to the default on a bad directive.
    #[must_use]
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup<'a>(vars: &'a HashMap<&'a str, &'a str>) -> impl Fn(&str) -> Option<String> + 'a {
        move |key: &str| vars.get(key).map(|v| (*v).to_string())
    }

    #[test]
    fn test_defaults() {
        let vars = HashMap::new();
        let config = LoggingConfig::resolve(None, false, lookup(&vars));
        assert_eq!(config, LoggingConfig::default());

        let verbose = LoggingConfig::resolve(None, true, lookup(&vars));
        assert_eq!(verbose.filter, VERBOSE_FILTER);
    }

    #[test]
    fn test_env_beats_settings() {
        let settings = LoggingSettings {
            filter: Some("debug".to_string()),
            format: Some("pretty".to_string()),
            file: Some(PathBuf::from("/tmp/from-config.log")),
        };
        let vars: HashMap<&str, &str> = [
            (LOG_FILTER_ENV, "trace"),
            (LOG_FORMAT_ENV, "JSON"),
        ]
        .into_iter()
        .collect();

        let config = LoggingConfig::resolve(Some(&settings), true, lookup(&vars));
        assert_eq!(config.filter, "trace");
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.file, Some(PathBuf::from("/tmp/from-config.log")));
    }

    #[test]
    fn test_settings_beat_verbose() {
        let settings = LoggingSettings {
            filter: Some("error".to_string()),
            ..LoggingSettings::default()
        };
        let vars = HashMap::new();
        let config = LoggingConfig::resolve(Some(&settings), true, lookup(&vars));
        assert_eq!(config.filter, "error");
    }

    #[test]
    fn test_format_parse() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse(" Json "), LogFormat::Json);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("anything"), LogFormat::Pretty);
    }
}
