//! Application configuration, read from a RON file.
//!
//! Every section and field has a default, so a partial file (or none at
//! all) is fine:
//!
//! ```ron
//! (
//!     output_dir: "downloads",
//!     fetcher: (program: "python3", args: ["fetcher.py"], timeout_secs: 1200),
//!     scheduler: (queue_capacity: 10, max_concurrent: 3),
//!     log: (destination: both, level: "debug"),
//! )
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use docfetch_core::SchedulerConfig;
use docfetch_engine::{
    EngineSettings, InvokerSettings, ReaperSettings, ResolverSettings, ScoringRules,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::logging::LogDestination;

/// Upper bound for `reaper.stale_after_secs` (one year).
const MAX_STALE_AFTER_SECS: u64 = 365 * 24 * 60 * 60;
/// Upper bound for `reaper.cleanup_delay_secs` and `reaper.cleanup_jitter_secs`
/// (one week each).
const MAX_CLEANUP_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse config file {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Where a loaded configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    /// No file at this path; every value is a default.
    Defaults(PathBuf),
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::File(path) => write!(f, "config file {}", path.display()),
            ConfigSource::Defaults(path) => {
                write!(f, "defaults (no config file at {})", path.display())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub output_dir: PathBuf,
    pub artifact_extension: String,
    pub fetcher: FetcherConfig,
    pub scheduler: SchedulerSection,
    pub reaper: ReaperSection,
    pub resolver: ResolverSection,
    pub log: LogSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub timeout_secs: u64,
    pub success_sentinel: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSection {
    pub queue_capacity: usize,
    pub max_concurrent: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaperSection {
    pub cleanup_delay_secs: u64,
    pub cleanup_jitter_secs: u64,
    pub sweep_interval_secs: u64,
    pub stale_after_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverSection {
    pub recent_window_secs: u64,
    pub substantial_bytes: u64,
    pub min_score: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSection {
    pub destination: LogDestination,
    pub level: String,
    pub file: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("downloads"),
            artifact_extension: "pdf".to_string(),
            fetcher: FetcherConfig::default(),
            scheduler: SchedulerSection::default(),
            reaper: ReaperSection::default(),
            resolver: ResolverSection::default(),
            log: LogSection::default(),
        }
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("python3"),
            args: vec!["fetcher.py".to_string()],
            working_dir: None,
            timeout_secs: 20 * 60,
            success_sentinel: "SUCCESS".to_string(),
        }
    }
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            queue_capacity: 10,
            max_concurrent: 3,
        }
    }
}

impl Default for ReaperSection {
    fn default() -> Self {
        Self {
            cleanup_delay_secs: 5 * 60,
            cleanup_jitter_secs: 30,
            sweep_interval_secs: 10 * 60,
            stale_after_secs: 60 * 60,
        }
    }
}

impl Default for ResolverSection {
    fn default() -> Self {
        Self {
            recent_window_secs: 60,
            substantial_bytes: 1024 * 1024,
            min_score: 10,
        }
    }
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            destination: LogDestination::Terminal,
            level: "info".to_string(),
            file: PathBuf::from("docfetch.log"),
        }
    }
}

impl AppConfig {
    /// Reads and validates the config at `path`. A missing file yields the
    /// defaults. Runs before logging is set up, so the caller logs the
    /// returned source.
    pub fn load(path: &Path) -> Result<(Self, ConfigSource), ConfigError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok((Self::default(), ConfigSource::Defaults(path.to_path_buf())));
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let config = Self::parse(&text).map_err(|err| match err {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })?;
        Ok((config, ConfigSource::File(path.to_path_buf())))
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(text).map_err(|err| ConfigError::Parse {
            path: PathBuf::new(),
            message: err.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "scheduler.queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.scheduler.max_concurrent == 0 {
            return Err(ConfigError::Invalid(
                "scheduler.max_concurrent must be at least 1".to_string(),
            ));
        }
        if self.fetcher.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "fetcher.timeout_secs must be positive".to_string(),
            ));
        }
        if self.reaper.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "reaper.sweep_interval_secs must be positive".to_string(),
            ));
        }
        if self.reaper.stale_after_secs == 0 || self.reaper.stale_after_secs > MAX_STALE_AFTER_SECS
        {
            return Err(ConfigError::Invalid(format!(
                "reaper.stale_after_secs must be between 1 and {MAX_STALE_AFTER_SECS}"
            )));
        }
        for (name, value) in [
            ("reaper.cleanup_delay_secs", self.reaper.cleanup_delay_secs),
            ("reaper.cleanup_jitter_secs", self.reaper.cleanup_jitter_secs),
        ] {
            if value > MAX_CLEANUP_SECS {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be at most {MAX_CLEANUP_SECS}"
                )));
            }
        }
        if self.artifact_extension.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "artifact_extension must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        let stale_secs = i64::try_from(self.reaper.stale_after_secs.min(MAX_STALE_AFTER_SECS))
            .unwrap_or(i64::MAX);
        SchedulerConfig {
            queue_capacity: self.scheduler.queue_capacity,
            max_concurrent: self.scheduler.max_concurrent,
            stale_after: chrono::Duration::seconds(stale_secs),
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            invoker: InvokerSettings {
                program: self.fetcher.program.clone(),
                args: self.fetcher.args.clone(),
                working_dir: self.fetcher.working_dir.clone(),
                timeout: Duration::from_secs(self.fetcher.timeout_secs),
                success_sentinel: self.fetcher.success_sentinel.clone(),
            },
            resolver: ResolverSettings {
                output_dir: self.output_dir.clone(),
                extension: self.artifact_extension.trim_start_matches('.').to_string(),
                rules: ScoringRules {
                    recent_window: Duration::from_secs(self.resolver.recent_window_secs),
                    substantial_bytes: self.resolver.substantial_bytes,
                    min_score: self.resolver.min_score,
                },
            },
            reaper: ReaperSettings {
                cleanup_delay: Duration::from_secs(self.reaper.cleanup_delay_secs),
                cleanup_jitter: Duration::from_secs(self.reaper.cleanup_jitter_secs),
                sweep_interval: Duration::from_secs(self.reaper.sweep_interval_secs),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_document_is_all_defaults() {
        let config = AppConfig::parse("()").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.scheduler_config(), SchedulerConfig::default());
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = AppConfig::parse(
            r#"(
                output_dir: "/tmp/docs",
                fetcher: (program: "./fetch.sh", args: [], timeout_secs: 30),
                scheduler: (max_concurrent: 5),
                log: (destination: both, level: "debug"),
            )"#,
        )
        .unwrap();

        assert_eq!(config.output_dir, PathBuf::from("/tmp/docs"));
        assert_eq!(config.fetcher.success_sentinel, "SUCCESS");
        assert_eq!(config.scheduler.queue_capacity, 10);
        assert_eq!(config.scheduler.max_concurrent, 5);
        assert_eq!(config.log.destination, LogDestination::Both);

        let engine = config.engine_settings();
        assert_eq!(engine.invoker.program, PathBuf::from("./fetch.sh"));
        assert!(engine.invoker.args.is_empty());
        assert_eq!(engine.invoker.timeout, Duration::from_secs(30));
        assert_eq!(engine.resolver.output_dir, PathBuf::from("/tmp/docs"));
        assert_eq!(engine.reaper.sweep_interval, Duration::from_secs(600));
    }

    #[test]
    fn out_of_range_limits_are_rejected() {
        for text in [
            "(scheduler: (queue_capacity: 0))",
            "(scheduler: (max_concurrent: 0))",
            "(fetcher: (timeout_secs: 0))",
            "(reaper: (sweep_interval_secs: 0))",
            "(reaper: (cleanup_delay_secs: 18446744073709551615))",
            "(reaper: (cleanup_jitter_secs: 604801))",
        ] {
            assert!(
                matches!(AppConfig::parse(text), Err(ConfigError::Invalid(_))),
                "{text} should be invalid"
            );
        }
    }

    #[test]
    fn syntax_errors_are_parse_errors() {
        assert!(matches!(
            AppConfig::parse("(scheduler: "),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn missing_file_means_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let absent = dir.path().join("absent.ron");
        let (config, source) = AppConfig::load(&absent).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(source, ConfigSource::Defaults(absent.clone()));
        assert!(source.to_string().contains("absent.ron"));
    }

    #[test]
    fn load_reads_file_and_names_it_in_errors() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.ron");
        fs::write(&good, "(artifact_extension: \".PDF\")").unwrap();
        let (config, source) = AppConfig::load(&good).unwrap();
        assert_eq!(source, ConfigSource::File(good.clone()));
        assert_eq!(config.engine_settings().resolver.extension, "PDF");

        let bad = dir.path().join("bad.ron");
        fs::write(&bad, "not ron at all").unwrap();
        match AppConfig::load(&bad) {
            Err(err @ ConfigError::Parse { .. }) => {
                assert!(err.to_string().contains("bad.ron"));
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }
}
