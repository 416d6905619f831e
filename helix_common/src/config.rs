//! Planner configuration and TOML loading.
//!
//! [`PlannerConfig`] is a serde `Deserialize` struct with explicit range
//! checks; [`ConfigLoader`] ties deserialisation and semantic validation
//! together so a loaded configuration is always a checked one.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::consts::{DEFAULT_QUEUE_SIZE, LOOKAHEAD_DEPTH, QUEUE_SIZE_MAX, QUEUE_SIZE_MIN};

/// Error type for configuration loading operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for the target type.
    #[error("invalid TOML in {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    /// A value is outside its accepted range.
    #[error("invalid planner configuration: {0}")]
    Invalid(String),
}

/// Trajectory-planner configuration.
///
/// # TOML Example
///
/// ```toml
/// [planner]
/// queue_size = 64
/// lookahead_depth = 10
/// enable_blend_arcs = false
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Motion queue capacity [segments]. Fixed at planner creation.
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,

    /// How far back the final-velocity optimisation walks from the tail.
    #[serde(default = "default_lookahead_depth")]
    pub lookahead_depth: usize,

    /// Replace eligible corners with tangent blend arcs instead of
    /// parabolic blends. Off by default.
    #[serde(default)]
    pub enable_blend_arcs: bool,
}

fn default_queue_size() -> usize {
    DEFAULT_QUEUE_SIZE
}

fn default_lookahead_depth() -> usize {
    LOOKAHEAD_DEPTH
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            queue_size: DEFAULT_QUEUE_SIZE,
            lookahead_depth: LOOKAHEAD_DEPTH,
            enable_blend_arcs: false,
        }
    }
}

impl PlannerConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `queue_size` is outside `QUEUE_SIZE_MIN..=QUEUE_SIZE_MAX`
    /// - `lookahead_depth` is below 2
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(QUEUE_SIZE_MIN..=QUEUE_SIZE_MAX).contains(&self.queue_size) {
            return Err(ConfigError::Invalid(format!(
                "queue_size {} outside {}..={}",
                self.queue_size, QUEUE_SIZE_MIN, QUEUE_SIZE_MAX
            )));
        }
        if self.lookahead_depth < 2 {
            return Err(ConfigError::Invalid(format!(
                "lookahead_depth {} below 2",
                self.lookahead_depth
            )));
        }
        Ok(())
    }
}

/// Loading a TOML configuration, with validation built in.
///
/// `load` deserialises the file and then runs the type's [`check`]
/// before handing the value back, so callers never see a configuration
/// that parsed but is semantically out of range.
///
/// [`check`]: ConfigLoader::check
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Semantic validation applied after deserialisation.
    fn check(&self) -> Result<(), ConfigError>;

    /// Load and validate a TOML configuration file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = toml::from_str(&raw).map_err(|err| ConfigError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;

        config.check()?;
        Ok(config)
    }
}

impl ConfigLoader for PlannerConfig {
    fn check(&self) -> Result<(), ConfigError> {
        self.validate()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_validate() {
        let cfg = PlannerConfig::default();
        assert!(cfg.validate().is_ok());
        assert!(!cfg.enable_blend_arcs);
    }

    #[test]
    fn bad_queue_size_rejected() {
        let cfg = PlannerConfig {
            queue_size: 1,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn bad_lookahead_rejected() {
        let cfg = PlannerConfig {
            lookahead_depth: 1,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn load_from_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "queue_size = 64\nlookahead_depth = 8\nenable_blend_arcs = true"
        )
        .unwrap();

        let cfg = PlannerConfig::load(file.path()).unwrap();
        assert_eq!(cfg.queue_size, 64);
        assert_eq!(cfg.lookahead_depth, 8);
        assert!(cfg.enable_blend_arcs);
    }

    #[test]
    fn missing_file_reported() {
        let result = PlannerConfig::load(Path::new("/nonexistent/helix.toml"));
        match result {
            Err(ConfigError::Io { source, .. }) => {
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("expected Io error, got {other:?}"),
        }
    }

    #[test]
    fn load_rejects_out_of_range_values() {
        // Parses fine, fails the semantic check.
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "queue_size = 1").unwrap();

        let result = PlannerConfig::load(file.path());
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn load_reports_bad_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "queue_size = \"many\"").unwrap();

        let result = PlannerConfig::load(file.path());
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "queue_size = 16").unwrap();

        let cfg = PlannerConfig::load(file.path()).unwrap();
        assert_eq!(cfg.queue_size, 16);
        assert_eq!(cfg.lookahead_depth, LOOKAHEAD_DEPTH);
        assert!(!cfg.enable_blend_arcs);
    }
}
