//! TOML configuration for the engine, optimizer and result store.
//!
//! ```toml
//! [engine]
//! initial_balance = 10000.0
//! leverage = 3.0
//!
//! [optimizer]
//! max_combinations = 50
//! lookback_days = 7
//! seed = 42
//! parallel = true
//! relax_policy = "automatic"
//!
//! [store]
//! dir = "optimization_results"
//! stale_after_days = 7
//! ```
//!
//! Every field has a default, so an empty or missing file is valid.

use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use levlab_core::engine::EngineConfig;
use levlab_core::strategy::ParamError;

use crate::optimizer::{
    OptimizerConfig, RelaxPolicy, DEFAULT_LOOKBACK_DAYS, DEFAULT_MAX_COMBINATIONS, DEFAULT_SEED,
};
use crate::store::{JsonFileStore, DEFAULT_STALE_AFTER_DAYS};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(#[from] ParamError),
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevlabConfig {
    pub engine: EngineConfig,
    pub optimizer: OptimizerSection,
    pub store: StoreSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerSection {
    pub max_combinations: usize,
    pub lookback_days: u32,
    pub seed: u64,
    pub parallel: bool,
    pub relax_policy: RelaxPolicy,
}

impl Default for OptimizerSection {
    fn default() -> Self {
        Self {
            max_combinations: DEFAULT_MAX_COMBINATIONS,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            seed: DEFAULT_SEED,
            parallel: true,
            relax_policy: RelaxPolicy::Automatic,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub dir: PathBuf,
    pub stale_after_days: i64,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("optimization_results"),
            stale_after_days: DEFAULT_STALE_AFTER_DAYS,
        }
    }
}

impl StoreSection {
    pub fn stale_after(&self) -> Duration {
        Duration::days(self.stale_after_days)
    }

    pub fn open(&self) -> JsonFileStore {
        JsonFileStore::new(&self.dir)
    }
}

impl LevlabConfig {
    /// Parse and validate a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Defaults when `path` does not exist; any other failure is an error.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ParamError> {
        self.engine.validate()?;
        if self.optimizer.max_combinations < 1 {
            return Err(ParamError::out_of_range(
                "max_combinations",
                self.optimizer.max_combinations as f64,
                "must be >= 1",
            ));
        }
        if self.optimizer.lookback_days < 1 {
            return Err(ParamError::out_of_range(
                "lookback_days",
                f64::from(self.optimizer.lookback_days),
                "must be >= 1",
            ));
        }
        if self.store.stale_after_days < 0 {
            return Err(ParamError::out_of_range(
                "stale_after_days",
                self.store.stale_after_days as f64,
                "must be >= 0",
            ));
        }
        Ok(())
    }

    pub fn optimizer_config(&self) -> OptimizerConfig {
        OptimizerConfig {
            engine: self.engine,
            seed: self.optimizer.seed,
            parallel: self.optimizer.parallel,
            relax_policy: self.optimizer.relax_policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let config = LevlabConfig::from_toml("").unwrap();
        assert_eq!(config, LevlabConfig::default());
        assert_eq!(config.optimizer.seed, 42);
        assert_eq!(config.store.stale_after(), Duration::days(7));
        assert_eq!(config.engine.initial_balance, 10_000.0);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let toml = r#"
            [engine]
            leverage = 5.0

            [optimizer]
            relax_policy = "disabled"
            parallel = false
        "#;
        let config = LevlabConfig::from_toml(toml).unwrap();
        assert_eq!(config.engine.leverage, 5.0);
        assert_eq!(config.engine.commission_rate, 0.0004);
        assert_eq!(config.optimizer.relax_policy, RelaxPolicy::Disabled);
        assert!(!config.optimizer.parallel);
        assert_eq!(config.optimizer.max_combinations, DEFAULT_MAX_COMBINATIONS);

        let opt = config.optimizer_config();
        assert_eq!(opt.engine.leverage, 5.0);
        assert_eq!(opt.relax_policy, RelaxPolicy::Disabled);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = LevlabConfig::from_toml("[engine]\nbalance_ratio = 1.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let err = LevlabConfig::from_toml("[optimizer]\nmax_combinations = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let err = LevlabConfig::from_toml("[engine]\nleverage = \"high\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = LevlabConfig::load_or_default(&dir.path().join("levlab.toml")).unwrap();
        assert_eq!(config, LevlabConfig::default());
    }
}
