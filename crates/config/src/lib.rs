//! Configuration for the Portal platform
//!
//! A `PlatformConfig` is read from YAML and then patched from `PORTAL_*`
//! environment variables. Amounts are written in whole native units
//! (`"0.01"`) and converted to smallest units on load.

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use portal_common::{AccountId, Amount, BasisPoints};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Errors that can occur in configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidEnvVar(String, String),

    #[error("Failed to read file: {0}")]
    FileReadError(String),

    #[error("Failed to parse YAML: {0}")]
    YamlParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/portal.yaml";

/// Whether stake may be withdrawn while the staker has a vote on a proposal
/// that is still open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnstakeLock {
    Disabled,
    WhileVoting,
}

impl Default for UnstakeLock {
    fn default() -> Self {
        UnstakeLock::WhileVoting
    }
}

/// Settings a new DAO starts with unless its creator overrides them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaoDefaults {
    #[serde(default = "default_voting_period")]
    pub voting_period_secs: u64,
    #[serde(default = "default_execution_delay")]
    pub execution_delay_secs: u64,
    /// Delay between proposal creation and the start of voting
    #[serde(default)]
    pub voting_delay_secs: u64,
    #[serde(default = "default_quorum")]
    pub quorum_threshold: BasisPoints,
    #[serde(default = "default_proposal_threshold", with = "native_amount")]
    pub proposal_threshold: Amount,
    #[serde(default = "default_community_pool")]
    pub community_pool: BasisPoints,
    #[serde(default = "default_governor_pool")]
    pub governor_pool: BasisPoints,
}

fn default_voting_period() -> u64 {
    7 * 86_400
}

fn default_execution_delay() -> u64 {
    86_400
}

fn default_quorum() -> BasisPoints {
    BasisPoints::new(2_000)
}

fn default_proposal_threshold() -> Amount {
    Amount::new(100_000_000)
}

fn default_community_pool() -> BasisPoints {
    BasisPoints::new(4_000)
}

fn default_governor_pool() -> BasisPoints {
    BasisPoints::new(6_000)
}

impl Default for DaoDefaults {
    fn default() -> Self {
        Self {
            voting_period_secs: default_voting_period(),
            execution_delay_secs: default_execution_delay(),
            voting_delay_secs: 0,
            quorum_threshold: default_quorum(),
            proposal_threshold: default_proposal_threshold(),
            community_pool: default_community_pool(),
            governor_pool: default_governor_pool(),
        }
    }
}

/// Policy switches for behaviour the platform leaves to the operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub unstake_lock: UnstakeLock,
    /// Send a submission back to its assignee once it collects as many
    /// rejections as it needs approvals
    #[serde(default = "default_true")]
    pub reject_on_negative_quorum: bool,
    /// Refuse to assign a task to the member who created it
    #[serde(default = "default_true")]
    pub forbid_creator_assignment: bool,
    #[serde(default = "default_min_validations")]
    pub min_required_validations: u32,
    /// Accounts allowed to record premium subscriptions; none by default
    #[serde(default)]
    pub premium_operators: BTreeSet<AccountId>,
}

fn default_true() -> bool {
    true
}

fn default_min_validations() -> u32 {
    2
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            unstake_lock: UnstakeLock::default(),
            reject_on_negative_quorum: true,
            forbid_creator_assignment: true,
            min_required_validations: default_min_validations(),
            premium_operators: BTreeSet::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Directory for rolling log files; console only when unset
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the state snapshot; in-memory only when unset
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

/// Main platform configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Smallest stake accepted by a single stake call
    #[serde(default = "default_min_stake", with = "native_amount")]
    pub min_stake: Amount,
    #[serde(default)]
    pub dao_defaults: DaoDefaults,
    #[serde(default)]
    pub policies: PolicyConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    /// Interval of the background proposal sweep; 0 disables it
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_min_stake() -> Amount {
    Amount::new(1_000_000)
}

fn default_sweep_interval() -> u64 {
    60
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            min_stake: default_min_stake(),
            dao_defaults: DaoDefaults::default(),
            policies: PolicyConfig::default(),
            logging: LoggingConfig::default(),
            storage: StorageConfig::default(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl PlatformConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            ConfigError::FileReadError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: PlatformConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `PORTAL_CONFIG_FILE` (or the default path) when it exists,
    /// otherwise start from defaults; then apply environment overrides.
    pub fn from_env() -> Result<Self> {
        let config_path =
            env::var("PORTAL_CONFIG_FILE").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let mut config = if Path::new(&config_path).exists() {
            debug!("Loading configuration from {}", config_path);
            Self::from_file(&config_path)?
        } else {
            Self::default()
        };

        config.apply_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Patch fields from `PORTAL_*` variables resolved through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("PORTAL_MIN_STAKE") {
            self.min_stake = Amount::parse_native(&value)
                .map_err(|e| ConfigError::InvalidEnvVar("PORTAL_MIN_STAKE".to_string(), e.to_string()))?;
        }
        if let Some(value) = lookup("PORTAL_LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = lookup("PORTAL_LOG_DIR") {
            self.logging.dir = Some(PathBuf::from(value));
        }
        if let Some(value) = lookup("PORTAL_DATA_DIR") {
            self.storage.data_dir = Some(PathBuf::from(value));
        }
        if let Some(value) = lookup("PORTAL_SWEEP_INTERVAL") {
            self.sweep_interval_secs = value.parse::<u64>().map_err(|e| {
                ConfigError::InvalidEnvVar("PORTAL_SWEEP_INTERVAL".to_string(), e.to_string())
            })?;
        }
        if let Some(value) = lookup("PORTAL_UNSTAKE_LOCK") {
            self.policies.unstake_lock = match value.as_str() {
                "disabled" => UnstakeLock::Disabled,
                "while_voting" => UnstakeLock::WhileVoting,
                other => {
                    return Err(ConfigError::InvalidEnvVar(
                        "PORTAL_UNSTAKE_LOCK".to_string(),
                        format!("unknown policy '{}'", other),
                    ))
                }
            };
        }
        if let Some(value) = lookup("PORTAL_PREMIUM_OPERATORS") {
            self.policies.premium_operators = value
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(AccountId::from)
                .collect();
        }
        Ok(())
    }

    /// Reject settings the engine cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.min_stake.is_zero() {
            return Err(ConfigError::Invalid("min_stake must be positive".to_string()));
        }
        let defaults = &self.dao_defaults;
        if defaults.voting_period_secs == 0 {
            return Err(ConfigError::Invalid("voting_period_secs must be positive".to_string()));
        }
        if !defaults.quorum_threshold.is_fraction() {
            return Err(ConfigError::Invalid(format!(
                "quorum_threshold {} exceeds 100%",
                defaults.quorum_threshold
            )));
        }
        let pools = defaults.community_pool.saturating_add(defaults.governor_pool);
        if pools != BasisPoints::MAX {
            return Err(ConfigError::Invalid(format!(
                "community_pool + governor_pool must be 100%, got {}",
                pools
            )));
        }
        if self.policies.min_required_validations < 2 {
            return Err(ConfigError::Invalid(
                "min_required_validations must be at least 2".to_string(),
            ));
        }
        Ok(())
    }
}

/// Serde adapter writing amounts as whole-unit decimal strings
mod native_amount {
    use portal_common::Amount;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(amount: &Amount, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&amount.to_native().to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Amount, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Amount::parse_native(&raw).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = PlatformConfig::default();
        config.validate().unwrap();
        assert_eq!(config.min_stake, Amount::new(1_000_000));
        assert_eq!(config.dao_defaults.quorum_threshold, BasisPoints::new(2_000));
        assert_eq!(config.policies.unstake_lock, UnstakeLock::WhileVoting);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config = PlatformConfig::from_yaml(
            r#"
min_stake: "0.5"
dao_defaults:
  voting_period_secs: 86400
  quorum_threshold: 2500
policies:
  unstake_lock: disabled
"#,
        )
        .unwrap();

        assert_eq!(config.min_stake, Amount::new(50_000_000));
        assert_eq!(config.dao_defaults.voting_period_secs, 86_400);
        assert_eq!(config.dao_defaults.quorum_threshold, BasisPoints::new(2_500));
        assert_eq!(config.dao_defaults.execution_delay_secs, 86_400);
        assert_eq!(config.policies.unstake_lock, UnstakeLock::Disabled);
        assert!(config.policies.reject_on_negative_quorum);
        assert_eq!(config.sweep_interval_secs, 60);
    }

    #[test]
    fn test_rejects_unbalanced_pools() {
        let err = PlatformConfig::from_yaml(
            r#"
dao_defaults:
  community_pool: 5000
  governor_pool: 6000
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_single_validator_policy() {
        let mut config = PlatformConfig::default();
        config.policies.min_required_validations = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("PORTAL_MIN_STAKE", "0.02"),
            ("PORTAL_LOG_LEVEL", "debug"),
            ("PORTAL_SWEEP_INTERVAL", "0"),
            ("PORTAL_UNSTAKE_LOCK", "disabled"),
            ("PORTAL_PREMIUM_OPERATORS", "billing, "),
        ]
        .into_iter()
        .collect();

        let mut config = PlatformConfig::default();
        config
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.min_stake, Amount::new(2_000_000));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.sweep_interval_secs, 0);
        assert_eq!(config.policies.unstake_lock, UnstakeLock::Disabled);
        assert_eq!(config.policies.premium_operators.len(), 1);
        assert!(config.policies.premium_operators.contains(&AccountId::from("billing")));
    }

    #[test]
    fn test_bad_env_override() {
        let mut config = PlatformConfig::default();
        let err = config
            .apply_overrides(|key| (key == "PORTAL_MIN_STAKE").then(|| "lots".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(_, _)));
    }

    #[test]
    fn test_from_file_round_trip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let config = PlatformConfig::default();
        write!(file, "{}", serde_yaml::to_string(&config).unwrap()).unwrap();

        let loaded = PlatformConfig::from_file(file.path()).unwrap();
        assert_eq!(loaded, config);
    }
}
