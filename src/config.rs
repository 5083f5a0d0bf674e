use std::path::Path;

use crate::agent::DqnConfig;
use crate::error::ConfigError;
use crate::export::ExportConfig;
use crate::solver::{KnapsackInstance, SearchConfig};
use crate::training::TrainerConfig;

/// Top-level application configuration, loadable from TOML.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Built-in instance to train on.
    pub instance: String,
    /// Seed for network init, exploration and episode randomness; omit for
    /// nondeterministic runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub dqn: DqnConfig,
    pub training: TrainerConfig,
    pub search: SearchConfig,
    pub export: ExportConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            instance: "benchmark".to_string(),
            seed: None,
            dqn: DqnConfig::default(),
            training: TrainerConfig::default(),
            search: SearchConfig::default(),
            export: ExportConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            log::info!(
                "config file '{}' not found, using defaults",
                path.display()
            );
            Ok(Self::default())
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if KnapsackInstance::by_name(&self.instance).is_err() {
            return Err(ConfigError::Validation(format!(
                "instance '{}' is not a built-in instance",
                self.instance
            )));
        }
        if self.dqn.learning_rate <= 0.0 {
            return Err(ConfigError::Validation(
                "dqn.learning_rate must be > 0".into(),
            ));
        }
        if self.dqn.gamma < 0.0 || self.dqn.gamma > 1.0 {
            return Err(ConfigError::Validation(
                "dqn.gamma must be in [0, 1]".into(),
            ));
        }
        if self.dqn.epsilon_start < 0.0 || self.dqn.epsilon_start > 1.0 {
            return Err(ConfigError::Validation(
                "dqn.epsilon_start must be in [0, 1]".into(),
            ));
        }
        if self.dqn.epsilon_min < 0.0 || self.dqn.epsilon_min > self.dqn.epsilon_start {
            return Err(ConfigError::Validation(
                "dqn.epsilon_min must be in [0, dqn.epsilon_start]".into(),
            ));
        }
        if self.dqn.epsilon_decay <= 0.0 || self.dqn.epsilon_decay > 1.0 {
            return Err(ConfigError::Validation(
                "dqn.epsilon_decay must be in (0, 1]".into(),
            ));
        }
        if self.dqn.tau <= 0.0 || self.dqn.tau > 1.0 {
            return Err(ConfigError::Validation(
                "dqn.tau must be in (0, 1]".into(),
            ));
        }
        if self.dqn.batch_size == 0 {
            return Err(ConfigError::Validation(
                "dqn.batch_size must be > 0".into(),
            ));
        }
        if self.dqn.replay_capacity < self.dqn.batch_size {
            return Err(ConfigError::Validation(
                "dqn.replay_capacity must be >= dqn.batch_size".into(),
            ));
        }
        if self.training.epochs == 0 {
            return Err(ConfigError::Validation(
                "training.epochs must be > 0".into(),
            ));
        }
        if self.training.iteration_cap == 0 {
            return Err(ConfigError::Validation(
                "training.iteration_cap must be > 0".into(),
            ));
        }
        if self.search.node_limit == 0 {
            return Err(ConfigError::Validation(
                "search.node_limit must be > 0".into(),
            ));
        }
        if self.export.decision_flush_interval == 0 {
            return Err(ConfigError::Validation(
                "export.decision_flush_interval must be > 0".into(),
            ));
        }
        if self.export.loss_flush_interval == 0 {
            return Err(ConfigError::Validation(
                "export.loss_flush_interval must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Generate a TOML string with all default values (useful for creating
    /// example config files).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&AppConfig::default()).expect("default config serializes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        config.validate().expect("default config should be valid");
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml_str = r#"
[dqn]
learning_rate = 0.01
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert!((config.dqn.learning_rate - 0.01).abs() < 1e-9);
        assert!((config.dqn.gamma - 0.99).abs() < 1e-6);
        assert_eq!(config.training.epochs, 500);
    }

    #[test]
    fn test_empty_toml_uses_all_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        let default = AppConfig::default();
        assert_eq!(config.instance, default.instance);
        assert_eq!(config.training.iteration_cap, default.training.iteration_cap);
    }

    #[test]
    fn test_validation_rejects_unknown_instance() {
        let mut config = AppConfig::default();
        config.instance = "nonexistent".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_negative_lr() {
        let mut config = AppConfig::default();
        config.dqn.learning_rate = -0.001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_invalid_gamma() {
        let mut config = AppConfig::default();
        config.dqn.gamma = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_epsilon_min_above_start() {
        let mut config = AppConfig::default();
        config.dqn.epsilon_start = 0.05;
        config.dqn.epsilon_min = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_invalid_tau() {
        let mut config = AppConfig::default();
        config.dqn.tau = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_replay_capacity_lt_batch() {
        let mut config = AppConfig::default();
        config.dqn.replay_capacity = 10;
        config.dqn.batch_size = 64;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_epochs() {
        let mut config = AppConfig::default();
        config.training.epochs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = AppConfig::load_or_default(Path::new("nonexistent_config.toml")).unwrap();
        assert_eq!(config.training.epochs, 500);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test_config.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(
            f,
            r#"
instance = "toy"

[training]
epochs = 25
"#
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.instance, "toy");
        assert_eq!(config.training.epochs, 25);
        assert!((config.dqn.learning_rate - 1e-3).abs() < 1e-9);
    }

    #[test]
    fn test_default_toml_roundtrips() {
        let toml_str = AppConfig::default_toml();
        let config: AppConfig = toml::from_str(&toml_str).unwrap();
        config.validate().expect("roundtripped config should be valid");
    }
}
