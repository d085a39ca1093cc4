use std::{
    fs, io,
    path::{Path, PathBuf},
};

use config::{Config, ConfigError};
use serde::{Deserialize, Serialize};

/// Config structure with the deployment knobs the binary wires together.
/// Loaded from an optional `config.toml` plus `APP_`-prefixed environment
/// variables; every field has a usable default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_state_dir")]
    pub state_dir: String,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub directory: DirectoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_label")]
    pub label: String,
    #[serde(default = "default_tick_interval_s")]
    pub tick_interval_s: u64,
    #[serde(default)]
    pub run_on_start: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    #[serde(default = "default_seed_file")]
    pub seed_file: String,
}

fn default_state_dir() -> String {
    "leave.state".to_string()
}

fn default_label() -> String {
    "dev".to_string()
}

fn default_tick_interval_s() -> u64 {
    300
}

fn default_seed_file() -> String {
    "directory.json".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            scheduler: SchedulerConfig::default(),
            directory: DirectoryConfig::default(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            label: default_label(),
            tick_interval_s: default_tick_interval_s(),
            run_on_start: false,
        }
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            seed_file: default_seed_file(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(config::File::with_name("config.toml").required(false))
            .add_source(config::Environment::with_prefix("APP"))
            .build()?;
        settings.try_deserialize()
    }

    pub fn state_dir(&self) -> &Path {
        Path::new(&self.state_dir)
    }

    pub fn policy_file(&self) -> PathBuf {
        self.state_dir().join("policies.json")
    }

    pub fn ledger_file(&self) -> PathBuf {
        self.state_dir().join("ledger.json")
    }

    pub fn directory_file(&self) -> PathBuf {
        self.state_dir().join(&self.directory.seed_file)
    }

    pub fn ensure_dirs(&self) -> io::Result<()> {
        if !self.state_dir().exists() {
            fs::create_dir_all(self.state_dir())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable() {
        let config = AppConfig::default();
        assert_eq!(config.state_dir, "leave.state");
        assert_eq!(config.scheduler.tick_interval_s, 300);
        assert!(!config.scheduler.run_on_start);
        assert_eq!(config.policy_file(), Path::new("leave.state/policies.json"));
        assert_eq!(
            config.directory_file(),
            Path::new("leave.state/directory.json")
        );
    }
}
