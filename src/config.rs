use dashmap::DashMap;
use std::{env, path::PathBuf};
use thiserror::Error;
use tracing::{info, warn};

pub const LOG_LEVEL_KEY: &str = "GLOW_LOG_LEVEL";
pub const MAX_DEPTH_KEY: &str = "GLOW_MAX_DEPTH";
pub const LOG_FILE_KEY: &str = "GLOW_LOG_FILE";

pub trait ConfigManagerType: Send + Sync {
    fn keys(&self) -> Vec<String>;
    fn get(&self, key: &str) -> Option<String>;
    fn debug_box(&self) -> String;
}

pub struct ConfigManager(pub Box<dyn ConfigManagerType>);

impl std::fmt::Debug for ConfigManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.debug_box())
    }
}

/// Reads the process environment, after loading an optional `.env` file.
#[derive(Clone, Debug)]
pub struct EnvConfigManager {
    env_file: Option<PathBuf>,
}

impl EnvConfigManager {
    pub fn new(env_file: Option<PathBuf>) -> Box<Self> {
        match &env_file {
            Some(path) if path.exists() => match dotenvy::from_path(path) {
                Ok(()) => info!("Loaded .env from {}", path.display()),
                Err(e) => warn!("could not load .env from {}: {}", path.display(), e),
            },
            Some(path) => warn!("no .env at {}", path.display()),
            None => {
                dotenvy::dotenv().ok();
            }
        }
        Box::new(Self { env_file })
    }
}

impl ConfigManagerType for EnvConfigManager {
    fn keys(&self) -> Vec<String> {
        env::vars().map(|(k, _)| k).collect()
    }

    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }

    fn debug_box(&self) -> String {
        match &self.env_file {
            Some(path) => format!("EnvConfigManager({})", path.display()),
            None => "EnvConfigManager".to_string(),
        }
    }
}

/// In-memory configuration, mostly for tests.
#[derive(Debug, Clone, Default)]
pub struct MapConfigManager {
    map: DashMap<String, String>,
}

impl MapConfigManager {
    pub fn new() -> Box<Self> {
        Box::new(Self::default())
    }

    pub fn set(&self, key: &str, value: &str) {
        self.map.insert(key.to_string(), value.to_string());
    }

    pub fn del(&self, key: &str) {
        self.map.remove(key);
    }
}

impl ConfigManagerType for MapConfigManager {
    fn keys(&self) -> Vec<String> {
        self.map.iter().map(|entry| entry.key().clone()).collect()
    }

    fn get(&self, key: &str) -> Option<String> {
        self.map.get(key).map(|v| v.clone())
    }

    fn debug_box(&self) -> String {
        format!("MapConfigManager({} entries)", self.map.len())
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid value `{value}` for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Runtime settings of the engine and its driver.
#[derive(Debug, Clone, PartialEq)]
pub struct GlowConfig {
    /// `EnvFilter` directive for logging.
    pub log_level: String,
    /// Limit on nested `feed` calls, unbounded when absent.
    pub max_depth: Option<usize>,
    pub log_file: Option<PathBuf>,
}

impl Default for GlowConfig {
    fn default() -> Self {
        GlowConfig {
            log_level: "info".to_string(),
            max_depth: None,
            log_file: None,
        }
    }
}

impl GlowConfig {
    pub fn load(config: &ConfigManager) -> Result<Self, ConfigError> {
        let defaults = GlowConfig::default();
        let log_level = config
            .0
            .get(LOG_LEVEL_KEY)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.log_level);
        let max_depth = match config.0.get(MAX_DEPTH_KEY) {
            None => None,
            Some(value) if value.trim().is_empty() => None,
            Some(value) => {
                let depth = value.trim().parse::<usize>().map_err(|e| ConfigError::Invalid {
                    key: MAX_DEPTH_KEY,
                    value: value.clone(),
                    reason: e.to_string(),
                })?;
                if depth == 0 {
                    return Err(ConfigError::Invalid {
                        key: MAX_DEPTH_KEY,
                        value,
                        reason: "must be at least 1".to_string(),
                    });
                }
                Some(depth)
            }
        };
        let log_file = config
            .0
            .get(LOG_FILE_KEY)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);
        Ok(GlowConfig {
            log_level,
            max_depth,
            log_file,
        })
    }
}
