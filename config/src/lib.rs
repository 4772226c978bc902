//! Configuration loading for the later demos.
//!
//! The config file is optional. It is read from `$LATER_CONFIG` when set,
//! otherwise from `~/.later/config.toml`. Every section and field falls back
//! to the defaults the demos were written against.

use serde::Deserialize;
use std::{env, path::PathBuf, time::Duration};
use thiserror::Error;

pub const CONFIG_ENV_VAR: &str = "LATER_CONFIG";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LaterConfig {
    pub reactor: Option<ReactorConfig>,
    pub print_later: Option<PrintLaterConfig>,
    pub build_up_work: Option<BuildUpWorkConfig>,
    pub fetch: Option<FetchConfig>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

/// Which clock drives the reactor.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ClockMode {
    /// Wall-clock delays; timers really wait.
    #[default]
    System,
    /// Virtual time; timers fire in order without waiting.
    Virtual,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReactorConfig {
    #[serde(default)]
    pub clock: ClockMode,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PrintLaterConfig {
    pub message: String,
    pub delay_ms: u64,
}

impl Default for PrintLaterConfig {
    fn default() -> Self {
        Self {
            message: "The future is now!".to_string(),
            delay_ms: 1_000,
        }
    }
}

impl PrintLaterConfig {
    #[must_use]
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BuildUpWorkConfig {
    /// Value the resource produces once initialized.
    pub value: String,
    pub init_delay_ms: u64,
}

impl Default for BuildUpWorkConfig {
    fn default() -> Self {
        Self {
            value: "db_result".to_string(),
            init_delay_ms: 3_000,
        }
    }
}

impl BuildUpWorkConfig {
    #[must_use]
    pub fn init_delay(&self) -> Duration {
        Duration::from_millis(self.init_delay_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub urls: Vec<String>,
    /// Simulated latency before each fetch settles.
    pub latency_ms: u64,
    /// URLs the scripted fetcher fails even though they parse.
    pub failing: Vec<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            urls: [
                "http://www.google.com",
                "http://www.twitter.com",
                "http://www.facebook.com",
                "http://www.apple.com",
                "http://www.oracle.com",
                "a_bad_url",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            latency_ms: 200,
            failing: Vec::new(),
        }
    }
}

impl FetchConfig {
    #[must_use]
    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }
}

impl LaterConfig {
    /// Load the config file, if there is one.
    ///
    /// A missing file is not an error and yields `Ok(None)`.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(path),
            None => Ok(None),
        }
    }

    pub fn load_from(path: PathBuf) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file");
            return Ok(None);
        }

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read { path, source: err });
            }
        };

        match Self::parse(&content) {
            Ok(config) => Ok(Some(config)),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse { path, source: err })
            }
        }
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    #[must_use]
    pub fn clock(&self) -> ClockMode {
        self.reactor.as_ref().map(|r| r.clock).unwrap_or_default()
    }

    #[must_use]
    pub fn print_later(&self) -> PrintLaterConfig {
        self.print_later.clone().unwrap_or_default()
    }

    #[must_use]
    pub fn build_up_work(&self) -> BuildUpWorkConfig {
        self.build_up_work.clone().unwrap_or_default()
    }

    #[must_use]
    pub fn fetch(&self) -> FetchConfig {
        self.fetch.clone().unwrap_or_default()
    }
}

pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = env::var_os(CONFIG_ENV_VAR).filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".later").join("config.toml"))
}
