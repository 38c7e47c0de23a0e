use crate::constants;
use crate::error::{Result, ScraperError};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_city")]
    pub city: String,
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    /// Optional cap on the whole fetch/extract phase; reconciliation and the
    /// sweep still run for whatever was gathered before it expired.
    #[serde(default)]
    pub cycle_deadline_seconds: Option<u64>,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub url: String,
}

fn default_city() -> String {
    constants::DEFAULT_CITY.to_string()
}

fn default_retention_days() -> i64 {
    constants::DEFAULT_RETENTION_DAYS
}

fn default_timeout_seconds() -> u64 {
    constants::DEFAULT_FETCH_TIMEOUT_SECS
}

fn default_user_agent() -> String {
    constants::DEFAULT_USER_AGENT.to_string()
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            city: default_city(),
            retention_days: default_retention_days(),
            cycle_deadline_seconds: None,
            fetch: FetchConfig::default(),
            sources: constants::default_source_urls()
                .into_iter()
                .map(|(name, url)| SourceConfig {
                    name: name.to_string(),
                    url: url.to_string(),
                })
                .collect(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ScraperError::Config(format!("Failed to read config file '{path}': {e}"))
        })?;

        let mut config: Config = toml::from_str(&content)?;
        if config.sources.is_empty() {
            config.sources = Config::default().sources;
        }
        Ok(config)
    }

    /// Load `config.toml` when present, otherwise the built-in source list.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Restrict the cycle to the named sources, preserving list order.
    /// Returns the requested names that matched no configured source.
    pub fn retain_sources(&mut self, names: &[String]) -> Vec<String> {
        let unknown: Vec<String> = names
            .iter()
            .filter(|name| !self.sources.iter().any(|s| &s.name == *name))
            .cloned()
            .collect();
        self.sources.retain(|s| names.contains(&s.name));
        unknown
    }
}
