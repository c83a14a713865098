//! Application configuration with layered loading.
//!
//! Sources, highest precedence first:
//!
//! 1. Environment variables (`TRAWL_*`, nested keys split on `__`)
//! 2. TOML config file (if `TRAWL_CONFIG_FILE` is set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::session::{DEFAULT_PAGE_SIZE, SessionConfig};

mod feeds;
mod validation;

pub use feeds::{FeedConfig, FieldMap, PaginationStyle};
pub use validation::{BRAVE_SOURCE_ID, ConfigError, MAX_CACHE_TTL_SECS, SAFESEARCH_LEVELS};

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite cache database.
    ///
    /// Set via TRAWL_DB_PATH.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for upstream requests.
    ///
    /// Set via TRAWL_USER_AGENT.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-source request timeout in milliseconds, unless a feed overrides it.
    ///
    /// Set via TRAWL_TIMEOUT_MS.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Items revealed per search or load-more.
    ///
    /// Set via TRAWL_PAGE_SIZE.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Cache entry lifetime in seconds.
    ///
    /// Set via TRAWL_CACHE_TTL_SECS.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Language tag for curated entity aliases.
    ///
    /// Set via TRAWL_LANGUAGE.
    #[serde(default)]
    pub language: Option<String>,

    /// Brave Search subscription token.
    ///
    /// Set via TRAWL_BRAVE_API_KEY. Checked only when the web lane is searched.
    #[serde(default)]
    pub brave_api_key: Option<String>,

    /// Whether the Brave web lane is registered.
    ///
    /// Set via TRAWL_BRAVE_ENABLED.
    #[serde(default = "default_true")]
    pub brave_enabled: bool,

    /// Brave safe search level: `off`, `moderate` or `strict`. Brave's own
    /// default applies when unset.
    ///
    /// Set via TRAWL_BRAVE_SAFESEARCH.
    #[serde(default)]
    pub brave_safesearch: Option<String>,

    /// JSON feed sources, usually declared in the TOML file as `[[feeds]]`.
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./trawl-cache.sqlite")
}

fn default_user_agent() -> String {
    concat!("trawl/", env!("CARGO_PKG_VERSION")).into()
}

fn default_timeout_ms() -> u64 {
    15_000
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_cache_ttl_secs() -> u64 {
    crate::cache::DEFAULT_TTL_SECS as u64
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            page_size: default_page_size(),
            cache_ttl_secs: default_cache_ttl_secs(),
            language: None,
            brave_api_key: None,
            brave_enabled: true,
            brave_safesearch: None,
            feeds: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Cache TTL in the form the cache store takes.
    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cache_ttl_secs.min(MAX_CACHE_TTL_SECS) as i64)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig { page_size: self.page_size, language: self.language.clone() }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file or environment cannot be parsed or
    /// validation fails.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_file(std::env::var_os("TRAWL_CONFIG_FILE").map(PathBuf::from))
    }

    /// Like [`AppConfig::load`], with the TOML file given explicitly instead
    /// of through `TRAWL_CONFIG_FILE`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file or environment cannot be parsed or
    /// validation fails.
    pub fn load_with_file(config_file: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_path) = config_file {
            figment = figment.merge(Toml::file(config_path));
        }

        figment = figment.merge(
            Env::prefixed("TRAWL_")
                .ignore(&["config_file"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// The Brave API key, for deferred checks.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the key is not set.
    pub fn require_brave_api_key(&self) -> Result<&str, ConfigError> {
        self.brave_api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::Missing {
                field: "brave_api_key".into(),
                hint: "Set TRAWL_BRAVE_API_KEY environment variable".into(),
            })
    }
}
