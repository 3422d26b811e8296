use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, net::SocketAddr, path::PathBuf, time::Duration};
use tracing::debug;

pub const COINGECKO_API_KEY_ENV: &str = "COINGECKO_API_KEY";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct YahooProviderConfig {
    pub base_url: String,
}

impl Default for YahooProviderConfig {
    fn default() -> Self {
        YahooProviderConfig {
            base_url: "https://query1.finance.yahoo.com".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CoinGeckoProviderConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

impl Default for CoinGeckoProviderConfig {
    fn default() -> Self {
        CoinGeckoProviderConfig {
            base_url: "https://api.coingecko.com".to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NewsProviderConfig {
    pub base_url: String,
}

impl Default for NewsProviderConfig {
    fn default() -> Self {
        NewsProviderConfig {
            base_url: "https://feeds.finance.yahoo.com".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct ProvidersConfig {
    pub yahoo: YahooProviderConfig,
    pub coingecko: CoinGeckoProviderConfig,
    pub news: NewsProviderConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 3001)),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CacheConfig {
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig { ttl_seconds: 300 }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub providers: ProvidersConfig,
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub currency: String,
    pub data_path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            providers: ProvidersConfig::default(),
            server: ServerConfig::default(),
            cache: CacheConfig::default(),
            currency: "USD".to_string(),
            data_path: None,
        }
    }
}

impl AppConfig {
    /// Loads the default config file, or built-in defaults when it does not
    /// exist yet.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        let config = if config_path.exists() {
            Self::load_from_path(&config_path)?
        } else {
            debug!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            Self::default()
        };
        Ok(config.with_env_overrides())
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("dev", "quotevault", "quotevault")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("dev", "quotevault", "quotevault")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config.with_env_overrides())
    }

    /// An API key in the environment wins over the configured one.
    fn with_env_overrides(mut self) -> Self {
        if let Ok(key) = std::env::var(COINGECKO_API_KEY_ENV)
            && !key.trim().is_empty()
        {
            self.providers.coingecko.api_key = Some(key);
        }
        self
    }
}
