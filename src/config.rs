use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const ENV_PREFIX: &str = "VISIONGATE_";
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Runtime configuration, layered as defaults < `config.toml` < environment.
///
/// Environment keys use `__` between section and field, e.g.
/// `VISIONGATE_BASIC__ADMIN_KEY` or `VISIONGATE_CLASSIFIER__ENDPOINT`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub basic: BasicConfig,
    pub fetch: FetchConfig,
    pub classifier: ClassifierConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicConfig {
    pub listen_addr: String,
    pub database_url: String,
    pub loglevel: String,
    /// Shared secret required by the refill endpoint.
    pub admin_key: String,
    pub initial_credits: i64,
    pub max_request_bytes: usize,
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:5000".to_string(),
            database_url: "sqlite:visiongate.db".to_string(),
            loglevel: "info".to_string(),
            admin_key: "abc123".to_string(),
            initial_credits: 10,
            max_request_bytes: 64 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub max_image_bytes: usize,
    pub user_agent: String,
    pub proxy: Option<Url>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            connect_timeout_secs: 5,
            max_image_bytes: 10 * 1024 * 1024,
            user_agent: concat!("visiongate/", env!("CARGO_PKG_VERSION")).to_string(),
            proxy: None,
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// REST predict endpoint of the model server.
    pub endpoint: String,
    /// ImageNet class index (`{"0": ["n01440764", "tench"], ...}`) or one label per line.
    pub labels_path: PathBuf,
    pub input_size: u32,
    pub top_k: usize,
    pub timeout_secs: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8501/v1/models/inception_v3:predict".to_string(),
            labels_path: PathBuf::from("imagenet_class_index.json"),
            input_size: 299,
            top_k: 5,
            timeout_secs: 30,
        }
    }
}

impl ClassifierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl Config {
    /// Load from `config.toml` in the working directory plus environment.
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, figment::Error> {
        let cfg: Config = Self::figment(path.as_ref()).extract()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values that extract cleanly but cannot run the gateway.
    pub fn validate(&self) -> Result<(), figment::Error> {
        if self.basic.initial_credits < 0 {
            return Err(figment::Error::from(format!(
                "basic.initial_credits must not be negative (got {})",
                self.basic.initial_credits
            )));
        }
        if self.classifier.top_k == 0 {
            return Err(figment::Error::from(
                "classifier.top_k must be at least 1".to_string(),
            ));
        }
        if self.classifier.input_size == 0 {
            return Err(figment::Error::from(
                "classifier.input_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }
}
