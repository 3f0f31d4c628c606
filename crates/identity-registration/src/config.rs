//! Configuration for the enrollment service.

use crate::protocol::RegistrationSettings;
use anyhow::{bail, Context, Result};
use registration_store::StoreConfig;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage backend and region identifiers
    #[serde(default)]
    pub storage: StorageConfig,

    /// Protocol parameters
    #[serde(default)]
    pub registration: RegistrationConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Nothing persisted across restarts
    Memory,
    /// Encrypted region files under `data_dir`
    File,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,

    /// Directory holding the region files (file backend)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Identifier of the pending-registration region
    #[serde(default = "default_pending_region")]
    pub pending_region: String,

    /// Identifier of the verified-identity region
    #[serde(default = "default_identity_region")]
    pub identity_region: String,

    /// Locality hint for store connectivity
    #[serde(default)]
    pub locality: Option<String>,

    /// Secret the region encryption keys are derived from (file backend)
    #[serde(default)]
    pub encryption_secret: Option<SecretString>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationConfig {
    /// Lifetime of an issued one-time code
    #[serde(default = "default_pending_ttl", with = "humantime_serde")]
    pub pending_ttl: Duration,

    /// Max one-time keys accepted per finalization
    #[serde(default = "default_max_one_time_keys")]
    pub max_one_time_keys: usize,

    /// How often expired pending registrations are swept (memory backend)
    #[serde(default = "default_sweep_interval", with = "humantime_serde")]
    pub sweep_interval: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Global registration requests per minute
    #[serde(default = "default_global_rpm")]
    pub global_per_minute: u32,

    /// Finalization attempts per phone number per hour
    #[serde(default = "default_finalize_per_phone_rph")]
    pub finalize_per_phone_per_hour: u32,

    /// How often replenished phone numbers are dropped from the limiter
    #[serde(default = "default_prune_interval", with = "humantime_serde")]
    pub prune_interval: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON log lines
    #[serde(default)]
    pub json: bool,
}

// Default implementations
impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            port: default_port(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            data_dir: default_data_dir(),
            pending_region: default_pending_region(),
            identity_region: default_identity_region(),
            locality: None,
            encryption_secret: None,
        }
    }
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            pending_ttl: default_pending_ttl(),
            max_one_time_keys: default_max_one_time_keys(),
            sweep_interval: default_sweep_interval(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            global_per_minute: default_global_rpm(),
            finalize_per_phone_per_hour: default_finalize_per_phone_rph(),
            prune_interval: default_prune_interval(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value functions
fn default_listen_addr() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    8080
}

fn default_backend() -> StorageBackend {
    StorageBackend::Memory
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/data")
}

fn default_pending_region() -> String {
    "registration-pending".into()
}

fn default_identity_region() -> String {
    "identity".into()
}

fn default_pending_ttl() -> Duration {
    Duration::from_secs(3600)
}

fn default_max_one_time_keys() -> usize {
    100
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_global_rpm() -> u32 {
    60
}

fn default_finalize_per_phone_rph() -> u32 {
    5
}

fn default_prune_interval() -> Duration {
    Duration::from_secs(600)
}

fn default_log_level() -> String {
    "info".into()
}

impl StorageConfig {
    /// Region identifiers handed to the store backend.
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            pending_region: self.pending_region.clone(),
            identity_region: self.identity_region.clone(),
            locality: self.locality.clone(),
        }
    }
}

impl RegistrationConfig {
    /// Protocol parameters for the registrar.
    pub fn settings(&self) -> Result<RegistrationSettings> {
        let pending_ttl = chrono::Duration::from_std(self.pending_ttl)
            .context("pending_ttl out of range")?;
        Ok(RegistrationSettings {
            pending_ttl,
            max_one_time_keys: self.max_one_time_keys,
        })
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(false),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject combinations the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.storage.pending_region.is_empty() || self.storage.identity_region.is_empty() {
            bail!("storage region identifiers must not be empty");
        }

        if self.storage.pending_region == self.storage.identity_region {
            bail!("pending and identity regions must differ");
        }

        if self.storage.backend == StorageBackend::File
            && self
                .storage
                .encryption_secret
                .as_ref()
                .map_or(true, |secret| secret.expose_secret().is_empty())
        {
            bail!("STORAGE__ENCRYPTION_SECRET is required for the file backend");
        }

        if self.registration.pending_ttl.is_zero() {
            bail!("registration pending_ttl must be positive");
        }

        Ok(())
    }
}
