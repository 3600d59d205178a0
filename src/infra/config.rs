//! Configuration management infrastructure.
//!
//! Browser signing sessions and verification defaults are read from a TOML
//! file in the user's configuration directory.

use crate::adapters::browser::session::SessionSettings;
use crate::infra::error::{SigningError, SigningResult};
use crate::services::status::ReferenceTime;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Script sources the browser page tries, in order, to load the signing plugin API.
pub const DEFAULT_PLUGIN_SCRIPT_SOURCES: [&str; 3] = [
    "https://www.cryptopro.ru/sites/default/files/products/cades/cadesplugin_api.js",
    "chrome-extension://iifchhfnnmpdbibifmljnfjhpififfog/nmcades_plugin_api.js",
    "chrome-extension://epiejncknlhcgcanmnmnjnmghjkpgkdd/nmcades_plugin_api.js",
];

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfiguration {
    /// Remote signing through the browser plugin
    pub browser_signing: BrowserSigningConfig,

    /// Verification defaults
    pub verification: VerificationConfig,
}

/// Browser signing session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSigningConfig {
    /// How long a session waits for the browser before expiring
    pub timeout_seconds: u64,

    /// Whether diagnostic lines are mirrored to the browser page
    pub log_to_page: bool,

    /// Plugin API script sources, tried in order by the page
    pub plugin_script_sources: Vec<String>,

    /// Delay between accepting a result and stopping the endpoint
    pub shutdown_grace_ms: u64,

    /// Maximum number of buffered diagnostic lines per session
    pub log_capacity: usize,
}

/// Verification configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    /// "now" or "signing-time"
    pub reference_time: String,

    /// Signer info to validate in multi-signer containers
    pub signer_index: usize,
}

impl Default for BrowserSigningConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 180,
            log_to_page: true,
            plugin_script_sources: DEFAULT_PLUGIN_SCRIPT_SOURCES
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            shutdown_grace_ms: 1500,
            log_capacity: 500,
        }
    }
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            reference_time: "now".to_string(),
            signer_index: 0,
        }
    }
}

impl BrowserSigningConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Session settings derived from this configuration.
    #[must_use]
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            log_to_page: self.log_to_page,
            plugin_script_sources: self.plugin_script_sources.clone(),
            shutdown_grace: Duration::from_millis(self.shutdown_grace_ms),
            log_capacity: self.log_capacity,
        }
    }
}

impl VerificationConfig {
    pub fn reference_time(&self) -> SigningResult<ReferenceTime> {
        parse_reference_time(&self.reference_time)
    }
}

/// Parse `now` or `signing-time`.
pub fn parse_reference_time(value: &str) -> SigningResult<ReferenceTime> {
    match value.trim().to_ascii_lowercase().as_str() {
        "now" => Ok(ReferenceTime::Now),
        "signing-time" | "signing_time" => Ok(ReferenceTime::SigningTime),
        other => Err(SigningError::ConfigurationError(format!(
            "Invalid reference time '{other}' (expected 'now' or 'signing-time')"
        ))),
    }
}

/// Configuration manager for handling config files
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new configuration manager with default path
    pub fn new() -> SigningResult<Self> {
        let config_path = Self::default_config_path()?;
        Ok(Self { config_path })
    }

    /// Create a configuration manager with custom path
    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            config_path: path.as_ref().to_path_buf(),
        }
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> SigningResult<PathBuf> {
        if let Some(config_dir) = dirs::config_dir() {
            Ok(config_dir.join("sigstamp").join("config.toml"))
        } else {
            Ok(PathBuf::from("sigstamp-config.toml"))
        }
    }

    /// Load configuration from file, creating default if it doesn't exist
    pub fn load_or_create_default(&self) -> SigningResult<AppConfiguration> {
        if self.config_path.exists() {
            self.load()
        } else {
            log::info!(
                "Configuration file not found, creating default: {}",
                self.config_path.display()
            );
            let default_config = AppConfiguration::default();
            self.save(&default_config)?;
            Ok(default_config)
        }
    }

    /// Load configuration from file, falling back to defaults if it doesn't exist
    pub fn load_or_default(&self) -> SigningResult<AppConfiguration> {
        if self.config_path.exists() {
            self.load()
        } else {
            Ok(AppConfiguration::default())
        }
    }

    /// Load configuration from file
    pub fn load(&self) -> SigningResult<AppConfiguration> {
        log::info!("Loading configuration from: {}", self.config_path.display());

        let content = fs::read_to_string(&self.config_path).map_err(|e| {
            SigningError::ConfigurationError(format!(
                "Failed to read config file {}: {}",
                self.config_path.display(),
                e
            ))
        })?;

        let config: AppConfiguration = toml::from_str(&content).map_err(|e| {
            SigningError::ConfigurationError(format!("Failed to parse config file: {e}"))
        })?;

        validate_config(&config)?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, config: &AppConfiguration) -> SigningResult<()> {
        validate_config(config)?;
        log::info!("Saving configuration to: {}", self.config_path.display());

        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SigningError::ConfigurationError(format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let content = toml::to_string_pretty(config).map_err(|e| {
            SigningError::ConfigurationError(format!("Failed to serialize config: {e}"))
        })?;

        fs::write(&self.config_path, content).map_err(|e| {
            SigningError::ConfigurationError(format!(
                "Failed to write config file {}: {}",
                self.config_path.display(),
                e
            ))
        })?;

        Ok(())
    }

    /// Update a specific configuration value
    pub fn update_value(&self, key: &str, value: &str) -> SigningResult<()> {
        let mut config = self.load_or_default()?;

        match key {
            "browser_signing.timeout_seconds" => {
                config.browser_signing.timeout_seconds = parse_value(key, value)?;
            }
            "browser_signing.log_to_page" => {
                config.browser_signing.log_to_page = parse_value(key, value)?;
            }
            "browser_signing.shutdown_grace_ms" => {
                config.browser_signing.shutdown_grace_ms = parse_value(key, value)?;
            }
            "browser_signing.log_capacity" => {
                config.browser_signing.log_capacity = parse_value(key, value)?;
            }
            "browser_signing.plugin_script_sources" => {
                config.browser_signing.plugin_script_sources = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(ToString::to_string)
                    .collect();
            }
            "verification.reference_time" => {
                parse_reference_time(value)?;
                config.verification.reference_time = value.to_string();
            }
            "verification.signer_index" => {
                config.verification.signer_index = parse_value(key, value)?;
            }
            _ => {
                return Err(SigningError::ConfigurationError(format!(
                    "Unknown configuration key: {key}"
                )));
            }
        }

        self.save(&config)
    }

    /// Get the configuration file path
    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Export configuration as JSON
    pub fn export_json(&self) -> SigningResult<String> {
        let config = self.load_or_default()?;
        serde_json::to_string_pretty(&config)
            .map_err(|e| SigningError::ConfigurationError(format!("JSON export failed: {e}")))
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> SigningResult<T> {
    value.trim().parse().map_err(|_| {
        SigningError::ConfigurationError(format!("Invalid value for {key}: {value}"))
    })
}

/// Validate configuration values
pub fn validate_config(config: &AppConfiguration) -> SigningResult<()> {
    let browser = &config.browser_signing;
    if browser.timeout_seconds == 0 {
        return Err(SigningError::ConfigurationError(
            "Browser signing timeout must be greater than 0".to_string(),
        ));
    }

    if browser.log_capacity == 0 {
        return Err(SigningError::ConfigurationError(
            "Log capacity must be greater than 0".to_string(),
        ));
    }

    for source in &browser.plugin_script_sources {
        if !(source.starts_with("https://")
            || source.starts_with("http://")
            || source.starts_with("chrome-extension://")
            || source.starts_with("moz-extension://"))
        {
            return Err(SigningError::ConfigurationError(format!(
                "Plugin script source has an unsupported scheme: {source}"
            )));
        }
    }

    config.verification.reference_time()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfiguration::default();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.browser_signing.timeout(), Duration::from_secs(180));
        assert_eq!(config.browser_signing.plugin_script_sources.len(), 3);
        assert_eq!(
            config.verification.reference_time().unwrap(),
            ReferenceTime::Now
        );
    }

    #[test]
    fn test_config_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_path(temp_dir.path().join("nested/config.toml"));

        let mut config = AppConfiguration::default();
        config.browser_signing.timeout_seconds = 60;
        config.verification.reference_time = "signing-time".to_string();
        manager.save(&config).unwrap();

        let loaded = manager.load().unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = AppConfiguration::default();
        config.browser_signing.timeout_seconds = 0;
        assert!(matches!(
            validate_config(&config),
            Err(SigningError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_update_value() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_path(temp_dir.path().join("config.toml"));

        manager
            .update_value("browser_signing.log_to_page", "false")
            .unwrap();
        manager
            .update_value("verification.reference_time", "signing-time")
            .unwrap();
        let loaded = manager.load().unwrap();
        assert!(!loaded.browser_signing.log_to_page);
        assert_eq!(
            loaded.verification.reference_time().unwrap(),
            ReferenceTime::SigningTime
        );

        assert!(manager.update_value("unknown.key", "1").is_err());
        assert!(manager
            .update_value("verification.reference_time", "yesterday")
            .is_err());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[browser_signing]\ntimeout_seconds = 30\n").unwrap();

        let loaded = ConfigManager::with_path(&path).load().unwrap();
        assert_eq!(loaded.browser_signing.timeout_seconds, 30);
        assert_eq!(loaded.browser_signing.log_capacity, 500);
        assert_eq!(loaded.verification.signer_index, 0);
    }
}
