//! # Configuration Management
//!
//! This module loads the relay's configuration from multiple sources:
//! - Default values (built into the code)
//! - TOML configuration file (`config.toml`, optional)
//! - Environment variables (with `APP_` prefix)
//!
//! ## Key Rust Concepts Used:
//! - **Serde**: the same structs are read from TOML, env vars and defaults
//! - **Layered sources**: each source only overrides the keys it sets
//! - **Result<T, E>**: a bad value stops startup with a readable message
//!
//! ## Configuration Priority (highest to lowest):
//! 1. `HOST` / `PORT` (deployment platforms set these)
//! 2. Environment variables (`APP_SERVER__PORT`, `APP_UPSTREAM__VOICE`, ...)
//! 3. Configuration file (`config.toml`)
//! 4. Default values (defined in the Default impl)
//!
//! ## Secrets:
//! The upstream API key is not part of `AppConfig`. It is read
//! from `GEMINI_API_KEY` by `api_key_from_env`, so it never shows up in a
//! serialized or logged configuration.

use crate::trips::catalog::TripCatalog;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::env;

/// Name of the environment variable holding the upstream credential.
pub const API_KEY_VAR: &str = "GEMINI_API_KEY";

/// Main application configuration.
///
/// ## Sections:
/// - `server`: where to listen and how to police idle sockets
/// - `upstream`: which conversational model to talk to
/// - `catalog`: the clients, destinations, drivers and origins a trip can use
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub catalog: TripCatalog,
}

/// Server-specific configuration settings.
///
/// ## Heartbeat:
/// Every `heartbeat_interval_secs` the relay pings each client socket. A
/// socket that has shown no sign of life for `client_timeout_secs` is
/// closed, which also closes its upstream session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub heartbeat_interval_secs: u64,
    pub client_timeout_secs: u64,
}

/// Upstream conversational speech service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// WebSocket URL of the bidirectional session endpoint, without the key
    pub endpoint: String,
    /// Model id, with or without the `models/` prefix
    pub model: String,
    /// Prebuilt voice used for the synthesized replies
    pub voice: String,
    /// How long to wait for the session to acknowledge its setup
    pub setup_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                heartbeat_interval_secs: 30,
                client_timeout_secs: 60,
            },
            upstream: UpstreamConfig {
                endpoint: "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent".to_string(),
                model: "models/gemini-2.0-flash-live-001".to_string(),
                voice: "Puck".to_string(),
                setup_timeout_secs: 15,
            },
            catalog: TripCatalog::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from every source in priority order.
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER__PORT=3000`: override the server port
    /// - `APP_UPSTREAM__VOICE=Kore`: pick another voice
    /// - `HOST=0.0.0.0` / `PORT=3000`: special cases for deployment platforms
    ///
    /// Nested keys use a double underscore so that single underscores in
    /// field names (`client_timeout_secs`) survive.
    pub fn load() -> Result<Self> {
        Self::load_from("config")
    }

    /// Same as `load`, with an explicit configuration file path (extension
    /// optional). A missing file is not an error.
    pub fn load_from(path: &str) -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );

        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            bail!("Server port cannot be 0");
        }

        if self.server.heartbeat_interval_secs == 0 {
            bail!("Heartbeat interval must be greater than 0");
        }

        if self.server.client_timeout_secs <= self.server.heartbeat_interval_secs {
            bail!(
                "Client timeout ({}s) must be longer than the heartbeat interval ({}s)",
                self.server.client_timeout_secs,
                self.server.heartbeat_interval_secs
            );
        }

        let endpoint = &self.upstream.endpoint;
        if !(endpoint.starts_with("wss://") || endpoint.starts_with("ws://")) {
            bail!("Upstream endpoint must be a ws:// or wss:// URL, got '{}'", endpoint);
        }

        if self.upstream.model.trim().is_empty() {
            bail!("Upstream model cannot be empty");
        }

        if self.upstream.voice.trim().is_empty() {
            bail!("Upstream voice cannot be empty");
        }

        if self.upstream.setup_timeout_secs == 0 {
            bail!("Upstream setup timeout must be greater than 0");
        }

        self.catalog.validate()
    }

    /// Read the upstream credential. Absent or blank is a startup error.
    pub fn api_key_from_env() -> Result<String> {
        match env::var(API_KEY_VAR) {
            Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
            Ok(_) => bail!("{} is set but empty", API_KEY_VAR),
            Err(_) => bail!("{} is not set; the relay cannot open upstream sessions without it", API_KEY_VAR),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert!(config.upstream.endpoint.starts_with("wss://"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.server.client_timeout_secs = config.server.heartbeat_interval_secs;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.upstream.endpoint = "https://example.test".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.catalog.drivers.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[upstream]
voice = "Kore"
setup_timeout_secs = 5

[catalog]
drivers = ["Ana"]
origins = []

[[catalog.clients]]
name = "Solo Client"
destinations = ["Only Stop"]
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.upstream.voice, "Kore");
        assert_eq!(config.upstream.setup_timeout_secs, 5);
        assert_eq!(config.catalog.drivers, vec!["Ana".to_string()]);
        assert_eq!(config.catalog.client_names(), vec!["Solo Client"]);
        // untouched keys keep their defaults
        assert_eq!(config.upstream.model, AppConfig::default().upstream.model);
    }
}
