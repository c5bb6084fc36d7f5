//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The session signing secret is loaded from SESSION_SECRET or
//! `session.secret_file`, never stored in the TOML directly.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use common::Secret;
use serde::Deserialize;

/// Minimum session secret length accepted for cookie signing.
pub const MIN_SECRET_LEN: usize = 32;

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub identity_provider: IdentityProviderConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub launcher: LauncherConfig,
    pub store: StoreConfig,
}

/// HTTP listener settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Upstream OAuth2 / OIDC provider
#[derive(Debug, Deserialize)]
pub struct IdentityProviderConfig {
    pub base_url: String,
    pub client_id: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Client-held session cookie
#[derive(Debug, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    #[serde(default = "default_cookie_max_age")]
    pub max_age_secs: u64,
    #[serde(default = "default_secure")]
    pub secure: bool,
    /// Path to a file containing the signing secret (alternative to SESSION_SECRET)
    #[serde(default)]
    pub secret_file: Option<PathBuf>,
    #[serde(skip)]
    pub secret: Option<Secret<String>>,
}

#[derive(Debug, Deserialize)]
pub struct LauncherConfig {
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct StoreConfig {
    pub path: PathBuf,
}

fn default_max_connections() -> usize {
    1000
}

fn default_timeout() -> u64 {
    collection_auth::DEFAULT_TIMEOUT_SECS
}

fn default_cookie_name() -> String {
    "collection_session".into()
}

fn default_cookie_max_age() -> u64 {
    7 * 24 * 60 * 60
}

fn default_secure() -> bool {
    true
}

fn default_session_ttl() -> u64 {
    launcher_keys::DEFAULT_SESSION_TTL.as_secs()
}

fn default_sweep_interval() -> u64 {
    3600
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            max_age_secs: default_cookie_max_age(),
            secure: default_secure(),
            secret_file: None,
            secret: None,
        }
    }
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: default_session_ttl(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl IdentityProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl LauncherConfig {
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Session secret resolution order:
    /// 1. SESSION_SECRET env var
    /// 2. secret_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        let base_url = &config.identity_provider.base_url;
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(common::Error::Config(format!(
                "identity_provider.base_url must start with http:// or https://, got: {base_url}"
            )));
        }

        if config.identity_provider.client_id.trim().is_empty() {
            return Err(common::Error::Config(
                "identity_provider.client_id must not be empty".into(),
            ));
        }

        if config.identity_provider.timeout_secs == 0 {
            return Err(common::Error::Config(
                "identity_provider.timeout_secs must be greater than 0".into(),
            ));
        }

        if config.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        if config.launcher.session_ttl_secs == 0 {
            return Err(common::Error::Config(
                "launcher.session_ttl_secs must be greater than 0".into(),
            ));
        }

        if config.launcher.sweep_interval_secs == 0 {
            return Err(common::Error::Config(
                "launcher.sweep_interval_secs must be greater than 0".into(),
            ));
        }

        if let Ok(secret) = std::env::var("SESSION_SECRET") {
            config.session.secret = Some(Secret::new(secret));
        } else if let Some(ref secret_file) = config.session.secret_file {
            let secret = std::fs::read_to_string(secret_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read secret_file {}: {e}",
                    secret_file.display()
                ))
            })?;
            let secret = secret.trim().to_owned();
            if !secret.is_empty() {
                config.session.secret = Some(Secret::new(secret));
            }
        }

        match &config.session.secret {
            None => {
                return Err(common::Error::Config(
                    "session secret missing: set SESSION_SECRET or session.secret_file".into(),
                ));
            }
            Some(secret) if secret.as_str().len() < MIN_SECRET_LEN => {
                return Err(common::Error::Config(format!(
                    "session secret must be at least {MIN_SECRET_LEN} bytes"
                )));
            }
            Some(_) => {}
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("collection-gateway.toml")
    }
}
