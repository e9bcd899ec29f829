//! Server configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clickgate_types::{BlockList, VerifyPolicy};
use clickgate_utils::LogFormat;

use crate::ConfigError;

/// Which built-in renderer produces response bodies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderKind {
    /// Plain JSON object.
    #[default]
    Json,
    /// Minimal styled HTML page, for links opened in a browser.
    Html,
}

/// Configuration for a verification server.
///
/// Can be loaded from a TOML file via [`ServerConfig::from_toml_file`] or
/// built programmatically (e.g. for tests). Set once before serving.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// How long a verification stays open after it is awaited.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Interval between expiry sweeps. `0` disables the sweep, leaving
    /// expiry entirely to incoming visits.
    ///
    /// A swept record is gone: its waiter has already seen `TimedOut`, and
    /// a visit arriving after the sweep answers 401 rather than 410.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Take the client address from `X-Forwarded-For` / `X-Real-IP`.
    /// Only enable behind a proxy that sets these headers.
    #[serde(default)]
    pub trust_forwarded_for: bool,

    /// Response body format.
    #[serde(default)]
    pub render: RenderKind,

    /// Serve over HTTPS.
    #[serde(default)]
    pub use_tls: bool,

    /// PEM certificate chain, required when `use_tls` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_cert: Option<PathBuf>,

    /// PEM private key, required when `use_tls` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_key: Option<PathBuf>,

    /// Expose Prometheus metrics at `/metrics`.
    #[serde(default)]
    pub enable_metrics: bool,

    /// Log format: "human" or "json".
    #[serde(default)]
    pub log_format: LogFormat,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Client addresses that may not verify, with the reason shown to them.
    #[serde(default)]
    pub blocklist: BlockList,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl ServerConfig {
    /// Load and validate configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).expect("ServerConfig is always serializable to TOML")
    }

    /// Check cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.use_tls {
            if self.tls_cert.is_none() {
                return Err(ConfigError::MissingTlsFile("tls_cert"));
            }
            if self.tls_key.is_none() {
                return Err(ConfigError::MissingTlsFile("tls_key"));
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// `None` when the background sweep is disabled.
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }

    /// The read-only policy every visit is judged against.
    pub fn policy(&self) -> VerifyPolicy {
        VerifyPolicy::new(self.timeout(), self.blocklist.clone())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            timeout_secs: default_timeout_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            trust_forwarded_for: false,
            render: RenderKind::default(),
            use_tls: false,
            tls_cert: None,
            tls_key: None,
            enable_metrics: false,
            log_format: LogFormat::default(),
            log_level: default_log_level(),
            blocklist: BlockList::new(),
        }
    }
}
