//! Connection configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::protocol::constants::{
    PORT_COMMAND, PORT_COMMAND_TLS, PORT_SIGNON, PORT_SIGNON_TLS,
};
use crate::transport::TlsPolicy;

/// Host-server client configuration.
///
/// Immutable after construction; a session captures it at creation and
/// never writes it back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server hostname or IP address.
    pub host: String,

    /// User profile name.
    pub user: String,

    /// Cleartext password. Never sent on the wire; only seeded proofs
    /// derived from it travel.
    pub password: String,

    /// Temporary library for caller use (default: "QTEMP").
    #[serde(default = "default_temporary_library")]
    pub temporary_library: String,

    /// Wrap both channels in TLS.
    #[serde(default)]
    pub use_tls: bool,

    /// Accept any server certificate (insecure). Only meaningful with
    /// `use_tls`.
    #[serde(default)]
    pub accept_all_certs: bool,

    /// Sign-on Verify port override; defaults per TLS setting.
    #[serde(default)]
    pub signon_port: Option<u16>,

    /// Remote Command port override; defaults per TLS setting.
    #[serde(default)]
    pub command_port: Option<u16>,

    /// Connect timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Optional read timeout in seconds; unset inherits the socket's
    /// blocking behavior.
    #[serde(default)]
    pub read_timeout_secs: Option<u64>,
}

fn default_temporary_library() -> String {
    "QTEMP".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

impl ClientConfig {
    /// Create a configuration with defaults for everything but the
    /// credentials.
    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            password: password.into(),
            temporary_library: default_temporary_library(),
            use_tls: false,
            accept_all_certs: false,
            signon_port: None,
            command_port: None,
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: None,
        }
    }

    /// Load configuration from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: ClientConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(&path, content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            anyhow::bail!("Host cannot be empty");
        }
        if self.user.is_empty() || self.user.chars().count() > 10 {
            anyhow::bail!("User name must be 1-10 characters");
        }
        if self.password.is_empty() {
            anyhow::bail!("Password cannot be empty");
        }
        if self.temporary_library.chars().count() > 10 {
            anyhow::bail!("Temporary library name must be at most 10 characters");
        }
        if matches!(self.signon_port, Some(0)) || matches!(self.command_port, Some(0)) {
            anyhow::bail!("Port override cannot be zero");
        }
        Ok(())
    }

    /// Effective Sign-on Verify port.
    pub fn signon_port(&self) -> u16 {
        self.signon_port
            .unwrap_or(if self.use_tls { PORT_SIGNON_TLS } else { PORT_SIGNON })
    }

    /// Effective Remote Command port.
    pub fn command_port(&self) -> u16 {
        self.command_port
            .unwrap_or(if self.use_tls { PORT_COMMAND_TLS } else { PORT_COMMAND })
    }

    /// TLS policy for both channels.
    pub fn tls_policy(&self) -> TlsPolicy {
        match (self.use_tls, self.accept_all_certs) {
            (false, _) => TlsPolicy::Off,
            (true, false) => TlsPolicy::Strict,
            (true, true) => TlsPolicy::AcceptAll,
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_secs.map(Duration::from_secs)
    }
}
