//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Address used when the configuration declares no listener at all.
pub const DEV_LISTENER_ADDRESS: &str = "127.0.0.1:3000";

/// Root configuration for the service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Network listeners, each with its own trusted proxies.
    pub listeners: Vec<ListenerSpec>,

    /// Graceful shutdown settings.
    pub shutdown: ShutdownConfig,

    /// Trusted proxy handling.
    pub trust: TrustConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl ServiceConfig {
    /// Configured listeners, or a single development listener on
    /// [`DEV_LISTENER_ADDRESS`] when none is configured.
    pub fn listeners_or_default(&self) -> Vec<ListenerSpec> {
        if self.listeners.is_empty() {
            tracing::info!(address = DEV_LISTENER_ADDRESS, "No listeners configured, using development listener");
            vec![ListenerSpec::plain(DEV_LISTENER_ADDRESS)]
        } else {
            self.listeners.clone()
        }
    }
}

/// One network endpoint.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ListenerSpec {
    /// Bind address in `host:port` form. A bare `:port` binds all interfaces.
    pub address: String,

    /// Path to the TLS certificate file (PEM).
    #[serde(default)]
    pub tls_cert_path: Option<PathBuf>,

    /// Path to the TLS private key file (PEM).
    #[serde(default)]
    pub tls_key_path: Option<PathBuf>,

    /// CIDR networks whose peers may assert forwarding headers.
    #[serde(default)]
    pub trusted_proxies: Vec<String>,
}

impl ListenerSpec {
    /// A plain HTTP listener that trusts no proxy.
    pub fn plain(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            tls_cert_path: None,
            tls_key_path: None,
            trusted_proxies: Vec::new(),
        }
    }

    pub fn with_tls(mut self, cert: impl Into<PathBuf>, key: impl Into<PathBuf>) -> Self {
        self.tls_cert_path = Some(cert.into());
        self.tls_key_path = Some(key.into());
        self
    }

    pub fn with_trusted_proxies<I, S>(mut self, cidrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.trusted_proxies = cidrs.into_iter().map(Into::into).collect();
        self
    }

    /// Certificate and key paths, if both are set and non-empty.
    pub fn tls_paths(&self) -> Option<(&Path, &Path)> {
        let cert = non_empty(self.tls_cert_path.as_deref())?;
        let key = non_empty(self.tls_key_path.as_deref())?;
        Some((cert, key))
    }

    /// TLS mode iff both certificate and key are configured.
    pub fn is_tls(&self) -> bool {
        self.tls_paths().is_some()
    }
}

fn non_empty(path: Option<&Path>) -> Option<&Path> {
    path.filter(|p| !p.as_os_str().is_empty())
}

/// Graceful shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Time allowed for in-flight requests to drain, in seconds.
    pub timeout_secs: u64,
}

impl ShutdownConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

/// Trusted proxy configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TrustConfig {
    /// What to do when a listener's trusted proxy list is malformed.
    pub on_invalid: InvalidTrustPolicy,
}

/// Reaction to a malformed trusted proxy entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidTrustPolicy {
    /// Keep the listener but never honor forwarding headers on it.
    #[default]
    Distrust,
    /// Refuse to start.
    Abort,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_listeners_from_toml() {
        let config: ServiceConfig = toml::from_str(
            r#"
            [[listeners]]
            address = "0.0.0.0:8080"
            trusted_proxies = ["10.0.0.0/8", "fd00::/8"]

            [[listeners]]
            address = ":8443"
            tls_cert_path = "/etc/edge/cert.pem"
            tls_key_path = "/etc/edge/key.pem"

            [shutdown]
            timeout_secs = 5

            [trust]
            on_invalid = "abort"
            "#,
        )
        .unwrap();

        assert_eq!(config.listeners.len(), 2);
        assert_eq!(config.listeners[0].trusted_proxies, vec!["10.0.0.0/8", "fd00::/8"]);
        assert!(!config.listeners[0].is_tls());
        assert!(config.listeners[1].is_tls());
        assert_eq!(config.shutdown.timeout(), Duration::from_secs(5));
        assert_eq!(config.trust.on_invalid, InvalidTrustPolicy::Abort);
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn tls_requires_cert_and_key() {
        let cert_only = ListenerSpec {
            tls_cert_path: Some("cert.pem".into()),
            ..ListenerSpec::plain("127.0.0.1:443")
        };
        assert!(!cert_only.is_tls());

        let empty_key = ListenerSpec::plain("127.0.0.1:443").with_tls("cert.pem", "");
        assert!(!empty_key.is_tls());

        let both = ListenerSpec::plain("127.0.0.1:443").with_tls("cert.pem", "key.pem");
        assert!(both.is_tls());
    }

    #[test]
    fn empty_config_falls_back_to_dev_listener() {
        let config = ServiceConfig::default();
        let listeners = config.listeners_or_default();
        assert_eq!(listeners, vec![ListenerSpec::plain(DEV_LISTENER_ADDRESS)]);
        assert_eq!(config.trust.on_invalid, InvalidTrustPolicy::Distrust);
    }
}
