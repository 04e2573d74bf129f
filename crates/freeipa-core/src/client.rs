//! HTTP client utilities.
//!
//! This module provides the HTTP client configuration used to talk to a FreeIPA server and the
//! construction of the underlying `reqwest` client, including the CA trust store.

use crate::config::IpaConfig;
use crate::Error;
use reqwest::{Client, ClientBuilder};
use std::time::Duration;
use tracing::{debug, warn};

/// Default TCP connect timeout (seconds)
pub const DEFAULT_CONNECT_TIMEOUT: u64 = 30;

/// Default idle timeout for connection pools (seconds)
pub const DEFAULT_POOL_IDLE_TIMEOUT: u64 = 90;

/// Default maximum idle connections per host
pub const DEFAULT_POOL_MAX_IDLE_PER_HOST: usize = 100;

/// HTTP client configuration.
///
/// Configures connection setup and pooling. The whole-request deadline belongs to
/// [`IpaConfig::timeout`]. Failed requests are never retried.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// TCP connect timeout
    pub connect_timeout: Duration,

    /// Connection pool idle timeout
    pub pool_idle_timeout: Duration,

    /// Maximum idle connections per host
    pub pool_max_idle_per_host: usize,

    /// Enable response compression
    pub enable_compression: bool,

    /// User agent sent with every request
    pub user_agent: String,
}

impl ClientConfig {
    /// Create a new client configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT),
            pool_idle_timeout: Duration::from_secs(DEFAULT_POOL_IDLE_TIMEOUT),
            pool_max_idle_per_host: DEFAULT_POOL_MAX_IDLE_PER_HOST,
            enable_compression: true,
            user_agent: concat!("freeipa-rs/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    /// Set connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set connection pool idle timeout.
    #[must_use]
    pub const fn with_pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = timeout;
        self
    }

    /// Set maximum idle connections per host.
    #[must_use]
    pub const fn with_pool_max_idle(mut self, max: usize) -> Self {
        self.pool_max_idle_per_host = max;
        self
    }

    /// Enable or disable compression.
    #[must_use]
    pub const fn with_compression(mut self, enabled: bool) -> Self {
        self.enable_compression = enabled;
        self
    }

    /// Override the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the HTTP client for an IPA server.
///
/// The request deadline comes from [`IpaConfig::timeout`]; TLS verification and the CA bundle
/// come from the same configuration. Cookies are not stored by the HTTP layer: the session
/// token is managed by the IPA client itself.
///
/// # Errors
///
/// Returns [`Error::ConfigError`] if the CA bundle cannot be read or parsed, or the client
/// cannot be constructed.
pub fn build_http_client(config: &IpaConfig, http_config: &ClientConfig) -> Result<Client, Error> {
    let mut builder = ClientBuilder::new()
        .user_agent(http_config.user_agent.as_str())
        .timeout(config.timeout())
        .connect_timeout(http_config.connect_timeout)
        .pool_idle_timeout(http_config.pool_idle_timeout)
        .pool_max_idle_per_host(http_config.pool_max_idle_per_host)
        .gzip(http_config.enable_compression);

    if !config.tls_verify {
        warn!("TLS verification disabled for IPA client");
        builder = builder.danger_accept_invalid_certs(true);
    }

    if let Some(ca_cert) = &config.tls_ca_cert {
        debug!("loading IPA CA certificate from {}", ca_cert.display());
        let bytes = std::fs::read(ca_cert).map_err(|err| {
            Error::ConfigError(format!(
                "Failed to read IPA CA certificate {}: {err}",
                ca_cert.display()
            ))
        })?;
        let certs = reqwest::Certificate::from_pem_bundle(&bytes)
            .map_err(|err| Error::ConfigError(format!("Invalid IPA CA certificate: {err}")))?;
        if certs.is_empty() {
            return Err(Error::ConfigError(format!(
                "No certificates found in {}",
                ca_cert.display()
            )));
        }
        for cert in certs {
            builder = builder.add_root_certificate(cert);
        }
    }

    builder
        .build()
        .map_err(|err| Error::ConfigError(format!("Failed to build IPA HTTP client: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    #[test]
    fn test_timeout_constants() {
        assert_eq!(DEFAULT_CONNECT_TIMEOUT, 30);
        assert_eq!(DEFAULT_POOL_IDLE_TIMEOUT, 90);
    }

    #[test]
    fn test_client_config_new() {
        let config = ClientConfig::new();
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert!(config.enable_compression);
        assert!(config.user_agent.starts_with("freeipa-rs/"));
    }

    #[test]
    fn test_client_config_builder() {
        let config = ClientConfig::new()
            .with_connect_timeout(Duration::from_secs(5))
            .with_pool_idle_timeout(Duration::from_secs(120))
            .with_pool_max_idle(20)
            .with_compression(false)
            .with_user_agent("test-agent");

        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.pool_idle_timeout, Duration::from_secs(120));
        assert_eq!(config.pool_max_idle_per_host, 20);
        assert!(!config.enable_compression);
        assert_eq!(config.user_agent, "test-agent");
    }

    #[test]
    fn test_build_http_client_default() {
        let config = IpaConfig::new("ipa.example.com", "EXAMPLE.COM").unwrap();
        assert!(build_http_client(&config, &ClientConfig::default()).is_ok());
    }

    #[test]
    fn test_build_http_client_missing_ca() {
        let config = IpaConfig::new("ipa.example.com", "EXAMPLE.COM")
            .unwrap()
            .with_ca_cert(PathBuf::from("/nonexistent/ca.crt"));
        let result = build_http_client(&config, &ClientConfig::default());
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_build_http_client_empty_ca_bundle() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not a certificate").unwrap();
        let config = IpaConfig::new("ipa.example.com", "EXAMPLE.COM")
            .unwrap()
            .with_ca_cert(file.path().to_path_buf());
        let result = build_http_client(&config, &ClientConfig::default());
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }
}
