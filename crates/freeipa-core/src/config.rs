//! Configuration structures for FreeIPA clients.
//!
//! [`IpaConfig`] replaces the host, realm and CA bundle that a FreeIPA-enrolled machine keeps
//! under `/etc/ipa`. It is built explicitly, either by hand or from an enrolment file with
//! [`IpaConfig::from_ipa_conf`], and handed to the client constructors.

use crate::Error;
use config::{Config, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use url::Url;
use validator::Validate;

/// Default location of the FreeIPA enrolment configuration.
pub const DEFAULT_IPA_CONF: &str = "/etc/ipa/default.conf";

/// Default location of the FreeIPA CA bundle.
pub const DEFAULT_IPA_CA_CERT: &str = "/etc/ipa/ca.crt";

/// Default location of the Kerberos configuration.
pub const DEFAULT_KRB5_CONF: &str = "/etc/krb5.conf";

/// Realm assumed when the enrolment file does not name one.
pub const DEFAULT_REALM: &str = "LOCAL";

/// Configuration for a FreeIPA client instance.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct IpaConfig {
    /// Base URL of the IPA server (e.g. `https://ipa.example.com`)
    #[validate(url)]
    pub server_url: String,

    /// Kerberos realm served by the IPA server
    #[validate(length(min = 1))]
    pub realm: String,

    /// Whether to verify TLS certificates
    #[serde(default = "default_tls_verify")]
    pub tls_verify: bool,

    /// Optional path to the IPA CA bundle
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_ca_cert: Option<PathBuf>,

    /// Path to the Kerberos configuration used for ticket acquisition
    #[serde(default = "default_krb5_conf")]
    pub krb5_conf: PathBuf,

    /// Whole-request deadline in seconds
    #[validate(range(min = 1, max = 600))]
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Whether session cookies returned by the server are stored and replayed
    #[serde(default = "default_sticky_session")]
    pub sticky_session: bool,
}

const fn default_tls_verify() -> bool {
    true
}

fn default_krb5_conf() -> PathBuf {
    PathBuf::from(DEFAULT_KRB5_CONF)
}

const fn default_request_timeout_secs() -> u64 {
    60
}

const fn default_sticky_session() -> bool {
    true
}

impl IpaConfig {
    /// Create a configuration for the IPA server at `host` (HTTPS).
    ///
    /// # Errors
    ///
    /// Returns an error if the resulting URL is invalid or validation fails.
    pub fn new(host: impl AsRef<str>, realm: impl Into<String>) -> Result<Self, Error> {
        Self::from_url(format!("https://{}", host.as_ref()), realm)
    }

    /// Create a configuration from a full server URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or validation fails.
    pub fn from_url(server_url: impl Into<String>, realm: impl Into<String>) -> Result<Self, Error> {
        let config = Self {
            server_url: server_url.into(),
            realm: realm.into(),
            tls_verify: default_tls_verify(),
            tls_ca_cert: None,
            krb5_conf: default_krb5_conf(),
            request_timeout_secs: default_request_timeout_secs(),
            sticky_session: default_sticky_session(),
        };

        config
            .validate()
            .map_err(|e| Error::ConfigError(format!("Invalid configuration: {e}")))?;

        Ok(config)
    }

    /// Load host and realm from the standard enrolment file and pick up the standard CA bundle
    /// if it exists.
    ///
    /// A machine that is not enrolled has no `/etc/ipa/default.conf`; it gets the same defaults
    /// as an empty enrolment file (`localhost`, realm `LOCAL`).
    ///
    /// # Errors
    ///
    /// Returns an error if `/etc/ipa/default.conf` exists but cannot be parsed or names an
    /// invalid server.
    pub fn from_default_conf() -> Result<Self, Error> {
        let mut config = Self::from_enrolment(Path::new(DEFAULT_IPA_CONF), false)?;
        let ca = PathBuf::from(DEFAULT_IPA_CA_CERT);
        if ca.is_file() {
            config.tls_ca_cert = Some(ca);
        }
        Ok(config)
    }

    /// Load host and realm from an IPA enrolment file (`default.conf` format).
    ///
    /// The `[global]` section's `xmlrpc_uri` supplies the server host (defaulting to
    /// `localhost`) and `realm` supplies the realm (defaulting to `LOCAL`).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or its URI is invalid.
    pub fn from_ipa_conf(path: impl AsRef<Path>) -> Result<Self, Error> {
        Self::from_enrolment(path.as_ref(), true)
    }

    fn from_enrolment(path: &Path, required: bool) -> Result<Self, Error> {
        let name = path.to_str().ok_or_else(|| {
            Error::ConfigError(format!("Non UTF-8 configuration path {}", path.display()))
        })?;
        debug!(path = name, required, "loading IPA configuration");

        let enrolment: EnrolmentFile = Config::builder()
            .add_source(File::new(name, FileFormat::Ini).required(required))
            .build()
            .and_then(Config::try_deserialize)
            .map_err(|err| Error::ConfigError(format!("Failed to load {name}: {err}")))?;

        let uri = enrolment
            .global
            .xmlrpc_uri
            .as_deref()
            .unwrap_or("http://localhost");
        let realm = enrolment.global.realm.as_deref().unwrap_or(DEFAULT_REALM);

        let uri = Url::parse(uri)
            .map_err(|e| Error::ConfigError(format!("Invalid xmlrpc_uri `{uri}`: {e}")))?;
        let host = uri
            .host_str()
            .ok_or_else(|| Error::ConfigError(format!("xmlrpc_uri `{uri}` has no host")))?;
        let host = match uri.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };

        Self::new(host, realm)
    }

    /// Set whether to verify TLS certificates.
    #[must_use]
    pub const fn with_tls_verify(mut self, verify: bool) -> Self {
        self.tls_verify = verify;
        self
    }

    /// Set the CA bundle used to verify the server certificate.
    #[must_use]
    pub fn with_ca_cert(mut self, path: PathBuf) -> Self {
        self.tls_ca_cert = Some(path);
        self
    }

    /// Set the Kerberos configuration path.
    #[must_use]
    pub fn with_krb5_conf(mut self, path: PathBuf) -> Self {
        self.krb5_conf = path;
        self
    }

    /// Set request timeout in seconds.
    #[must_use]
    pub const fn with_timeout(mut self, seconds: u64) -> Self {
        self.request_timeout_secs = seconds;
        self
    }

    /// Enable or disable sticky sessions.
    #[must_use]
    pub const fn with_sticky_session(mut self, sticky: bool) -> Self {
        self.sticky_session = sticky;
        self
    }

    /// Get the request timeout as a Duration.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Parse and validate the server URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed.
    pub fn parse_server_url(&self) -> Result<Url, Error> {
        Url::parse(&self.server_url)
            .map_err(|e| Error::ConfigError(format!("Invalid IPA server URL: {e}")))
    }

    /// Returns the server host, including a non-default port.
    ///
    /// # Errors
    ///
    /// Returns an error if the server URL has no host.
    pub fn host(&self) -> Result<String, Error> {
        let url = self.parse_server_url()?;
        let host = url
            .host_str()
            .ok_or_else(|| Error::ConfigError(format!("IPA server URL `{url}` has no host")))?;
        Ok(match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        })
    }
}

/// The parts of `/etc/ipa/default.conf` the client reads.
#[derive(Debug, Default, Deserialize)]
struct EnrolmentFile {
    #[serde(default)]
    global: EnrolmentGlobal,
}

#[derive(Debug, Default, Deserialize)]
struct EnrolmentGlobal {
    xmlrpc_uri: Option<String>,
    realm: Option<String>,
}
