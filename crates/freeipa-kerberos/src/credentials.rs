//! Sources of Kerberos credentials.

use secrecy::SecretString;
use std::path::PathBuf;

/// Where a Kerberos login gets its initial credentials from.
#[derive(Debug)]
pub enum CredentialSource {
    /// Password-based AS exchange.
    Password {
        /// User name, bare or fully qualified
        username: String,
        /// Account password
        password: SecretString,
    },
    /// Keytab-based AS exchange.
    Keytab {
        /// User name, bare or fully qualified
        username: String,
        /// Path to the keytab file
        keytab: PathBuf,
    },
    /// An existing credential cache.
    CredentialCache {
        /// Path to the cache file
        path: PathBuf,
        /// Skip checking the cache for a valid ticket-granting ticket
        assume_preauthenticated: bool,
    },
}

impl CredentialSource {
    /// Password credentials.
    pub fn password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Password {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    /// Keytab credentials.
    pub fn keytab(username: impl Into<String>, keytab: impl Into<PathBuf>) -> Self {
        Self::Keytab {
            username: username.into(),
            keytab: keytab.into(),
        }
    }

    /// An existing credential cache that is trusted without validation.
    pub fn ccache(path: impl Into<PathBuf>) -> Self {
        Self::CredentialCache {
            path: path.into(),
            assume_preauthenticated: true,
        }
    }

    /// Short label for logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Password { .. } => "password",
            Self::Keytab { .. } => "keytab",
            Self::CredentialCache { .. } => "ccache",
        }
    }
}

/// Qualifies a bare user name with the realm (`jdoe` becomes `jdoe@EXAMPLE.COM`).
///
/// Names that already carry a realm are returned unchanged.
#[must_use]
pub fn qualify_principal(username: &str, realm: &str) -> String {
    if username.contains('@') {
        username.to_string()
    } else {
        format!("{username}@{realm}")
    }
}
