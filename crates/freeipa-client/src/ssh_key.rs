//! SSH public keys in `authorized_keys` format.

use crate::Result;
use freeipa_core::Error;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use ::ssh_key::authorized_keys::Entry;
use ::ssh_key::{HashAlg, PublicKey};
use std::fmt;
use std::str::FromStr;

/// One `authorized_keys` line: optional options, the public key and its comment.
#[derive(Debug, Clone)]
pub struct SshAuthorizedKey {
    options: Vec<String>,
    key_type: String,
    public_key: PublicKey,
    fingerprint: String,
    line: String,
}

impl SshAuthorizedKey {
    /// Parses an `authorized_keys` line.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ParseError`] if the line has no key, the options are malformed or the
    /// key data does not decode as the declared algorithm.
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Err(Error::ParseError("empty SSH public key".to_string()));
        }

        let entry = Entry::from_str(line).map_err(ssh_error)?;
        let options: Vec<String> = entry.config_opts().iter().map(str::to_string).collect();
        let public_key = entry.public_key().clone();
        let encoded = public_key.to_openssh().map_err(ssh_error)?;
        let line = if options.is_empty() {
            encoded
        } else {
            format!("{} {encoded}", options.join(","))
        };

        Ok(Self {
            options,
            key_type: public_key.algorithm().as_str().to_string(),
            fingerprint: public_key.fingerprint(HashAlg::Sha256).to_string(),
            public_key,
            line,
        })
    }

    /// Key options (e.g. `no-pty`, `from="10.0.0.0/8"`).
    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    /// Key type (e.g. `ssh-ed25519`).
    #[must_use]
    pub fn key_type(&self) -> &str {
        &self.key_type
    }

    /// The decoded public key.
    #[must_use]
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Trailing comment, possibly empty.
    #[must_use]
    pub fn comment(&self) -> &str {
        self.public_key.comment()
    }

    /// OpenSSH `SHA256:` fingerprint.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

impl PartialEq for SshAuthorizedKey {
    fn eq(&self, other: &Self) -> bool {
        self.line == other.line
    }
}

impl Eq for SshAuthorizedKey {}

impl fmt::Display for SshAuthorizedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.line)
    }
}

impl FromStr for SshAuthorizedKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for SshAuthorizedKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.line)
    }
}

impl<'de> Deserialize<'de> for SshAuthorizedKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let line = String::deserialize(deserializer)?;
        Self::parse(&line).map_err(serde::de::Error::custom)
    }
}

fn ssh_error(err: ::ssh_key::Error) -> Error {
    Error::ParseError(format!("invalid SSH public key: {err}"))
}
