//! Minimal reader for `krb5.conf`.
//!
//! Only the relations the client checks before running `kinit` are kept: the default realm,
//! the realms declared under `[realms]` and whether the KDC may be located through DNS.
//! `include` and `includedir` directives are followed the way the Kerberos library does.

use crate::Result;
use freeipa_core::Error;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const MAX_INCLUDE_DEPTH: usize = 8;

/// The parts of a Kerberos configuration the client relies on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Krb5Conf {
    path: PathBuf,
    default_realm: Option<String>,
    realms: Vec<String>,
    dns_lookup_kdc: Option<bool>,
    includes: Vec<Include>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Include {
    File(PathBuf),
    Dir(PathBuf),
}

impl Krb5Conf {
    /// Loads a Kerberos configuration file and the files it includes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Kerberos`] if the file or one of its includes cannot be read.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut conf = Self::read(path)?;
        let includes = std::mem::take(&mut conf.includes);
        conf.follow(includes, 1)?;
        debug!(
            path = %path.display(),
            default_realm = conf.default_realm.as_deref().unwrap_or(""),
            realms = conf.realms.len(),
            dns_lookup_kdc = conf.dns_lookup_kdc(),
            "loaded Kerberos configuration"
        );
        Ok(conf)
    }

    /// Parses configuration text that was read from `path`.
    ///
    /// Include directives are recorded but not followed; use [`Krb5Conf::load`] for that.
    #[must_use]
    pub fn parse(path: impl Into<PathBuf>, contents: &str) -> Self {
        let mut section = String::new();
        let mut depth = 0usize;
        let mut default_realm = None;
        let mut realms = Vec::new();
        let mut dns_lookup_kdc = None;
        let mut includes = Vec::new();

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(dir) = line.strip_prefix("includedir") {
                if dir.starts_with(char::is_whitespace) {
                    includes.push(Include::Dir(PathBuf::from(dir.trim())));
                    continue;
                }
            }
            if let Some(file) = line.strip_prefix("include") {
                if file.starts_with(char::is_whitespace) {
                    includes.push(Include::File(PathBuf::from(file.trim())));
                    continue;
                }
            }

            if depth == 0 && line.starts_with('[') && line.ends_with(']') {
                section = line[1..line.len() - 1].trim().to_ascii_lowercase();
                continue;
            }

            if line.starts_with('}') {
                depth = depth.saturating_sub(1);
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();

            if value.starts_with('{') {
                if depth == 0 && section == "realms" {
                    realms.push(key.to_string());
                }
                if !value.ends_with('}') {
                    depth += 1;
                }
                continue;
            }

            if depth == 0 && section == "libdefaults" {
                match key {
                    "default_realm" if default_realm.is_none() => {
                        default_realm = Some(value.to_string());
                    }
                    "dns_lookup_kdc" if dns_lookup_kdc.is_none() => {
                        dns_lookup_kdc = Some(parse_bool(value));
                    }
                    _ => {}
                }
            }
        }

        Self {
            path: path.into(),
            default_realm,
            realms,
            dns_lookup_kdc,
            includes,
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|err| {
            Error::Kerberos(format!(
                "unable to read Kerberos configuration {}: {err}",
                path.display()
            ))
        })?;
        Ok(Self::parse(path, &contents))
    }

    fn follow(&mut self, includes: Vec<Include>, depth: usize) -> Result<()> {
        if includes.is_empty() {
            return Ok(());
        }
        if depth > MAX_INCLUDE_DEPTH {
            return Err(Error::Kerberos(format!(
                "Kerberos configuration {} nests includes too deeply",
                self.path.display()
            )));
        }

        for include in includes {
            let files = match include {
                Include::File(file) => vec![file],
                Include::Dir(dir) => include_dir_files(&dir)?,
            };
            for file in files {
                let mut included = Self::read(&file)?;
                let nested = std::mem::take(&mut included.includes);
                self.merge(included);
                self.follow(nested, depth + 1)?;
            }
        }
        Ok(())
    }

    /// Relations already set win; realm declarations accumulate.
    fn merge(&mut self, other: Self) {
        if self.default_realm.is_none() {
            self.default_realm = other.default_realm;
        }
        if self.dns_lookup_kdc.is_none() {
            self.dns_lookup_kdc = other.dns_lookup_kdc;
        }
        for realm in other.realms {
            if !self.realms.contains(&realm) {
                self.realms.push(realm);
            }
        }
    }

    /// Returns the path the configuration was read from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `[libdefaults] default_realm`, if set.
    #[must_use]
    pub fn default_realm(&self) -> Option<&str> {
        self.default_realm.as_deref()
    }

    /// Returns the realms declared under `[realms]`.
    #[must_use]
    pub fn realms(&self) -> &[String] {
        &self.realms
    }

    /// Returns `[libdefaults] dns_lookup_kdc`, which is on unless set to false.
    #[must_use]
    pub fn dns_lookup_kdc(&self) -> bool {
        self.dns_lookup_kdc.unwrap_or(true)
    }

    /// Returns true if the realm is the default realm or is declared under `[realms]`.
    #[must_use]
    pub fn knows_realm(&self, realm: &str) -> bool {
        self.default_realm.as_deref() == Some(realm) || self.realms.iter().any(|r| r == realm)
    }

    /// Checks that a KDC can be found for the realm.
    ///
    /// Undeclared realms are accepted while DNS lookup of KDCs is enabled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Kerberos`] if the realm is unknown and DNS lookup is disabled.
    pub fn ensure_realm(&self, realm: &str) -> Result<()> {
        if self.knows_realm(realm) || self.dns_lookup_kdc() {
            Ok(())
        } else {
            Err(Error::Kerberos(format!(
                "realm {realm} is not configured in {} and dns_lookup_kdc is off",
                self.path.display()
            )))
        }
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "true" | "yes" | "on" | "1"
    )
}

/// Files read from an `includedir`: names made of alphanumerics, dashes and underscores, or
/// ending in `.conf`, in sorted order.
fn include_dir_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|err| {
        Error::Kerberos(format!(
            "unable to read Kerberos include directory {}: {err}",
            dir.display()
        ))
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| {
                    !name.starts_with('.')
                        && (name.ends_with(".conf")
                            || name
                                .chars()
                                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'))
                })
        })
        .collect();
    files.sort();
    Ok(files)
}
