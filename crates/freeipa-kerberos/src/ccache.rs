//! File-based credential caches.

use crate::Result;
use freeipa_core::Error;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const CCACHE_FILE_NAME: &str = "ccache";

/// A `FILE:` credential cache.
///
/// Private caches live in a temporary directory that is removed when the cache is dropped.
/// Adopted caches belong to the caller and are left untouched.
#[derive(Debug)]
pub struct CredentialCache {
    path: PathBuf,
    dir: Option<TempDir>,
}

impl CredentialCache {
    /// Creates an empty private cache in a fresh temporary directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Kerberos`] if the directory cannot be created.
    pub fn private() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("freeipa-krb5-")
            .tempdir()
            .map_err(|err| {
                Error::Kerberos(format!("unable to create credential cache directory: {err}"))
            })?;
        Ok(Self {
            path: dir.path().join(CCACHE_FILE_NAME),
            dir: Some(dir),
        })
    }

    /// Wraps an existing cache file.
    ///
    /// Accepts a plain path or a `FILE:` cache name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Kerberos`] if the file does not exist.
    pub fn adopt(path: impl AsRef<Path>) -> Result<Self> {
        let raw = path.as_ref();
        let path = raw
            .to_str()
            .and_then(|s| s.strip_prefix("FILE:"))
            .map_or_else(|| raw.to_path_buf(), PathBuf::from);
        if !path.is_file() {
            return Err(Error::Kerberos(format!(
                "credential cache {} does not exist",
                path.display()
            )));
        }
        Ok(Self { path, dir: None })
    }

    /// Path of the cache file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cache name in `FILE:<path>` form.
    #[must_use]
    pub fn name(&self) -> String {
        format!("FILE:{}", self.path.display())
    }

    /// Returns true if the cache lives in a temporary directory owned by this value.
    #[must_use]
    pub const fn is_private(&self) -> bool {
        self.dir.is_some()
    }
}
