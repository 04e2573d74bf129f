//! Ticket acquisition through the MIT Kerberos command line tools.

use crate::Result;
use async_trait::async_trait;
use freeipa_core::Error;
use secrecy::{ExposeSecret, SecretString};
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, trace};

/// Default deadline for a single `kinit`/`klist` run (seconds).
pub const DEFAULT_KINIT_TIMEOUT_SECS: u64 = 30;

/// Performs the Kerberos AS exchange and inspects credential caches.
///
/// All methods receive the path of the `krb5.conf` to use and the cache file to read or write.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TicketTool: Send + Sync {
    /// Obtains a ticket-granting ticket with a password and stores it in `ccache`.
    async fn acquire_with_password(
        &self,
        principal: &str,
        password: &SecretString,
        ccache: &Path,
        krb5_conf: &Path,
    ) -> Result<()>;

    /// Obtains a ticket-granting ticket with a keytab and stores it in `ccache`.
    async fn acquire_with_keytab(
        &self,
        principal: &str,
        keytab: &Path,
        ccache: &Path,
        krb5_conf: &Path,
    ) -> Result<()>;

    /// Returns the default principal of a cache holding a valid ticket-granting ticket.
    async fn default_principal(&self, ccache: &Path, krb5_conf: &Path) -> Result<String>;
}

/// [`TicketTool`] backed by the `kinit` and `klist` binaries.
#[derive(Debug, Clone)]
pub struct KinitCommand {
    kinit: PathBuf,
    klist: PathBuf,
    timeout: Duration,
}

impl KinitCommand {
    /// Uses `kinit` and `klist` from `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            kinit: PathBuf::from("kinit"),
            klist: PathBuf::from("klist"),
            timeout: Duration::from_secs(DEFAULT_KINIT_TIMEOUT_SECS),
        }
    }

    /// Overrides the binary locations.
    #[must_use]
    pub fn with_binaries(mut self, kinit: impl Into<PathBuf>, klist: impl Into<PathBuf>) -> Self {
        self.kinit = kinit.into();
        self.klist = klist.into();
        self
    }

    /// Overrides the per-run deadline.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run(&self, mut command: Command, stdin: Option<&[u8]>, tool: &str) -> Result<Output> {
        command
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command
            .spawn()
            .map_err(|err| Error::Kerberos(format!("unable to run {tool}: {err}")))?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input)
                .await
                .map_err(|err| Error::Kerberos(format!("unable to write to {tool}: {err}")))?;
            pipe.write_all(b"\n")
                .await
                .map_err(|err| Error::Kerberos(format!("unable to write to {tool}: {err}")))?;
        }

        let output = timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| Error::Timeout(format!("{tool} did not finish in time")))?
            .map_err(|err| Error::Kerberos(format!("{tool} failed: {err}")))?;
        trace!(tool, status = ?output.status, "Kerberos tool finished");
        Ok(output)
    }
}

impl Default for KinitCommand {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TicketTool for KinitCommand {
    async fn acquire_with_password(
        &self,
        principal: &str,
        password: &SecretString,
        ccache: &Path,
        krb5_conf: &Path,
    ) -> Result<()> {
        debug!(principal, "requesting ticket-granting ticket with password");
        let mut command = Command::new(&self.kinit);
        command
            .env("KRB5_CONFIG", krb5_conf)
            .arg("-c")
            .arg(cache_name(ccache))
            .arg(principal);
        let output = self
            .run(command, Some(password.expose_secret().as_bytes()), "kinit")
            .await?;
        ensure_success(&output, "kinit", principal)
    }

    async fn acquire_with_keytab(
        &self,
        principal: &str,
        keytab: &Path,
        ccache: &Path,
        krb5_conf: &Path,
    ) -> Result<()> {
        debug!(principal, keytab = %keytab.display(), "requesting ticket-granting ticket with keytab");
        let mut command = Command::new(&self.kinit);
        command
            .env("KRB5_CONFIG", krb5_conf)
            .arg("-k")
            .arg("-t")
            .arg(keytab)
            .arg("-c")
            .arg(cache_name(ccache))
            .arg(principal);
        let output = self.run(command, None, "kinit").await?;
        ensure_success(&output, "kinit", principal)
    }

    async fn default_principal(&self, ccache: &Path, krb5_conf: &Path) -> Result<String> {
        let mut check = Command::new(&self.klist);
        check
            .env("KRB5_CONFIG", krb5_conf)
            .arg("-s")
            .arg("-c")
            .arg(cache_name(ccache));
        let output = self.run(check, None, "klist").await?;
        if !output.status.success() {
            return Err(Error::Kerberos(format!(
                "credential cache {} holds no valid ticket-granting ticket",
                ccache.display()
            )));
        }

        let mut list = Command::new(&self.klist);
        list.env("KRB5_CONFIG", krb5_conf)
            .arg("-c")
            .arg(cache_name(ccache));
        let output = self.run(list, None, "klist").await?;
        ensure_success(&output, "klist", &ccache.display().to_string())?;
        parse_default_principal(&String::from_utf8_lossy(&output.stdout)).ok_or_else(|| {
            Error::Kerberos(format!(
                "credential cache {} has no default principal",
                ccache.display()
            ))
        })
    }
}

fn cache_name(ccache: &Path) -> String {
    format!("FILE:{}", ccache.display())
}

fn ensure_success(output: &Output, tool: &str, subject: &str) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(Error::Kerberos(format!(
        "{tool} failed for {subject}: {}",
        stderr.trim()
    )))
}

/// Extracts the default principal from `klist` output (MIT or Heimdal layout).
fn parse_default_principal(stdout: &str) -> Option<String> {
    stdout.lines().find_map(|line| {
        let line = line.trim();
        line.strip_prefix("Default principal:")
            .or_else(|| line.strip_prefix("Principal:"))
            .map(|principal| principal.trim().to_string())
            .filter(|principal| !principal.is_empty())
    })
}
