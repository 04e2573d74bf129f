//! Kerberos login flows.

use crate::ccache::CredentialCache;
use crate::credentials::{qualify_principal, CredentialSource};
use crate::kinit::{KinitCommand, TicketTool};
use crate::krb5_conf::Krb5Conf;
use crate::spnego::{default_mechanism, SpnegoAuthenticator, SpnegoMechanism};
use crate::Result;
use freeipa_core::Error;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Acquires Kerberos credentials for one realm.
#[derive(Clone)]
pub struct KerberosLogin {
    realm: String,
    krb5_conf: PathBuf,
    tool: Arc<dyn TicketTool>,
    mechanism: Arc<dyn SpnegoMechanism>,
}

impl KerberosLogin {
    /// Creates a login service using `kinit` and the best SPNEGO mechanism in this build.
    pub fn new(realm: impl Into<String>, krb5_conf: impl Into<PathBuf>) -> Self {
        Self {
            realm: realm.into(),
            krb5_conf: krb5_conf.into(),
            tool: Arc::new(KinitCommand::new()),
            mechanism: default_mechanism(),
        }
    }

    /// Replaces the ticket tool.
    #[must_use]
    pub fn with_ticket_tool(mut self, tool: Arc<dyn TicketTool>) -> Self {
        self.tool = tool;
        self
    }

    /// Replaces the SPNEGO mechanism.
    #[must_use]
    pub fn with_mechanism(mut self, mechanism: Arc<dyn SpnegoMechanism>) -> Self {
        self.mechanism = mechanism;
        self
    }

    /// Realm used to qualify bare user names.
    #[must_use]
    pub fn realm(&self) -> &str {
        &self.realm
    }

    /// Path of the Kerberos configuration.
    #[must_use]
    pub fn krb5_conf(&self) -> &Path {
        &self.krb5_conf
    }

    /// Runs a login and returns the resulting credential.
    ///
    /// Password and keytab logins write a fresh ticket into a private cache. Cache logins adopt
    /// the given file and, unless `assume_preauthenticated` is set, require it to hold a valid
    /// ticket-granting ticket.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Kerberos`] if the configuration cannot be loaded, the realm is not
    /// configured, the exchange fails or no SPNEGO mechanism is available.
    pub async fn login(&self, source: CredentialSource) -> Result<KerberosCredential> {
        let conf = Krb5Conf::load(&self.krb5_conf)?;
        debug!(realm = %self.realm, source = source.kind(), "starting Kerberos login");

        match source {
            CredentialSource::Password { username, password } => {
                conf.ensure_realm(&self.realm)?;
                let principal = qualify_principal(&username, &self.realm);
                let cache = CredentialCache::private()?;
                self.tool
                    .acquire_with_password(&principal, &password, cache.path(), conf.path())
                    .await?;
                self.finish(cache, Some(principal))
            }
            CredentialSource::Keytab { username, keytab } => {
                conf.ensure_realm(&self.realm)?;
                if !keytab.is_file() {
                    return Err(Error::Kerberos(format!(
                        "keytab {} does not exist",
                        keytab.display()
                    )));
                }
                let principal = qualify_principal(&username, &self.realm);
                let cache = CredentialCache::private()?;
                self.tool
                    .acquire_with_keytab(&principal, &keytab, cache.path(), conf.path())
                    .await?;
                self.finish(cache, Some(principal))
            }
            CredentialSource::CredentialCache {
                path,
                assume_preauthenticated,
            } => {
                let cache = CredentialCache::adopt(&path)?;
                let principal = if assume_preauthenticated {
                    None
                } else {
                    Some(
                        self.tool
                            .default_principal(cache.path(), conf.path())
                            .await?,
                    )
                };
                self.finish(cache, principal)
            }
        }
    }

    fn finish(
        &self,
        cache: CredentialCache,
        principal: Option<String>,
    ) -> Result<KerberosCredential> {
        let authenticator = self.mechanism.bind(cache.path(), principal.as_deref())?;
        info!(
            principal = principal.as_deref().unwrap_or("<cache default>"),
            "Kerberos login complete"
        );
        Ok(KerberosCredential {
            principal,
            cache,
            authenticator,
        })
    }
}

impl fmt::Debug for KerberosLogin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KerberosLogin")
            .field("realm", &self.realm)
            .field("krb5_conf", &self.krb5_conf)
            .field("mechanism", &self.mechanism)
            .finish_non_exhaustive()
    }
}

/// Tickets obtained by a [`KerberosLogin`], ready to produce SPNEGO headers.
///
/// A private cache is deleted when the credential is dropped.
#[derive(Debug)]
pub struct KerberosCredential {
    principal: Option<String>,
    cache: CredentialCache,
    authenticator: Arc<dyn SpnegoAuthenticator>,
}

impl KerberosCredential {
    /// The credential cache holding the tickets.
    #[must_use]
    pub const fn cache(&self) -> &CredentialCache {
        &self.cache
    }
}

impl SpnegoAuthenticator for KerberosCredential {
    fn principal(&self) -> Option<&str> {
        self.principal
            .as_deref()
            .or_else(|| self.authenticator.principal())
    }

    fn negotiate_token(&self, host: &str) -> Result<Vec<u8>> {
        self.authenticator.negotiate_token(host)
    }
}
