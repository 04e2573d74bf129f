//! Kerberos credential handling for FreeIPA clients.
//!
//! This crate acquires Kerberos tickets from a password, a keytab or an existing credential
//! cache and turns them into SPNEGO `Authorization: Negotiate` headers for the FreeIPA
//! transport.
//!
//! Ticket exchange is delegated to a [`TicketTool`] (by default the MIT `kinit`/`klist`
//! binaries) and token production to a [`SpnegoMechanism`] (GSSAPI when the `gssapi` feature is
//! enabled).

#![deny(missing_docs)]

mod ccache;
mod credentials;
mod kinit;
mod krb5_conf;
mod login;
mod spnego;

pub use ccache::CredentialCache;
pub use credentials::{qualify_principal, CredentialSource};
pub use kinit::{KinitCommand, TicketTool, DEFAULT_KINIT_TIMEOUT_SECS};
pub use krb5_conf::Krb5Conf;
pub use login::{KerberosCredential, KerberosLogin};
pub use spnego::{default_mechanism, SpnegoAuthenticator, SpnegoMechanism, UnsupportedMechanism};

#[cfg(feature = "gssapi")]
pub use spnego::GssapiMechanism;

/// Convenient result alias that reuses the core error type.
pub type Result<T> = freeipa_core::Result<T>;
