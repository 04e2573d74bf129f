//! Asynchronous client for the FreeIPA JSON-RPC API.
//!
//! This crate provides [`IpaClient`], which authenticates with a session cookie, a Kerberos
//! ticket or a web-form login, plus typed wrappers for user, group, host, HBAC, sudo and OTP
//! token management.
//!
//! ```no_run
//! use freeipa_client::{IpaClient, IpaConfig};
//!
//! # async fn run() -> freeipa_client::Result<()> {
//! let client = IpaClient::new(IpaConfig::new("ipa.example.com", "EXAMPLE.COM")?)?;
//! client.login_with_password("admin", "secret").await?;
//! let user = client.user_show("jdoe").await?;
//! println!("{} is in {:?}", user.username, user.groups);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]

pub mod client;
pub mod group;
pub mod methods;
pub mod otp;
pub mod session;
pub mod ssh_key;
pub mod user;

pub use client::{IpaClient, IpaClientBuilder, PWCHANGE_RESULT_HEADER, REJECTION_REASON_HEADER};
pub use group::GroupRecord;
pub use methods::FromRpcResult;
pub use otp::{OtpAlgorithm, OtpToken, OtpTokenType};
pub use session::{is_valid_session_token, session_from_set_cookie};
pub use self::ssh_key::SshAuthorizedKey;
pub use user::User;

pub use freeipa_core::client::ClientConfig;
pub use freeipa_core::config::IpaConfig;
pub use freeipa_core::{Error, Options, RpcError, RpcResult, ServerErrorKind};
pub use freeipa_kerberos::{CredentialSource, KerberosLogin, SpnegoAuthenticator};

/// Convenient result alias that reuses the core error type.
pub type Result<T> = freeipa_core::Result<T>;
