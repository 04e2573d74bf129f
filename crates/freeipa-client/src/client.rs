//! Asynchronous FreeIPA JSON-RPC client.

use crate::session::{SessionState, SESSION_COOKIE_NAME};
use crate::Result;
use freeipa_core::client::{build_http_client, ClientConfig};
use freeipa_core::config::IpaConfig;
use freeipa_core::{Error, Options, RpcRequest, RpcResponse, RpcResult};
use freeipa_kerberos::{CredentialSource, KerberosLogin, SpnegoAuthenticator};
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION, COOKIE, REFERER, SET_COOKIE};
use reqwest::{Client, StatusCode};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, trace, warn};
use url::Url;
use validator::Validate;

const JSON_ENDPOINT: &str = "/ipa/json";
const SESSION_JSON_ENDPOINT: &str = "/ipa/session/json";
const LOGIN_PASSWORD_ENDPOINT: &str = "/ipa/session/login_password";
const CHANGE_PASSWORD_ENDPOINT: &str = "/ipa/session/change_password";
const RPC_REFERER: &str = "/ipa/xml";
const FORM_REFERER: &str = "/ipa";

/// Header carrying the reason a web login was refused.
pub const REJECTION_REASON_HEADER: &str = "X-IPA-Rejection-Reason";

/// Header carrying the outcome of a password change.
pub const PWCHANGE_RESULT_HEADER: &str = "X-IPA-Pwchange-Result";

/// Builder for [`IpaClient`].
#[derive(Debug, Clone)]
pub struct IpaClientBuilder {
    config: IpaConfig,
    http_config: ClientConfig,
    http: Option<Client>,
    session: Option<String>,
    sticky: Option<bool>,
    kerberos: Option<Arc<dyn SpnegoAuthenticator>>,
    kerberos_login: Option<KerberosLogin>,
}

impl IpaClientBuilder {
    /// Create a new builder from an [`IpaConfig`].
    #[must_use]
    pub fn new(config: IpaConfig) -> Self {
        Self {
            config,
            http_config: ClientConfig::new(),
            http: None,
            session: None,
            sticky: None,
            kerberos: None,
            kerberos_login: None,
        }
    }

    /// Override the HTTP client configuration used when building the client.
    #[must_use]
    pub fn with_http_config(mut self, http_config: ClientConfig) -> Self {
        self.http_config = http_config;
        self
    }

    /// Use a preconfigured `reqwest` client instead of building one.
    #[must_use]
    pub fn with_http_client(mut self, http: Client) -> Self {
        self.http = Some(http);
        self
    }

    /// Seed the client with an existing session token.
    #[must_use]
    pub fn with_session(mut self, token: impl Into<String>) -> Self {
        self.session = Some(token.into());
        self
    }

    /// Override the sticky-session setting from the configuration.
    #[must_use]
    pub const fn with_sticky_session(mut self, sticky: bool) -> Self {
        self.sticky = Some(sticky);
        self
    }

    /// Install a Kerberos authenticator up front.
    #[must_use]
    pub fn with_kerberos(mut self, authenticator: Arc<dyn SpnegoAuthenticator>) -> Self {
        self.kerberos = Some(authenticator);
        self
    }

    /// Override the service used by the `login_*` methods.
    #[must_use]
    pub fn with_kerberos_login(mut self, login: KerberosLogin) -> Self {
        self.kerberos_login = Some(login);
        self
    }

    /// Finalise the builder and create the [`IpaClient`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the configuration is invalid or the HTTP client cannot
    /// be constructed.
    pub fn build(self) -> Result<IpaClient> {
        self.config.validate()?;
        let base_url = self.config.parse_server_url()?;
        let service_host = base_url
            .host_str()
            .ok_or_else(|| {
                Error::ConfigError(format!("IPA server URL `{base_url}` has no host"))
            })?
            .to_string();
        let host = self.config.host()?;

        let http = match self.http {
            Some(http) => http,
            None => build_http_client(&self.config, &self.http_config)?,
        };

        let login = self.kerberos_login.unwrap_or_else(|| {
            KerberosLogin::new(self.config.realm.clone(), self.config.krb5_conf.clone())
        });
        let sticky = self.sticky.unwrap_or(self.config.sticky_session);

        debug!(%host, realm = %self.config.realm, sticky, "built IPA client");

        Ok(IpaClient {
            inner: Arc::new(ClientInner {
                http,
                rpc_referer: join(&base_url, RPC_REFERER)?.to_string(),
                form_referer: join(&base_url, FORM_REFERER)?.to_string(),
                base_url,
                host,
                service_host,
                realm: self.config.realm,
                session: SessionState::new(self.session, sticky),
                kerberos: RwLock::new(self.kerberos),
                login,
            }),
        })
    }
}

#[derive(Debug)]
struct ClientInner {
    http: Client,
    base_url: Url,
    rpc_referer: String,
    form_referer: String,
    host: String,
    service_host: String,
    realm: String,
    session: SessionState,
    kerberos: RwLock<Option<Arc<dyn SpnegoAuthenticator>>>,
    login: KerberosLogin,
}

/// Asynchronous client for the FreeIPA JSON-RPC API.
///
/// Clones share the session token and the Kerberos credential.
#[derive(Debug, Clone)]
pub struct IpaClient {
    inner: Arc<ClientInner>,
}

impl IpaClient {
    /// Construct a client directly from the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the configuration is invalid.
    pub fn new(config: IpaConfig) -> Result<Self> {
        IpaClientBuilder::new(config).build()
    }

    /// Construct a client from `/etc/ipa/default.conf`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the enrolment file cannot be read.
    pub fn from_default_conf() -> Result<Self> {
        Self::new(IpaConfig::from_default_conf()?)
    }

    /// Start a builder pre-populated with the provided configuration.
    #[must_use]
    pub fn builder(config: IpaConfig) -> IpaClientBuilder {
        IpaClientBuilder::new(config)
    }

    /// Server host, including a non-default port.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.inner.host
    }

    /// Kerberos realm.
    #[must_use]
    pub fn realm(&self) -> &str {
        &self.inner.realm
    }

    /// Base URL of the server.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Current session token.
    #[must_use]
    pub fn session_id(&self) -> Option<String> {
        self.inner.session.token()
    }

    /// Returns true if a session token is stored.
    #[must_use]
    pub fn has_session(&self) -> bool {
        self.inner.session.has_token()
    }

    /// Forgets the session token.
    pub fn clear_session(&self) {
        debug!("clearing IPA session");
        self.inner.session.clear();
    }

    /// Enables or disables storing session cookies from responses.
    pub fn set_sticky_session(&self, sticky: bool) {
        self.inner.session.set_sticky(sticky);
    }

    /// Returns true if session cookies are stored.
    #[must_use]
    pub fn is_sticky_session(&self) -> bool {
        self.inner.session.is_sticky()
    }

    /// Installs a Kerberos authenticator, replacing any previous one.
    pub fn set_kerberos(&self, authenticator: Arc<dyn SpnegoAuthenticator>) {
        *self
            .inner
            .kerberos
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(authenticator);
    }

    /// Removes the Kerberos authenticator.
    pub fn clear_kerberos(&self) {
        *self
            .inner
            .kerberos
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Principal of the installed Kerberos credential, when known.
    #[must_use]
    pub fn kerberos_principal(&self) -> Option<String> {
        self.kerberos()
            .and_then(|auth| auth.principal().map(str::to_string))
    }

    fn kerberos(&self) -> Option<Arc<dyn SpnegoAuthenticator>> {
        self.inner
            .kerberos
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Runs a Kerberos login and installs the resulting credential.
    ///
    /// An existing session token is kept and still takes precedence.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Kerberos`] if the login fails.
    pub async fn login(&self, source: CredentialSource) -> Result<()> {
        let credential = self.inner.login.login(source).await?;
        self.set_kerberos(Arc::new(credential));
        Ok(())
    }

    /// Kerberos login with a user name and password.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Kerberos`] if the realm is not configured or the password is rejected.
    pub async fn login_with_password(&self, username: &str, password: &str) -> Result<()> {
        self.login(CredentialSource::password(username, password))
            .await
    }

    /// Kerberos login with a keytab.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Kerberos`] if the keytab cannot be used.
    pub async fn login_with_keytab(&self, keytab: impl AsRef<Path>, username: &str) -> Result<()> {
        self.login(CredentialSource::keytab(username, keytab.as_ref()))
            .await
    }

    /// Adopts an existing credential cache without a fresh exchange.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Kerberos`] if the cache does not exist.
    pub async fn login_from_ccache(&self, path: impl AsRef<Path>) -> Result<()> {
        self.login(CredentialSource::ccache(path.as_ref())).await
    }

    /// Checks connectivity and authentication with the `ping` method.
    ///
    /// # Errors
    ///
    /// Returns any transport or server error.
    pub async fn ping(&self) -> Result<RpcResult> {
        self.call("ping", Vec::new(), Options::new()).await
    }

    /// Invokes a server method.
    ///
    /// The session cookie is sent when a token is stored; otherwise the Kerberos credential,
    /// when installed, provides a `Negotiate` header.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] for an empty method name, [`Error::HttpStatus`] for a
    /// non-200 answer, [`Error::InvalidSessionCookie`] for a malformed session cookie and
    /// [`Error::Rpc`] when the server reports an error.
    pub async fn call(
        &self,
        method: &str,
        args: Vec<String>,
        options: Options,
    ) -> Result<RpcResult> {
        self.send_rpc(method, args, options).await.map_err(|err| {
            if err.should_log() {
                warn!(method, code = err.error_code(), error = %err, "IPA RPC failed");
            } else {
                debug!(method, code = err.error_code(), error = %err, "IPA RPC returned an error");
            }
            err
        })
    }

    async fn send_rpc(
        &self,
        method: &str,
        args: Vec<String>,
        options: Options,
    ) -> Result<RpcResult> {
        let request = RpcRequest::new(method, args, options)?;

        let session = self.inner.session.token();
        let endpoint = if session.is_some() {
            SESSION_JSON_ENDPOINT
        } else {
            JSON_ENDPOINT
        };

        let mut builder = self
            .inner
            .http
            .post(join(&self.inner.base_url, endpoint)?)
            .header(ACCEPT, "application/json")
            .header(REFERER, &self.inner.rpc_referer)
            .json(&request);

        let auth = if let Some(token) = session {
            builder = builder.header(COOKIE, format!("{SESSION_COOKIE_NAME}={token}"));
            "session"
        } else if let Some(authenticator) = self.kerberos() {
            builder = builder.header(AUTHORIZATION, self.negotiate(authenticator).await?);
            "kerberos"
        } else {
            "none"
        };

        debug!(
            method,
            endpoint,
            auth,
            args = request.params.args.len(),
            "sending IPA RPC request"
        );

        let response = builder.send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            debug!(method, status = status.as_u16(), "IPA RPC request failed");
            return Err(Error::HttpStatus(status.as_u16()));
        }

        self.absorb_session(response.headers())?;

        let body = response.bytes().await?;
        trace!(method, bytes = body.len(), "received IPA RPC response");
        let envelope: RpcResponse = serde_json::from_slice(&body).map_err(|err| {
            Error::ParseError(format!("Failed to decode response to `{method}`: {err}"))
        })?;
        envelope.into_result()
    }

    /// Logs in through the web form and stores the resulting session cookie.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ExpiredPassword`], [`Error::InvalidPassword`] or
    /// [`Error::Unauthorized`] for refused logins and [`Error::HttpStatus`] for other non-200
    /// answers.
    pub async fn remote_login(&self, uid: &str, password: &str) -> Result<()> {
        let response = self
            .inner
            .http
            .post(join(&self.inner.base_url, LOGIN_PASSWORD_ENDPOINT)?)
            .header(REFERER, &self.inner.form_referer)
            .form(&[("user", uid), ("password", password)])
            .send()
            .await?;

        let status = response.status();
        debug!(uid, status = status.as_u16(), "IPA web login answered");

        if status == StatusCode::UNAUTHORIZED {
            return Err(
                match header_value(response.headers(), REJECTION_REASON_HEADER) {
                    Some("password-expired") => Error::ExpiredPassword,
                    Some("invalid-password") => Error::InvalidPassword,
                    _ => Error::Unauthorized,
                },
            );
        }
        if status != StatusCode::OK {
            return Err(Error::HttpStatus(status.as_u16()));
        }

        self.absorb_session(response.headers())?;
        info!(uid, "IPA web login succeeded");
        Ok(())
    }

    /// Changes a password through the password-change form, without expiring it.
    ///
    /// Pass an empty `otp` when the account has no OTP token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PasswordPolicy`] or [`Error::InvalidPassword`] when the server refuses
    /// the change, [`Error::PasswordChangeRejected`] for any other outcome and
    /// [`Error::HttpStatus`] for non-200 answers.
    pub async fn set_password(
        &self,
        username: &str,
        old_password: &str,
        new_password: &str,
        otp: &str,
    ) -> Result<()> {
        let response = self
            .inner
            .http
            .post(join(&self.inner.base_url, CHANGE_PASSWORD_ENDPOINT)?)
            .header(REFERER, &self.inner.form_referer)
            .form(&[
                ("user", username),
                ("otp", otp),
                ("old_password", old_password),
                ("new_password", new_password),
            ])
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(Error::HttpStatus(status.as_u16()));
        }

        let result = header_value(response.headers(), PWCHANGE_RESULT_HEADER).unwrap_or_default();
        debug!(username, result, "IPA password change answered");
        match result {
            "policy-error" => Err(Error::PasswordPolicy),
            "invalid-password" => Err(Error::InvalidPassword),
            ok if ok.eq_ignore_ascii_case("ok") => Ok(()),
            other => Err(Error::PasswordChangeRejected(other.to_string())),
        }
    }

    fn absorb_session(&self, headers: &HeaderMap) -> Result<()> {
        let set_cookie = headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok());
        self.inner.session.absorb(set_cookie)?;
        Ok(())
    }

    async fn negotiate(&self, authenticator: Arc<dyn SpnegoAuthenticator>) -> Result<String> {
        let host = self.inner.service_host.clone();
        tokio::task::spawn_blocking(move || authenticator.authorization_header(&host))
            .await
            .map_err(|err| Error::Kerberos(format!("SPNEGO negotiation task failed: {err}")))?
    }
}

fn join(base: &Url, path: &str) -> Result<Url> {
    base.join(path)
        .map_err(|err| Error::InvalidEndpoint(format!("Invalid IPA path `{path}`: {err}")))
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
