//! Session token storage and `Set-Cookie` handling.

use crate::Result;
use freeipa_core::Error;
use once_cell::sync::Lazy;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};
use tracing::debug;

/// Name of the FreeIPA session cookie.
pub const SESSION_COOKIE_NAME: &str = "ipa_session";

/// Prefix of bearer-style session tokens.
pub const BEARER_TOKEN_PREFIX: &str = "MagBearerToken";

const SESSION_TOKEN_LEN: usize = 32;

static SESSION_COOKIE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^ipa_session=([^;]*)").expect("session cookie pattern is a valid regex")
});

/// Returns true if `token` has the shape of an IPA session token.
#[must_use]
pub fn is_valid_session_token(token: &str) -> bool {
    token.len() == SESSION_TOKEN_LEN || token.starts_with(BEARER_TOKEN_PREFIX)
}

/// Finds the `ipa_session` cookie among `Set-Cookie` header values.
///
/// Headers that set other cookies are skipped.
///
/// # Errors
///
/// Returns [`Error::InvalidSessionCookie`] if an `ipa_session` cookie is present but its value
/// is not a valid session token.
pub fn session_from_set_cookie<'a, I>(headers: I) -> Result<Option<String>>
where
    I: IntoIterator<Item = &'a str>,
{
    for header in headers {
        let Some(captures) = SESSION_COOKIE.captures(header.trim_start()) else {
            continue;
        };
        let token = captures.get(1).map_or("", |m| m.as_str());
        if !is_valid_session_token(token) {
            return Err(Error::InvalidSessionCookie(format!(
                "{SESSION_COOKIE_NAME} value of {} characters is not a session token",
                token.len()
            )));
        }
        return Ok(Some(token.to_string()));
    }
    Ok(None)
}

/// Session token plus the sticky-session policy.
#[derive(Debug)]
pub(crate) struct SessionState {
    token: RwLock<Option<SecretString>>,
    sticky: AtomicBool,
}

impl SessionState {
    pub(crate) fn new(token: Option<String>, sticky: bool) -> Self {
        Self {
            token: RwLock::new(token.map(SecretString::from)),
            sticky: AtomicBool::new(sticky),
        }
    }

    pub(crate) fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|token| token.expose_secret().to_string())
    }

    pub(crate) fn has_token(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub(crate) fn set_token(&self, token: String) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) =
            Some(SecretString::from(token));
    }

    pub(crate) fn clear(&self) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub(crate) fn is_sticky(&self) -> bool {
        self.sticky.load(Ordering::SeqCst)
    }

    pub(crate) fn set_sticky(&self, sticky: bool) {
        self.sticky.store(sticky, Ordering::SeqCst);
    }

    /// Stores the session token carried by `Set-Cookie` headers, if sticky mode is on.
    ///
    /// Returns true if a token was stored. An invalid token leaves the previous one in place.
    pub(crate) fn absorb<'a, I>(&self, set_cookie: I) -> Result<bool>
    where
        I: IntoIterator<Item = &'a str>,
    {
        if !self.is_sticky() {
            return Ok(false);
        }
        match session_from_set_cookie(set_cookie)? {
            Some(token) => {
                debug!("storing IPA session token");
                self.set_token(token);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn token_shapes() {
        assert!(is_valid_session_token(TOKEN));
        assert!(is_valid_session_token("MagBearerToken=abc%3d%3d"));
        assert!(!is_valid_session_token("short"));
        assert!(!is_valid_session_token(""));
        assert!(!is_valid_session_token(&format!("{TOKEN}0")));
    }

    #[test]
    fn parse_session_cookie() {
        let header = format!("ipa_session={TOKEN}; Domain=ipa.example.com; Path=/ipa; HttpOnly; Secure");
        assert_eq!(
            session_from_set_cookie([header.as_str()]).unwrap().as_deref(),
            Some(TOKEN)
        );
    }

    #[test]
    fn parse_bearer_cookie() {
        let header = "ipa_session=MagBearerToken=Zm9vYmFy%3d%3d;path=/ipa;httponly;secure;";
        assert_eq!(
            session_from_set_cookie([header]).unwrap().as_deref(),
            Some("MagBearerToken=Zm9vYmFy%3d%3d")
        );
    }

    #[test]
    fn unrelated_cookies_are_skipped() {
        let headers = ["other=1; Path=/", "ipa_session_hint=x"];
        assert_eq!(session_from_set_cookie(headers).unwrap(), None);

        let cookie = format!("ipa_session={TOKEN}; Path=/ipa");
        let headers = ["other=1; Path=/", cookie.as_str()];
        assert_eq!(
            session_from_set_cookie(headers).unwrap().as_deref(),
            Some(TOKEN)
        );
    }

    #[test]
    fn malformed_session_cookie() {
        let err = session_from_set_cookie(["ipa_session=tooshort; Path=/ipa"]).unwrap_err();
        assert!(matches!(err, Error::InvalidSessionCookie(_)));

        let err = session_from_set_cookie(["ipa_session=; Path=/ipa"]).unwrap_err();
        assert!(matches!(err, Error::InvalidSessionCookie(_)));
    }

    #[test]
    fn absorb_keeps_previous_token_on_error() {
        let state = SessionState::new(Some(TOKEN.to_string()), true);
        assert!(state.absorb(["ipa_session=bogus"]).is_err());
        assert_eq!(state.token().as_deref(), Some(TOKEN));
    }

    #[test]
    fn absorb_replaces_token() {
        let state = SessionState::new(Some(TOKEN.to_string()), true);
        let next = "fedcba9876543210fedcba9876543210";
        let cookie = format!("ipa_session={next}; Path=/ipa");
        assert!(state.absorb([cookie.as_str()]).unwrap());
        assert_eq!(state.token().as_deref(), Some(next));
    }

    #[test]
    fn absorb_ignores_cookies_when_not_sticky() {
        let state = SessionState::new(None, false);
        let cookie = format!("ipa_session={TOKEN}");
        assert!(!state.absorb([cookie.as_str()]).unwrap());
        assert!(state.absorb(["ipa_session=bogus"]).is_ok());
        assert!(!state.has_token());
    }

    #[test]
    fn clear_and_debug_redact() {
        let state = SessionState::new(Some(TOKEN.to_string()), true);
        assert!(!format!("{state:?}").contains(TOKEN));
        state.clear();
        assert_eq!(state.token(), None);
    }
}
