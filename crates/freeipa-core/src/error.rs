//! Error types for FreeIPA operations.
//!
//! Every failure surfaced by the client crates is a variant of [`Error`]. Variants fall into a
//! small taxonomy (see [`ErrorCategory`]): transport failures, protocol errors reported by the
//! server inside the JSON envelope, authentication failures, decoding failures and local
//! configuration or usage errors.
//!
//! Server-reported errors keep their numeric code in [`RpcError`]; codes the client knows about
//! are given stable identities through [`ServerErrorKind`] so callers can branch on them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for FreeIPA operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The server answered with a non-200 HTTP status
    #[error("IPA RPC call failed with HTTP status code: {0}")]
    HttpStatus(u16),

    /// The server sent an `ipa_session` cookie that is neither a 32 character token nor a
    /// bearer token
    #[error("Invalid set-cookie header: {0}")]
    InvalidSessionCookie(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// Operation timed out
    #[error("Timeout waiting for IPA server: {0}")]
    Timeout(String),

    /// The server could not be reached
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Error reported by the server inside the JSON-RPC envelope
    #[error(transparent)]
    Rpc(RpcError),

    /// The account password has expired
    #[error("password expired")]
    ExpiredPassword,

    /// The supplied password was rejected
    #[error("invalid current password")]
    InvalidPassword,

    /// The server refused to authenticate the caller
    #[error("unauthorized")]
    Unauthorized,

    /// The user account already exists
    #[error("user account already exists")]
    UserExists,

    /// A new password does not conform to the password policy
    #[error("password does not conform to policy")]
    PasswordPolicy,

    /// The password-change endpoint returned an unexpected status
    #[error("Password change failed with status: {0}")]
    PasswordChangeRejected(String),

    /// Kerberos credential acquisition or SPNEGO negotiation failed
    #[error("Kerberos authentication failed: {0}")]
    Kerberos(String),

    /// Failed to decode a server response
    #[error("Failed to parse IPA response: {0}")]
    ParseError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Invalid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Invalid endpoint
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Specialized result type for FreeIPA operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of [`Error`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// HTTP-level failures, including malformed session cookies.
    Transport,
    /// Errors reported by the server inside the JSON envelope.
    Protocol,
    /// Rejected, expired or unobtainable credentials.
    Authentication,
    /// Malformed responses.
    Decoding,
    /// Local configuration or caller mistakes.
    Configuration,
}

/// Error object carried in the `error` member of a JSON-RPC response.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("ipa: error {code} - {message}")]
pub struct RpcError {
    /// Numeric server error code
    pub code: i64,
    /// Human-readable message
    #[serde(default)]
    pub message: String,
    /// Server-side error class name (e.g. `DuplicateEntry`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl RpcError {
    /// Creates an error with the given code and message.
    #[must_use]
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            name: None,
        }
    }

    /// Returns the sentinel for this error code, if the code is known.
    #[must_use]
    pub const fn kind(&self) -> Option<ServerErrorKind> {
        ServerErrorKind::from_code(self.code)
    }

    /// Returns true if the error carries the code of `kind`.
    #[must_use]
    pub const fn is(&self, kind: ServerErrorKind) -> bool {
        self.code == kind.code()
    }
}

/// Stable identities for server error codes the client knows about.
///
/// Any code not listed here is reported through [`RpcError`] unchanged and must be treated
/// generically by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[non_exhaustive]
pub enum ServerErrorKind {
    /// Generic authentication failure (1000)
    AuthenticationError,
    /// Kerberos failure on the server side (1100)
    KerberosError,
    /// The Kerberos ticket has expired (1104)
    TicketExpired,
    /// Session failure (1200)
    SessionError,
    /// The session password was rejected (1201)
    InvalidSessionPassword,
    /// The password has expired (1202)
    PasswordExpired,
    /// The Kerberos principal has expired (1203)
    KrbPrincipalExpired,
    /// The account is locked (1204)
    UserLocked,
    /// Generic authorization failure (2000)
    AuthorizationError,
    /// An access-control instruction denied the operation (2100)
    AciError,
    /// A required argument or option is missing (3007)
    RequirementError,
    /// Argument validation failed (3009)
    ValidationError,
    /// Entity not found (4001)
    NotFound,
    /// Entity already exists (4002)
    DuplicateEntry,
    /// Entry is already enabled (4009)
    AlreadyActive,
    /// Entry is already disabled (4010)
    AlreadyInactive,
    /// Not a member of the group (4012)
    NotGroupMember,
    /// Already a member of the group (4014)
    AlreadyGroupMember,
    /// Directory failure (4200)
    LdapError,
    /// Concurrent modification (4201)
    MidairCollision,
    /// No modifications to be performed (4202)
    EmptyModlist,
    /// Directory database failure (4203)
    DatabaseError,
}

impl ServerErrorKind {
    /// Maps a numeric server code onto its sentinel.
    #[must_use]
    pub const fn from_code(code: i64) -> Option<Self> {
        let kind = match code {
            1000 => Self::AuthenticationError,
            1100 => Self::KerberosError,
            1104 => Self::TicketExpired,
            1200 => Self::SessionError,
            1201 => Self::InvalidSessionPassword,
            1202 => Self::PasswordExpired,
            1203 => Self::KrbPrincipalExpired,
            1204 => Self::UserLocked,
            2000 => Self::AuthorizationError,
            2100 => Self::AciError,
            3007 => Self::RequirementError,
            3009 => Self::ValidationError,
            4001 => Self::NotFound,
            4002 => Self::DuplicateEntry,
            4009 => Self::AlreadyActive,
            4010 => Self::AlreadyInactive,
            4012 => Self::NotGroupMember,
            4014 => Self::AlreadyGroupMember,
            4200 => Self::LdapError,
            4201 => Self::MidairCollision,
            4202 => Self::EmptyModlist,
            4203 => Self::DatabaseError,
            _ => return None,
        };
        Some(kind)
    }

    /// Returns the numeric server code.
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::AuthenticationError => 1000,
            Self::KerberosError => 1100,
            Self::TicketExpired => 1104,
            Self::SessionError => 1200,
            Self::InvalidSessionPassword => 1201,
            Self::PasswordExpired => 1202,
            Self::KrbPrincipalExpired => 1203,
            Self::UserLocked => 1204,
            Self::AuthorizationError => 2000,
            Self::AciError => 2100,
            Self::RequirementError => 3007,
            Self::ValidationError => 3009,
            Self::NotFound => 4001,
            Self::DuplicateEntry => 4002,
            Self::AlreadyActive => 4009,
            Self::AlreadyInactive => 4010,
            Self::NotGroupMember => 4012,
            Self::AlreadyGroupMember => 4014,
            Self::LdapError => 4200,
            Self::MidairCollision => 4201,
            Self::EmptyModlist => 4202,
            Self::DatabaseError => 4203,
        }
    }
}

impl Error {
    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::HttpStatus(_) => "HTTP_STATUS",
            Self::InvalidSessionCookie(_) => "INVALID_SESSION_COOKIE",
            Self::HttpError(_) => "HTTP_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::Rpc(_) => "RPC_ERROR",
            Self::ExpiredPassword => "EXPIRED_PASSWORD",
            Self::InvalidPassword => "INVALID_PASSWORD",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::UserExists => "USER_EXISTS",
            Self::PasswordPolicy => "PASSWORD_POLICY",
            Self::PasswordChangeRejected(_) => "PASSWORD_CHANGE_REJECTED",
            Self::Kerberos(_) => "KERBEROS_ERROR",
            Self::ParseError(_) => "PARSE_ERROR",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::InvalidEndpoint(_) => "INVALID_ENDPOINT",
        }
    }

    /// Returns the taxonomy bucket of this error.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::HttpStatus(_)
            | Self::InvalidSessionCookie(_)
            | Self::HttpError(_)
            | Self::Timeout(_)
            | Self::ServiceUnavailable(_) => ErrorCategory::Transport,
            Self::Rpc(_) => ErrorCategory::Protocol,
            Self::ExpiredPassword
            | Self::InvalidPassword
            | Self::Unauthorized
            | Self::UserExists
            | Self::PasswordPolicy
            | Self::PasswordChangeRejected(_)
            | Self::Kerberos(_) => ErrorCategory::Authentication,
            Self::ParseError(_) => ErrorCategory::Decoding,
            Self::ConfigError(_) | Self::InvalidRequest(_) | Self::InvalidEndpoint(_) => {
                ErrorCategory::Configuration
            }
        }
    }

    /// Returns the server-reported error, if this is a protocol error.
    #[must_use]
    pub const fn rpc_error(&self) -> Option<&RpcError> {
        match self {
            Self::Rpc(err) => Some(err),
            _ => None,
        }
    }

    /// Returns the sentinel of a server-reported error with a known code.
    #[must_use]
    pub const fn server_error_kind(&self) -> Option<ServerErrorKind> {
        match self {
            Self::Rpc(err) => err.kind(),
            _ => None,
        }
    }

    /// Returns true if the server reported that the entity does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.server_error_kind(), Some(ServerErrorKind::NotFound))
    }

    /// Returns true if the server reported a duplicate entity.
    #[must_use]
    pub const fn is_duplicate(&self) -> bool {
        matches!(
            self.server_error_kind(),
            Some(ServerErrorKind::DuplicateEntry)
        )
    }

    /// Returns true if the server reported that no modification was performed.
    #[must_use]
    pub const fn is_empty_modlist(&self) -> bool {
        matches!(self.server_error_kind(), Some(ServerErrorKind::EmptyModlist))
    }

    /// Returns true if this error should be logged as a serious error.
    #[must_use]
    pub const fn should_log(&self) -> bool {
        matches!(
            self,
            Self::ConfigError(_) | Self::InvalidSessionCookie(_) | Self::ParseError(_)
        )
    }
}

impl From<RpcError> for Error {
    fn from(err: RpcError) -> Self {
        Self::Rpc(err)
    }
}

// Conversions from external error types
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::ServiceUnavailable(err.to_string())
        } else if err.is_decode() {
            Self::ParseError(err.to_string())
        } else {
            Self::HttpError(err.to_string())
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidEndpoint(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::ParseError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::ConfigError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::HttpStatus(500).error_code(), "HTTP_STATUS");
        assert_eq!(
            Error::InvalidSessionCookie("x".to_string()).error_code(),
            "INVALID_SESSION_COOKIE"
        );
        assert_eq!(Error::ExpiredPassword.error_code(), "EXPIRED_PASSWORD");
        assert_eq!(Error::UserExists.error_code(), "USER_EXISTS");
        assert_eq!(Error::Unauthorized.error_code(), "UNAUTHORIZED");
        assert_eq!(
            Error::Rpc(RpcError::new(4001, "missing")).error_code(),
            "RPC_ERROR"
        );
    }

    #[test]
    fn test_user_exists_is_distinct_from_unauthorized() {
        assert_ne!(Error::UserExists, Error::Unauthorized);
        assert_ne!(
            Error::UserExists.to_string(),
            Error::Unauthorized.to_string()
        );
    }

    #[test]
    fn test_error_display() {
        let err = Error::HttpStatus(503);
        assert_eq!(
            err.to_string(),
            "IPA RPC call failed with HTTP status code: 503"
        );

        let err = Error::Rpc(RpcError::new(4002, "user with name \"jdoe\" already exists"));
        assert_eq!(
            err.to_string(),
            "ipa: error 4002 - user with name \"jdoe\" already exists"
        );
    }

    #[test]
    fn test_categories() {
        assert_eq!(Error::HttpStatus(404).category(), ErrorCategory::Transport);
        assert_eq!(
            Error::InvalidSessionCookie("bad".to_string()).category(),
            ErrorCategory::Transport
        );
        assert_eq!(
            Error::Rpc(RpcError::new(1, "x")).category(),
            ErrorCategory::Protocol
        );
        assert_eq!(
            Error::ExpiredPassword.category(),
            ErrorCategory::Authentication
        );
        assert_eq!(
            Error::Kerberos("no tgt".to_string()).category(),
            ErrorCategory::Authentication
        );
        assert_eq!(
            Error::ParseError("x".to_string()).category(),
            ErrorCategory::Decoding
        );
        assert_eq!(
            Error::ConfigError("x".to_string()).category(),
            ErrorCategory::Configuration
        );
    }

    #[test]
    fn test_known_codes_have_sentinels() {
        let duplicate = Error::Rpc(RpcError::new(4002, "exists"));
        assert_eq!(
            duplicate.server_error_kind(),
            Some(ServerErrorKind::DuplicateEntry)
        );
        assert!(duplicate.is_duplicate());
        assert!(!duplicate.is_not_found());

        let unknown = Error::Rpc(RpcError::new(4999, "something else"));
        assert_eq!(unknown.server_error_kind(), None);
        assert!(!unknown.is_duplicate());
        assert_eq!(unknown.rpc_error().map(|e| e.code), Some(4999));

        assert!(Error::Rpc(RpcError::new(4202, "no modifications")).is_empty_modlist());
        assert!(Error::Rpc(RpcError::new(4001, "not found")).is_not_found());
    }

    #[test]
    fn test_server_error_kind_round_trips_codes() {
        for code in [1000, 1104, 1202, 2100, 3009, 4001, 4002, 4014, 4202] {
            let kind = ServerErrorKind::from_code(code).unwrap();
            assert_eq!(kind.code(), code);
        }
        assert_eq!(ServerErrorKind::from_code(0), None);
    }

    #[test]
    fn test_rpc_error_deserialization() {
        let err: RpcError = serde_json::from_value(serde_json::json!({
            "code": 4001,
            "message": "jdoe: user not found",
            "name": "NotFound",
            "data": {"reason": "jdoe: user not found"}
        }))
        .unwrap();

        assert_eq!(err.code, 4001);
        assert_eq!(err.name.as_deref(), Some("NotFound"));
        assert!(err.is(ServerErrorKind::NotFound));
    }

    #[test]
    fn test_should_log() {
        assert!(Error::ConfigError("test".to_string()).should_log());
        assert!(Error::InvalidSessionCookie("test".to_string()).should_log());
        assert!(!Error::Unauthorized.should_log());
        assert!(!Error::HttpStatus(401).should_log());
    }

    #[test]
    fn test_from_url_parse_error() {
        let err = url::Url::parse("not a url").unwrap_err();
        let ipa_err: Error = err.into();
        assert!(matches!(ipa_err, Error::InvalidEndpoint(_)));
    }

    #[test]
    fn test_from_serde_json_error() {
        let err = serde_json::from_str::<serde_json::Value>("{invalid json}").unwrap_err();
        let ipa_err: Error = err.into();
        assert!(matches!(ipa_err, Error::ParseError(_)));
        assert_eq!(ipa_err.category(), ErrorCategory::Decoding);
    }
}
