//! FreeIPA OTP tokens.

use crate::Result;
use chrono::{DateTime, Utc};
use freeipa_core::value::{datetime_option, IpaRecord};
use freeipa_core::{Error, Options};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Default number of digits of generated codes.
pub const DEFAULT_OTP_DIGITS: u32 = 6;

/// Default TOTP time step (seconds).
pub const DEFAULT_TOTP_TIME_STEP: u32 = 30;

const UUID_LEN: usize = 36;
const DISPLAY_SUFFIX_LEN: usize = 6;

/// Hash algorithm of an OTP token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OtpAlgorithm {
    /// HMAC-SHA1
    #[default]
    Sha1,
    /// HMAC-SHA256
    Sha256,
    /// HMAC-SHA384
    Sha384,
    /// HMAC-SHA512
    Sha512,
}

impl OtpAlgorithm {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }
}

impl fmt::Display for OtpAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OtpAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            "sha384" => Ok(Self::Sha384),
            "sha512" => Ok(Self::Sha512),
            other => Err(Error::ParseError(format!("unknown OTP algorithm `{other}`"))),
        }
    }
}

/// Kind of OTP token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OtpTokenType {
    /// Time-based
    #[default]
    Totp,
    /// Counter-based
    Hotp,
}

impl OtpTokenType {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Totp => "totp",
            Self::Hotp => "hotp",
        }
    }
}

impl fmt::Display for OtpTokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OtpTokenType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "totp" => Ok(Self::Totp),
            "hotp" => Ok(Self::Hotp),
            other => Err(Error::ParseError(format!("unknown OTP token type `{other}`"))),
        }
    }
}

/// An OTP token entry.
///
/// Numeric fields set to zero and unset optional fields fall back to the TOTP defaults
/// (SHA-1, six digits, 30 second step) when the token is created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OtpToken {
    /// Distinguished name.
    pub dn: String,
    /// Token unique id (`ipatokenuniqueid`).
    pub uuid: String,
    /// Hash algorithm.
    pub algorithm: Option<OtpAlgorithm>,
    /// Number of digits per code.
    pub digits: u32,
    /// Owning user.
    pub owner: String,
    /// TOTP time step in seconds.
    pub time_step: u32,
    /// TOTP clock offset in seconds.
    pub clock_offset: i64,
    /// Managing user.
    pub managed_by: String,
    /// Whether the token may be used.
    pub enabled: bool,
    /// Token kind.
    pub token_type: Option<OtpTokenType>,
    /// Provisioning URI (only returned on creation).
    pub uri: String,
    /// Free-form description.
    pub description: String,
    /// Vendor.
    pub vendor: String,
    /// Model.
    pub model: String,
    /// Serial number.
    pub serial: String,
    /// Start of the validity window.
    pub not_before: Option<DateTime<Utc>>,
    /// End of the validity window.
    pub not_after: Option<DateTime<Utc>>,
}

impl OtpToken {
    /// A TOTP token with the default parameters.
    #[must_use]
    pub fn totp() -> Self {
        Self {
            algorithm: Some(OtpAlgorithm::Sha1),
            digits: DEFAULT_OTP_DIGITS,
            time_step: DEFAULT_TOTP_TIME_STEP,
            token_type: Some(OtpTokenType::Totp),
            enabled: true,
            ..Self::default()
        }
    }

    /// Decodes a token from a server entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ParseError`] if the value is not an object.
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(Self::from_record(&IpaRecord::from_value(value)?))
    }

    /// Decodes a token from a record view.
    #[must_use]
    pub fn from_record(record: &IpaRecord) -> Self {
        Self {
            dn: record.first_or_default("dn"),
            uuid: record.first_or_default("ipatokenuniqueid"),
            algorithm: record
                .first("ipatokenotpalgorithm")
                .and_then(|s| s.parse().ok()),
            digits: u32::try_from(record.int_value("ipatokenotpdigits")).unwrap_or_default(),
            owner: record.first_or_default("ipatokenowner"),
            time_step: u32::try_from(record.int_value("ipatokentotptimestep"))
                .unwrap_or_default(),
            clock_offset: record.int_value("ipatokentotpclockoffset"),
            managed_by: record.first_or_default("managedby_user"),
            enabled: record.first("ipatokendisabled").as_deref() != Some("TRUE"),
            token_type: record.first("type").and_then(|s| s.parse().ok()),
            uri: record.first_or_default("uri"),
            description: record.first_or_default("description"),
            vendor: record.first_or_default("ipatokenvendor"),
            model: record.first_or_default("ipatokenmodel"),
            serial: record.first_or_default("ipatokenserial"),
            not_before: record.datetime("ipatokennotbefore"),
            not_after: record.datetime("ipatokennotafter"),
        }
    }

    /// Short label: owner plus the last six characters of the id, or the id itself when it is
    /// not a UUID.
    #[must_use]
    pub fn display_name(&self) -> String {
        match self.uuid.get(UUID_LEN - DISPLAY_SUFFIX_LEN..) {
            Some(suffix) if self.uuid.len() == UUID_LEN => format!("{}-{suffix}", self.owner),
            _ => self.uuid.clone(),
        }
    }

    /// Fills unset parameters with the TOTP defaults.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.token_type.get_or_insert(OtpTokenType::Totp);
        self.algorithm.get_or_insert(OtpAlgorithm::Sha1);
        if self.digits == 0 {
            self.digits = DEFAULT_OTP_DIGITS;
        }
        if self.time_step == 0 {
            self.time_step = DEFAULT_TOTP_TIME_STEP;
        }
        self
    }

    /// Options for `otptoken_add`.
    #[must_use]
    pub fn to_add_options(&self) -> Options {
        let token = self.clone().with_defaults();
        let mut options = Options::new()
            .with("type", token.token_type.unwrap_or_default().as_str())
            .with(
                "ipatokenotpalgorithm",
                token.algorithm.unwrap_or_default().as_str(),
            )
            .with("ipatokenotpdigits", token.digits)
            .with("ipatokentotptimestep", token.time_step)
            .with("no_qrcode", true)
            .with("qrcode", false)
            .with("no_members", false)
            .with("all", true);

        for (key, value) in [
            ("description", &token.description),
            ("ipatokenvendor", &token.vendor),
            ("ipatokenmodel", &token.model),
            ("ipatokenserial", &token.serial),
        ] {
            if !value.is_empty() {
                options.insert(key, value);
            }
        }
        if let Some(not_before) = &token.not_before {
            options.insert("ipatokennotbefore", datetime_option(not_before));
        }
        if let Some(not_after) = &token.not_after {
            options.insert("ipatokennotafter", datetime_option(not_after));
        }
        options
    }
}
