//! FreeIPA user representation and helpers.

use crate::ssh_key::SshAuthorizedKey;
use crate::Result;
use chrono::{DateTime, Utc};
use freeipa_core::value::IpaRecord;
use freeipa_core::Options;
use serde_json::Value;
use tracing::warn;

/// Authentication type that marks an OTP-only account.
pub const AUTH_TYPE_OTP: &str = "otp";

/// A user entry as returned by `user_show`, `user_find`, `user_add` and `user_mod`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct User {
    /// Unique identifier (`ipauniqueid`).
    pub uuid: String,
    /// Distinguished name.
    pub dn: String,
    /// Given name.
    pub first_name: String,
    /// Surname.
    pub last_name: String,
    /// Display name.
    pub display_name: String,
    /// Kerberos principal name.
    pub principal: String,
    /// Login name (`uid`).
    pub username: String,
    /// Numeric user id.
    pub uid_number: String,
    /// Numeric primary group id.
    pub gid_number: String,
    /// Direct group memberships.
    pub groups: Vec<String>,
    /// SSH public keys.
    pub ssh_keys: Vec<SshAuthorizedKey>,
    /// Enabled authentication types (`password`, `otp`, ...).
    pub auth_types: Vec<String>,
    /// Whether the account has a keytab.
    pub has_keytab: bool,
    /// Whether the account has a password.
    pub has_password: bool,
    /// Whether the account is disabled.
    pub locked: bool,
    /// Whether the account sits in the preserved (deleted) container.
    pub preserved: bool,
    /// Home directory.
    pub home_directory: String,
    /// Primary email address.
    pub email: String,
    /// Telephone number.
    pub telephone_number: String,
    /// Mobile number.
    pub mobile: String,
    /// Login shell.
    pub shell: String,
    /// User class.
    pub category: String,
    /// Sudo rules the user is an indirect member of.
    pub sudo_rules: Vec<String>,
    /// HBAC rules, direct and indirect.
    pub hbac_rules: Vec<String>,
    /// Last password change.
    pub last_password_change: Option<DateTime<Utc>>,
    /// Password expiration.
    pub password_expiration: Option<DateTime<Utc>>,
    /// Principal expiration.
    pub principal_expiration: Option<DateTime<Utc>>,
    /// Last successful authentication.
    pub last_login_success: Option<DateTime<Utc>>,
    /// Last failed authentication.
    pub last_login_failure: Option<DateTime<Utc>>,
    /// Generated password, only present after a random-password request.
    pub random_password: String,
}

impl User {
    /// Creates an empty user with the given login name.
    #[must_use]
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Self::default()
        }
    }

    /// Decodes a user from a server entry.
    ///
    /// # Errors
    ///
    /// Returns [`freeipa_core::Error::ParseError`] if the value is not an object.
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(Self::from_record(&IpaRecord::from_value(value)?))
    }

    /// Decodes a user from a record view.
    ///
    /// SSH keys that cannot be parsed are skipped.
    #[must_use]
    pub fn from_record(record: &IpaRecord) -> Self {
        let ssh_keys = record
            .strings("ipasshpubkey")
            .iter()
            .filter_map(|line| match SshAuthorizedKey::parse(line) {
                Ok(key) => Some(key),
                Err(err) => {
                    warn!(error = %err, "skipping unparsable SSH public key");
                    None
                }
            })
            .collect();

        let mut hbac_rules = record.strings("memberof_hbacrule");
        hbac_rules.extend(record.strings("memberofindirect_hbacrule"));

        Self {
            uuid: record.first_or_default("ipauniqueid"),
            dn: record.first_or_default("dn"),
            first_name: record.first_or_default("givenname"),
            last_name: record.first_or_default("sn"),
            display_name: record.first_or_default("displayname"),
            principal: record.first_or_default("krbprincipalname"),
            username: record.first_or_default("uid"),
            uid_number: record.first_or_default("uidnumber"),
            gid_number: record.first_or_default("gidnumber"),
            groups: record.strings("memberof_group"),
            ssh_keys,
            auth_types: record.strings("ipauserauthtype"),
            has_keytab: record.bool_value("has_keytab"),
            has_password: record.bool_value("has_password"),
            locked: record.bool_value("nsaccountlock"),
            preserved: record.bool_value("preserved"),
            home_directory: record.first_or_default("homedirectory"),
            email: record.first_or_default("mail"),
            telephone_number: record.first_or_default("telephonenumber"),
            mobile: record.first_or_default("mobile"),
            shell: record.first_or_default("loginshell"),
            category: record.first_or_default("userclass"),
            sudo_rules: record.strings("memberofindirect_sudorule"),
            hbac_rules,
            last_password_change: record.datetime("krblastpwdchange"),
            password_expiration: record.datetime("krbpasswordexpiration"),
            principal_expiration: record.datetime("krbprincipalexpiration"),
            last_login_success: record.datetime("krblastsuccessfulauth"),
            last_login_failure: record.datetime("krblastfailedauth"),
            random_password: record.first_or_default("randompassword"),
        }
    }

    /// Returns true if OTP is the only enabled authentication type.
    #[must_use]
    pub fn otp_only(&self) -> bool {
        matches!(self.auth_types.as_slice(), [only] if only == AUTH_TYPE_OTP)
    }

    /// Returns true if the user is a direct member of `group`.
    #[must_use]
    pub fn has_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }

    /// Adds an SSH key, replacing any key with the same fingerprint.
    pub fn add_ssh_key(&mut self, key: SshAuthorizedKey) {
        match self
            .ssh_keys
            .iter_mut()
            .find(|existing| existing.fingerprint() == key.fingerprint())
        {
            Some(existing) => *existing = key,
            None => self.ssh_keys.push(key),
        }
    }

    /// Removes the SSH key with the given fingerprint, if present.
    pub fn remove_ssh_key(&mut self, fingerprint: &str) {
        self.ssh_keys.retain(|key| key.fingerprint() != fingerprint);
    }

    /// SSH keys as `authorized_keys` lines.
    #[must_use]
    pub fn ssh_key_lines(&self) -> Vec<String> {
        self.ssh_keys.iter().map(ToString::to_string).collect()
    }

    /// Options carrying the attributes `user_add` and `user_mod` write.
    #[must_use]
    pub fn to_options(&self) -> Options {
        Options::new()
            .with("mail", &self.email)
            .with("givenname", &self.first_name)
            .with("sn", &self.last_name)
            .with("homedirectory", &self.home_directory)
            .with("loginshell", &self.shell)
            .with("displayname", &self.display_name)
            .with("ipasshpubkey", self.ssh_key_lines())
            .with("telephonenumber", &self.telephone_number)
            .with("mobile", &self.mobile)
            .with("userclass", &self.category)
    }
}
