//! FreeIPA group and host-group records.

use freeipa_core::value::{deserialize_scalar_string, deserialize_string_list};
use serde::{Deserialize, Serialize};

/// A user group or host group entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord {
    /// Distinguished name.
    #[serde(default, deserialize_with = "deserialize_scalar_string")]
    pub dn: String,
    /// Group names (`cn`), usually a single value.
    #[serde(default, deserialize_with = "deserialize_string_list")]
    pub cn: Vec<String>,
    /// Unique identifiers.
    #[serde(default, deserialize_with = "deserialize_string_list")]
    pub ipauniqueid: Vec<String>,
    /// Numeric group ids (absent for host groups and non-POSIX groups).
    #[serde(default, deserialize_with = "deserialize_string_list")]
    pub gidnumber: Vec<String>,
    /// LDAP object classes (only with `all`).
    #[serde(default, deserialize_with = "deserialize_string_list")]
    pub objectclass: Vec<String>,
    /// Direct user members.
    #[serde(default, rename = "member_user", deserialize_with = "deserialize_string_list")]
    pub users: Vec<String>,
    /// Direct host members (host groups).
    #[serde(default, rename = "member_host", deserialize_with = "deserialize_string_list")]
    pub hosts: Vec<String>,
}

impl GroupRecord {
    /// Returns the group name, if the record carries one.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.cn.first().map(String::as_str)
    }

    /// Returns true if `uid` is a direct member.
    #[must_use]
    pub fn has_user(&self, uid: &str) -> bool {
        self.users.iter().any(|user| user == uid)
    }

    /// Returns true if `fqdn` is a direct host member.
    #[must_use]
    pub fn has_host(&self, fqdn: &str) -> bool {
        self.hosts.iter().any(|host| host == fqdn)
    }
}
