//! Decoders for FreeIPA's value encodings.
//!
//! FreeIPA returns most attributes as single-element arrays (`"uid": ["jdoe"]`) and datetimes
//! with a class hint (`[{"__datetime__": "20230115120000Z"}]`). The helpers here turn those
//! into plain Rust values. Decoding is lenient on purpose: an empty array yields the default
//! value, an unparsable datetime yields the zero timestamp, and a missing repeated field yields
//! an empty list.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::{DeserializeOwned, Deserializer};
use serde::ser::{SerializeMap, SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Compact timestamp format used by `__datetime__` values.
pub const IPA_DATETIME_FORMAT: &str = "%Y%m%d%H%M%SZ";

/// Key of the class hint carrying a datetime.
pub const DATETIME_CLASS_HINT: &str = "__datetime__";

/// Timestamp produced when a datetime cannot be parsed.
pub const ZERO_TIMESTAMP: DateTime<Utc> = DateTime::<Utc>::UNIX_EPOCH;

/// Parses a compact IPA timestamp, degrading to [`ZERO_TIMESTAMP`] on failure.
#[must_use]
pub fn parse_datetime(value: &str) -> DateTime<Utc> {
    NaiveDateTime::parse_from_str(value, IPA_DATETIME_FORMAT)
        .map(|naive| naive.and_utc())
        .unwrap_or(ZERO_TIMESTAMP)
}

/// Formats a timestamp in the compact IPA format.
#[must_use]
pub fn format_datetime(value: &DateTime<Utc>) -> String {
    value.format(IPA_DATETIME_FORMAT).to_string()
}

/// Builds the tagged JSON object the server expects for datetime options.
#[must_use]
pub fn datetime_option(value: &DateTime<Utc>) -> Value {
    let mut map = Map::new();
    map.insert(
        DATETIME_CLASS_HINT.to_string(),
        Value::String(format_datetime(value)),
    );
    Value::Object(map)
}

/// Returns the first element of an array-wrapped value, or the value itself if it is not an
/// array.
#[must_use]
pub fn unwrap_scalar(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(items) => items.first(),
        Value::Null => None,
        other => Some(other),
    }
}

/// Renders a JSON scalar as a string the way the server's values are usually read.
#[must_use]
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Extracts the inner string of a class-hinted datetime, unwrapping a surrounding array.
fn tagged_datetime(value: &Value) -> Option<&str> {
    unwrap_scalar(value)?
        .get(DATETIME_CLASS_HINT)
        .and_then(Value::as_str)
}

/// Collects the string elements of a repeated field.
///
/// Non-string elements are rendered with [`value_to_string`]; a bare scalar becomes a single
/// element; `null` becomes an empty list.
#[must_use]
pub fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().map(value_to_string).collect(),
        Value::Null => Vec::new(),
        other => vec![value_to_string(other)],
    }
}

/// Serde helper for `#[serde(deserialize_with = "...")]` on repeated-value fields.
///
/// # Errors
///
/// Returns an error only if the input is not valid JSON.
pub fn deserialize_string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().map(string_list).unwrap_or_default())
}

/// Serde helper for `#[serde(deserialize_with = "...")]` on array-wrapped string fields.
///
/// # Errors
///
/// Returns an error only if the input is not valid JSON.
pub fn deserialize_scalar_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(unwrap_scalar)
        .map(value_to_string)
        .unwrap_or_default())
}

/// An array-wrapped scalar.
///
/// Decodes `["alice"]` to `"alice"` and `[]` (or `null`) to `T::default()`. Encoding rebuilds
/// the single-element array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Scalar<T>(pub T);

impl<T> Scalar<T> {
    /// Returns the inner value.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> std::ops::Deref for Scalar<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<'de, T> Deserialize<'de> for Scalar<T>
where
    T: DeserializeOwned + Default,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        match unwrap_scalar(&value) {
            Some(inner) => T::deserialize(inner.clone())
                .map(Scalar)
                .map_err(serde::de::Error::custom),
            None => Ok(Scalar(T::default())),
        }
    }
}

impl<T: Serialize> Serialize for Scalar<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(1))?;
        seq.serialize_element(&self.0)?;
        seq.end()
    }
}

/// A class-hinted datetime (`{"__datetime__": "YYYYMMDDHHMMSSZ"}`).
///
/// Unparsable or missing timestamps decode to [`ZERO_TIMESTAMP`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IpaDateTime(pub DateTime<Utc>);

impl IpaDateTime {
    /// Returns true if this is the zero timestamp.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == ZERO_TIMESTAMP
    }

    /// Returns the wrapped timestamp.
    #[must_use]
    pub const fn into_inner(self) -> DateTime<Utc> {
        self.0
    }
}

impl Default for IpaDateTime {
    fn default() -> Self {
        Self(ZERO_TIMESTAMP)
    }
}

impl From<DateTime<Utc>> for IpaDateTime {
    fn from(value: DateTime<Utc>) -> Self {
        Self(value)
    }
}

impl<'de> Deserialize<'de> for IpaDateTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(tagged_datetime(&value).map_or_else(Self::default, |s| Self(parse_datetime(s))))
    }
}

impl Serialize for IpaDateTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(DATETIME_CLASS_HINT, &format_datetime(&self.0))?;
        map.end()
    }
}

/// Read-only view over one entry returned by the server.
///
/// Accessors mirror how FreeIPA encodes attributes: `first` unwraps single-element arrays,
/// `strings` collects repeated values and `datetime` reads class-hinted timestamps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IpaRecord {
    attributes: Map<String, Value>,
}

impl IpaRecord {
    /// Wraps a JSON value, which must be an object.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ParseError`] if the value is not a JSON object.
    pub fn from_value(value: Value) -> crate::Result<Self> {
        match value {
            Value::Object(attributes) => Ok(Self { attributes }),
            other => Err(crate::Error::ParseError(format!(
                "expected an IPA entry object, found {}",
                json_type_name(&other)
            ))),
        }
    }

    /// Returns the raw value of an attribute.
    #[must_use]
    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.attributes.get(attribute)
    }

    /// Returns true if the attribute is present.
    #[must_use]
    pub fn contains(&self, attribute: &str) -> bool {
        self.attributes.contains_key(attribute)
    }

    /// Returns the first value of the attribute as a string if present.
    #[must_use]
    pub fn first(&self, attribute: &str) -> Option<String> {
        self.get(attribute)
            .and_then(unwrap_scalar)
            .map(value_to_string)
    }

    /// Returns the first value of the attribute, or an empty string.
    #[must_use]
    pub fn first_or_default(&self, attribute: &str) -> String {
        self.first(attribute).unwrap_or_default()
    }

    /// Returns all values of the attribute (empty when absent).
    #[must_use]
    pub fn strings(&self, attribute: &str) -> Vec<String> {
        self.get(attribute).map(string_list).unwrap_or_default()
    }

    /// Parses the attribute as a boolean (`true`, `TRUE` or `1`).
    #[must_use]
    pub fn bool_value(&self, attribute: &str) -> bool {
        match self.get(attribute).and_then(unwrap_scalar) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_i64().is_some_and(|n| n != 0),
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true") || s == "1",
            _ => false,
        }
    }

    /// Parses the attribute as an integer (0 when absent or malformed).
    #[must_use]
    pub fn int_value(&self, attribute: &str) -> i64 {
        match self.get(attribute).and_then(unwrap_scalar) {
            Some(Value::Number(n)) => n.as_i64().unwrap_or_default(),
            Some(Value::String(s)) => s.trim().parse().unwrap_or_default(),
            _ => 0,
        }
    }

    /// Reads a class-hinted datetime.
    ///
    /// Returns `None` when the attribute or its inner string is absent, and the zero timestamp
    /// when the inner string cannot be parsed.
    #[must_use]
    pub fn datetime(&self, attribute: &str) -> Option<DateTime<Utc>> {
        self.get(attribute)
            .and_then(tagged_datetime)
            .map(parse_datetime)
    }

    /// Returns the underlying JSON object.
    #[must_use]
    pub fn into_inner(self) -> Map<String, Value> {
        self.attributes
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_scalar_unwraps_first_element() {
        let name: Scalar<String> = serde_json::from_value(json!(["alice"])).unwrap();
        assert_eq!(name.0, "alice");

        let name: Scalar<String> = serde_json::from_value(json!(["alice", "bob"])).unwrap();
        assert_eq!(*name, "alice");
    }

    #[test]
    fn test_scalar_empty_array_is_default() {
        let name: Scalar<String> = serde_json::from_value(json!([])).unwrap();
        assert_eq!(name.0, "");

        let digits: Scalar<i64> = serde_json::from_value(json!([])).unwrap();
        assert_eq!(digits.0, 0);

        let name: Scalar<String> = serde_json::from_value(json!(null)).unwrap();
        assert_eq!(name.0, "");
    }

    #[test]
    fn test_scalar_reencodes_single_element_array() {
        let first: Scalar<String> = serde_json::from_value(json!(["alice"])).unwrap();
        let encoded = serde_json::to_value(&first).unwrap();
        assert_eq!(encoded, json!(["alice"]));

        let second: Scalar<String> = serde_json::from_value(encoded).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_scalar_accepts_bare_values() {
        let flag: Scalar<bool> = serde_json::from_value(json!(true)).unwrap();
        assert!(flag.0);
    }

    #[test]
    fn test_parse_datetime() {
        let parsed = parse_datetime("20230115120000Z");
        assert_eq!(parsed, Utc.with_ymd_and_hms(2023, 1, 15, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_datetime_failure_is_zero() {
        assert_eq!(parse_datetime("yesterday"), ZERO_TIMESTAMP);
        assert_eq!(parse_datetime(""), ZERO_TIMESTAMP);
        assert_eq!(parse_datetime("2023-01-15T12:00:00Z"), ZERO_TIMESTAMP);
    }

    #[test]
    fn test_ipa_datetime_deserialize() {
        let dt: IpaDateTime =
            serde_json::from_value(json!({"__datetime__": "20230115120000Z"})).unwrap();
        assert_eq!(dt.0, Utc.with_ymd_and_hms(2023, 1, 15, 12, 0, 0).unwrap());

        let wrapped: IpaDateTime =
            serde_json::from_value(json!([{"__datetime__": "20230115120000Z"}])).unwrap();
        assert_eq!(wrapped, dt);

        let broken: IpaDateTime =
            serde_json::from_value(json!({"__datetime__": "garbage"})).unwrap();
        assert!(broken.is_zero());

        let missing: IpaDateTime = serde_json::from_value(json!({})).unwrap();
        assert!(missing.is_zero());
    }

    #[test]
    fn test_ipa_datetime_serialize() {
        let dt = IpaDateTime(Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 1).unwrap());
        assert_eq!(
            serde_json::to_value(dt).unwrap(),
            json!({"__datetime__": "20240229235901Z"})
        );
        assert_eq!(
            datetime_option(&dt.0),
            json!({"__datetime__": "20240229235901Z"})
        );
    }

    #[test]
    fn test_string_list() {
        assert_eq!(
            string_list(&json!(["admins", "ipausers"])),
            vec!["admins".to_string(), "ipausers".to_string()]
        );
        assert!(string_list(&json!([])).is_empty());
        assert!(string_list(&Value::Null).is_empty());
        assert_eq!(string_list(&json!("solo")), vec!["solo".to_string()]);
    }

    #[test]
    fn test_record_accessors() {
        let record = IpaRecord::from_value(json!({
            "dn": "uid=jdoe,cn=users,cn=accounts,dc=example,dc=com",
            "uid": ["jdoe"],
            "uidnumber": ["1000"],
            "ipatokenotpdigits": [6],
            "memberof_group": ["admins", "ipausers"],
            "nsaccountlock": false,
            "has_password": true,
            "ipatokendisabled": ["TRUE"],
            "krblastpwdchange": [{"__datetime__": "20230115120000Z"}],
            "krbpasswordexpiration": [{"__datetime__": "not a date"}],
            "krbprincipalexpiration": [{}]
        }))
        .unwrap();

        assert_eq!(
            record.first("dn").as_deref(),
            Some("uid=jdoe,cn=users,cn=accounts,dc=example,dc=com")
        );
        assert_eq!(record.first_or_default("uid"), "jdoe");
        assert_eq!(record.first_or_default("mail"), "");
        assert_eq!(record.int_value("uidnumber"), 1000);
        assert_eq!(record.int_value("ipatokenotpdigits"), 6);
        assert_eq!(record.strings("memberof_group").len(), 2);
        assert!(record.strings("memberof_sudorule").is_empty());
        assert!(record.bool_value("has_password"));
        assert!(!record.bool_value("nsaccountlock"));
        assert!(record.bool_value("ipatokendisabled"));
        assert_eq!(
            record.datetime("krblastpwdchange"),
            Some(Utc.with_ymd_and_hms(2023, 1, 15, 12, 0, 0).unwrap())
        );
        assert_eq!(record.datetime("krbpasswordexpiration"), Some(ZERO_TIMESTAMP));
        assert_eq!(record.datetime("krbprincipalexpiration"), None);
        assert_eq!(record.datetime("krblastfailedauth"), None);
    }

    #[test]
    fn test_record_requires_object() {
        assert!(IpaRecord::from_value(json!(["not", "an", "object"])).is_err());
    }

    #[test]
    fn test_serde_helpers() {
        #[derive(Deserialize)]
        struct Entry {
            #[serde(default, deserialize_with = "deserialize_scalar_string")]
            cn: String,
            #[serde(default, deserialize_with = "deserialize_string_list")]
            member_user: Vec<String>,
        }

        let entry: Entry =
            serde_json::from_value(json!({"cn": ["admins"], "member_user": ["admin"]})).unwrap();
        assert_eq!(entry.cn, "admins");
        assert_eq!(entry.member_user, vec!["admin".to_string()]);

        let entry: Entry = serde_json::from_value(json!({})).unwrap();
        assert!(entry.cn.is_empty());
        assert!(entry.member_user.is_empty());
    }
}
