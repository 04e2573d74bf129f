//! JSON-RPC envelope types.
//!
//! Requests are posted as `{"id": 0, "method": "...", "params": [[args...], {options...}]}`.
//! Responses carry either an `error` object or a `result` object, never both.

use crate::error::{Error, Result, RpcError};
use serde::ser::SerializeTuple;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// API version sent with every request.
pub const IPA_CLIENT_VERSION: &str = "2.237";

/// Name of the option carrying the API version.
pub const VERSION_OPTION: &str = "version";

/// Named options of an RPC call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Options(Map<String, Value>);

impl Options {
    /// Creates an empty option map.
    #[must_use]
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Sets an option, replacing any previous value.
    ///
    /// Values that cannot be represented as JSON are stored as `null`.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        self.insert(key, value);
        self
    }

    /// Sets an option in place, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Serialize) {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.0.insert(key.into(), value);
    }

    /// Returns the value of an option.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns true if no option is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of options.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the underlying JSON map.
    #[must_use]
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Options {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// A JSON-RPC request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcRequest {
    /// Request identifier echoed by the server
    pub id: u64,
    /// Server method name (e.g. `user_show`)
    pub method: String,
    /// Positional arguments and named options
    pub params: RpcParams,
}

/// The `params` pair of a request: positional arguments then options.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcParams {
    /// Positional arguments
    pub args: Vec<String>,
    /// Named options, always including the API version
    pub options: Options,
}

impl Serialize for RpcParams {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(2)?;
        tuple.serialize_element(&self.args)?;
        tuple.serialize_element(&self.options)?;
        tuple.end()
    }
}

impl RpcRequest {
    /// Builds a request, stamping the API version into the options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if `method` is empty.
    pub fn new(method: impl Into<String>, args: Vec<String>, mut options: Options) -> Result<Self> {
        let method = method.into();
        if method.trim().is_empty() {
            return Err(Error::InvalidRequest(
                "RPC method name must not be empty".to_string(),
            ));
        }

        options.insert(VERSION_OPTION, IPA_CLIENT_VERSION);

        Ok(Self {
            id: 0,
            method,
            params: RpcParams { args, options },
        })
    }
}

/// A JSON-RPC response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RpcResponse {
    /// Server-reported error
    #[serde(default)]
    pub error: Option<RpcError>,
    /// Echoed request identifier
    #[serde(default)]
    pub id: Option<u64>,
    /// Principal the server authenticated the call as
    #[serde(default)]
    pub principal: Option<String>,
    /// Server API version
    #[serde(default)]
    pub version: Option<String>,
    /// Result payload
    #[serde(default)]
    pub result: Option<RpcResult>,
}

impl RpcResponse {
    /// Splits the envelope into its result or its error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rpc`] if the server reported an error and [`Error::ParseError`] if the
    /// envelope carries neither an error nor a result.
    pub fn into_result(self) -> Result<RpcResult> {
        match (self.error, self.result) {
            (Some(error), _) => Err(Error::Rpc(error)),
            (None, Some(mut result)) => {
                result.principal = self.principal;
                Ok(result)
            }
            (None, None) => Err(Error::ParseError(
                "IPA response carries neither result nor error".to_string(),
            )),
        }
    }
}

/// The `result` object of a successful response.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct RpcResult {
    /// Human-readable summary
    #[serde(default)]
    pub summary: Option<String>,
    /// Primary key of the affected entry (string, list or null)
    #[serde(default)]
    pub value: Value,
    /// Opaque payload: an entry, a list of entries, or a method-specific value
    #[serde(default)]
    pub result: Value,
    /// Number of entries for search methods
    #[serde(default)]
    pub count: Option<u64>,
    /// Whether a search result was truncated
    #[serde(default)]
    pub truncated: Option<bool>,
    /// Principal the call ran as, copied from the envelope
    #[serde(skip)]
    pub principal: Option<String>,
}

impl RpcResult {
    /// Returns true if the payload is empty (`null`, `[]` or `{}`).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match &self.result {
            Value::Null => true,
            Value::Array(items) => items.is_empty(),
            Value::Object(map) => map.is_empty(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_shape() {
        let options = Options::new().with("all", true).with("no_members", false);
        let request = RpcRequest::new("user_show", vec!["jdoe".to_string()], options).unwrap();

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(
            body,
            json!({
                "id": 0,
                "method": "user_show",
                "params": [["jdoe"], {"all": true, "no_members": false, "version": "2.237"}]
            })
        );
    }

    #[test]
    fn test_version_overrides_caller_value() {
        let options = Options::new().with(VERSION_OPTION, "1.0");
        let request = RpcRequest::new("ping", Vec::new(), options).unwrap();
        assert_eq!(
            request.params.options.get(VERSION_OPTION),
            Some(&json!(IPA_CLIENT_VERSION))
        );
    }

    #[test]
    fn test_empty_method_rejected() {
        let result = RpcRequest::new("", Vec::new(), Options::new());
        assert!(matches!(result, Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn test_response_with_result() {
        let response: RpcResponse = serde_json::from_value(json!({
            "error": null,
            "id": 0,
            "principal": "admin@EXAMPLE.COM",
            "version": "4.9.8",
            "result": {
                "summary": "IPA server version 4.9.8. API version 2.237"
            }
        }))
        .unwrap();

        let result = response.into_result().unwrap();
        assert_eq!(
            result.summary.as_deref(),
            Some("IPA server version 4.9.8. API version 2.237")
        );
        assert_eq!(result.principal.as_deref(), Some("admin@EXAMPLE.COM"));
        assert!(result.is_empty());
    }

    #[test]
    fn test_response_with_error() {
        let response: RpcResponse = serde_json::from_value(json!({
            "error": {"code": 4001, "message": "nobody: user not found", "name": "NotFound"},
            "id": 0,
            "principal": "admin@EXAMPLE.COM",
            "version": "4.9.8",
            "result": null
        }))
        .unwrap();

        let err = response.into_result().unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_response_without_result_or_error() {
        let response: RpcResponse = serde_json::from_value(json!({"id": 0})).unwrap();
        assert!(matches!(
            response.into_result(),
            Err(Error::ParseError(_))
        ));
    }

    #[test]
    fn test_search_result_metadata() {
        let response: RpcResponse = serde_json::from_value(json!({
            "error": null,
            "result": {
                "count": 2,
                "truncated": false,
                "summary": "2 users matched",
                "result": [{"uid": ["a"]}, {"uid": ["b"]}]
            }
        }))
        .unwrap();

        let result = response.into_result().unwrap();
        assert_eq!(result.count, Some(2));
        assert_eq!(result.truncated, Some(false));
        assert!(!result.is_empty());
    }
}
