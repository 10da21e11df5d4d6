//! Arguments and response of the vendor's generic request primitive.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Arguments for a generic REST request.
///
/// The caller shapes these per the vendor's request schema; they are
/// forwarded as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestArgs {
    /// Request path or absolute URL.
    pub path: String,
    /// HTTP method.
    #[serde(default = "default_method")]
    pub method: String,
    /// Query parameters.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub params: Map<String, Value>,
    /// Extra request headers.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    /// Request body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

fn default_method() -> String {
    "GET".to_string()
}

impl RequestArgs {
    /// Creates a GET request for `path`.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: default_method(),
            params: Map::new(),
            headers: HashMap::new(),
            body: None,
        }
    }

    /// Sets the HTTP method.
    #[must_use]
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    /// Adds a query parameter.
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Adds a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Response resolved by the vendor's request primitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
    /// HTTP status text.
    #[serde(default)]
    pub status_text: String,
    /// Response headers.
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Raw response body.
    #[serde(default)]
    pub body: String,
    /// Body parsed as JSON, when it is JSON.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl ApiResponse {
    /// Returns true for 2xx statuses.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_args_builder() {
        let args = RequestArgs::new("https://www.googleapis.com/drive/v3/files")
            .param("pageSize", 10)
            .header("X-Trace", "1");
        assert_eq!(args.method, "GET");
        assert_eq!(args.params["pageSize"], json!(10));

        let json = serde_json::to_value(&args).unwrap();
        assert_eq!(json["path"], "https://www.googleapis.com/drive/v3/files");
        assert!(json.get("body").is_none());
    }

    #[test]
    fn test_request_args_default_method() {
        let args: RequestArgs = serde_json::from_str(r#"{"path": "/x"}"#).unwrap();
        assert_eq!(args.method, "GET");
    }

    #[test]
    fn test_response_deserialization() {
        let json = r#"{
            "status": 200,
            "statusText": "OK",
            "body": "{\"files\":[]}",
            "result": {"files": []}
        }"#;
        let response: ApiResponse = serde_json::from_str(json).unwrap();
        assert!(response.is_success());
        assert_eq!(response.status_text, "OK");
        assert_eq!(response.result, Some(json!({"files": []})));
    }
}
