//! Configuration for the loader and for library initialization.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// Location of the vendor script.
pub const DEFAULT_SCRIPT_URL: &str = "https://apis.google.com/js/api.js";

/// Bound applied to the script wait and to each named library load.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Environment variable holding the API key.
pub const ENV_API_KEY: &str = "GAPI_API_KEY";
/// Environment variable holding the `OAuth2` client id.
pub const ENV_CLIENT_ID: &str = "GAPI_CLIENT_ID";
/// Environment variable holding the requested scopes.
pub const ENV_SCOPE: &str = "GAPI_SCOPE";
/// Environment variable holding discovery document URLs.
pub const ENV_DISCOVERY_DOCS: &str = "GAPI_DISCOVERY_DOCS";

/// Arguments passed to a library's `init` primitive.
///
/// Serializes with the vendor's field names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// API key.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_key: String,
    /// `OAuth2` client id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub client_id: String,
    /// Space-separated scopes.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub scope: String,
    /// Discovery document URLs, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub discovery_docs: Vec<String>,
}

impl ClientConfig {
    /// Creates a configuration for the given client id.
    #[must_use]
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            ..Self::default()
        }
    }

    /// Sets the API key.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    /// Sets the scope.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Sets the discovery documents.
    #[must_use]
    pub fn with_discovery_docs(mut self, docs: Vec<String>) -> Self {
        self.discovery_docs = docs;
        self
    }

    /// Reads the configuration from `GAPI_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the resulting configuration is invalid.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from a variable lookup.
    ///
    /// Discovery documents may be separated by commas or whitespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the resulting configuration is invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let config = Self {
            api_key: lookup(ENV_API_KEY).unwrap_or_default(),
            client_id: lookup(ENV_CLIENT_ID).unwrap_or_default(),
            scope: lookup(ENV_SCOPE).unwrap_or_default(),
            discovery_docs: lookup(ENV_DISCOVERY_DOCS)
                .map(|docs| {
                    docs.split(|c: char| c == ',' || c.is_whitespace())
                        .filter(|doc| !doc.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Returns a new configuration with `overrides` applied.
    ///
    /// Fields set on `overrides` win; unset fields come from `self`. Neither
    /// input is modified.
    #[must_use]
    pub fn merge(&self, overrides: &ConfigOverride) -> Self {
        Self {
            api_key: overrides
                .api_key
                .clone()
                .unwrap_or_else(|| self.api_key.clone()),
            client_id: overrides
                .client_id
                .clone()
                .unwrap_or_else(|| self.client_id.clone()),
            scope: overrides.scope.clone().unwrap_or_else(|| self.scope.clone()),
            discovery_docs: overrides
                .discovery_docs
                .clone()
                .unwrap_or_else(|| self.discovery_docs.clone()),
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if neither an API key nor a client id is set, or if a
    /// discovery document is not a valid URL.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.is_empty() && self.client_id.is_empty() {
            return Err(Error::InvalidConfig(
                "either api_key or client_id must be set".into(),
            ));
        }
        for doc in &self.discovery_docs {
            Url::parse(doc)?;
        }
        Ok(())
    }
}

/// Per-call overrides for [`ClientConfig`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigOverride {
    /// API key override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Client id override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Scope override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Discovery documents override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovery_docs: Option<Vec<String>>,
}

impl ConfigOverride {
    /// Overrides the API key.
    #[must_use]
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Overrides the client id.
    #[must_use]
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Overrides the scope.
    #[must_use]
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Overrides the discovery documents.
    #[must_use]
    pub fn discovery_docs(mut self, docs: Vec<String>) -> Self {
        self.discovery_docs = Some(docs);
        self
    }
}

/// Where the vendor script lives and how long to wait for it.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Script URL.
    pub script_url: Url,
    /// Bound on the script wait and on each named library load.
    pub timeout: Duration,
}

impl LoaderConfig {
    /// Creates a loader configuration for a custom script URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn new(script_url: impl AsRef<str>) -> Result<Self> {
        Ok(Self {
            script_url: Url::parse(script_url.as_ref())?,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Loader configuration for Google's hosted `api.js`.
    ///
    /// # Errors
    ///
    /// Returns an error if URL parsing fails.
    pub fn google() -> Result<Self> {
        Self::new(DEFAULT_SCRIPT_URL)
    }

    /// Sets the timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn defaults() -> ClientConfig {
        ClientConfig::new("D")
            .with_api_key("D")
            .with_scope("s1")
            .with_discovery_docs(vec!["a".to_string()])
    }

    #[test]
    fn test_merge_override_wins_per_field() {
        let base = defaults();
        let overrides = ConfigOverride::default().scope("s2");

        let merged = base.merge(&overrides);

        assert_eq!(merged.api_key, "D");
        assert_eq!(merged.client_id, "D");
        assert_eq!(merged.scope, "s2");
        assert_eq!(merged.discovery_docs, vec!["a".to_string()]);
        assert_eq!(base, defaults());
        assert_eq!(overrides, ConfigOverride::default().scope("s2"));
    }

    #[test]
    fn test_merge_empty_override_is_identity() {
        let base = defaults();
        assert_eq!(base.merge(&ConfigOverride::default()), base);
    }

    #[test]
    fn test_merge_replaces_discovery_docs_wholesale() {
        let merged = defaults().merge(&ConfigOverride::default().discovery_docs(vec![
            "b".to_string(),
            "c".to_string(),
        ]));
        assert_eq!(merged.discovery_docs, vec!["b", "c"]);
    }

    #[test]
    fn test_serializes_vendor_field_names() {
        let config = ClientConfig::new("id.apps.googleusercontent.com")
            .with_api_key("key")
            .with_discovery_docs(vec![
                "https://www.googleapis.com/discovery/v1/apis/drive/v3/rest".to_string(),
            ]);
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["apiKey"], "key");
        assert_eq!(json["clientId"], "id.apps.googleusercontent.com");
        assert!(json.get("scope").is_none());
        assert_eq!(json["discoveryDocs"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            (ENV_CLIENT_ID, "client"),
            (ENV_SCOPE, "profile email"),
            (
                ENV_DISCOVERY_DOCS,
                "https://example.com/a, https://example.com/b",
            ),
        ]
        .into_iter()
        .collect();

        let config = ClientConfig::from_lookup(|k| vars.get(k).map(ToString::to_string)).unwrap();
        assert_eq!(config.client_id, "client");
        assert!(config.api_key.is_empty());
        assert_eq!(config.scope, "profile email");
        assert_eq!(
            config.discovery_docs,
            vec!["https://example.com/a", "https://example.com/b"]
        );
    }

    #[test]
    fn test_validate_requires_credentials() {
        assert!(ClientConfig::default().validate().is_err());
        assert!(ClientConfig::from_lookup(|_| None).is_err());
        assert!(ClientConfig::new("client").validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_discovery_doc() {
        let config = ClientConfig::new("client").with_discovery_docs(vec!["not a url".into()]);
        assert!(matches!(config.validate(), Err(Error::Url(_))));
    }

    #[test]
    fn test_loader_config_defaults() {
        let config = LoaderConfig::google().unwrap();
        assert_eq!(config.script_url.as_str(), DEFAULT_SCRIPT_URL);
        assert_eq!(config.timeout, Duration::from_millis(5000));

        let config = config.timeout(Duration::from_secs(1));
        assert_eq!(config.timeout, Duration::from_secs(1));
        assert!(LoaderConfig::new("::").is_err());
    }
}
