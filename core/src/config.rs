//! Fetcher configuration and its normalized request template.
//!
//! # Design
//! [`FetcherConfig`] is what a caller writes (in code, JSON or TOML); every
//! field is optional. [`RequestTemplate::normalize`] turns it into the
//! canonical form a fetcher sends with: a non-empty url, the JSON headers, an
//! optional bearer token and a concrete credentials mode. Normalization runs
//! once, when a fetcher is created; afterwards the template only changes
//! through `set_config`.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{ConfigError, UsageError};
use crate::resolver::EndpointResolver;

pub const DISPATCH_PATH: &str = "/dispatch";
pub const DEFAULT_FIELD_NAME: &str = "asset";
pub const JSON_MIME: &str = "application/json";

pub const ACCEPT: &str = "Accept";
pub const CONTENT_TYPE: &str = "Content-Type";
pub const AUTHORIZATION: &str = "Authorization";

/// Cookie behaviour for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Credentials {
    /// Send cookies to any origin.
    Include,
    /// Send cookies only when the endpoint shares the page origin.
    #[default]
    SameOrigin,
    /// Never send cookies.
    Omit,
}

impl Credentials {
    pub fn as_str(&self) -> &'static str {
        match self {
            Credentials::Include => "include",
            Credentials::SameOrigin => "same-origin",
            Credentials::Omit => "omit",
        }
    }

    pub fn from_mode(mode: &str) -> Option<Self> {
        match mode {
            "include" => Some(Credentials::Include),
            "same-origin" => Some(Credentials::SameOrigin),
            "omit" => Some(Credentials::Omit),
            _ => None,
        }
    }
}

/// Credentials as written by the caller: `true`/`false` or a mode string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CredentialsSetting {
    Flag(bool),
    Mode(String),
}

impl CredentialsSetting {
    fn resolve(&self) -> Credentials {
        match self {
            CredentialsSetting::Flag(true) => Credentials::Include,
            CredentialsSetting::Flag(false) => Credentials::SameOrigin,
            CredentialsSetting::Mode(mode) => Credentials::from_mode(mode).unwrap_or_else(|| {
                warn!(%mode, "unknown credentials mode, using same-origin");
                Credentials::SameOrigin
            }),
        }
    }
}

/// User-supplied fetcher configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Absolute endpoint url. Defaults to `<origin>/dispatch`.
    pub url: Option<String>,
    /// Extra headers sent with every request.
    pub headers: BTreeMap<String, String>,
    /// Bearer token; becomes `Authorization: Bearer <token>`.
    pub authorization: Option<String>,
    pub credentials: Option<CredentialsSetting>,
    /// Multipart field name for uploads.
    pub name: Option<String>,
}

impl FetcherConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_authorization(mut self, token: impl Into<String>) -> Self {
        self.authorization = Some(token.into());
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(CredentialsSetting::Mode(credentials.as_str().to_string()));
        self
    }

    pub fn with_field_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Load a configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }
}

/// Normalized configuration bound to a fetcher.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestTemplate {
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub credentials: Credentials,
    /// Multipart field name; only meaningful for uploads.
    pub field_name: String,
    /// Keys assigned through `set_config` that have no dedicated field.
    pub extra: Map<String, Value>,
}

impl RequestTemplate {
    pub fn normalize(
        config: FetcherConfig,
        resolver: &dyn EndpointResolver,
    ) -> Result<Self, ConfigError> {
        let url = match config.url.filter(|u| !u.is_empty()) {
            Some(url) => url,
            None => format!("{}{DISPATCH_PATH}", resolver.origin()?.trim_end_matches('/')),
        };

        let mut template = Self {
            url: collapse_slashes(&url)?,
            headers: config.headers,
            credentials: config
                .credentials
                .map(|c| c.resolve())
                .unwrap_or_default(),
            field_name: config
                .name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| DEFAULT_FIELD_NAME.to_string()),
            extra: Map::new(),
        };
        template.set_header(ACCEPT, JSON_MIME);
        template.set_header(CONTENT_TYPE, JSON_MIME);
        if let Some(token) = config.authorization {
            template.set_authorization(&token);
        }
        Ok(template)
    }

    /// Drop the JSON content type so the transport can set the multipart
    /// boundary itself.
    pub(crate) fn into_upload(mut self) -> Self {
        self.remove_header(CONTENT_TYPE);
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn set_authorization(&mut self, token: &str) {
        self.set_header(AUTHORIZATION, &format!("Bearer {token}"));
    }

    /// Apply a `set_config(key, value)` call.
    ///
    /// `authorization` takes a string token. Every other key takes a
    /// non-string value; string values for those keys are rejected.
    pub(crate) fn apply(&mut self, key: &str, value: Value) -> Result<(), UsageError> {
        match (key, value) {
            ("authorization", Value::String(token)) => {
                self.set_authorization(&token);
                Ok(())
            }
            ("authorization", _) | (_, Value::String(_)) => {
                warn!(key, "usage: set_config(key, value)");
                Err(UsageError::RejectedConfig(key.to_string()))
            }
            ("headers", Value::Object(headers)) => {
                self.replace_headers(headers);
                Ok(())
            }
            ("credentials", value) => {
                self.credentials = if value == Value::Bool(true) {
                    Credentials::Include
                } else {
                    Credentials::SameOrigin
                };
                Ok(())
            }
            (key, value) => {
                self.extra.insert(key.to_string(), value);
                Ok(())
            }
        }
    }

    fn replace_headers(&mut self, headers: Map<String, Value>) {
        let json_body = self.header(CONTENT_TYPE).is_some();
        let authorization = self.header(AUTHORIZATION).map(str::to_string);

        self.headers = headers
            .into_iter()
            .filter_map(|(k, v)| match v {
                Value::String(s) => Some((k, s)),
                _ => None,
            })
            .collect();
        self.set_header(ACCEPT, JSON_MIME);
        if json_body {
            self.set_header(CONTENT_TYPE, JSON_MIME);
        }
        if let Some(auth) = authorization {
            if self.header(AUTHORIZATION).is_none() {
                self.headers.insert(AUTHORIZATION.to_string(), auth);
            }
        }
    }

    fn set_header(&mut self, name: &str, value: &str) {
        self.remove_header(name);
        self.headers.insert(name.to_string(), value.to_string());
    }

    fn remove_header(&mut self, name: &str) {
        self.headers.retain(|k, _| !k.eq_ignore_ascii_case(name));
    }
}

/// Collapse repeated slashes after the scheme separator.
fn collapse_slashes(url: &str) -> Result<String, ConfigError> {
    let (scheme, rest) = url
        .split_once("://")
        .filter(|(scheme, rest)| !scheme.is_empty() && !rest.is_empty())
        .ok_or_else(|| ConfigError::InvalidUrl(url.to_string()))?;

    let mut collapsed = String::with_capacity(rest.len());
    for ch in rest.chars() {
        if ch == '/' && collapsed.ends_with('/') {
            continue;
        }
        collapsed.push(ch);
    }
    Ok(format!("{scheme}://{collapsed}"))
}
