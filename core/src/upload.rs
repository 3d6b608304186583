//! File upload fetcher.
//!
//! Uploads post one file as `multipart/form-data` under the configured field
//! name (default `asset`). The reply follows the same envelope rules as an
//! action reply.

use std::path::Path;

use async_trait::async_trait;
use mime::Mime;
use serde_json::Value;

use crate::config::RequestTemplate;
use crate::error::{normalize, FetchError, RawError, UsageError};
use crate::events::{EventKind, FetchEvent};
use crate::fetcher::{Binding, Fetcher};
use crate::transport::{HttpRequest, RequestBody};

pub const MISSING_FILE_MESSAGE: &str = "Please select a file to upload.";
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// A file ready to be uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    /// Media type; empty means unknown.
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(
        name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk, naming it after the last path component.
    pub async fn from_path(
        path: impl AsRef<Path>,
        content_type: impl Into<String>,
    ) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(name, content_type, bytes))
    }

    /// A file without a name was never actually selected.
    pub fn is_selected(&self) -> bool {
        !self.name.is_empty()
    }
}

/// Posts files to the configured endpoint.
#[derive(Debug)]
pub struct UploadFetcher {
    binding: Binding,
}

impl UploadFetcher {
    pub(crate) fn new(binding: Binding) -> Self {
        Self { binding }
    }

    pub fn build_request(&self, mut file: UploadFile) -> HttpRequest {
        if file.content_type.is_empty() {
            file.content_type = DEFAULT_CONTENT_TYPE.to_string();
        }
        let template = self.binding.template();
        HttpRequest {
            url: template.url,
            headers: template.headers.into_iter().collect(),
            credentials: template.credentials,
            body: RequestBody::Multipart {
                field: template.field_name,
                file,
            },
        }
    }
}

/// Reject files that cannot be posted as a multipart part.
fn validate(file: &UploadFile) -> Result<(), String> {
    if !file.is_selected() {
        return Err(MISSING_FILE_MESSAGE.to_string());
    }
    if !file.content_type.is_empty() && file.content_type.parse::<Mime>().is_err() {
        return Err(format!("Invalid file type {:?}.", file.content_type));
    }
    Ok(())
}

#[async_trait]
impl Fetcher for UploadFetcher {
    type Input = UploadFile;

    fn scope(&self) -> &str {
        self.binding.scope()
    }

    fn template(&self) -> RequestTemplate {
        self.binding.template()
    }

    async fn send(&self, file: UploadFile) -> Result<Value, FetchError> {
        if let Err(message) = validate(&file) {
            return self
                .binding
                .settle(Err(normalize(RawError::Failure(message), None)));
        }
        let request = self.build_request(file);
        self.binding.round_trip(request).await
    }

    fn set_config(&self, key: &str, value: Value) -> Result<(), UsageError> {
        self.binding.set_config(key, value)
    }

    fn on<F>(&self, kind: EventKind, handler: F)
    where
        F: Fn(&FetchEvent<'_>) + Send + Sync + 'static,
    {
        self.binding.subscribe(kind, handler);
    }
}
