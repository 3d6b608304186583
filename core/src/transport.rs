//! HTTP transport types and the transport seam.
//!
//! # Design
//! Fetchers describe requests and responses as plain data: they build an
//! [`HttpRequest`], hand it to a [`Transport`], and parse the returned
//! [`HttpResponse`]. The envelope protocol therefore stays deterministic and
//! testable without a network, while [`ReqwestTransport`] does the real I/O.
//!
//! Every request is a `POST`. Multipart bodies are passed to the transport
//! undecoded so it can choose the boundary and set the content type.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tracing::debug;

use crate::config::Credentials;
use crate::error::TransportError;
use crate::upload::UploadFile;

/// Body of an outgoing request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Serialized dispatch envelope.
    Json(String),
    /// One file under a named multipart field.
    Multipart { field: String, file: UploadFile },
}

/// An HTTP `POST` described as plain data.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub credentials: Credentials,
    pub body: RequestBody,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The JSON body, if this is an action request.
    pub fn json_body(&self) -> Option<&str> {
        match &self.body {
            RequestBody::Json(body) => Some(body),
            RequestBody::Multipart { .. } => None,
        }
    }
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Executes one request. Implementations must not retry.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// [`Transport`] backed by `reqwest`.
///
/// Cookies are kept in a jar shared by every request that is allowed to send
/// them; `omit` requests go through a second client without a jar.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    with_cookies: Client,
    without_cookies: Client,
    page_origin: Option<String>,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        let with_cookies = Client::builder()
            .cookie_store(true)
            .build()
            .map_err(|e| TransportError::Network(format!("failed to build HTTP client: {e}")))?;
        let without_cookies = Client::builder()
            .build()
            .map_err(|e| TransportError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            with_cookies,
            without_cookies,
            page_origin: None,
        })
    }

    /// Origin the host considers "same origin". Without one, `same-origin`
    /// requests always carry cookies.
    pub fn with_page_origin(mut self, origin: impl Into<String>) -> Self {
        self.page_origin = Some(origin.into());
        self
    }

    fn client_for(&self, request: &HttpRequest) -> &Client {
        match request.credentials {
            Credentials::Include => &self.with_cookies,
            Credentials::Omit => &self.without_cookies,
            Credentials::SameOrigin => match &self.page_origin {
                Some(origin) if !same_origin(origin, &request.url) => &self.without_cookies,
                _ => &self.with_cookies,
            },
        }
    }
}

fn same_origin(origin: &str, url: &str) -> bool {
    match (reqwest::Url::parse(origin), reqwest::Url::parse(url)) {
        (Ok(a), Ok(b)) => a.origin() == b.origin(),
        _ => false,
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        debug!(url = %request.url, credentials = request.credentials.as_str(), "POST");

        let mut builder = self.client_for(&request).post(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match request.body {
            RequestBody::Json(body) => builder.body(body),
            RequestBody::Multipart { field, file } => {
                let part = Part::bytes(file.bytes)
                    .file_name(file.name)
                    .mime_str(&file.content_type)
                    .map_err(|e| TransportError::Network(format!("invalid content type: {e}")))?;
                builder.multipart(Form::new().part(field, part))
            }
        };

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| TransportError::Body {
            status,
            message: e.to_string(),
        })?;
        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! Recording transport for unit tests.

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub(crate) struct RecordingTransport {
        replies: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
        pub(crate) requests: Mutex<Vec<HttpRequest>>,
    }

    impl RecordingTransport {
        pub(crate) fn replying(replies: Vec<Result<HttpResponse, TransportError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn json(status: u16, body: &str) -> Self {
            Self::replying(vec![Ok(HttpResponse::new(status, body))])
        }

        pub(crate) fn sent(&self) -> Vec<HttpRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            self.requests.lock().unwrap().push(request);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Network("no reply queued".into())))
        }
    }
}
