//! Fetchers: configured request senders bound to one endpoint.
//!
//! # Design
//! A fetcher owns a normalized [`RequestTemplate`], a [`Transport`] and the
//! registry's [`EventBus`]. Like the rest of the crate, each round trip is
//! split into a pure `build_request`, the transport call, and a pure
//! [`parse_response`]; `send` chains the three and then notifies listeners
//! exactly once with the outcome.
//!
//! [`JsonFetcher`] sends action envelopes; the upload variant lives in
//! [`crate::upload`]. Both implement [`Fetcher`].

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error};

use crate::config::RequestTemplate;
use crate::envelope::{unwrap_reply, DispatchEnvelope};
use crate::error::{normalize, FetchError, RawError, UsageError};
use crate::events::{EventBus, EventKind, FetchEvent};
use crate::transport::{HttpRequest, HttpResponse, RequestBody, Transport};

/// Capabilities shared by JSON and upload fetchers.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// What one request is made from.
    type Input: Send + 'static;

    /// Identity used to scope event listeners.
    fn scope(&self) -> &str;

    /// Snapshot of the current configuration.
    fn template(&self) -> RequestTemplate;

    async fn send(&self, input: Self::Input) -> Result<Value, FetchError>;

    /// Change the configuration after creation. See
    /// [`RequestTemplate`] for which key/value pairs are accepted.
    fn set_config(&self, key: &str, value: Value) -> Result<(), UsageError>;

    /// Listen to this fetcher only.
    fn on<F>(&self, kind: EventKind, handler: F)
    where
        F: Fn(&FetchEvent<'_>) + Send + Sync + 'static,
        Self: Sized;
}

/// State shared by both fetcher kinds.
pub(crate) struct Binding {
    scope: String,
    template: RwLock<RequestTemplate>,
    transport: Arc<dyn Transport>,
    events: Arc<EventBus>,
}

impl Binding {
    pub(crate) fn new(
        scope: String,
        template: RequestTemplate,
        transport: Arc<dyn Transport>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            scope,
            template: RwLock::new(template),
            transport,
            events,
        }
    }

    pub(crate) fn scope(&self) -> &str {
        &self.scope
    }

    pub(crate) fn template(&self) -> RequestTemplate {
        self.template
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set_config(&self, key: &str, value: Value) -> Result<(), UsageError> {
        self.template
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .apply(key, value)
    }

    pub(crate) fn subscribe<F>(&self, kind: EventKind, handler: F)
    where
        F: Fn(&FetchEvent<'_>) + Send + Sync + 'static,
    {
        self.events.subscribe(Some(self.scope.as_str()), kind, handler);
    }

    pub(crate) async fn round_trip(&self, request: HttpRequest) -> Result<Value, FetchError> {
        debug!(scope = %self.scope, url = %request.url, "sending request");
        let outcome = match self.transport.send(request).await {
            Ok(response) => parse_response(&response),
            Err(e) => Err(normalize(RawError::Transport(e.to_string()), e.status())),
        };
        self.settle(outcome)
    }

    /// Notify listeners of the outcome, then hand it back.
    pub(crate) fn settle(
        &self,
        outcome: Result<Value, FetchError>,
    ) -> Result<Value, FetchError> {
        match &outcome {
            Ok(value) => self.events.emit(&self.scope, FetchEvent::Success(value)),
            Err(err) => {
                debug!(scope = %self.scope, code = %err.code, status = err.status, "request failed");
                self.events.emit(&self.scope, FetchEvent::Error(err));
            }
        }
        outcome
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("scope", &self.scope)
            .field("template", &self.template())
            .finish_non_exhaustive()
    }
}

/// Interpret a reply according to the envelope protocol.
pub fn parse_response(response: &HttpResponse) -> Result<Value, FetchError> {
    unwrap_reply(&response.body).map_err(|raw| normalize(raw, Some(response.status)))
}

/// Sends `{type, payload, filter?}` envelopes as JSON.
#[derive(Debug)]
pub struct JsonFetcher {
    binding: Binding,
}

impl JsonFetcher {
    pub(crate) fn new(binding: Binding) -> Self {
        Self { binding }
    }

    /// Dispatch `action` with a payload object (or `null`).
    ///
    /// A payload that is not an object is a usage error: it is logged and
    /// returned as `INVALID_PAYLOAD` without touching the network or the
    /// listeners.
    pub async fn dispatch(&self, action: &str, payload: Value) -> Result<Value, FetchError> {
        let Some(envelope) = DispatchEnvelope::from_payload(action, payload) else {
            error!(action, "usage: dispatch(action, payload); payload must be an object");
            return Err(FetchError::invalid_payload());
        };
        self.send(envelope).await
    }

    pub fn build_request(&self, envelope: &DispatchEnvelope) -> Result<HttpRequest, FetchError> {
        let body = serde_json::to_string(envelope).map_err(|e| {
            normalize(
                RawError::Failure(format!("failed to serialize envelope: {e}")),
                None,
            )
        })?;
        let template = self.binding.template();
        Ok(HttpRequest {
            url: template.url,
            headers: template.headers.into_iter().collect(),
            credentials: template.credentials,
            body: RequestBody::Json(body),
        })
    }
}

#[async_trait]
impl Fetcher for JsonFetcher {
    type Input = DispatchEnvelope;

    fn scope(&self) -> &str {
        self.binding.scope()
    }

    fn template(&self) -> RequestTemplate {
        self.binding.template()
    }

    async fn send(&self, envelope: DispatchEnvelope) -> Result<Value, FetchError> {
        match self.build_request(&envelope) {
            Ok(request) => self.binding.round_trip(request).await,
            Err(err) => self.binding.settle(Err(err)),
        }
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
