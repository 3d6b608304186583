//! Fetcher factory and registry.
//!
//! # Design
//! The registry is an explicit value, not a process global: it owns the
//! named fetchers, the event bus every fetcher reports to, the transport and
//! the default endpoint resolver. Named fetchers follow first-writer-wins:
//! asking to create a name that already exists returns the existing
//! instance. Anonymous and upload fetchers are never retained; each gets a
//! fresh scope for event listeners.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::{FetcherConfig, RequestTemplate};
use crate::error::{ConfigError, TransportError};
use crate::events::{EventBus, EventKind, FetchEvent};
use crate::fetcher::{Binding, JsonFetcher};
use crate::resolver::EndpointResolver;
use crate::transport::{ReqwestTransport, Transport};
use crate::upload::UploadFetcher;

pub struct FetcherRegistry {
    fetchers: RwLock<HashMap<String, Arc<JsonFetcher>>>,
    events: Arc<EventBus>,
    transport: Arc<dyn Transport>,
    resolver: Arc<dyn EndpointResolver>,
}

impl fmt::Debug for FetcherRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetcherRegistry")
            .field("names", &self.names())
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

impl FetcherRegistry {
    pub fn new(transport: Arc<dyn Transport>, resolver: Arc<dyn EndpointResolver>) -> Self {
        Self {
            fetchers: RwLock::new(HashMap::new()),
            events: Arc::new(EventBus::new()),
            transport,
            resolver,
        }
    }

    /// Registry sending through a default [`ReqwestTransport`].
    pub fn with_reqwest(resolver: Arc<dyn EndpointResolver>) -> Result<Self, TransportError> {
        Ok(Self::new(Arc::new(ReqwestTransport::new()?), resolver))
    }

    /// Look up a named fetcher. Never creates one.
    pub fn get(&self, name: &str) -> Option<Arc<JsonFetcher>> {
        self.fetchers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Create and register a named fetcher.
    ///
    /// If `name` is taken, the existing fetcher is returned unchanged and
    /// `config` is ignored.
    pub fn create(
        &self,
        name: &str,
        config: FetcherConfig,
    ) -> Result<Arc<JsonFetcher>, ConfigError> {
        let mut fetchers = self
            .fetchers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = fetchers.get(name) {
            warn!(name, "fetcher already exists, returning it instead");
            return Ok(Arc::clone(existing));
        }

        let fetcher = Arc::new(JsonFetcher::new(self.bind(name.to_string(), config)?));
        fetchers.insert(name.to_string(), Arc::clone(&fetcher));
        debug!(name, "registered fetcher");
        Ok(fetcher)
    }

    /// Create a fetcher that is not registered under any name.
    pub fn create_anonymous(&self, config: FetcherConfig) -> Result<Arc<JsonFetcher>, ConfigError> {
        let scope = format!("fetcher-{}", Uuid::new_v4());
        Ok(Arc::new(JsonFetcher::new(self.bind(scope, config)?)))
    }

    /// Create a new, unregistered upload fetcher.
    pub fn upload(&self, config: FetcherConfig) -> Result<UploadFetcher, ConfigError> {
        let scope = format!("upload-{}", Uuid::new_v4());
        let template = RequestTemplate::normalize(config, self.resolver.as_ref())?.into_upload();
        Ok(UploadFetcher::new(Binding::new(
            scope,
            template,
            Arc::clone(&self.transport),
            Arc::clone(&self.events),
        )))
    }

    /// Listen to every fetcher of this registry.
    pub fn on<F>(&self, kind: EventKind, handler: F)
    where
        F: Fn(&FetchEvent<'_>) + Send + Sync + 'static,
    {
        self.events.subscribe(None, kind, handler);
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .fetchers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Forget every named fetcher and every listener.
    ///
    /// Fetchers already handed out keep working but their listeners are
    /// gone.
    pub fn reset(&self) {
        self.fetchers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.events.clear();
    }

    fn bind(&self, scope: String, config: FetcherConfig) -> Result<Binding, ConfigError> {
        let template = RequestTemplate::normalize(config, self.resolver.as_ref())?;
        Ok(Binding::new(
            scope,
            template,
            Arc::clone(&self.transport),
            Arc::clone(&self.events),
        ))
    }
}
