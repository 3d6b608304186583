//! Success/error notification bus shared by every fetcher of a registry.
//!
//! Listeners are append-only. A listener registered without a scope hears
//! every fetcher; a scoped listener only hears the fetcher whose scope
//! matches.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;

use crate::error::{FetchError, UsageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Success,
    Error,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Success => "success",
            EventKind::Error => "error",
        }
    }
}

impl FromStr for EventKind {
    type Err = UsageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(EventKind::Success),
            "error" => Ok(EventKind::Error),
            other => Err(UsageError::UnknownEvent(other.to_string())),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a listener receives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FetchEvent<'a> {
    /// The value the dispatch resolved with.
    Success(&'a Value),
    Error(&'a FetchError),
}

impl FetchEvent<'_> {
    pub fn kind(&self) -> EventKind {
        match self {
            FetchEvent::Success(_) => EventKind::Success,
            FetchEvent::Error(_) => EventKind::Error,
        }
    }
}

pub type Handler = Arc<dyn Fn(&FetchEvent<'_>) + Send + Sync>;

struct Listener {
    scope: Option<String>,
    handler: Handler,
}

#[derive(Default)]
pub struct EventBus {
    success: RwLock<Vec<Listener>>,
    error: RwLock<Vec<Listener>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("success", &self.len(EventKind::Success))
            .field("error", &self.len(EventKind::Error))
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn listeners(&self, kind: EventKind) -> &RwLock<Vec<Listener>> {
        match kind {
            EventKind::Success => &self.success,
            EventKind::Error => &self.error,
        }
    }

    /// Register a listener; `scope: None` hears every fetcher.
    pub fn subscribe<F>(&self, scope: Option<&str>, kind: EventKind, handler: F)
    where
        F: Fn(&FetchEvent<'_>) + Send + Sync + 'static,
    {
        self.listeners(kind)
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Listener {
                scope: scope.map(str::to_string),
                handler: Arc::new(handler),
            });
    }

    /// Invoke every listener of `event.kind()` that matches `scope`.
    ///
    /// Handlers run on a snapshot, so a handler may subscribe further
    /// listeners without deadlocking; those only hear later events.
    pub fn emit(&self, scope: &str, event: FetchEvent<'_>) {
        let matching: Vec<Handler> = self
            .listeners(event.kind())
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|l| l.scope.as_deref().map_or(true, |s| s == scope))
            .map(|l| Arc::clone(&l.handler))
            .collect();
        for handler in matching {
            handler(&event);
        }
    }

    pub fn len(&self, kind: EventKind) -> usize {
        self.listeners(kind)
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len(EventKind::Success) == 0 && self.len(EventKind::Error) == 0
    }

    /// Drop every listener. Only meant for resetting a registry.
    pub(crate) fn clear(&self) {
        for kind in [EventKind::Success, EventKind::Error] {
            self.listeners(kind)
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .clear();
        }
    }
}
