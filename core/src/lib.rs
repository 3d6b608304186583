//! Client for a single-endpoint action dispatch API.
//!
//! # Overview
//! Every request goes to one endpoint (by default `<origin>/dispatch`) as a
//! `POST`. Actions are sent as a JSON envelope `{type, payload, filter?}`;
//! files are sent as `multipart/form-data`. Replies carry `result` (and
//! optionally `meta`) or `error`, and every failure is normalized into a
//! [`FetchError`] with a `code` and a `status`.
//!
//! # Design
//! - [`FetcherRegistry`] is the factory: named fetchers (first writer wins),
//!   anonymous fetchers, upload fetchers, and registry-wide listeners. It is
//!   an ordinary value; create one per application (or per test).
//! - [`JsonFetcher`] and [`UploadFetcher`] implement [`Fetcher`]. Each round
//!   trip is split into a pure `build_request`, a [`Transport`] call and a
//!   pure [`parse_response`], so the protocol is testable without a network.
//! - The default url is derived through an [`EndpointResolver`], keeping the
//!   crate independent of any particular host environment.
//!
//! ```no_run
//! use std::sync::Arc;
//! use dispatch_core::{EventKind, FetcherConfig, FetcherRegistry, StaticOrigin};
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = FetcherRegistry::with_reqwest(Arc::new(StaticOrigin::new("https://app.example.com")))?;
//! registry.on(EventKind::Error, |event| eprintln!("request failed: {event:?}"));
//!
//! let api = registry.create("api", FetcherConfig::new().with_authorization("token"))?;
//! let user = api.dispatch("user.read", json!({"id": 7})).await?;
//! # let _ = user;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod envelope;
pub mod error;
pub mod events;
pub mod fetcher;
pub mod logging;
pub mod registry;
pub mod resolver;
pub mod transport;
pub mod upload;

pub use config::{Credentials, CredentialsSetting, FetcherConfig, RequestTemplate};
pub use envelope::DispatchEnvelope;
pub use error::{ConfigError, FetchError, RawError, TransportError, UsageError};
pub use events::{EventBus, EventKind, FetchEvent};
pub use fetcher::{parse_response, Fetcher, JsonFetcher};
pub use registry::FetcherRegistry;
pub use resolver::{EndpointResolver, EnvOrigin, PageLocation, StaticOrigin};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, RequestBody, Transport};
pub use upload::{UploadFetcher, UploadFile};
