//! fetchbridge: serve fetch events from a callback-driven host with a
//! synchronous handler.
//!
//! The host hands over each request as a [`HostRequest`] plus a
//! [`Resolver`] (the fulfill/fail continuations). The bridge translates the
//! request, runs the [`Handler`] against a [`ResponseSink`], and settles the
//! event with a [`HostResponse`].
//!
//! # Architecture
//!
//! ```text
//! host fetch event
//!   │
//!   ▼
//! Bridge::dispatch
//!   │
//!   ├── Request::from_host     (header::to_internal, StreamReader body)
//!   ├── Handler::serve         (blocking pool; body reads park on the host)
//!   ├── into_host_response     (status text, header::to_host)
//!   │
//!   ▼
//! Resolver::fulfill / Resolver::fail
//! ```

pub mod body;
pub mod config;
pub mod convert;
pub mod dispatch;
mod error;
pub mod header;
pub mod host;
pub mod request;
pub mod response;

pub use body::StreamReader;
pub use config::{BridgeConfig, HandlerFaultPolicy, RegistrationPolicy};
pub use dispatch::{
    handler_fn, listen_and_serve, serve_event, Bridge, Handler, Registration, RegistrationGuard,
    GLOBAL_REGISTRATION,
};
pub use error::{BodyError, BridgeError, BridgeResult};
pub use header::{Header, HeaderMap};
pub use host::{
    EntryPoint, Host, HostBodyStream, HostError, HostHeaders, HostRequest, HostResponse,
    PullCallback, PullResult, Resolver,
};
pub use request::{Body, Request};
pub use response::{ResponseSink, ResponseWriter};
