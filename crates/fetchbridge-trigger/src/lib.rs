//! fetchbridge-trigger: a local fetch host for fetchbridge handlers.
//!
//! Plays the part of the host runtime so a bridge can be run and tested
//! without a JavaScript environment. Each inbound HTTP request becomes a
//! fetch event delivered to the registered entry point; the settled host
//! response is written back over the wire.
//!
//! # Architecture
//!
//! ```text
//! HTTP client
//!   │
//!   ▼
//! hyper server (HttpTrigger)
//!   │
//!   ├── hyper::Request → IncomingRequest (body as HyperBodyStream)
//!   ├── LocalHost::fetch → registered entry point → Resolver
//!   ├── HostResponse → hyper::Response  (a failed event becomes a 500)
//!   │
//!   ▼
//! HTTP response
//! ```

pub mod body;
pub mod convert;
pub mod handler;
pub mod host;

pub use body::HyperBodyStream;
pub use convert::IncomingRequest;
pub use handler::{echo_handler, HttpTrigger};
pub use host::LocalHost;
