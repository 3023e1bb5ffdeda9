//! Host-side handles.
//!
//! The host runtime owns the network listener and the request objects. It
//! exposes them to the bridge through the traits in this module and expects
//! every request event to be settled through a [`Resolver`] rather than a
//! return value.
//!
//! # Event flow
//!
//! ```text
//! host 'fetch' event
//!   → listener script calls <entry_point>(request, fulfill, fail)
//!     → EntryPoint(Box<dyn HostRequest>, Resolver)
//!       → exactly one of Resolver::fulfill / Resolver::fail
//! ```

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

/// Error object handed to the host's "fail" continuation, or reported by the
/// host when a body pull is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostError {
    message: String,
}

impl HostError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HostError {}

impl From<crate::BridgeError> for HostError {
    fn from(err: crate::BridgeError) -> Self {
        Self::new(err.to_string())
    }
}

/// Outcome of a single successful body pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullResult {
    Chunk(Bytes),
    Done,
}

/// Completion callback for [`HostBodyStream::pull`].
pub type PullCallback = Box<dyn FnOnce(Result<PullResult, HostError>) + Send>;

/// A pull-based, callback-completed byte source owned by the host.
pub trait HostBodyStream: Send {
    /// Request one chunk. The host invokes `settle` exactly once, possibly
    /// from another thread and possibly before this call returns.
    fn pull(&mut self, settle: PullCallback);

    /// Best-effort cancellation. The outcome is not observable.
    fn cancel(&mut self);
}

/// A request object owned by the host. Read once during translation.
pub trait HostRequest: Send {
    fn method(&self) -> String;

    fn url(&self) -> String;

    /// The host's header pairs in iteration order. Duplicates are allowed.
    fn header_entries(&self) -> Vec<(String, String)>;

    /// Hand over the body reader. `None` covers both an absent and a null body.
    fn take_body(&mut self) -> Option<Box<dyn HostBodyStream>>;
}

/// The host's header object. The only mutation is `append`, which takes a
/// single value string per call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostHeaders {
    entries: Vec<(String, String)>,
}

impl HostHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// First value stored under `name` (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The host's response object, passed to the "fulfill" continuation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: HostHeaders,
    pub body: Bytes,
}

type Fulfill = Box<dyn FnOnce(HostResponse) + Send>;
type Fail = Box<dyn FnOnce(HostError) + Send>;

/// The fulfill/fail continuation pair for one event.
///
/// Settling consumes the resolver, so an event cannot be resolved twice.
/// A resolver dropped without settling leaves the host's promise pending
/// and is logged.
pub struct Resolver {
    fulfill: Option<Fulfill>,
    fail: Option<Fail>,
}

impl Resolver {
    pub fn new(
        fulfill: impl FnOnce(HostResponse) + Send + 'static,
        fail: impl FnOnce(HostError) + Send + 'static,
    ) -> Self {
        Self {
            fulfill: Some(Box::new(fulfill)),
            fail: Some(Box::new(fail)),
        }
    }

    pub fn fulfill(mut self, response: HostResponse) {
        self.fail = None;
        if let Some(fulfill) = self.fulfill.take() {
            fulfill(response);
        }
    }

    pub fn fail(mut self, error: HostError) {
        self.fulfill = None;
        if let Some(fail) = self.fail.take() {
            fail(error);
        }
    }

    pub fn settle(self, outcome: Result<HostResponse, HostError>) {
        match outcome {
            Ok(response) => self.fulfill(response),
            Err(error) => self.fail(error),
        }
    }
}

impl Drop for Resolver {
    fn drop(&mut self) {
        if self.fulfill.is_some() || self.fail.is_some() {
            tracing::warn!("resolver dropped without settling the event");
        }
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("settled", &self.fulfill.is_none())
            .finish()
    }
}

/// The globally registered dispatch function the listener script calls.
pub type EntryPoint = Arc<dyn Fn(Box<dyn HostRequest>, Resolver) + Send + Sync>;

/// The host environment the bridge registers itself with.
pub trait Host: Send + Sync {
    /// Evaluate a host-environment script (the fetch listener).
    fn install_listener(&self, script: &str) -> Result<(), HostError>;

    /// Expose `entry_point` as a global named `name`.
    fn register_global(&self, name: &str, entry_point: EntryPoint) -> Result<(), HostError>;
}

const LISTENER_PREFIX: &str =
    "addEventListener('fetch',function(a){a.respondWith(new Promise(function(b,c){";
const LISTENER_SUFFIX: &str = "(a.request,b,c);}))});";

/// Render the one-line script that forwards every fetch event into a
/// promise whose resolve/reject are handed to `entry_point`.
pub fn listener_script(entry_point: &str) -> String {
    format!("{LISTENER_PREFIX}{entry_point}{LISTENER_SUFFIX}")
}

/// Recover the entry point name from a script produced by [`listener_script`].
pub fn listener_entry_point(script: &str) -> Option<&str> {
    script
        .strip_prefix(LISTENER_PREFIX)?
        .strip_suffix(LISTENER_SUFFIX)
        .filter(|name| !name.is_empty())
}
