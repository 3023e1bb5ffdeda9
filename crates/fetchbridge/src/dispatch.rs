//! Dispatch bridge.
//!
//! Ties the pieces together for each host event:
//!
//! ```text
//! EntryPoint(request, resolver)
//!   → tokio task
//!     → blocking pool: Request::from_host → Handler::serve → into_host_response
//!       → construction error → Resolver::fail
//!       → handler returned   → Resolver::fulfill
//!       → handler panicked   → HandlerFaultPolicy (fail the event, or abort)
//! ```
//!
//! The handler runs on the blocking pool because body reads park the thread
//! until the host settles a pull, while the host keeps driving its own loop.
//! Nothing is shared between concurrent events besides the handler itself.

use std::any::Any;
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::config::{BridgeConfig, HandlerFaultPolicy, RegistrationPolicy};
use crate::convert::into_host_response;
use crate::error::{BridgeError, BridgeResult};
use crate::host::{listener_script, EntryPoint, Host, HostError, HostRequest, HostResponse, Resolver};
use crate::request::Request;
use crate::response::{ResponseSink, ResponseWriter};

/// A synchronous request handler.
///
/// Called once per request with a fresh [`ResponseWriter`]; the response is
/// complete when `serve` returns.
pub trait Handler: Send + Sync {
    fn serve(&self, w: &mut dyn ResponseWriter, req: &mut Request);
}

impl<F> Handler for F
where
    F: Fn(&mut dyn ResponseWriter, &mut Request) + Send + Sync,
{
    fn serve(&self, w: &mut dyn ResponseWriter, req: &mut Request) {
        self(w, req)
    }
}

/// Pins down closure argument types so `|w, req| ...` infers as a [`Handler`].
pub fn handler_fn<F>(f: F) -> F
where
    F: Fn(&mut dyn ResponseWriter, &mut Request) + Send + Sync + 'static,
{
    f
}

/// Init-once guard for the global entry point.
///
/// Only [`GLOBAL_REGISTRATION`] enforces the single active bridge per
/// process. A locally created guard covers only the bridges registered
/// through it, which is what tests and embedders with several isolated
/// hosts want.
#[derive(Debug)]
pub struct RegistrationGuard {
    registered: AtomicBool,
}

impl RegistrationGuard {
    pub const fn new() -> Self {
        Self {
            registered: AtomicBool::new(false),
        }
    }

    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::Acquire)
    }

    /// Take the registration. Returns `Ok(false)` when a registration already
    /// exists and `policy` says to ignore the attempt.
    pub fn acquire(&self, policy: RegistrationPolicy) -> BridgeResult<bool> {
        if self
            .registered
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            return Ok(true);
        }
        match policy {
            RegistrationPolicy::Reject => Err(BridgeError::AlreadyRegistered),
            RegistrationPolicy::Ignore => {
                tracing::warn!("fetch bridge already registered, ignoring repeated registration");
                Ok(false)
            }
        }
    }

    fn release(&self) {
        self.registered.store(false, Ordering::Release);
    }
}

impl Default for RegistrationGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// The process-wide guard used by [`listen_and_serve`]. Pass it to
/// [`Bridge::register`] to take part in the same single-registration rule.
pub static GLOBAL_REGISTRATION: RegistrationGuard = RegistrationGuard::new();

/// Outcome of [`Bridge::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Active,
    /// An earlier registration is still in place; nothing was changed.
    Ignored,
}

/// Translate one host request, run the handler, and build the host response.
///
/// Blocks while the handler reads the body; call it from a blocking context.
/// The request body is closed once the handler returns.
pub fn serve_event(handler: &dyn Handler, host: &mut dyn HostRequest) -> BridgeResult<HostResponse> {
    let mut req = Request::from_host(host)?;
    tracing::debug!(method = %req.method(), url = %req.uri(), "dispatching request");

    let mut sink = ResponseSink::new();
    handler.serve(&mut sink, &mut req);
    req.close_body();

    let response = into_host_response(sink);
    tracing::debug!(
        status = response.status,
        body_len = response.body.len(),
        "handler finished"
    );
    Ok(response)
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

/// A handler bound to a runtime and configuration, ready to receive events.
pub struct Bridge {
    handler: Arc<dyn Handler>,
    config: BridgeConfig,
    runtime: Handle,
}

impl Bridge {
    /// Create a bridge on the current tokio runtime.
    pub fn new(handler: impl Handler + 'static, config: BridgeConfig) -> BridgeResult<Arc<Self>> {
        let runtime = Handle::try_current()
            .map_err(|e| BridgeError::Host(format!("fetch bridge needs a tokio runtime: {e}")))?;
        Self::with_runtime(handler, config, runtime)
    }

    pub fn with_runtime(
        handler: impl Handler + 'static,
        config: BridgeConfig,
        runtime: Handle,
    ) -> BridgeResult<Arc<Self>> {
        config.validate()?;
        Ok(Arc::new(Self {
            handler: Arc::new(handler),
            config,
            runtime,
        }))
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Handle one host event. Returns immediately; the event is settled from
    /// the spawned task.
    pub fn dispatch(self: &Arc<Self>, request: Box<dyn HostRequest>, resolver: Resolver) -> JoinHandle<()> {
        let bridge = Arc::clone(self);
        self.runtime
            .spawn(async move { bridge.run_event(request, resolver).await })
    }

    async fn run_event(&self, mut request: Box<dyn HostRequest>, resolver: Resolver) {
        let handler = Arc::clone(&self.handler);
        let outcome =
            tokio::task::spawn_blocking(move || serve_event(handler.as_ref(), request.as_mut()))
                .await;

        match outcome {
            Ok(Ok(response)) => resolver.fulfill(response),
            Ok(Err(err)) => {
                tracing::debug!(error = %err, "request rejected before reaching the handler");
                resolver.fail(HostError::from(err));
            }
            Err(join) if join.is_panic() => {
                let payload = join.into_panic();
                let message = panic_message(payload.as_ref()).to_string();
                tracing::error!(panic = %message, "handler panicked");
                match self.config.handler_faults {
                    HandlerFaultPolicy::Isolate => {
                        resolver.fail(HostError::new(format!("handler panicked: {message}")));
                    }
                    HandlerFaultPolicy::Propagate => {
                        tracing::error!("handler fault is fatal, aborting");
                        drop(resolver);
                        std::process::abort();
                    }
                }
            }
            Err(join) => resolver.fail(HostError::new(join.to_string())),
        }
    }

    /// The function the host calls for every fetch event.
    pub fn entry_point(self: &Arc<Self>) -> EntryPoint {
        let bridge = Arc::clone(self);
        Arc::new(move |request: Box<dyn HostRequest>, resolver: Resolver| {
            bridge.dispatch(request, resolver);
        })
    }

    /// Install the fetch listener and expose the entry point on `host`.
    ///
    /// `guard` enforces a single registration under the configured policy,
    /// but only among callers sharing it; use [`GLOBAL_REGISTRATION`] for the
    /// process-wide rule. A host failure releases the guard again.
    pub fn register(self: &Arc<Self>, host: &dyn Host, guard: &RegistrationGuard) -> BridgeResult<Registration> {
        if !guard.acquire(self.config.registration_policy)? {
            return Ok(Registration::Ignored);
        }

        let name = self.config.entry_point.as_str();
        let installed = host
            .install_listener(&listener_script(name))
            .and_then(|()| host.register_global(name, self.entry_point()));
        if let Err(err) = installed {
            guard.release();
            return Err(BridgeError::Host(err.to_string()));
        }

        tracing::info!(entry_point = %name, "fetch bridge registered");
        Ok(Registration::Active)
    }
}

/// Register `handler` with `host` and keep serving for the life of the process.
///
/// Uses [`GLOBAL_REGISTRATION`]. Under [`RegistrationPolicy::Reject`] a second
/// call fails with [`BridgeError::AlreadyRegistered`]; under
/// [`RegistrationPolicy::Ignore`] it returns `Ok(())` at once. The first call
/// never returns: it parks on a future that is never woken while the host
/// keeps delivering events.
pub async fn listen_and_serve(
    host: &dyn Host,
    handler: impl Handler + 'static,
    config: BridgeConfig,
) -> BridgeResult<()> {
    let bridge = Bridge::new(handler, config)?;
    if bridge.register(host, &GLOBAL_REGISTRATION)? == Registration::Ignored {
        return Ok(());
    }
    let never: Infallible = std::future::pending().await;
    match never {}
}
