//! In-process fetch host.
//!
//! `LocalHost` stands in for the JavaScript environment: it accepts the
//! fetch listener script, keeps the registered globals, and turns each
//! [`LocalHost::fetch`] call into one fetch event settled through a
//! [`Resolver`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use fetchbridge::host::listener_entry_point;
use fetchbridge::{EntryPoint, Host, HostError, HostRequest, HostResponse, Resolver};
use tokio::sync::oneshot;
use tracing::{debug, info};

#[derive(Default)]
pub struct LocalHost {
    listener: RwLock<Option<String>>,
    globals: RwLock<HashMap<String, EntryPoint>>,
}

impl LocalHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a fetch listener is installed and its target global exists.
    pub fn is_ready(&self) -> bool {
        self.listener_target().is_some()
    }

    fn listener_target(&self) -> Option<EntryPoint> {
        let listener = self.listener.read().unwrap();
        let name = listener.as_deref()?;
        self.globals.read().unwrap().get(name).cloned()
    }

    /// Deliver one fetch event and wait for it to settle.
    ///
    /// A "fail" settlement comes back as `Err` carrying the error object.
    pub async fn fetch(&self, request: Box<dyn HostRequest>) -> Result<HostResponse, HostError> {
        let entry_point = self
            .listener_target()
            .ok_or_else(|| HostError::new("no fetch listener is registered"))?;

        let (tx, rx) = oneshot::channel();
        let tx = Arc::new(Mutex::new(Some(tx)));
        let fail_tx = Arc::clone(&tx);
        let resolver = Resolver::new(
            move |response| {
                if let Some(tx) = tx.lock().unwrap().take() {
                    let _ = tx.send(Ok(response));
                }
            },
            move |error| {
                if let Some(tx) = fail_tx.lock().unwrap().take() {
                    let _ = tx.send(Err(error));
                }
            },
        );

        entry_point(request, resolver);

        rx.await
            .map_err(|_| HostError::new("fetch event was never settled"))?
    }
}

impl Host for LocalHost {
    fn install_listener(&self, script: &str) -> Result<(), HostError> {
        let name = listener_entry_point(script)
            .ok_or_else(|| HostError::new("unsupported listener script"))?;
        debug!(entry_point = %name, "fetch listener installed");
        *self.listener.write().unwrap() = Some(name.to_string());
        Ok(())
    }

    fn register_global(&self, name: &str, entry_point: EntryPoint) -> Result<(), HostError> {
        info!(global = %name, "global registered");
        self.globals
            .write()
            .unwrap()
            .insert(name.to_string(), entry_point);
        Ok(())
    }
}
