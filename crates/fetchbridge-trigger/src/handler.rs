//! HTTP trigger handler.
//!
//! `HttpTrigger` manages a hyper HTTP server that turns every request into a
//! fetch event on a [`LocalHost`].

use std::io::Read;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use bytes::Bytes;
use fetchbridge::{handler_fn, Handler};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::runtime::Handle;
use tracing::{debug, error, info};

use crate::convert::{error_response, into_hyper_response, IncomingRequest};
use crate::host::LocalHost;

/// HTTP trigger server.
///
/// Holds a bound listener and forwards each request to whatever entry point
/// the fetch listener on `host` names.
pub struct HttpTrigger {
    listener: TcpListener,
    host: Arc<LocalHost>,
}

impl HttpTrigger {
    /// Bind the trigger. Port 0 picks a free port; see [`HttpTrigger::local_addr`].
    pub async fn bind(addr: SocketAddr, host: Arc<LocalHost>) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .context("failed to bind HTTP trigger")?;
        Ok(Self { listener, host })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("HTTP trigger has no local address")
    }

    /// Start the HTTP server.
    ///
    /// This runs until the shutdown signal is received. Spawns a
    /// tokio task per connection using HTTP/1.1.
    pub async fn serve(self, mut shutdown: tokio::sync::watch::Receiver<bool>) -> anyhow::Result<()> {
        info!(addr = %self.local_addr()?, "HTTP trigger listening");

        loop {
            tokio::select! {
                accept_result = self.listener.accept() => {
                    let (stream, peer_addr) = accept_result.context("accept failed")?;
                    let host = Arc::clone(&self.host);

                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);
                        let svc = service_fn(move |req: Request<Incoming>| {
                            let host = Arc::clone(&host);
                            async move {
                                let request = IncomingRequest::from_hyper(req, &Handle::current());
                                let resp = match host.fetch(Box::new(request)).await {
                                    Ok(response) => into_hyper_response(response),
                                    Err(e) => {
                                        error!(%peer_addr, error = %e, "fetch event failed");
                                        error_response(&e)
                                    }
                                };
                                Ok::<Response<Full<Bytes>>, hyper::Error>(resp)
                            }
                        });

                        if let Err(e) = http1::Builder::new()
                            .serve_connection(io, svc)
                            .await
                        {
                            debug!(%peer_addr, error = %e, "connection error");
                        }
                    });
                }
                _ = shutdown.changed() => {
                    info!("HTTP trigger shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}

/// Create a simple echo handler for testing.
///
/// Responds with the request method and path on the first line followed by
/// the request body. A body read failure becomes a 400 carrying the error.
pub fn echo_handler() -> impl Handler + 'static {
    handler_fn(|w, req| {
        let mut body = Vec::new();
        if let Err(e) = req.body_mut().read_to_end(&mut body) {
            w.set_status(400);
            w.write(e.to_string().as_bytes());
            return;
        }

        w.headers_mut().set("Content-Type", "text/plain");
        let line = format!("{} {}\n", req.method(), req.uri().path());
        w.write(line.as_bytes());
        w.write(&body);
    })
}
