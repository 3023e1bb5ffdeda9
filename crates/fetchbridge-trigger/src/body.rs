//! Pull-based view of a hyper body.

use std::fmt::Display;
use std::sync::Arc;

use bytes::Bytes;
use fetchbridge::{HostBodyStream, HostError, PullCallback, PullResult};
use http_body_util::BodyExt;
use hyper::body::Body;
use tokio::runtime::Handle;
use tokio::sync::Mutex;

/// Serves [`HostBodyStream`] pulls from a hyper body.
///
/// Each pull is completed from a runtime task, the way a host settles a
/// read promise from its event loop. Trailer frames are skipped.
pub struct HyperBodyStream<B> {
    body: Arc<Mutex<Option<B>>>,
    runtime: Handle,
}

impl<B> HyperBodyStream<B>
where
    B: Body<Data = Bytes> + Unpin + Send + 'static,
    B::Error: Display + Send,
{
    pub fn new(body: B, runtime: Handle) -> Self {
        Self {
            body: Arc::new(Mutex::new(Some(body))),
            runtime,
        }
    }
}

async fn next_chunk<B>(body: &Mutex<Option<B>>) -> Result<PullResult, HostError>
where
    B: Body<Data = Bytes> + Unpin,
    B::Error: Display,
{
    let mut guard = body.lock().await;
    let Some(body) = guard.as_mut() else {
        return Err(HostError::new("body stream was cancelled"));
    };
    loop {
        match body.frame().await {
            None => return Ok(PullResult::Done),
            Some(Err(e)) => return Err(HostError::new(e.to_string())),
            Some(Ok(frame)) => {
                if let Ok(data) = frame.into_data() {
                    return Ok(PullResult::Chunk(data));
                }
            }
        }
    }
}

impl<B> HostBodyStream for HyperBodyStream<B>
where
    B: Body<Data = Bytes> + Unpin + Send + 'static,
    B::Error: Display + Send,
{
    fn pull(&mut self, settle: PullCallback) {
        let body = Arc::clone(&self.body);
        self.runtime.spawn(async move {
            settle(next_chunk(&body).await);
        });
    }

    fn cancel(&mut self) {
        let body = Arc::clone(&self.body);
        self.runtime.spawn(async move {
            if body.lock().await.take().is_some() {
                tracing::debug!("request body cancelled");
            }
        });
    }
}
