//! Integration tests for event dispatch through `Bridge`.
//!
//! Each test plays the host: it builds request handles whose bodies settle
//! pulls from runtime tasks, hands them to the bridge with a resolver, and
//! checks which continuation fired and with what.

use std::collections::VecDeque;
use std::io::Read;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use bytes::Bytes;
use tokio::runtime::Handle;
use tokio::sync::oneshot;

use fetchbridge::{
    handler_fn, Bridge, BridgeConfig, HandlerFaultPolicy, HostBodyStream, HostError, HostRequest,
    HostResponse, PullCallback, PullResult, Resolver,
};

// ── Tracing setup ────────────────────────────────────────────────

static TRACING_INIT: Once = Once::new();

fn init_tracing() {
    TRACING_INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init()
            .ok();
    });
}

// ── Host doubles ─────────────────────────────────────────────────

/// Settles every pull from a runtime task after a short delay.
struct DelayedChunks {
    chunks: VecDeque<Bytes>,
    runtime: Handle,
    pulls: Arc<AtomicUsize>,
}

impl HostBodyStream for DelayedChunks {
    fn pull(&mut self, settle: PullCallback) {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        let next = self.chunks.pop_front();
        self.runtime.spawn(async move {
            tokio::time::sleep(Duration::from_millis(1)).await;
            settle(Ok(match next {
                Some(chunk) => PullResult::Chunk(chunk),
                None => PullResult::Done,
            }));
        });
    }

    fn cancel(&mut self) {}
}

struct FailingBody;

impl HostBodyStream for FailingBody {
    fn pull(&mut self, settle: PullCallback) {
        settle(Err(HostError::new("connection reset")));
    }

    fn cancel(&mut self) {}
}

struct TestRequest {
    method: String,
    url: String,
    headers: Vec<(String, String)>,
    body: Option<Box<dyn HostBodyStream>>,
}

impl TestRequest {
    fn new(method: &str, url: &str) -> Self {
        Self {
            method: method.to_string(),
            url: url.to_string(),
            headers: Vec::new(),
            body: None,
        }
    }

    fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    fn body(mut self, body: impl HostBodyStream + 'static) -> Self {
        self.body = Some(Box::new(body));
        self
    }
}

impl HostRequest for TestRequest {
    fn method(&self) -> String {
        self.method.clone()
    }

    fn url(&self) -> String {
        self.url.clone()
    }

    fn header_entries(&self) -> Vec<(String, String)> {
        self.headers.clone()
    }

    fn take_body(&mut self) -> Option<Box<dyn HostBodyStream>> {
        self.body.take()
    }
}

/// Continuation pair that records every invocation and forwards the first
/// outcome to a channel.
struct Settlement {
    rx: oneshot::Receiver<Result<HostResponse, HostError>>,
    fulfilled: Arc<AtomicUsize>,
    failed: Arc<AtomicUsize>,
}

fn resolver() -> (Resolver, Settlement) {
    let (tx, rx) = oneshot::channel();
    let tx = Arc::new(Mutex::new(Some(tx)));
    let fulfilled = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));

    let (ok_tx, ok_count) = (Arc::clone(&tx), Arc::clone(&fulfilled));
    let (err_tx, err_count) = (tx, Arc::clone(&failed));
    let resolver = Resolver::new(
        move |resp| {
            ok_count.fetch_add(1, Ordering::SeqCst);
            if let Some(tx) = ok_tx.lock().unwrap().take() {
                let _ = tx.send(Ok(resp));
            }
        },
        move |err| {
            err_count.fetch_add(1, Ordering::SeqCst);
            if let Some(tx) = err_tx.lock().unwrap().take() {
                let _ = tx.send(Err(err));
            }
        },
    );

    (
        resolver,
        Settlement {
            rx,
            fulfilled,
            failed,
        },
    )
}

impl Settlement {
    async fn outcome(self) -> (Result<HostResponse, HostError>, usize, usize) {
        let outcome = tokio::time::timeout(Duration::from_secs(5), self.rx)
            .await
            .expect("event settled within 5s")
            .expect("resolver settled the event");
        (
            outcome,
            self.fulfilled.load(Ordering::SeqCst),
            self.failed.load(Ordering::SeqCst),
        )
    }
}

fn chunked(data: &[u8], size: usize) -> VecDeque<Bytes> {
    data.chunks(size).map(Bytes::copy_from_slice).collect()
}

// ── Continuation tests ───────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn malformed_url_fails_without_running_handler() {
    init_tracing();
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let bridge = Bridge::new(
        handler_fn(move |_, _| {
            seen.fetch_add(1, Ordering::SeqCst);
        }),
        BridgeConfig::default(),
    )
    .unwrap();

    let (resolver, settlement) = resolver();
    bridge
        .dispatch(Box::new(TestRequest::new("GET", "http://[::1")), resolver)
        .await
        .unwrap();

    let (outcome, fulfilled, failed) = settlement.outcome().await;
    let err = outcome.unwrap_err();
    assert!(err.message().contains("invalid url"), "got {err}");
    assert_eq!((fulfilled, failed), (0, 1));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn explicit_status_and_body_fulfill() {
    init_tracing();
    let bridge = Bridge::new(
        handler_fn(|w, _| {
            w.set_status(201);
            w.write(b"ok");
        }),
        BridgeConfig::default(),
    )
    .unwrap();

    let (resolver, settlement) = resolver();
    bridge.dispatch(Box::new(TestRequest::new("POST", "https://example.com/items")), resolver);

    let (outcome, fulfilled, failed) = settlement.outcome().await;
    let resp = outcome.unwrap();
    assert_eq!(resp.status, 201);
    assert_eq!(resp.status_text, "Created");
    assert_eq!(resp.body.as_ref(), b"ok");
    assert_eq!((fulfilled, failed), (1, 0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn default_status_is_200_ok() {
    let bridge = Bridge::new(
        handler_fn(|w, _| {
            w.write(b"hello");
        }),
        BridgeConfig::default(),
    )
    .unwrap();

    let (resolver, settlement) = resolver();
    bridge.dispatch(Box::new(TestRequest::new("GET", "https://example.com/")), resolver);

    let (outcome, _, _) = settlement.outcome().await;
    let resp = outcome.unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(resp.status_text, "OK");
    assert_eq!(resp.body.as_ref(), b"hello");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn duplicate_request_headers_flatten_on_the_way_back() {
    let bridge = Bridge::new(
        handler_fn(|w, req| {
            for value in req.headers().get_all("x-a") {
                w.headers_mut().append("X-A", value);
            }
        }),
        BridgeConfig::default(),
    )
    .unwrap();

    let request = TestRequest::new("GET", "https://example.com/")
        .header("X-A", "1")
        .header("X-A", "2");
    let (resolver, settlement) = resolver();
    bridge.dispatch(Box::new(request), resolver);

    let resp = settlement.outcome().await.0.unwrap();
    assert_eq!(resp.headers.iter().collect::<Vec<_>>(), vec![("X-A", "1; 2")]);
}

// ── Streaming body tests ─────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn streamed_body_reaches_handler_in_order() {
    init_tracing();
    let bridge = Bridge::new(
        handler_fn(|w, req| {
            let mut body = Vec::new();
            req.body_mut().read_to_end(&mut body).unwrap();
            w.write(&body);
        }),
        BridgeConfig::default(),
    )
    .unwrap();

    let data: Vec<u8> = (0u8..=255).cycle().take(10_000).collect();
    let pulls = Arc::new(AtomicUsize::new(0));
    let request = TestRequest::new("PUT", "https://example.com/upload").body(DelayedChunks {
        chunks: chunked(&data, 1000),
        runtime: Handle::current(),
        pulls: Arc::clone(&pulls),
    });

    let (resolver, settlement) = resolver();
    bridge.dispatch(Box::new(request), resolver);

    let resp = settlement.outcome().await.0.unwrap();
    assert_eq!(resp.body.as_ref(), &data[..]);
    // Ten chunks plus the final "done" pull; EOF is sticky afterwards.
    assert_eq!(pulls.load(Ordering::SeqCst), 11);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn body_read_error_is_left_to_the_handler() {
    let bridge = Bridge::new(
        handler_fn(|w, req| {
            let mut body = Vec::new();
            match req.body_mut().read_to_end(&mut body) {
                Ok(_) => w.set_status(200),
                Err(err) => {
                    w.set_status(400);
                    w.write(err.to_string().as_bytes());
                }
            }
        }),
        BridgeConfig::default(),
    )
    .unwrap();

    let request = TestRequest::new("POST", "https://example.com/").body(FailingBody);
    let (resolver, settlement) = resolver();
    bridge.dispatch(Box::new(request), resolver);

    let (outcome, fulfilled, failed) = settlement.outcome().await;
    let resp = outcome.unwrap();
    assert_eq!(resp.status, 400);
    assert_eq!(resp.status_text, "Bad Request");
    assert_eq!(resp.body.as_ref(), b"connection reset");
    assert_eq!((fulfilled, failed), (1, 0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_events_keep_their_own_bodies() {
    init_tracing();
    let bridge = Bridge::new(
        handler_fn(|w, req| {
            let mut body = Vec::new();
            req.body_mut().read_to_end(&mut body).unwrap();
            w.write(&body);
        }),
        BridgeConfig::default(),
    )
    .unwrap();

    let first = vec![b'a'; 4096];
    let second = vec![b'b'; 6000];

    let mut settlements = Vec::new();
    for data in [&first, &second] {
        let request = TestRequest::new("POST", "https://example.com/").body(DelayedChunks {
            chunks: chunked(data, 7),
            runtime: Handle::current(),
            pulls: Arc::new(AtomicUsize::new(0)),
        });
        let (resolver, settlement) = resolver();
        bridge.dispatch(Box::new(request), resolver);
        settlements.push(settlement);
    }

    let second_resp = settlements.pop().unwrap().outcome().await.0.unwrap();
    let first_resp = settlements.pop().unwrap().outcome().await.0.unwrap();
    assert_eq!(first_resp.body.as_ref(), &first[..]);
    assert_eq!(second_resp.body.as_ref(), &second[..]);
}

// ── Handler fault tests ──────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn isolated_handler_panic_fails_the_event() {
    let bridge = Bridge::new(
        handler_fn(|_, _| panic!("boom")),
        BridgeConfig::default().with_handler_faults(HandlerFaultPolicy::Isolate),
    )
    .unwrap();

    let (resolver, settlement) = resolver();
    bridge
        .dispatch(Box::new(TestRequest::new("GET", "https://example.com/")), resolver)
        .await
        .unwrap();

    let (outcome, fulfilled, failed) = settlement.outcome().await;
    assert_eq!(outcome.unwrap_err().message(), "handler panicked: boom");
    assert_eq!((fulfilled, failed), (0, 1));
}

const FAULT_CHILD_ENV: &str = "FETCHBRIDGE_FAULT_CHILD";

/// Runs the propagated-fault scenario in a child copy of this test binary,
/// since the expected outcome takes the whole process down.
#[test]
fn propagated_handler_panic_aborts_process() {
    if std::env::var_os(FAULT_CHILD_ENV).is_some() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let bridge = Bridge::new(
                handler_fn(|_, _| panic!("boom")),
                BridgeConfig::default().with_handler_faults(HandlerFaultPolicy::Propagate),
            )
            .unwrap();
            let entry = bridge.entry_point();

            let (resolver, settlement) = resolver();
            entry(Box::new(TestRequest::new("GET", "https://example.com/")), resolver);

            // Only reached if the fault did not end the process.
            let settled = tokio::time::timeout(Duration::from_secs(5), settlement.rx).await;
            println!("event outcome after handler fault: {settled:?}");
        });
        return;
    }

    let output = std::process::Command::new(std::env::current_exe().unwrap())
        .args([
            "propagated_handler_panic_aborts_process",
            "--exact",
            "--nocapture",
            "--test-threads=1",
        ])
        .env(FAULT_CHILD_ENV, "1")
        .output()
        .unwrap();

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!output.status.success(), "child kept running: {stdout}");
    assert!(!stdout.contains("event outcome after handler fault"), "{stdout}");
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        assert_eq!(output.status.signal(), Some(6), "expected SIGABRT");
    }
}
