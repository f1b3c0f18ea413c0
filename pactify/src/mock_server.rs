use crate::data::{self, RequestData, ResponseData};
use crate::error::Error;
use crate::interaction::Interaction;
use crate::matcher::{match_value, Mismatch};
use crate::registry::InteractionRegistry;
use crate::report::{CandidateMismatch, UnmatchedRequest, VerificationReport};
use hyper::service::{make_service_fn, service_fn};
use hyper::{body, Body, Request, Response, Server};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::runtime::Runtime;

const START_TIMEOUT: Duration = Duration::from_secs(5);
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ServerState {
    Stopped,
    Starting,
    Listening,
    Stopping,
}

/// State shared with the server thread. Registry and report sit behind one
/// mutex each; exercised counters are bumped under the report lock, so a
/// matched request counts exactly once even under concurrent traffic.
#[derive(Debug, Default)]
struct SharedState {
    registry: Mutex<InteractionRegistry>,
    report: Mutex<VerificationReport>,
    accepting: AtomicBool,
}

/// The mock provider. Owns a hyper server on a dedicated thread with its own
/// tokio runtime; `start` and `stop` are bounded and fail instead of hanging.
///
/// State machine: `Stopped -> Starting -> Listening -> Stopping -> Stopped`.
/// Interactions can only be registered while `Stopped` or `Starting`;
/// requests are only served while `Listening`.
#[derive(Debug)]
pub struct MockServer {
    state: ServerState,
    shared: Arc<SharedState>,
    join_handle: Option<JoinHandle<()>>,
    shutdown_tx: Option<futures::channel::oneshot::Sender<()>>,
    done_rx: Option<mpsc::Receiver<()>>,
    base_url: Option<String>,
}

impl MockServer {
    pub fn new() -> Self {
        Self {
            state: ServerState::Stopped,
            shared: Arc::new(SharedState::default()),
            join_handle: None,
            shutdown_tx: None,
            done_rx: None,
            base_url: None,
        }
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    /// Bind and spawn the server thread. Port 0 picks an ephemeral port so
    /// parallel scenarios get independent sockets. The server stays in
    /// `Starting` (not serving) until `accept_requests` is called.
    pub fn start(&mut self, port: u16) -> Result<String, Error> {
        if self.state != ServerState::Stopped {
            return Err(Error::Startup(format!(
                "cannot start a server in state {:?}",
                self.state
            )));
        }
        self.state = ServerState::Starting;
        self.shared.accepting.store(false, Ordering::SeqCst);

        let shared = self.shared.clone();
        let (addr_tx, addr_rx) = mpsc::channel();
        let (shutdown_tx, shutdown_rx) = futures::channel::oneshot::channel::<()>();
        let (done_tx, done_rx) = mpsc::channel();

        let join_handle = thread::spawn(move || {
            let runtime = match Runtime::new() {
                Ok(runtime) => runtime,
                Err(e) => {
                    let _ = addr_tx.send(Err(Error::Startup(e.to_string())));
                    return;
                }
            };

            runtime.block_on(async move {
                let addr = SocketAddr::from(([127, 0, 0, 1], port));
                let builder = match Server::try_bind(&addr) {
                    Ok(builder) => builder,
                    Err(e) => {
                        let _ = addr_tx.send(Err(Error::Startup(e.to_string())));
                        return;
                    }
                };

                let make_service = make_service_fn(move |_| {
                    let shared = shared.clone();
                    async move {
                        Ok::<_, Infallible>(service_fn(move |request| {
                            let shared = shared.clone();
                            async move {
                                Ok::<Response<Body>, Infallible>(handle(shared, request).await)
                            }
                        }))
                    }
                });

                let server = builder.serve(make_service);
                let local_addr = server.local_addr();
                let graceful = server.with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                });

                let _ = addr_tx.send(Ok(local_addr));
                if let Err(e) = graceful.await {
                    log::error!("mock server error: {}", e);
                }
            });

            let _ = done_tx.send(());
        });

        let local_addr = match addr_rx.recv_timeout(START_TIMEOUT) {
            Ok(Ok(addr)) => addr,
            Ok(Err(e)) => {
                self.state = ServerState::Stopped;
                let _ = join_handle.join();
                return Err(e);
            }
            Err(_) => {
                self.state = ServerState::Stopped;
                return Err(Error::Startup(
                    "timed out waiting for the server to bind".into(),
                ));
            }
        };

        self.join_handle = Some(join_handle);
        self.shutdown_tx = Some(shutdown_tx);
        self.done_rx = Some(done_rx);
        let url = format!("http://{}", local_addr);
        log::debug!("mock server bound at {}", url);
        self.base_url = Some(url.clone());

        Ok(url)
    }

    /// Register an interaction. Only legal while the server is not serving,
    /// so registration never races request handling.
    pub fn register(&mut self, interaction: Interaction) -> Result<(), Error> {
        if matches!(self.state, ServerState::Listening | ServerState::Stopping) {
            return Err(Error::Registration(format!(
                "interactions cannot be registered while the server is {:?}",
                self.state
            )));
        }

        let description = interaction.description.clone();
        self.shared.registry.lock()?.register(interaction)?;
        self.shared.report.lock()?.record_registered(&description);
        log::debug!("registered interaction '{}'", description);

        Ok(())
    }

    /// `Starting -> Listening`: begin serving requests.
    pub fn accept_requests(&mut self) -> Result<(), Error> {
        if self.state != ServerState::Starting {
            return Err(Error::Startup(format!(
                "cannot accept requests in state {:?}",
                self.state
            )));
        }
        self.state = ServerState::Listening;
        self.shared.accepting.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// `Listening -> Starting`: stop serving while keeping the socket bound,
    /// so the registry can be mutated between test bodies.
    pub fn suspend(&mut self) -> Result<(), Error> {
        if self.state != ServerState::Listening {
            return Err(Error::Startup(format!(
                "cannot suspend in state {:?}",
                self.state
            )));
        }
        self.state = ServerState::Starting;
        self.shared.accepting.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Graceful shutdown with a bounded wait; a hung server thread is
    /// abandoned and surfaced as a `Shutdown` error rather than a hang.
    pub fn stop(&mut self) -> Result<(), Error> {
        if self.state == ServerState::Stopped {
            return Ok(());
        }
        self.state = ServerState::Stopping;
        self.shared.accepting.store(false, Ordering::SeqCst);

        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }

        if let Some(done_rx) = self.done_rx.take() {
            if done_rx.recv_timeout(SHUTDOWN_TIMEOUT).is_err() {
                self.join_handle.take();
                self.state = ServerState::Stopped;
                self.base_url = None;
                return Err(Error::Shutdown(
                    "timed out waiting for the server to shut down".into(),
                ));
            }
        }
        if let Some(join_handle) = self.join_handle.take() {
            let _ = join_handle.join();
        }

        self.state = ServerState::Stopped;
        self.base_url = None;
        log::debug!("mock server stopped");

        Ok(())
    }

    /// Clear registered interactions and the report between scenarios.
    pub fn clear(&mut self) -> Result<(), Error> {
        if self.state == ServerState::Listening {
            return Err(Error::Registration(
                "the registry cannot be cleared while the server is listening".into(),
            ));
        }
        self.shared.registry.lock()?.clear();
        self.shared.report.lock()?.clear();
        Ok(())
    }

    /// Handle a raw request in-process, exactly as the HTTP listener would.
    pub fn handle(&self, request: RequestData) -> ResponseData {
        dispatch(&self.shared, request)
    }

    pub fn report(&self) -> Result<VerificationReport, Error> {
        Ok(self.shared.report.lock()?.clone())
    }

    pub fn interactions(&self) -> Result<Vec<Interaction>, Error> {
        Ok(self.shared.registry.lock()?.to_vec())
    }
}

impl Default for MockServer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::warn!("mock server drop: {}", e);
        }
    }
}

async fn handle(shared: Arc<SharedState>, request: Request<Body>) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    // gate before touching the body: a request arriving outside Listening
    // must not leave any trace in the report, even if its body is unreadable
    if !shared.accepting.load(Ordering::SeqCst) {
        log::warn!(
            "request {} {} arrived while the server was not listening",
            method,
            path
        );
        return into_response(plain_response(
            503,
            "the mock server is not accepting requests",
        ));
    }

    let query = request.uri().query().map(String::from);
    let headers = data::extract_headers(request.headers());

    let request_data = match body::to_bytes(request.into_body()).await {
        Ok(bytes) => RequestData {
            method,
            path,
            query,
            headers,
            body: String::from_utf8_lossy(&bytes).into(),
        },
        Err(e) => {
            // a malformed request must not crash the server; it degrades to
            // an unmatched entry carrying the failure text
            let unmatched = UnmatchedRequest {
                method,
                path,
                candidates: vec![CandidateMismatch {
                    description: "<request could not be read>".into(),
                    mismatches: vec![Mismatch {
                        path: "$".into(),
                        expected: "a readable request body".into(),
                        actual: e.to_string(),
                    }],
                }],
            };
            if let Ok(mut report) = shared.report.lock() {
                report.record_unmatched(unmatched.clone());
            }
            return into_response(mismatch_response(&unmatched));
        }
    };

    into_response(dispatch(&shared, request_data))
}

/// Select the best-matching interaction for a request and synthesize its
/// response, or produce a 500 carrying the aggregated mismatch report.
fn dispatch(shared: &SharedState, request: RequestData) -> ResponseData {
    if !shared.accepting.load(Ordering::SeqCst) {
        log::warn!(
            "request {} {} arrived while the server was not listening",
            request.method,
            request.path
        );
        return plain_response(503, "the mock server is not accepting requests");
    }

    let registry = match shared.registry.lock() {
        Ok(registry) => registry,
        Err(_) => return plain_response(500, "the interaction registry lock was poisoned"),
    };

    let parsed_body = parse_body(&request.body);
    let mut failed = Vec::new();

    for (index, interaction) in registry.find_candidates(&request.method, &request.path) {
        let mismatches = match_candidate(interaction, &request, &parsed_body);
        if mismatches.is_empty() {
            let response = synthesize(interaction);
            log::debug!(
                "{} {} matched interaction '{}'",
                request.method,
                request.path,
                interaction.description
            );
            if let Ok(mut report) = shared.report.lock() {
                report.mark_exercised(index);
            }
            return response;
        }
        failed.push(CandidateMismatch {
            description: interaction.description.clone(),
            mismatches,
        });
    }

    let unmatched = UnmatchedRequest {
        method: request.method.clone(),
        path: request.path.clone(),
        candidates: failed,
    };
    log::warn!("unmatched request: {} {}", request.method, request.path);
    if let Ok(mut report) = shared.report.lock() {
        report.record_unmatched(unmatched.clone());
    }

    mismatch_response(&unmatched)
}

/// Headers first, then body, per the candidate's matching rules. Every
/// mismatch is collected so the final report is fully diagnosable.
fn match_candidate(
    interaction: &Interaction,
    request: &RequestData,
    parsed_body: &Result<Option<Value>, String>,
) -> Vec<Mismatch> {
    let spec = &interaction.request;
    let mut mismatches = Vec::new();

    if let Some(expected_query) = &spec.query {
        match &request.query {
            Some(actual) if actual == expected_query => {}
            other => mismatches.push(Mismatch {
                path: "$.query".into(),
                expected: expected_query.clone(),
                actual: other.clone().unwrap_or_else(|| "missing".into()),
            }),
        }
    }

    for (name, matcher) in &spec.headers {
        let header_path = format!("$.headers.{}", name);
        match request.headers.get(name) {
            Some(value) => mismatches.extend(match_value(
                matcher,
                &Value::String(value.clone()),
                &header_path,
                &spec.matching_rules,
            )),
            None => mismatches.push(Mismatch {
                path: header_path,
                expected: format!("a '{}' header", name),
                actual: "missing".into(),
            }),
        }
    }

    if let Some(expected_body) = &spec.body {
        match parsed_body {
            Ok(Some(actual)) => mismatches.extend(match_value(
                expected_body,
                actual,
                "$",
                &spec.matching_rules,
            )),
            Ok(None) => mismatches.push(Mismatch {
                path: "$".into(),
                expected: "a request body".into(),
                actual: "missing".into(),
            }),
            Err(reason) => mismatches.push(Mismatch {
                path: "$".into(),
                expected: "a JSON request body".into(),
                actual: reason.clone(),
            }),
        }
    }

    mismatches
}

fn parse_body(body: &str) -> Result<Option<Value>, String> {
    if body.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(body)
        .map(Some)
        .map_err(|e| e.to_string())
}

/// Build the canned response, replacing matchers in the body with their
/// example values.
fn synthesize(interaction: &Interaction) -> ResponseData {
    let spec = &interaction.response;
    let mut headers: std::collections::HashMap<String, String> = spec
        .headers
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let body = match &spec.body {
        Some(matcher) => {
            headers
                .entry("content-type".into())
                .or_insert_with(|| "application/json".into());
            matcher.example_value().to_string()
        }
        None => String::new(),
    };

    ResponseData {
        status: spec.status,
        headers,
        body,
    }
}

fn mismatch_response(unmatched: &UnmatchedRequest) -> ResponseData {
    let body = json!({
        "error": "no interaction matched the request",
        "method": unmatched.method,
        "path": unmatched.path,
        "candidates": unmatched.candidates,
    });

    ResponseData {
        status: 500,
        headers: [("content-type".to_string(), "application/json".to_string())]
            .into_iter()
            .collect(),
        body: body.to_string(),
    }
}

fn plain_response(status: u16, message: &str) -> ResponseData {
    ResponseData {
        status,
        headers: [("content-type".to_string(), "text/plain".to_string())]
            .into_iter()
            .collect(),
        body: message.into(),
    }
}

fn into_response(response_data: ResponseData) -> Response<Body> {
    let mut builder = Response::builder().status(response_data.status);

    if let Some(header_map) = builder.headers_mut() {
        if data::put_headers(header_map, &response_data.headers).is_err() {
            return Response::builder()
                .status(500)
                .body(Body::from("invalid response headers"))
                .unwrap_or_else(|_| Response::new(Body::empty()));
        }
    }

    builder
        .body(Body::from(response_data.body))
        .unwrap_or_else(|_| Response::new(Body::empty()))
}
