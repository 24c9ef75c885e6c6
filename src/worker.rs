//! Background dispatcher for route and chat fetches.
//!
//! Each accepted request runs in its own tokio task under a child cancellation token
//! and a timeout, and sends exactly one [`Response`]. Identical route requests that
//! are already running are rejected instead of racing on the same files.
//!
//! Closing the request channel only stops intake: requests already running still
//! finish and report. Cancelling the shutdown token stops everything. A cancelled or
//! timed-out route request waits for any file write it started before its key is
//! released and its response is sent.

use crate::actions::{Request, RequestId, Response};
use crate::api::ChatClient;
use crate::config::AppConfig;
use crate::error::{FetchError, Outcome};
use crate::http::HttpTransport;
use crate::route::{RouteFetcher, RouteRequest};
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const CHANNEL_CAPACITY: usize = 32;

pub struct FetchWorker<T: HttpTransport> {
    routes: Arc<RouteFetcher<T>>,
    chat: Arc<ChatClient<T>>,
    timeout: Duration,
    shutdown: CancellationToken,
    in_flight: Arc<Mutex<HashMap<RequestId, CancellationToken>>>,
    active_routes: Arc<Mutex<HashSet<RouteRequest>>>,
}

impl<T: HttpTransport> FetchWorker<T> {
    pub fn new(transport: Arc<T>, config: &AppConfig) -> Self {
        Self {
            routes: Arc::new(RouteFetcher::new(transport.clone(), &config.route)),
            chat: Arc::new(ChatClient::new(transport, &config.chat)),
            timeout: config.request_timeout(),
            shutdown: CancellationToken::new(),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            active_routes: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Cancelling this token stops the dispatcher and every running request.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Spawn the dispatcher loop and hand back both ends of the conversation.
    pub fn start(self) -> (mpsc::Sender<Request>, mpsc::Receiver<Response>, JoinHandle<()>) {
        let (req_tx, req_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (resp_tx, resp_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let handle = tokio::spawn(self.run(req_rx, resp_tx));
        (req_tx, resp_rx, handle)
    }

    pub async fn run(self, mut req_rx: mpsc::Receiver<Request>, resp_tx: mpsc::Sender<Response>) {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    debug!("Fetch dispatcher shutting down");
                    break;
                }
                request = req_rx.recv() => match request {
                    Some(request) => self.dispatch(request, &resp_tx),
                    None => {
                        debug!("Request channel closed, running requests will still report");
                        break;
                    }
                }
            }
        }
    }

    fn dispatch(&self, request: Request, resp_tx: &mpsc::Sender<Response>) {
        match request {
            Request::PlanRoute { id, request } => self.spawn_route(id, request, resp_tx.clone()),
            Request::Chat { id, request } => {
                let chat = self.chat.clone();
                let token = self.register(id);
                let guard = InFlightGuard {
                    map: self.in_flight.clone(),
                    id,
                };
                let timeout = self.timeout;
                let resp_tx = resp_tx.clone();
                tokio::spawn(async move {
                    let outcome = guarded(&token, timeout, chat.complete(&request)).await;
                    drop(guard);
                    log_outcome("chat", id, &outcome);
                    let _ = resp_tx.send(Response::ChatFinished { id, outcome }).await;
                });
            }
            Request::Cancel { id } => match lock(&self.in_flight).get(&id) {
                Some(token) => {
                    info!("Cancelling request {}", id);
                    token.cancel();
                }
                None => debug!("Cancel for unknown or finished request {}", id),
            },
        }
    }

    fn spawn_route(&self, id: RequestId, request: RouteRequest, resp_tx: mpsc::Sender<Response>) {
        if !lock(&self.active_routes).insert(request.clone()) {
            warn!(
                "Rejecting duplicate route request {} → {} ({})",
                request.departure(),
                request.arrival(),
                request.platform()
            );
            tokio::spawn(async move {
                let outcome = Err(FetchError::Duplicate);
                let _ = resp_tx.send(Response::RouteFinished { id, outcome }).await;
            });
            return;
        }

        let slot = RouteSlot {
            set: self.active_routes.clone(),
            key: request.clone(),
        };
        let token = self.register(id);
        let guard = InFlightGuard {
            map: self.in_flight.clone(),
            id,
        };
        let routes = self.routes.clone();
        let timeout = self.timeout;
        tokio::spawn(async move {
            let fetch = routes.fetch(&request, &token);
            tokio::pin!(fetch);
            let outcome = match tokio::time::timeout(timeout, &mut fetch).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    token.cancel();
                    let _ = fetch.await;
                    Err(FetchError::Timeout(timeout))
                }
            };
            drop(slot);
            drop(guard);
            log_outcome("route", id, &outcome);
            let _ = resp_tx.send(Response::RouteFinished { id, outcome }).await;
        });
    }

    fn register(&self, id: RequestId) -> CancellationToken {
        let token = self.shutdown.child_token();
        lock(&self.in_flight).insert(id, token.clone());
        token
    }
}

/// Run `fut` until it finishes, the token fires, or the timeout elapses.
///
/// `fut` is dropped mid-flight, so it must not leave side effects behind.
async fn guarded<R>(
    token: &CancellationToken,
    timeout: Duration,
    fut: impl Future<Output = Outcome<R>>,
) -> Outcome<R> {
    tokio::select! {
        _ = token.cancelled() => Err(FetchError::Cancelled),
        result = tokio::time::timeout(timeout, fut) => {
            result.unwrap_or_else(|_| Err(FetchError::Timeout(timeout)))
        }
    }
}

fn log_outcome<R>(kind: &str, id: RequestId, outcome: &Outcome<R>) {
    match outcome {
        Ok(_) => debug!("{} request {} succeeded", kind, id),
        Err(e) => warn!("{} request {} failed: {}", kind, id, e),
    }
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct InFlightGuard {
    map: Arc<Mutex<HashMap<RequestId, CancellationToken>>>,
    id: RequestId,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        lock(&self.map).remove(&self.id);
    }
}

/// Holds a route key in the active set until dropped.
struct RouteSlot {
    set: Arc<Mutex<HashSet<RouteRequest>>>,
    key: RouteRequest,
}

impl Drop for RouteSlot {
    fn drop(&mut self) {
        lock(&self.set).remove(&self.key);
    }
}
