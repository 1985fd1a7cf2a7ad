//! Worker dispatch: run image transforms on a dedicated thread.
//!
//! The worker thread owns a [`Processor`] and sees nothing but byte buffers.
//! Callers go through a [`Dispatcher`], which correlates replies with
//! requests through a pending table keyed by job id:
//!
//! ```text
//! submit(id, bytes) ──Request{id, ticket, image}──▶ worker thread
//!        ▲                                               │
//!        │ oneshot                                       ▼
//!   pending[id] = (ticket, tx) ◀──Response{id, ticket}── reply router
//! ```
//!
//! At most one job per id is in flight. A job that does not answer within
//! the deadline is rejected with [`DispatchError::WorkerTimeout`] and its
//! pending entry evicted, so the id can be reused at once. Every request
//! carries a fresh ticket; a late reply whose ticket no longer matches the
//! pending entry is dropped instead of resolving the newer job.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, mpsc as std_mpsc};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Default per-job deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("job {0} is already in flight")]
    JobInFlight(i64),
    #[error("job {id} timed out after {after:?}")]
    WorkerTimeout { id: i64, after: Duration },
    #[error("job {id} failed: {message}")]
    Job { id: i64, message: String },
    #[error("worker thread is gone")]
    WorkerGone,
    #[error("could not start worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DispatchError>;

/// The transform run on the worker thread. Errors cross the thread boundary
/// as plain messages.
pub type Processor =
    Box<dyn Fn(&[u8]) -> std::result::Result<Vec<u8>, String> + Send + 'static>;

struct Request {
    id: i64,
    ticket: u64,
    image: Vec<u8>,
}

struct Response {
    id: i64,
    ticket: u64,
    result: std::result::Result<Vec<u8>, String>,
}

type Reply = oneshot::Sender<std::result::Result<Vec<u8>, String>>;
type PendingTable = Arc<Mutex<HashMap<i64, (u64, Reply)>>>;

fn lock(pending: &PendingTable) -> std::sync::MutexGuard<'_, HashMap<i64, (u64, Reply)>> {
    pending.lock().unwrap_or_else(|p| p.into_inner())
}

/// Removes the pending entry when a submit ends for any reason (reply,
/// timeout, or the future being dropped), unless a newer ticket owns it.
struct PendingGuard<'a> {
    pending: &'a PendingTable,
    id: i64,
    ticket: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let mut table = lock(self.pending);
        if table.get(&self.id).is_some_and(|(t, _)| *t == self.ticket) {
            table.remove(&self.id);
        }
    }
}

/// Handle to the worker thread. Dropping it shuts the thread down once its
/// current job finishes.
pub struct Dispatcher {
    requests: std_mpsc::Sender<Request>,
    pending: PendingTable,
    next_ticket: AtomicU64,
    timeout: Duration,
}

impl Dispatcher {
    /// Start the worker thread and the reply router.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(processor: Processor, timeout: Duration) -> Result<Self> {
        let (request_tx, request_rx) = std_mpsc::channel::<Request>();
        let (reply_tx, reply_rx) = mpsc::unbounded_channel::<Response>();

        thread::Builder::new()
            .name("gdr-cam-worker".into())
            .spawn(move || worker_loop(processor, request_rx, reply_tx))?;

        let pending: PendingTable = Arc::new(Mutex::new(HashMap::new()));
        tokio::spawn(route_replies(reply_rx, Arc::clone(&pending)));

        Ok(Self {
            requests: request_tx,
            pending,
            next_ticket: AtomicU64::new(1),
            timeout,
        })
    }

    /// Whether a job with `id` is currently awaiting its reply.
    pub fn is_pending(&self, id: i64) -> bool {
        lock(&self.pending).contains_key(&id)
    }

    /// Run one job on the worker and wait for its result.
    pub async fn submit(&self, id: i64, image: Vec<u8>) -> Result<Vec<u8>> {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        {
            let mut table = lock(&self.pending);
            if table.contains_key(&id) {
                return Err(DispatchError::JobInFlight(id));
            }
            table.insert(id, (ticket, tx));
        }
        let _guard = PendingGuard {
            pending: &self.pending,
            id,
            ticket,
        };

        self.requests
            .send(Request { id, ticket, image })
            .map_err(|_| DispatchError::WorkerGone)?;
        debug!(id, ticket, "job dispatched");

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(Ok(bytes))) => Ok(bytes),
            Ok(Ok(Err(message))) => Err(DispatchError::Job { id, message }),
            Ok(Err(_)) => Err(DispatchError::WorkerGone),
            Err(_) => {
                warn!(id, timeout = ?self.timeout, "worker job timed out");
                Err(DispatchError::WorkerTimeout {
                    id,
                    after: self.timeout,
                })
            }
        }
    }
}

fn worker_loop(
    processor: Processor,
    requests: std_mpsc::Receiver<Request>,
    replies: mpsc::UnboundedSender<Response>,
) {
    for Request { id, ticket, image } in requests {
        let result = processor(&image);
        if replies.send(Response { id, ticket, result }).is_err() {
            break;
        }
    }
}

async fn route_replies(mut replies: mpsc::UnboundedReceiver<Response>, pending: PendingTable) {
    while let Some(Response { id, ticket, result }) = replies.recv().await {
        let waiting = {
            let mut table = lock(&pending);
            match table.get(&id) {
                Some((t, _)) if *t == ticket => table.remove(&id),
                _ => None,
            }
        };
        match waiting {
            Some((_, tx)) => {
                let _ = tx.send(result);
            }
            None => debug!(id, ticket, "discarding late worker reply"),
        }
    }
}
