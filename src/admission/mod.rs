//! Admission layer: bounded priority queue, a fixed worker pool bounded by
//! a concurrency semaphore, and a circuit breaker distinct from the
//! cache layer's — this one trips on handler failures, not cache backend
//! failures.
//!
//! Grounded on this workspace's `network::peer_manager` event-channel plus
//! worker-loop shape (an `mpsc`-fed background task pool), adapted here to
//! a priority queue with explicit backpressure instead of an unbounded
//! channel.

mod queue;

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::{oneshot, Notify, Semaphore};
use tokio::time::timeout;

use crate::breaker::CircuitBreaker;
use crate::config::AdmissionConfig;
use crate::error::ScanError;
use crate::types::Priority;

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
pub type ScanHandler<Req, Res> = Arc<dyn Fn(Req) -> BoxFuture<Result<Res, ScanError>> + Send + Sync>;

struct QueuedItem<Req, Res> {
    request: Req,
    reply: oneshot::Sender<Result<Res, ScanError>>,
    priority: Priority,
    attempts: u32,
}

const MAX_LATENCY_SAMPLES: usize = 1000;

#[derive(Debug, Default, Clone)]
pub struct AdmissionStats {
    pub admitted: u64,
    pub rejected_queue_full: u64,
    pub rejected_breaker_open: u64,
    pub completed: u64,
    pub failed: u64,
    pub retried: u64,
}

/// Bounded priority admission layer for one request/response pair of
/// types. The scan pipeline instantiates this as
/// `AdmissionLayer<ScanRequest, ScanResult>`.
pub struct AdmissionLayer<Req, Res> {
    queue: Mutex<queue::PriorityQueue<QueuedItem<Req, Res>>>,
    notify: Notify,
    concurrency: Semaphore,
    breaker: CircuitBreaker,
    max_retry_attempts: u32,
    per_request_deadline: Duration,
    admitted: AtomicU64,
    rejected_queue_full: AtomicU64,
    rejected_breaker_open: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    retried: AtomicU64,
    latency_samples_ms: Mutex<VecDeque<u64>>,
}

impl<Req: Clone + Send + 'static, Res: Send + 'static> AdmissionLayer<Req, Res> {
    pub fn new(cfg: &AdmissionConfig, per_request_deadline: Duration) -> Arc<Self> {
        Arc::new(AdmissionLayer {
            queue: Mutex::new(queue::PriorityQueue::new(cfg.max_queue)),
            notify: Notify::new(),
            concurrency: Semaphore::new(cfg.max_concurrency),
            breaker: CircuitBreaker::new(cfg.breaker_failure_threshold, cfg.breaker_reset_secs),
            max_retry_attempts: cfg.max_retry_attempts,
            per_request_deadline,
            admitted: AtomicU64::new(0),
            rejected_queue_full: AtomicU64::new(0),
            rejected_breaker_open: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            retried: AtomicU64::new(0),
            latency_samples_ms: Mutex::new(VecDeque::with_capacity(MAX_LATENCY_SAMPLES)),
        })
    }

    /// Spawns `workers` background tasks draining the queue and running
    /// `handler` on each item. Returns immediately; workers run until the
    /// `Arc<Self>` is dropped and the process exits, matching this
    /// workspace's long-lived background-task convention.
    pub fn spawn_workers(self: &Arc<Self>, workers: usize, handler: ScanHandler<Req, Res>) {
        for worker_id in 0..workers {
            let layer = Arc::clone(self);
            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                layer.worker_loop(worker_id, handler).await;
            });
        }
    }

    async fn worker_loop(self: Arc<Self>, worker_id: usize, handler: ScanHandler<Req, Res>) {
        loop {
            let item = loop {
                if let Some(item) = self.queue.lock().pop() {
                    break item;
                }
                self.notify.notified().await;
            };

            let permit = match self.concurrency.acquire().await {
                Ok(permit) => permit,
                Err(_) => return,
            };

            let start = Instant::now();
            let QueuedItem {
                request,
                reply,
                priority,
                attempts,
            } = item;

            tracing::debug!(worker_id, attempts, "admission worker processing request");

            let result = timeout(self.per_request_deadline, handler(request.clone())).await;
            drop(permit);

            let retriable_error = match &result {
                Ok(Ok(_)) => None,
                Ok(Err(err)) if err.is_retriable() => Some(()),
                Err(_) => Some(()),
                Ok(Err(_)) => None,
            };

            if retriable_error.is_some() && attempts < self.max_retry_attempts {
                self.retried.fetch_add(1, Ordering::Relaxed);
                let requeued = QueuedItem {
                    request,
                    reply,
                    priority,
                    attempts: attempts + 1,
                };
                let mut queue = self.queue.lock();
                if queue.push(priority, requeued).is_ok() {
                    drop(queue);
                    self.notify.notify_one();
                    continue;
                }
                // Queue filled up in the meantime; fall through and report
                // whatever the attempt produced instead of silently dropping it.
                drop(queue);
            }

            match result {
                Ok(Ok(response)) => {
                    self.breaker.record_success();
                    self.completed.fetch_add(1, Ordering::Relaxed);
                    self.record_latency(start.elapsed());
                    let _ = reply.send(Ok(response));
                }
                Ok(Err(err)) => {
                    self.breaker.record_failure();
                    self.failed.fetch_add(1, Ordering::Relaxed);
                    let _ = reply.send(Err(err));
                }
                Err(_) => {
                    self.breaker.record_failure();
                    self.failed.fetch_add(1, Ordering::Relaxed);
                    let _ = reply.send(Err(ScanError::ScanTimeout {
                        deadline_ms: self.per_request_deadline.as_millis() as u64,
                    }));
                }
            }
        }
    }

    /// Enqueues a request and awaits its result. Rejects immediately
    /// (without touching the queue) when the breaker is open, and rejects
    /// with `QueueFull` once the queue is at its configured capacity.
    pub async fn submit(&self, request: Req, priority: Priority) -> Result<Res, ScanError> {
        if !self.breaker.allow() {
            self.rejected_breaker_open.fetch_add(1, Ordering::Relaxed);
            return Err(ScanError::AdmissionBreakerOpen { retry_after_secs: 60 });
        }

        let (tx, rx) = oneshot::channel();
        let item = QueuedItem {
            request,
            reply: tx,
            priority,
            attempts: 0,
        };

        {
            let mut queue = self.queue.lock();
            if queue.push(priority, item).is_err() {
                drop(queue);
                self.rejected_queue_full.fetch_add(1, Ordering::Relaxed);
                return Err(ScanError::QueueFull);
            }
        }
        self.admitted.fetch_add(1, Ordering::Relaxed);
        self.notify.notify_one();

        rx.await
            .unwrap_or_else(|_| Err(ScanError::Internal("admission worker dropped response channel".to_string())))
    }

    fn record_latency(&self, elapsed: Duration) {
        let mut samples = self.latency_samples_ms.lock();
        if samples.len() >= MAX_LATENCY_SAMPLES {
            samples.pop_front();
        }
        samples.push_back(elapsed.as_millis() as u64);
    }

    pub fn stats(&self) -> AdmissionStats {
        AdmissionStats {
            admitted: self.admitted.load(Ordering::Relaxed),
            rejected_queue_full: self.rejected_queue_full.load(Ordering::Relaxed),
            rejected_breaker_open: self.rejected_breaker_open.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
        }
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.lock().len()
    }
}
