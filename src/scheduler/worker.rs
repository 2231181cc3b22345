//! Per-kind worker loop.

use super::queue::RequestQueue;
use super::stats::KindStats;
use crate::error::SyscallError;
use crate::manager::ResourceManager;
use crate::request::{RequestHandle, Response, StatusSnapshot};
use crate::types::RequestKind;
use futures::FutureExt;
use parking_lot::RwLock;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, warn};

/// Sole consumer of one kind's queue
pub(crate) struct Worker {
    pub(crate) kind: RequestKind,
    pub(crate) queue: Arc<RequestQueue>,
    pub(crate) manager: Arc<dyn ResourceManager>,
    pub(crate) stats: Arc<KindStats>,
    pub(crate) running: Arc<RwLock<bool>>,
    pub(crate) shutdown: watch::Receiver<bool>,
    pub(crate) poll_interval: Duration,
}

impl Worker {
    fn active(&self) -> bool {
        *self.running.read() && !*self.shutdown.borrow()
    }

    pub(crate) async fn run(mut self) {
        debug!(kind = %self.kind, "Worker started");

        while self.active() {
            let Some(handle) = self.queue.pop() else {
                // Idle: wake on a push, on shutdown, or after the poll interval
                tokio::select! {
                    _ = self.queue.notified() => {}
                    changed = self.shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = sleep(self.poll_interval) => {}
                }
                continue;
            };

            self.execute(handle).await;
        }

        debug!(kind = %self.kind, "Worker stopped");
    }

    async fn execute(&self, handle: RequestHandle) {
        let dequeued = Instant::now();
        if let Err(e) = handle.mark_executing() {
            error!(
                kind = %self.kind,
                request_id = %handle.id(),
                error = %e,
                "Dequeued request in unexpected state"
            );
            return;
        }
        self.stats.begin();

        debug!(
            kind = %self.kind,
            request_id = %handle.id(),
            agent_id = %handle.agent_id(),
            "Dispatching request"
        );

        let result = match handle.deadline_elapsed(dequeued) {
            Some(elapsed) => {
                warn!(
                    kind = %self.kind,
                    request_id = %handle.id(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Request deadline passed while queued"
                );
                Err(SyscallError::DeadlineExceeded {
                    elapsed_ms: elapsed.as_millis(),
                })
            }
            None => self.dispatch(&handle).await,
        };

        let finished = Instant::now();
        let snapshot = StatusSnapshot {
            end_at: Some(finished),
            ..handle.status()
        };

        match &result {
            Ok(_) => debug!(
                kind = %self.kind,
                request_id = %handle.id(),
                turnaround_ms = snapshot.turnaround_time().unwrap_or_default().as_millis() as u64,
                "Request completed"
            ),
            Err(e) => error!(
                kind = %self.kind,
                request_id = %handle.id(),
                agent_id = %handle.agent_id(),
                error = %e,
                "Request failed"
            ),
        }

        // Counters first, so they are current by the time a waiter wakes
        self.stats.finish(
            result.is_ok(),
            snapshot.waiting_time().unwrap_or_default(),
            snapshot.turnaround_time().unwrap_or_default(),
        );
        if let Err(e) = handle.complete(finished, result) {
            error!(
                kind = %self.kind,
                request_id = %handle.id(),
                error = %e,
                "Could not record request outcome"
            );
        }
    }

    /// Run the manager, turning a panic or an expired deadline into an error.
    async fn dispatch(&self, handle: &RequestHandle) -> Result<Response, SyscallError> {
        let call = AssertUnwindSafe(self.manager.handle(handle.request())).catch_unwind();

        let outcome = match handle.deadline_remaining(Instant::now()) {
            Some(remaining) => match tokio::time::timeout(remaining, call).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    let elapsed = handle
                        .status()
                        .created_at
                        .map(|created| created.elapsed())
                        .unwrap_or(remaining);
                    return Err(SyscallError::DeadlineExceeded {
                        elapsed_ms: elapsed.as_millis(),
                    });
                }
            },
            None => call.await,
        };

        outcome.unwrap_or_else(|panic| {
            let message = panic_message(&*panic);
            error!(kind = %self.kind, request_id = %handle.id(), panic = %message, "Manager panicked");
            Err(SyscallError::ManagerPanicked(message))
        })
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
