//! Bounded FIFO queue feeding one worker.

use crate::error::SyscallError;
use crate::request::RequestHandle;
use crate::types::RequestKind;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::futures::Notified;
use tokio::sync::Notify;
use tracing::{debug, warn};

/// Queue of pending requests for a single kind
pub struct RequestQueue {
    kind: RequestKind,
    capacity: usize,
    items: Mutex<VecDeque<RequestHandle>>,
    /// Wakes the worker when an item is pushed
    notify: Notify,
}

impl RequestQueue {
    pub fn new(kind: RequestKind, capacity: usize) -> Self {
        Self {
            kind,
            capacity,
            items: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append `handle`, marking it queued.
    ///
    /// The status change happens under the queue lock so a worker can never
    /// pop a handle that is still `Created`.
    pub fn push(&self, handle: RequestHandle) -> Result<(), SyscallError> {
        let mut items = self.items.lock();
        if items.len() >= self.capacity {
            warn!(
                kind = %self.kind,
                queue_size = items.len(),
                capacity = self.capacity,
                "Request queue is full, rejecting request"
            );
            return Err(SyscallError::QueueFull {
                kind: self.kind,
                capacity: self.capacity,
            });
        }

        handle.mark_queued()?;
        debug!(
            kind = %self.kind,
            request_id = %handle.id(),
            agent_id = %handle.agent_id(),
            queue_size = items.len() + 1,
            "Enqueued request"
        );
        items.push_back(handle);
        drop(items);

        self.notify.notify_one();
        Ok(())
    }

    /// Oldest pending request, if any
    pub fn pop(&self) -> Option<RequestHandle> {
        self.items.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolves on the next push, or at once if a push already happened
    /// while nobody was waiting.
    pub(crate) fn notified(&self) -> Notified<'_> {
        self.notify.notified()
    }
}

impl std::fmt::Debug for RequestQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestQueue")
            .field("kind", &self.kind)
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}
