//! Requests
//!
//! A [`Request`] is the caller's description of work. Enqueuing it produces a
//! [`RequestHandle`]: shared ownership of the request plus its lifecycle
//! record and a settable-once completion signal.

pub mod lifecycle;
pub mod payload;

use crate::error::SyscallError;
use crate::types::{AgentID, RequestID, RequestKind};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

pub use lifecycle::{Lifecycle, RequestStatus, StatusSnapshot};
pub use payload::{InferenceQuery, MemoryOp, Payload, Response, StorageOp, ToolCall};

/// Unit of work routed to one resource kind
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub agent_id: AgentID,
    pub payload: Payload,
    /// Budget measured from enqueue; `None` means no deadline
    pub deadline: Option<Duration>,
}

impl Request {
    pub fn new(agent_id: impl Into<AgentID>, payload: Payload) -> Self {
        Self {
            agent_id: agent_id.into(),
            payload,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn kind(&self) -> RequestKind {
        self.payload.kind()
    }
}

struct RequestRecord {
    id: RequestID,
    kind: RequestKind,
    request: Request,
    lifecycle: Mutex<Lifecycle>,
    done: watch::Sender<bool>,
}

/// Shared handle to an enqueued request
#[derive(Clone)]
pub struct RequestHandle {
    record: Arc<RequestRecord>,
}

impl RequestHandle {
    /// Wrap `request` for submission to the `kind` queue; status is `Created`.
    pub fn new(kind: RequestKind, request: Request) -> Self {
        let (done, _) = watch::channel(false);
        Self {
            record: Arc::new(RequestRecord {
                id: RequestID::next(),
                kind,
                request,
                lifecycle: Mutex::new(Lifecycle::new()),
                done,
            }),
        }
    }

    pub fn id(&self) -> RequestID {
        self.record.id
    }

    /// Queue this request was submitted to
    pub fn kind(&self) -> RequestKind {
        self.record.kind
    }

    pub fn agent_id(&self) -> &str {
        &self.record.request.agent_id
    }

    pub fn request(&self) -> &Request {
        &self.record.request
    }

    pub fn status(&self) -> StatusSnapshot {
        self.record.lifecycle.lock().snapshot()
    }

    pub fn is_terminal(&self) -> bool {
        self.record.lifecycle.lock().status().is_terminal()
    }

    /// Terminal outcome, or `None` while the request is still in flight
    pub fn outcome(&self) -> Option<Result<Response, SyscallError>> {
        self.record.lifecycle.lock().outcome()
    }

    /// Error recorded on a failed request
    pub fn error(&self) -> Option<SyscallError> {
        self.record.lifecycle.lock().error().cloned()
    }

    /// Wait for the completion signal and return the outcome.
    pub async fn wait(&self) -> Result<Response, SyscallError> {
        let mut done = self.record.done.subscribe();
        // The sender lives in the record this handle keeps alive
        done.wait_for(|finished| *finished)
            .await
            .map_err(|_| {
                SyscallError::InvariantViolation("completion signal dropped".to_string())
            })
            .map(|_| ())?;

        self.outcome().unwrap_or_else(|| {
            Err(SyscallError::InvariantViolation(format!(
                "{} signalled before reaching a terminal state",
                self.id()
            )))
        })
    }

    /// Deadline has elapsed since enqueue
    pub(crate) fn deadline_elapsed(&self, now: Instant) -> Option<Duration> {
        let deadline = self.record.request.deadline?;
        let created = self.status().created_at?;
        let elapsed = now.saturating_duration_since(created);
        (elapsed >= deadline).then_some(elapsed)
    }

    /// Time left before the deadline expires
    pub(crate) fn deadline_remaining(&self, now: Instant) -> Option<Duration> {
        let deadline = self.record.request.deadline?;
        let created = self.status().created_at?;
        Some(deadline.saturating_sub(now.saturating_duration_since(created)))
    }

    pub(crate) fn mark_queued(&self) -> Result<(), SyscallError> {
        self.record.lifecycle.lock().mark_queued(Instant::now())
    }

    pub(crate) fn mark_executing(&self) -> Result<(), SyscallError> {
        self.record.lifecycle.lock().mark_executing(Instant::now())
    }

    /// Record the outcome at `now` and release the completion signal.
    pub(crate) fn complete(
        &self,
        now: Instant,
        result: Result<Response, SyscallError>,
    ) -> Result<(), SyscallError> {
        self.record.lifecycle.lock().complete(now, result)?;
        self.record.done.send_replace(true);
        Ok(())
    }
}

impl std::fmt::Debug for RequestHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestHandle")
            .field("id", &self.record.id)
            .field("kind", &self.record.kind)
            .field("agent_id", &self.record.request.agent_id)
            .field("status", &self.record.lifecycle.lock().status())
            .finish()
    }
}
