//! Request lifecycle state machine.
//!
//! `Created -> Queued -> Executing -> Done | Failed`, one direction only.
//! Waiting and turnaround times are derived from the timestamps on every
//! read rather than stored.

use super::payload::Response;
use crate::error::SyscallError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// Request status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Created,
    Queued,
    Executing,
    Done,
    Failed,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Done | RequestStatus::Failed)
    }

    fn can_transition_to(&self, next: RequestStatus) -> bool {
        matches!(
            (self, next),
            (RequestStatus::Created, RequestStatus::Queued)
                | (RequestStatus::Queued, RequestStatus::Executing)
                | (RequestStatus::Executing, RequestStatus::Done)
                | (RequestStatus::Executing, RequestStatus::Failed)
        )
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestStatus::Created => "CREATED",
            RequestStatus::Queued => "QUEUED",
            RequestStatus::Executing => "EXECUTING",
            RequestStatus::Done => "DONE",
            RequestStatus::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Point-in-time view of a request's lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub status: RequestStatus,
    pub created_at: Option<Instant>,
    pub start_at: Option<Instant>,
    pub end_at: Option<Instant>,
}

impl StatusSnapshot {
    /// `start_at - created_at`
    pub fn waiting_time(&self) -> Option<Duration> {
        Some(self.start_at?.saturating_duration_since(self.created_at?))
    }

    /// `end_at - created_at`
    pub fn turnaround_time(&self) -> Option<Duration> {
        Some(self.end_at?.saturating_duration_since(self.created_at?))
    }
}

/// Mutable lifecycle record; written only by the enqueuer and the worker
#[derive(Debug, Clone)]
pub struct Lifecycle {
    status: RequestStatus,
    created_at: Option<Instant>,
    start_at: Option<Instant>,
    end_at: Option<Instant>,
    response: Option<Response>,
    error: Option<SyscallError>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            status: RequestStatus::Created,
            created_at: None,
            start_at: None,
            end_at: None,
            response: None,
            error: None,
        }
    }

    pub fn status(&self) -> RequestStatus {
        self.status
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            status: self.status,
            created_at: self.created_at,
            start_at: self.start_at,
            end_at: self.end_at,
        }
    }

    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    pub fn error(&self) -> Option<&SyscallError> {
        self.error.as_ref()
    }

    pub(crate) fn mark_queued(&mut self, now: Instant) -> Result<(), SyscallError> {
        self.advance(RequestStatus::Queued)?;
        self.created_at = Some(now);
        Ok(())
    }

    pub(crate) fn mark_executing(&mut self, now: Instant) -> Result<(), SyscallError> {
        self.advance(RequestStatus::Executing)?;
        self.start_at = Some(now);
        Ok(())
    }

    pub(crate) fn complete(
        &mut self,
        now: Instant,
        result: Result<Response, SyscallError>,
    ) -> Result<(), SyscallError> {
        let next = if result.is_ok() {
            RequestStatus::Done
        } else {
            RequestStatus::Failed
        };
        self.advance(next)?;
        self.end_at = Some(now);
        match result {
            Ok(response) => self.response = Some(response),
            Err(error) => self.error = Some(error),
        }
        Ok(())
    }

    /// Terminal outcome, if the request has finished
    pub fn outcome(&self) -> Option<Result<Response, SyscallError>> {
        match self.status {
            RequestStatus::Done => Some(Ok(self.response.clone().unwrap_or(Response::Ack))),
            RequestStatus::Failed => Some(Err(self.error.clone().unwrap_or_else(|| {
                SyscallError::InvariantViolation("failed request without error".to_string())
            }))),
            _ => None,
        }
    }

    fn advance(&mut self, next: RequestStatus) -> Result<(), SyscallError> {
        if !self.status.can_transition_to(next) {
            return Err(SyscallError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }
}
