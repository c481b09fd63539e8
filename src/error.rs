//! # Error Types
//!
//! Every failure the dispatch layer can produce, grouped by where it originates:
//!
//! - [`RouteError`] - a route could not be constructed
//! - [`HandlerFailure`] - a handler body failed; contained to its own request
//! - [`SchedulingFailure`] - the offloading machinery failed; surfaced to the
//!   [`ErrorReporter`](crate::reporter::ErrorReporter)
//! - [`DoubleCompletion`] - a pending result was completed twice
//! - [`DispatchError`] - misuse of the engine's registration lifecycle
//! - [`TransportError`] - outcome of a request served by
//!   [`LocalTransport`](crate::transport::LocalTransport)
//!
//! Nothing in this crate retries automatically.

use crate::dispatcher::PendingState;
use crate::ids::DispatchId;
use crate::route::RouteMethod;
use std::sync::Arc;
use thiserror::Error;

/// Route construction failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("route path must not be empty")]
    EmptyPath,
    #[error("invalid route path `{path}`: {reason}")]
    InvalidPath { path: String, reason: &'static str },
    #[error("route `{path}` must answer at least one method")]
    NoMethods { path: String },
    #[error("unknown route method `{0}`")]
    UnknownMethod(String),
}

/// Failure delivered for a single request.
///
/// For sync routes it is returned straight to the transport. For async routes
/// it completes the request's [`PendingResult`](crate::dispatcher::PendingResult).
#[derive(Debug, Clone, Error)]
pub enum HandlerFailure {
    /// Error returned by handler logic
    #[error("{0}")]
    Handler(Arc<anyhow::Error>),
    /// Handler body panicked
    #[error("handler panicked: {0}")]
    Panicked(String),
    /// Dispatch scope was shut down before the handler finished
    #[error("dispatch cancelled: scope `{scope}` is shutting down")]
    Cancelled { scope: String },
    /// The handler could not be scheduled
    #[error(transparent)]
    Scheduling(#[from] SchedulingFailure),
    /// The outcome was already taken by another waiter
    #[error("pending result outcome was already consumed")]
    Consumed,
}

impl HandlerFailure {
    /// Wrap any error raised by handler logic.
    pub fn new(err: impl Into<anyhow::Error>) -> Self {
        Self::Handler(Arc::new(err.into()))
    }

    /// Shorthand for a plain message failure.
    pub fn msg(message: impl std::fmt::Display + std::fmt::Debug + Send + Sync + 'static) -> Self {
        Self::Handler(Arc::new(anyhow::Error::msg(message)))
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

impl From<anyhow::Error> for HandlerFailure {
    fn from(err: anyhow::Error) -> Self {
        Self::Handler(Arc::new(err))
    }
}

/// Failure of the offloading mechanism itself, outside any handler logic
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulingFailure {
    #[error("failed to spawn dispatch coroutine `{context}`: {message}")]
    Spawn { context: String, message: String },
    #[error("dispatch scope `{scope}` is shut down")]
    ScopeClosed { scope: String },
    #[error("dispatch coroutine `{context}` panicked outside its handler: {message}")]
    TaskPanicked { context: String, message: String },
}

/// A pending result was completed after it had already reached a terminal state.
///
/// This is a programming error in the completing code; the first outcome is
/// kept untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("pending result {id} was already {state}")]
pub struct DoubleCompletion {
    pub id: DispatchId,
    pub state: PendingState,
}

/// Registration lifecycle errors of the dispatch engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("dispatch engine `{engine}` is already attached to a transport")]
    AlreadyAttached { engine: String },
    #[error(transparent)]
    Route(#[from] RouteError),
}

/// Outcome errors of the in-process reference transport
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("no route registered for {method} {path}")]
    NotFound { method: RouteMethod, path: String },
    #[error("response {id} did not complete within {timeout_ms}ms")]
    TimedOut { id: DispatchId, timeout_ms: u64 },
    #[error(transparent)]
    Handler(#[from] HandlerFailure),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_failure_keeps_source_message() {
        let failure = HandlerFailure::new(std::io::Error::other("disk on fire"));
        assert_eq!(failure.to_string(), "disk on fire");
        assert!(!failure.is_cancelled());
    }

    #[test]
    fn anyhow_errors_convert_with_question_mark() {
        fn body() -> Result<u8, HandlerFailure> {
            let n: u8 = "300".parse().map_err(anyhow::Error::from)?;
            Ok(n)
        }
        let err = body().unwrap_err();
        assert!(matches!(err, HandlerFailure::Handler(_)));
    }

    #[test]
    fn scheduling_failure_is_transparent_inside_handler_failure() {
        let failure: HandlerFailure = SchedulingFailure::ScopeClosed {
            scope: "reactive-routing".to_string(),
        }
        .into();
        assert_eq!(
            failure.to_string(),
            "dispatch scope `reactive-routing` is shut down"
        );
    }
}
