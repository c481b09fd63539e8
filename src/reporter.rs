//! Sink for failures that happen outside a single request's lifecycle.

use crate::error::SchedulingFailure;
use crate::ids::DispatchId;
use std::fmt;
use std::sync::Arc;
use tracing::error;

/// Name of the execution context a failure happened in.
///
/// Rendered as `scope` or `scope#dispatch-id`, which is also the name given
/// to the coroutine that serves the dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContextName {
    scope: Arc<str>,
    dispatch: Option<DispatchId>,
}

impl ContextName {
    #[must_use]
    pub fn scope(scope: Arc<str>) -> Self {
        Self {
            scope,
            dispatch: None,
        }
    }

    #[must_use]
    pub fn dispatch(scope: Arc<str>, id: DispatchId) -> Self {
        Self {
            scope,
            dispatch: Some(id),
        }
    }

    #[must_use]
    pub fn scope_name(&self) -> &str {
        &self.scope
    }

    #[must_use]
    pub fn dispatch_id(&self) -> Option<DispatchId> {
        self.dispatch
    }
}

impl fmt::Display for ContextName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.dispatch {
            Some(id) => write!(f, "{}#{}", self.scope, id),
            None => f.write_str(&self.scope),
        }
    }
}

/// Receives scheduling failures.
///
/// Closures of the right shape implement this trait, so a test can collect
/// reports into a `Mutex<Vec<_>>` directly.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, context: &ContextName, error: &SchedulingFailure);
}

impl<F> ErrorReporter for F
where
    F: Fn(&ContextName, &SchedulingFailure) + Send + Sync,
{
    fn report(&self, context: &ContextName, error: &SchedulingFailure) {
        self(context, error);
    }
}

/// Default reporter: logs at error level
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, context: &ContextName, error: &SchedulingFailure) {
        error!(
            context = %context,
            error = %error,
            "Uncaught failure in dispatch scope"
        );
    }
}
