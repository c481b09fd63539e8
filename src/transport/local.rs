use super::{Exchange, RouteHandler, Transport};
use crate::dispatcher::{Dispatch, PendingResult};
use crate::error::{HandlerFailure, TransportError};
use crate::route::{ParamVec, PathPattern, RouteMethod};
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};

struct Registration<R: Send + 'static> {
    method: RouteMethod,
    pattern: PathPattern,
    handler: RouteHandler<LocalExchange<R>>,
}

/// In-process transport.
///
/// Keeps handlers in the order they were registered and serves a request by
/// running matching `BEFORE` hooks, the first matching handler for the request
/// method, then matching `AFTER` hooks. Hook results are discarded; a hook
/// failure ends the request.
pub struct LocalTransport<R: Send + 'static> {
    registrations: Vec<Registration<R>>,
}

impl<R: Send + 'static> Default for LocalTransport<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Send + 'static> LocalTransport<R> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            registrations: Vec::new(),
        }
    }

    /// `(method, path)` pairs in registration order
    #[must_use]
    pub fn registrations(&self) -> Vec<(RouteMethod, String)> {
        self.registrations
            .iter()
            .map(|r| (r.method, r.pattern.as_str().to_string()))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    fn run_hooks(
        &self,
        operation: RouteMethod,
        request_method: RouteMethod,
        path: &str,
        body: &Option<Arc<Value>>,
    ) -> Result<(), HandlerFailure> {
        for registration in self.registrations.iter().filter(|r| r.method == operation) {
            let Some(params) = registration.pattern.matches(path) else {
                continue;
            };
            let exchange = LocalExchange::new(
                operation,
                request_method,
                path,
                registration.pattern.as_str(),
                params,
                body.clone(),
            );
            // Hooks never suspend; a completed value is dropped.
            (registration.handler)(&exchange)?;
        }
        Ok(())
    }

    /// Serve one request.
    pub fn handle(&self, method: RouteMethod, path: &str, body: Option<Value>) -> LocalOutcome<R> {
        let body = body.map(Arc::new);

        if let Err(failure) = self.run_hooks(RouteMethod::Before, method, path, &body) {
            warn!(method = %method, path = %path, error = %failure, "Before hook failed");
            return LocalOutcome::Failed(failure);
        }

        let matched = self
            .registrations
            .iter()
            .filter(|r| r.method == method)
            .find_map(|r| r.pattern.matches(path).map(|params| (r, params)));

        let outcome = match matched {
            Some((registration, params)) => {
                debug!(
                    method = %method,
                    path = %path,
                    matched_path = %registration.pattern.as_str(),
                    "Local request matched"
                );
                let exchange = LocalExchange::new(
                    method,
                    method,
                    path,
                    registration.pattern.as_str(),
                    params,
                    body.clone(),
                );
                match (registration.handler)(&exchange) {
                    Ok(Dispatch::Completed(value)) => LocalOutcome::Completed(value),
                    Ok(Dispatch::Suspended(pending)) => LocalOutcome::Suspended(pending),
                    Err(failure) => LocalOutcome::Failed(failure),
                }
            }
            None => {
                debug!(method = %method, path = %path, "No local route matched");
                LocalOutcome::NotFound {
                    method,
                    path: path.to_string(),
                }
            }
        };

        if let Err(failure) = self.run_hooks(RouteMethod::After, method, path, &body) {
            warn!(method = %method, path = %path, error = %failure, "After hook failed");
            return LocalOutcome::Failed(failure);
        }

        outcome
    }
}

impl<R: Send + 'static> Transport for LocalTransport<R> {
    type Exchange = LocalExchange<R>;

    fn register_handler(
        &mut self,
        method: RouteMethod,
        path: &str,
        handler: RouteHandler<Self::Exchange>,
    ) {
        // Paths reaching the transport come from constructed routes and always parse.
        let Ok(pattern) = PathPattern::parse(path) else {
            warn!(method = %method, path = %path, "Ignoring handler with unparseable path");
            return;
        };
        self.registrations.push(Registration {
            method,
            pattern,
            handler,
        });
    }
}

struct ExchangeState<R> {
    operation: RouteMethod,
    request_method: RouteMethod,
    path: String,
    matched_path: String,
    params: ParamVec,
    body: Option<Arc<Value>>,
    suspended: Mutex<Option<PendingResult<R>>>,
}

/// Per-invocation exchange handed to handlers by [`LocalTransport`]
pub struct LocalExchange<R> {
    state: Arc<ExchangeState<R>>,
}

impl<R> Clone for LocalExchange<R> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<R> fmt::Debug for LocalExchange<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalExchange")
            .field("operation", &self.state.operation)
            .field("path", &self.state.path)
            .field("matched_path", &self.state.matched_path)
            .finish()
    }
}

impl<R> LocalExchange<R> {
    fn new(
        operation: RouteMethod,
        request_method: RouteMethod,
        path: &str,
        matched_path: &str,
        params: ParamVec,
        body: Option<Arc<Value>>,
    ) -> Self {
        Self {
            state: Arc::new(ExchangeState {
                operation,
                request_method,
                path: path.to_string(),
                matched_path: matched_path.to_string(),
                params,
                body,
                suspended: Mutex::new(None),
            }),
        }
    }

    /// `BEFORE`/`AFTER` while a hook runs, otherwise the request method
    #[must_use]
    pub fn operation(&self) -> RouteMethod {
        self.state.operation
    }

    /// Method of the request being served, also for hooks
    #[must_use]
    pub fn request_method(&self) -> RouteMethod {
        self.state.request_method
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.state.path
    }

    /// Route path that matched this request
    #[must_use]
    pub fn matched_path(&self) -> &str {
        &self.state.matched_path
    }

    #[must_use]
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.state
            .params
            .iter()
            .find(|(key, _)| &**key == name)
            .map(|(_, value)| value.as_str())
    }

    #[must_use]
    pub fn path_params(&self) -> &ParamVec {
        &self.state.params
    }

    #[must_use]
    pub fn body(&self) -> Option<&Value> {
        self.state.body.as_deref()
    }

    /// Pending result the response was suspended on, if any
    #[must_use]
    pub fn suspended(&self) -> Option<PendingResult<R>> {
        self.state
            .suspended
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl<R: Send + 'static> Exchange for LocalExchange<R> {
    type Response = R;

    fn operation(&self) -> RouteMethod {
        self.state.operation
    }

    fn suspend_response_until(&self, pending: PendingResult<R>) {
        *self
            .state
            .suspended
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(pending);
    }
}

/// What [`LocalTransport::handle`] produced
pub enum LocalOutcome<R> {
    Completed(R),
    Suspended(PendingResult<R>),
    Failed(HandlerFailure),
    NotFound { method: RouteMethod, path: String },
}

impl<R> LocalOutcome<R> {
    #[must_use]
    pub fn is_suspended(&self) -> bool {
        matches!(self, LocalOutcome::Suspended(_))
    }

    /// Resolve to the response, waiting at most `timeout` on a suspended one.
    ///
    /// # Errors
    ///
    /// [`TransportError::NotFound`] when nothing matched,
    /// [`TransportError::TimedOut`] when a suspended response is still pending
    /// and [`TransportError::Handler`] for handler failures.
    pub fn wait(self, timeout: Duration) -> Result<R, TransportError> {
        match self {
            LocalOutcome::Completed(value) => Ok(value),
            LocalOutcome::Failed(failure) => Err(failure.into()),
            LocalOutcome::NotFound { method, path } => Err(TransportError::NotFound { method, path }),
            LocalOutcome::Suspended(pending) => match pending.wait_timeout(timeout) {
                Some(outcome) => outcome.map_err(TransportError::from),
                None => Err(TransportError::TimedOut {
                    id: pending.id(),
                    timeout_ms: timeout.as_millis() as u64,
                }),
            },
        }
    }
}

impl<R: fmt::Debug> fmt::Debug for LocalOutcome<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocalOutcome::Completed(value) => f.debug_tuple("Completed").field(value).finish(),
            LocalOutcome::Suspended(pending) => f.debug_tuple("Suspended").field(pending).finish(),
            LocalOutcome::Failed(failure) => f.debug_tuple("Failed").field(failure).finish(),
            LocalOutcome::NotFound { method, path } => f
                .debug_struct("NotFound")
                .field("method", method)
                .field("path", path)
                .finish(),
        }
    }
}
