//! Dispatch engine core: mode selection, async scheduling and attachment.

use super::pending::PendingResult;
use super::scope::{
    panic_message, AbandonHook, CancellationToken, ScopeMetrics, ShutdownReport, TaskScope,
};
use crate::error::{DispatchError, HandlerFailure};
use crate::ids::DispatchId;
use crate::registry::RouteRegistry;
use crate::reporter::{ErrorReporter, TracingReporter};
use crate::route::{Route, RouteOrdering, Routes, SpecificityOrdering};
use crate::runtime_config::RuntimeConfig;
use crate::transport::{Exchange, RouteHandler, Transport};
use serde::Serialize;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Name used for the engine's scope and coroutines unless configured otherwise
pub const DEFAULT_ENGINE_NAME: &str = "reactive-routing";

/// What the engine hands back to the transport for one request
pub enum Dispatch<R> {
    /// Sync route: the handler already produced the response
    Completed(R),
    /// Async route: the response arrives through the pending result
    Suspended(PendingResult<R>),
}

impl<R> Dispatch<R> {
    #[must_use]
    pub fn is_suspended(&self) -> bool {
        matches!(self, Dispatch::Suspended(_))
    }

    /// Block until the response is available.
    ///
    /// # Errors
    ///
    /// The handler's failure for suspended dispatches that failed.
    pub fn wait(self) -> Result<R, HandlerFailure> {
        match self {
            Dispatch::Completed(value) => Ok(value),
            Dispatch::Suspended(pending) => pending.wait(),
        }
    }
}

impl<R: fmt::Debug> fmt::Debug for Dispatch<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dispatch::Completed(value) => f.debug_tuple("Completed").field(value).finish(),
            Dispatch::Suspended(pending) => f.debug_tuple("Suspended").field(pending).finish(),
        }
    }
}

/// Everything an async handler body receives.
///
/// The engine settles `pending` with whatever the handler returns, so handlers
/// normally just return. Completing `pending` directly is allowed for early
/// responses; the engine's own completion is then rejected and logged.
pub struct AsyncCall<C, E: Exchange> {
    pub dispatch_id: DispatchId,
    pub exchange: E,
    pub route: Route<C>,
    pub pending: PendingResult<E::Response>,
    pub cancellation: CancellationToken,
    scope: Arc<str>,
}

impl<C, E: Exchange> AsyncCall<C, E> {
    /// Name of the scope running this dispatch
    #[must_use]
    pub fn scope_name(&self) -> &str {
        &self.scope
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// `?`-friendly cancellation check.
    ///
    /// # Errors
    ///
    /// [`HandlerFailure::Cancelled`] once the engine is shutting down.
    pub fn check_cancelled(&self) -> Result<(), HandlerFailure> {
        self.cancellation.check(&self.scope)
    }
}

/// Handler body for sync routes and hooks, run on the transport's thread
pub type SyncHandler<C, E> = dyn Fn(&E, &Route<C>) -> Result<<E as Exchange>::Response, HandlerFailure>
    + Send
    + Sync;

/// Handler body for async routes, run on a dispatch coroutine
pub type AsyncHandler<C, E> =
    dyn Fn(AsyncCall<C, E>) -> Result<<E as Exchange>::Response, HandlerFailure> + Send + Sync;

/// Counts from one attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AttachSummary {
    pub routes: usize,
    pub registrations: usize,
}

struct DispatchCore<C, E: Exchange> {
    scope: Arc<TaskScope>,
    sync_handler: Arc<SyncHandler<C, E>>,
    async_handler: Arc<AsyncHandler<C, E>>,
}

impl<C, E> DispatchCore<C, E>
where
    C: Send + Sync + 'static,
    E: Exchange,
{
    fn dispatch(&self, route: &Route<C>, exchange: &E) -> Result<Dispatch<E::Response>, HandlerFailure> {
        let dispatch_id = DispatchId::new();
        let operation = exchange.operation();

        if !(route.is_async() && exchange.is_http_method()) {
            debug!(
                dispatch_id = %dispatch_id,
                route_id = %route.id(),
                path = %route.path(),
                operation = %operation,
                async_route = route.is_async(),
                "Dispatching on calling thread"
            );
            let start = Instant::now();
            let result = (self.sync_handler)(exchange, route);
            let latency_ms = start.elapsed().as_millis() as u64;
            match &result {
                Ok(_) => debug!(
                    dispatch_id = %dispatch_id,
                    latency_ms = latency_ms,
                    "Sync handler complete"
                ),
                Err(e) => warn!(
                    dispatch_id = %dispatch_id,
                    path = %route.path(),
                    latency_ms = latency_ms,
                    error = %e,
                    "Sync handler failed"
                ),
            }
            return result.map(Dispatch::Completed);
        }

        // The transport must know to wait before anything can complete the result.
        let pending = PendingResult::with_id(dispatch_id);
        exchange.suspend_response_until(pending.clone());

        let abandon_target = pending.clone();
        let abandon: AbandonHook = Box::new(move |failure| {
            if let Err(violation) = abandon_target.fail(failure) {
                debug!(
                    dispatch_id = %violation.id,
                    state = %violation.state,
                    "Abandoned dispatch had already settled"
                );
            }
        });

        let handler = Arc::clone(&self.async_handler);
        let scope_name: Arc<str> = Arc::from(self.scope.name());
        let call_exchange = exchange.clone();
        let call_route = route.clone();
        let completion = pending.clone();

        info!(
            dispatch_id = %dispatch_id,
            route_id = %route.id(),
            path = %route.path(),
            operation = %operation,
            "Request dispatched to async handler"
        );

        let spawned = self.scope.spawn(dispatch_id, abandon, move |cancellation| {
            let start = Instant::now();
            let call = AsyncCall {
                dispatch_id,
                exchange: call_exchange,
                route: call_route,
                pending: completion.clone(),
                cancellation,
                scope: scope_name,
            };

            let outcome = match catch_unwind(AssertUnwindSafe(|| handler(call))) {
                Ok(outcome) => outcome,
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    error!(
                        dispatch_id = %dispatch_id,
                        panic_message = %message,
                        "Async handler panicked"
                    );
                    Err(HandlerFailure::Panicked(message))
                }
            };

            let failed = outcome.is_err();
            match completion.settle(outcome) {
                Ok(()) => info!(
                    dispatch_id = %dispatch_id,
                    failed = failed,
                    latency_ms = start.elapsed().as_millis() as u64,
                    "Async handler settled pending result"
                ),
                Err(violation) => warn!(
                    dispatch_id = %dispatch_id,
                    state = %violation.state,
                    "Pending result was already settled - handler outcome discarded"
                ),
            }
        });

        if let Err(failure) = spawned {
            debug!(
                dispatch_id = %dispatch_id,
                error = %failure,
                "Async dispatch was not scheduled"
            );
        }

        Ok(Dispatch::Suspended(pending))
    }
}

/// Dispatch engine.
///
/// Collects routes, registers them against a [`Transport`] in the order given
/// by its [`RouteOrdering`], and serves each request synchronously or on a
/// coroutine depending on the route's `async` flag and the request operation.
///
/// Async work runs under a [`TaskScope`] owned by the engine. Dropping the
/// engine shuts the scope down with the configured grace period.
pub struct DispatchEngine<C, E: Exchange> {
    name: Arc<str>,
    registry: RouteRegistry<C>,
    core: Arc<DispatchCore<C, E>>,
    attached: bool,
}

impl<C, E> DispatchEngine<C, E>
where
    C: Send + Sync + 'static,
    E: Exchange,
{
    /// Start configuring an engine with its sync and async handler bodies.
    #[must_use]
    pub fn builder<S, A>(sync_handler: S, async_handler: A) -> DispatchEngineBuilder<C, E>
    where
        S: Fn(&E, &Route<C>) -> Result<E::Response, HandlerFailure> + Send + Sync + 'static,
        A: Fn(AsyncCall<C, E>) -> Result<E::Response, HandlerFailure> + Send + Sync + 'static,
    {
        DispatchEngineBuilder {
            name: Arc::from(DEFAULT_ENGINE_NAME),
            config: None,
            reporter: Arc::new(TracingReporter),
            ordering: Arc::new(SpecificityOrdering),
            sync_handler: Arc::new(sync_handler),
            async_handler: Arc::new(async_handler),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    fn ensure_detached(&self) -> Result<(), DispatchError> {
        if self.attached {
            return Err(DispatchError::AlreadyAttached {
                engine: self.name.to_string(),
            });
        }
        Ok(())
    }

    /// Add routes before attachment. Routes already registered are ignored.
    ///
    /// # Errors
    ///
    /// [`DispatchError::AlreadyAttached`] once the engine is attached.
    pub fn register_routes<I>(&mut self, routes: I) -> Result<&mut Self, DispatchError>
    where
        I: IntoIterator<Item = Route<C>>,
    {
        self.ensure_detached()?;
        self.registry.register(routes);
        Ok(self)
    }

    /// Add every route of a [`Routes`] source before attachment.
    ///
    /// # Errors
    ///
    /// [`DispatchError::AlreadyAttached`] once the engine is attached.
    pub fn register_route_source(
        &mut self,
        source: &dyn Routes<C>,
    ) -> Result<&mut Self, DispatchError> {
        self.ensure_detached()?;
        self.registry.register_source(source);
        Ok(self)
    }

    /// All routes in registration order
    #[must_use]
    pub fn routes(&self) -> Vec<Route<C>> {
        self.registry.all_routes()
    }

    /// Transport handler serving `route`
    #[must_use]
    pub fn handler_for(&self, route: Route<C>) -> RouteHandler<E> {
        let core = Arc::clone(&self.core);
        Arc::new(move |exchange: &E| core.dispatch(&route, exchange))
    }

    /// Dispatch one request for `route` directly, bypassing transport registration.
    ///
    /// # Errors
    ///
    /// The sync handler's failure. Async failures arrive through the pending result.
    pub fn dispatch(&self, route: &Route<C>, exchange: &E) -> Result<Dispatch<E::Response>, HandlerFailure> {
        self.core.dispatch(route, exchange)
    }

    /// Register every route, ordered, with `transport`.
    ///
    /// Each route gets one handler, registered once per method it answers.
    /// The registry is frozen afterwards.
    ///
    /// # Errors
    ///
    /// [`DispatchError::AlreadyAttached`] on a second call.
    pub fn attach_to<T>(&mut self, transport: &mut T) -> Result<AttachSummary, DispatchError>
    where
        T: Transport<Exchange = E>,
    {
        self.ensure_detached()?;

        let routes = self.registry.all_routes();
        let mut registrations = 0;
        for (position, route) in routes.iter().enumerate() {
            let handler = self.handler_for(route.clone());
            for &method in route.methods() {
                transport.register_handler(method, route.path(), Arc::clone(&handler));
                registrations += 1;
            }
            debug!(
                engine = %self.name,
                position = position,
                route_id = %route.id(),
                path = %route.path(),
                methods = ?route.methods(),
                async_route = route.is_async(),
                "Route registered with transport"
            );
        }

        self.attached = true;
        let summary = AttachSummary {
            routes: routes.len(),
            registrations,
        };
        info!(
            engine = %self.name,
            routes = summary.routes,
            registrations = summary.registrations,
            "Dispatch engine attached to transport"
        );
        Ok(summary)
    }

    #[must_use]
    pub fn metrics(&self) -> &ScopeMetrics {
        self.core.scope.metrics()
    }

    /// Async dispatches currently running
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.core.scope.in_flight()
    }

    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        self.core.scope.cancellation()
    }

    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.core.scope.is_closed()
    }

    /// Shut the scope down with the configured grace period.
    pub fn shutdown(&self) -> ShutdownReport {
        self.shutdown_with_grace(self.core.scope.config().shutdown_grace)
    }

    /// Shut the scope down, waiting at most `grace` for in-flight dispatches.
    pub fn shutdown_with_grace(&self, grace: Duration) -> ShutdownReport {
        self.core.scope.shutdown(grace)
    }
}

impl<C, E: Exchange> Drop for DispatchEngine<C, E> {
    fn drop(&mut self) {
        if !self.core.scope.is_closed() {
            let grace = self.core.scope.config().shutdown_grace;
            let report = self.core.scope.shutdown(grace);
            debug!(
                engine = %self.name,
                drained = report.drained,
                abandoned = report.abandoned.len(),
                "Dispatch engine dropped"
            );
        }
    }
}

/// Builder for [`DispatchEngine`]
pub struct DispatchEngineBuilder<C, E: Exchange> {
    name: Arc<str>,
    config: Option<RuntimeConfig>,
    reporter: Arc<dyn ErrorReporter>,
    ordering: Arc<dyn RouteOrdering<C>>,
    sync_handler: Arc<SyncHandler<C, E>>,
    async_handler: Arc<AsyncHandler<C, E>>,
}

impl<C, E> DispatchEngineBuilder<C, E>
where
    C: Send + Sync + 'static,
    E: Exchange,
{
    /// Scope and coroutine name, also passed to the error reporter
    #[must_use]
    pub fn name(mut self, name: &str) -> Self {
        self.name = Arc::from(name);
        self
    }

    /// Runtime settings; defaults to [`RuntimeConfig::from_env`]
    #[must_use]
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = Some(config);
        self
    }

    #[must_use]
    pub fn reporter(mut self, reporter: impl ErrorReporter + 'static) -> Self {
        self.reporter = Arc::new(reporter);
        self
    }

    /// Registration order policy; defaults to [`SpecificityOrdering`]
    #[must_use]
    pub fn ordering(mut self, ordering: impl RouteOrdering<C> + 'static) -> Self {
        self.ordering = Arc::new(ordering);
        self
    }

    #[must_use]
    pub fn build(self) -> DispatchEngine<C, E> {
        let config = self.config.unwrap_or_else(RuntimeConfig::from_env);
        let scope = Arc::new(TaskScope::new(
            Arc::clone(&self.name),
            config,
            self.reporter,
        ));

        debug!(
            engine = %self.name,
            stack_size = config.stack_size,
            shutdown_grace_ms = config.shutdown_grace.as_millis() as u64,
            "Dispatch engine created"
        );

        DispatchEngine {
            name: self.name,
            registry: RouteRegistry::with_ordering(self.ordering),
            core: Arc::new(DispatchCore {
                scope,
                sync_handler: self.sync_handler,
                async_handler: self.async_handler,
            }),
            attached: false,
        }
    }
}
