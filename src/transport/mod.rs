//! # Transport Module
//!
//! The contract between the dispatch engine and the HTTP server that hosts it.
//!
//! ## Overview
//!
//! The engine never touches sockets. A transport owns request/response objects
//! and the method-to-path registration table; the engine only needs:
//!
//! - [`Transport::register_handler`] - accept one handler per method and path,
//!   called once per route method at attachment, in registration order
//! - [`Exchange`] - the per-request object: which operation is running and
//!   a way to hold the response back until a [`PendingResult`] completes
//!
//! The matched route is bound into each registered [`RouteHandler`], so the
//! transport hands over the exchange and the engine already knows the route.
//!
//! [`LocalTransport`] is an in-process implementation with first-match lookup
//! in registration order, used by the tests, benches and the CLI.

mod local;

pub use local::{LocalExchange, LocalOutcome, LocalTransport};

use crate::dispatcher::{Dispatch, PendingResult};
use crate::error::HandlerFailure;
use crate::route::RouteMethod;
use std::sync::Arc;

/// Per-request object owned by the transport.
///
/// Cloning must yield a handle to the same request: async dispatch moves a
/// clone onto the coroutine that runs the handler.
pub trait Exchange: Clone + Send + Sync + 'static {
    /// What a handler produces for this transport
    type Response: Send + 'static;

    /// Operation the transport is running for this request
    fn operation(&self) -> RouteMethod;

    /// Whether the running operation is a standard HTTP method rather than a hook
    fn is_http_method(&self) -> bool {
        self.operation().is_http_method()
    }

    /// Defer finalizing the response until `pending` completes.
    fn suspend_response_until(&self, pending: PendingResult<Self::Response>);
}

/// Handler registered with a transport for one route
pub type RouteHandler<E> = Arc<
    dyn Fn(&E) -> Result<Dispatch<<E as Exchange>::Response>, HandlerFailure> + Send + Sync,
>;

/// HTTP server side of the dispatch layer
pub trait Transport {
    type Exchange: Exchange;

    fn register_handler(
        &mut self,
        method: RouteMethod,
        path: &str,
        handler: RouteHandler<Self::Exchange>,
    );
}
