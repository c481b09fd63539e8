//! # reactive-routing
//!
//! **reactive-routing** sits between an HTTP routing table and the handlers
//! behind it. For every route it decides whether a request is served on the
//! transport's own thread or parked on a pending result while the handler runs
//! on a `may` coroutine.
//!
//! ## Overview
//!
//! - **[`route`]** - the immutable route model, path patterns and the ordering
//!   policy used at registration
//! - **[`registry`]** - identity-deduplicated route collection, ordered on read
//! - **[`dispatcher`]** - the dispatch engine, its structured concurrency scope
//!   and the pending-result handle
//! - **[`transport`]** - the contract a host HTTP server implements, plus an
//!   in-process transport
//! - **[`reporter`]** - sink for failures outside a single request
//! - **[`error`]** - every error the layer produces
//!
//! Ambient pieces: [`runtime_config`] (environment-driven coroutine settings),
//! [`logging`] (tracing subscriber setup), [`ids`] (ULID dispatch ids),
//! [`route_table`] (YAML route files) and the [`cli`].
//!
//! ## Request Flow
//!
//! ```text
//! transport matches request -> handler registered by the engine for that route
//!     sync route or hook   -> sync handler on the calling thread -> response
//!     async route + method -> PendingResult handed to the exchange
//!                             -> coroutine runs async handler
//!                             -> value / failure / panic settles the result
//! ```
//!
//! ## Example
//!
//! ```rust
//! use reactive_routing::dispatcher::DispatchEngine;
//! use reactive_routing::route::{Route, RouteMethod};
//! use reactive_routing::runtime_config::RuntimeConfig;
//! use reactive_routing::transport::{LocalExchange, LocalTransport};
//! use std::time::Duration;
//!
//! let mut engine = DispatchEngine::<u32, LocalExchange<u32>>::builder(
//!     |_exchange, route| Ok(*route.context()),
//!     |call| Ok(*call.route.context() * 2),
//! )
//! .config(RuntimeConfig::default().with_shutdown_grace(Duration::from_millis(100)))
//! .build();
//!
//! engine
//!     .register_routes([
//!         Route::new("/sync", [RouteMethod::Get], false, 1).unwrap(),
//!         Route::new("/async", [RouteMethod::Get], true, 21).unwrap(),
//!     ])
//!     .unwrap();
//!
//! let mut transport = LocalTransport::new();
//! engine.attach_to(&mut transport).unwrap();
//!
//! let outcome = transport.handle(RouteMethod::Get, "/async", None);
//! assert!(outcome.is_suspended());
//! assert_eq!(outcome.wait(Duration::from_secs(1)).unwrap(), 42);
//! ```

pub mod cli;
pub mod dispatcher;
pub mod echo;
pub mod error;
pub mod ids;
pub mod logging;
pub mod registry;
pub mod reporter;
pub mod route;
pub mod route_table;
pub mod runtime_config;
pub mod transport;

pub use dispatcher::{
    AsyncCall, Dispatch, DispatchEngine, PendingResult, PendingState, ShutdownReport,
};
pub use error::{
    DispatchError, DoubleCompletion, HandlerFailure, RouteError, SchedulingFailure,
    TransportError,
};
pub use ids::DispatchId;
pub use reporter::{ContextName, ErrorReporter, TracingReporter};
pub use route::{Route, RouteMethod, RouteOrdering, Routes, SpecificityOrdering};
pub use runtime_config::RuntimeConfig;
pub use transport::{Exchange, LocalTransport, Transport};
