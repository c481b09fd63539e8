//! # Dispatcher Module
//!
//! Chooses, per request, whether a route's handler runs on the transport's
//! thread or on a coroutine, and owns the coroutines it starts.
//!
//! ## Overview
//!
//! - [`DispatchEngine`] - collects routes, attaches them to a transport and
//!   serves each request
//! - [`PendingResult`] - single-assignment handle the transport waits on for
//!   async responses
//! - [`TaskScope`] - structured concurrency scope; every async dispatch lives
//!   inside it and shutdown fails whatever is still running
//!
//! ## Mode Selection
//!
//! A request runs asynchronously only when the route is flagged `async` **and**
//! the transport is running a standard HTTP method. `BEFORE`/`AFTER` hooks
//! always run synchronously, even on async routes.
//!
//! ```text
//! route.async && exchange.is_http_method()
//!     -> PendingResult registered with the exchange
//!     -> coroutine "<engine>#<dispatch-id>" runs the async handler
//!     -> handler result (or failure, or panic) settles the PendingResult
//! otherwise
//!     -> sync handler runs on the calling thread, result returned directly
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
//! let mut engine = DispatchEngine::<&'static str, LocalExchange<String>>::builder(
//!     |_exchange, route| Ok(format!("sync {}", route.context())),
//!     |call| Ok(format!("async {}", call.route.context())),
//! )
//! .config(RuntimeConfig::default().with_shutdown_grace(Duration::from_millis(100)))
//! .build();
//!
//! engine
//!     .register_routes([Route::new("/ping", [RouteMethod::Get], false, "ping").unwrap()])
//!     .unwrap();
//!
//! let mut transport = LocalTransport::new();
//! engine.attach_to(&mut transport).unwrap();
//!
//! let reply = transport
//!     .handle(RouteMethod::Get, "/ping", None)
//!     .wait(Duration::from_secs(1))
//!     .unwrap();
//! assert_eq!(reply, "sync ping");
//! ```

mod core;
mod pending;
mod scope;

pub use self::core::{
    AsyncCall, AsyncHandler, AttachSummary, Dispatch, DispatchEngine, DispatchEngineBuilder,
    SyncHandler, DEFAULT_ENGINE_NAME,
};
pub use self::pending::{PendingResult, PendingState};
pub use self::scope::{CancellationToken, ScopeMetrics, ShutdownReport, TaskScope};
