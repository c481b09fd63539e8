//! # Route Module
//!
//! The route module holds the data model the dispatch engine works on.
//!
//! ## Overview
//!
//! - [`Route`] - immutable endpoint: path pattern, methods, execution mode and
//!   an opaque context payload
//! - [`RouteMethod`] - HTTP verbs plus the `Before`/`After` hooks
//! - [`PathPattern`] - parsed path with matching and shadowing checks
//! - [`RouteOrdering`] / [`SpecificityOrdering`] - registration order policy
//! - [`Routes`] - bulk source of routes
//!
//! ## Example
//!
//! ```rust
//! use reactive_routing::route::{Route, RouteMethod, RouteOrdering, SpecificityOrdering};
//!
//! let wildcard = Route::new("/files/*", [RouteMethod::Get], true, "serve").unwrap();
//! let config = Route::new("/files/config", [RouteMethod::Get], false, "config").unwrap();
//!
//! let mut routes = vec![wildcard, config];
//! SpecificityOrdering.sort(&mut routes);
//! assert_eq!(routes[0].path(), "/files/config");
//! ```
//!
//! ## Identity
//!
//! Routes compare by identity, not by path. Building the same route twice
//! yields two distinct routes that can both be registered.

mod core;
mod ordering;
mod pattern;

pub use self::core::{MethodSet, Route, RouteBuilder, RouteId, RouteMethod, Routes, MAX_INLINE_METHODS};
pub use ordering::{RouteOrdering, SpecificityOrdering};
pub use pattern::{ParamVec, PathPattern, Segment, MAX_INLINE_PARAMS};
