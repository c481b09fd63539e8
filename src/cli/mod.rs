//! # CLI Module
//!
//! Command-line tools for inspecting and exercising route tables.
//!
//! ## Commands
//!
//! ### `plan`
//!
//! Print the order in which the routes of a table would be registered with a
//! transport:
//!
//! ```bash
//! reactive-routing plan --routes routes.yaml
//! reactive-routing plan --routes routes.yaml --json
//! ```
//!
//! ### `simulate`
//!
//! Attach echo handlers for every route to the in-process transport, serve a
//! single request and print the outcome as JSON:
//!
//! ```bash
//! reactive-routing simulate --routes routes.yaml --method GET --path /files/readme
//! reactive-routing simulate --routes routes.yaml --method POST --path /files \
//!     --body '{"name": "notes.txt"}' --timeout-ms 2000
//! ```
//!
//! Route contexts may carry `fail` and `delay_ms` keys to make the echo
//! handler fail or take time; see [`crate::echo`].

mod commands;

#[cfg(test)]
mod tests;

pub use commands::{plan, run_cli, simulate, Cli, Commands, PlanEntry};
