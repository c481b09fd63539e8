//! # Runtime Configuration Module
//!
//! Environment-driven settings for the coroutine runtime that serves async
//! dispatches.
//!
//! ## Environment Variables
//!
//! ### `RROUTE_STACK_SIZE`
//!
//! Stack size for dispatch coroutines. Accepts decimal (`65536`) or
//! hexadecimal (`0x10000`). Default: `0x10000` (64 KB).
//!
//! ### `RROUTE_WORKERS`
//!
//! Number of `may` scheduler worker threads. Unset leaves the `may` default
//! (one per CPU).
//!
//! ### `RROUTE_SHUTDOWN_GRACE_MS`
//!
//! How long shutdown waits for in-flight async handlers before failing their
//! pending results as cancelled. Default: `5000`.
//!
//! ## Usage
//!
//! ```rust
//! use reactive_routing::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env();
//! println!("Stack size: {} bytes", config.stack_size);
//! ```
//!
//! [`RuntimeConfig::apply`] pushes the values into `may::config()`; call it
//! before the first coroutine is spawned.

use std::env;
use std::time::Duration;

/// Default coroutine stack size (64 KB)
pub const DEFAULT_STACK_SIZE: usize = 0x10000;

/// Default shutdown grace period
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_millis(5000);

/// Poll interval while waiting for in-flight dispatches to drain
pub const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Stack size for dispatch coroutines in bytes
    pub stack_size: usize,
    /// `may` worker threads; `None` keeps the runtime default
    pub workers: Option<usize>,
    /// Time shutdown waits for in-flight dispatches
    pub shutdown_grace: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
            workers: None,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let stack_size = env::var("RROUTE_STACK_SIZE")
            .ok()
            .and_then(|v| parse_size(&v))
            .unwrap_or(DEFAULT_STACK_SIZE);

        let workers = env::var("RROUTE_WORKERS")
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .filter(|n: &usize| *n > 0);

        let shutdown_grace = env::var("RROUTE_SHUTDOWN_GRACE_MS")
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .map_or(DEFAULT_SHUTDOWN_GRACE, Duration::from_millis);

        RuntimeConfig {
            stack_size,
            workers,
            shutdown_grace,
        }
    }

    #[must_use]
    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = stack_size;
        self
    }

    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    #[must_use]
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Configure the global `may` scheduler.
    pub fn apply(&self) {
        let config = may::config();
        config.set_stack_size(self.stack_size);
        if let Some(workers) = self.workers {
            config.set_workers(workers);
        }
    }
}

/// Parse a byte size given in decimal or `0x`-prefixed hexadecimal
#[must_use]
pub fn parse_size(value: &str) -> Option<usize> {
    let value = value.trim();
    match value.strip_prefix("0x") {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    }
}
