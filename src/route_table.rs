//! Route table files
//!
//! A YAML list of routes with a free-form JSON context each:
//!
//! ```yaml
//! - path: /files/{id}
//!   methods: [get, head]
//!   async: true
//!   context:
//!     handler: read_file
//! - path: /files/*
//!   methods: [GET]
//! ```
//!
//! Method names are case-insensitive; `async` defaults to `false` and
//! `context` to `null`.

use crate::route::{Route, RouteMethod, Routes};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// One entry as written in the file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteEntry {
    pub path: String,
    pub methods: Vec<String>,
    #[serde(default, rename = "async")]
    pub asynchronous: bool,
    #[serde(default)]
    pub context: Value,
}

impl RouteEntry {
    /// Build the route this entry describes.
    ///
    /// # Errors
    ///
    /// Unknown method names and invalid paths.
    pub fn to_route(&self) -> Result<Route<Value>> {
        let methods = self
            .methods
            .iter()
            .map(|m| m.parse::<RouteMethod>())
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("route `{}`", self.path))?;
        Route::new(
            self.path.as_str(),
            methods,
            self.asynchronous,
            self.context.clone(),
        )
        .with_context(|| format!("route `{}`", self.path))
    }
}

/// Routes built from a route table file.
///
/// Routes are created once, so registering the same table twice adds nothing.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<Route<Value>>,
}

impl RouteTable {
    /// Parse a table from YAML text.
    ///
    /// # Errors
    ///
    /// Malformed YAML or any invalid entry.
    pub fn parse(yaml: &str) -> Result<Self> {
        let entries: Vec<RouteEntry> =
            serde_yaml::from_str(yaml).context("Failed to parse route table")?;
        let routes = entries
            .iter()
            .enumerate()
            .map(|(i, entry)| entry.to_route().with_context(|| format!("entry {i}")))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { routes })
    }

    /// Read and parse a table file.
    ///
    /// # Errors
    ///
    /// I/O failures and everything [`RouteTable::parse`] rejects.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read route table {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid route table {}", path.display()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl Routes<Value> for RouteTable {
    fn routes(&self) -> Vec<Route<Value>> {
        self.routes.clone()
    }
}
