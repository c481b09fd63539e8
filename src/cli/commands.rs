use crate::dispatcher::DispatchEngine;
use crate::echo::{echo_async, echo_sync};
use crate::error::TransportError;
use crate::registry::RouteRegistry;
use crate::route::RouteMethod;
use crate::route_table::RouteTable;
use crate::runtime_config::RuntimeConfig;
use crate::transport::{LocalExchange, LocalTransport};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Command-line interface for reactive-routing
#[derive(Parser)]
#[command(name = "reactive-routing")]
#[command(about = "Inspect and exercise route tables", long_about = None)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the order in which routes would be registered
    Plan {
        /// Path to the route table (YAML)
        #[arg(short, long)]
        routes: PathBuf,

        /// Emit JSON instead of a table
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Serve one request against echo handlers and print the outcome
    Simulate {
        /// Path to the route table (YAML)
        #[arg(short, long)]
        routes: PathBuf,

        /// Request method
        #[arg(short, long, default_value = "GET")]
        method: String,

        /// Request path
        #[arg(short, long)]
        path: String,

        /// JSON request body
        #[arg(short, long)]
        body: Option<String>,

        /// How long to wait for an async response
        #[arg(long, default_value_t = 5000, env = "RROUTE_SIMULATE_TIMEOUT_MS")]
        timeout_ms: u64,
    },
}

/// One line of a registration plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanEntry {
    pub position: usize,
    pub route_id: String,
    pub path: String,
    pub methods: Vec<RouteMethod>,
    #[serde(rename = "async")]
    pub asynchronous: bool,
}

/// Registration order for every route in `table`
#[must_use]
pub fn plan(table: &RouteTable) -> Vec<PlanEntry> {
    let mut registry = RouteRegistry::new();
    registry.register_source(table);
    registry
        .all_routes()
        .iter()
        .enumerate()
        .map(|(position, route)| PlanEntry {
            position,
            route_id: route.id().to_string(),
            path: route.path().to_string(),
            methods: route.methods().to_vec(),
            asynchronous: route.is_async(),
        })
        .collect()
}

/// Attach echo handlers for `table`, serve one request and describe the outcome.
///
/// # Errors
///
/// Engine setup failures. Request outcomes, failed ones included, are part of
/// the returned report.
pub fn simulate(
    table: &RouteTable,
    method: RouteMethod,
    path: &str,
    body: Option<Value>,
    timeout: Duration,
    config: RuntimeConfig,
) -> Result<Value> {
    let mut engine = DispatchEngine::<Value, LocalExchange<Value>>::builder(echo_sync, echo_async)
        .name("reactive-routing:simulate")
        .config(config)
        .build();
    engine.register_route_source(table)?;

    let mut transport = LocalTransport::new();
    let summary = engine.attach_to(&mut transport)?;

    let start = Instant::now();
    let outcome = transport.handle(method, path, body);
    let suspended = outcome.is_suspended();

    let mut report = match outcome.wait(timeout) {
        Ok(response) => json!({ "status": "completed", "response": response }),
        Err(e @ TransportError::NotFound { .. }) => {
            json!({ "status": "not_found", "error": e.to_string() })
        }
        Err(e @ TransportError::TimedOut { .. }) => {
            json!({ "status": "timed_out", "error": e.to_string() })
        }
        Err(TransportError::Handler(failure)) => {
            json!({ "status": "failed", "error": failure.to_string() })
        }
    };
    report["suspended"] = Value::Bool(suspended);
    report["elapsed_ms"] = json!(start.elapsed().as_millis() as u64);
    report["attached"] = serde_json::to_value(summary)?;
    report["shutdown"] = serde_json::to_value(engine.shutdown())?;
    Ok(report)
}

/// Run a parsed command line.
///
/// # Errors
///
/// Unreadable or invalid route tables, bad arguments and engine setup failures.
pub fn run_cli(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Plan { routes, json } => {
            let table = RouteTable::load(&routes)?;
            let entries = plan(&table);
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                for entry in &entries {
                    let methods: Vec<&str> = entry.methods.iter().map(|m| m.as_str()).collect();
                    println!(
                        "{:>3}  {:<24} {:<40} {}",
                        entry.position,
                        methods.join(","),
                        entry.path,
                        if entry.asynchronous { "async" } else { "sync" }
                    );
                }
            }
            Ok(())
        }
        Commands::Simulate {
            routes,
            method,
            path,
            body,
            timeout_ms,
        } => {
            let table = RouteTable::load(&routes)?;
            let method: RouteMethod = method.parse()?;
            let body = body
                .map(|b| serde_json::from_str::<Value>(&b))
                .transpose()
                .context("Request body is not valid JSON")?;
            let report = simulate(
                &table,
                method,
                &path,
                body,
                Duration::from_millis(timeout_ms),
                RuntimeConfig::from_env(),
            )?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}
