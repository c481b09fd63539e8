//! Unit tests for CLI commands

use crate::cli::{plan, simulate, Cli, Commands};
use crate::route::RouteMethod;
use crate::route_table::RouteTable;
use crate::runtime_config::RuntimeConfig;
use clap::Parser;
use serde_json::json;
use std::time::Duration;

const TABLE: &str = r#"
- path: /files/*
  methods: [GET]
  context: {name: catch_all}
- path: /files/{id}
  methods: [GET, DELETE]
  async: true
  context: {name: by_id}
- path: /files/config
  methods: [GET]
  context: {name: config}
- path: /broken
  methods: [GET]
  async: true
  context: {fail: "disk on fire"}
"#;

fn config() -> RuntimeConfig {
    RuntimeConfig::default().with_shutdown_grace(Duration::from_millis(200))
}

#[test]
fn test_plan_command_parses() {
    let cli = Cli::try_parse_from(["reactive-routing", "plan", "--routes", "routes.yaml"]).unwrap();
    match cli.command {
        Commands::Plan { routes, json } => {
            assert_eq!(routes.to_string_lossy(), "routes.yaml");
            assert!(!json);
        }
        _ => panic!("Expected Plan command"),
    }
}

#[test]
fn test_simulate_command_defaults() {
    let cli = Cli::try_parse_from([
        "reactive-routing",
        "simulate",
        "-r",
        "routes.yaml",
        "--path",
        "/files/a",
    ])
    .unwrap();
    match cli.command {
        Commands::Simulate {
            method,
            path,
            body,
            ..
        } => {
            assert_eq!(method, "GET");
            assert_eq!(path, "/files/a");
            assert!(body.is_none());
        }
        _ => panic!("Expected Simulate command"),
    }
}

#[test]
fn test_simulate_requires_path() {
    assert!(Cli::try_parse_from(["reactive-routing", "simulate", "--routes", "r.yaml"]).is_err());
}

#[test]
fn test_plan_orders_most_specific_first() {
    let table = RouteTable::parse(TABLE).unwrap();
    let paths: Vec<String> = plan(&table).into_iter().map(|e| e.path).collect();
    assert_eq!(paths, ["/files/config", "/files/{id}", "/broken", "/files/*"]);
}

#[test]
fn test_plan_entries_carry_methods_and_mode() {
    let table = RouteTable::parse(TABLE).unwrap();
    let entries = plan(&table);
    let by_id = entries.iter().find(|e| e.path == "/files/{id}").unwrap();
    assert_eq!(by_id.methods, [RouteMethod::Get, RouteMethod::Delete]);
    assert!(by_id.asynchronous);
    assert_eq!(entries[0].position, 0);
}

#[test]
fn test_simulate_sync_route() {
    let table = RouteTable::parse(TABLE).unwrap();
    let report = simulate(&table, RouteMethod::Get, "/files/config", None, Duration::from_secs(2), config()).unwrap();
    assert_eq!(report["status"], "completed");
    assert_eq!(report["suspended"], false);
    assert_eq!(report["response"]["mode"], "sync");
    assert_eq!(report["response"]["context"], json!({"name": "config"}));
}

#[test]
fn test_simulate_async_route_with_params() {
    let table = RouteTable::parse(TABLE).unwrap();
    let report = simulate(&table, RouteMethod::Delete, "/files/42", None, Duration::from_secs(2), config()).unwrap();
    assert_eq!(report["status"], "completed");
    assert_eq!(report["suspended"], true);
    assert_eq!(report["response"]["mode"], "async");
    assert_eq!(report["response"]["params"]["id"], "42");
    assert_eq!(report["response"]["matched_path"], "/files/{id}");
}

#[test]
fn test_simulate_reports_failure_and_not_found() {
    let table = RouteTable::parse(TABLE).unwrap();
    let failed = simulate(&table, RouteMethod::Get, "/broken", None, Duration::from_secs(2), config()).unwrap();
    assert_eq!(failed["status"], "failed");
    assert_eq!(failed["error"], "disk on fire");

    let missing = simulate(&table, RouteMethod::Post, "/files/42", None, Duration::from_secs(2), config()).unwrap();
    assert_eq!(missing["status"], "not_found");
}
