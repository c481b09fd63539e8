//! Tests for route table files and the echo handlers driven by them

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use common::runtime::setup_may_runtime;
use reactive_routing::dispatcher::DispatchEngine;
use reactive_routing::echo::{echo_async, echo_sync};
use reactive_routing::error::{HandlerFailure, TransportError};
use reactive_routing::route::{RouteMethod, Routes};
use reactive_routing::route_table::RouteTable;
use reactive_routing::runtime_config::RuntimeConfig;
use reactive_routing::transport::{LocalExchange, LocalTransport};
use serde_json::{json, Value};
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

const TABLE: &str = r#"
- path: /files/*
  methods: [get]
  context: {name: catch_all}
- path: /files/config
  methods: [get]
  context: {name: config}
- path: /jobs/{id}
  methods: [post]
  async: true
  context: {name: job, delay_ms: 5}
- path: /jobs/{id}/cancel
  methods: [post]
  async: true
  context: {fail: "job is locked"}
- path: /slow
  methods: [get]
  async: true
  context: {delay_ms: 10000}
"#;

fn write_table(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn echo_engine(table: &RouteTable) -> (DispatchEngine<Value, LocalExchange<Value>>, LocalTransport<Value>) {
    setup_may_runtime();
    let mut engine = DispatchEngine::<Value, LocalExchange<Value>>::builder(echo_sync, echo_async)
        .config(RuntimeConfig::default().with_shutdown_grace(Duration::from_millis(500)))
        .build();
    engine.register_route_source(table).unwrap();
    let mut transport = LocalTransport::new();
    engine.attach_to(&mut transport).unwrap();
    (engine, transport)
}

#[test]
fn test_load_from_file() {
    let file = write_table(TABLE);
    let table = RouteTable::load(file.path()).unwrap();
    assert_eq!(table.len(), 5);
    assert!(table.routes().iter().any(|r| r.is_async()));
}

#[test]
fn test_load_reports_path_and_cause() {
    let file = write_table("- path: files\n  methods: [GET]\n");
    let err = RouteTable::load(file.path()).unwrap_err();
    let text = format!("{err:#}");
    assert!(text.contains("Invalid route table"));
    assert!(text.contains("path must start with `/`"));

    let missing = RouteTable::load("/definitely/not/here.yaml").unwrap_err();
    assert!(format!("{missing:#}").contains("Failed to read route table"));
}

#[test]
fn test_config_served_by_own_route() {
    let table = RouteTable::parse(TABLE).unwrap();
    let (_engine, transport) = echo_engine(&table);
    let timeout = Duration::from_secs(2);

    let config = transport.handle(RouteMethod::Get, "/files/config", None).wait(timeout).unwrap();
    assert_eq!(config["context"]["name"], "config");
    assert_eq!(config["mode"], "sync");

    let other = transport.handle(RouteMethod::Get, "/files/other", None).wait(timeout).unwrap();
    assert_eq!(other["context"]["name"], "catch_all");
    assert_eq!(other["matched_path"], "/files/*");
}

#[test]
fn test_async_echo_carries_params_and_body() {
    let table = RouteTable::parse(TABLE).unwrap();
    let (_engine, transport) = echo_engine(&table);

    let outcome = transport.handle(RouteMethod::Post, "/jobs/9", Some(json!({"priority": 1})));
    assert!(outcome.is_suspended());
    let reply = outcome.wait(Duration::from_secs(2)).unwrap();
    assert_eq!(reply["mode"], "async");
    assert_eq!(reply["params"]["id"], "9");
    assert_eq!(reply["body"], json!({"priority": 1}));
    assert!(reply["dispatch_id"].as_str().is_some());
}

#[test]
fn test_async_echo_failure_from_context() {
    let table = RouteTable::parse(TABLE).unwrap();
    let (_engine, transport) = echo_engine(&table);

    match transport.handle(RouteMethod::Post, "/jobs/9/cancel", None).wait(Duration::from_secs(2)) {
        Err(TransportError::Handler(failure)) => assert_eq!(failure.to_string(), "job is locked"),
        other => panic!("expected handler failure, got {other:?}"),
    }
}

#[test]
fn test_slow_echo_stops_on_shutdown() {
    let table = RouteTable::parse(TABLE).unwrap();
    let (engine, transport) = echo_engine(&table);

    let outcome = transport.handle(RouteMethod::Get, "/slow", None);
    let report = engine.shutdown();
    assert_eq!(report.drained, 1);

    match outcome.wait(Duration::from_secs(2)) {
        Err(TransportError::Handler(HandlerFailure::Cancelled { .. })) => {}
        other => panic!("expected cancelled, got {other:?}"),
    }
}
