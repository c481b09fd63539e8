//! Tests for the in-process transport

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use common::runtime::setup_may_runtime;
use reactive_routing::dispatcher::{Dispatch, PendingResult};
use reactive_routing::error::{HandlerFailure, TransportError};
use reactive_routing::route::RouteMethod;
use reactive_routing::transport::{Exchange, LocalExchange, LocalTransport, RouteHandler, Transport};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Ex = LocalExchange<String>;

fn reply(text: &'static str) -> RouteHandler<Ex> {
    Arc::new(move |_exchange: &Ex| Ok(Dispatch::Completed(text.to_string())))
}

#[test]
fn test_first_registered_match_wins() {
    let mut transport = LocalTransport::new();
    transport.register_handler(RouteMethod::Get, "/files/config", reply("config"));
    transport.register_handler(RouteMethod::Get, "/files/*", reply("catch-all"));

    let timeout = Duration::from_millis(100);
    assert_eq!(
        transport.handle(RouteMethod::Get, "/files/config", None).wait(timeout).unwrap(),
        "config"
    );
    assert_eq!(
        transport.handle(RouteMethod::Get, "/files/other", None).wait(timeout).unwrap(),
        "catch-all"
    );
}

#[test]
fn test_method_must_match() {
    let mut transport = LocalTransport::new();
    transport.register_handler(RouteMethod::Get, "/items", reply("items"));

    match transport.handle(RouteMethod::Post, "/items", None).wait(Duration::ZERO) {
        Err(TransportError::NotFound { method, path }) => {
            assert_eq!(method, RouteMethod::Post);
            assert_eq!(path, "/items");
        }
        other => panic!("expected not found, got {other:?}"),
    }
}

#[test]
fn test_exchange_exposes_request_details() {
    let seen = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&seen);
    let mut transport: LocalTransport<String> = LocalTransport::new();
    transport.register_handler(
        RouteMethod::Put,
        "/users/{user}/posts/:post",
        Arc::new(move |exchange: &Ex| {
            *sink.lock().unwrap() = Some(json!({
                "operation": exchange.operation().as_str(),
                "is_http": exchange.is_http_method(),
                "path": exchange.path(),
                "matched": exchange.matched_path(),
                "user": exchange.path_param("user"),
                "post": exchange.path_param("post"),
                "missing": exchange.path_param("nope"),
                "body": exchange.body(),
            }));
            Ok(Dispatch::Completed("ok".to_string()))
        }),
    );

    transport
        .handle(RouteMethod::Put, "/users/7/posts/abc", Some(json!({"title": "hi"})))
        .wait(Duration::ZERO)
        .unwrap();

    assert_eq!(
        seen.lock().unwrap().clone().unwrap(),
        json!({
            "operation": "PUT",
            "is_http": true,
            "path": "/users/7/posts/abc",
            "matched": "/users/{user}/posts/:post",
            "user": "7",
            "post": "abc",
            "missing": null,
            "body": {"title": "hi"},
        })
    );
}

#[test]
fn test_hooks_wrap_main_handler() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let record = |label: &'static str| -> RouteHandler<Ex> {
        let order = Arc::clone(&order);
        Arc::new(move |exchange: &Ex| {
            order
                .lock()
                .unwrap()
                .push(format!("{label}:{}:{}", exchange.operation(), exchange.request_method()));
            Ok(Dispatch::Completed(label.to_string()))
        })
    };

    let mut transport = LocalTransport::new();
    transport.register_handler(RouteMethod::Before, "/*", record("before"));
    transport.register_handler(RouteMethod::Get, "/page", record("main"));
    transport.register_handler(RouteMethod::After, "/page", record("after"));
    transport.register_handler(RouteMethod::After, "/other", record("unrelated"));

    let body = transport
        .handle(RouteMethod::Get, "/page", None)
        .wait(Duration::ZERO)
        .unwrap();
    assert_eq!(body, "main");
    assert_eq!(
        *order.lock().unwrap(),
        ["before:BEFORE:GET", "main:GET:GET", "after:AFTER:GET"]
    );
}

#[test]
fn test_failing_before_hook_ends_request() {
    let main_ran = Arc::new(Mutex::new(false));
    let flag = Arc::clone(&main_ran);

    let mut transport = LocalTransport::new();
    transport.register_handler(
        RouteMethod::Before,
        "/secure/*",
        Arc::new(|_exchange: &Ex| Err(HandlerFailure::msg("unauthorized"))),
    );
    transport.register_handler(
        RouteMethod::Get,
        "/secure/data",
        Arc::new(move |_exchange: &Ex| {
            *flag.lock().unwrap() = true;
            Ok(Dispatch::Completed("data".to_string()))
        }),
    );

    let err = transport
        .handle(RouteMethod::Get, "/secure/data", None)
        .wait(Duration::ZERO)
        .unwrap_err();
    assert_eq!(err.to_string(), "unauthorized");
    assert!(!*main_ran.lock().unwrap());
}

#[test]
fn test_suspended_response_times_out_then_resolves() {
    setup_may_runtime();
    let pending: PendingResult<String> = PendingResult::new();
    let handle = pending.clone();

    let mut transport = LocalTransport::new();
    transport.register_handler(
        RouteMethod::Get,
        "/later",
        Arc::new(move |exchange: &Ex| {
            exchange.suspend_response_until(handle.clone());
            Ok(Dispatch::Suspended(handle.clone()))
        }),
    );

    match transport.handle(RouteMethod::Get, "/later", None).wait(Duration::from_millis(10)) {
        Err(TransportError::TimedOut { id, timeout_ms }) => {
            assert_eq!(id, pending.id());
            assert_eq!(timeout_ms, 10);
        }
        other => panic!("expected timeout, got {other:?}"),
    }

    let outcome = transport.handle(RouteMethod::Get, "/later", None);
    assert!(outcome.is_suspended());
    pending.complete("done".to_string()).unwrap();
    assert_eq!(outcome.wait(Duration::from_secs(1)).unwrap(), "done");
}

#[test]
fn test_registrations_keep_order() {
    let mut transport = LocalTransport::new();
    transport.register_handler(RouteMethod::Get, "/b", reply("b"));
    transport.register_handler(RouteMethod::Delete, "/a", reply("a"));
    assert_eq!(transport.len(), 2);
    assert_eq!(
        transport.registrations(),
        [
            (RouteMethod::Get, "/b".to_string()),
            (RouteMethod::Delete, "/a".to_string()),
        ]
    );
}
