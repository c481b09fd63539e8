//! Echo handlers used by the CLI `simulate` command and the benches.
//!
//! Both bodies answer with a JSON description of what they served. The route
//! context drives test behaviour:
//!
//! - `"fail": "<message>"` - return a handler failure with that message
//! - `"delay_ms": <n>` - async only: sleep on the coroutine first, checking
//!   for cancellation between 1ms steps

use crate::dispatcher::AsyncCall;
use crate::error::HandlerFailure;
use crate::route::Route;
use crate::transport::LocalExchange;
use serde_json::{json, Value};
use std::time::Duration;

fn failure_from_context(context: &Value) -> Result<(), HandlerFailure> {
    match context.get("fail") {
        Some(Value::String(message)) => Err(HandlerFailure::msg(message.clone())),
        Some(other) => Err(HandlerFailure::msg(other.to_string())),
        None => Ok(()),
    }
}

fn describe(mode: &str, exchange: &LocalExchange<Value>, route: &Route<Value>) -> Value {
    let params: serde_json::Map<String, Value> = exchange
        .path_params()
        .iter()
        .map(|(name, value)| (name.to_string(), Value::String(value.clone())))
        .collect();

    json!({
        "mode": mode,
        "route_id": route.id().to_string(),
        "operation": exchange.operation().as_str(),
        "method": exchange.request_method().as_str(),
        "path": exchange.path(),
        "matched_path": exchange.matched_path(),
        "params": params,
        "body": exchange.body(),
        "context": route.context(),
    })
}

/// Sync echo handler
///
/// # Errors
///
/// Fails when the route context carries `"fail"`.
pub fn echo_sync(exchange: &LocalExchange<Value>, route: &Route<Value>) -> Result<Value, HandlerFailure> {
    failure_from_context(route.context())?;
    Ok(describe("sync", exchange, route))
}

/// Async echo handler
///
/// # Errors
///
/// Fails when the route context carries `"fail"`, or with
/// [`HandlerFailure::Cancelled`] if shutdown starts during the delay.
pub fn echo_async(call: AsyncCall<Value, LocalExchange<Value>>) -> Result<Value, HandlerFailure> {
    let delay = call
        .route
        .context()
        .get("delay_ms")
        .and_then(Value::as_u64)
        .unwrap_or(0);
    for _ in 0..delay {
        call.check_cancelled()?;
        may::coroutine::sleep(Duration::from_millis(1));
    }

    failure_from_context(call.route.context())?;
    let mut reply = describe("async", &call.exchange, &call.route);
    reply["dispatch_id"] = Value::String(call.dispatch_id.to_string());
    Ok(reply)
}
