//! Side-agnostic dispatch steps.
//!
//! Both halves classify inbound envelopes the same way: responses resolve a
//! pending continuation, calls resolve a handler. What differs per side is
//! the responder handed to the handler and where its reply is queued, so
//! `route` stops at "here is the handler" and leaves invocation to the
//! caller, which runs it through [`guarded`].

use std::panic::{catch_unwind, AssertUnwindSafe};

use serde_json::Value;

use crate::error::{BridgeError, Result};
use crate::protocol::envelope::{Call, Envelope, Message, Response};
use crate::registry::{CallbackRegistry, HandlerRegistry};

/// Outcome of routing one inbound envelope.
#[derive(Debug)]
pub enum Routed<H> {
    /// Response matched a pending continuation, which has run.
    Resolved { response_id: String },
    /// Response for an id nobody is waiting on; dropped.
    Unresolved { response_id: String },
    /// Call bound to a local handler; the caller invokes it.
    Call {
        handler: H,
        data: Option<Value>,
        callback_id: Option<String>,
    },
}

/// Classify `env` and resolve it against the registries.
///
/// Errors:
/// - `MalformedEnvelope` if the envelope is neither a call nor a response
/// - `NoHandlerForCall` if a call names an unknown handler, or names none
///   and no default handler is set
/// - `HandlerThrew` if a response continuation panicked (it is removed
///   regardless)
pub fn route<H, C>(
    callbacks: &CallbackRegistry<C>,
    handlers: &HandlerRegistry<H>,
    env: Envelope,
) -> Result<Routed<H>>
where
    H: Clone,
    C: FnOnce(Value),
{
    match env.into_message()? {
        Message::Response(Response {
            response_id,
            response_data,
        }) => match callbacks.take(&response_id) {
            Some(continuation) => {
                guarded(|| {
                    continuation(response_data);
                    Ok(())
                })?;
                Ok(Routed::Resolved { response_id })
            }
            None => {
                tracing::debug!(%response_id, "response for unknown callback id dropped");
                Ok(Routed::Unresolved { response_id })
            }
        },
        Message::Call(Call {
            handler_name,
            data,
            callback_id,
        }) => match handlers.resolve(handler_name.as_deref()) {
            Some(handler) => Ok(Routed::Call {
                handler,
                data,
                callback_id,
            }),
            None => Err(BridgeError::NoHandlerForCall {
                envelope: Envelope::call(handler_name, data, callback_id).to_string(),
            }),
        },
    }
}

/// Build an outbound call. A correlation id is allocated only when a
/// continuation is supplied.
pub fn outbound_call<C>(
    callbacks: &CallbackRegistry<C>,
    handler_name: Option<String>,
    data: Option<Value>,
    on_response: Option<C>,
) -> Envelope {
    let callback_id = on_response.map(|c| callbacks.allocate(c));
    Envelope::call(handler_name.filter(|n| !n.is_empty()), data, callback_id)
}

/// Reply payload for a responder finished without one.
pub fn empty_reply() -> Value {
    Value::String(String::new())
}

/// Run handler code, turning both `Err` and panics into `HandlerThrew` so a
/// bad handler cannot unwind through a delivery loop.
pub fn guarded<F>(f: F) -> Result<()>
where
    F: FnOnce() -> Result<()>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(BridgeError::HandlerThrew(msg))) => Err(BridgeError::HandlerThrew(msg)),
        Ok(Err(e)) => Err(BridgeError::HandlerThrew(e.to_string())),
        Err(panic) => {
            let msg = panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "panic".to_string());
            Err(BridgeError::HandlerThrew(msg))
        }
    }
}
