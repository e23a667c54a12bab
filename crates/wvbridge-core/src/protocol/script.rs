//! Script expressions the host evaluates inside the guest runtime.
//!
//! The host -> guest primitive is "evaluate this expression and maybe give me
//! a string back"; these are the only expressions the protocol ever sends.
//! `ScriptCommand::parse` is the guest-side view of the same vocabulary.

use crate::error::Result;
use crate::protocol::codec::{encode_for_guest, unescape_script_literal};
use crate::protocol::envelope::Envelope;

/// Feature probe. Evaluates to `"true"` once the bridge object exists.
pub const PROBE: &str = "typeof WebViewJavascriptBridge == 'object'";

/// Drains the guest outbound queue, returning a JSON array.
pub const FETCH_QUEUE: &str = "WebViewJavascriptBridge._fetchQueue();";

const DELIVER_PREFIX: &str = "WebViewJavascriptBridge._handleMessageFromNative('";
const DELIVER_SUFFIX: &str = "');";

/// Self-registering guest bridge, injected when the probe reports it absent.
pub const BOOTSTRAP: &str = include_str!("../../assets/bridge.js");

/// Expression delivering one envelope to the guest.
pub fn deliver(env: &Envelope) -> Result<String> {
    let literal = encode_for_guest(env)?;
    Ok(format!("{DELIVER_PREFIX}{literal}{DELIVER_SUFFIX}"))
}

/// A host expression as understood by a guest runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptCommand {
    Probe,
    Bootstrap,
    FetchQueue,
    /// Unescaped envelope JSON.
    Deliver(String),
}

impl ScriptCommand {
    /// Recognize a host expression. `Ok(None)` for anything foreign.
    pub fn parse(script: &str) -> Result<Option<ScriptCommand>> {
        let script = script.trim();
        if script == PROBE {
            return Ok(Some(ScriptCommand::Probe));
        }
        if script == FETCH_QUEUE {
            return Ok(Some(ScriptCommand::FetchQueue));
        }
        if script == BOOTSTRAP.trim() {
            return Ok(Some(ScriptCommand::Bootstrap));
        }
        if let Some(body) = script
            .strip_prefix(DELIVER_PREFIX)
            .and_then(|s| s.strip_suffix(DELIVER_SUFFIX))
        {
            return unescape_script_literal(body).map(|json| Some(ScriptCommand::Deliver(json)));
        }
        Ok(None)
    }
}
