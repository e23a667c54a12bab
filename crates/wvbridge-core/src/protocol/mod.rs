//! Protocol modules.
//!
//! - `envelope`: the wire message and its call/response classification.
//! - `codec`: JSON encoding, batch decoding and the script-literal escaping
//!   used for host -> guest delivery.
//! - `signal`: the payload-less `scheme://token` notification the guest uses
//!   to poke the host.
//! - `script`: the expressions the host evaluates inside the guest.
//!
//! All parsers are panic-free: anything malformed from the counterpart is
//! reported as `BridgeError`.

pub mod codec;
pub mod envelope;
pub mod script;
pub mod signal;

pub use envelope::{Call, Envelope, Message, Response};
pub use signal::Signal;

/// Global name of the guest-side bridge object.
pub const BRIDGE_OBJECT: &str = "WebViewJavascriptBridge";

/// Scheme of the guest -> host signal token.
pub const SIGNAL_SCHEME: &str = "wvjbscheme";

/// Token announcing that the guest outbound queue has message(s).
pub const QUEUE_HAS_MESSAGE: &str = "__WVJB_QUEUE_MESSAGE__";

/// Prefix of generated correlation ids.
pub const CALLBACK_ID_PREFIX: &str = "cb_";
