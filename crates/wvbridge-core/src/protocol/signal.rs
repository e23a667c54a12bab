//! Guest -> host signal token (`<scheme>://<token>`).
//!
//! The signal carries no payload. Matching is exact on the parsed scheme
//! (ASCII case-insensitive, as URI schemes are) and the token; anything after
//! the token (`/path`, `?query`, `#fragment`) is ignored.

use std::fmt;

use crate::error::{BridgeError, Result};
use crate::protocol::{QUEUE_HAS_MESSAGE, SIGNAL_SCHEME};

/// Recognized signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// The guest outbound queue holds message(s); the host should pull it.
    QueueHasMessage,
}

impl Signal {
    pub fn token(self) -> &'static str {
        match self {
            Signal::QueueHasMessage => QUEUE_HAS_MESSAGE,
        }
    }

    /// Parse a raw notification value.
    ///
    /// - `Ok(None)`: empty, or not in our scheme (someone else's notify)
    /// - `Ok(Some(_))`: recognized signal
    /// - `Err(UnroutableSignal)`: our scheme with an unknown token
    pub fn parse(raw: &str) -> Result<Option<Signal>> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        let Some((scheme, rest)) = raw.split_once("://") else {
            return Ok(None);
        };
        if !scheme.eq_ignore_ascii_case(SIGNAL_SCHEME) {
            return Ok(None);
        }
        let token = rest
            .split(|c| matches!(c, '/' | '?' | '#'))
            .next()
            .unwrap_or_default();
        if token == QUEUE_HAS_MESSAGE {
            Ok(Some(Signal::QueueHasMessage))
        } else {
            Err(BridgeError::UnroutableSignal(format!("{SIGNAL_SCHEME}://{rest}")))
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SIGNAL_SCHEME}://{}", self.token())
    }
}
