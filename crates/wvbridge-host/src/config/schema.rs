use std::net::SocketAddr;

use serde::Deserialize;
use wvbridge_core::error::{BridgeError, Result};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostConfig {
    pub version: u32,

    #[serde(default)]
    pub bridge: BridgeSection,

    #[serde(default)]
    pub transport: TransportSection,
}

impl HostConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(BridgeError::UnsupportedVersion);
        }
        self.bridge.validate()?;
        self.transport.validate()?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeSection {
    #[serde(default = "default_eval_timeout_ms")]
    pub eval_timeout_ms: u64,
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            eval_timeout_ms: default_eval_timeout_ms(),
        }
    }
}

impl BridgeSection {
    pub fn validate(&self) -> Result<()> {
        if !(100..=60000).contains(&self.eval_timeout_ms) {
            return Err(BridgeError::InvalidConfig(
                "bridge.eval_timeout_ms must be between 100 and 60000".into(),
            ));
        }
        Ok(())
    }
}

fn default_eval_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// In-process guest runtime on its own thread.
    #[default]
    Loopback,
    /// Browser page connected over WebSocket.
    Websocket,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransportSection {
    #[serde(default)]
    pub kind: TransportKind,

    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for TransportSection {
    fn default() -> Self {
        Self {
            kind: TransportKind::default(),
            listen: default_listen(),
        }
    }
}

impl TransportSection {
    pub fn validate(&self) -> Result<()> {
        self.listen_addr().map(|_| ())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen.parse().map_err(|e| {
            BridgeError::InvalidConfig(format!("transport.listen must be a SocketAddr: {e}"))
        })
    }
}

fn default_listen() -> String {
    "127.0.0.1:8790".into()
}
