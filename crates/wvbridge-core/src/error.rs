//! Shared error type across wvbridge crates.

use thiserror::Error;

/// Stable error codes used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Envelope could not be decoded or has neither shape.
    MalformedEnvelope,
    /// Signal token from the guest was not recognized.
    UnroutableSignal,
    /// Response for an unknown or expired correlation id.
    UnresolvedCallback,
    /// Inbound call with no handler to route to.
    NoHandlerForCall,
    /// A handler failed while processing a call.
    HandlerThrew,
    /// Guest bridge initialized twice.
    DoubleInitialization,
    /// Script evaluation failed or the counterpart is gone.
    Transport,
    /// Operation on a destroyed bridge.
    Destroyed,
    /// Invalid configuration.
    InvalidConfig,
    /// Unsupported config version.
    UnsupportedVersion,
    /// Internal error.
    Internal,
}

impl ErrorCode {
    /// String representation used in logs and test vectors.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::MalformedEnvelope => "MALFORMED_ENVELOPE",
            ErrorCode::UnroutableSignal => "UNROUTABLE_SIGNAL",
            ErrorCode::UnresolvedCallback => "UNRESOLVED_CALLBACK",
            ErrorCode::NoHandlerForCall => "NO_HANDLER_FOR_CALL",
            ErrorCode::HandlerThrew => "HANDLER_THREW",
            ErrorCode::DoubleInitialization => "DOUBLE_INITIALIZATION",
            ErrorCode::Transport => "TRANSPORT",
            ErrorCode::Destroyed => "DESTROYED",
            ErrorCode::InvalidConfig => "INVALID_CONFIG",
            ErrorCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Unified error type used by core, guest and host.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),
    #[error("unroutable signal: {0}")]
    UnroutableSignal(String),
    #[error("no pending callback for response id {0}")]
    UnresolvedCallback(String),
    #[error("no handler for message: {envelope}")]
    NoHandlerForCall { envelope: String },
    #[error("handler threw: {0}")]
    HandlerThrew(String),
    #[error("bridge init called twice")]
    DoubleInitialization,
    #[error("transport: {0}")]
    Transport(String),
    #[error("bridge destroyed")]
    Destroyed,
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl BridgeError {
    /// Map an error to its stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            BridgeError::MalformedEnvelope(_) => ErrorCode::MalformedEnvelope,
            BridgeError::UnroutableSignal(_) => ErrorCode::UnroutableSignal,
            BridgeError::UnresolvedCallback(_) => ErrorCode::UnresolvedCallback,
            BridgeError::NoHandlerForCall { .. } => ErrorCode::NoHandlerForCall,
            BridgeError::HandlerThrew(_) => ErrorCode::HandlerThrew,
            BridgeError::DoubleInitialization => ErrorCode::DoubleInitialization,
            BridgeError::Transport(_) => ErrorCode::Transport,
            BridgeError::Destroyed => ErrorCode::Destroyed,
            BridgeError::InvalidConfig(_) => ErrorCode::InvalidConfig,
            BridgeError::UnsupportedVersion => ErrorCode::UnsupportedVersion,
            BridgeError::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Faults that originate from the counterpart or the channel. These are
    /// contained and logged; they never stop a dispatch loop.
    pub fn is_contained(&self) -> bool {
        matches!(
            self,
            BridgeError::MalformedEnvelope(_)
                | BridgeError::UnroutableSignal(_)
                | BridgeError::UnresolvedCallback(_)
                | BridgeError::HandlerThrew(_)
                | BridgeError::Transport(_)
        )
    }
}
