//! Bridge envelope (JSON).
//!
//! Payload fields are opaque `serde_json::Value`s; the protocol only ever
//! looks at the envelope's own fields. Absent fields are omitted on the wire,
//! and an explicit `null` payload still counts as present.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{BridgeError, Result};

/// One wire message: either a call or a response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Envelope {
    /// Call payload.
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub data: Option<Value>,
    /// Remote handler name; absent routes to the default handler.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handler_name: Option<String>,
    /// Set when the sender wants a reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_id: Option<String>,
    /// Set when this envelope is a reply; equals the original `callbackId`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_id: Option<String>,
    /// Reply payload, present iff `responseId` is.
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub response_data: Option<Value>,
}

/// `Option<Value>` would read `null` as absent.
fn present<'de, D>(de: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(de).map(Some)
}

/// Inbound call.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub handler_name: Option<String>,
    pub data: Option<Value>,
    pub callback_id: Option<String>,
}

/// Reply to an earlier call.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub response_id: String,
    pub response_data: Value,
}

/// Classified envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Call(Call),
    Response(Response),
}

impl Envelope {
    /// Build a call envelope.
    pub fn call(
        handler_name: Option<String>,
        data: Option<Value>,
        callback_id: Option<String>,
    ) -> Self {
        Self {
            data,
            handler_name,
            callback_id,
            ..Self::default()
        }
    }

    /// Build a response envelope.
    pub fn response(response_id: impl Into<String>, response_data: Value) -> Self {
        Self {
            response_id: Some(response_id.into()),
            response_data: Some(response_data),
            ..Self::default()
        }
    }

    pub fn is_response(&self) -> bool {
        self.response_id.is_some() && self.response_data.is_some()
    }

    /// Classify into a call or a response.
    ///
    /// A response must carry both `responseId` and `responseData` and nothing
    /// call-shaped. A call must carry neither response field.
    pub fn into_message(self) -> Result<Message> {
        match (self.response_id, self.response_data) {
            (Some(response_id), Some(response_data)) => {
                if self.handler_name.is_some() || self.callback_id.is_some() {
                    return Err(BridgeError::MalformedEnvelope(format!(
                        "response {response_id} also carries call fields"
                    )));
                }
                Ok(Message::Response(Response {
                    response_id,
                    response_data,
                }))
            }
            (None, None) => Ok(Message::Call(Call {
                handler_name: self.handler_name,
                data: self.data,
                callback_id: self.callback_id,
            })),
            (Some(id), None) => Err(BridgeError::MalformedEnvelope(format!(
                "responseId {id} without responseData"
            ))),
            (None, Some(_)) => Err(BridgeError::MalformedEnvelope(
                "responseData without responseId".into(),
            )),
        }
    }
}

impl std::fmt::Display for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => f.write_str(&s),
            Err(_) => write!(f, "{self:?}"),
        }
    }
}
