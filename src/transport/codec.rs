use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::RelayError;
use crate::transport::Response;

/// `type` discriminator the service puts on wrapped responses.
pub const RESPONSE_ENVELOPE_TYPE: &str = "automation-response";

/// An inbound message with any `{type, payload}` envelope peeled off.
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    /// Outer `type` discriminator, when the sender set one.
    pub kind: Option<String>,
    /// Whether `body` came out of a `payload` wrapper.
    pub wrapped: bool,
    pub body: Map<String, Value>,
}

impl Inbound {
    pub fn is_response_envelope(&self) -> bool {
        self.wrapped && self.kind.as_deref() == Some(RESPONSE_ENVELOPE_TYPE)
    }
}

pub fn encode<T: Serialize>(message: &T) -> Result<String, RelayError> {
    serde_json::to_string(message)
        .map_err(|e| RelayError::Transport(format!("serialize outbound message: {e}")))
}

pub fn decode_inbound(text: &str) -> Result<Inbound, RelayError> {
    let value: Value = serde_json::from_str(text).map_err(|e| RelayError::Decode(e.to_string()))?;
    normalize(value)
}

/// Accept both the bare and the `payload`-wrapped layout.
pub fn normalize(value: Value) -> Result<Inbound, RelayError> {
    let Value::Object(mut outer) = value else {
        return Err(RelayError::Decode("expected a JSON object".to_string()));
    };
    let kind = outer.get("type").and_then(Value::as_str).map(str::to_owned);

    match outer.remove("payload") {
        Some(Value::Object(inner)) => Ok(Inbound {
            kind,
            wrapped: true,
            body: inner,
        }),
        Some(other) => {
            // A scalar payload is just another field of a bare message.
            outer.insert("payload".to_string(), other);
            Ok(Inbound {
                kind,
                wrapped: false,
                body: outer,
            })
        }
        None => Ok(Inbound {
            kind,
            wrapped: false,
            body: outer,
        }),
    }
}

pub fn decode_response(body: Map<String, Value>) -> Result<Response, RelayError> {
    serde_json::from_value(Value::Object(body)).map_err(|e| RelayError::Decode(e.to_string()))
}
