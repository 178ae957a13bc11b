pub mod codec;
pub mod dispatcher;
pub mod http_polling;
pub mod websocket;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

use crate::error::RelayError;
use crate::security::ApiKey;

/// Correlation key shared by a command, its status queries and its answer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Fresh random (v4, 122 bits of entropy) identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn parse(raw: impl Into<String>) -> Result<Self, RelayError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(RelayError::Precondition("requestId must not be empty".to_string()));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Command,
    Query,
}

/// Optional command parameters. Unset fields are omitted from the wire, never sent as null.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xpath: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub action: String,
    pub request_id: RequestId,
    pub timestamp: String,
    pub api_key: ApiKey,
    #[serde(flatten)]
    pub fields: CommandFields,
}

/// "Is the answer for this id ready?"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub request_id: RequestId,
    pub timestamp: String,
    pub api_key: ApiKey,
}

/// Screenshot as sent by the extension: a (data-URI or bare) base64 string, or `{ "data": .. }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Screenshot {
    Encoded(String),
    Wrapped { data: String },
}

impl Screenshot {
    pub fn as_str(&self) -> &str {
        match self {
            Screenshot::Encoded(s) => s,
            Screenshot::Wrapped { data } => data,
        }
    }
}

/// Terminal answer for one request, produced by the service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<RequestId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<Screenshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Response {
    pub fn action_name(&self) -> &str {
        self.action.as_deref().unwrap_or("unknown")
    }

    /// A present `error` makes the exchange a reported failure, whatever `success` says.
    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }

    pub fn check(&self) -> Result<(), RelayError> {
        match &self.error {
            Some(error) => Err(RelayError::RemoteReported {
                action: self.action_name().to_string(),
                error: error.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// How an answer reaches the client, independent of what identifies it.
#[async_trait]
pub trait ResultSource: Send {
    fn label(&self) -> &'static str;

    /// Wait at most `deadline` for the terminal response to `request_id`.
    async fn await_result(
        &mut self,
        request_id: &RequestId,
        deadline: Duration,
    ) -> Result<Response, RelayError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn generated_ids_are_unique_and_non_empty() {
        let a = RequestId::generate();
        let b = RequestId::generate();
        assert!(!a.as_str().is_empty());
        assert_ne!(a, b);
    }

    #[test]
    fn blank_request_id_is_rejected() {
        assert!(RequestId::parse("").is_err());
        assert_eq!(RequestId::parse("req-1").unwrap().to_string(), "req-1");
    }

    #[test]
    fn response_keeps_unknown_fields() {
        let r: Response = serde_json::from_value(json!({
            "success": true,
            "action": "getHtml",
            "title": "Example"
        }))
        .unwrap();
        assert_eq!(r.extra.get("title"), Some(&json!("Example")));
        assert!(r.check().is_ok());
    }

    #[test]
    fn error_field_makes_failure_even_with_partial_html() {
        let r: Response = serde_json::from_value(json!({
            "success": false,
            "action": "getHtml",
            "error": "frame detached",
            "html": "<html></html>"
        }))
        .unwrap();
        assert!(r.is_failure());
        assert!(r.html.is_some());
        match r.check() {
            Err(RelayError::RemoteReported { action, error }) => {
                assert_eq!(action, "getHtml");
                assert_eq!(error, "frame detached");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn screenshot_accepts_both_shapes() {
        let s: Screenshot = serde_json::from_value(json!("data:image/png;base64,AAAA")).unwrap();
        assert_eq!(s.as_str(), "data:image/png;base64,AAAA");
        let w: Screenshot = serde_json::from_value(json!({"data": "AAAA"})).unwrap();
        assert_eq!(w.as_str(), "AAAA");
    }
}
