use chrono::{SecondsFormat, Utc};
use tracing::warn;

use crate::commands::validator::ActionValidator;
use crate::error::RelayError;
use crate::security::ApiKey;
use crate::transport::{Command, CommandFields, MessageKind, Query, RequestId};

/// Current UTC time as ISO-8601 with a `Z` suffix.
pub fn utc_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Assembles a [`Command`], filling in a fresh request id and timestamp when absent.
#[derive(Debug, Clone, Default)]
pub struct CommandBuilder {
    action: String,
    fields: CommandFields,
    request_id: Option<RequestId>,
    timestamp: Option<String>,
}

impl CommandBuilder {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            ..Self::default()
        }
    }

    pub fn fields(mut self, fields: CommandFields) -> Self {
        self.fields = fields;
        self
    }

    pub fn xpath(mut self, xpath: impl Into<String>) -> Self {
        self.fields.xpath = Some(xpath.into());
        self
    }

    pub fn selector(mut self, selector: impl Into<String>) -> Self {
        self.fields.selector = Some(selector.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.fields.text = Some(text.into());
        self
    }

    pub fn coordinates(mut self, x: f64, y: f64) -> Self {
        self.fields.x = Some(x);
        self.fields.y = Some(y);
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.fields.url = Some(url.into());
        self
    }

    pub fn html(mut self, html: impl Into<String>) -> Self {
        self.fields.html = Some(html.into());
        self
    }

    pub fn script(mut self, script: impl Into<String>) -> Self {
        self.fields.script = Some(script.into());
        self
    }

    pub fn request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    pub fn timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    /// Fails only when the action is missing; field advice is logged, not enforced.
    pub fn build(self, api_key: &ApiKey) -> Result<Command, RelayError> {
        let action = self.action.trim();
        if action.is_empty() {
            return Err(RelayError::Precondition("command action is required".to_string()));
        }

        for warning in ActionValidator::default().review(action, &self.fields) {
            warn!(action = %action, "{}", warning);
        }

        Ok(Command {
            kind: MessageKind::Command,
            action: action.to_string(),
            request_id: self.request_id.unwrap_or_else(RequestId::generate),
            timestamp: self.timestamp.unwrap_or_else(utc_timestamp),
            api_key: api_key.clone(),
            fields: self.fields,
        })
    }
}

pub fn build(
    action: &str,
    fields: CommandFields,
    request_id: Option<RequestId>,
    api_key: &ApiKey,
) -> Result<Command, RelayError> {
    let mut builder = CommandBuilder::new(action).fields(fields);
    if let Some(id) = request_id {
        builder = builder.request_id(id);
    }
    builder.build(api_key)
}

pub fn query(request_id: RequestId, api_key: ApiKey) -> Query {
    Query {
        kind: MessageKind::Query,
        request_id,
        timestamp: utc_timestamp(),
        api_key,
    }
}
