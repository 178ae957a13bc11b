//! Classification of inbound messages for exactly one in-flight request.
//!
//! The dispatcher is a small state machine: it starts in
//! [`ExchangeState::AwaitingResponse`] and moves to `Terminal` on the first message
//! that is recognisably the answer, or to `Interrupted` when the channel ends first.
//! Everything else is discarded and the wait goes on.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::transport::codec::{self, Inbound};
use crate::transport::{RequestId, Response};

/// How strictly answers are matched to the outstanding request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Correlation {
    /// Accept an answer without `requestId`; reject one carrying a different id.
    #[default]
    Lenient,
    /// Multiplexed channel: the answer must carry the expected `requestId`.
    Strict,
}

/// What the channel produced next.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    Text(String),
    Closed(Option<String>),
    Failed(String),
    TimedOut,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DiscardReason {
    Malformed(String),
    NotAResponse(Option<String>),
    OtherRequest(String),
    MissingRequestId,
    AlreadyTerminal,
}

impl fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscardReason::Malformed(e) => write!(f, "malformed: {e}"),
            DiscardReason::NotAResponse(Some(kind)) => write!(f, "not a response (type {kind})"),
            DiscardReason::NotAResponse(None) => f.write_str("not a response"),
            DiscardReason::OtherRequest(id) => write!(f, "answer for another request ({id})"),
            DiscardReason::MissingRequestId => f.write_str("answer without requestId"),
            DiscardReason::AlreadyTerminal => f.write_str("exchange already finished"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    Terminal(Response),
    Discard(DiscardReason),
    Interrupted(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExchangeState {
    AwaitingResponse,
    Terminal,
    Interrupted,
}

#[derive(Debug)]
pub struct ResponseDispatcher {
    expected: RequestId,
    correlation: Correlation,
    state: ExchangeState,
}

impl ResponseDispatcher {
    pub fn new(expected: RequestId, correlation: Correlation) -> Self {
        Self {
            expected,
            correlation,
            state: ExchangeState::AwaitingResponse,
        }
    }

    pub fn state(&self) -> &ExchangeState {
        &self.state
    }

    pub fn dispatch(&mut self, event: ChannelEvent) -> Disposition {
        if self.state != ExchangeState::AwaitingResponse {
            return Disposition::Discard(DiscardReason::AlreadyTerminal);
        }
        let disposition = match event {
            ChannelEvent::Text(text) => self.classify(&text),
            ChannelEvent::Closed(Some(reason)) if !reason.is_empty() => {
                Disposition::Interrupted(format!("channel closed: {reason}"))
            }
            ChannelEvent::Closed(_) => Disposition::Interrupted("channel closed".to_string()),
            ChannelEvent::Failed(e) => Disposition::Interrupted(format!("channel error: {e}")),
            ChannelEvent::TimedOut => {
                Disposition::Interrupted("deadline elapsed before an answer arrived".to_string())
            }
        };
        match &disposition {
            Disposition::Terminal(_) => self.state = ExchangeState::Terminal,
            Disposition::Interrupted(_) => self.state = ExchangeState::Interrupted,
            Disposition::Discard(_) => {}
        }
        disposition
    }

    /// Classify one raw frame without touching the state.
    pub fn classify(&self, text: &str) -> Disposition {
        match codec::decode_inbound(text) {
            Ok(inbound) => self.classify_inbound(inbound),
            Err(e) => Disposition::Discard(DiscardReason::Malformed(e.to_string())),
        }
    }

    pub fn classify_inbound(&self, inbound: Inbound) -> Disposition {
        if !looks_like_response(&inbound) {
            return Disposition::Discard(DiscardReason::NotAResponse(inbound.kind));
        }

        match inbound.body.get("requestId").and_then(Value::as_str) {
            Some(id) if id != self.expected.as_str() => {
                return Disposition::Discard(DiscardReason::OtherRequest(id.to_string()));
            }
            None if self.correlation == Correlation::Strict => {
                return Disposition::Discard(DiscardReason::MissingRequestId);
            }
            _ => {}
        }

        match codec::decode_response(inbound.body) {
            Ok(response) => Disposition::Terminal(response),
            Err(e) => Disposition::Discard(DiscardReason::Malformed(e.to_string())),
        }
    }
}

/// `action` + boolean `success`, or an `error`. A `success` flag alone is enough inside
/// an `automation-response` envelope.
fn looks_like_response(inbound: &Inbound) -> bool {
    let body: &Map<String, Value> = &inbound.body;
    let has_success = body.get("success").is_some_and(Value::is_boolean);
    let has_action = body.get("action").is_some_and(Value::is_string);
    let has_error = body.get("error").is_some_and(|e| !e.is_null());

    has_error || (has_success && (has_action || inbound.is_response_envelope()))
}
