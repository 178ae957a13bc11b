use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, trace, warn};

use crate::commands::builder;
use crate::commands::timeout::Deadline;
use crate::error::RelayError;
use crate::security::ApiKey;
use crate::transport::codec;
use crate::transport::{Command, Query, RequestId, Response, ResultSource};

#[derive(Debug, Deserialize)]
struct SubmitAck {
    #[serde(rename = "requestId")]
    request_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnswerBody {
    #[serde(default)]
    success: bool,
    answer: Option<Value>,
}

/// One status query against the service's answer store.
#[async_trait]
pub trait AnswerFetcher: Send + Sync {
    /// `Ok(None)` means "not ready yet".
    async fn fetch_answer(&self, query: &Query) -> Result<Option<Response>, RelayError>;
}

/// REST client for `POST /command` and `GET /command/{id}/answer`.
#[derive(Debug, Clone)]
pub struct HttpPolling {
    client: Client,
    base_url: Url,
    request_timeout: Duration,
}

impl HttpPolling {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, RelayError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| RelayError::Precondition(format!("invalid API url {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(RelayError::Precondition(format!("invalid API url {base_url}")));
        }
        let client = Client::builder()
            .connect_timeout(request_timeout)
            .build()
            .map_err(|e| RelayError::Transport(format!("building http client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            request_timeout,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn classify(&self, url: &Url, e: reqwest::Error) -> RelayError {
        if e.is_connect() {
            RelayError::Connection {
                endpoint: url.to_string(),
                reason: e.to_string(),
            }
        } else {
            RelayError::Transport(format!("{url}: {e}"))
        }
    }

    /// Enqueue `command` server-side. The id the server echoes back wins.
    pub async fn submit(&self, command: &Command) -> Result<RequestId, RelayError> {
        let url = self.endpoint(&["command"]);
        let body = codec::encode(command)?;

        debug!(url = %url, request_id = %command.request_id, action = %command.action, "submitting command");

        let resp = self
            .client
            .post(url.clone())
            .timeout(self.request_timeout)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| self.classify(&url, e))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| RelayError::Transport(format!("read submit response: {e}")))?;

        if status != StatusCode::OK {
            debug!(status_code = %status.as_u16(), body = %text, "command rejected");
            return Err(RelayError::Rejected {
                status: status.as_u16(),
                body: text,
            });
        }

        let ack: SubmitAck =
            serde_json::from_str(&text).map_err(|e| RelayError::Decode(format!("submit ack: {e}")))?;

        match ack.request_id.filter(|id| !id.trim().is_empty()) {
            Some(id) if id != command.request_id.as_str() => {
                warn!(client_id = %command.request_id, server_id = %id, "server assigned a different requestId");
                RequestId::parse(id)
            }
            Some(_) => Ok(command.request_id.clone()),
            None => {
                debug!(request_id = %command.request_id, "server did not echo a requestId");
                Ok(command.request_id.clone())
            }
        }
    }

    async fn get_answer(&self, query: &Query) -> Result<Option<Response>, RelayError> {
        let url = self.endpoint(&["command", query.request_id.as_str(), "answer"]);

        trace!(url = %url, request_id = %query.request_id, "sending status query");

        let resp = self
            .client
            .get(url.clone())
            .timeout(self.request_timeout)
            .query(&[("apiKey", query.api_key.expose())])
            .send()
            .await;

        let resp = match resp {
            Ok(resp) => resp,
            Err(e) if e.is_timeout() => {
                debug!(request_id = %query.request_id, "status query timed out; treating as not ready");
                return Ok(None);
            }
            Err(e) => return Err(self.classify(&url, e)),
        };

        match resp.status() {
            StatusCode::OK => {
                let text = resp
                    .text()
                    .await
                    .map_err(|e| RelayError::Transport(format!("read answer body: {e}")))?;
                let body: AnswerBody = serde_json::from_str(&text)
                    .map_err(|e| RelayError::Decode(format!("answer body: {e}")))?;

                match (body.success, body.answer) {
                    (true, Some(answer)) if !answer.is_null() => {
                        let inbound = codec::normalize(answer)?;
                        codec::decode_response(inbound.body).map(Some)
                    }
                    _ => {
                        trace!(request_id = %query.request_id, "answer not ready");
                        Ok(None)
                    }
                }
            }
            StatusCode::NOT_FOUND => {
                trace!(request_id = %query.request_id, "no stored answer yet (404)");
                Ok(None)
            }
            code => {
                let body = resp
                    .text()
                    .await
                    .unwrap_or_else(|_| "<failed to read body>".to_string());
                Err(RelayError::Transport(format!(
                    "unexpected status: {} | body: {}",
                    code.as_u16(),
                    body
                )))
            }
        }
    }
}

#[async_trait]
impl AnswerFetcher for HttpPolling {
    async fn fetch_answer(&self, query: &Query) -> Result<Option<Response>, RelayError> {
        self.get_answer(query).await
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PollSchedule {
    pub timeout: Duration,
    pub interval: Duration,
}

/// Repeat the status query for `request_id` until an answer is ready or `timeout` elapses.
///
/// Giving up never cancels the server-side job; the answer stays retrievable.
pub async fn poll_until_ready<F: AnswerFetcher + ?Sized>(
    fetcher: &F,
    request_id: &RequestId,
    api_key: &ApiKey,
    schedule: PollSchedule,
) -> Result<Response, RelayError> {
    let deadline = Deadline::after(schedule.timeout);
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        let query = builder::query(request_id.clone(), api_key.clone());
        // a single query never outlives the overall poll budget
        let fetched = timeout(deadline.remaining(), fetcher.fetch_answer(&query)).await;
        let stalled = match fetched {
            Ok(Ok(Some(response))) => {
                info!(request_id = %request_id, attempts, "answer ready");
                return Ok(response);
            }
            Ok(Ok(None)) => false,
            Ok(Err(e)) => return Err(e),
            Err(_) => true,
        };

        if stalled || deadline.is_expired() {
            let elapsed = deadline.elapsed();
            warn!(request_id = %request_id, attempts, stalled, elapsed_ms = %elapsed.as_millis(), "polling deadline exceeded");
            return Err(RelayError::PollTimeout {
                request_id: request_id.to_string(),
                elapsed,
            });
        }

        let pause = schedule.interval.min(deadline.remaining());
        debug!(request_id = %request_id, attempts, pause_ms = %pause.as_millis(), "answer not ready, waiting");
        sleep(pause).await;
    }
}

/// Durable result source: recovers an answer purely by id.
pub struct PollingTransport {
    http: HttpPolling,
    api_key: ApiKey,
    interval: Duration,
}

impl PollingTransport {
    pub fn new(http: HttpPolling, api_key: ApiKey, interval: Duration) -> Self {
        Self {
            http,
            api_key,
            interval,
        }
    }
}

#[async_trait]
impl ResultSource for PollingTransport {
    fn label(&self) -> &'static str {
        "polling"
    }

    async fn await_result(
        &mut self,
        request_id: &RequestId,
        deadline: Duration,
    ) -> Result<Response, RelayError> {
        let schedule = PollSchedule {
            timeout: deadline,
            interval: self.interval,
        };
        poll_until_ready(&self.http, request_id, &self.api_key, schedule).await
    }
}
