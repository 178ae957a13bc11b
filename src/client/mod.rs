//! Coordinator for one exchange: pick a transport, fall back when the channel drops.

pub mod config;

use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::commands::{CommandBuilder, RequestLedger};
use crate::error::RelayError;
use crate::transport::http_polling::{poll_until_ready, HttpPolling, PollSchedule, PollingTransport};
use crate::transport::websocket::ChannelTransport;
use crate::transport::{Command, RequestId, Response, ResultSource};

pub use config::{Config, Settings, TransportMode};

/// How the answer reached us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Channel,
    /// `fell_back` is set when the channel was tried first and dropped.
    Polling { fell_back: bool },
}

#[derive(Debug, Clone)]
pub struct Exchange {
    pub request_id: RequestId,
    pub response: Response,
    pub delivery: Delivery,
    pub elapsed: Duration,
}

pub struct RelayClient {
    config: Config,
    ledger: RequestLedger,
}

impl RelayClient {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            ledger: RequestLedger::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Start a command; [`RelayClient::build`] attaches this client's credential.
    pub fn command(&self, action: impl Into<String>) -> CommandBuilder {
        CommandBuilder::new(action)
    }

    pub fn build(&self, builder: CommandBuilder) -> Result<Command, RelayError> {
        builder.build(&self.config.api_key)
    }

    /// Run one command to its terminal response.
    ///
    /// A response carrying `error` is still `Ok` here; call [`Response::check`] to turn it
    /// into [`RelayError::RemoteReported`] after displaying it.
    pub async fn execute(&mut self, command: Command) -> Result<Exchange, RelayError> {
        self.ledger.claim(&command.request_id)?;
        let started = Instant::now();

        let mode = self.config.settings.mode;
        info!(request_id = %command.request_id, action = %command.action, mode = ?mode, "executing command");

        let (request_id, response, delivery) = match mode {
            TransportMode::Auto => self.via_channel(&command, true).await?,
            TransportMode::Channel => self.via_channel(&command, false).await?,
            TransportMode::Polling => self.via_polling(&command).await?,
        };

        Ok(Exchange {
            request_id,
            response,
            delivery,
            elapsed: started.elapsed(),
        })
    }

    async fn via_channel(
        &self,
        command: &Command,
        fallback: bool,
    ) -> Result<(RequestId, Response, Delivery), RelayError> {
        let settings = &self.config.settings;
        let timeouts = &settings.timeouts;

        let mut channel = ChannelTransport::connect(
            &settings.channel_url,
            timeouts.connect_timeout(),
            settings.correlation,
        )
        .await?;
        channel.send(command).await?;

        let id = command.request_id.clone();
        let outcome = await_with(&mut channel, &id, timeouts.channel_timeout()).await;
        channel.close().await;

        match outcome {
            Ok(response) => Ok((id, response, Delivery::Channel)),
            Err(e) if e.is_interruption() && fallback => {
                warn!(request_id = %id, error = %e, "falling back to polling");
                let mut polling = self.polling_transport()?;
                let response = await_with(&mut polling, &id, timeouts.poll_timeout()).await?;
                Ok((id, response, Delivery::Polling { fell_back: true }))
            }
            Err(e) => Err(e),
        }
    }

    async fn via_polling(
        &self,
        command: &Command,
    ) -> Result<(RequestId, Response, Delivery), RelayError> {
        let http = self.http()?;
        let id = http.submit(command).await?;

        let mut polling = PollingTransport::new(
            http,
            self.config.api_key.clone(),
            self.config.settings.timeouts.poll_interval(),
        );
        let response =
            await_with(&mut polling, &id, self.config.settings.timeouts.poll_timeout()).await?;
        Ok((id, response, Delivery::Polling { fell_back: false }))
    }

    /// Recover the answer for a request submitted earlier, possibly by another run.
    pub async fn retrieve(&self, request_id: &RequestId) -> Result<Response, RelayError> {
        let timeouts = &self.config.settings.timeouts;
        let schedule = PollSchedule {
            timeout: timeouts.poll_timeout(),
            interval: timeouts.poll_interval(),
        };
        poll_until_ready(&self.http()?, request_id, &self.config.api_key, schedule).await
    }

    /// Single status query; `None` means "not ready yet".
    pub async fn peek(&self, request_id: &RequestId) -> Result<Option<Response>, RelayError> {
        use crate::commands::builder::query;
        use crate::transport::http_polling::AnswerFetcher;

        let q = query(request_id.clone(), self.config.api_key.clone());
        self.http()?.fetch_answer(&q).await
    }

    fn http(&self) -> Result<HttpPolling, RelayError> {
        HttpPolling::new(
            &self.config.settings.api_base_url,
            self.config.settings.timeouts.connect_timeout(),
        )
    }

    fn polling_transport(&self) -> Result<PollingTransport, RelayError> {
        Ok(PollingTransport::new(
            self.http()?,
            self.config.api_key.clone(),
            self.config.settings.timeouts.poll_interval(),
        ))
    }
}

async fn await_with(
    source: &mut dyn ResultSource,
    request_id: &RequestId,
    deadline: Duration,
) -> Result<Response, RelayError> {
    info!(request_id = %request_id, via = source.label(), timeout_ms = %deadline.as_millis(), "awaiting result");
    source.await_result(request_id, deadline).await
}
