use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use automation_relay::client::{Config, RelayClient, TransportMode};
use automation_relay::output::{conclude, ArtifactWriter};
use automation_relay::transport::{Command, CommandFields, RequestId, Response};
use automation_relay::{utils, RelayError};

#[derive(Parser)]
#[command(name = "relay", version, about = "Send commands to a browser automation service")]
struct AppCli {
    /// Config file path (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Transport override
    #[arg(long, value_enum, global = true)]
    mode: Option<ModeArg>,

    /// Where saved HTML and screenshots go
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Auto,
    Channel,
    Polling,
}

impl From<ModeArg> for TransportMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Auto => TransportMode::Auto,
            ModeArg::Channel => TransportMode::Channel,
            ModeArg::Polling => TransportMode::Polling,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Send one command and wait for its answer
    Send {
        /// Action to perform (navigate, click, type, screenshot, getHtml, ...)
        #[arg(long)]
        action: String,
        /// XPath selector
        #[arg(long)]
        xpath: Option<String>,
        /// CSS selector
        #[arg(long)]
        selector: Option<String>,
        /// Text to type
        #[arg(long)]
        text: Option<String>,
        /// X coordinate
        #[arg(long)]
        x: Option<f64>,
        /// Y coordinate
        #[arg(long)]
        y: Option<f64>,
        /// URL to navigate to
        #[arg(long)]
        url: Option<String>,
        /// HTML for setHtml
        #[arg(long)]
        html: Option<String>,
        /// Script for executeScript
        #[arg(long)]
        script: Option<String>,
        /// Request ID (generated when omitted)
        #[arg(long = "request-id", alias = "requestId")]
        request_id: Option<String>,
        /// Timestamp (current UTC time when omitted)
        #[arg(long)]
        timestamp: Option<String>,
    },
    /// Fetch the stored answer of an earlier request
    Query {
        #[arg(long = "request-id", alias = "requestId")]
        request_id: String,
        /// Ask once instead of polling until ready
        #[arg(long, default_value_t = false)]
        once: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    utils::logging::init();

    let args = AppCli::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            let code = e
                .downcast_ref::<RelayError>()
                .map(RelayError::exit_code)
                .unwrap_or(1);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

async fn run(args: AppCli) -> Result<()> {
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(mode) = args.mode {
        config.settings.mode = mode.into();
    }
    if let Some(dir) = args.output_dir {
        config.settings.output_dir = Some(dir);
    }
    let mut client = RelayClient::new(config);
    let writer = ArtifactWriter::new(client.config().output_dir());

    match args.command {
        Commands::Send {
            action,
            xpath,
            selector,
            text,
            x,
            y,
            url,
            html,
            script,
            request_id,
            timestamp,
        } => {
            let fields = CommandFields {
                xpath,
                selector,
                text,
                x,
                y,
                url,
                html,
                script,
            };
            let mut builder = client.command(action).fields(fields);
            if let Some(id) = request_id {
                builder = builder.request_id(RequestId::parse(id)?);
            }
            if let Some(ts) = timestamp {
                builder = builder.timestamp(ts);
            }
            let command = client.build(builder)?;

            println!("Sending command:");
            println!("{}", redacted_json(&command)?);

            let exchange = client.execute(command).await?;
            info!(
                request_id = %exchange.request_id,
                delivery = ?exchange.delivery,
                elapsed_ms = %exchange.elapsed.as_millis(),
                "exchange finished"
            );
            finish(&exchange.response, &writer)
        }
        Commands::Query { request_id, once } => {
            let id = RequestId::parse(request_id)?;
            let response = if once {
                match client.peek(&id).await? {
                    Some(r) => r,
                    None => {
                        println!("Answer for {} is not ready yet", id);
                        return Ok(());
                    }
                }
            } else {
                client.retrieve(&id).await?
            };
            finish(&response, &writer)
        }
    }
}

fn finish(response: &Response, writer: &ArtifactWriter) -> Result<()> {
    conclude(response, writer, &mut std::io::stdout().lock())?;
    Ok(())
}

fn redacted_json(command: &Command) -> Result<String> {
    let mut value = serde_json::to_value(command)?;
    if let Some(key) = value.get_mut("apiKey") {
        *key = serde_json::Value::String("***".to_string());
    }
    Ok(serde_json::to_string(&value)?)
}
