/// Example: navigate the remote browser and print the answer
///
/// This demonstrates how to build a command with CommandBuilder and run it
/// through RelayClient, which prefers the websocket channel and falls back
/// to polling the REST answer store if the channel drops.
///
/// Run with: API_KEY=... cargo run --example navigate -- https://example.com
use automation_relay::client::{Config, RelayClient};
use automation_relay::output::render_report;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_writer(std::io::stderr)
        .init();

    let target = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "https://example.com".to_string());

    // Endpoints from RELAY_* variables, credential from API_KEY
    let config = Config::load(None)?;
    let mut client = RelayClient::new(config);

    let command = client.build(client.command("navigate").url(&target))?;
    tracing::info!("🚀 Navigating to {} (request {})", target, command.request_id);

    let exchange = client.execute(command).await?;

    tracing::info!("✅ Answer via {:?} after {:?}", exchange.delivery, exchange.elapsed);
    print!("{}", render_report(&exchange.response, &[]));

    exchange.response.check()?;
    Ok(())
}
