use anyhow::Context as _;
use dotenv::dotenv;
use serenity::client::Client;
use serenity::model::gateway::GatewayIntents;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use stock_bot::config::Config;
use stock_bot::dispatch::Dispatcher;
use stock_bot::handler::Handler;
use stock_bot::ledger::StockLedger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Settings can be in proc variables or .env
    dotenv().ok();
    init_tracing();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "refusing to start");
            return Err(err).context("invalid configuration");
        }
    };
    info!(?config, "loaded configuration");

    let ledger = StockLedger::load(&config.stock_file).with_context(|| {
        format!("failed to load stock from {}", config.stock_file.display())
    })?;
    info!(items = ledger.list().len(), path = %ledger.path().display(), "loaded stock");

    let handler = Handler::new(Dispatcher::new(ledger, config.settings()), &config);

    // Roles are read from the guild cache, and prefix commands need message content
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    // Run the bot
    let mut client = Client::builder(&config.token, intents)
        .event_handler(handler)
        .await
        .context("failed to create client")?;
    client.start().await.context("client stopped")?;
    Ok(())
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,stock_bot=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
