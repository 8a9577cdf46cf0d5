use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use dht_frontend::config::Config;
use dht_frontend::lifecycle::{self, Shutdown};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let config = Config::parse();

    // Initialize tracing
    let filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => tracing_subscriber::EnvFilter::try_new(format!(
            "dht_frontend={},tower_http=debug",
            config.log_level
        ))
        .context("invalid log level")?,
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting dht-frontend");
    tracing::info!(
        "Configuration: bind_address={}, backend={:?}, run_tests={}",
        config.bind_address(),
        config.backend,
        config.run_tests
    );

    match lifecycle::run(config, Shutdown::new()).await {
        Ok(report) => {
            tracing::info!(address = %report.local_addr, "Bye, bye!");
            Ok(())
        }
        Err(err) => {
            tracing::error!(error = %err, "Failed to start");
            if err.wants_usage() {
                eprintln!("{}", Config::command().render_usage());
            }
            std::process::exit(err.exit_code());
        }
    }
}
