use clap::{Parser, Subcommand};
use servelink_service::Config;
use tracing_subscriber::EnvFilter;

pub mod app;

#[derive(Parser)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations and exit
    Migrate,
    /// Relay outbox rows to Kafka
    Producer,
}

#[tokio::main]
pub async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    match &cli.command {
        Commands::Migrate => app::migrate::main(config).await,
        Commands::Producer => app::producer::main(config).await,
    }
}
