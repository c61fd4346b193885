use servelink_service::{run_migrations, Config};

pub async fn main(config: Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    run_migrations(&config.database_url).await?;
    Ok(())
}
