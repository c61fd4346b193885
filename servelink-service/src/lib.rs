use diesel_async::{
    async_connection_wrapper::AsyncConnectionWrapper,
    pooled_connection::{
        deadpool::{Object, Pool},
        AsyncDieselConnectionManager,
    },
    AsyncConnection, AsyncPgConnection,
};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tracing::info;

pub mod analytics;
pub mod auth;
pub mod config;
pub mod error;
pub mod events;
pub mod menu;
pub mod models;
pub mod orders;
pub mod restaurants;
pub mod schema;
pub mod staff;
pub mod tables;

pub use config::Config;
pub use error::ServiceError;

pub const CHANGE_CHANNEL: &str = "servelink.changes";

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations");

pub type DbPool = Pool<AsyncPgConnection>;
pub type PooledConnection = Object<AsyncPgConnection>;

pub async fn establish_connection(database_url: &str) -> Result<AsyncPgConnection, ServiceError> {
    AsyncPgConnection::establish(database_url)
        .await
        .map_err(|e| ServiceError::Pool(format!("cannot connect to database: {e}")))
}

pub fn build_pool(config: &Config) -> Result<DbPool, ServiceError> {
    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(&config.database_url);
    Pool::builder(manager)
        .max_size(config.pool_size)
        .build()
        .map_err(|e| ServiceError::Pool(e.to_string()))
}

pub async fn connection(pool: &DbPool) -> Result<PooledConnection, ServiceError> {
    pool.get()
        .await
        .map_err(|e| ServiceError::Pool(e.to_string()))
}

pub async fn run_migrations(database_url: &str) -> Result<(), ServiceError> {
    let conn = establish_connection(database_url).await?;
    let mut async_wrapper: AsyncConnectionWrapper<AsyncPgConnection> =
        AsyncConnectionWrapper::from(conn);
    let applied = tokio::task::spawn_blocking(move || {
        async_wrapper
            .run_pending_migrations(MIGRATIONS)
            .map(|versions| versions.len())
            .map_err(|e| ServiceError::Internal(format!("migration failed: {e}")))
    })
    .await
    .map_err(|e| ServiceError::Internal(format!("migration task failed: {e}")))??;
    info!(applied, "database migrations are up to date");
    Ok(())
}
