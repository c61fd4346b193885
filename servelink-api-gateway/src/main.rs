use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use chrono::{TimeDelta, Utc};
use servelink_service::{Config, DbPool, auth::AuthService, events};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod carts;
mod error;
mod feed;
mod handlers;
mod models;

use carts::{CART_IDLE_HOURS, CartStore};
use feed::ChangeHub;
use handlers::{
    ApiDoc, AppState, analytics_router, auth_router, cart_router, feed_router, menu_router,
    order_router, restaurant_router, staff_router, table_router,
};

const CART_PURGE_INTERVAL: Duration = Duration::from_secs(300);
const OUTBOX_PURGE_INTERVAL: Duration = Duration::from_secs(600);
const OUTBOX_RETENTION_HOURS: i64 = 1;

fn spawn_cart_purge(carts: CartStore) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CART_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            let purged = carts.purge_idle(TimeDelta::hours(CART_IDLE_HOURS));
            if purged > 0 {
                debug!(purged, remaining = carts.len(), "purged idle carts");
            }
        }
    });
}

/// Without Kafka nothing drains the outbox, so old rows are dropped here.
fn spawn_outbox_purge(pool: DbPool) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(OUTBOX_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            let cutoff = Utc::now() - TimeDelta::hours(OUTBOX_RETENTION_HOURS);
            let purged = match servelink_service::connection(&pool).await {
                Ok(mut conn) => events::purge_outbox(&mut conn, cutoff).await,
                Err(err) => Err(err),
            };
            match purged {
                Ok(0) => {}
                Ok(purged) => debug!(purged, "purged undelivered change events"),
                Err(err) => warn!(%err, "cannot purge outbox"),
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    servelink_service::run_migrations(&config.database_url).await?;
    let pool = servelink_service::build_pool(&config)?;

    let hub = ChangeHub::new();
    match config.kafka_url.clone() {
        Some(kafka_url) => {
            feed::spawn_kafka_relay(kafka_url, hub.clone())?;
        }
        None => {
            warn!("KAFKA_URL is not set, change feed subscribers will receive nothing");
            spawn_outbox_purge(pool.clone());
        }
    }

    let carts = CartStore::new();
    spawn_cart_purge(carts.clone());

    let state = AppState {
        pool,
        auth: Arc::new(AuthService::from_config(&config)),
        carts,
        hub,
        public_base_url: Arc::from(config.public_base_url.as_str()),
    };

    let app = Router::new()
        .merge(auth_router())
        .merge(restaurant_router())
        .merge(menu_router())
        .merge(table_router())
        .merge(cart_router())
        .merge(order_router())
        .merge(staff_router())
        .merge(analytics_router())
        .merge(feed_router())
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!("API Gateway listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
