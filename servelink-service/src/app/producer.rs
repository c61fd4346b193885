use std::{thread::sleep, time::Duration};

use diesel::result::Error as DieselError;
use diesel::{Connection, ExpressionMethods, PgConnection, QueryDsl, RunQueryDsl, SelectableHelper};
use kafka::client::RequiredAcks;
use kafka::producer::{Producer, Record};
use servelink_service::config::ConfigError;
use servelink_service::events::ChangeEvent;
use servelink_service::models::Outbox;
use servelink_service::{schema, Config};
use tracing::{debug, error, info, warn};

const IDLE_WAIT: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
pub enum OutboxProcessingError {
    #[error("database error: {0}")]
    Database(#[from] DieselError),
    #[error("kafka error: {0}")]
    Kafka(#[from] kafka::Error),
}

struct OutboxProcessor {
    kafka: Producer,
}

impl OutboxProcessor {
    /// Sends the oldest unsent row and deletes it. The row stays locked
    /// until Kafka acknowledged it, so concurrent producers never send the
    /// same row twice.
    fn process_next_outbox_row(
        &mut self,
        conn: &mut PgConnection,
    ) -> Result<bool, OutboxProcessingError> {
        use schema::outbox::dsl::*;

        conn.transaction::<_, OutboxProcessingError, _>(|conn| {
            let row = match outbox
                .select(Outbox::as_select())
                .order(id.asc())
                .for_update()
                .skip_locked()
                .first::<Outbox>(conn)
            {
                Ok(row) => row,
                Err(DieselError::NotFound) => return Ok(false),
                Err(err) => return Err(err.into()),
            };

            match ChangeEvent::decode(&row.value) {
                Ok(event) => debug!(
                    table = %event.table,
                    op = ?event.op,
                    restaurant_id = %event.restaurant_id,
                    "relaying change"
                ),
                Err(err) => warn!(outbox_id = row.id, %err, "outbox row is not a change event"),
            }

            self.kafka.send(&Record::from_key_value(
                &row.topic,
                row.key.clone(),
                row.value.clone(),
            ))?;

            diesel::delete(outbox.filter(id.eq(row.id))).execute(conn)?;

            Ok(true)
        })
    }
}

fn run(database_url: &str, kafka_url: String) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let conn = &mut PgConnection::establish(database_url)?;
    let producer = Producer::from_hosts(vec![kafka_url])
        .with_ack_timeout(Duration::from_secs(1))
        .with_required_acks(RequiredAcks::One)
        .create()?;

    let mut outbox_processor = OutboxProcessor { kafka: producer };
    info!("outbox producer started");

    loop {
        match outbox_processor.process_next_outbox_row(conn) {
            Ok(true) => {}
            Ok(false) => sleep(IDLE_WAIT),
            Err(err) => {
                error!(%err, "error processing outbox row");
                sleep(IDLE_WAIT);
            }
        }
    }
}

pub async fn main(config: Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let kafka_url = config
        .kafka_url
        .clone()
        .ok_or(ConfigError::Missing("KAFKA_URL"))?;
    let database_url = config.database_url.clone();

    tokio::task::spawn_blocking(move || run(&database_url, kafka_url)).await?
}
