//! Per-restaurant change feed.
//!
//! ```text
//! outbox ──producer──▶ Kafka (servelink.changes)
//!                          │
//!                          ▼  relay thread
//!                      ChangeHub ── broadcast per restaurant ──▶ SSE subscribers
//! ```
//!
//! Subscribers that fall too far behind get a `resync` item and are expected
//! to refetch whatever they display.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use dashmap::DashMap;
use futures::Stream;
use kafka::consumer::{Consumer, FetchOffset};
use servelink_service::events::{ChangeEvent, ChangeTable, ParseTableError};
use servelink_service::CHANGE_CHANNEL;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const BROADCAST_CAPACITY: usize = 256;
const RELAY_RETRY: Duration = Duration::from_secs(1);

#[derive(Clone, Default)]
pub struct ChangeHub {
    restaurants: Arc<DashMap<Uuid, broadcast::Sender<Arc<ChangeEvent>>>>,
}

impl ChangeHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, restaurant_id: Uuid) -> broadcast::Receiver<Arc<ChangeEvent>> {
        self.restaurants
            .entry(restaurant_id)
            .or_insert_with(|| broadcast::channel(BROADCAST_CAPACITY).0)
            .subscribe()
    }

    /// Returns the number of subscribers that received the event.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        match self.restaurants.get(&event.restaurant_id) {
            Some(tx) => tx.send(Arc::new(event)).unwrap_or(0),
            None => 0,
        }
    }

    /// Forgets restaurants nobody listens to any more.
    pub fn prune(&self) {
        self.restaurants.retain(|_, tx| tx.receiver_count() > 0);
    }

    pub fn channel_count(&self) -> usize {
        self.restaurants.len()
    }
}

/// Tables a subscriber wants to hear about. `None` means all of them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChangeFilter {
    tables: Option<HashSet<ChangeTable>>,
}

impl ChangeFilter {
    /// Parses a comma separated list such as `orders,order_items`.
    pub fn parse(tables: Option<&str>) -> Result<Self, ParseTableError> {
        let names: Vec<&str> = tables
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .collect();
        if names.is_empty() {
            return Ok(Self::default());
        }
        let tables = names
            .into_iter()
            .map(str::parse)
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(Self {
            tables: Some(tables),
        })
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        self.tables
            .as_ref()
            .is_none_or(|tables| tables.contains(&event.table))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FeedItem {
    Change(Arc<ChangeEvent>),
    /// `skipped` events were lost; the subscriber must reload.
    Resync { skipped: u64 },
}

/// Stream of feed items for one restaurant. Ends when the hub goes away.
pub fn subscribe_stream(
    hub: ChangeHub,
    restaurant_id: Uuid,
    filter: ChangeFilter,
) -> impl Stream<Item = FeedItem> {
    let rx = hub.subscribe(restaurant_id);
    futures::stream::unfold(
        (hub, rx, filter),
        move |(hub, mut rx, filter)| async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if filter.matches(&event) {
                            return Some((FeedItem::Change(event), (hub, rx, filter)));
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(%restaurant_id, skipped, "change subscriber lagged");
                        let rx = hub.subscribe(restaurant_id);
                        return Some((FeedItem::Resync { skipped }, (hub, rx, filter)));
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        },
    )
}

fn relay(kafka_url: &str, hub: &ChangeHub) -> Result<(), kafka::Error> {
    // No consumer group: every gateway instance needs every event, and the
    // feed is live-only so there is nothing to resume from.
    let mut consumer = Consumer::from_hosts(vec![kafka_url.to_string()])
        .with_topic(CHANGE_CHANNEL.to_string())
        .with_fallback_offset(FetchOffset::Latest)
        .with_offset_storage(None)
        .create()?;
    info!(topic = CHANGE_CHANNEL, "change relay connected");

    loop {
        let mss = consumer.poll()?;
        if mss.is_empty() {
            thread::sleep(RELAY_RETRY);
            continue;
        }

        for ms in mss.iter() {
            for m in ms.messages() {
                match ChangeEvent::decode(m.value) {
                    Ok(event) => {
                        let delivered = hub.publish(event);
                        debug!(offset = m.offset, delivered, "relayed change");
                    }
                    Err(err) => warn!(offset = m.offset, %err, "skipping malformed change"),
                }
            }
            if let Err(err) = consumer.consume_messageset(ms) {
                warn!(%err, "cannot mark change messages consumed");
            }
        }
        hub.prune();
        debug!(channels = hub.channel_count(), "change hub pruned");
    }
}

/// Feeds Kafka change events into `hub` from a dedicated thread,
/// reconnecting after failures.
pub fn spawn_kafka_relay(kafka_url: String, hub: ChangeHub) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("change-relay".to_string())
        .spawn(move || {
            loop {
                if let Err(err) = relay(&kafka_url, &hub) {
                    error!(%err, "change relay failed, reconnecting");
                }
                thread::sleep(RELAY_RETRY);
            }
        })
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;

    fn order_event(restaurant_id: Uuid) -> ChangeEvent {
        ChangeEvent::deleted(ChangeTable::Orders, Uuid::new_v4(), restaurant_id)
    }

    #[test]
    fn test_filter_parse() {
        assert_eq!(ChangeFilter::parse(None).unwrap(), ChangeFilter::default());
        assert_eq!(ChangeFilter::parse(Some(" , ")).unwrap(), ChangeFilter::default());

        let filter = ChangeFilter::parse(Some("orders, order_items")).unwrap();
        let restaurant_id = Uuid::new_v4();
        assert!(filter.matches(&order_event(restaurant_id)));
        assert!(!filter.matches(&ChangeEvent::deleted(
            ChangeTable::MenuItems,
            Uuid::new_v4(),
            restaurant_id
        )));

        assert!(ChangeFilter::parse(Some("orders,kitchen")).is_err());
    }

    #[tokio::test]
    async fn test_publish_reaches_only_own_restaurant() {
        let hub = ChangeHub::new();
        let mine = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut rx = hub.subscribe(mine);
        let _other_rx = hub.subscribe(other);

        assert_eq!(hub.publish(order_event(other)), 1);
        assert_eq!(hub.publish(order_event(mine)), 1);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.restaurant_id, mine);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_publish_without_subscribers() {
        let hub = ChangeHub::new();
        assert_eq!(hub.publish(order_event(Uuid::new_v4())), 0);
        assert_eq!(hub.channel_count(), 0);
    }

    #[test]
    fn test_prune_drops_idle_channels() {
        let hub = ChangeHub::new();
        let rx = hub.subscribe(Uuid::new_v4());
        let _kept = hub.subscribe(Uuid::new_v4());
        assert_eq!(hub.channel_count(), 2);

        drop(rx);
        hub.prune();
        assert_eq!(hub.channel_count(), 1);
    }

    #[tokio::test]
    async fn test_stream_filters_tables() {
        let hub = ChangeHub::new();
        let restaurant_id = Uuid::new_v4();
        let filter = ChangeFilter::parse(Some("orders")).unwrap();
        let mut stream = Box::pin(subscribe_stream(hub.clone(), restaurant_id, filter));

        hub.publish(ChangeEvent::deleted(
            ChangeTable::MenuItems,
            Uuid::new_v4(),
            restaurant_id,
        ));
        let order = order_event(restaurant_id);
        hub.publish(order.clone());

        match stream.next().await {
            Some(FeedItem::Change(event)) => assert_eq!(*event, order),
            other => panic!("unexpected item {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stream_resyncs_after_lag() {
        let hub = ChangeHub::new();
        let restaurant_id = Uuid::new_v4();
        let mut stream = Box::pin(subscribe_stream(
            hub.clone(),
            restaurant_id,
            ChangeFilter::default(),
        ));

        for _ in 0..BROADCAST_CAPACITY + 10 {
            hub.publish(order_event(restaurant_id));
        }

        assert_eq!(stream.next().await, Some(FeedItem::Resync { skipped: 10 }));

        let fresh = order_event(restaurant_id);
        hub.publish(fresh.clone());
        assert_eq!(stream.next().await, Some(FeedItem::Change(Arc::new(fresh))));
    }
}
