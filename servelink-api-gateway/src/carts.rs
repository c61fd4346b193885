use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use servelink_domain::Cart;
use uuid::Uuid;

/// Hours a cart may sit untouched before it is purged.
pub const CART_IDLE_HOURS: i64 = 3;

/// A customer's cart between scanning the table QR code and checkout.
#[derive(Clone, Debug)]
pub struct CartSession {
    pub id: Uuid,
    pub restaurant_id: Uuid,
    pub table_number: Option<String>,
    pub cart: Cart,
    pub touched_at: DateTime<Utc>,
}

impl CartSession {
    pub fn new(restaurant_id: Uuid, table_number: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            restaurant_id,
            table_number,
            cart: Cart::new(),
            touched_at: Utc::now(),
        }
    }
}

/// In-memory carts keyed by session id. Nothing here is persisted; a cart
/// only becomes durable when it is checked out as an order.
#[derive(Clone, Default)]
pub struct CartStore {
    sessions: Arc<DashMap<Uuid, CartSession>>,
}

impl CartStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self, restaurant_id: Uuid, table_number: Option<String>) -> CartSession {
        let session = CartSession::new(restaurant_id, table_number);
        self.sessions.insert(session.id, session.clone());
        session
    }

    pub fn get(&self, id: Uuid) -> Option<CartSession> {
        self.sessions.get(&id).map(|s| s.clone())
    }

    /// Runs `f` against the session under its shard lock. Returns `None`
    /// when the cart does not exist.
    pub fn update<T, F>(&self, id: Uuid, f: F) -> Option<T>
    where
        F: FnOnce(&mut CartSession) -> T,
    {
        let mut entry = self.sessions.get_mut(&id)?;
        entry.touched_at = Utc::now();
        Some(f(entry.value_mut()))
    }

    /// Puts a session back, e.g. after a failed checkout took it out.
    pub fn restore(&self, mut session: CartSession) {
        session.touched_at = Utc::now();
        self.sessions.insert(session.id, session);
    }

    pub fn remove(&self, id: Uuid) -> Option<CartSession> {
        self.sessions.remove(&id).map(|(_, s)| s)
    }

    /// Drops carts idle for longer than `max_idle` and returns how many
    /// were removed.
    pub fn purge_idle(&self, max_idle: TimeDelta) -> usize {
        let cutoff = Utc::now() - max_idle;
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.touched_at >= cutoff);
        before.saturating_sub(self.sessions.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
