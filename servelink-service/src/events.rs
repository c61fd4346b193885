//! Row-level change events.
//!
//! Every write that subscribers care about inserts a [`ChangeEvent`] into
//! the outbox inside the same transaction; the producer relays the outbox
//! to Kafka afterwards.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use diesel::{ExpressionMethods, QueryDsl};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{models::NewOutbox, schema, ServiceError, CHANGE_CHANNEL};

#[derive(Serialize, Deserialize, PartialEq, Eq, Hash, Copy, Clone, Debug)]
#[serde(rename_all = "snake_case")]
pub enum ChangeTable {
    Restaurants,
    Profiles,
    MenuCategories,
    MenuItems,
    RestaurantTables,
    Orders,
    OrderItems,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown table `{0}`")]
pub struct ParseTableError(pub String);

impl ChangeTable {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeTable::Restaurants => "restaurants",
            ChangeTable::Profiles => "profiles",
            ChangeTable::MenuCategories => "menu_categories",
            ChangeTable::MenuItems => "menu_items",
            ChangeTable::RestaurantTables => "restaurant_tables",
            ChangeTable::Orders => "orders",
            ChangeTable::OrderItems => "order_items",
        }
    }
}

impl fmt::Display for ChangeTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeTable {
    type Err = ParseTableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "restaurants" => Ok(ChangeTable::Restaurants),
            "profiles" => Ok(ChangeTable::Profiles),
            "menu_categories" => Ok(ChangeTable::MenuCategories),
            "menu_items" => Ok(ChangeTable::MenuItems),
            "restaurant_tables" => Ok(ChangeTable::RestaurantTables),
            "orders" => Ok(ChangeTable::Orders),
            "order_items" => Ok(ChangeTable::OrderItems),
            other => Err(ParseTableError(other.to_string())),
        }
    }
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Copy, Clone, Debug)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// One changed row. `row` carries the new state for inserts and updates so
/// subscribers can patch their view instead of refetching.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ChangeEvent {
    pub table: ChangeTable,
    pub op: ChangeOp,
    pub id: Uuid,
    pub restaurant_id: Uuid,
    pub row: Option<Value>,
    pub occurred_at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn inserted<T: Serialize>(
        table: ChangeTable,
        id: Uuid,
        restaurant_id: Uuid,
        row: &T,
    ) -> Result<Self, serde_json::Error> {
        Self::with_row(table, ChangeOp::Insert, id, restaurant_id, row)
    }

    pub fn updated<T: Serialize>(
        table: ChangeTable,
        id: Uuid,
        restaurant_id: Uuid,
        row: &T,
    ) -> Result<Self, serde_json::Error> {
        Self::with_row(table, ChangeOp::Update, id, restaurant_id, row)
    }

    pub fn deleted(table: ChangeTable, id: Uuid, restaurant_id: Uuid) -> Self {
        Self {
            table,
            op: ChangeOp::Delete,
            id,
            restaurant_id,
            row: None,
            occurred_at: Utc::now(),
        }
    }

    fn with_row<T: Serialize>(
        table: ChangeTable,
        op: ChangeOp,
        id: Uuid,
        restaurant_id: Uuid,
        row: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            table,
            op,
            id,
            restaurant_id,
            row: Some(serde_json::to_value(row)?),
            occurred_at: Utc::now(),
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn decode(value: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(value)
    }
}

pub struct ChangeEventPublisher<'a> {
    conn: &'a mut AsyncPgConnection,
}

impl<'a> ChangeEventPublisher<'a> {
    pub fn new(conn: &'a mut AsyncPgConnection) -> Self {
        Self { conn }
    }

    pub async fn publish(&mut self, event: ChangeEvent) -> Result<(), ServiceError> {
        let value = event.encode()?;
        diesel::insert_into(schema::outbox::table)
            .values(NewOutbox {
                topic: CHANGE_CHANNEL.to_string(),
                key: event.restaurant_id.to_string(),
                value,
            })
            .execute(self.conn)
            .await?;
        Ok(())
    }

    pub async fn publish_all(&mut self, events: Vec<ChangeEvent>) -> Result<(), ServiceError> {
        for event in events {
            self.publish(event).await?;
        }
        Ok(())
    }
}

/// Deletes outbox rows written before `cutoff`. Only needed when no
/// producer drains the outbox.
pub async fn purge_outbox(
    conn: &mut AsyncPgConnection,
    cutoff: DateTime<Utc>,
) -> Result<usize, ServiceError> {
    Ok(diesel::delete(schema::outbox::table.filter(schema::outbox::created_at.lt(cutoff)))
        .execute(conn)
        .await?)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_wire_format() {
        let id = Uuid::new_v4();
        let rid = Uuid::new_v4();
        let event = ChangeEvent::updated(
            ChangeTable::Orders,
            id,
            rid,
            &json!({"status": "ready", "version": 2}),
        )
        .unwrap();

        let value: Value = serde_json::from_slice(&event.encode().unwrap()).unwrap();
        assert_eq!(value["table"], "orders");
        assert_eq!(value["op"], "update");
        assert_eq!(value["restaurant_id"], rid.to_string());
        assert_eq!(value["row"]["status"], "ready");

        assert_eq!(ChangeEvent::decode(&event.encode().unwrap()).unwrap(), event);
    }

    #[test]
    fn test_deleted_has_no_row() {
        let event = ChangeEvent::deleted(ChangeTable::MenuItems, Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(event.op, ChangeOp::Delete);
        assert!(event.row.is_none());
    }

    #[test]
    fn test_table_names() {
        assert_eq!(
            "order_items".parse::<ChangeTable>(),
            Ok(ChangeTable::OrderItems)
        );
        assert!("tickets".parse::<ChangeTable>().is_err());
        assert_eq!(ChangeTable::RestaurantTables.to_string(), "restaurant_tables");
    }
}
