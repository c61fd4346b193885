use std::io::Write;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::{
    deserialize::{self, FromSql, FromSqlRow},
    expression::AsExpression,
    pg::{Pg, PgValue},
    prelude::*,
    serialize::{self, IsNull, Output, ToSql},
};
use serde::Serialize;
use uuid::Uuid;

use crate::schema::{
    menu_categories, menu_items, order_items, orders, outbox, profiles, restaurant_tables,
    restaurants, users,
};

#[derive(FromSqlRow, AsExpression, Serialize, PartialEq, Eq, Copy, Clone, Debug)]
#[diesel(sql_type = crate::schema::sql_types::OrderStatus)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Preparing,
    Ready,
    Completed,
    Cancelled,
}

impl ToSql<crate::schema::sql_types::OrderStatus, Pg> for OrderStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        match *self {
            OrderStatus::Pending => out.write_all(b"pending")?,
            OrderStatus::Preparing => out.write_all(b"preparing")?,
            OrderStatus::Ready => out.write_all(b"ready")?,
            OrderStatus::Completed => out.write_all(b"completed")?,
            OrderStatus::Cancelled => out.write_all(b"cancelled")?,
        }
        Ok(IsNull::No)
    }
}

impl FromSql<crate::schema::sql_types::OrderStatus, Pg> for OrderStatus {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        match bytes.as_bytes() {
            b"pending" => Ok(OrderStatus::Pending),
            b"preparing" => Ok(OrderStatus::Preparing),
            b"ready" => Ok(OrderStatus::Ready),
            b"completed" => Ok(OrderStatus::Completed),
            b"cancelled" => Ok(OrderStatus::Cancelled),
            _ => Err("Unrecognized enum variant".into()),
        }
    }
}

impl From<servelink_domain::OrderStatus> for OrderStatus {
    fn from(s: servelink_domain::OrderStatus) -> Self {
        match s {
            servelink_domain::OrderStatus::Pending => OrderStatus::Pending,
            servelink_domain::OrderStatus::Preparing => OrderStatus::Preparing,
            servelink_domain::OrderStatus::Ready => OrderStatus::Ready,
            servelink_domain::OrderStatus::Completed => OrderStatus::Completed,
            servelink_domain::OrderStatus::Cancelled => OrderStatus::Cancelled,
        }
    }
}

impl From<OrderStatus> for servelink_domain::OrderStatus {
    fn from(s: OrderStatus) -> Self {
        match s {
            OrderStatus::Pending => servelink_domain::OrderStatus::Pending,
            OrderStatus::Preparing => servelink_domain::OrderStatus::Preparing,
            OrderStatus::Ready => servelink_domain::OrderStatus::Ready,
            OrderStatus::Completed => servelink_domain::OrderStatus::Completed,
            OrderStatus::Cancelled => servelink_domain::OrderStatus::Cancelled,
        }
    }
}

#[derive(FromSqlRow, AsExpression, Serialize, PartialEq, Eq, Copy, Clone, Debug)]
#[diesel(sql_type = crate::schema::sql_types::StaffRole)]
#[serde(rename_all = "snake_case")]
pub enum StaffRole {
    Owner,
    Kitchen,
    Waiter,
}

impl ToSql<crate::schema::sql_types::StaffRole, Pg> for StaffRole {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        match *self {
            StaffRole::Owner => out.write_all(b"owner")?,
            StaffRole::Kitchen => out.write_all(b"kitchen")?,
            StaffRole::Waiter => out.write_all(b"waiter")?,
        }
        Ok(IsNull::No)
    }
}

impl FromSql<crate::schema::sql_types::StaffRole, Pg> for StaffRole {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        match bytes.as_bytes() {
            b"owner" => Ok(StaffRole::Owner),
            b"kitchen" => Ok(StaffRole::Kitchen),
            b"waiter" => Ok(StaffRole::Waiter),
            _ => Err("Unrecognized enum variant".into()),
        }
    }
}

impl From<servelink_domain::StaffRole> for StaffRole {
    fn from(r: servelink_domain::StaffRole) -> Self {
        match r {
            servelink_domain::StaffRole::Owner => StaffRole::Owner,
            servelink_domain::StaffRole::Kitchen => StaffRole::Kitchen,
            servelink_domain::StaffRole::Waiter => StaffRole::Waiter,
        }
    }
}

impl From<StaffRole> for servelink_domain::StaffRole {
    fn from(r: StaffRole) -> Self {
        match r {
            StaffRole::Owner => servelink_domain::StaffRole::Owner,
            StaffRole::Kitchen => servelink_domain::StaffRole::Kitchen,
            StaffRole::Waiter => servelink_domain::StaffRole::Waiter,
        }
    }
}

#[derive(Queryable, Selectable, Identifiable, Insertable, Debug, PartialEq)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub passphrase_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Identifiable, Associations, Insertable, Serialize, Clone, Debug, PartialEq)]
#[diesel(belongs_to(User, foreign_key = owner_id))]
#[diesel(table_name = restaurants)]
pub struct Restaurant {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    pub order_sequence: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Identifiable, Associations, Insertable, Serialize, Clone, Debug, PartialEq)]
#[diesel(belongs_to(User))]
#[diesel(primary_key(user_id))]
#[diesel(table_name = profiles)]
pub struct Profile {
    pub user_id: Uuid,
    pub full_name: Option<String>,
    pub role: StaffRole,
    pub restaurant_id: Option<Uuid>,
}

#[derive(Queryable, Selectable, Identifiable, Associations, Insertable, Serialize, Clone, Debug, PartialEq)]
#[diesel(belongs_to(Restaurant))]
#[diesel(table_name = menu_categories)]
pub struct MenuCategory {
    pub id: Uuid,
    pub restaurant_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub display_order: i32,
}

#[derive(AsChangeset, Debug)]
#[diesel(table_name = menu_categories, treat_none_as_null = true)]
pub struct MenuCategoryChanges {
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub display_order: i32,
}

#[derive(Queryable, Selectable, Identifiable, Associations, Insertable, Serialize, Clone, Debug, PartialEq)]
#[diesel(belongs_to(Restaurant))]
#[diesel(table_name = menu_items)]
pub struct MenuItem {
    pub id: Uuid,
    pub restaurant_id: Uuid,
    pub category_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub price: BigDecimal,
    pub preparation_time: i32,
    pub is_veg: bool,
    pub is_available: bool,
    pub image_url: Option<String>,
}

#[derive(AsChangeset, Debug)]
#[diesel(table_name = menu_items, treat_none_as_null = true)]
pub struct MenuItemChanges {
    pub category_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub price: BigDecimal,
    pub preparation_time: i32,
    pub is_veg: bool,
    pub is_available: bool,
    pub image_url: Option<String>,
}

#[derive(Queryable, Selectable, Identifiable, Associations, Insertable, Serialize, Clone, Debug, PartialEq)]
#[diesel(belongs_to(Restaurant))]
#[diesel(table_name = restaurant_tables)]
pub struct RestaurantTable {
    pub id: Uuid,
    pub restaurant_id: Uuid,
    pub table_number: String,
    pub capacity: i32,
    pub qr_code: Option<String>,
}

#[derive(Queryable, Selectable, Identifiable, Associations, Insertable, Serialize, Clone, Debug, PartialEq)]
#[diesel(belongs_to(Restaurant))]
#[diesel(table_name = orders)]
pub struct Order {
    pub id: Uuid,
    pub restaurant_id: Uuid,
    pub table_id: Option<Uuid>,
    pub order_number: String,
    pub status: OrderStatus,
    pub total_amount: Option<BigDecimal>,
    pub customer_notes: Option<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Identifiable, Associations, Insertable, Serialize, Clone, Debug, PartialEq)]
#[diesel(belongs_to(Order))]
#[diesel(table_name = order_items)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub menu_item_id: Uuid,
    pub quantity: i32,
    pub unit_price: BigDecimal,
    pub special_instructions: Option<String>,
}

#[derive(Queryable, Selectable, Debug, PartialEq)]
#[diesel(table_name = outbox)]
pub struct Outbox {
    pub id: i32,
    pub topic: String,
    pub key: String,
    pub value: Vec<u8>,
}

#[derive(Insertable, Debug, PartialEq)]
#[diesel(table_name = outbox)]
pub struct NewOutbox {
    pub topic: String,
    pub key: String,
    pub value: Vec<u8>,
}
