use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::Serialize;
use servelink_domain::analytics::{
    self, DailyRevenue, ItemSale, OrderSample, Summary, TopItem, REVENUE_DAYS, TOP_ITEMS,
};
use uuid::Uuid;

use crate::{schema, tables, ServiceError};

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Dashboard {
    pub summary: Summary,
    pub revenue_by_day: Vec<DailyRevenue>,
    pub top_items: Vec<TopItem>,
}

pub async fn dashboard(
    conn: &mut AsyncPgConnection,
    restaurant_id: Uuid,
) -> Result<Dashboard, ServiceError> {
    let orders: Vec<OrderSample> = schema::orders::table
        .filter(schema::orders::restaurant_id.eq(restaurant_id))
        .select((schema::orders::total_amount, schema::orders::created_at))
        .load::<(Option<BigDecimal>, DateTime<Utc>)>(conn)
        .await?
        .into_iter()
        .map(|(total_amount, created_at)| OrderSample {
            total_amount,
            created_at,
        })
        .collect();

    let sales: Vec<ItemSale> = schema::order_items::table
        .inner_join(schema::menu_items::table)
        .filter(schema::menu_items::restaurant_id.eq(restaurant_id))
        .select((schema::menu_items::name, schema::order_items::quantity))
        .load::<(String, i32)>(conn)
        .await?
        .into_iter()
        .map(|(name, quantity)| ItemSale {
            name,
            quantity: i64::from(quantity),
        })
        .collect();

    let total_tables = tables::count(conn, restaurant_id).await?;

    Ok(Dashboard {
        summary: analytics::summarize(&orders, usize::try_from(total_tables).unwrap_or(0)),
        revenue_by_day: analytics::revenue_by_day(&orders, REVENUE_DAYS),
        top_items: analytics::top_items(&sales, TOP_ITEMS),
    })
}
