use diesel::prelude::*;
use diesel_async::{scoped_futures::ScopedFutureExt, AsyncConnection, AsyncPgConnection, RunQueryDsl};
use servelink_domain::qr;
use tracing::info;
use uuid::Uuid;

use crate::events::{ChangeEvent, ChangeEventPublisher, ChangeTable};
use crate::models::RestaurantTable;
use crate::{schema, ServiceError};

pub const DEFAULT_CAPACITY: i32 = 4;

pub async fn list(
    conn: &mut AsyncPgConnection,
    restaurant_id: Uuid,
) -> Result<Vec<RestaurantTable>, ServiceError> {
    Ok(schema::restaurant_tables::table
        .filter(schema::restaurant_tables::restaurant_id.eq(restaurant_id))
        .order(schema::restaurant_tables::table_number.asc())
        .select(RestaurantTable::as_select())
        .load(conn)
        .await?)
}

pub async fn count(conn: &mut AsyncPgConnection, restaurant_id: Uuid) -> Result<i64, ServiceError> {
    Ok(schema::restaurant_tables::table
        .filter(schema::restaurant_tables::restaurant_id.eq(restaurant_id))
        .count()
        .get_result(conn)
        .await?)
}

pub async fn find_by_number(
    conn: &mut AsyncPgConnection,
    restaurant_id: Uuid,
    table_number: &str,
) -> Result<Option<RestaurantTable>, ServiceError> {
    Ok(schema::restaurant_tables::table
        .filter(schema::restaurant_tables::restaurant_id.eq(restaurant_id))
        .filter(schema::restaurant_tables::table_number.eq(table_number.trim()))
        .select(RestaurantTable::as_select())
        .first(conn)
        .await
        .optional()?)
}

/// Creates a table and renders the QR code customers scan to open the menu.
pub async fn create(
    conn: &mut AsyncPgConnection,
    restaurant_id: Uuid,
    table_number: &str,
    capacity: Option<i32>,
    public_base_url: &str,
) -> Result<RestaurantTable, ServiceError> {
    let table_number = table_number.trim();
    if table_number.is_empty() {
        return Err(ServiceError::invalid("table number must not be empty"));
    }
    let capacity = capacity.unwrap_or(DEFAULT_CAPACITY);
    if capacity < 1 {
        return Err(ServiceError::invalid("capacity must be at least 1"));
    }

    let code = qr::table_qr(public_base_url, restaurant_id, table_number)?;
    let table = RestaurantTable {
        id: Uuid::new_v4(),
        restaurant_id,
        table_number: table_number.to_string(),
        capacity,
        qr_code: Some(code.data_url),
    };

    conn.transaction::<_, ServiceError, _>(|conn| {
        async move {
            diesel::insert_into(schema::restaurant_tables::table)
                .values(&table)
                .execute(conn)
                .await?;
            ChangeEventPublisher::new(conn)
                .publish(ChangeEvent::inserted(
                    ChangeTable::RestaurantTables,
                    table.id,
                    restaurant_id,
                    &table,
                )?)
                .await?;
            info!(%restaurant_id, table_number = %table.table_number, "table created");
            Ok(table)
        }
        .scope_boxed()
    })
    .await
}

/// Orders placed at the table keep their history without the table link.
pub async fn delete(
    conn: &mut AsyncPgConnection,
    restaurant_id: Uuid,
    table_id: Uuid,
) -> Result<(), ServiceError> {
    conn.transaction::<_, ServiceError, _>(|conn| {
        async move {
            let deleted = diesel::delete(
                schema::restaurant_tables::table
                    .filter(schema::restaurant_tables::id.eq(table_id))
                    .filter(schema::restaurant_tables::restaurant_id.eq(restaurant_id)),
            )
            .execute(conn)
            .await?;
            if deleted == 0 {
                return Err(ServiceError::NotFound("table"));
            }

            ChangeEventPublisher::new(conn)
                .publish(ChangeEvent::deleted(
                    ChangeTable::RestaurantTables,
                    table_id,
                    restaurant_id,
                ))
                .await?;
            Ok(())
        }
        .scope_boxed()
    })
    .await
}
