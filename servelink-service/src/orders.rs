//! Placing orders and moving them through the kitchen.

use std::collections::HashMap;

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{scoped_futures::ScopedFutureExt, AsyncConnection, AsyncPgConnection, RunQueryDsl};
use serde::Serialize;
use servelink_domain::{menu::validate_price, Cart, CartError, Checkout, OrderQueue};
use tracing::{info, warn};
use uuid::Uuid;

use crate::events::{ChangeEvent, ChangeEventPublisher, ChangeTable};
use crate::models::{self, MenuItem, Order, OrderItem};
use crate::{schema, tables, ServiceError};

/// Row limit of the owner's order management view.
pub const MANAGEMENT_LIMIT: i64 = 100;

#[derive(Clone, Debug)]
pub struct OrderLineRequest {
    pub menu_item_id: Uuid,
    pub quantity: u32,
    pub special_instructions: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct PlaceOrder {
    pub table_number: Option<String>,
    pub customer_notes: Option<String>,
    pub lines: Vec<OrderLineRequest>,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct OrderLine {
    #[serde(flatten)]
    pub item: OrderItem,
    pub name: String,
    pub preparation_time: i32,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: Order,
    pub table_number: Option<String>,
    pub items: Vec<OrderLine>,
}

pub fn format_order_number(sequence: i64) -> String {
    format!("{sequence:04}")
}

/// Turns the requested lines into a priced cart. Prices come from the menu
/// as it is now, never from the client.
fn price_lines(
    lines: &[OrderLineRequest],
    menu: &HashMap<Uuid, MenuItem>,
) -> Result<Cart, ServiceError> {
    let mut cart = Cart::new();
    for line in lines {
        let item = menu.get(&line.menu_item_id).ok_or_else(|| {
            ServiceError::invalid(format!(
                "menu item {} is not on this menu",
                line.menu_item_id
            ))
        })?;
        if !item.is_available {
            return Err(ServiceError::invalid(format!(
                "{} is currently unavailable",
                item.name
            )));
        }
        cart.add_quantity(item.id, item.name.clone(), item.price.clone(), line.quantity)?;
        if line.special_instructions.is_some() {
            cart.set_instructions(item.id, line.special_instructions.clone())?;
        }
    }
    Ok(cart)
}

/// Prices the lines and checks the total fits the order's money column.
fn checkout_lines(
    lines: &[OrderLineRequest],
    menu: &HashMap<Uuid, MenuItem>,
) -> Result<Checkout, ServiceError> {
    let checkout = price_lines(lines, menu)?.into_checkout()?;
    validate_price(&checkout.total)
        .map_err(|e| ServiceError::invalid(format!("order total: {e}")))?;
    Ok(checkout)
}

/// Checks out a cart in one transaction: the order row, its items, the
/// order number and the change events either all land or none do.
pub async fn place_order(
    conn: &mut AsyncPgConnection,
    restaurant_id: Uuid,
    request: PlaceOrder,
) -> Result<OrderDetails, ServiceError> {
    if request.lines.is_empty() {
        return Err(CartError::Empty.into());
    }

    conn.transaction::<_, ServiceError, _>(|conn| {
        async move {
            let table_number = request
                .table_number
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty());
            let table = match table_number {
                Some(number) => Some(
                    tables::find_by_number(conn, restaurant_id, number)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::invalid(format!("table {number} does not exist"))
                        })?,
                ),
                None => None,
            };

            let ids: Vec<Uuid> = request.lines.iter().map(|l| l.menu_item_id).collect();
            let menu: HashMap<Uuid, MenuItem> = schema::menu_items::table
                .filter(schema::menu_items::restaurant_id.eq(restaurant_id))
                .filter(schema::menu_items::id.eq_any(&ids))
                .select(MenuItem::as_select())
                .load::<MenuItem>(conn)
                .await?
                .into_iter()
                .map(|item| (item.id, item))
                .collect();
            let checkout = checkout_lines(&request.lines, &menu)?;

            let sequence: i64 = diesel::update(schema::restaurants::table.find(restaurant_id))
                .set(
                    schema::restaurants::order_sequence
                        .eq(schema::restaurants::order_sequence + 1),
                )
                .returning(schema::restaurants::order_sequence)
                .get_result(conn)
                .await
                .optional()?
                .ok_or(ServiceError::NotFound("restaurant"))?;

            let now = Utc::now();
            let order = Order {
                id: Uuid::new_v4(),
                restaurant_id,
                table_id: table.as_ref().map(|t| t.id),
                order_number: format_order_number(sequence),
                status: models::OrderStatus::Pending,
                total_amount: Some(checkout.total.with_scale(2)),
                customer_notes: request
                    .customer_notes
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty()),
                version: 1,
                created_at: now,
                updated_at: now,
            };
            let items = checkout
                .lines
                .iter()
                .map(|line| {
                    Ok(OrderItem {
                        id: Uuid::new_v4(),
                        order_id: order.id,
                        menu_item_id: line.menu_item_id,
                        quantity: i32::try_from(line.quantity)
                            .map_err(|_| CartError::InvalidQuantity)?,
                        unit_price: line.unit_price.clone(),
                        special_instructions: line.special_instructions.clone(),
                    })
                })
                .collect::<Result<Vec<_>, ServiceError>>()?;

            diesel::insert_into(schema::orders::table)
                .values(&order)
                .execute(conn)
                .await?;
            diesel::insert_into(schema::order_items::table)
                .values(&items)
                .execute(conn)
                .await?;

            let mut events = vec![ChangeEvent::inserted(
                ChangeTable::Orders,
                order.id,
                restaurant_id,
                &order,
            )?];
            for item in &items {
                events.push(ChangeEvent::inserted(
                    ChangeTable::OrderItems,
                    item.id,
                    restaurant_id,
                    item,
                )?);
            }
            ChangeEventPublisher::new(conn).publish_all(events).await?;

            info!(
                %restaurant_id,
                order_id = %order.id,
                order_number = %order.order_number,
                total = %checkout.total,
                "order placed"
            );

            let lines = items
                .into_iter()
                .map(|item| {
                    let menu_item = menu.get(&item.menu_item_id);
                    OrderLine {
                        name: menu_item.map(|m| m.name.clone()).unwrap_or_default(),
                        preparation_time: menu_item.map(|m| m.preparation_time).unwrap_or(0),
                        item,
                    }
                })
                .collect();
            Ok(OrderDetails {
                order,
                table_number: table.map(|t| t.table_number),
                items: lines,
            })
        }
        .scope_boxed()
    })
    .await
}

async fn with_details(
    conn: &mut AsyncPgConnection,
    orders: Vec<Order>,
) -> Result<Vec<OrderDetails>, ServiceError> {
    let order_ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
    let table_ids: Vec<Uuid> = orders.iter().filter_map(|o| o.table_id).collect();

    let mut lines_by_order: HashMap<Uuid, Vec<OrderLine>> = HashMap::new();
    let rows = schema::order_items::table
        .inner_join(schema::menu_items::table)
        .filter(schema::order_items::order_id.eq_any(&order_ids))
        .order(schema::menu_items::name.asc())
        .select((
            OrderItem::as_select(),
            schema::menu_items::name,
            schema::menu_items::preparation_time,
        ))
        .load::<(OrderItem, String, i32)>(conn)
        .await?;
    for (item, name, preparation_time) in rows {
        lines_by_order
            .entry(item.order_id)
            .or_default()
            .push(OrderLine {
                item,
                name,
                preparation_time,
            });
    }

    let table_numbers: HashMap<Uuid, String> = if table_ids.is_empty() {
        HashMap::new()
    } else {
        schema::restaurant_tables::table
            .filter(schema::restaurant_tables::id.eq_any(&table_ids))
            .select((
                schema::restaurant_tables::id,
                schema::restaurant_tables::table_number,
            ))
            .load::<(Uuid, String)>(conn)
            .await?
            .into_iter()
            .collect()
    };

    Ok(orders
        .into_iter()
        .map(|order| OrderDetails {
            table_number: order
                .table_id
                .and_then(|id| table_numbers.get(&id).cloned()),
            items: lines_by_order.remove(&order.id).unwrap_or_default(),
            order,
        })
        .collect())
}

/// Orders of one staff queue, newest first except for the kitchen queue.
pub async fn list(
    conn: &mut AsyncPgConnection,
    restaurant_id: Uuid,
    queue: OrderQueue,
    limit: Option<i64>,
) -> Result<Vec<OrderDetails>, ServiceError> {
    let statuses: Vec<models::OrderStatus> =
        queue.statuses().iter().map(|s| (*s).into()).collect();

    let mut query = schema::orders::table
        .filter(schema::orders::restaurant_id.eq(restaurant_id))
        .filter(schema::orders::status.eq_any(statuses))
        .select(Order::as_select())
        .into_boxed();
    query = if queue.oldest_first() {
        query.order(schema::orders::created_at.asc())
    } else {
        query.order(schema::orders::created_at.desc())
    };
    if let Some(limit) = limit {
        query = query.limit(limit);
    }

    let results: Vec<Order> = query.load(conn).await?;
    with_details(conn, results).await
}

pub async fn get(
    conn: &mut AsyncPgConnection,
    restaurant_id: Uuid,
    order_id: Uuid,
) -> Result<OrderDetails, ServiceError> {
    let order = schema::orders::table
        .filter(schema::orders::id.eq(order_id))
        .filter(schema::orders::restaurant_id.eq(restaurant_id))
        .select(Order::as_select())
        .first(conn)
        .await
        .optional()?
        .ok_or(ServiceError::NotFound("order"))?;
    with_details(conn, vec![order])
        .await?
        .pop()
        .ok_or(ServiceError::NotFound("order"))
}

/// Moves an order to `next`.
///
/// The row is locked for the duration of the check, so two staff members
/// pressing buttons at once are applied one after the other and the second
/// one is validated against the first one's result. When `expected_version`
/// is given it must match the stored version.
pub async fn update_status(
    conn: &mut AsyncPgConnection,
    restaurant_id: Uuid,
    order_id: Uuid,
    next: servelink_domain::OrderStatus,
    expected_version: Option<i64>,
    role: servelink_domain::StaffRole,
) -> Result<OrderDetails, ServiceError> {
    let result = apply_status(conn, restaurant_id, order_id, next, expected_version, role).await;
    match &result {
        Ok(details) => info!(
            %restaurant_id,
            %order_id,
            status = %next,
            version = details.order.version,
            "order status changed"
        ),
        Err(err) => warn!(%restaurant_id, %order_id, status = %next, %err, "status change rejected"),
    }
    result
}

async fn apply_status(
    conn: &mut AsyncPgConnection,
    restaurant_id: Uuid,
    order_id: Uuid,
    next: servelink_domain::OrderStatus,
    expected_version: Option<i64>,
    role: servelink_domain::StaffRole,
) -> Result<OrderDetails, ServiceError> {
    if !role.may_set_status(next) {
        return Err(ServiceError::forbidden(format!(
            "{role} staff cannot mark orders {next}"
        )));
    }

    let updated = conn
        .transaction::<_, ServiceError, _>(|conn| {
            async move {
                let order = schema::orders::table
                    .filter(schema::orders::id.eq(order_id))
                    .filter(schema::orders::restaurant_id.eq(restaurant_id))
                    .select(Order::as_select())
                    .for_update()
                    .first(conn)
                    .await
                    .optional()?
                    .ok_or(ServiceError::NotFound("order"))?;

                if let Some(expected) = expected_version {
                    if expected != order.version {
                        return Err(ServiceError::Conflict(format!(
                            "order was changed by someone else (version {} is not {})",
                            order.version, expected
                        )));
                    }
                }

                let current: servelink_domain::OrderStatus = order.status.into();
                let next = current.transition(next)?;

                let updated: Order = diesel::update(schema::orders::table.find(order_id))
                    .set((
                        schema::orders::status.eq(models::OrderStatus::from(next)),
                        schema::orders::version.eq(schema::orders::version + 1),
                        schema::orders::updated_at.eq(Utc::now()),
                    ))
                    .returning(Order::as_returning())
                    .get_result(conn)
                    .await?;

                ChangeEventPublisher::new(conn)
                    .publish(ChangeEvent::updated(
                        ChangeTable::Orders,
                        updated.id,
                        restaurant_id,
                        &updated,
                    )?)
                    .await?;
                Ok(updated)
            }
            .scope_boxed()
        })
        .await?;

    with_details(conn, vec![updated])
        .await?
        .pop()
        .ok_or(ServiceError::NotFound("order"))
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use bigdecimal::BigDecimal;

    use super::*;

    fn menu_item(name: &str, price: &str, is_available: bool) -> MenuItem {
        MenuItem {
            id: Uuid::new_v4(),
            restaurant_id: Uuid::nil(),
            category_id: None,
            name: name.to_string(),
            description: None,
            price: BigDecimal::from_str(price).unwrap(),
            preparation_time: 15,
            is_veg: true,
            is_available,
            image_url: None,
        }
    }

    fn line(item: &MenuItem, quantity: u32) -> OrderLineRequest {
        OrderLineRequest {
            menu_item_id: item.id,
            quantity,
            special_instructions: None,
        }
    }

    #[test]
    fn test_order_number_format() {
        assert_eq!(format_order_number(1), "0001");
        assert_eq!(format_order_number(42), "0042");
        assert_eq!(format_order_number(12345), "12345");
    }

    #[test]
    fn test_price_lines_uses_menu_prices() {
        let a = menu_item("Item A", "100.00", true);
        let b = menu_item("Item B", "50.00", true);
        let menu: HashMap<_, _> = [(a.id, a.clone()), (b.id, b.clone())].into_iter().collect();

        let cart = price_lines(&[line(&a, 2), line(&b, 1)], &menu).unwrap();
        let checkout = cart.into_checkout().unwrap();
        assert_eq!(checkout.lines.len(), 2);
        assert_eq!(checkout.total, BigDecimal::from_str("250.00").unwrap());
    }

    #[test]
    fn test_oversized_total_is_rejected() {
        let a = menu_item("Banquet", "99999999.99", true);
        let menu: HashMap<_, _> = [(a.id, a.clone())].into_iter().collect();

        assert!(checkout_lines(&[line(&a, 1)], &menu).is_ok());
        assert!(matches!(
            checkout_lines(&[line(&a, 2)], &menu),
            Err(ServiceError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_price_lines_merges_repeated_items() {
        let a = menu_item("Chai", "20", true);
        let menu: HashMap<_, _> = [(a.id, a.clone())].into_iter().collect();

        let cart = price_lines(&[line(&a, 1), line(&a, 2)], &menu).unwrap();
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.item_count(), 3);
    }

    #[test]
    fn test_price_lines_rejects_unknown_and_unavailable() {
        let sold_out = menu_item("Biryani", "250", false);
        let menu: HashMap<_, _> = [(sold_out.id, sold_out.clone())].into_iter().collect();

        assert!(matches!(
            price_lines(&[line(&sold_out, 1)], &menu),
            Err(ServiceError::InvalidArgument(_))
        ));
        let stranger = menu_item("Elsewhere", "1", true);
        assert!(matches!(
            price_lines(&[line(&stranger, 1)], &menu),
            Err(ServiceError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_price_lines_rejects_zero_quantity() {
        let a = menu_item("Lassi", "60", true);
        let menu: HashMap<_, _> = [(a.id, a.clone())].into_iter().collect();
        assert!(matches!(
            price_lines(&[line(&a, 0)], &menu),
            Err(ServiceError::Cart(CartError::InvalidQuantity))
        ));
    }
}
