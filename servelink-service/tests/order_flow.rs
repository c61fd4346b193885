//! End-to-end flows against a real Postgres (`DATABASE_URL`).
//!
//! Run with `cargo test -p servelink-service -- --ignored`. Every test signs
//! up its own users, so the tests do not interfere with each other or with
//! existing data. The outbox checks expect no producer draining the outbox
//! while the tests run.

use bigdecimal::BigDecimal;
use chrono::{TimeDelta, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use servelink_domain::{MenuFilter, OrderQueue, OrderStatus, StaffRole};
use servelink_service::auth::AuthService;
use servelink_service::events::{self, ChangeEvent, ChangeOp, ChangeTable};
use servelink_service::menu::{CategoryInput, MenuItemInput};
use servelink_service::models::{MenuItem, Outbox, Restaurant};
use servelink_service::orders::{OrderLineRequest, PlaceOrder};
use servelink_service::{
    analytics, establish_connection, menu, orders, restaurants, run_migrations, schema, staff,
    tables, Config, ServiceError,
};
use uuid::Uuid;

const BASE_URL: &str = "http://localhost:8080";

async fn setup_database() -> AsyncPgConnection {
    let config = Config::from_env().unwrap();
    run_migrations(&config.database_url).await.unwrap();
    establish_connection(&config.database_url).await.unwrap()
}

fn auth() -> AuthService {
    AuthService::new("integration-secret", TimeDelta::hours(1))
}

fn unique(name: &str) -> String {
    format!("{name}-{}", Uuid::new_v4().simple())
}

fn item_input(category_id: Option<Uuid>, name: &str, price: i32) -> MenuItemInput {
    MenuItemInput {
        category_id,
        name: name.to_string(),
        description: None,
        price: BigDecimal::from(price),
        preparation_time: 20,
        is_veg: true,
        is_available: true,
        image_url: None,
    }
}

/// Change events waiting in the outbox for one restaurant, oldest first.
async fn outbox_events(conn: &mut AsyncPgConnection, restaurant_id: Uuid) -> Vec<ChangeEvent> {
    schema::outbox::table
        .filter(schema::outbox::key.eq(restaurant_id.to_string()))
        .order(schema::outbox::id.asc())
        .select(Outbox::as_select())
        .load::<Outbox>(conn)
        .await
        .unwrap()
        .into_iter()
        .map(|row| ChangeEvent::decode(&row.value).unwrap())
        .collect()
}

fn line(item: &MenuItem, quantity: u32) -> OrderLineRequest {
    OrderLineRequest {
        menu_item_id: item.id,
        quantity,
        special_instructions: None,
    }
}

/// Owner with a restaurant, one category, a categorised thali, an
/// uncategorised lassi and table 5.
async fn seed(conn: &mut AsyncPgConnection) -> (Uuid, Restaurant, Uuid, MenuItem, MenuItem) {
    let (owner, _) = auth()
        .create_user(conn, &unique("asha"), "passphrase", Some("Asha".to_string()))
        .await
        .unwrap();
    let (restaurant, role) = restaurants::resolve_for_user(conn, owner.id).await.unwrap();
    assert_eq!(role, StaffRole::Owner);
    assert_eq!(restaurant.name, "Asha's Restaurant");

    let category = menu::create_category(
        conn,
        restaurant.id,
        CategoryInput {
            name: "Mains".to_string(),
            description: None,
            is_active: true,
            display_order: 1,
        },
    )
    .await
    .unwrap();
    let thali = menu::create_item(conn, restaurant.id, item_input(Some(category.id), "Thali", 100))
        .await
        .unwrap();
    let lassi = menu::create_item(conn, restaurant.id, item_input(None, "Lassi", 50))
        .await
        .unwrap();

    let table = tables::create(conn, restaurant.id, "5", None, BASE_URL)
        .await
        .unwrap();
    assert_eq!(table.capacity, tables::DEFAULT_CAPACITY);
    assert!(table
        .qr_code
        .as_deref()
        .is_some_and(|qr| qr.starts_with("data:image/svg+xml;base64,")));

    (owner.id, restaurant, category.id, thali, lassi)
}

#[tokio::test]
#[ignore = "needs a running Postgres"]
async fn test_checkout_and_status_workflow() {
    let conn = &mut setup_database().await;
    let (_, restaurant, category_id, thali, lassi) = seed(conn).await;
    let seeded = outbox_events(conn, restaurant.id).await.len();

    let placed = orders::place_order(
        conn,
        restaurant.id,
        PlaceOrder {
            table_number: Some("5".to_string()),
            customer_notes: Some("no onions".to_string()),
            lines: vec![line(&thali, 2), line(&lassi, 1)],
        },
    )
    .await
    .unwrap();
    assert_eq!(placed.order.order_number, "0001");
    assert_eq!(placed.order.total_amount, Some(BigDecimal::from(250)));
    assert_eq!(placed.order.version, 1);
    assert_eq!(placed.table_number.as_deref(), Some("5"));
    assert_eq!(placed.items.len(), 2);
    let order_id = placed.order.id;

    let events = outbox_events(conn, restaurant.id).await;
    let checkout_events = &events[seeded..];
    assert_eq!(checkout_events.len(), 3);
    assert_eq!(checkout_events[0].table, ChangeTable::Orders);
    assert_eq!(checkout_events[0].op, ChangeOp::Insert);
    assert_eq!(checkout_events[0].id, order_id);
    assert!(checkout_events[1..]
        .iter()
        .all(|e| e.table == ChangeTable::OrderItems && e.op == ChangeOp::Insert));
    let mut written = events.len();

    let preparing = orders::update_status(
        conn,
        restaurant.id,
        order_id,
        OrderStatus::Preparing,
        Some(1),
        StaffRole::Kitchen,
    )
    .await
    .unwrap();
    assert_eq!(preparing.order.version, 2);

    let events = outbox_events(conn, restaurant.id).await;
    assert_eq!(events.len(), written + 1);
    let update = &events[written];
    assert_eq!(update.table, ChangeTable::Orders);
    assert_eq!(update.op, ChangeOp::Update);
    assert_eq!(update.id, order_id);
    let row = update.row.as_ref().unwrap();
    assert_eq!(row["status"], "preparing");
    assert_eq!(row["version"], 2);
    written = events.len();

    // Someone acting on the old version loses.
    let stale = orders::update_status(
        conn,
        restaurant.id,
        order_id,
        OrderStatus::Ready,
        Some(1),
        StaffRole::Kitchen,
    )
    .await;
    assert!(matches!(stale, Err(ServiceError::Conflict(_))));

    let waiter_cooks = orders::update_status(
        conn,
        restaurant.id,
        order_id,
        OrderStatus::Ready,
        None,
        StaffRole::Waiter,
    )
    .await;
    assert!(matches!(waiter_cooks, Err(ServiceError::Forbidden(_))));

    orders::update_status(
        conn,
        restaurant.id,
        order_id,
        OrderStatus::Ready,
        None,
        StaffRole::Kitchen,
    )
    .await
    .unwrap();

    let cancel_ready = orders::update_status(
        conn,
        restaurant.id,
        order_id,
        OrderStatus::Cancelled,
        None,
        StaffRole::Owner,
    )
    .await;
    assert!(matches!(cancel_ready, Err(ServiceError::Transition(_))));
    // preparing -> ready wrote one event; the rejected writes wrote none.
    assert_eq!(outbox_events(conn, restaurant.id).await.len(), written + 1);

    let completed = orders::update_status(
        conn,
        restaurant.id,
        order_id,
        OrderStatus::Completed,
        Some(3),
        StaffRole::Waiter,
    )
    .await
    .unwrap();
    assert_eq!(completed.order.version, 4);

    let history = orders::list(conn, restaurant.id, OrderQueue::History, None)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    let kitchen = orders::list(conn, restaurant.id, OrderQueue::Kitchen, None)
        .await
        .unwrap();
    assert!(kitchen.is_empty());

    let dashboard = analytics::dashboard(conn, restaurant.id).await.unwrap();
    assert_eq!(dashboard.summary.total_orders, 1);
    assert_eq!(dashboard.summary.total_revenue, BigDecimal::from(250));
    assert_eq!(dashboard.summary.total_tables, 1);
    assert_eq!(dashboard.top_items[0].name, "Thali");
    assert_eq!(dashboard.top_items[0].quantity, 2);

    let public = menu::public_menu(conn, restaurant.id, MenuFilter::Category(category_id))
        .await
        .unwrap();
    assert_eq!(public.items.len(), 1);
    assert_eq!(public.items[0].id, thali.id);

    // Past orders keep the item alive.
    let deleted = menu::delete_item(conn, restaurant.id, thali.id).await;
    assert!(matches!(deleted, Err(ServiceError::Conflict(_))));
}

#[tokio::test]
#[ignore = "needs a running Postgres"]
async fn test_rejected_checkout_leaves_nothing_behind() {
    let conn = &mut setup_database().await;
    let (_, restaurant, _, thali, lassi) = seed(conn).await;

    let empty = orders::place_order(conn, restaurant.id, PlaceOrder::default()).await;
    assert!(matches!(empty, Err(ServiceError::Cart(_))));

    let unknown_table = orders::place_order(
        conn,
        restaurant.id,
        PlaceOrder {
            table_number: Some("99".to_string()),
            customer_notes: None,
            lines: vec![line(&thali, 1)],
        },
    )
    .await;
    assert!(matches!(unknown_table, Err(ServiceError::InvalidArgument(_))));

    menu::set_availability(conn, restaurant.id, lassi.id, false)
        .await
        .unwrap();
    let unavailable = orders::place_order(
        conn,
        restaurant.id,
        PlaceOrder {
            table_number: None,
            customer_notes: None,
            lines: vec![line(&thali, 1), line(&lassi, 1)],
        },
    )
    .await;
    assert!(matches!(unavailable, Err(ServiceError::InvalidArgument(_))));

    let all = orders::list(conn, restaurant.id, OrderQueue::All, None)
        .await
        .unwrap();
    assert!(all.is_empty());

    // Failed attempts do not burn order numbers.
    let first = orders::place_order(
        conn,
        restaurant.id,
        PlaceOrder {
            table_number: None,
            customer_notes: None,
            lines: vec![line(&thali, 1)],
        },
    )
    .await
    .unwrap();
    assert_eq!(first.order.order_number, "0001");
    assert_eq!(first.table_number, None);
}

#[tokio::test]
#[ignore = "needs a running Postgres"]
async fn test_staff_assignment() {
    let conn = &mut setup_database().await;
    let (owner_id, restaurant, _, _, _) = seed(conn).await;
    let waiter_name = unique("ravi");
    let (waiter, _) = auth()
        .create_user(conn, &waiter_name, "passphrase", None)
        .await
        .unwrap();

    let denied = restaurants::access(conn, waiter.id, restaurant.id).await;
    assert!(matches!(denied, Err(ServiceError::Forbidden(_))));

    let as_owner = staff::assign(conn, restaurant.id, &waiter_name, StaffRole::Owner, None).await;
    assert!(matches!(as_owner, Err(ServiceError::InvalidArgument(_))));

    let member = staff::assign(
        conn,
        restaurant.id,
        &waiter_name,
        StaffRole::Waiter,
        Some("Ravi".to_string()),
    )
    .await
    .unwrap();
    assert_eq!(member.role, StaffRole::Waiter);
    assert_eq!(member.restaurant_id, Some(restaurant.id));

    assert_eq!(
        restaurants::access(conn, waiter.id, restaurant.id)
            .await
            .unwrap(),
        StaffRole::Waiter
    );
    let (resolved, role) = restaurants::resolve_for_user(conn, waiter.id).await.unwrap();
    assert_eq!(resolved.id, restaurant.id);
    assert_eq!(role, StaffRole::Waiter);
    assert!(restaurants::require_owner(conn, waiter.id, restaurant.id)
        .await
        .is_err());

    let members = staff::list(conn, restaurant.id).await.unwrap();
    assert!(members.iter().any(|m| m.user_id == owner_id));
    assert!(members.iter().any(|m| m.user_id == waiter.id));

    staff::unassign(conn, restaurant.id, waiter.id).await.unwrap();
    let denied = restaurants::access(conn, waiter.id, restaurant.id).await;
    assert!(matches!(denied, Err(ServiceError::Forbidden(_))));
}

#[tokio::test]
#[ignore = "needs a running Postgres"]
async fn test_outbox_purge_keeps_recent_events() {
    let conn = &mut setup_database().await;
    let (_, restaurant, _, _, _) = seed(conn).await;
    let recent = outbox_events(conn, restaurant.id).await.len();
    assert!(recent > 0);

    let stale_key = Uuid::new_v4().to_string();
    diesel::insert_into(schema::outbox::table)
        .values((
            schema::outbox::topic.eq(servelink_service::CHANGE_CHANNEL),
            schema::outbox::key.eq(&stale_key),
            schema::outbox::value.eq(b"{}".to_vec()),
            schema::outbox::created_at.eq(Utc::now() - TimeDelta::hours(2)),
        ))
        .execute(conn)
        .await
        .unwrap();

    let purged = events::purge_outbox(conn, Utc::now() - TimeDelta::hours(1))
        .await
        .unwrap();
    assert!(purged >= 1);
    assert_eq!(outbox_events(conn, restaurant.id).await.len(), recent);
    let stale: i64 = schema::outbox::table
        .filter(schema::outbox::key.eq(&stale_key))
        .count()
        .get_result(conn)
        .await
        .unwrap();
    assert_eq!(stale, 0);
}
