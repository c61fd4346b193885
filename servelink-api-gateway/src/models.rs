use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use servelink_domain::{CartLine, OrderStatus, analytics, partition_active};
use servelink_service::{analytics::Dashboard, menu::PublicMenu, models, orders, staff};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::carts::CartSession;
use crate::error::ApiError;

/// Money goes over the wire as a decimal string with two places.
pub fn format_money(amount: &BigDecimal) -> String {
    amount.with_scale(2).to_string()
}

pub fn parse_money(amount: &str) -> Result<BigDecimal, ApiError> {
    BigDecimal::from_str(amount.trim())
        .map_err(|_| ApiError::BadRequest(format!("invalid amount `{amount}`")))
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    /// Username for the new user
    pub username: String,
    /// Password for the new user
    pub passphrase: String,
    /// Name shown to colleagues
    pub full_name: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateUserResponse {
    pub id: Uuid,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IssueTokenRequest {
    /// Grant type (must be "password")
    pub grant_type: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct IssueTokenResponse {
    /// Token type (e.g., "bearer")
    pub token_type: String,
    pub access_token: String,
    /// Token expiration time in seconds
    pub expires_in: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub full_name: Option<String>,
    /// owner, kitchen or waiter
    pub role: String,
    pub restaurant_id: Option<Uuid>,
    /// Screen the client should open after sign-in
    pub home_path: String,
}

impl From<staff::StaffMember> for UserProfile {
    fn from(m: staff::StaffMember) -> Self {
        Self {
            id: m.user_id,
            username: m.username,
            full_name: m.full_name,
            role: m.role.to_string(),
            restaurant_id: m.restaurant_id,
            home_path: m.role.home_path().to_string(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RestaurantResponse {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    /// Role of the caller in this restaurant
    pub role: String,
}

impl RestaurantResponse {
    pub fn new(r: models::Restaurant, role: servelink_domain::StaffRole) -> Self {
        Self {
            id: r.id,
            name: r.name,
            owner_id: r.owner_id,
            role: role.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateRestaurantRequest {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CategoryRequest {
    pub name: String,
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub display_order: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CategoryResponse {
    pub id: Uuid,
    pub restaurant_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub display_order: i32,
}

impl From<models::MenuCategory> for CategoryResponse {
    fn from(c: models::MenuCategory) -> Self {
        Self {
            id: c.id,
            restaurant_id: c.restaurant_id,
            name: c.name,
            description: c.description,
            is_active: c.is_active,
            display_order: c.display_order,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MenuItemRequest {
    pub category_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    /// Price of the menu item (as string)
    pub price: String,
    /// Minutes, defaults to 15
    pub preparation_time: Option<i32>,
    #[serde(default = "default_true")]
    pub is_veg: bool,
    #[serde(default = "default_true")]
    pub is_available: bool,
    pub image_url: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MenuItemResponse {
    pub id: Uuid,
    pub restaurant_id: Uuid,
    pub category_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub price: String,
    pub preparation_time: i32,
    pub is_veg: bool,
    pub is_available: bool,
    pub image_url: Option<String>,
}

impl From<models::MenuItem> for MenuItemResponse {
    fn from(i: models::MenuItem) -> Self {
        Self {
            id: i.id,
            restaurant_id: i.restaurant_id,
            category_id: i.category_id,
            name: i.name,
            description: i.description,
            price: format_money(&i.price),
            preparation_time: i.preparation_time,
            is_veg: i.is_veg,
            is_available: i.is_available,
            image_url: i.image_url,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AvailabilityRequest {
    pub is_available: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PublicMenuResponse {
    pub restaurant_id: Uuid,
    pub restaurant_name: String,
    pub categories: Vec<CategoryResponse>,
    pub items: Vec<MenuItemResponse>,
}

impl From<PublicMenu> for PublicMenuResponse {
    fn from(m: PublicMenu) -> Self {
        Self {
            restaurant_id: m.restaurant_id,
            restaurant_name: m.restaurant_name,
            categories: m.categories.into_iter().map(Into::into).collect(),
            items: m.items.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateTableRequest {
    pub table_number: String,
    /// Seats, defaults to 4
    pub capacity: Option<i32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TableResponse {
    pub id: Uuid,
    pub restaurant_id: Uuid,
    pub table_number: String,
    pub capacity: i32,
    /// `data:` URL of the SVG QR code
    pub qr_code: Option<String>,
    /// URL encoded in the QR code
    pub menu_url: Option<String>,
}

impl TableResponse {
    pub fn new(t: models::RestaurantTable, public_base_url: &str) -> Self {
        let menu_url =
            servelink_domain::qr::table_menu_url(public_base_url, t.restaurant_id, &t.table_number)
                .ok();
        Self {
            id: t.id,
            restaurant_id: t.restaurant_id,
            table_number: t.table_number,
            capacity: t.capacity,
            qr_code: t.qr_code,
            menu_url,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct OpenCartRequest {
    /// Table number taken from the scanned QR code
    pub table_number: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartLineResponse {
    pub menu_item_id: Uuid,
    pub name: String,
    pub unit_price: String,
    pub quantity: u32,
    pub special_instructions: Option<String>,
    pub line_total: String,
}

impl From<&CartLine> for CartLineResponse {
    fn from(l: &CartLine) -> Self {
        Self {
            menu_item_id: l.menu_item_id,
            name: l.name.clone(),
            unit_price: format_money(&l.unit_price),
            quantity: l.quantity,
            special_instructions: l.special_instructions.clone(),
            line_total: format_money(&l.line_total()),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartResponse {
    pub id: Uuid,
    pub restaurant_id: Uuid,
    pub table_number: Option<String>,
    pub lines: Vec<CartLineResponse>,
    pub item_count: u32,
    pub total: String,
}

impl From<&CartSession> for CartResponse {
    fn from(s: &CartSession) -> Self {
        Self {
            id: s.id,
            restaurant_id: s.restaurant_id,
            table_number: s.table_number.clone(),
            lines: s.cart.lines().iter().map(Into::into).collect(),
            item_count: s.cart.item_count(),
            total: format_money(&s.cart.total()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AddCartItemRequest {
    pub menu_item_id: Uuid,
    /// Defaults to 1
    pub quantity: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateCartItemRequest {
    /// Zero removes the line
    pub quantity: Option<u32>,
    pub special_instructions: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    pub customer_notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderLineRequest {
    pub menu_item_id: Uuid,
    pub quantity: u32,
    pub special_instructions: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PlaceOrderRequest {
    pub table_number: Option<String>,
    pub customer_notes: Option<String>,
    pub items: Vec<OrderLineRequest>,
}

impl From<PlaceOrderRequest> for orders::PlaceOrder {
    fn from(r: PlaceOrderRequest) -> Self {
        Self {
            table_number: r.table_number,
            customer_notes: r.customer_notes,
            lines: r
                .items
                .into_iter()
                .map(|l| orders::OrderLineRequest {
                    menu_item_id: l.menu_item_id,
                    quantity: l.quantity,
                    special_instructions: l.special_instructions,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub menu_item_id: Uuid,
    pub name: String,
    pub quantity: i32,
    pub unit_price: String,
    pub special_instructions: Option<String>,
    pub preparation_time: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub restaurant_id: Uuid,
    pub table_id: Option<Uuid>,
    pub table_number: Option<String>,
    pub order_number: String,
    /// pending, preparing, ready, completed or cancelled
    pub status: String,
    pub total_amount: Option<String>,
    pub customer_notes: Option<String>,
    /// Pass back as `expected_version` when changing the status
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderItemResponse>,
}

impl From<orders::OrderDetails> for OrderResponse {
    fn from(d: orders::OrderDetails) -> Self {
        let status: servelink_domain::OrderStatus = d.order.status.into();
        Self {
            id: d.order.id,
            restaurant_id: d.order.restaurant_id,
            table_id: d.order.table_id,
            table_number: d.table_number,
            order_number: d.order.order_number,
            status: status.to_string(),
            total_amount: d.order.total_amount.as_ref().map(format_money),
            customer_notes: d.order.customer_notes,
            version: d.order.version,
            created_at: d.order.created_at,
            updated_at: d.order.updated_at,
            items: d
                .items
                .into_iter()
                .map(|l| OrderItemResponse {
                    id: l.item.id,
                    menu_item_id: l.item.menu_item_id,
                    name: l.name,
                    quantity: l.item.quantity,
                    unit_price: format_money(&l.item.unit_price),
                    special_instructions: l.item.special_instructions,
                    preparation_time: l.preparation_time,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListOrdersResponse {
    pub orders: Vec<OrderResponse>,
    /// Pending, preparing or ready orders in this page
    pub active_count: usize,
    /// Completed or cancelled orders in this page
    pub history_count: usize,
}

impl From<Vec<orders::OrderDetails>> for ListOrdersResponse {
    fn from(details: Vec<orders::OrderDetails>) -> Self {
        let statuses: Vec<OrderStatus> = details.iter().map(|d| d.order.status.into()).collect();
        let (active, history) = partition_active(statuses, |s| *s);
        Self {
            orders: details.into_iter().map(Into::into).collect(),
            active_count: active.len(),
            history_count: history.len(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    /// Target status
    pub status: String,
    /// Version the client last saw; a mismatch is rejected with 409
    pub expected_version: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StaffMemberResponse {
    pub user_id: Uuid,
    pub username: String,
    pub full_name: Option<String>,
    pub role: String,
}

impl From<staff::StaffMember> for StaffMemberResponse {
    fn from(m: staff::StaffMember) -> Self {
        Self {
            user_id: m.user_id,
            username: m.username,
            full_name: m.full_name,
            role: m.role.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AssignStaffRequest {
    /// Username of an existing account
    pub username: String,
    /// kitchen or waiter
    pub role: String,
    pub full_name: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SummaryResponse {
    pub total_orders: usize,
    pub total_revenue: String,
    pub avg_order_value: String,
    pub total_tables: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DailyRevenueResponse {
    pub day: NaiveDate,
    pub revenue: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TopItemResponse {
    pub name: String,
    pub quantity: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AnalyticsResponse {
    pub summary: SummaryResponse,
    pub revenue_by_day: Vec<DailyRevenueResponse>,
    pub top_items: Vec<TopItemResponse>,
}

impl From<Dashboard> for AnalyticsResponse {
    fn from(d: Dashboard) -> Self {
        let analytics::Summary {
            total_orders,
            total_revenue,
            avg_order_value,
            total_tables,
        } = d.summary;
        Self {
            summary: SummaryResponse {
                total_orders,
                total_revenue: format_money(&total_revenue),
                avg_order_value: format_money(&avg_order_value),
                total_tables,
            },
            revenue_by_day: d
                .revenue_by_day
                .into_iter()
                .map(|r| DailyRevenueResponse {
                    day: r.day,
                    revenue: format_money(&r.revenue),
                })
                .collect(),
            top_items: d
                .top_items
                .into_iter()
                .map(|t| TopItemResponse {
                    name: t.name,
                    quantity: t.quantity,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiErrorResponse {
    /// Error message
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_has_two_places() {
        assert_eq!(format_money(&parse_money("250").unwrap()), "250.00");
        assert_eq!(format_money(&parse_money(" 12.5 ").unwrap()), "12.50");
        assert!(parse_money("twelve").is_err());
    }

    #[test]
    fn test_cart_response_totals() {
        let mut session = CartSession::new(Uuid::new_v4(), Some("4".to_string()));
        let item = Uuid::new_v4();
        session
            .cart
            .add_quantity(item, "Paneer Tikka", parse_money("180").unwrap(), 2)
            .unwrap();

        let response = CartResponse::from(&session);
        assert_eq!(response.item_count, 2);
        assert_eq!(response.total, "360.00");
        assert_eq!(response.lines[0].line_total, "360.00");
        assert_eq!(response.table_number.as_deref(), Some("4"));
    }

    fn details(status: models::OrderStatus) -> orders::OrderDetails {
        let now = Utc::now();
        orders::OrderDetails {
            order: models::Order {
                id: Uuid::new_v4(),
                restaurant_id: Uuid::new_v4(),
                table_id: None,
                order_number: "0001".to_string(),
                status,
                total_amount: Some(parse_money("90").unwrap()),
                customer_notes: None,
                version: 1,
                created_at: now,
                updated_at: now,
            },
            table_number: None,
            items: vec![],
        }
    }

    #[test]
    fn test_order_list_counts() {
        let response = ListOrdersResponse::from(vec![
            details(models::OrderStatus::Ready),
            details(models::OrderStatus::Cancelled),
            details(models::OrderStatus::Pending),
        ]);
        assert_eq!(response.orders.len(), 3);
        assert_eq!(response.active_count, 2);
        assert_eq!(response.history_count, 1);
        assert_eq!(response.orders[0].status, "ready");
        assert_eq!(response.orders[0].total_amount.as_deref(), Some("90.00"));
    }
}
