pub mod analytics;
pub mod auth;
pub mod cart;
pub mod feed;
pub mod menu;
pub mod order;
pub mod restaurant;
pub mod staff;
pub mod table;

// Re-export routers for easier importing
pub use analytics::router as analytics_router;
pub use auth::router as auth_router;
pub use cart::router as cart_router;
pub use feed::router as feed_router;
pub use menu::router as menu_router;
pub use order::router as order_router;
pub use restaurant::router as restaurant_router;
pub use staff::router as staff_router;
pub use table::router as table_router;

use std::sync::Arc;

use axum::http::HeaderMap;
use diesel_async::AsyncPgConnection;
use servelink_domain::StaffRole;
use servelink_service::{DbPool, PooledConnection, auth::AuthService, restaurants};
use utoipa::OpenApi;
use uuid::Uuid;

use crate::carts::CartStore;
use crate::error::ApiError;
use crate::feed::ChangeHub;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub auth: Arc<AuthService>,
    pub carts: CartStore,
    pub hub: ChangeHub,
    pub public_base_url: Arc<str>,
}

// Shared utility functions
fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let auth_header = headers
        .get("authorization")
        .ok_or(ApiError::AuthenticationFailed)?
        .to_str()
        .map_err(|_| ApiError::InvalidToken)?;

    auth_header
        .strip_prefix("Bearer ")
        .ok_or(ApiError::InvalidToken)
}

fn user_id_from_token(state: &AppState, token: &str) -> Result<Uuid, ApiError> {
    state
        .auth
        .verify_token(token)
        .map_err(|_| ApiError::InvalidToken)
}

fn extract_user_id_from_token(state: &AppState, headers: &HeaderMap) -> Result<Uuid, ApiError> {
    user_id_from_token(state, bearer_token(headers)?)
}

async fn db(state: &AppState) -> Result<PooledConnection, ApiError> {
    Ok(servelink_service::connection(&state.pool).await?)
}

/// Role the caller plays in `restaurant_id`. Fails unless they own it or
/// are assigned to it.
async fn verify_restaurant_access(
    conn: &mut AsyncPgConnection,
    user_id: Uuid,
    restaurant_id: Uuid,
) -> Result<StaffRole, ApiError> {
    Ok(restaurants::access(conn, user_id, restaurant_id).await?)
}

async fn verify_owner(
    conn: &mut AsyncPgConnection,
    user_id: Uuid,
    restaurant_id: Uuid,
) -> Result<(), ApiError> {
    Ok(restaurants::require_owner(conn, user_id, restaurant_id).await?)
}

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::create_user,
        auth::issue_token,
        auth::get_user_profile,
        restaurant::current_restaurant,
        restaurant::get_restaurant,
        restaurant::update_restaurant,
        menu::list_categories,
        menu::create_category,
        menu::update_category,
        menu::delete_category,
        menu::list_items,
        menu::create_item,
        menu::get_item,
        menu::update_item,
        menu::update_availability,
        menu::delete_item,
        menu::get_public_menu,
        table::list_tables,
        table::create_table,
        table::delete_table,
        cart::open_cart,
        cart::get_cart,
        cart::discard_cart,
        cart::add_item,
        cart::update_item,
        cart::remove_item,
        cart::decrement_item,
        cart::checkout,
        order::place_order,
        order::list_orders,
        order::get_order,
        order::update_order_status,
        staff::list_staff,
        staff::assign_staff,
        staff::remove_staff,
        analytics::get_analytics,
        feed::subscribe_changes,
    ),
    components(
        schemas(
            crate::models::CreateUserRequest,
            crate::models::CreateUserResponse,
            crate::models::IssueTokenRequest,
            crate::models::IssueTokenResponse,
            crate::models::UserProfile,
            crate::models::RestaurantResponse,
            crate::models::UpdateRestaurantRequest,
            crate::models::CategoryRequest,
            crate::models::CategoryResponse,
            crate::models::MenuItemRequest,
            crate::models::MenuItemResponse,
            crate::models::AvailabilityRequest,
            crate::models::PublicMenuResponse,
            crate::models::CreateTableRequest,
            crate::models::TableResponse,
            crate::models::OpenCartRequest,
            crate::models::CartLineResponse,
            crate::models::CartResponse,
            crate::models::AddCartItemRequest,
            crate::models::UpdateCartItemRequest,
            crate::models::CheckoutRequest,
            crate::models::OrderLineRequest,
            crate::models::PlaceOrderRequest,
            crate::models::OrderItemResponse,
            crate::models::OrderResponse,
            crate::models::ListOrdersResponse,
            crate::models::UpdateOrderStatusRequest,
            crate::models::StaffMemberResponse,
            crate::models::AssignStaffRequest,
            crate::models::SummaryResponse,
            crate::models::DailyRevenueResponse,
            crate::models::TopItemResponse,
            crate::models::AnalyticsResponse,
            crate::models::ApiErrorResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "users", description = "User management endpoints"),
        (name = "auth", description = "Authentication endpoints"),
        (name = "restaurants", description = "Restaurant endpoints"),
        (name = "menu", description = "Menu management and the public menu"),
        (name = "tables", description = "Tables and their QR codes"),
        (name = "carts", description = "Customer carts"),
        (name = "orders", description = "Order placement and status"),
        (name = "staff", description = "Staff management endpoints"),
        (name = "analytics", description = "Owner dashboard"),
        (name = "changes", description = "Live change feed")
    ),
    info(
        title = "ServeLink API",
        description = "Restaurant ordering backend",
        version = "1.0.0"
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            use utoipa::openapi::security::*;
            let password_flow = Password::new("/auth/token", Scopes::default());
            components.add_security_scheme(
                "bearer",
                SecurityScheme::OAuth2(OAuth2::new([Flow::Password(password_flow)])),
            );
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use chrono::TimeDelta;
    use servelink_service::{Config, auth::AuthService};

    use super::AppState;
    use crate::carts::CartStore;
    use crate::feed::ChangeHub;

    pub const SECRET: &str = "test-secret";

    /// State whose pool points at nothing; only usable for requests that are
    /// rejected before touching the database.
    pub fn state() -> AppState {
        let config = Config::from_lookup(|name| match name {
            "DATABASE_URL" => Some("postgres://localhost:1/unused".to_string()),
            "SECRET_KEY" => Some(SECRET.to_string()),
            _ => None,
        })
        .unwrap();
        AppState {
            pool: servelink_service::build_pool(&config).unwrap(),
            auth: Arc::new(AuthService::new(SECRET, TimeDelta::hours(1))),
            carts: CartStore::new(),
            hub: ChangeHub::new(),
            public_base_url: Arc::from(config.public_base_url.as_str()),
        }
    }
}
