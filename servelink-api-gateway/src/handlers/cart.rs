use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, patch, post},
};
use servelink_service::{menu, orders, restaurants, tables};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::carts::CartSession;
use crate::error::ApiError;
use crate::models::*;

use super::{AppState, db};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/menu/{restaurant_id}/carts", post(open_cart))
        .route("/carts/{cart_id}", get(get_cart).delete(discard_cart))
        .route("/carts/{cart_id}/items", post(add_item))
        .route(
            "/carts/{cart_id}/items/{menu_item_id}",
            patch(update_item).delete(remove_item),
        )
        .route(
            "/carts/{cart_id}/items/{menu_item_id}/decrement",
            post(decrement_item),
        )
        .route("/carts/{cart_id}/checkout", post(checkout))
}

fn cart_not_found() -> ApiError {
    ApiError::NotFound("cart not found".to_string())
}

fn with_cart<T>(
    state: &AppState,
    cart_id: Uuid,
    f: impl FnOnce(&mut CartSession) -> Result<T, ApiError>,
) -> Result<CartResponse, ApiError> {
    state
        .carts
        .update(cart_id, |session| {
            f(session)?;
            Ok(CartResponse::from(&*session))
        })
        .ok_or_else(cart_not_found)?
}

#[utoipa::path(
    post,
    path = "/menu/{restaurant_id}/carts",
    request_body = OpenCartRequest,
    responses(
        (status = 200, description = "Empty cart opened", body = CartResponse),
        (status = 400, description = "Unknown table", body = ApiErrorResponse),
        (status = 404, description = "Restaurant not found", body = ApiErrorResponse),
    ),
    params(
        ("restaurant_id" = Uuid, Path, description = "Restaurant ID")
    ),
    tag = "carts"
)]
#[instrument(skip(state))]
pub async fn open_cart(
    State(state): State<AppState>,
    Path(restaurant_id): Path<Uuid>,
    payload: Option<Json<OpenCartRequest>>,
) -> Result<Json<CartResponse>, ApiError> {
    let Json(payload) = payload.unwrap_or_default();
    let mut conn = db(&state).await?;
    restaurants::get(&mut conn, restaurant_id).await?;

    let table_number = match payload.table_number.as_deref().map(str::trim) {
        Some(number) if !number.is_empty() => {
            tables::find_by_number(&mut conn, restaurant_id, number)
                .await?
                .ok_or_else(|| ApiError::BadRequest(format!("table {number} does not exist")))?;
            Some(number.to_string())
        }
        _ => None,
    };

    let session = state.carts.open(restaurant_id, table_number);
    Ok(Json(CartResponse::from(&session)))
}

#[utoipa::path(
    get,
    path = "/carts/{cart_id}",
    responses(
        (status = 200, description = "Cart with its total", body = CartResponse),
        (status = 404, description = "Cart not found", body = ApiErrorResponse),
    ),
    params(
        ("cart_id" = Uuid, Path, description = "Cart ID")
    ),
    tag = "carts"
)]
#[instrument(skip(state))]
pub async fn get_cart(
    State(state): State<AppState>,
    Path(cart_id): Path<Uuid>,
) -> Result<Json<CartResponse>, ApiError> {
    let session = state.carts.get(cart_id).ok_or_else(cart_not_found)?;
    Ok(Json(CartResponse::from(&session)))
}

#[utoipa::path(
    delete,
    path = "/carts/{cart_id}",
    responses(
        (status = 204, description = "Cart discarded"),
        (status = 404, description = "Cart not found", body = ApiErrorResponse),
    ),
    params(
        ("cart_id" = Uuid, Path, description = "Cart ID")
    ),
    tag = "carts"
)]
#[instrument(skip(state))]
pub async fn discard_cart(
    State(state): State<AppState>,
    Path(cart_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.carts.remove(cart_id).ok_or_else(cart_not_found)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/carts/{cart_id}/items",
    request_body = AddCartItemRequest,
    responses(
        (status = 200, description = "Item added; repeated adds raise the quantity", body = CartResponse),
        (status = 400, description = "Item unavailable or quantity out of range", body = ApiErrorResponse),
        (status = 404, description = "Cart or menu item not found", body = ApiErrorResponse),
    ),
    params(
        ("cart_id" = Uuid, Path, description = "Cart ID")
    ),
    tag = "carts"
)]
#[instrument(skip(state))]
pub async fn add_item(
    State(state): State<AppState>,
    Path(cart_id): Path<Uuid>,
    Json(payload): Json<AddCartItemRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let session = state.carts.get(cart_id).ok_or_else(cart_not_found)?;
    let mut conn = db(&state).await?;
    let item = menu::get_item(&mut conn, session.restaurant_id, payload.menu_item_id).await?;
    if !item.is_available {
        return Err(ApiError::BadRequest(format!(
            "{} is currently unavailable",
            item.name
        )));
    }

    let quantity = payload.quantity.unwrap_or(1);
    let cart = with_cart(&state, cart_id, |session| {
        Ok(session
            .cart
            .add_quantity(item.id, item.name, item.price, quantity)?)
    })?;
    Ok(Json(cart))
}

#[utoipa::path(
    patch,
    path = "/carts/{cart_id}/items/{menu_item_id}",
    request_body = UpdateCartItemRequest,
    responses(
        (status = 200, description = "Line updated; quantity zero removes it", body = CartResponse),
        (status = 400, description = "Item not in cart or quantity out of range", body = ApiErrorResponse),
        (status = 404, description = "Cart not found", body = ApiErrorResponse),
    ),
    params(
        ("cart_id" = Uuid, Path, description = "Cart ID"),
        ("menu_item_id" = Uuid, Path, description = "Menu item ID")
    ),
    tag = "carts"
)]
#[instrument(skip(state))]
pub async fn update_item(
    State(state): State<AppState>,
    Path((cart_id, menu_item_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateCartItemRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = with_cart(&state, cart_id, |session| {
        Ok(session.cart.edit_line(
            menu_item_id,
            payload.quantity,
            payload.special_instructions,
        )?)
    })?;
    Ok(Json(cart))
}

#[utoipa::path(
    delete,
    path = "/carts/{cart_id}/items/{menu_item_id}",
    responses(
        (status = 200, description = "Line removed", body = CartResponse),
        (status = 404, description = "Cart not found", body = ApiErrorResponse),
    ),
    params(
        ("cart_id" = Uuid, Path, description = "Cart ID"),
        ("menu_item_id" = Uuid, Path, description = "Menu item ID")
    ),
    tag = "carts"
)]
#[instrument(skip(state))]
pub async fn remove_item(
    State(state): State<AppState>,
    Path((cart_id, menu_item_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = with_cart(&state, cart_id, |session| {
        session.cart.remove(menu_item_id);
        Ok(())
    })?;
    Ok(Json(cart))
}

#[utoipa::path(
    post,
    path = "/carts/{cart_id}/items/{menu_item_id}/decrement",
    responses(
        (status = 200, description = "One unit removed; the line goes at zero", body = CartResponse),
        (status = 400, description = "Item not in cart", body = ApiErrorResponse),
        (status = 404, description = "Cart not found", body = ApiErrorResponse),
    ),
    params(
        ("cart_id" = Uuid, Path, description = "Cart ID"),
        ("menu_item_id" = Uuid, Path, description = "Menu item ID")
    ),
    tag = "carts"
)]
#[instrument(skip(state))]
pub async fn decrement_item(
    State(state): State<AppState>,
    Path((cart_id, menu_item_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = with_cart(&state, cart_id, |session| {
        Ok(session.cart.decrement(menu_item_id)?)
    })?;
    Ok(Json(cart))
}

#[utoipa::path(
    post,
    path = "/carts/{cart_id}/checkout",
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Order placed and cart closed", body = OrderResponse),
        (status = 400, description = "Empty cart or item no longer available", body = ApiErrorResponse),
        (status = 404, description = "Cart not found", body = ApiErrorResponse),
    ),
    params(
        ("cart_id" = Uuid, Path, description = "Cart ID")
    ),
    tag = "carts"
)]
#[instrument(skip(state))]
pub async fn checkout(
    State(state): State<AppState>,
    Path(cart_id): Path<Uuid>,
    payload: Option<Json<CheckoutRequest>>,
) -> Result<Json<OrderResponse>, ApiError> {
    let Json(payload) = payload.unwrap_or_default();
    // Taken out so a second checkout of the same cart cannot race this one.
    let session = state.carts.remove(cart_id).ok_or_else(cart_not_found)?;

    let request = orders::PlaceOrder {
        table_number: session.table_number.clone(),
        customer_notes: payload.customer_notes,
        lines: session
            .cart
            .lines()
            .iter()
            .map(|line| orders::OrderLineRequest {
                menu_item_id: line.menu_item_id,
                quantity: line.quantity,
                special_instructions: line.special_instructions.clone(),
            })
            .collect(),
    };

    let placed = match db(&state).await {
        Ok(mut conn) => orders::place_order(&mut conn, session.restaurant_id, request)
            .await
            .map_err(ApiError::from),
        Err(err) => Err(err),
    };
    match placed {
        Ok(details) => {
            info!(%cart_id, order_id = %details.order.id, "cart checked out");
            Ok(Json(details.into()))
        }
        Err(err) => {
            state.carts.restore(session);
            Err(err)
        }
    }
}
