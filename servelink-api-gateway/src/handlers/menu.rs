use axum::{
    Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, patch},
};
use serde::Deserialize;
use servelink_domain::MenuFilter;
use servelink_service::menu::{self, CategoryInput, DEFAULT_PREPARATION_MINUTES, MenuItemInput};
use tracing::instrument;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::*;

use super::{AppState, db, extract_user_id_from_token, verify_owner, verify_restaurant_access};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/restaurants/{restaurant_id}/menu/categories",
            get(list_categories).post(create_category),
        )
        .route(
            "/restaurants/{restaurant_id}/menu/categories/{category_id}",
            axum::routing::put(update_category).delete(delete_category),
        )
        .route(
            "/restaurants/{restaurant_id}/menu/items",
            get(list_items).post(create_item),
        )
        .route(
            "/restaurants/{restaurant_id}/menu/items/{item_id}",
            get(get_item).put(update_item).delete(delete_item),
        )
        .route(
            "/restaurants/{restaurant_id}/menu/items/{item_id}/availability",
            patch(update_availability),
        )
        .route("/menu/{restaurant_id}", get(get_public_menu))
}

#[derive(Debug, Deserialize)]
pub struct MenuQuery {
    pub category_id: Option<Uuid>,
}

impl From<CategoryRequest> for CategoryInput {
    fn from(r: CategoryRequest) -> Self {
        Self {
            name: r.name,
            description: r.description,
            is_active: r.is_active,
            display_order: r.display_order,
        }
    }
}

fn item_input(r: MenuItemRequest) -> Result<MenuItemInput, ApiError> {
    Ok(MenuItemInput {
        category_id: r.category_id,
        name: r.name,
        description: r.description,
        price: parse_money(&r.price)?,
        preparation_time: r.preparation_time.unwrap_or(DEFAULT_PREPARATION_MINUTES),
        is_veg: r.is_veg,
        is_available: r.is_available,
        image_url: r.image_url,
    })
}

#[utoipa::path(
    get,
    path = "/restaurants/{restaurant_id}/menu/categories",
    responses(
        (status = 200, description = "All categories by display order", body = Vec<CategoryResponse>),
        (status = 401, description = "Unauthorized", body = ApiErrorResponse),
        (status = 403, description = "No access to this restaurant", body = ApiErrorResponse),
    ),
    params(
        ("restaurant_id" = Uuid, Path, description = "Restaurant ID")
    ),
    security(
        ("bearer" = [])
    ),
    tag = "menu"
)]
#[instrument(skip(state, headers))]
pub async fn list_categories(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(restaurant_id): Path<Uuid>,
) -> Result<Json<Vec<CategoryResponse>>, ApiError> {
    let user_id = extract_user_id_from_token(&state, &headers)?;
    let mut conn = db(&state).await?;
    verify_restaurant_access(&mut conn, user_id, restaurant_id).await?;

    let categories = menu::list_categories(&mut conn, restaurant_id, false).await?;
    Ok(Json(categories.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/restaurants/{restaurant_id}/menu/categories",
    request_body = CategoryRequest,
    responses(
        (status = 200, description = "Category created", body = CategoryResponse),
        (status = 400, description = "Bad request", body = ApiErrorResponse),
        (status = 403, description = "Only the owner may edit the menu", body = ApiErrorResponse),
    ),
    params(
        ("restaurant_id" = Uuid, Path, description = "Restaurant ID")
    ),
    security(
        ("bearer" = [])
    ),
    tag = "menu"
)]
#[instrument(skip(state, headers))]
pub async fn create_category(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(restaurant_id): Path<Uuid>,
    Json(payload): Json<CategoryRequest>,
) -> Result<Json<CategoryResponse>, ApiError> {
    let user_id = extract_user_id_from_token(&state, &headers)?;
    let mut conn = db(&state).await?;
    verify_owner(&mut conn, user_id, restaurant_id).await?;

    let category = menu::create_category(&mut conn, restaurant_id, payload.into()).await?;
    Ok(Json(category.into()))
}

#[utoipa::path(
    put,
    path = "/restaurants/{restaurant_id}/menu/categories/{category_id}",
    request_body = CategoryRequest,
    responses(
        (status = 200, description = "Category updated", body = CategoryResponse),
        (status = 400, description = "Bad request", body = ApiErrorResponse),
        (status = 403, description = "Only the owner may edit the menu", body = ApiErrorResponse),
        (status = 404, description = "Category not found", body = ApiErrorResponse),
    ),
    params(
        ("restaurant_id" = Uuid, Path, description = "Restaurant ID"),
        ("category_id" = Uuid, Path, description = "Category ID")
    ),
    security(
        ("bearer" = [])
    ),
    tag = "menu"
)]
#[instrument(skip(state, headers))]
pub async fn update_category(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((restaurant_id, category_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<CategoryRequest>,
) -> Result<Json<CategoryResponse>, ApiError> {
    let user_id = extract_user_id_from_token(&state, &headers)?;
    let mut conn = db(&state).await?;
    verify_owner(&mut conn, user_id, restaurant_id).await?;

    let category =
        menu::update_category(&mut conn, restaurant_id, category_id, payload.into()).await?;
    Ok(Json(category.into()))
}

#[utoipa::path(
    delete,
    path = "/restaurants/{restaurant_id}/menu/categories/{category_id}",
    responses(
        (status = 204, description = "Category deleted; its items become uncategorised"),
        (status = 403, description = "Only the owner may edit the menu", body = ApiErrorResponse),
        (status = 404, description = "Category not found", body = ApiErrorResponse),
    ),
    params(
        ("restaurant_id" = Uuid, Path, description = "Restaurant ID"),
        ("category_id" = Uuid, Path, description = "Category ID")
    ),
    security(
        ("bearer" = [])
    ),
    tag = "menu"
)]
#[instrument(skip(state, headers))]
pub async fn delete_category(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((restaurant_id, category_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    let user_id = extract_user_id_from_token(&state, &headers)?;
    let mut conn = db(&state).await?;
    verify_owner(&mut conn, user_id, restaurant_id).await?;

    menu::delete_category(&mut conn, restaurant_id, category_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/restaurants/{restaurant_id}/menu/items",
    responses(
        (status = 200, description = "All items by name", body = Vec<MenuItemResponse>),
        (status = 401, description = "Unauthorized", body = ApiErrorResponse),
        (status = 403, description = "No access to this restaurant", body = ApiErrorResponse),
    ),
    params(
        ("restaurant_id" = Uuid, Path, description = "Restaurant ID"),
        ("category_id" = Option<Uuid>, Query, description = "Only items of this category")
    ),
    security(
        ("bearer" = [])
    ),
    tag = "menu"
)]
#[instrument(skip(state, headers))]
pub async fn list_items(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(restaurant_id): Path<Uuid>,
    Query(query): Query<MenuQuery>,
) -> Result<Json<Vec<MenuItemResponse>>, ApiError> {
    let user_id = extract_user_id_from_token(&state, &headers)?;
    let mut conn = db(&state).await?;
    verify_restaurant_access(&mut conn, user_id, restaurant_id).await?;

    let items = menu::list_items(
        &mut conn,
        restaurant_id,
        false,
        MenuFilter::from_category(query.category_id),
    )
    .await?;
    Ok(Json(items.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/restaurants/{restaurant_id}/menu/items",
    request_body = MenuItemRequest,
    responses(
        (status = 200, description = "Menu item created", body = MenuItemResponse),
        (status = 400, description = "Bad request", body = ApiErrorResponse),
        (status = 403, description = "Only the owner may edit the menu", body = ApiErrorResponse),
    ),
    params(
        ("restaurant_id" = Uuid, Path, description = "Restaurant ID")
    ),
    security(
        ("bearer" = [])
    ),
    tag = "menu"
)]
#[instrument(skip(state, headers))]
pub async fn create_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(restaurant_id): Path<Uuid>,
    Json(payload): Json<MenuItemRequest>,
) -> Result<Json<MenuItemResponse>, ApiError> {
    let input = item_input(payload)?;
    let user_id = extract_user_id_from_token(&state, &headers)?;
    let mut conn = db(&state).await?;
    verify_owner(&mut conn, user_id, restaurant_id).await?;

    let item = menu::create_item(&mut conn, restaurant_id, input).await?;
    Ok(Json(item.into()))
}

#[utoipa::path(
    get,
    path = "/restaurants/{restaurant_id}/menu/items/{item_id}",
    responses(
        (status = 200, description = "Menu item", body = MenuItemResponse),
        (status = 403, description = "No access to this restaurant", body = ApiErrorResponse),
        (status = 404, description = "Menu item not found", body = ApiErrorResponse),
    ),
    params(
        ("restaurant_id" = Uuid, Path, description = "Restaurant ID"),
        ("item_id" = Uuid, Path, description = "Menu item ID")
    ),
    security(
        ("bearer" = [])
    ),
    tag = "menu"
)]
#[instrument(skip(state, headers))]
pub async fn get_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((restaurant_id, item_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<MenuItemResponse>, ApiError> {
    let user_id = extract_user_id_from_token(&state, &headers)?;
    let mut conn = db(&state).await?;
    verify_restaurant_access(&mut conn, user_id, restaurant_id).await?;

    let item = menu::get_item(&mut conn, restaurant_id, item_id).await?;
    Ok(Json(item.into()))
}

#[utoipa::path(
    put,
    path = "/restaurants/{restaurant_id}/menu/items/{item_id}",
    request_body = MenuItemRequest,
    responses(
        (status = 200, description = "Menu item updated", body = MenuItemResponse),
        (status = 400, description = "Bad request", body = ApiErrorResponse),
        (status = 403, description = "Only the owner may edit the menu", body = ApiErrorResponse),
        (status = 404, description = "Menu item not found", body = ApiErrorResponse),
    ),
    params(
        ("restaurant_id" = Uuid, Path, description = "Restaurant ID"),
        ("item_id" = Uuid, Path, description = "Menu item ID")
    ),
    security(
        ("bearer" = [])
    ),
    tag = "menu"
)]
#[instrument(skip(state, headers))]
pub async fn update_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((restaurant_id, item_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<MenuItemRequest>,
) -> Result<Json<MenuItemResponse>, ApiError> {
    let input = item_input(payload)?;
    let user_id = extract_user_id_from_token(&state, &headers)?;
    let mut conn = db(&state).await?;
    verify_owner(&mut conn, user_id, restaurant_id).await?;

    let item = menu::update_item(&mut conn, restaurant_id, item_id, input).await?;
    Ok(Json(item.into()))
}

#[utoipa::path(
    patch,
    path = "/restaurants/{restaurant_id}/menu/items/{item_id}/availability",
    request_body = AvailabilityRequest,
    responses(
        (status = 200, description = "Availability changed", body = MenuItemResponse),
        (status = 403, description = "Only the owner may edit the menu", body = ApiErrorResponse),
        (status = 404, description = "Menu item not found", body = ApiErrorResponse),
    ),
    params(
        ("restaurant_id" = Uuid, Path, description = "Restaurant ID"),
        ("item_id" = Uuid, Path, description = "Menu item ID")
    ),
    security(
        ("bearer" = [])
    ),
    tag = "menu"
)]
#[instrument(skip(state, headers))]
pub async fn update_availability(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((restaurant_id, item_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<AvailabilityRequest>,
) -> Result<Json<MenuItemResponse>, ApiError> {
    let user_id = extract_user_id_from_token(&state, &headers)?;
    let mut conn = db(&state).await?;
    verify_owner(&mut conn, user_id, restaurant_id).await?;

    let item =
        menu::set_availability(&mut conn, restaurant_id, item_id, payload.is_available).await?;
    Ok(Json(item.into()))
}

#[utoipa::path(
    delete,
    path = "/restaurants/{restaurant_id}/menu/items/{item_id}",
    responses(
        (status = 204, description = "Menu item deleted"),
        (status = 403, description = "Only the owner may edit the menu", body = ApiErrorResponse),
        (status = 404, description = "Menu item not found", body = ApiErrorResponse),
        (status = 409, description = "Item is referenced by past orders", body = ApiErrorResponse),
    ),
    params(
        ("restaurant_id" = Uuid, Path, description = "Restaurant ID"),
        ("item_id" = Uuid, Path, description = "Menu item ID")
    ),
    security(
        ("bearer" = [])
    ),
    tag = "menu"
)]
#[instrument(skip(state, headers))]
pub async fn delete_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((restaurant_id, item_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    let user_id = extract_user_id_from_token(&state, &headers)?;
    let mut conn = db(&state).await?;
    verify_owner(&mut conn, user_id, restaurant_id).await?;

    menu::delete_item(&mut conn, restaurant_id, item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/menu/{restaurant_id}",
    responses(
        (status = 200, description = "Customer menu: active categories and available items", body = PublicMenuResponse),
        (status = 404, description = "Restaurant not found", body = ApiErrorResponse),
    ),
    params(
        ("restaurant_id" = Uuid, Path, description = "Restaurant ID"),
        ("category_id" = Option<Uuid>, Query, description = "Only items of this category")
    ),
    tag = "menu"
)]
#[instrument(skip(state))]
pub async fn get_public_menu(
    State(state): State<AppState>,
    Path(restaurant_id): Path<Uuid>,
    Query(query): Query<MenuQuery>,
) -> Result<Json<PublicMenuResponse>, ApiError> {
    let mut conn = db(&state).await?;
    let public = menu::public_menu(
        &mut conn,
        restaurant_id,
        MenuFilter::from_category(query.category_id),
    )
    .await?;
    Ok(Json(public.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(price: &str) -> MenuItemRequest {
        MenuItemRequest {
            category_id: None,
            name: "Veg Biryani".to_string(),
            description: None,
            price: price.to_string(),
            preparation_time: None,
            is_veg: true,
            is_available: true,
            image_url: None,
        }
    }

    #[test]
    fn test_item_input_defaults_preparation_time() {
        let input = item_input(request("220.50")).unwrap();
        assert_eq!(input.preparation_time, DEFAULT_PREPARATION_MINUTES);
        assert_eq!(format_money(&input.price), "220.50");
    }

    #[test]
    fn test_item_input_rejects_bad_price() {
        assert!(matches!(
            item_input(request("cheap")),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn test_category_defaults() {
        let request: CategoryRequest = serde_json::from_str(r#"{"name": "Starters"}"#).unwrap();
        let input = CategoryInput::from(request);
        assert!(input.is_active);
        assert_eq!(input.display_order, 0);
    }
}
