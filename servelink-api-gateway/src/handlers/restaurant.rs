use axum::{
    Router,
    extract::{Path, State},
    http::HeaderMap,
    response::Json,
    routing::get,
};
use servelink_service::restaurants;
use tracing::instrument;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::*;

use super::{AppState, db, extract_user_id_from_token, verify_owner, verify_restaurant_access};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/restaurants/current", get(current_restaurant))
        .route(
            "/restaurants/{restaurant_id}",
            get(get_restaurant).patch(update_restaurant),
        )
}

#[utoipa::path(
    get,
    path = "/restaurants/current",
    responses(
        (status = 200, description = "Restaurant the caller works for; created for new owners", body = RestaurantResponse),
        (status = 401, description = "Unauthorized", body = ApiErrorResponse),
        (status = 503, description = "Service unavailable", body = ApiErrorResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "restaurants"
)]
#[instrument(skip(state, headers))]
pub async fn current_restaurant(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<RestaurantResponse>, ApiError> {
    let user_id = extract_user_id_from_token(&state, &headers)?;
    let mut conn = db(&state).await?;

    let (restaurant, role) = restaurants::resolve_for_user(&mut conn, user_id).await?;
    Ok(Json(RestaurantResponse::new(restaurant, role)))
}

#[utoipa::path(
    get,
    path = "/restaurants/{restaurant_id}",
    responses(
        (status = 200, description = "Restaurant details", body = RestaurantResponse),
        (status = 401, description = "Unauthorized", body = ApiErrorResponse),
        (status = 403, description = "No access to this restaurant", body = ApiErrorResponse),
        (status = 404, description = "Restaurant not found", body = ApiErrorResponse),
    ),
    params(
        ("restaurant_id" = Uuid, Path, description = "Restaurant ID")
    ),
    security(
        ("bearer" = [])
    ),
    tag = "restaurants"
)]
#[instrument(skip(state, headers))]
pub async fn get_restaurant(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(restaurant_id): Path<Uuid>,
) -> Result<Json<RestaurantResponse>, ApiError> {
    let user_id = extract_user_id_from_token(&state, &headers)?;
    let mut conn = db(&state).await?;
    let role = verify_restaurant_access(&mut conn, user_id, restaurant_id).await?;

    let restaurant = restaurants::get(&mut conn, restaurant_id).await?;
    Ok(Json(RestaurantResponse::new(restaurant, role)))
}

#[utoipa::path(
    patch,
    path = "/restaurants/{restaurant_id}",
    request_body = UpdateRestaurantRequest,
    responses(
        (status = 200, description = "Restaurant renamed", body = RestaurantResponse),
        (status = 400, description = "Bad request", body = ApiErrorResponse),
        (status = 403, description = "Only the owner may rename", body = ApiErrorResponse),
    ),
    params(
        ("restaurant_id" = Uuid, Path, description = "Restaurant ID")
    ),
    security(
        ("bearer" = [])
    ),
    tag = "restaurants"
)]
#[instrument(skip(state, headers))]
pub async fn update_restaurant(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(restaurant_id): Path<Uuid>,
    Json(payload): Json<UpdateRestaurantRequest>,
) -> Result<Json<RestaurantResponse>, ApiError> {
    let user_id = extract_user_id_from_token(&state, &headers)?;
    let mut conn = db(&state).await?;
    verify_owner(&mut conn, user_id, restaurant_id).await?;

    let restaurant = restaurants::rename(&mut conn, restaurant_id, &payload.name).await?;
    Ok(Json(RestaurantResponse::new(
        restaurant,
        servelink_domain::StaffRole::Owner,
    )))
}
