use axum::{
    Router,
    extract::{Path, State},
    http::HeaderMap,
    response::Json,
    routing::get,
};
use servelink_service::analytics;
use tracing::instrument;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::*;

use super::{AppState, db, extract_user_id_from_token, verify_owner};

pub fn router() -> Router<AppState> {
    Router::new().route("/restaurants/{restaurant_id}/analytics", get(get_analytics))
}

#[utoipa::path(
    get,
    path = "/restaurants/{restaurant_id}/analytics",
    responses(
        (status = 200, description = "Totals, revenue of the last 7 active days and top 5 items", body = AnalyticsResponse),
        (status = 401, description = "Unauthorized", body = ApiErrorResponse),
        (status = 403, description = "Only the owner sees analytics", body = ApiErrorResponse),
    ),
    params(
        ("restaurant_id" = Uuid, Path, description = "Restaurant ID")
    ),
    security(
        ("bearer" = [])
    ),
    tag = "analytics"
)]
#[instrument(skip(state, headers))]
pub async fn get_analytics(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(restaurant_id): Path<Uuid>,
) -> Result<Json<AnalyticsResponse>, ApiError> {
    let user_id = extract_user_id_from_token(&state, &headers)?;
    let mut conn = db(&state).await?;
    verify_owner(&mut conn, user_id, restaurant_id).await?;

    let dashboard = analytics::dashboard(&mut conn, restaurant_id).await?;
    Ok(Json(dashboard.into()))
}
