use axum::{
    Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{delete, get},
};
use servelink_service::tables;
use tracing::instrument;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::*;

use super::{AppState, db, extract_user_id_from_token, verify_owner, verify_restaurant_access};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/restaurants/{restaurant_id}/tables",
            get(list_tables).post(create_table),
        )
        .route(
            "/restaurants/{restaurant_id}/tables/{table_id}",
            delete(delete_table),
        )
}

#[utoipa::path(
    get,
    path = "/restaurants/{restaurant_id}/tables",
    responses(
        (status = 200, description = "Tables by table number", body = Vec<TableResponse>),
        (status = 401, description = "Unauthorized", body = ApiErrorResponse),
        (status = 403, description = "No access to this restaurant", body = ApiErrorResponse),
    ),
    params(
        ("restaurant_id" = Uuid, Path, description = "Restaurant ID")
    ),
    security(
        ("bearer" = [])
    ),
    tag = "tables"
)]
#[instrument(skip(state, headers))]
pub async fn list_tables(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(restaurant_id): Path<Uuid>,
) -> Result<Json<Vec<TableResponse>>, ApiError> {
    let user_id = extract_user_id_from_token(&state, &headers)?;
    let mut conn = db(&state).await?;
    verify_restaurant_access(&mut conn, user_id, restaurant_id).await?;

    let tables = tables::list(&mut conn, restaurant_id).await?;
    Ok(Json(
        tables
            .into_iter()
            .map(|t| TableResponse::new(t, &state.public_base_url))
            .collect(),
    ))
}

#[utoipa::path(
    post,
    path = "/restaurants/{restaurant_id}/tables",
    request_body = CreateTableRequest,
    responses(
        (status = 200, description = "Table created with its QR code", body = TableResponse),
        (status = 400, description = "Bad request", body = ApiErrorResponse),
        (status = 403, description = "Only the owner may add tables", body = ApiErrorResponse),
        (status = 409, description = "Table number already in use", body = ApiErrorResponse),
    ),
    params(
        ("restaurant_id" = Uuid, Path, description = "Restaurant ID")
    ),
    security(
        ("bearer" = [])
    ),
    tag = "tables"
)]
#[instrument(skip(state, headers))]
pub async fn create_table(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(restaurant_id): Path<Uuid>,
    Json(payload): Json<CreateTableRequest>,
) -> Result<Json<TableResponse>, ApiError> {
    let user_id = extract_user_id_from_token(&state, &headers)?;
    let mut conn = db(&state).await?;
    verify_owner(&mut conn, user_id, restaurant_id).await?;

    let table = tables::create(
        &mut conn,
        restaurant_id,
        &payload.table_number,
        payload.capacity,
        &state.public_base_url,
    )
    .await?;
    Ok(Json(TableResponse::new(table, &state.public_base_url)))
}

#[utoipa::path(
    delete,
    path = "/restaurants/{restaurant_id}/tables/{table_id}",
    responses(
        (status = 204, description = "Table deleted"),
        (status = 403, description = "Only the owner may delete tables", body = ApiErrorResponse),
        (status = 404, description = "Table not found", body = ApiErrorResponse),
    ),
    params(
        ("restaurant_id" = Uuid, Path, description = "Restaurant ID"),
        ("table_id" = Uuid, Path, description = "Table ID")
    ),
    security(
        ("bearer" = [])
    ),
    tag = "tables"
)]
#[instrument(skip(state, headers))]
pub async fn delete_table(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((restaurant_id, table_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    let user_id = extract_user_id_from_token(&state, &headers)?;
    let mut conn = db(&state).await?;
    verify_owner(&mut conn, user_id, restaurant_id).await?;

    tables::delete(&mut conn, restaurant_id, table_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
