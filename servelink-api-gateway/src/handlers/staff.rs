use axum::{
    Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{delete, get},
};
use servelink_domain::StaffRole;
use servelink_service::staff;
use tracing::instrument;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::*;

use super::{AppState, db, extract_user_id_from_token, verify_owner};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/restaurants/{restaurant_id}/staff",
            get(list_staff).post(assign_staff),
        )
        .route(
            "/restaurants/{restaurant_id}/staff/{user_id}",
            delete(remove_staff),
        )
}

#[utoipa::path(
    get,
    path = "/restaurants/{restaurant_id}/staff",
    responses(
        (status = 200, description = "Everyone linked to the restaurant", body = Vec<StaffMemberResponse>),
        (status = 401, description = "Unauthorized", body = ApiErrorResponse),
        (status = 403, description = "Only the owner may manage staff", body = ApiErrorResponse),
    ),
    params(
        ("restaurant_id" = Uuid, Path, description = "Restaurant ID")
    ),
    security(
        ("bearer" = [])
    ),
    tag = "staff"
)]
#[instrument(skip(state, headers))]
pub async fn list_staff(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(restaurant_id): Path<Uuid>,
) -> Result<Json<Vec<StaffMemberResponse>>, ApiError> {
    let user_id = extract_user_id_from_token(&state, &headers)?;
    let mut conn = db(&state).await?;
    verify_owner(&mut conn, user_id, restaurant_id).await?;

    let members = staff::list(&mut conn, restaurant_id).await?;
    Ok(Json(members.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/restaurants/{restaurant_id}/staff",
    request_body = AssignStaffRequest,
    responses(
        (status = 200, description = "User linked as kitchen or waiter staff", body = StaffMemberResponse),
        (status = 400, description = "Bad role or user already works elsewhere", body = ApiErrorResponse),
        (status = 403, description = "Only the owner may manage staff", body = ApiErrorResponse),
        (status = 404, description = "No user with that username", body = ApiErrorResponse),
    ),
    params(
        ("restaurant_id" = Uuid, Path, description = "Restaurant ID")
    ),
    security(
        ("bearer" = [])
    ),
    tag = "staff"
)]
#[instrument(skip(state, headers))]
pub async fn assign_staff(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(restaurant_id): Path<Uuid>,
    Json(payload): Json<AssignStaffRequest>,
) -> Result<Json<StaffMemberResponse>, ApiError> {
    let role: StaffRole = payload
        .role
        .parse()
        .map_err(|e: servelink_domain::role::ParseRoleError| ApiError::BadRequest(e.to_string()))?;
    let user_id = extract_user_id_from_token(&state, &headers)?;
    let mut conn = db(&state).await?;
    verify_owner(&mut conn, user_id, restaurant_id).await?;

    let member = staff::assign(
        &mut conn,
        restaurant_id,
        &payload.username,
        role,
        payload.full_name,
    )
    .await?;
    Ok(Json(member.into()))
}

#[utoipa::path(
    delete,
    path = "/restaurants/{restaurant_id}/staff/{user_id}",
    responses(
        (status = 204, description = "User unlinked from the restaurant"),
        (status = 400, description = "The owner cannot be removed", body = ApiErrorResponse),
        (status = 403, description = "Only the owner may manage staff", body = ApiErrorResponse),
        (status = 404, description = "Staff member not found", body = ApiErrorResponse),
    ),
    params(
        ("restaurant_id" = Uuid, Path, description = "Restaurant ID"),
        ("user_id" = Uuid, Path, description = "User ID of the staff member")
    ),
    security(
        ("bearer" = [])
    ),
    tag = "staff"
)]
#[instrument(skip(state, headers))]
pub async fn remove_staff(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((restaurant_id, member_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    let user_id = extract_user_id_from_token(&state, &headers)?;
    let mut conn = db(&state).await?;
    verify_owner(&mut conn, user_id, restaurant_id).await?;

    staff::unassign(&mut conn, restaurant_id, member_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
