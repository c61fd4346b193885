use axum::{
    Router,
    extract::{Path, Query, State},
    http::HeaderMap,
    response::Json,
    routing::{get, patch, post},
};
use serde::Deserialize;
use servelink_domain::{OrderQueue, OrderStatus};
use servelink_service::orders::{self, MANAGEMENT_LIMIT};
use tracing::instrument;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::*;

use super::{AppState, db, extract_user_id_from_token, verify_restaurant_access};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/menu/{restaurant_id}/orders", post(place_order))
        .route("/restaurants/{restaurant_id}/orders", get(list_orders))
        .route(
            "/restaurants/{restaurant_id}/orders/{order_id}",
            get(get_order),
        )
        .route(
            "/restaurants/{restaurant_id}/orders/{order_id}/status",
            patch(update_order_status),
        )
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    pub queue: Option<OrderQueue>,
    pub limit: Option<i64>,
}

impl ListOrdersQuery {
    /// The unfiltered management view is capped unless a limit is given.
    fn resolve(&self) -> Result<(OrderQueue, Option<i64>), ApiError> {
        let queue = self.queue.unwrap_or_default();
        let limit = match self.limit {
            Some(limit) if limit < 1 => {
                return Err(ApiError::BadRequest("limit must be positive".to_string()));
            }
            Some(limit) => Some(limit),
            None if queue == OrderQueue::All => Some(MANAGEMENT_LIMIT),
            None => None,
        };
        Ok((queue, limit))
    }
}

#[utoipa::path(
    post,
    path = "/menu/{restaurant_id}/orders",
    request_body = PlaceOrderRequest,
    responses(
        (status = 200, description = "Order placed", body = OrderResponse),
        (status = 400, description = "Empty order, unknown table or unavailable item", body = ApiErrorResponse),
        (status = 404, description = "Restaurant not found", body = ApiErrorResponse),
    ),
    params(
        ("restaurant_id" = Uuid, Path, description = "Restaurant ID")
    ),
    tag = "orders"
)]
#[instrument(skip(state, payload))]
pub async fn place_order(
    State(state): State<AppState>,
    Path(restaurant_id): Path<Uuid>,
    Json(payload): Json<PlaceOrderRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let mut conn = db(&state).await?;
    let details = orders::place_order(&mut conn, restaurant_id, payload.into()).await?;
    Ok(Json(details.into()))
}

#[utoipa::path(
    get,
    path = "/restaurants/{restaurant_id}/orders",
    responses(
        (status = 200, description = "Orders of the requested queue", body = ListOrdersResponse),
        (status = 400, description = "Bad request", body = ApiErrorResponse),
        (status = 401, description = "Unauthorized", body = ApiErrorResponse),
        (status = 403, description = "No access to this restaurant", body = ApiErrorResponse),
    ),
    params(
        ("restaurant_id" = Uuid, Path, description = "Restaurant ID"),
        ("queue" = Option<String>, Query, description = "kitchen, waiter, active, history or all (default)"),
        ("limit" = Option<i64>, Query, description = "Maximum number of orders; `all` defaults to 100")
    ),
    security(
        ("bearer" = [])
    ),
    tag = "orders"
)]
#[instrument(skip(state, headers))]
pub async fn list_orders(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(restaurant_id): Path<Uuid>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<ListOrdersResponse>, ApiError> {
    let (queue, limit) = query.resolve()?;
    let user_id = extract_user_id_from_token(&state, &headers)?;
    let mut conn = db(&state).await?;
    verify_restaurant_access(&mut conn, user_id, restaurant_id).await?;

    let orders = orders::list(&mut conn, restaurant_id, queue, limit).await?;
    Ok(Json(orders.into()))
}

#[utoipa::path(
    get,
    path = "/restaurants/{restaurant_id}/orders/{order_id}",
    responses(
        (status = 200, description = "Order with its items", body = OrderResponse),
        (status = 401, description = "Unauthorized", body = ApiErrorResponse),
        (status = 403, description = "No access to this restaurant", body = ApiErrorResponse),
        (status = 404, description = "Order not found", body = ApiErrorResponse),
    ),
    params(
        ("restaurant_id" = Uuid, Path, description = "Restaurant ID"),
        ("order_id" = Uuid, Path, description = "Order ID")
    ),
    security(
        ("bearer" = [])
    ),
    tag = "orders"
)]
#[instrument(skip(state, headers))]
pub async fn get_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((restaurant_id, order_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<OrderResponse>, ApiError> {
    let user_id = extract_user_id_from_token(&state, &headers)?;
    let mut conn = db(&state).await?;
    verify_restaurant_access(&mut conn, user_id, restaurant_id).await?;

    let details = orders::get(&mut conn, restaurant_id, order_id).await?;
    Ok(Json(details.into()))
}

#[utoipa::path(
    patch,
    path = "/restaurants/{restaurant_id}/orders/{order_id}/status",
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Status changed and version bumped", body = OrderResponse),
        (status = 400, description = "Unknown status", body = ApiErrorResponse),
        (status = 403, description = "Role may not set this status", body = ApiErrorResponse),
        (status = 404, description = "Order not found", body = ApiErrorResponse),
        (status = 409, description = "Order changed since `expected_version`", body = ApiErrorResponse),
        (status = 422, description = "Transition not allowed", body = ApiErrorResponse),
    ),
    params(
        ("restaurant_id" = Uuid, Path, description = "Restaurant ID"),
        ("order_id" = Uuid, Path, description = "Order ID")
    ),
    security(
        ("bearer" = [])
    ),
    tag = "orders"
)]
#[instrument(skip(state, headers))]
pub async fn update_order_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((restaurant_id, order_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let next: OrderStatus = payload
        .status
        .parse()
        .map_err(|e: servelink_domain::order_status::ParseStatusError| {
            ApiError::BadRequest(e.to_string())
        })?;
    let user_id = extract_user_id_from_token(&state, &headers)?;
    let mut conn = db(&state).await?;
    let role = verify_restaurant_access(&mut conn, user_id, restaurant_id).await?;

    let details = orders::update_status(
        &mut conn,
        restaurant_id,
        order_id,
        next,
        payload.expected_version,
        role,
    )
    .await?;
    Ok(Json(details.into()))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use tower::ServiceExt;

    use super::*;
    use crate::handlers::test_support;

    fn query(queue: Option<OrderQueue>, limit: Option<i64>) -> ListOrdersQuery {
        ListOrdersQuery { queue, limit }
    }

    #[test]
    fn test_management_view_is_capped() {
        assert_eq!(
            query(None, None).resolve().unwrap(),
            (OrderQueue::All, Some(MANAGEMENT_LIMIT))
        );
        assert_eq!(
            query(Some(OrderQueue::Kitchen), None).resolve().unwrap(),
            (OrderQueue::Kitchen, None)
        );
        assert_eq!(
            query(Some(OrderQueue::All), Some(20)).resolve().unwrap(),
            (OrderQueue::All, Some(20))
        );
        assert!(query(None, Some(0)).resolve().is_err());
    }

    #[tokio::test]
    async fn test_unknown_status_is_rejected_before_auth() {
        let app = router().with_state(test_support::state());
        let uri = format!(
            "/restaurants/{}/orders/{}/status",
            Uuid::new_v4(),
            Uuid::new_v4()
        );

        let response = app
            .oneshot(
                Request::patch(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"status": "served"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_order_queue_requires_token() {
        let app = router().with_state(test_support::state());
        let response = app
            .oneshot(
                Request::get(format!(
                    "/restaurants/{}/orders?queue=kitchen",
                    Uuid::new_v4()
                ))
                .body(Body::empty())
                .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
