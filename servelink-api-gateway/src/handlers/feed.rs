use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, Query, State},
    http::HeaderMap,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::feed::{ChangeFilter, FeedItem, subscribe_stream};

use super::{AppState, bearer_token, db, user_id_from_token, verify_restaurant_access};

pub fn router() -> Router<AppState> {
    Router::new().route("/restaurants/{restaurant_id}/changes", get(subscribe_changes))
}

#[derive(Debug, Deserialize)]
pub struct ChangesQuery {
    /// Comma separated table names; all tables when absent.
    pub tables: Option<String>,
    /// `EventSource` cannot set headers, so the token may come in the query.
    pub access_token: Option<String>,
}

fn to_event(item: FeedItem) -> Event {
    match item {
        FeedItem::Change(change) => {
            let event = Event::default()
                .event(change.table.as_str())
                .id(change.id.to_string());
            match event.json_data(&*change) {
                Ok(event) => event,
                Err(err) => {
                    warn!(%err, "cannot encode change, asking client to resync");
                    Event::default().event("resync").data("encoding")
                }
            }
        }
        FeedItem::Resync { skipped } => Event::default()
            .event("resync")
            .data(skipped.to_string()),
    }
}

#[utoipa::path(
    get,
    path = "/restaurants/{restaurant_id}/changes",
    responses(
        (status = 200, description = "Server-sent events named after the changed table, JSON change as data; `resync` means reload", body = String, content_type = "text/event-stream"),
        (status = 400, description = "Unknown table name", body = crate::models::ApiErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::models::ApiErrorResponse),
        (status = 403, description = "No access to this restaurant", body = crate::models::ApiErrorResponse),
    ),
    params(
        ("restaurant_id" = Uuid, Path, description = "Restaurant ID"),
        ("tables" = Option<String>, Query, description = "e.g. `orders,order_items`"),
        ("access_token" = Option<String>, Query, description = "Token for clients that cannot send headers")
    ),
    security(
        ("bearer" = [])
    ),
    tag = "changes"
)]
#[instrument(skip(state, headers, query))]
pub async fn subscribe_changes(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(restaurant_id): Path<Uuid>,
    Query(query): Query<ChangesQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let filter = ChangeFilter::parse(query.tables.as_deref())
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let user_id = match query.access_token.as_deref() {
        Some(token) => user_id_from_token(&state, token)?,
        None => user_id_from_token(&state, bearer_token(&headers)?)?,
    };
    {
        let mut conn = db(&state).await?;
        verify_restaurant_access(&mut conn, user_id, restaurant_id).await?;
    }

    info!(%restaurant_id, %user_id, "change feed subscribed");
    let stream = subscribe_stream(state.hub.clone(), restaurant_id, filter)
        .map(|item| Ok::<_, Infallible>(to_event(item)));
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use super::*;
    use crate::handlers::test_support;

    async fn status_of(uri: String) -> StatusCode {
        let app = router().with_state(test_support::state());
        app.oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_feed_requires_token() {
        let uri = format!("/restaurants/{}/changes", Uuid::new_v4());
        assert_eq!(status_of(uri).await, StatusCode::UNAUTHORIZED);

        let uri = format!(
            "/restaurants/{}/changes?access_token=forged",
            Uuid::new_v4()
        );
        assert_eq!(status_of(uri).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_feed_rejects_unknown_tables() {
        let uri = format!("/restaurants/{}/changes?tables=orders,bills", Uuid::new_v4());
        assert_eq!(status_of(uri).await, StatusCode::BAD_REQUEST);
    }
}
