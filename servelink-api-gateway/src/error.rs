use axum::{http::StatusCode, response::Json};
use serde_json::json;
use servelink_domain::CartError;
use servelink_service::ServiceError;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication failed")]
    AuthenticationFailed,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Unprocessable: {0}")]
    Unprocessable(String),
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::AuthenticationFailed | ApiError::InvalidToken => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(what) => ApiError::NotFound(format!("{what} not found")),
            ServiceError::InvalidArgument(msg) => ApiError::BadRequest(msg),
            ServiceError::Forbidden(msg) => ApiError::Forbidden(msg),
            ServiceError::Conflict(msg) => ApiError::Conflict(msg),
            ServiceError::Unauthenticated => ApiError::AuthenticationFailed,
            ServiceError::Transition(e) => ApiError::Unprocessable(e.to_string()),
            ServiceError::Cart(e) => ApiError::BadRequest(e.to_string()),
            ServiceError::Pool(msg) => {
                error!(%msg, "database unavailable");
                ApiError::ServiceUnavailable("database unavailable".to_string())
            }
            other @ (ServiceError::Qr(_)
            | ServiceError::Database(_)
            | ServiceError::Internal(_)) => {
                error!(err = %other, "request failed");
                ApiError::InternalError("internal error".to_string())
            }
        }
    }
}

impl From<CartError> for ApiError {
    fn from(err: CartError) -> Self {
        ServiceError::Cart(err).into()
    }
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_message) = match &self {
            ApiError::AuthenticationFailed => (self.status(), "Authentication failed".to_string()),
            ApiError::InvalidToken => (self.status(), "Invalid token".to_string()),
            ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Conflict(msg)
            | ApiError::Unprocessable(msg)
            | ApiError::ServiceUnavailable(msg)
            | ApiError::InternalError(msg) => (self.status(), msg.clone()),
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::response::IntoResponse;
    use servelink_domain::OrderStatus;

    use super::*;

    #[test]
    fn test_service_error_status_codes() {
        let cases = [
            (ServiceError::NotFound("order"), StatusCode::NOT_FOUND),
            (ServiceError::invalid("bad"), StatusCode::BAD_REQUEST),
            (ServiceError::forbidden("no"), StatusCode::FORBIDDEN),
            (
                ServiceError::Conflict("stale".to_string()),
                StatusCode::CONFLICT,
            ),
            (ServiceError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (
                ServiceError::Cart(CartError::Empty),
                StatusCode::BAD_REQUEST,
            ),
            (
                ServiceError::Pool("timeout".to_string()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                ServiceError::Internal("boom".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_invalid_transition_is_unprocessable() {
        let err = OrderStatus::Ready
            .transition(OrderStatus::Cancelled)
            .unwrap_err();
        let api_error = ApiError::from(ServiceError::from(err));
        assert_eq!(api_error.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            api_error.into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
