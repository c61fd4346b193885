use diesel::result::{DatabaseErrorKind, Error as DieselError};
use servelink_domain::{qr::QrError, CartError, TransitionError};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Conflict(String),
    #[error("invalid credentials")]
    Unauthenticated,
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Cart(#[from] CartError),
    #[error(transparent)]
    Qr(#[from] QrError),
    #[error("database error: {0}")]
    Database(DieselError),
    #[error("connection pool error: {0}")]
    Pool(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        ServiceError::InvalidArgument(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        ServiceError::Forbidden(msg.into())
    }
}

impl From<DieselError> for ServiceError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => ServiceError::NotFound("record"),
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                ServiceError::Conflict(format!("already exists: {}", info.message()))
            }
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
                ServiceError::Conflict(format!("still referenced: {}", info.message()))
            }
            DieselError::DatabaseError(DatabaseErrorKind::CheckViolation, info) => {
                ServiceError::InvalidArgument(info.message().to_string())
            }
            // diesel reports SQLSTATE 22003 as Unknown; only the message tells it apart.
            DieselError::DatabaseError(DatabaseErrorKind::Unknown, info)
                if is_numeric_out_of_range(info.message()) =>
            {
                ServiceError::InvalidArgument(info.message().to_string())
            }
            other => ServiceError::Database(other),
        }
    }
}

fn is_numeric_out_of_range(message: &str) -> bool {
    message.contains("numeric field overflow") || message.contains("out of range")
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::Internal(format!("cannot encode change event: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use servelink_domain::OrderStatus;

    use super::*;

    #[test]
    fn test_diesel_not_found() {
        assert!(matches!(
            ServiceError::from(DieselError::NotFound),
            ServiceError::NotFound(_)
        ));
    }

    #[test]
    fn test_numeric_overflow_is_invalid_argument() {
        let err = ServiceError::from(DieselError::DatabaseError(
            DatabaseErrorKind::Unknown,
            Box::new("numeric field overflow".to_string()),
        ));
        assert!(matches!(err, ServiceError::InvalidArgument(_)));

        let err = ServiceError::from(DieselError::DatabaseError(
            DatabaseErrorKind::Unknown,
            Box::new("deadlock detected".to_string()),
        ));
        assert!(matches!(err, ServiceError::Database(_)));
    }

    #[test]
    fn test_transition_message() {
        let err: ServiceError = OrderStatus::Completed
            .transition(OrderStatus::Pending)
            .unwrap_err()
            .into();
        assert!(matches!(err, ServiceError::Transition(_)));
        assert!(err.to_string().contains("completed"));
    }
}
