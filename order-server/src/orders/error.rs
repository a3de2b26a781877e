use super::storage::StorageError;
use shared::error::{AppError, ErrorCode};
use thiserror::Error;

/// Lifecycle engine errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("{0}")]
    Validation(String),

    #[error("Order must contain at least one item")]
    EmptyOrder,

    #[error("{0}")]
    InvalidQuantity(String),

    #[error("{0}")]
    InvalidPrice(String),

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("Invalid payment status: {0}")]
    InvalidPaymentStatus(String),

    #[error("Nothing to update: provide status or paymentStatus")]
    NothingToUpdate,

    #[error("Transition not allowed: {from} -> {to}")]
    TransitionNotAllowed { from: String, to: String },

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Not authorized")]
    Forbidden,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Map a storage failure onto an error code (clients localize by code)
fn classify_storage_error(e: &StorageError) -> ErrorCode {
    match e {
        StorageError::OrderNotFound(_) => ErrorCode::OrderNotFound,
        StorageError::OrderExists(_) => ErrorCode::AlreadyExists,
        StorageError::Timeout(_) | StorageError::Abandoned => ErrorCode::TimeoutError,
        StorageError::Serialization(_) | StorageError::Task(_) => ErrorCode::InternalError,
        _ => ErrorCode::DatabaseError,
    }
}

impl From<LifecycleError> for AppError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::Storage(e) => {
                let code = classify_storage_error(&e);
                tracing::error!(error = %e, error_code = ?code, "Storage error occurred");
                match code {
                    ErrorCode::OrderNotFound | ErrorCode::AlreadyExists => {
                        AppError::with_message(code, e.to_string())
                    }
                    // Technical details stay in the log
                    _ => AppError::new(code),
                }
            }
            LifecycleError::Validation(msg) => AppError::validation(msg),
            LifecycleError::EmptyOrder => AppError::with_message(
                ErrorCode::OrderEmpty,
                "Order must contain at least one item",
            )
            .with_detail("field", "items"),
            LifecycleError::InvalidQuantity(msg) => {
                AppError::with_message(ErrorCode::InvalidQuantity, msg)
            }
            LifecycleError::InvalidPrice(msg) => AppError::with_message(ErrorCode::InvalidPrice, msg),
            LifecycleError::InvalidStatus(value) => {
                AppError::with_message(ErrorCode::InvalidStatus, format!("Invalid status: {value}"))
                    .with_detail("value", value)
            }
            LifecycleError::InvalidPaymentStatus(value) => AppError::with_message(
                ErrorCode::InvalidPaymentStatus,
                format!("Invalid payment status: {value}"),
            )
            .with_detail("value", value),
            LifecycleError::NothingToUpdate => AppError::new(ErrorCode::NothingToUpdate),
            LifecycleError::TransitionNotAllowed { from, to } => AppError::with_message(
                ErrorCode::TransitionNotAllowed,
                format!("Transition not allowed: {from} -> {to}"),
            )
            .with_detail("from", from)
            .with_detail("to", to),
            LifecycleError::OrderNotFound(id) => {
                AppError::with_message(ErrorCode::OrderNotFound, format!("Order not found: {id}"))
            }
            LifecycleError::Unauthenticated => AppError::not_authenticated(),
            LifecycleError::Forbidden => {
                AppError::with_message(ErrorCode::NotRestaurantStaff, "Not authorized")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    #[test]
    fn test_validation_family_maps_to_400() {
        for err in [
            LifecycleError::EmptyOrder,
            LifecycleError::InvalidQuantity("quantity must be positive, got 0".into()),
            LifecycleError::InvalidStatus("served".into()),
            LifecycleError::NothingToUpdate,
        ] {
            let app: AppError = err.into();
            assert_eq!(app.http_status(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn test_authorization_maps_to_401_and_403() {
        let unauth: AppError = LifecycleError::Unauthenticated.into();
        assert_eq!(unauth.http_status(), StatusCode::UNAUTHORIZED);

        let forbidden: AppError = LifecycleError::Forbidden.into();
        assert_eq!(forbidden.http_status(), StatusCode::FORBIDDEN);
        assert_eq!(forbidden.message, "Not authorized");
    }

    #[test]
    fn test_storage_errors_classified() {
        let timeout: AppError = LifecycleError::Storage(StorageError::Timeout(5000)).into();
        assert_eq!(timeout.code, ErrorCode::TimeoutError);

        let missing: AppError =
            LifecycleError::Storage(StorageError::OrderNotFound("o1".into())).into();
        assert_eq!(missing.http_status(), StatusCode::NOT_FOUND);

        let task: AppError = LifecycleError::Storage(StorageError::Task("panicked".into())).into();
        assert_eq!(task.code, ErrorCode::InternalError);
        assert_eq!(task.message, "Internal server error");
    }
}
