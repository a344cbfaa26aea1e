//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::OrderError;
use inventory_store::StoreError;
use reservation::{OrderServiceError, PlaceOrderError};

const INTERNAL_MESSAGE: &str = "Erreur interne du serveur.";

/// API-level error type that maps to HTTP responses.
///
/// Every error body has the shape `{"message": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// No authenticated principal on the request.
    Unauthorized,
    /// Order placement failed.
    PlaceOrder(PlaceOrderError),
    /// Order lookup or status change failed.
    OrderService(OrderServiceError),
    /// Store error outside of order placement.
    Store(StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                OrderError::Unauthenticated.to_string(),
            ),
            ApiError::PlaceOrder(err) => place_order_error_to_response(err),
            ApiError::OrderService(err) => order_service_error_to_response(err),
            ApiError::Store(err) => {
                tracing::error!(error = %err, "store error");
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE.to_string())
            }
        };

        let body = serde_json::json!({ "message": message });
        (status, axum::Json(body)).into_response()
    }
}

fn place_order_error_to_response(err: PlaceOrderError) -> (StatusCode, String) {
    match &err {
        PlaceOrderError::Rejected(OrderError::Unauthenticated) => {
            (StatusCode::UNAUTHORIZED, err.to_string())
        }
        PlaceOrderError::Rejected(_)
        | PlaceOrderError::InsufficientStock { .. }
        | PlaceOrderError::DuplicateOrder(_)
        | PlaceOrderError::OrderPersistence(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        PlaceOrderError::Store(_) | PlaceOrderError::CompensationIncomplete { .. } => {
            tracing::error!(error = %err, "order placement failed");
            (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE.to_string())
        }
    }
}

fn order_service_error_to_response(err: OrderServiceError) -> (StatusCode, String) {
    match &err {
        OrderServiceError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        OrderServiceError::Order(_) | OrderServiceError::Conflict(_) => {
            (StatusCode::CONFLICT, err.to_string())
        }
        OrderServiceError::Store(_) => {
            tracing::error!(error = %err, "order service failed");
            (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE.to_string())
        }
    }
}

impl From<PlaceOrderError> for ApiError {
    fn from(err: PlaceOrderError) -> Self {
        ApiError::PlaceOrder(err)
    }
}

impl From<OrderServiceError> for ApiError {
    fn from(err: OrderServiceError) -> Self {
        ApiError::OrderService(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{OrderId, ProductId};
    use domain::OrderStatus;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_placement_error_statuses() {
        assert_eq!(
            status_of(PlaceOrderError::Rejected(OrderError::EmptyOrder).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(PlaceOrderError::Rejected(OrderError::Unauthenticated).into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(
                PlaceOrderError::InsufficientStock {
                    product_id: ProductId::new(1),
                    name: "Farine".to_string(),
                }
                .into()
            ),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(PlaceOrderError::DuplicateOrder(OrderId::new("CMD-1")).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(PlaceOrderError::Store(StoreError::Unavailable("down".into())).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_order_service_error_statuses() {
        assert_eq!(
            status_of(OrderServiceError::NotFound(OrderId::new("CMD-1")).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(
                OrderServiceError::Order(OrderError::InvalidStatusTransition {
                    from: OrderStatus::Delivered,
                    to: OrderStatus::Pending,
                })
                .into()
            ),
            StatusCode::CONFLICT
        );
        assert_eq!(status_of(ApiError::Unauthorized), StatusCode::UNAUTHORIZED);
    }
}
