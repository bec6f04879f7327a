use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::{json, Value};

use shopcart_cart::CartError;

/// Map a cart core error onto the `{message, data}` envelope.
pub fn cart_error_to_response(err: CartError) -> axum::response::Response {
    match err {
        CartError::IdentityRequired => {
            json_message(StatusCode::BAD_REQUEST, err.to_string(), Value::Null)
        }
        CartError::ProductNotFound { .. } => {
            json_message(StatusCode::NOT_FOUND, err.to_string(), Value::Null)
        }
        CartError::InsufficientStock { .. } => {
            json_message(StatusCode::BAD_REQUEST, err.to_string(), Value::Null)
        }
        CartError::Validation(_) => {
            json_message(StatusCode::BAD_REQUEST, err.to_string(), Value::Null)
        }
        CartError::Integrity(_) | CartError::Store(_) | CartError::Stock(_) => {
            tracing::error!(error = %err, "cart operation failed");
            json_message(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error",
                Value::Null,
            )
        }
    }
}

pub fn json_message(
    status: StatusCode,
    message: impl Into<String>,
    data: Value,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "message": message.into(),
            "data": data,
        })),
    )
        .into_response()
}
