//! Adapts the shared closed error taxonomy to an axum response body.

use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use taskforge_shared::TaskforgeError;

pub struct ApiError(pub TaskforgeError);

impl From<TaskforgeError> for ApiError {
    fn from(e: TaskforgeError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.0.http_status();
        let body = Json(json!({
            "error_code": self.0.error_code(),
            "detail": self.0.to_string(),
        }));
        (status, body).into_response()
    }
}
