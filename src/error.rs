use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Redis error: {0}")]
    Redis(String),
    #[error("Upstream error: {0}")]
    Upstream(String),
    #[error("Broadcast failed: {0}")]
    Broadcast(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Superseded by a newer request for the same key")]
    Superseded,
    #[error("{0}")]
    Other(String),
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ServiceError::Redis(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            ServiceError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
            ServiceError::Broadcast(msg) => (StatusCode::BAD_GATEWAY, msg),
            ServiceError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ServiceError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ServiceError::Superseded => (StatusCode::CONFLICT, self.to_string()),
            ServiceError::Other(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
