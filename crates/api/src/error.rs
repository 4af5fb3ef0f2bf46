use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use sfunet_domain::{DomainError, ErrorKind};

/// HTTP-surface error wrapper (`/api/token` and `/api/health`
/// routes — the WS surface reports failures as `error` frames instead, via
/// `ServerEvent::error`, and never goes through this type).
#[derive(Debug)]
pub struct ApiError(DomainError);

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    message: String,
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.kind {
            ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::RoomFull | ErrorKind::CallAlreadyExists | ErrorKind::InvalidCallState => {
                StatusCode::CONFLICT
            }
            ErrorKind::CircuitOpen | ErrorKind::StateStoreError | ErrorKind::Timeout => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ErrorKind::MediaError | ErrorKind::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = ErrorBody {
            error: self.0.kind.to_string(),
            message: self.0.message,
        };
        (status, Json(body)).into_response()
    }
}
