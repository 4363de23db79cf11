use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid_json")]
    InvalidJson,
    #[error("config_not_ready")]
    ConfigNotReady,
    /// Same tag as [`ApiError::ConfigNotReady`], answered as a server fault.
    #[error("config_not_ready")]
    ConfigUnavailable,
    #[error("meeting_not_ready")]
    MeetingNotReady,
    /// A reboot or factory reset is scheduled; config writes would be lost or undo it.
    #[error("restart_pending")]
    RestartPending,
    #[error("Camera not ready")]
    SensorNotReady,
    #[error("Not Found")]
    NotFound,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::InvalidJson | Self::ConfigNotReady => StatusCode::BAD_REQUEST,
            Self::ConfigUnavailable | Self::MeetingNotReady => StatusCode::INTERNAL_SERVER_ERROR,
            Self::RestartPending => StatusCode::SERVICE_UNAVAILABLE,
            Self::SensorNotReady => {
                return (StatusCode::SERVICE_UNAVAILABLE, self.to_string()).into_response()
            }
            Self::NotFound => return (StatusCode::NOT_FOUND, self.to_string()).into_response(),
        };

        tracing::debug!(status = %status, error = %self, "request rejected");
        (status, Json(json!({ "ok": false, "error": self.to_string() }))).into_response()
    }
}
