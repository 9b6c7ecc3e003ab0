use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use onboard_core::error::OnboardError;

// ---------------------------------------------------------------------------
// AppError — unified error type for HTTP responses
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    /// Construct a 400 Bad Request error with the given message.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(OnboardError::Validation(msg.into()).into())
    }

    /// Construct a 404 Not Found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self(OnboardError::NotFound(msg.into()).into())
    }
}

fn status_for(e: &OnboardError) -> StatusCode {
    match e {
        OnboardError::NotInitialized | OnboardError::Validation(_) => StatusCode::BAD_REQUEST,
        OnboardError::NotFound(_) => StatusCode::NOT_FOUND,
        OnboardError::Conflict(_) => StatusCode::CONFLICT,
        OnboardError::Permission(_) => StatusCode::FORBIDDEN,
        OnboardError::State(_) | OnboardError::Prerequisite(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        OnboardError::Store(_)
        | OnboardError::Io(_)
        | OnboardError::Yaml(_)
        | OnboardError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind) = match self.0.downcast_ref::<OnboardError>() {
            Some(e) => (status_for(e), e.kind()),
            None => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };

        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }

        let body = serde_json::json!({ "error": self.0.to_string(), "kind": kind });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
