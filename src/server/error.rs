use crate::domain::api::ErrorBody;
use crate::utils::error::{ErrorCategory, ListingError};
use axum::{
    extract::{rejection::JsonRejection, FromRequest},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

/// JSON body extractor whose rejections use the `{ "message" }` error body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ListingError))]
pub struct ApiJson<T>(pub T);

impl From<JsonRejection> for ListingError {
    fn from(rejection: JsonRejection) -> Self {
        Self::MalformedPayload {
            message: rejection.body_text(),
        }
    }
}

impl ListingError {
    pub fn status_code(&self) -> StatusCode {
        match (self.category(), self) {
            (_, ListingError::Api { status, .. }) => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            (ErrorCategory::Validation, _) => StatusCode::BAD_REQUEST,
            (ErrorCategory::NotFound, _) => StatusCode::NOT_FOUND,
            (ErrorCategory::Auth, _) => StatusCode::UNAUTHORIZED,
            (ErrorCategory::Network, _) => StatusCode::BAD_GATEWAY,
            (ErrorCategory::Store, _) | (ErrorCategory::Config, _) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ListingError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected ({}): {}", status, self);
        }

        let body = ErrorBody {
            message: self.user_friendly_message(),
        };
        (status, Json(body)).into_response()
    }
}
