use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::subscription::SubscriptionError;

/// Success envelope shared by every endpoint: `{ success, message?, data }`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: None,
            data,
        })
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: Some(message.into()),
            data,
        })
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Internal(e) => {
                error!(error = ?e, "internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (
            status,
            Json(ErrorBody {
                success: false,
                error: message,
            }),
        )
            .into_response()
    }
}

impl From<SubscriptionError> for ApiError {
    fn from(e: SubscriptionError) -> Self {
        match e {
            SubscriptionError::AccountNotFound(_) => ApiError::NotFound("User not found".into()),
            SubscriptionError::PlanNotFound(_) => ApiError::NotFound("Package not found".into()),
            SubscriptionError::Other(e) => ApiError::Internal(e),
        }
    }
}

/// True when the error chain holds a Postgres unique-constraint violation.
pub fn is_unique_violation(e: &anyhow::Error) -> bool {
    e.chain().any(|cause| {
        cause
            .downcast_ref::<sqlx::Error>()
            .and_then(|err| err.as_database_error())
            .map(|db| db.is_unique_violation())
            .unwrap_or(false)
    })
}

/// Fallback for routes that do not exist.
pub async fn route_not_found(uri: axum::http::Uri) -> ApiError {
    ApiError::NotFound(format!("Route {} does not exist", uri.path()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn subscription_errors_map_to_status_codes() {
        let account = ApiError::from(SubscriptionError::AccountNotFound(Uuid::new_v4()));
        assert_eq!(account.status(), StatusCode::NOT_FOUND);
        assert_eq!(account.to_string(), "User not found");

        let plan = ApiError::from(SubscriptionError::PlanNotFound(Uuid::new_v4()));
        assert_eq!(plan.status(), StatusCode::NOT_FOUND);
        assert_eq!(plan.to_string(), "Package not found");

        let store = ApiError::from(SubscriptionError::Other(anyhow::anyhow!("db down")));
        assert_eq!(store.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn plain_errors_are_not_unique_violations() {
        assert!(!is_unique_violation(&anyhow::anyhow!("boom")));
        let row_not_found = anyhow::Error::from(sqlx::Error::RowNotFound);
        assert!(!is_unique_violation(&row_not_found));
    }

    #[test]
    fn success_envelope_omits_missing_message() {
        let Json(body) = ApiResponse::ok(serde_json::json!({ "x": 1 }));
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["success"], true);
        assert!(json.get("message").is_none());
        assert_eq!(json["data"]["x"], 1);
    }
}
