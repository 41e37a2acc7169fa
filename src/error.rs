//! Error taxonomy shared by the import adapters and the HTTP layer.

use thiserror::Error;

/// Errors surfaced by the CRM.
///
/// Record-level controller operations (`update`, `delete`, `update_field`)
/// never produce one of these for an unknown identifier; they are silent
/// no-ops.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CrmError {
    /// Required input is missing or invalid.
    #[error("{0}")]
    Validation(String),

    /// Request payload or sheet data has the wrong shape.
    #[error("{0}")]
    Format(String),

    /// An uploaded file could not be parsed as a spreadsheet.
    #[error("{0}")]
    Parse(String),

    /// The remote range yielded no rows.
    #[error("{0}")]
    NotFound(String),

    /// Service credentials are not configured.
    #[error("{0}")]
    Configuration(String),

    /// The remote spreadsheet service failed.
    #[error("{0}")]
    Upstream(String),
}

impl CrmError {
    pub fn validation(msg: impl Into<String>) -> Self {
        CrmError::Validation(msg.into())
    }

    pub fn format(msg: impl Into<String>) -> Self {
        CrmError::Format(msg.into())
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        CrmError::Upstream(msg.into())
    }
}

#[cfg(feature = "web")]
mod web {
    use super::CrmError;
    use axum::{
        Json,
        http::StatusCode,
        response::{IntoResponse, Response},
    };

    impl CrmError {
        /// HTTP status for this error class
        pub fn status_code(&self) -> StatusCode {
            match self {
                CrmError::Validation(_) | CrmError::Format(_) => StatusCode::BAD_REQUEST,
                CrmError::NotFound(_) => StatusCode::NOT_FOUND,
                CrmError::Parse(_) | CrmError::Configuration(_) | CrmError::Upstream(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            }
        }
    }

    impl IntoResponse for CrmError {
        fn into_response(self) -> Response {
            let status = self.status_code();
            if status.is_server_error() {
                log::error!("request failed: {}", self);
            } else {
                log::warn!("request rejected: {}", self);
            }
            (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
        }
    }
}
