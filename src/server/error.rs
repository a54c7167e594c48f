use crate::config::toml_config::TomlConfig;
use crate::core::viewer::render_error;
use crate::utils::error::EtlError;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorInfo,
}

#[derive(Serialize)]
struct ErrorInfo {
    code: &'static str,
    message: String,
    details: Value,
}

#[derive(Debug)]
pub enum AppError {
    NotFound { message: String, details: Value },
    Unavailable { message: String, details: Value },
    Internal { message: String, details: Value },
    /// Rendered HTML error page, for browser-facing routes.
    Page(String),
}

impl AppError {
    pub fn not_found(message: impl Into<String>, details: Value) -> Self {
        Self::NotFound {
            message: message.into(),
            details,
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
            details: json!({ "hint": "run preprocessing first (GET /process or `dogmap preprocess`)" }),
        }
    }

    pub fn internal(message: impl Into<String>, details: Value) -> Self {
        Self::Internal {
            message: message.into(),
            details,
        }
    }

    pub fn page(config: &TomlConfig, message: &str) -> Self {
        match render_error(config, message) {
            Ok(html) => Self::Page(html),
            Err(e) => {
                tracing::error!("Failed to render error page: {}", e);
                Self::Page("<h1>Internal Server Error</h1>".to_string())
            }
        }
    }
}

impl From<EtlError> for AppError {
    fn from(e: EtlError) -> Self {
        tracing::error!("Request failed: {} (Category: {:?})", e, e.category());
        AppError::internal(
            e.user_friendly_message(),
            json!({ "category": format!("{:?}", e.category()) }),
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match self {
            AppError::NotFound { message, details } => {
                (StatusCode::NOT_FOUND, "not_found", message, details)
            }
            AppError::Unavailable { message, details } => (
                StatusCode::SERVICE_UNAVAILABLE,
                "data_unavailable",
                message,
                details,
            ),
            AppError::Internal { message, details } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                message,
                details,
            ),
            AppError::Page(html) => {
                return (StatusCode::INTERNAL_SERVER_ERROR, Html(html)).into_response();
            }
        };

        let body = ErrorBody {
            error: ErrorInfo {
                code,
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}
