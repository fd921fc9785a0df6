use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use thiserror::Error;

pub const CODE_BAD_REQUEST: &str = "FP-API-400";
pub const CODE_UNAUTHORIZED: &str = "FP-API-401";
pub const CODE_METHOD_NOT_ALLOWED: &str = "FP-API-405";
pub const CODE_INTERNAL: &str = "FP-API-500";

/// HTTP 层统一错误
#[derive(Debug, Error)]
pub enum ApiError {
    /// 调用方输入有误，消息原样返回给客户端
    #[error("{0}")]
    BadRequest(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match &self {
            ApiError::BadRequest(message) => error_json(CODE_BAD_REQUEST, message, None),
            ApiError::Unauthorized => error_json(CODE_UNAUTHORIZED, "Unauthorized", None),
            ApiError::MethodNotAllowed => {
                error_json(CODE_METHOD_NOT_ALLOWED, "Method not allowed", None)
            }
            ApiError::Internal(e) => {
                tracing::error!("[Api] Internal error: {:#}", e);
                error_json(CODE_INTERNAL, "Internal server error", Some(&format!("{:#}", e)))
            }
        };
        (self.status(), Json(body)).into_response()
    }
}

/// 错误响应体；`details` 仅在 debug 构建中替换对外消息
pub fn error_json(code: &str, safe_message: &str, details: Option<&str>) -> Value {
    let message = if cfg!(debug_assertions) {
        details.unwrap_or(safe_message)
    } else {
        safe_message
    };
    serde_json::json!({
        "status": "error",
        "code": code,
        "error": message
    })
}
