//! 统一错误处理模块
//!
//! 定义应用级错误类型，并实现 axum 的 IntoResponse trait 以便自动转换为 HTTP 响应。

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::langfuse::LangfuseError;
use crate::llm::LlmError;

/// 应用错误枚举
#[derive(Error, Debug)]
pub enum AppError {
    /// 配置相关错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 输入问卷校验失败
    #[error("请求错误: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// prompt 模板不存在
    #[error("未找到: {0}")]
    NotFound(String),

    /// prompt 管理服务调用失败
    #[error("Prompt 服务错误: {0}")]
    PromptService(String),

    /// LLM 调用错误
    #[error("LLM 错误: {0}")]
    Generation(String),

    /// LLM 调用超时
    #[error("LLM 超时: {0}")]
    GenerationTimeout(String),

    /// 模型输出无法解析为内容结构
    #[error("解析错误: {}", .errors.join("; "))]
    Parse { raw: String, errors: Vec<String> },

    /// 内部错误
    #[error("内部错误: {0}")]
    Internal(String),
}

impl AppError {
    /// 错误类别标识，写入响应体的 `kind` 字段
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config_error",
            AppError::Validation(_) => "validation_error",
            AppError::NotFound(_) => "not_found",
            AppError::PromptService(_) => "prompt_service_error",
            AppError::Generation(_) => "generation_error",
            AppError::GenerationTimeout(_) => "generation_timeout",
            AppError::Parse { .. } => "parse_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    /// 对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Config(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::PromptService(_) | AppError::Generation(_) | AppError::Parse { .. } => {
                StatusCode::BAD_GATEWAY
            }
            AppError::GenerationTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl From<LlmError> for AppError {
    fn from(err: LlmError) -> Self {
        if err.is_timeout() {
            AppError::GenerationTimeout(err.to_string())
        } else {
            AppError::Generation(err.to_string())
        }
    }
}

impl From<LangfuseError> for AppError {
    fn from(err: LangfuseError) -> Self {
        match err {
            LangfuseError::PromptNotFound { .. } => AppError::NotFound(err.to_string()),
            other => AppError::PromptService(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            AppError::Validation(details) => json!({
                "success": false,
                "kind": self.kind(),
                "error": self.to_string(),
                "details": details,
            }),
            AppError::Parse { raw, errors } => json!({
                "success": false,
                "kind": self.kind(),
                "error": self.to_string(),
                "details": errors,
                "raw_response": raw,
            }),
            _ => json!({
                "success": false,
                "kind": self.kind(),
                "error": self.to_string(),
            }),
        };

        (status, Json(body)).into_response()
    }
}

/// 便捷类型别名
pub type AppResult<T> = Result<T, AppError>;
