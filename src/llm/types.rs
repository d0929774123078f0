//! LLM 类型定义

use serde::{Deserialize, Serialize};

/// 消息角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// 聊天消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// 解码参数
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChatOptions {
    /// 温度参数
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// 最大 token 数
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// 要求返回 JSON 对象（仅 OpenAI 格式生效）
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub json_mode: bool,
}

/// token 用量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input: u32,
    pub output: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.input + self.output
    }
}

/// 一次完整调用的结果
#[derive(Debug, Clone, Default)]
pub struct LlmCompletion {
    /// 响应文本
    pub content: String,
    /// 服务端实际使用的模型
    pub model: String,
    /// 完成原因
    pub finish_reason: Option<String>,
    /// token 用量（服务端未返回时为空）
    pub usage: Option<TokenUsage>,
    /// 实际发起的 HTTP 请求次数（含重试）
    pub attempts: u32,
}

/// LLM 错误类型
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// HTTP 请求错误
    #[error("HTTP 请求失败: {0}")]
    HttpError(#[from] reqwest::Error),

    /// API 返回错误
    #[error("API 错误 ({status}): {message}")]
    ApiError { status: u16, message: String },

    /// 超时错误
    #[error("请求超时")]
    Timeout,

    /// 配置错误
    #[error("配置错误: {0}")]
    ConfigError(String),

    /// JSON 解析错误
    #[error("JSON 解析失败: {0}")]
    JsonError(#[from] serde_json::Error),

    /// 响应中没有文本内容
    #[error("模型返回了空内容")]
    EmptyResponse,
}

impl LlmError {
    /// 是否为可重试的瞬时错误（连接失败、超时、429、5xx）
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::HttpError(e) => e.is_connect() || e.is_timeout(),
            LlmError::Timeout => true,
            LlmError::ApiError { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// 是否为超时
    pub fn is_timeout(&self) -> bool {
        match self {
            LlmError::Timeout => true,
            LlmError::HttpError(e) => e.is_timeout(),
            _ => false,
        }
    }
}
