//! Langfuse 公共 API 的数据结构

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Langfuse 错误类型
#[derive(Debug, thiserror::Error)]
pub enum LangfuseError {
    /// HTTP 请求错误
    #[error("HTTP 请求失败: {0}")]
    Http(#[from] reqwest::Error),

    /// 指定标签的 prompt 不存在
    #[error("prompt '{name}' with label '{label}' not found")]
    PromptNotFound { name: String, label: String },

    /// API 返回错误
    #[error("Langfuse API 错误 ({status}): {message}")]
    Api { status: u16, message: String },

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 响应解析失败
    #[error("响应解析失败: {0}")]
    Decode(#[from] serde_json::Error),
}

/// prompt 接口返回体
#[derive(Debug, Deserialize)]
pub(crate) struct PromptResponse {
    pub name: String,
    pub version: u32,
    pub prompt: PromptBody,
    #[serde(default)]
    pub labels: Vec<String>,
}

/// text 类型为字符串，chat 类型为消息数组
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum PromptBody {
    Text(String),
    Chat(Vec<ChatPromptMessage>),
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatPromptMessage {
    #[serde(default)]
    pub content: Option<String>,
}

/// 已发布的 prompt 模板
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptTemplate {
    pub name: String,
    pub version: u32,
    pub labels: Vec<String>,
    /// 模板正文（chat 类型按顺序拼接各条消息）
    pub body: String,
}

impl From<PromptResponse> for PromptTemplate {
    fn from(resp: PromptResponse) -> Self {
        let body = match resp.prompt {
            PromptBody::Text(text) => text,
            PromptBody::Chat(messages) => messages
                .into_iter()
                .filter_map(|m| m.content)
                .collect::<Vec<_>>()
                .join("\n\n"),
        };
        Self {
            name: resp.name,
            version: resp.version,
            labels: resp.labels,
            body,
        }
    }
}

/// 批量上报的事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventType {
    TraceCreate,
    SpanCreate,
    GenerationCreate,
    ScoreCreate,
}

/// 观测级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ObservationLevel {
    Default,
    Error,
}

/// 单条上报事件
#[derive(Debug, Clone, Serialize)]
pub struct IngestionEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub body: EventBody,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum EventBody {
    Trace(TraceBody),
    Observation(ObservationBody),
    Score(ScoreBody),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceBody {
    pub id: String,
    pub name: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// span 与 generation 共用的观测体
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationBody {
    pub id: String,
    pub trace_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_observation_id: Option<String>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<ObservationLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_parameters: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_version: Option<u32>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct UsageBody {
    pub input: u32,
    pub output: u32,
    pub total: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBody {
    pub id: String,
    pub trace_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observation_id: Option<String>,
    pub name: String,
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub data_type: &'static str,
}

/// 上报接口的 207 返回体
#[derive(Debug, Default, Deserialize)]
pub struct IngestionReport {
    #[serde(default)]
    pub successes: Vec<Value>,
    #[serde(default)]
    pub errors: Vec<Value>,
}
