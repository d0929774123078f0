//! LLM 服务封装
//!
//! 把共享的 LlmClient 与一组固定的解码参数绑定。内容生成和评审各持有一个实例。

use serde_json::{json, Value};
use std::sync::Arc;

use crate::config::ModelSettings;
use crate::llm::{ChatMessage, ChatOptions, LlmClient, LlmCompletion, LlmError};

/// 生成请求的系统消息
///
/// OpenAI 的 JSON 模式要求消息里出现 "JSON" 字样。
pub const JSON_SYSTEM_PROMPT: &str = "You are a helpful assistant. Always respond with a single valid JSON object.";

/// LLM 服务
#[derive(Clone)]
pub struct LlmService {
    client: Arc<LlmClient>,
    model: String,
    temperature: f64,
    max_tokens: u32,
}

impl LlmService {
    /// 创建新的 LLM 服务
    pub fn new(client: Arc<LlmClient>, settings: &ModelSettings) -> Self {
        Self {
            client,
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn options(&self) -> ChatOptions {
        ChatOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            json_mode: true,
        }
    }

    /// 写入追踪记录的模型参数
    pub fn model_parameters(&self) -> Value {
        json!({
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "response_format": "json_object",
        })
    }

    /// 发送 prompt 并返回完整文本
    pub async fn generate(&self, prompt: &str) -> Result<LlmCompletion, LlmError> {
        let messages = [ChatMessage::system(JSON_SYSTEM_PROMPT), ChatMessage::user(prompt)];
        self.client.complete(&messages, &self.model, &self.options()).await
    }
}
