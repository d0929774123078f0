//! Anthropic Messages API 实现

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::format::ApiFormat;
use super::types::{ChatMessage, ChatOptions, LlmCompletion, LlmError, Role, TokenUsage};
use crate::utils::truncate;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic 请求载荷
#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    messages: Vec<&'a ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Deserialize, Debug)]
struct AnthropicResponse {
    #[serde(default)]
    model: Option<String>,
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Deserialize, Debug)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Deserialize, Debug)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

/// 调用 Anthropic API（非流式）
pub async fn complete_anthropic(
    client: &Client,
    api_key: &str,
    base_url: &str,
    messages: &[ChatMessage],
    model: &str,
    options: &ChatOptions,
) -> Result<LlmCompletion, LlmError> {
    let endpoint = ApiFormat::Anthropic.endpoint(base_url);

    // system 消息单独放在顶层字段
    let system: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();

    let payload = AnthropicRequest {
        model,
        messages: messages.iter().filter(|m| m.role != Role::System).collect(),
        system: (!system.is_empty()).then(|| system.join("\n\n")),
        max_tokens: options.max_tokens.unwrap_or(4096),
        temperature: options.temperature,
    };

    debug!("Anthropic API request: endpoint={}, model={}", endpoint, model);

    let response = client
        .post(&endpoint)
        .header("x-api-key", api_key)
        .header("anthropic-version", ANTHROPIC_VERSION)
        .json(&payload)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        error!(
            "Anthropic API error: status={}, body={}",
            status.as_u16(),
            truncate(&error_text, 500)
        );
        return Err(LlmError::ApiError {
            status: status.as_u16(),
            message: error_text,
        });
    }

    let body: AnthropicResponse = serde_json::from_str(&response.text().await?)?;
    let content: String = body
        .content
        .iter()
        .filter(|b| b.block_type == "text")
        .filter_map(|b| b.text.as_deref())
        .collect();

    if content.trim().is_empty() {
        return Err(LlmError::EmptyResponse);
    }

    Ok(LlmCompletion {
        content,
        model: body.model.unwrap_or_else(|| model.to_string()),
        finish_reason: body.stop_reason,
        usage: body.usage.map(|u| TokenUsage {
            input: u.input_tokens,
            output: u.output_tokens,
        }),
        attempts: 1,
    })
}
