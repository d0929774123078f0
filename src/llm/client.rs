//! 统一 LLM 客户端

use reqwest::Client;
use std::time::Duration;
use tracing::{info, warn};

use super::anthropic::complete_anthropic;
use super::format::ApiFormat;
use super::openai::complete_openai;
use super::types::{ChatMessage, ChatOptions, LlmCompletion, LlmError};

/// 客户端构建参数
#[derive(Debug, Clone)]
pub struct LlmClientConfig {
    pub api_key: String,
    pub base_url: String,
    /// 单次请求超时
    pub timeout: Duration,
    /// 瞬时错误的最大重试次数
    pub max_retries: u32,
    /// 首次重试前的等待时间，之后每次翻倍
    pub retry_backoff: Duration,
}

/// 第 attempt 次失败后的等待时间，每次翻倍，溢出时取上限
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
}

/// 统一 LLM 客户端
///
/// 支持 OpenAI 和 Anthropic API 格式，根据模型名称自动选择。
/// 进程启动时创建一次，所有请求共享同一个连接池。
pub struct LlmClient {
    client: Client,
    api_key: String,
    base_url: String,
    max_retries: u32,
    retry_backoff: Duration,
}

impl LlmClient {
    /// 创建新的 LLM 客户端
    pub fn new(config: LlmClientConfig) -> Result<Self, LlmError> {
        if config.api_key.is_empty() {
            return Err(LlmError::ConfigError("API Key is required".to_string()));
        }

        // 构建 HTTP 客户端
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(8)
            .build()
            .map_err(LlmError::HttpError)?;

        Ok(Self {
            client,
            api_key: config.api_key,
            base_url: config.base_url,
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff,
        })
    }

    /// 发送一次完整的聊天请求（自动检测 API 格式，瞬时错误按退避重试）
    pub async fn complete(
        &self,
        messages: &[ChatMessage],
        model: &str,
        options: &ChatOptions,
    ) -> Result<LlmCompletion, LlmError> {
        let api_format = ApiFormat::for_model(model);
        info!("LLM request: model={}, api_format={:?}", model, api_format);

        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = match api_format {
                ApiFormat::OpenAi => {
                    complete_openai(&self.client, &self.api_key, &self.base_url, messages, model, options)
                        .await
                }
                ApiFormat::Anthropic => {
                    complete_anthropic(&self.client, &self.api_key, &self.base_url, messages, model, options)
                        .await
                }
            };

            match result {
                Ok(mut completion) => {
                    completion.attempts = attempt;
                    return Ok(completion);
                }
                Err(e) if e.is_transient() && attempt <= self.max_retries => {
                    let delay = backoff_delay(self.retry_backoff, attempt);
                    warn!(
                        "LLM call attempt {} failed ({}), retrying after {}ms",
                        attempt,
                        e,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) if e.is_timeout() => return Err(LlmError::Timeout),
                Err(e) => return Err(e),
            }
        }
    }
}
