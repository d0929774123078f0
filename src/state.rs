//! 应用状态管理
//!
//! 定义在请求处理器之间共享的状态。所有外部客户端在启动时创建一次，
//! 之后通过 `Arc<AppState>` 注入到处理器。

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::langfuse::{LangfuseClient, LangfuseError};
use crate::llm::{LlmClient, LlmClientConfig, LlmError};
use crate::observability::TraceRecorder;
use crate::services::{ContentPipeline, JudgeService, LlmService, PromptService};

/// 首次重试前的等待时间
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// 应用共享状态
pub struct AppState {
    /// 启动时加载的配置
    pub config: Arc<AppConfig>,
    /// 内容生成流水线
    pub pipeline: ContentPipeline,
}

impl AppState {
    pub fn new(config: AppConfig, pipeline: ContentPipeline) -> Self {
        Self {
            config: Arc::new(config),
            pipeline,
        }
    }

    /// 根据配置创建全部客户端和服务
    pub fn from_config(config: AppConfig) -> Result<Self, AppError> {
        let timeout = Duration::from_secs(config.timeout_secs);

        let llm = LlmClient::new(LlmClientConfig {
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            timeout,
            max_retries: config.max_retries,
            retry_backoff: RETRY_BACKOFF,
        })
        .map_err(|e| match e {
            LlmError::ConfigError(msg) => AppError::Config(msg),
            other => AppError::Internal(other.to_string()),
        })?;
        let llm = Arc::new(llm);

        let langfuse = LangfuseClient::new(&config.langfuse, timeout).map_err(|e| match e {
            LangfuseError::Config(msg) => AppError::Config(msg),
            other => AppError::Internal(other.to_string()),
        })?;

        let recorder = if config.langfuse.tracing_enabled {
            TraceRecorder::new(Some(langfuse.clone()))
        } else {
            info!("Langfuse tracing disabled");
            TraceRecorder::disabled()
        };

        let pipeline = ContentPipeline::new(
            PromptService::new(langfuse, config.prompt_label.clone()),
            LlmService::new(Arc::clone(&llm), &config.generation),
            JudgeService::new(LlmService::new(llm, &config.judge), config.judge_concurrency),
            recorder,
            config.content_prompt_name.clone(),
            config.judge_prompt_name.clone(),
        );

        Ok(Self::new(config, pipeline))
    }
}

/// 创建可共享的应用状态
pub fn create_shared_state(config: AppConfig) -> Result<Arc<AppState>, AppError> {
    Ok(Arc::new(AppState::from_config(config)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{base_env, config_from};

    #[test]
    fn test_state_from_config() {
        let mut env = base_env();
        env.insert("LANGFUSE_TRACING_ENABLED".to_string(), "false".to_string());
        let state = create_shared_state(config_from(&env).unwrap()).unwrap();
        assert!(!state.pipeline.recorder().is_enabled());
        assert_eq!(state.pipeline.content_prompt(), "real_estate_content_generation");
    }

    #[test]
    fn test_invalid_langfuse_host_is_config_error() {
        let mut env = base_env();
        env.insert("LANGFUSE_HOST".to_string(), "not a url".to_string());
        let result = AppState::from_config(config_from(&env).unwrap());
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
