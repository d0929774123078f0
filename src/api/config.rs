//! 配置查看端点

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;

use crate::config::{AppConfig, ModelSettings};
use crate::state::AppState;

/// 配置响应（隐藏密钥的实际值）
#[derive(Serialize)]
pub struct ConfigResponse {
    /// 是否已设置 API 密钥
    pub api_key_set: bool,
    /// API 基础 URL
    pub base_url: String,
    pub generation: ModelSettings,
    pub judge: ModelSettings,
    pub judge_concurrency: usize,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub langfuse_host: String,
    pub tracing_enabled: bool,
    pub content_prompt_name: String,
    pub judge_prompt_name: String,
    pub prompt_label: String,
}

impl From<&AppConfig> for ConfigResponse {
    fn from(config: &AppConfig) -> Self {
        Self {
            api_key_set: !config.api_key.is_empty(),
            base_url: config.base_url.clone(),
            generation: config.generation.clone(),
            judge: config.judge.clone(),
            judge_concurrency: config.judge_concurrency,
            timeout_secs: config.timeout_secs,
            max_retries: config.max_retries,
            langfuse_host: config.langfuse.host.clone(),
            tracing_enabled: config.langfuse.tracing_enabled,
            content_prompt_name: config.content_prompt_name.clone(),
            judge_prompt_name: config.judge_prompt_name.clone(),
            prompt_label: config.prompt_label.clone(),
        }
    }
}

/// 获取当前配置
async fn get_config_handler(State(state): State<Arc<AppState>>) -> Json<ConfigResponse> {
    Json(ConfigResponse::from(state.config.as_ref()))
}

/// 创建配置路由
pub fn config_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/config", get(get_config_handler))
}
