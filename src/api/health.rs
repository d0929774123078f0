//! 健康检查端点

use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::state::AppState;
use std::sync::Arc;

/// 健康检查处理器
async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    let config = &state.config;
    Json(json!({
        "status": "ok",
        "llm": {
            "base_url": config.base_url,
            "model": config.generation.model,
            "judge_model": config.judge.model,
        },
        "langfuse": {
            "host": config.langfuse.host,
            "tracing_enabled": state.pipeline.recorder().is_enabled(),
        },
        "content_prompt": state.pipeline.content_prompt(),
    }))
}

/// 创建健康检查路由
pub fn health_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/health", get(health_check))
}
