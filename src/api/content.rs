//! 内容生成端点

use axum::{extract::rejection::JsonRejection, extract::State, routing::post, Json, Router};
use std::sync::Arc;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::models::{ContentRequest, GenerateContentResponse, RenderPromptResponse};
use crate::state::AppState;

/// 请求体无法解析时按校验错误返回 400
fn parse_body(body: Result<Json<ContentRequest>, JsonRejection>) -> AppResult<ContentRequest> {
    body.map(|Json(request)| request)
        .map_err(|rejection| AppError::Validation(vec![rejection.body_text()]))
}

/// 生成网站内容并逐分区评分
async fn generate_content(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ContentRequest>, JsonRejection>,
) -> AppResult<Json<GenerateContentResponse>> {
    let request = parse_body(body)?;
    info!("POST /generate-content: {} section(s)", request.agent_answers.len());

    let output = state.pipeline.run(&request).await?;

    Ok(Json(GenerateContentResponse {
        status: "ok",
        trace_id: output.trace_id,
        generated_content: output.generated_content,
        scores: output.scores,
    }))
}

/// 预览渲染后的 prompt，不调用模型
async fn render_prompt(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ContentRequest>, JsonRejection>,
) -> AppResult<Json<RenderPromptResponse>> {
    let request = parse_body(body)?;
    let rendered = state.pipeline.render_only(&request).await?;

    Ok(Json(RenderPromptResponse {
        prompt: rendered.text,
        template: rendered.template,
    }))
}

/// 创建内容生成路由
pub fn content_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/generate-content", post(generate_content))
        .route("/render-prompt", post(render_prompt))
}
