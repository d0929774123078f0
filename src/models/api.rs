//! REST API 请求/响应模型

use serde::{Deserialize, Serialize};

use super::content::{GeneratedContent, SectionScores};

/// 内容生成请求
///
/// 字段全部宽松反序列化，缺失或为空由问卷校验统一报告。
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContentRequest {
    #[serde(alias = "sections")]
    pub agent_answers: Vec<RawSection>,
}

/// 问卷分组
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawSection {
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub questions: Vec<RawQaPair>,
}

/// 一组问答，支持 `["问题", "回答"]` 和 `{"question": .., "answer": ..}` 两种写法
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RawQaPair {
    Pair(Vec<String>),
    Object {
        #[serde(default)]
        question: Option<String>,
        #[serde(default)]
        answer: Option<String>,
    },
}

/// 内容生成响应
#[derive(Debug, Serialize)]
pub struct GenerateContentResponse {
    pub status: &'static str,
    pub trace_id: String,
    pub generated_content: GeneratedContent,
    pub scores: SectionScores,
}

/// prompt 预览响应
#[derive(Debug, Serialize)]
pub struct RenderPromptResponse {
    pub prompt: String,
    pub template: TemplateRef,
}

/// 渲染所用的模板版本
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateRef {
    pub name: String,
    pub version: u32,
}
