//! API 格式检测和 URL 构建工具

use serde::{Deserialize, Serialize};

/// API 格式枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiFormat {
    /// OpenAI Chat Completions API
    OpenAi,
    /// Anthropic Messages API
    Anthropic,
}

impl ApiFormat {
    /// 根据模型名称检测 API 格式
    ///
    /// 规则：模型名包含 "claude" 则使用 Anthropic 格式，否则使用 OpenAI 格式
    pub fn for_model(model: &str) -> Self {
        if model.to_lowercase().contains("claude") {
            ApiFormat::Anthropic
        } else {
            ApiFormat::OpenAi
        }
    }

    /// 根据 base_url 构建完整端点
    pub fn endpoint(self, base_url: &str) -> String {
        let url = fix_base_url(base_url);
        let suffix = match self {
            ApiFormat::OpenAi => "/chat/completions",
            ApiFormat::Anthropic => "/messages",
        };

        if url.ends_with(suffix) {
            url
        } else if url.ends_with("/v1") {
            format!("{}{}", url, suffix)
        } else {
            format!("{}/v1{}", url, suffix)
        }
    }
}

/// 修复 base_url
///
/// - 移除末尾斜杠
/// - 修复双斜杠（保留协议部分）
pub fn fix_base_url(base_url: &str) -> String {
    let url = base_url.trim().trim_end_matches('/');

    match url.find("://") {
        Some(pos) => {
            let (protocol, rest) = url.split_at(pos + 3);
            let mut fixed = rest.to_string();
            while fixed.contains("//") {
                fixed = fixed.replace("//", "/");
            }
            format!("{}{}", protocol, fixed)
        }
        None => url.to_string(),
    }
}
