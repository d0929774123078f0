//! 模型输出解析
//!
//! 把生成模型返回的原始文本解析为 GeneratedContent。结果是带标签的
//! `ParseOutcome`，无效时保留原始文本以便排查。

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::models::{ContentSection, GeneratedContent};

/// `}` 或 `]` 前的多余逗号
static TRAILING_COMMA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",(\s*[}\]])").expect("trailing comma regex is valid"));

/// 解析结果
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Valid(GeneratedContent),
    Invalid { raw: String, errors: Vec<String> },
}

impl ParseOutcome {
    /// 无效结果转换为请求级的 ParseError
    pub fn into_result(self) -> Result<GeneratedContent, AppError> {
        match self {
            ParseOutcome::Valid(content) => Ok(content),
            ParseOutcome::Invalid { raw, errors } => Err(AppError::Parse { raw, errors }),
        }
    }
}

/// 去掉 Markdown 代码块包裹以及 JSON 对象前后的说明文字
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();

    let inner = match trimmed.strip_prefix("```") {
        Some(rest) => {
            let rest = rest.trim_end();
            let body = rest.strip_suffix("```").unwrap_or(rest);
            // 跳过语言标识行（```json），单行代码块没有换行
            match body.split_once('\n') {
                Some((tag, rest)) if !tag.contains('{') => rest.trim(),
                _ => body.trim(),
            }
        }
        None => trimmed,
    };

    if inner.starts_with('{') {
        return inner;
    }
    match (inner.find('{'), inner.rfind('}')) {
        (Some(start), Some(end)) if start < end => &inner[start..=end],
        _ => inner,
    }
}

/// 清理常见的格式问题后解析 JSON
///
/// 先按原样解析，失败后再去掉多余逗号重试，合法 JSON 不会被改写。
pub fn parse_lenient_json(text: &str) -> Result<Value, serde_json::Error> {
    let stripped = strip_code_fences(text);
    match serde_json::from_str(stripped) {
        Ok(value) => Ok(value),
        Err(first_err) => {
            let repaired = TRAILING_COMMA.replace_all(stripped, "$1");
            if repaired == stripped {
                return Err(first_err);
            }
            debug!("Retrying JSON parse after removing trailing commas");
            serde_json::from_str(&repaired).map_err(|_| first_err)
        }
    }
}

/// 按固定分区结构校验对象
fn validate_sections(mut object: Map<String, Value>) -> Result<GeneratedContent, Vec<String>> {
    let mut errors = Vec::new();
    let mut sections = BTreeMap::new();

    for section in ContentSection::ALL {
        match object.remove(section.key()) {
            None => errors.push(format!("missing required section '{}'", section)),
            Some(Value::Null) => errors.push(format!("section '{}' is null", section)),
            Some(value) => {
                sections.insert(section, value);
            }
        }
    }

    if !object.is_empty() {
        let extra: Vec<&str> = object.keys().map(String::as_str).collect();
        warn!("Dropping unexpected top-level keys from model output: {:?}", extra);
    }

    if errors.is_empty() {
        Ok(GeneratedContent::from_sections(sections))
    } else {
        Err(errors)
    }
}

/// 解析生成模型的原始输出
pub fn parse_generated_content(raw: &str) -> ParseOutcome {
    let invalid = |errors: Vec<String>| ParseOutcome::Invalid {
        raw: raw.to_string(),
        errors,
    };

    let value = match parse_lenient_json(raw) {
        Ok(value) => value,
        Err(e) => return invalid(vec![format!("invalid JSON: {}", e)]),
    };

    let object = match value {
        Value::Object(object) => object,
        other => {
            return invalid(vec![format!(
                "expected a JSON object at top level, got {}",
                json_type(&other)
            )])
        }
    };

    match validate_sections(object) {
        Ok(content) => ParseOutcome::Valid(content),
        Err(errors) => invalid(errors),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
