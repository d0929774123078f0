//! 应用配置管理
//!
//! 进程启动时从环境变量构建一次配置，之后通过 `AppState` 注入到各个处理器，
//! 不再使用全局单例。

use serde::Serialize;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use crate::error::AppError;
use crate::utils::mask_api_key;

/// LLM 调用参数（生成与评审各一份）
#[derive(Debug, Clone, Serialize)]
pub struct ModelSettings {
    /// 模型名称
    pub model: String,
    /// 温度参数
    pub temperature: f64,
    /// 最大 token 数
    pub max_tokens: u32,
}

/// Langfuse 连接配置
#[derive(Debug, Clone, Serialize)]
pub struct LangfuseSettings {
    /// 服务地址
    pub host: String,
    /// 公钥
    pub public_key: String,
    /// 私钥（序列化时跳过）
    #[serde(skip_serializing)]
    pub secret_key: String,
    /// 是否上报追踪数据
    pub tracing_enabled: bool,
}

/// 应用配置结构体
#[derive(Debug, Clone, Serialize)]
pub struct AppConfig {
    /// LLM API 密钥
    #[serde(skip_serializing)]
    pub api_key: String,

    /// LLM API 基础 URL
    pub base_url: String,

    /// 内容生成参数
    pub generation: ModelSettings,

    /// 评审（judge）参数
    pub judge: ModelSettings,

    /// 评审并发数
    pub judge_concurrency: usize,

    /// 单次 LLM 调用超时（秒）
    pub timeout_secs: u64,

    /// 瞬时失败的最大重试次数
    pub max_retries: u32,

    /// Langfuse 配置
    pub langfuse: LangfuseSettings,

    /// 内容生成 prompt 名称
    pub content_prompt_name: String,

    /// 评审 prompt 名称
    pub judge_prompt_name: String,

    /// prompt 标签
    pub prompt_label: String,

    /// 监听地址
    pub server_host: String,

    /// 监听端口
    pub server_port: u16,
}

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_LANGFUSE_HOST: &str = "https://cloud.langfuse.com";
const DEFAULT_CONTENT_PROMPT: &str = "real_estate_content_generation";
const DEFAULT_JUDGE_PROMPT: &str = "real_estate_section_judge";
const DEFAULT_LABEL: &str = "production";
const MAX_RETRIES_LIMIT: u32 = 10;

impl AppConfig {
    /// 从进程环境变量加载配置
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意键值查找函数加载配置
    ///
    /// 空字符串视为未设置。
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = get("OPENAI_API_KEY")
            .ok_or_else(|| AppError::Config("OPENAI_API_KEY is required".to_string()))?;
        let public_key = get("LANGFUSE_PUBLIC_KEY")
            .ok_or_else(|| AppError::Config("LANGFUSE_PUBLIC_KEY is required".to_string()))?;
        let secret_key = get("LANGFUSE_SECRET_KEY")
            .ok_or_else(|| AppError::Config("LANGFUSE_SECRET_KEY is required".to_string()))?;

        let model = get("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let generation = ModelSettings {
            model: model.clone(),
            temperature: parse_var(&get, "LLM_TEMPERATURE", 0.2)?,
            max_tokens: parse_var(&get, "LLM_MAX_TOKENS", 4096)?,
        };
        let judge = ModelSettings {
            model: get("JUDGE_MODEL").unwrap_or(model),
            temperature: parse_var(&get, "JUDGE_TEMPERATURE", 0.0)?,
            max_tokens: parse_var(&get, "JUDGE_MAX_TOKENS", 512)?,
        };

        for (name, settings) in [("LLM_TEMPERATURE", &generation), ("JUDGE_TEMPERATURE", &judge)] {
            if !(0.0..=2.0).contains(&settings.temperature) {
                return Err(AppError::Config(format!(
                    "{} must be between 0.0 and 2.0, got {}",
                    name, settings.temperature
                )));
            }
        }

        let judge_concurrency: usize = parse_var(&get, "JUDGE_CONCURRENCY", 6)?;

        Ok(Self {
            api_key,
            base_url: get("LLM_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            generation,
            judge,
            judge_concurrency: judge_concurrency.clamp(1, 16),
            timeout_secs: parse_var(&get, "LLM_TIMEOUT_SECS", 60)?,
            max_retries: parse_var::<u32, _>(&get, "LLM_MAX_RETRIES", 1)?.min(MAX_RETRIES_LIMIT),
            langfuse: LangfuseSettings {
                host: get("LANGFUSE_HOST").unwrap_or_else(|| DEFAULT_LANGFUSE_HOST.to_string()),
                public_key,
                secret_key,
                tracing_enabled: parse_bool(&get, "LANGFUSE_TRACING_ENABLED", true)?,
            },
            content_prompt_name: get("CONTENT_PROMPT_NAME")
                .unwrap_or_else(|| DEFAULT_CONTENT_PROMPT.to_string()),
            judge_prompt_name: get("JUDGE_PROMPT_NAME")
                .unwrap_or_else(|| DEFAULT_JUDGE_PROMPT.to_string()),
            prompt_label: get("PROMPT_LABEL").unwrap_or_else(|| DEFAULT_LABEL.to_string()),
            server_host: get("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            server_port: parse_var(&get, "SERVER_PORT", 8000)?,
        })
    }

    /// 服务监听地址
    pub fn socket_addr(&self) -> Result<SocketAddr, AppError> {
        let ip = IpAddr::from_str(&self.server_host)
            .map_err(|e| AppError::Config(format!("invalid SERVER_HOST {}: {}", self.server_host, e)))?;
        Ok(SocketAddr::new(ip, self.server_port))
    }

    /// 启动日志用的脱敏摘要
    pub fn summary(&self) -> String {
        format!(
            "model={} judge_model={} base_url={} api_key={} langfuse_host={} langfuse_key={} tracing={} prompt={}@{}",
            self.generation.model,
            self.judge.model,
            self.base_url,
            mask_api_key(&self.api_key),
            self.langfuse.host,
            mask_api_key(&self.langfuse.public_key),
            self.langfuse.tracing_enabled,
            self.content_prompt_name,
            self.prompt_label,
        )
    }
}

fn parse_var<T, G>(get: &G, key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e| AppError::Config(format!("invalid {}={}: {}", key, raw, e))),
        None => Ok(default),
    }
}

fn parse_bool<G>(get: &G, key: &str, default: bool) -> Result<bool, AppError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key).map(|v| v.to_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => Err(AppError::Config(format!("invalid {}={}: expected a boolean", key, v))),
    }
}
