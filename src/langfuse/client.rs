//! Langfuse HTTP 客户端
//!
//! 只用到两个接口：按名称和标签读取 prompt，批量上报追踪事件。

use reqwest::{Client, StatusCode, Url};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use super::types::{IngestionEvent, IngestionReport, LangfuseError, PromptResponse, PromptTemplate};
use crate::config::LangfuseSettings;
use crate::utils::truncate;

/// Langfuse 客户端
#[derive(Clone)]
pub struct LangfuseClient {
    client: Client,
    host: Url,
    public_key: String,
    secret_key: String,
}

impl LangfuseClient {
    /// 创建新的 Langfuse 客户端
    pub fn new(settings: &LangfuseSettings, timeout: Duration) -> Result<Self, LangfuseError> {
        let host = Url::parse(settings.host.trim_end_matches('/'))
            .map_err(|e| LangfuseError::Config(format!("invalid LANGFUSE_HOST {}: {}", settings.host, e)))?;
        if host.cannot_be_a_base() {
            return Err(LangfuseError::Config(format!("invalid LANGFUSE_HOST {}", settings.host)));
        }

        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            host,
            public_key: settings.public_key.clone(),
            secret_key: settings.secret_key.clone(),
        })
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.host.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// 读取指定标签下的 prompt
    pub async fn get_prompt(&self, name: &str, label: &str) -> Result<PromptTemplate, LangfuseError> {
        let mut url = self.url(&["api", "public", "v2", "prompts", name]);
        url.query_pairs_mut().append_pair("label", label);

        debug!("Fetching prompt: name={}, label={}", name, label);

        let response = self
            .client
            .get(url)
            .basic_auth(&self.public_key, Some(&self.secret_key))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(LangfuseError::PromptNotFound {
                name: name.to_string(),
                label: label.to_string(),
            });
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LangfuseError::Api {
                status: status.as_u16(),
                message: truncate(&message, 500),
            });
        }

        let body: PromptResponse = serde_json::from_str(&response.text().await?)?;
        Ok(body.into())
    }

    /// 批量上报追踪事件
    pub async fn ingest(&self, batch: &[IngestionEvent]) -> Result<IngestionReport, LangfuseError> {
        let url = self.url(&["api", "public", "ingestion"]);

        let response = self
            .client
            .post(url)
            .basic_auth(&self.public_key, Some(&self.secret_key))
            .json(&json!({ "batch": batch }))
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(LangfuseError::Api {
                status: status.as_u16(),
                message: truncate(&text, 500),
            });
        }

        // 207 返回逐条结果，其他 2xx 可能没有 body
        Ok(serde_json::from_str(&text).unwrap_or_default())
    }
}
