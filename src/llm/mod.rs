//! LLM 模块
//!
//! 提供统一的 LLM 客户端，支持 OpenAI 和 Anthropic API 格式。

mod anthropic;
mod client;
mod format;
mod openai;
mod types;

pub use client::{LlmClient, LlmClientConfig};
pub use types::*;

#[cfg(test)]
pub(crate) use client::tests::{openai_reply, test_client};
