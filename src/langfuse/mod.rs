//! Langfuse 集成
//!
//! prompt 管理和追踪后端都由 Langfuse 提供，本模块只做 HTTP 层的封装。

mod client;
mod types;

pub use client::LangfuseClient;
pub use types::*;

#[cfg(test)]
pub(crate) use client::tests::{mount_prompt, test_settings};
