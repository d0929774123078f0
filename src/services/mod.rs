//! 服务层模块

mod content_parser;
mod judge_service;
mod llm_service;
mod pipeline;
mod prompt_service;
mod questionnaire;

pub use judge_service::JudgeService;
pub use llm_service::LlmService;
pub use pipeline::ContentPipeline;
pub use prompt_service::PromptService;

#[cfg(test)]
pub(crate) use pipeline::tests::{mount_happy_path, test_pipeline};
#[cfg(test)]
pub(crate) use questionnaire::tests::sample_request;
