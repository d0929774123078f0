//! 配置模块

mod app_config;

pub use app_config::{AppConfig, LangfuseSettings, ModelSettings};

#[cfg(test)]
pub(crate) use app_config::tests::{base_env, config_from};
