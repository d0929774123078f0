//! 可观测性
//!
//! 流水线每个步骤的输入、输出与评分都记录到一条请求级追踪中。

mod recorder;

pub use recorder::{snapshot, GenerationDetails, Observation, RequestTrace, TraceRecorder};
