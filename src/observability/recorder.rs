//! 请求级追踪记录
//!
//! 每个请求一个 `RequestTrace`，流水线各步骤以观测（span / generation）
//! 的形式记录在内存中，请求结束后由后台任务一次性上报到 Langfuse。
//! 上报失败只记日志，不影响请求结果。

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::langfuse::{
    EventBody, EventType, IngestionEvent, LangfuseClient, ObservationBody, ObservationLevel,
    ScoreBody, TraceBody, UsageBody,
};
use crate::llm::LlmCompletion;
use crate::models::TemplateRef;
use crate::utils::truncate;

/// 原始响应在追踪中保留的最大字符数
const RAW_PREVIEW_CHARS: usize = 500;

/// 序列化为追踪快照，失败时记为 null
pub fn snapshot<T: Serialize + ?Sized>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// 观测类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationKind {
    Span,
    Generation,
}

/// 已开始、尚未结束的观测
#[derive(Debug)]
pub struct Observation {
    id: String,
    parent_id: Option<String>,
    name: String,
    kind: ObservationKind,
    start_time: DateTime<Utc>,
    input: Value,
}

impl Observation {
    pub fn id(&self) -> &str {
        &self.id
    }
}

/// 模型调用的附加信息
pub struct GenerationDetails<'a> {
    pub model_parameters: Value,
    pub prompt: Option<&'a TemplateRef>,
}

/// 追踪记录器
///
/// 进程启动时创建，持有可选的 Langfuse 客户端；为 None 时只在内存记录、不上报。
#[derive(Clone)]
pub struct TraceRecorder {
    client: Option<LangfuseClient>,
}

impl TraceRecorder {
    pub fn new(client: Option<LangfuseClient>) -> Self {
        Self { client }
    }

    pub fn disabled() -> Self {
        Self { client: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    /// 为一个请求创建根追踪
    pub fn start_trace(&self, name: &str, input: Value) -> RequestTrace {
        let trace = RequestTrace {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            started: Utc::now(),
            input,
            client: self.client.clone(),
            events: Mutex::new(Vec::new()),
        };
        debug!("Trace started: id={}, name={}", trace.id, trace.name);
        trace
    }
}

/// 单个请求的追踪
pub struct RequestTrace {
    id: String,
    name: String,
    started: DateTime<Utc>,
    input: Value,
    client: Option<LangfuseClient>,
    events: Mutex<Vec<IngestionEvent>>,
}

impl RequestTrace {
    pub fn id(&self) -> &str {
        &self.id
    }

    fn push(&self, event_type: EventType, body: EventBody) {
        self.events.lock().push(IngestionEvent {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
            body,
        });
    }

    fn observe(&self, parent: Option<&Observation>, kind: ObservationKind, name: &str, input: Value) -> Observation {
        Observation {
            id: Uuid::new_v4().to_string(),
            parent_id: parent.map(|p| p.id.clone()),
            name: name.to_string(),
            kind,
            start_time: Utc::now(),
            input,
        }
    }

    /// 开始一个顶层 span
    pub fn span(&self, name: &str, input: Value) -> Observation {
        self.observe(None, ObservationKind::Span, name, input)
    }

    /// 开始一个子 span
    pub fn child_span(&self, parent: &Observation, name: &str, input: Value) -> Observation {
        self.observe(Some(parent), ObservationKind::Span, name, input)
    }

    /// 开始一次模型调用观测
    pub fn generation(&self, parent: Option<&Observation>, name: &str, input: Value) -> Observation {
        self.observe(parent, ObservationKind::Generation, name, input)
    }

    fn close(&self, observation: Observation, fill: impl FnOnce(&mut ObservationBody)) {
        let end_time = Utc::now();
        let duration_ms = (end_time - observation.start_time).num_milliseconds();
        debug!(
            "Observation closed: trace={}, name={}, duration_ms={}",
            self.id, observation.name, duration_ms
        );

        let event_type = match observation.kind {
            ObservationKind::Span => EventType::SpanCreate,
            ObservationKind::Generation => EventType::GenerationCreate,
        };
        let mut body = ObservationBody {
            id: observation.id,
            trace_id: self.id.clone(),
            parent_observation_id: observation.parent_id,
            name: observation.name,
            start_time: Some(observation.start_time),
            end_time: Some(end_time),
            input: Some(observation.input),
            level: Some(ObservationLevel::Default),
            ..Default::default()
        };
        fill(&mut body);
        self.push(event_type, EventBody::Observation(body));
    }

    /// 正常结束
    pub fn end(&self, observation: Observation, output: Value) {
        self.close(observation, |body| body.output = Some(output));
    }

    /// 以错误结束
    pub fn fail(&self, observation: Observation, error: &str) {
        self.close(observation, |body| {
            body.level = Some(ObservationLevel::Error);
            body.status_message = Some(error.to_string());
        });
    }

    /// 结束模型调用观测，附带模型、参数、用量与原始输出预览
    pub fn end_generation(&self, observation: Observation, completion: &LlmCompletion, details: GenerationDetails<'_>) {
        self.close(observation, |body| {
            body.output = Some(json!({
                "raw_response": truncate(&completion.content, RAW_PREVIEW_CHARS),
                "finish_reason": completion.finish_reason,
            }));
            body.metadata = Some(json!({
                "response_length": completion.content.chars().count(),
                "attempts": completion.attempts,
            }));
            body.model = Some(completion.model.clone());
            body.model_parameters = Some(details.model_parameters);
            body.usage = completion.usage.map(|u| UsageBody {
                input: u.input,
                output: u.output,
                total: u.total(),
            });
            body.prompt_name = details.prompt.map(|p| p.name.clone());
            body.prompt_version = details.prompt.map(|p| p.version);
        });
    }

    /// 附加数值评分；observation 为 None 时挂在追踪本身
    pub fn score(&self, observation_id: Option<&str>, name: &str, value: f64, comment: Option<&str>) {
        self.push(
            EventType::ScoreCreate,
            EventBody::Score(ScoreBody {
                id: Uuid::new_v4().to_string(),
                trace_id: self.id.clone(),
                observation_id: observation_id.map(str::to_string),
                name: name.to_string(),
                value,
                comment: comment.map(str::to_string),
                data_type: "NUMERIC",
            }),
        );
    }

    /// 当前已记录的事件（不含根追踪）
    pub fn events(&self) -> Vec<IngestionEvent> {
        self.events.lock().clone()
    }

    /// 结束追踪并在后台上报
    ///
    /// 返回上报任务句柄；追踪未启用时返回 None。调用方无需等待。
    pub fn finish(self, outcome: Result<Value, String>) -> Option<JoinHandle<()>> {
        let (output, metadata) = match outcome {
            Ok(output) => (output, json!({ "status": "ok" })),
            Err(error) => (Value::Null, json!({ "status": "error", "error": error })),
        };

        let mut batch = Vec::with_capacity(self.events.lock().len() + 1);
        batch.push(IngestionEvent {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: EventType::TraceCreate,
            body: EventBody::Trace(TraceBody {
                id: self.id.clone(),
                name: self.name,
                timestamp: self.started,
                input: Some(self.input),
                output: Some(output),
                metadata: Some(metadata),
                tags: vec!["content-generation".to_string()],
            }),
        });
        batch.extend(self.events.into_inner());

        let client = self.client?;
        let trace_id = self.id;
        Some(tokio::spawn(async move {
            match client.ingest(&batch).await {
                Ok(report) if report.errors.is_empty() => {
                    debug!("Trace flushed: id={}, events={}", trace_id, batch.len());
                }
                Ok(report) => {
                    warn!(
                        "Trace flushed with {} rejected event(s): id={}",
                        report.errors.len(),
                        trace_id
                    );
                }
                Err(e) => {
                    warn!("Trace flush failed: id={}, error={}", trace_id, e);
                }
            }
        }))
    }
}
