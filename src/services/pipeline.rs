//! 内容生成流水线
//!
//! 规范化问卷 → 渲染 prompt → 调用模型 → 解析 → 分区评审。
//! 每一步都记录为请求追踪中的一个观测，追踪在请求结束后后台上报。

use serde_json::{json, Value};
use tracing::{error, info, warn};

use super::content_parser::{parse_generated_content, ParseOutcome};
use super::judge_service::{JudgeRubric, JudgeService};
use super::llm_service::LlmService;
use super::prompt_service::{PromptService, RenderedPrompt};
use super::questionnaire::{normalize, Questionnaire};
use crate::error::AppResult;
use crate::langfuse::LangfuseError;
use crate::models::{ContentRequest, GeneratedContent, SectionScores};
use crate::observability::{snapshot, GenerationDetails, Observation, RequestTrace, TraceRecorder};

/// 追踪中主输出解析结果的评分名称
pub const PARSE_SUCCESS_SCORE: &str = "parse_success";

/// 流水线输出
#[derive(Debug)]
pub struct PipelineOutput {
    pub trace_id: String,
    pub generated_content: GeneratedContent,
    pub scores: SectionScores,
}

/// 内容生成流水线
#[derive(Clone)]
pub struct ContentPipeline {
    prompts: PromptService,
    generator: LlmService,
    judge: JudgeService,
    recorder: TraceRecorder,
    content_prompt: String,
    judge_prompt: String,
}

/// 以观测包裹一步的结果：成功时记录输出，失败时记录错误
fn record<T>(
    trace: &RequestTrace,
    observation: Observation,
    result: AppResult<T>,
    output: impl FnOnce(&T) -> Value,
) -> AppResult<T> {
    match &result {
        Ok(value) => trace.end(observation, output(value)),
        Err(e) => trace.fail(observation, &e.to_string()),
    }
    result
}

impl ContentPipeline {
    pub fn new(
        prompts: PromptService,
        generator: LlmService,
        judge: JudgeService,
        recorder: TraceRecorder,
        content_prompt: impl Into<String>,
        judge_prompt: impl Into<String>,
    ) -> Self {
        Self {
            prompts,
            generator,
            judge,
            recorder,
            content_prompt: content_prompt.into(),
            judge_prompt: judge_prompt.into(),
        }
    }

    pub fn recorder(&self) -> &TraceRecorder {
        &self.recorder
    }

    pub fn content_prompt(&self) -> &str {
        &self.content_prompt
    }

    /// 完整执行一次内容生成
    pub async fn run(&self, request: &ContentRequest) -> AppResult<PipelineOutput> {
        let trace = self.recorder.start_trace("generate_content", snapshot(request));
        let trace_id = trace.id().to_string();
        info!("Content generation started: trace_id={}", trace_id);

        let result = self.execute(request, &trace).await;

        let outcome = match &result {
            Ok((content, scores)) => Ok(json!({
                "generated_content": content,
                "scores": scores,
            })),
            Err(e) => {
                error!("Content generation failed: trace_id={}, error={}", trace_id, e);
                Err(e.to_string())
            }
        };
        trace.finish(outcome);

        let (generated_content, scores) = result?;
        info!(
            "Content generation finished: trace_id={}, sections={}, scored={}",
            trace_id,
            generated_content.len(),
            scores.values().filter(|s| s.is_some()).count()
        );
        Ok(PipelineOutput {
            trace_id,
            generated_content,
            scores,
        })
    }

    /// 只规范化和渲染，不调用模型
    pub async fn render_only(&self, request: &ContentRequest) -> AppResult<RenderedPrompt> {
        let questionnaire = normalize(request)?;
        self.render(&questionnaire).await
    }

    async fn execute(
        &self,
        request: &ContentRequest,
        trace: &RequestTrace,
    ) -> AppResult<(GeneratedContent, SectionScores)> {
        // 1. 规范化问卷
        let span = trace.span("normalize_questionnaire", snapshot(request));
        let questionnaire = record(trace, span, normalize(request), |q| {
            json!({ "sections": q.sections().len(), "answers": q.answer_count() })
        })?;

        // 2. 读取模板并渲染
        let span = trace.span(
            "render_prompt",
            json!({ "template": self.content_prompt, "label": self.prompts.label() }),
        );
        let rendered = self.render(&questionnaire).await;
        let rendered = record(trace, span, rendered, |r| {
            json!({
                "template": r.template,
                "prompt_length": r.text.chars().count(),
            })
        })?;

        // 3. 调用生成模型
        let generation = trace.generation(None, "generate_content", json!(rendered.text));
        let completion = match self.generator.generate(&rendered.text).await {
            Ok(completion) => completion,
            Err(e) => {
                trace.fail(generation, &e.to_string());
                return Err(e.into());
            }
        };
        info!(
            "Model output received: model={}, length={}, attempts={}",
            completion.model,
            completion.content.len(),
            completion.attempts
        );
        trace.end_generation(
            generation,
            &completion,
            GenerationDetails {
                model_parameters: self.generator.model_parameters(),
                prompt: Some(&rendered.template),
            },
        );

        // 4. 解析
        let span = trace.span(
            "parse_content",
            json!({ "raw_length": completion.content.chars().count() }),
        );
        let outcome = parse_generated_content(&completion.content);
        match &outcome {
            ParseOutcome::Valid(content) => {
                trace.end(span, json!({ "sections": content.sections() }));
                trace.score(None, PARSE_SUCCESS_SCORE, 1.0, None);
            }
            ParseOutcome::Invalid { errors, .. } => {
                let message = errors.join("; ");
                warn!("Model output rejected: {}", message);
                trace.fail(span, &message);
                trace.score(None, PARSE_SUCCESS_SCORE, 0.0, Some(&message));
            }
        }
        let content = outcome.into_result()?;

        // 5. 分区评审
        let rubric = self.load_rubric().await;
        let span = trace.span(
            "judge_sections",
            json!({
                "sections": content.sections(),
                "rubric": rubric.template(),
            }),
        );
        let scores = self.judge.evaluate(&content, &questionnaire, &rubric, trace, &span).await;
        trace.end(span, snapshot(&scores));

        Ok((content, scores))
    }

    async fn render(&self, questionnaire: &Questionnaire) -> AppResult<RenderedPrompt> {
        let template = self.prompts.fetch(&self.content_prompt).await?;
        Ok(PromptService::render_content_prompt(&template, questionnaire))
    }

    /// 读取评审 prompt，不可用时退回内置评分标准
    async fn load_rubric(&self) -> JudgeRubric {
        match self.prompts.fetch(&self.judge_prompt).await {
            Ok(template) => JudgeRubric::from(template),
            Err(LangfuseError::PromptNotFound { name, label }) => {
                warn!("Judge prompt {}@{} not found, using built-in rubric", name, label);
                JudgeRubric::builtin()
            }
            Err(e) => {
                warn!("Failed to load judge prompt, using built-in rubric: {}", e);
                JudgeRubric::builtin()
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::ModelSettings;
    use crate::error::AppError;
    use crate::langfuse::{mount_prompt, test_settings, LangfuseClient};
    use crate::llm::{openai_reply, test_client};
    use crate::models::ContentSection;
    use crate::services::content_parser::tests::full_content;
    use crate::services::questionnaire::tests::sample_request;
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub(crate) const CONTENT_PROMPT: &str = "real_estate_content_generation";
    pub(crate) const JUDGE_PROMPT: &str = "real_estate_section_judge";

    /// 生成和评审共用一个模拟的模型服务，Langfuse 另起一个
    pub(crate) fn test_pipeline(llm: &MockServer, langfuse: &MockServer) -> ContentPipeline {
        let client = Arc::new(test_client(&llm.uri()));
        let settings = |temperature, max_tokens| ModelSettings {
            model: "gpt-4o-mini".to_string(),
            temperature,
            max_tokens,
        };
        let langfuse_client =
            LangfuseClient::new(&test_settings(&langfuse.uri()), Duration::from_secs(5)).unwrap();

        ContentPipeline::new(
            PromptService::new(langfuse_client, "production"),
            LlmService::new(client.clone(), &settings(0.2, 4096)),
            JudgeService::new(LlmService::new(client, &settings(0.0, 512)), 4),
            TraceRecorder::disabled(),
            CONTENT_PROMPT,
            JUDGE_PROMPT,
        )
    }

    /// 挂载生成与评审两类回复，按 prompt 内容区分
    pub(crate) async fn mount_happy_path(llm: &MockServer, langfuse: &MockServer) {
        mount_prompt(langfuse, CONTENT_PROMPT, "Write website copy").await;
        mount_prompt(langfuse, JUDGE_PROMPT, "JUDGE {{section_name}}: {{section_content}}").await;

        Mock::given(method("POST"))
            .and(body_string_contains("JUDGE "))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(openai_reply(r#"{"score": 8, "rationale": "Clear and specific."}"#)),
            )
            .with_priority(1)
            .mount(llm)
            .await;
        Mock::given(method("POST"))
            .and(body_string_contains("Write website copy"))
            .respond_with(ResponseTemplate::new(200).set_body_json(openai_reply(&full_content().to_string())))
            .with_priority(2)
            .mount(llm)
            .await;
    }

    #[tokio::test]
    async fn test_end_to_end_five_sections() {
        let llm = MockServer::start().await;
        let langfuse = MockServer::start().await;
        mount_happy_path(&llm, &langfuse).await;

        let output = test_pipeline(&llm, &langfuse).run(&sample_request()).await.unwrap();

        assert!(!output.trace_id.is_empty());
        assert_eq!(output.generated_content.sections(), ContentSection::ALL.to_vec());
        assert_eq!(output.scores.len(), ContentSection::ALL.len());
        for score in output.scores.values() {
            let score = score.as_ref().unwrap();
            assert!((0.0..=10.0).contains(&score.score));
            assert_eq!(score.rationale, "Clear and specific.");
        }

        // 1 次生成 + 6 次评审
        let requests = llm.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1 + ContentSection::ALL.len());
        let generation = requests
            .iter()
            .find(|r| String::from_utf8_lossy(&r.body).contains("Write website copy"))
            .unwrap();
        let body = String::from_utf8_lossy(&generation.body);
        assert!(body.contains("Relocating tech professionals"));
        assert!(body.contains("Business Goals"));
    }

    #[tokio::test]
    async fn test_missing_content_prompt_is_not_found() {
        let llm = MockServer::start().await;
        let langfuse = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "not found" })))
            .mount(&langfuse)
            .await;

        let err = test_pipeline(&llm, &langfuse).run(&sample_request()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(llm.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unparsable_output_is_parse_error() {
        let llm = MockServer::start().await;
        let langfuse = MockServer::start().await;
        mount_prompt(&langfuse, CONTENT_PROMPT, "Write website copy").await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(openai_reply("Sorry, I can't help with that.")))
            .mount(&llm)
            .await;

        let err = test_pipeline(&llm, &langfuse).run(&sample_request()).await.unwrap_err();
        match err {
            AppError::Parse { raw, .. } => assert_eq!(raw, "Sorry, I can't help with that."),
            other => panic!("unexpected error: {:?}", other),
        }
        // 解析失败时不进入评审
        assert_eq!(llm.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_builtin_rubric_when_judge_prompt_missing() {
        let llm = MockServer::start().await;
        let langfuse = MockServer::start().await;
        mount_prompt(&langfuse, CONTENT_PROMPT, "Write website copy").await;
        Mock::given(method("GET"))
            .and(path(format!("/api/public/v2/prompts/{}", JUDGE_PROMPT)))
            .respond_with(ResponseTemplate::new(404))
            .mount(&langfuse)
            .await;
        Mock::given(method("POST"))
            .and(body_string_contains("Score the section from 0 to 10"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(openai_reply(r#"{"score": 6.5, "reason": "Generic."}"#)),
            )
            .with_priority(1)
            .mount(&llm)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(openai_reply(&full_content().to_string())))
            .with_priority(2)
            .mount(&llm)
            .await;

        let output = test_pipeline(&llm, &langfuse).run(&sample_request()).await.unwrap();
        assert!(output
            .scores
            .values()
            .all(|s| s.as_ref().map(|s| s.score) == Some(6.5)));
    }

    #[tokio::test]
    async fn test_render_only_skips_model() {
        let llm = MockServer::start().await;
        let langfuse = MockServer::start().await;
        mount_prompt(&langfuse, CONTENT_PROMPT, "Intro\n{{questionnaire}}").await;

        let rendered = test_pipeline(&llm, &langfuse)
            .render_only(&sample_request())
            .await
            .unwrap();
        assert!(rendered.text.starts_with("Intro\n## Location & Market Information"));
        assert_eq!(rendered.template.version, 4);
        assert!(llm.received_requests().await.unwrap().is_empty());
    }
}
