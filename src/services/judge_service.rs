//! 分区评审（LLM as judge）
//!
//! 对生成内容的每个分区单独发起一次模型调用，按评分标准给出 0–10 的分数和理由。
//! 单个分区失败只会让该分区的分数为 null，不影响其他分区和整个请求。

use futures::stream::{self, StreamExt};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::content_parser::parse_lenient_json;
use super::llm_service::LlmService;
use super::prompt_service::{render_template, QUESTIONNAIRE_VAR};
use super::questionnaire::Questionnaire;
use crate::langfuse::PromptTemplate;
use crate::llm::LlmError;
use crate::models::{ContentSection, GeneratedContent, SectionScore, SectionScores, TemplateRef};
use crate::observability::{snapshot, GenerationDetails, Observation, RequestTrace};
use crate::utils::truncate;

/// 未在 Langfuse 中配置评审 prompt 时使用的评分标准
pub const DEFAULT_JUDGE_PROMPT: &str = r#"You are reviewing one section of a real-estate agent's website copy.

Score the section from 0 to 10 for SEO strength, tone fit with the agent's brand, clarity, and completeness relative to the agent's questionnaire answers.

Agent questionnaire:
{{questionnaire}}

Section "{{section_name}}":
{{section_content}}

Respond with JSON only, in this format:
{"score": <number between 0 and 10>, "rationale": "<one or two sentences>"}"#;

/// 分区内容占位符名称
const SECTION_CONTENT_VAR: &str = "section_content";

/// 评审错误（仅影响单个分区）
#[derive(Debug, Error)]
pub enum JudgeError {
    #[error("评审调用失败: {0}")]
    Llm(#[from] LlmError),

    #[error("评分解析失败: {reason}")]
    ScoreParse { raw: String, reason: String },
}

/// 评审所用的评分标准
#[derive(Debug, Clone)]
pub struct JudgeRubric {
    body: String,
    template: Option<TemplateRef>,
}

impl JudgeRubric {
    pub fn builtin() -> Self {
        Self {
            body: DEFAULT_JUDGE_PROMPT.to_string(),
            template: None,
        }
    }

    pub fn template(&self) -> Option<&TemplateRef> {
        self.template.as_ref()
    }

    /// 渲染单个分区的评审 prompt
    ///
    /// 模板中没有 `{{section_content}}` 时，把分区内容追加到末尾。
    pub fn render(&self, section: ContentSection, content: &Value, questionnaire: &Questionnaire) -> String {
        let section_content = serde_json::to_string_pretty(content).unwrap_or_else(|_| content.to_string());
        let answers = questionnaire.to_prompt_text();
        let (rendered, substituted) = render_template(
            &self.body,
            &[
                ("section_name", section.key()),
                (SECTION_CONTENT_VAR, &section_content),
                (QUESTIONNAIRE_VAR, &answers),
            ],
        );

        if substituted.contains(&SECTION_CONTENT_VAR) {
            rendered
        } else {
            format!("{}\n\nSection (\"{}\"):\n{}", rendered, section, section_content)
        }
    }
}

impl From<PromptTemplate> for JudgeRubric {
    fn from(template: PromptTemplate) -> Self {
        Self {
            template: Some(TemplateRef {
                name: template.name,
                version: template.version,
            }),
            body: template.body,
        }
    }
}

/// 解析评审模型的输出
///
/// 需要 `{"score": number, "rationale": string}`，`reason` 作为 `rationale` 的别名；
/// 分数可以是数字或数字字符串，必须落在 0–10 之间。
pub fn parse_score(raw: &str) -> Result<SectionScore, JudgeError> {
    let fail = |reason: String| JudgeError::ScoreParse {
        raw: raw.to_string(),
        reason,
    };

    let value = parse_lenient_json(raw).map_err(|e| fail(format!("invalid JSON: {}", e)))?;

    let score = match value.get("score") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| fail("missing numeric 'score'".to_string()))?;

    let rationale = value
        .get("rationale")
        .or_else(|| value.get("reason"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .ok_or_else(|| fail("missing 'rationale'".to_string()))?;

    SectionScore::new(score, rationale).map_err(fail)
}

/// 评审服务
#[derive(Clone)]
pub struct JudgeService {
    llm: LlmService,
    concurrency: usize,
}

impl JudgeService {
    pub fn new(llm: LlmService, concurrency: usize) -> Self {
        Self {
            llm,
            concurrency: concurrency.max(1),
        }
    }

    /// 并发评审所有分区，汇总全部结果后返回
    pub async fn evaluate(
        &self,
        content: &GeneratedContent,
        questionnaire: &Questionnaire,
        rubric: &JudgeRubric,
        trace: &RequestTrace,
        parent: &Observation,
    ) -> SectionScores {
        let tasks: Vec<_> = content
            .iter()
            .map(|(section, value)| async move {
                match self.evaluate_section(section, value, questionnaire, rubric, trace, parent).await {
                    Ok(score) => (section, Some(score)),
                    Err(e) => {
                        warn!("Judge failed for section {}: {}", section, e);
                        (section, None)
                    }
                }
            })
            .collect();

        let results: Vec<(ContentSection, Option<SectionScore>)> =
            stream::iter(tasks).buffer_unordered(self.concurrency).collect().await;

        let scored = results.iter().filter(|(_, s)| s.is_some()).count();
        info!("Judge pass finished: {}/{} sections scored", scored, results.len());

        results.into_iter().collect()
    }

    async fn evaluate_section(
        &self,
        section: ContentSection,
        content: &Value,
        questionnaire: &Questionnaire,
        rubric: &JudgeRubric,
        trace: &RequestTrace,
        parent: &Observation,
    ) -> Result<SectionScore, JudgeError> {
        let span = trace.child_span(parent, &format!("judge:{}", section), json!({ "section": section.key() }));
        let span_id = span.id().to_string();

        let prompt = rubric.render(section, content, questionnaire);
        let generation = trace.generation(Some(&span), "judge_call", json!(prompt));

        let completion = match self.llm.generate(&prompt).await {
            Ok(completion) => completion,
            Err(e) => {
                trace.fail(generation, &e.to_string());
                trace.fail(span, &e.to_string());
                return Err(e.into());
            }
        };
        trace.end_generation(
            generation,
            &completion,
            GenerationDetails {
                model_parameters: self.llm.model_parameters(),
                prompt: rubric.template(),
            },
        );

        match parse_score(&completion.content) {
            Ok(score) => {
                trace.score(Some(&span_id), section.key(), score.score, Some(&score.rationale));
                trace.end(span, snapshot(&score));
                Ok(score)
            }
            Err(e) => {
                if let JudgeError::ScoreParse { raw, .. } = &e {
                    debug!("Unparsable judge output for {}: {}", section, truncate(raw, 200));
                }
                trace.fail(span, &e.to_string());
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelSettings;
    use crate::langfuse::{EventBody, EventType};
    use crate::llm::{openai_reply, test_client};
    use crate::observability::TraceRecorder;
    use crate::services::content_parser::{parse_generated_content, tests::full_content, ParseOutcome};
    use crate::services::questionnaire::{normalize, tests::sample_request};
    use std::sync::Arc;
    use wiremock::matchers::{body_string_contains, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn judge_service(server: &MockServer) -> JudgeService {
        let llm = LlmService::new(
            Arc::new(test_client(&server.uri())),
            &ModelSettings {
                model: "gpt-4o-mini".to_string(),
                temperature: 0.0,
                max_tokens: 512,
            },
        );
        JudgeService::new(llm, 3)
    }

    fn generated() -> GeneratedContent {
        match parse_generated_content(&full_content().to_string()) {
            ParseOutcome::Valid(content) => content,
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_parse_score_variants() {
        let score = parse_score(r#"{"score": 8.5, "rationale": "Strong local SEO."}"#).unwrap();
        assert_eq!(score.score, 8.5);
        assert_eq!(score.rationale, "Strong local SEO.");

        let score = parse_score("```json\n{\"score\": \"7\", \"reason\": \"Good tone.\"}\n```").unwrap();
        assert_eq!(score.score, 7.0);
        assert_eq!(score.rationale, "Good tone.");
    }

    #[test]
    fn test_parse_score_failures() {
        assert!(matches!(parse_score("not json"), Err(JudgeError::ScoreParse { .. })));
        assert!(matches!(parse_score(r#"{"rationale": "no score"}"#), Err(JudgeError::ScoreParse { .. })));
        assert!(matches!(parse_score(r#"{"score": 7}"#), Err(JudgeError::ScoreParse { .. })));
        let err = parse_score(r#"{"score": 42, "rationale": "too high"}"#).unwrap_err();
        match err {
            JudgeError::ScoreParse { raw, reason } => {
                assert!(raw.contains("42"));
                assert!(reason.contains("outside"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_builtin_rubric_render() {
        let questionnaire = normalize(&sample_request()).unwrap();
        let rubric = JudgeRubric::builtin();
        let prompt = rubric.render(ContentSection::HomePage, &json!({ "hero_title": "Hi" }), &questionnaire);
        assert!(prompt.contains("Section \"home_page\":"));
        assert!(prompt.contains("\"hero_title\": \"Hi\""));
        assert!(prompt.contains("Relocating tech professionals"));
        assert!(rubric.template().is_none());
    }

    #[test]
    fn test_rubric_without_placeholders_appends_section() {
        let questionnaire = normalize(&sample_request()).unwrap();
        let rubric = JudgeRubric::from(PromptTemplate {
            name: "real_estate_section_judge".to_string(),
            version: 2,
            labels: vec![],
            body: "Rate this section.".to_string(),
        });
        let prompt = rubric.render(ContentSection::CallToAction, &json!("Call now"), &questionnaire);
        assert_eq!(prompt, "Rate this section.\n\nSection (\"call_to_action\"):\n\"Call now\"");
        assert_eq!(rubric.template().unwrap().version, 2);
    }

    #[test]
    fn test_questionnaire_only_rubric_still_includes_section() {
        let questionnaire = normalize(&sample_request()).unwrap();
        let rubric = JudgeRubric::from(PromptTemplate {
            name: "real_estate_section_judge".to_string(),
            version: 3,
            labels: vec![],
            body: "Score this section against the brief:\n{{questionnaire}}".to_string(),
        });
        let prompt = rubric.render(
            ContentSection::HomePage,
            &json!({ "hero_title": "UNIQUE_HERO" }),
            &questionnaire,
        );
        assert!(prompt.contains("Relocating tech professionals"));
        assert!(prompt.contains("Section (\"home_page\"):"));
        assert!(prompt.contains("UNIQUE_HERO"));
    }

    #[tokio::test]
    async fn test_one_failing_section_is_null() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("Section \\\"about_us_page\\\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(openai_reply("I think it's fine")))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(openai_reply(r#"{"score": 9, "rationale": "Clear and on-brand."}"#)),
            )
            .with_priority(5)
            .mount(&server)
            .await;

        let questionnaire = normalize(&sample_request()).unwrap();
        let trace = TraceRecorder::disabled().start_trace("test", json!({}));
        let parent = trace.span("judge_sections", json!({}));

        let scores = judge_service(&server)
            .evaluate(&generated(), &questionnaire, &JudgeRubric::builtin(), &trace, &parent)
            .await;

        assert_eq!(scores.len(), ContentSection::ALL.len());
        assert_eq!(scores[&ContentSection::AboutUsPage], None);
        for section in ContentSection::ALL.into_iter().filter(|s| *s != ContentSection::AboutUsPage) {
            let score = scores[&section].as_ref().unwrap();
            assert_eq!(score.score, 9.0);
        }

        let score_events = trace
            .events()
            .into_iter()
            .filter(|e| e.event_type == EventType::ScoreCreate)
            .count();
        assert_eq!(score_events, ContentSection::ALL.len() - 1);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_section_local() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
            .mount(&server)
            .await;

        let questionnaire = normalize(&sample_request()).unwrap();
        let trace = TraceRecorder::disabled().start_trace("test", json!({}));
        let parent = trace.span("judge_sections", json!({}));

        let scores = judge_service(&server)
            .evaluate(&generated(), &questionnaire, &JudgeRubric::builtin(), &trace, &parent)
            .await;

        assert!(scores.values().all(Option::is_none));
        let failed_spans = trace
            .events()
            .into_iter()
            .filter(|e| matches!(&e.body, EventBody::Observation(o) if o.status_message.is_some()))
            .count();
        // 每个分区一个失败的 generation 和一个失败的 span
        assert_eq!(failed_spans, ContentSection::ALL.len() * 2);
    }
}
