//! Prompt 渲染服务
//!
//! 模板存放在 Langfuse，按名称和标签读取；本服务只负责把问卷填进占位符。

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::info;

use super::questionnaire::Questionnaire;
use crate::langfuse::{LangfuseClient, LangfuseError, PromptTemplate};
use crate::models::TemplateRef;

/// 问卷占位符名称
pub const QUESTIONNAIRE_VAR: &str = "questionnaire";

/// `{{ name }}` 形式的占位符
static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}").expect("placeholder regex is valid"));

/// 渲染结果
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPrompt {
    pub text: String,
    pub template: TemplateRef,
}

/// 替换模板中的已知变量，未知占位符原样保留
///
/// 只扫描模板本身，变量值中的花括号不会被二次替换。
/// 返回渲染结果以及实际替换过的变量名。
pub fn render_template<'a>(template: &str, vars: &[(&'a str, &str)]) -> (String, Vec<&'a str>) {
    let mut substituted = Vec::new();
    let rendered = PLACEHOLDER.replace_all(template, |caps: &Captures<'_>| {
        match vars.iter().find(|(name, _)| *name == &caps[1]) {
            Some((name, value)) => {
                if !substituted.contains(name) {
                    substituted.push(*name);
                }
                (*value).to_string()
            }
            None => caps[0].to_string(),
        }
    });
    (rendered.into_owned(), substituted)
}

/// Prompt 服务
#[derive(Clone)]
pub struct PromptService {
    langfuse: LangfuseClient,
    label: String,
}

impl PromptService {
    /// 创建新的 Prompt 服务
    pub fn new(langfuse: LangfuseClient, label: impl Into<String>) -> Self {
        Self {
            langfuse,
            label: label.into(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// 读取当前标签下的模板，不存在时返回 PromptNotFound
    pub async fn fetch(&self, name: &str) -> Result<PromptTemplate, LangfuseError> {
        let template = self.langfuse.get_prompt(name, &self.label).await?;
        info!(
            "Loaded prompt template: name={}, version={}, label={}",
            template.name, template.version, self.label
        );
        Ok(template)
    }

    /// 把问卷渲染进内容生成模板
    ///
    /// 模板含 `{{questionnaire}}` 时就地替换，否则把问卷追加到模板末尾。
    pub fn render_content_prompt(template: &PromptTemplate, questionnaire: &Questionnaire) -> RenderedPrompt {
        let answers = questionnaire.to_prompt_text();
        let (rendered, substituted) = render_template(&template.body, &[(QUESTIONNAIRE_VAR, &answers)]);

        let text = if substituted.contains(&QUESTIONNAIRE_VAR) {
            rendered
        } else {
            format!("{}\n{}", rendered, answers)
        };

        RenderedPrompt {
            text,
            template: TemplateRef {
                name: template.name.clone(),
                version: template.version,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::langfuse::{mount_prompt, test_settings};
    use crate::services::questionnaire::{normalize, tests::sample_request};
    use std::time::Duration;
    use wiremock::MockServer;

    fn template(body: &str) -> PromptTemplate {
        PromptTemplate {
            name: "real_estate_content_generation".to_string(),
            version: 7,
            labels: vec!["production".to_string()],
            body: body.to_string(),
        }
    }

    #[test]
    fn test_render_template_variables() {
        let (out, substituted) = render_template(
            "Score {{ section_name }} for {{agent}}: {{unknown}}",
            &[("section_name", "home_page"), ("agent", "{{section_name}}")],
        );
        assert_eq!(substituted, vec!["section_name", "agent"]);
        assert_eq!(out, "Score home_page for {{section_name}}: {{unknown}}");

        let (out, substituted) = render_template("no placeholders", &[("x", "y")]);
        assert!(substituted.is_empty());
        assert_eq!(out, "no placeholders");
    }

    #[test]
    fn test_placeholder_substitution() {
        let questionnaire = normalize(&sample_request()).unwrap();
        let rendered = PromptService::render_content_prompt(
            &template("Write JSON website copy.\n\n{{ questionnaire }}\n\nReturn only JSON."),
            &questionnaire,
        );
        assert!(rendered.text.starts_with("Write JSON website copy.\n\n## Location & Market Information"));
        assert!(rendered.text.ends_with("\n\nReturn only JSON."));
        assert_eq!(rendered.template.version, 7);
    }

    #[test]
    fn test_append_when_no_placeholder() {
        let questionnaire = normalize(&sample_request()).unwrap();
        let rendered = PromptService::render_content_prompt(&template("Write website copy."), &questionnaire);
        assert_eq!(
            rendered.text,
            format!("Write website copy.\n{}", questionnaire.to_prompt_text())
        );
    }

    #[test]
    fn test_render_is_deterministic_and_verbatim() {
        let request = sample_request();
        let questionnaire = normalize(&request).unwrap();
        let tpl = template("{{questionnaire}}");
        let first = PromptService::render_content_prompt(&tpl, &questionnaire);
        let second = PromptService::render_content_prompt(&tpl, &questionnaire);
        assert_eq!(first, second);

        for section in questionnaire.sections() {
            for pair in &section.answers {
                assert!(first.text.contains(&pair.answer));
            }
        }
    }

    #[tokio::test]
    async fn test_fetch_uses_label() {
        let server = MockServer::start().await;
        mount_prompt(&server, "real_estate_content_generation", "{{questionnaire}}").await;

        let client = LangfuseClient::new(&test_settings(&server.uri()), Duration::from_secs(5)).unwrap();
        let service = PromptService::new(client, "production");

        let template = service.fetch("real_estate_content_generation").await.unwrap();
        assert_eq!(template.version, 4);

        let missing = service.fetch("other_prompt").await;
        assert!(missing.is_err());
    }
}
