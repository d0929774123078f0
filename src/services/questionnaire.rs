//! 问卷规范化
//!
//! 校验请求中的分组和问答，转换为渲染 prompt 所用的内部结构。
//! 纯函数，无副作用。

use serde::Serialize;

use crate::error::AppError;
use crate::models::{ContentRequest, RawQaPair};

/// 一组问答
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
}

/// 问卷分组
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionnaireSection {
    pub name: String,
    pub answers: Vec<QaPair>,
}

/// 规范化后的问卷
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Questionnaire {
    sections: Vec<QuestionnaireSection>,
}

impl Questionnaire {
    pub fn sections(&self) -> &[QuestionnaireSection] {
        &self.sections
    }

    /// 问答总数
    pub fn answer_count(&self) -> usize {
        self.sections.iter().map(|s| s.answers.len()).sum()
    }

    /// 格式化为 prompt 文本
    ///
    /// ```text
    /// ## 分组名
    /// - 问题
    /// 回答
    /// ```
    pub fn to_prompt_text(&self) -> String {
        self.sections
            .iter()
            .map(|section| {
                let mut block = format!("## {}\n", section.name);
                for pair in &section.answers {
                    block.push_str(&format!("- {}\n{}\n", pair.question, pair.answer));
                }
                block
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

/// 校验并规范化问卷
///
/// 收集全部问题后一次性返回，每条带有字段路径。
pub fn normalize(request: &ContentRequest) -> Result<Questionnaire, AppError> {
    let mut issues = Vec::new();
    let mut sections = Vec::with_capacity(request.agent_answers.len());

    if request.agent_answers.is_empty() {
        issues.push("agent_answers: at least one section is required".to_string());
    }

    for (i, raw) in request.agent_answers.iter().enumerate() {
        if is_blank(raw.section.as_deref()) {
            issues.push(format!("agent_answers[{}].section: must be a non-empty string", i));
        }
        if raw.questions.is_empty() {
            issues.push(format!("agent_answers[{}].questions: at least one question is required", i));
        }

        let mut answers = Vec::with_capacity(raw.questions.len());
        for (j, entry) in raw.questions.iter().enumerate() {
            let location = format!("agent_answers[{}].questions[{}]", i, j);
            let (question, answer) = match entry {
                RawQaPair::Pair(items) if items.len() == 2 => (Some(&items[0]), Some(&items[1])),
                RawQaPair::Pair(items) => {
                    issues.push(format!(
                        "{}: expected [question, answer], got {} item(s)",
                        location,
                        items.len()
                    ));
                    continue;
                }
                RawQaPair::Object { question, answer } => (question.as_ref(), answer.as_ref()),
            };

            if is_blank(question.map(String::as_str)) {
                issues.push(format!("{}.question: must be a non-empty string", location));
            }
            if is_blank(answer.map(String::as_str)) {
                issues.push(format!("{}.answer: must be a non-empty string", location));
            }
            if let (Some(q), Some(a)) = (question, answer) {
                answers.push(QaPair {
                    question: q.clone(),
                    answer: a.clone(),
                });
            }
        }

        sections.push(QuestionnaireSection {
            name: raw.section.clone().unwrap_or_default(),
            answers,
        });
    }

    if issues.is_empty() {
        Ok(Questionnaire { sections })
    } else {
        Err(AppError::Validation(issues))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    /// 五个分组的示例问卷
    pub(crate) fn sample_request() -> ContentRequest {
        serde_json::from_value(json!({
            "agent_answers": [
                {
                    "section": "Location & Market Information",
                    "questions": [
                        ["What city or region do you primarily serve?", "Austin, Texas and the surrounding Hill Country"],
                        ["Which neighborhoods do you specialize in?", "Travis Heights, Mueller, and Westlake"]
                    ]
                },
                {
                    "section": "Agent/Broker Specialization",
                    "questions": [
                        { "question": "What types of properties do you focus on?", "answer": "Single-family homes and luxury condos" },
                        { "question": "Who is your ideal client?", "answer": "Relocating tech professionals" }
                    ]
                },
                {
                    "section": "Unique Value Proposition",
                    "questions": [
                        ["What sets you apart from other agents?", "Fifteen years of negotiation experience and a 98% list-to-sale ratio"]
                    ]
                },
                {
                    "section": "Personal Brand Elements",
                    "questions": [
                        ["How would you describe your personality?", "Warm, data-driven, and straightforward"],
                        ["What is your brand tagline?", "Home is where your story begins"]
                    ]
                },
                {
                    "section": "Business Goals",
                    "questions": [
                        ["What are your goals for the next year?", "Close 40 transactions and grow my referral network"]
                    ]
                }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_normalize_accepts_sample() {
        let questionnaire = normalize(&sample_request()).unwrap();
        assert_eq!(questionnaire.sections().len(), 5);
        assert_eq!(questionnaire.answer_count(), 8);
        assert_eq!(questionnaire.sections()[1].name, "Agent/Broker Specialization");
        assert_eq!(
            questionnaire.sections()[1].answers[1].answer,
            "Relocating tech professionals"
        );
    }

    #[test]
    fn test_prompt_text_contains_every_answer() {
        let request = sample_request();
        let text = normalize(&request).unwrap().to_prompt_text();
        for section in &request.agent_answers {
            assert!(text.contains(&format!("## {}\n", section.section.as_deref().unwrap())));
            for entry in &section.questions {
                let answer = match entry {
                    RawQaPair::Pair(items) => items[1].clone(),
                    RawQaPair::Object { answer, .. } => answer.clone().unwrap(),
                };
                assert!(text.contains(&answer), "missing answer: {}", answer);
            }
        }
        assert!(text.starts_with("## Location & Market Information\n- What city"));
    }

    #[test]
    fn test_answers_kept_verbatim() {
        let request: ContentRequest = serde_json::from_value(json!({
            "agent_answers": [{ "section": "Goals", "questions": [["Why?", "  padded answer  "]] }]
        }))
        .unwrap();
        let questionnaire = normalize(&request).unwrap();
        assert_eq!(questionnaire.sections()[0].answers[0].answer, "  padded answer  ");
        assert_eq!(questionnaire.to_prompt_text(), "## Goals\n- Why?\n  padded answer  \n");
    }

    #[test]
    fn test_normalize_reports_every_issue() {
        let request: ContentRequest = serde_json::from_value(json!({
            "agent_answers": [
                { "section": "  ", "questions": [["only question"]] },
                { "section": "Goals", "questions": [{ "question": "Why?" }, ["", "answer"]] },
                { "section": "Empty" }
            ]
        }))
        .unwrap();

        let err = normalize(&request).unwrap_err();
        let AppError::Validation(issues) = err else {
            panic!("expected validation error");
        };
        assert!(issues.contains(&"agent_answers[0].section: must be a non-empty string".to_string()));
        assert!(issues.iter().any(|i| i.starts_with("agent_answers[0].questions[0]: expected [question, answer]")));
        assert!(issues.contains(&"agent_answers[1].questions[0].answer: must be a non-empty string".to_string()));
        assert!(issues.contains(&"agent_answers[1].questions[1].question: must be a non-empty string".to_string()));
        assert!(issues.contains(&"agent_answers[2].questions: at least one question is required".to_string()));
        assert_eq!(issues.len(), 5);
    }

    #[test]
    fn test_empty_questionnaire_rejected() {
        let request = ContentRequest { agent_answers: vec![] };
        assert!(matches!(normalize(&request), Err(AppError::Validation(_))));
    }
}
