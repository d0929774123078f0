//! 生成内容与评分模型

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// 网站内容分区（模型输出 JSON 的顶层键）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentSection {
    HomePage,
    ThreeStepsCarousel,
    AboutUsPage,
    ContactUsPage,
    GlobalSettings,
    CallToAction,
}

impl ContentSection {
    /// 所有必需分区，按输出顺序排列
    pub const ALL: [ContentSection; 6] = [
        ContentSection::HomePage,
        ContentSection::ThreeStepsCarousel,
        ContentSection::AboutUsPage,
        ContentSection::ContactUsPage,
        ContentSection::GlobalSettings,
        ContentSection::CallToAction,
    ];

    /// JSON 键名
    pub fn key(self) -> &'static str {
        match self {
            ContentSection::HomePage => "home_page",
            ContentSection::ThreeStepsCarousel => "three_steps_carousel",
            ContentSection::AboutUsPage => "about_us_page",
            ContentSection::ContactUsPage => "contact_us_page",
            ContentSection::GlobalSettings => "global_settings",
            ContentSection::CallToAction => "call_to_action",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.key() == key)
    }
}

impl fmt::Display for ContentSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// 经过校验的生成内容：每个必需分区恰好一项，值保持模型原样
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct GeneratedContent(BTreeMap<ContentSection, Value>);

impl GeneratedContent {
    pub(crate) fn from_sections(sections: BTreeMap<ContentSection, Value>) -> Self {
        Self(sections)
    }

    pub fn get(&self, section: ContentSection) -> Option<&Value> {
        self.0.get(&section)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ContentSection, &Value)> {
        self.0.iter().map(|(k, v)| (*k, v))
    }

    pub fn sections(&self) -> Vec<ContentSection> {
        self.0.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// 单个分区的评审结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionScore {
    pub score: f64,
    pub rationale: String,
}

impl SectionScore {
    pub const MIN: f64 = 0.0;
    pub const MAX: f64 = 10.0;

    /// 校验分数范围
    pub fn new(score: f64, rationale: impl Into<String>) -> Result<Self, String> {
        if !score.is_finite() || !(Self::MIN..=Self::MAX).contains(&score) {
            return Err(format!(
                "score {} outside {}..={}",
                score,
                Self::MIN,
                Self::MAX
            ));
        }
        Ok(Self {
            score,
            rationale: rationale.into(),
        })
    }
}

/// 各分区评分，评审失败的分区为 None（序列化为 null）
pub type SectionScores = BTreeMap<ContentSection, Option<SectionScore>>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_section_keys_round_trip() {
        for section in ContentSection::ALL {
            assert_eq!(ContentSection::from_key(section.key()), Some(section));
            assert_eq!(serde_json::to_value(section).unwrap(), json!(section.key()));
        }
        assert_eq!(ContentSection::from_key("blog"), None);
    }

    #[test]
    fn test_score_bounds() {
        assert!(SectionScore::new(0.0, "").is_ok());
        assert!(SectionScore::new(10.0, "").is_ok());
        assert!(SectionScore::new(10.5, "").is_err());
        assert!(SectionScore::new(-1.0, "").is_err());
        assert!(SectionScore::new(f64::NAN, "").is_err());
    }

    #[test]
    fn test_scores_serialize_with_nulls() {
        let mut scores = SectionScores::new();
        scores.insert(ContentSection::HomePage, Some(SectionScore::new(8.0, "solid").unwrap()));
        scores.insert(ContentSection::CallToAction, None);
        let value = serde_json::to_value(&scores).unwrap();
        assert_eq!(value["home_page"]["score"], 8.0);
        assert!(value["call_to_action"].is_null());
    }
}
