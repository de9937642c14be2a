//! Thinking-model records and the analysis result they produce.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Words per minute used for the reading-time estimate.
pub const READING_SPEED: usize = 300;

// ── Enums ───────────────────────────────────────────────────────────

/// The ten fixed catalog categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelCategory {
    DecisionAnalysis,
    LogicalThinking,
    ProblemSolving,
    TimeManagement,
    InnovativeThinking,
    RiskManagement,
    EfficiencyOptimization,
    CognitiveBias,
    SystemsThinking,
    CommunicationCollaboration,
}

impl ModelCategory {
    pub const ALL: [ModelCategory; 10] = [
        ModelCategory::DecisionAnalysis,
        ModelCategory::LogicalThinking,
        ModelCategory::ProblemSolving,
        ModelCategory::TimeManagement,
        ModelCategory::InnovativeThinking,
        ModelCategory::RiskManagement,
        ModelCategory::EfficiencyOptimization,
        ModelCategory::CognitiveBias,
        ModelCategory::SystemsThinking,
        ModelCategory::CommunicationCollaboration,
    ];

    /// Wire identifier, e.g. `decision-analysis`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelCategory::DecisionAnalysis => "decision-analysis",
            ModelCategory::LogicalThinking => "logical-thinking",
            ModelCategory::ProblemSolving => "problem-solving",
            ModelCategory::TimeManagement => "time-management",
            ModelCategory::InnovativeThinking => "innovative-thinking",
            ModelCategory::RiskManagement => "risk-management",
            ModelCategory::EfficiencyOptimization => "efficiency-optimization",
            ModelCategory::CognitiveBias => "cognitive-bias",
            ModelCategory::SystemsThinking => "systems-thinking",
            ModelCategory::CommunicationCollaboration => "communication-collaboration",
        }
    }

    /// Human-readable label used in prompts and reports.
    pub fn label(&self) -> &'static str {
        match self {
            ModelCategory::DecisionAnalysis => "Decision analysis",
            ModelCategory::LogicalThinking => "Logical thinking",
            ModelCategory::ProblemSolving => "Problem solving",
            ModelCategory::TimeManagement => "Time management",
            ModelCategory::InnovativeThinking => "Innovative thinking",
            ModelCategory::RiskManagement => "Risk management",
            ModelCategory::EfficiencyOptimization => "Efficiency optimization",
            ModelCategory::CognitiveBias => "Cognitive bias",
            ModelCategory::SystemsThinking => "Systems thinking",
            ModelCategory::CommunicationCollaboration => "Communication and collaboration",
        }
    }

    pub fn parse(s: &str) -> Option<ModelCategory> {
        Self::ALL.iter().copied().find(|c| c.as_str() == s)
    }
}

impl fmt::Display for ModelCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn parse(s: &str) -> Option<Difficulty> {
        match s {
            "easy" => Some(Difficulty::Easy),
            "medium" => Some(Difficulty::Medium),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }
}

// ── Thinking Model ──────────────────────────────────────────────────

/// A catalog entry: one named decision/analysis framework.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThinkingModel {
    /// Stable lowercase-hyphen identifier
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_en: Option<String>,
    pub category: ModelCategory,
    pub description: String,
    #[serde(default)]
    pub detailed_description: String,
    #[serde(default)]
    pub applicable_scenarios: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub difficulty: Difficulty,
    /// Popularity weight, 1-10
    pub usage_frequency: u8,
    /// Informational cross-references; not checked against the catalog
    #[serde(default)]
    pub related_models: Vec<String>,
    /// Analysis prompt containing a `{question}` placeholder
    pub prompt_template: String,
    #[serde(default)]
    pub example_questions: Vec<String>,
}

impl ThinkingModel {
    /// The prompt template with `{question}` substituted.
    pub fn render_prompt(&self, question: &str) -> String {
        self.prompt_template.replace("{question}", question)
    }

    /// `name (nameEn)` when an English name is present.
    pub fn display_name(&self) -> String {
        match &self.name_en {
            Some(en) if en != &self.name => format!("{} ({})", self.name, en),
            _ => self.name.clone(),
        }
    }

    /// Case-insensitive match against name, description, keywords and tags.
    pub fn matches(&self, query: &str) -> bool {
        let q = query.trim().to_lowercase();
        if q.is_empty() {
            return true;
        }
        let hit = |s: &str| s.to_lowercase().contains(&q);
        hit(&self.id)
            || hit(&self.name)
            || self.name_en.as_deref().is_some_and(hit)
            || hit(&self.description)
            || self.keywords.iter().any(|k| hit(k))
            || self.tags.iter().any(|t| hit(t))
    }
}

// ── Analysis Result ─────────────────────────────────────────────────

/// Generated analysis text for one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub model_id: String,
    pub content: String,
    pub generated_at: DateTime<Utc>,
    /// Character count of `content`
    pub word_count: usize,
    /// Minutes, rounded up
    pub reading_time: usize,
}

impl AnalysisResult {
    pub fn new(model_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::generated_at(model_id, content, Utc::now())
    }

    pub fn generated_at(
        model_id: impl Into<String>,
        content: impl Into<String>,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let content = content.into();
        let word_count = content.chars().count();
        Self {
            model_id: model_id.into(),
            reading_time: word_count.div_ceil(READING_SPEED),
            word_count,
            content,
            generated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ThinkingModel {
        ThinkingModel {
            id: "pareto-principle".into(),
            name: "帕累托法则".into(),
            name_en: Some("Pareto Principle".into()),
            category: ModelCategory::EfficiencyOptimization,
            description: "20%的行动产生80%的结果".into(),
            detailed_description: String::new(),
            applicable_scenarios: vec![],
            keywords: vec!["Focus".into()],
            tags: vec![],
            difficulty: Difficulty::Easy,
            usage_frequency: 9,
            related_models: vec![],
            prompt_template: "用帕累托法则分析：{question}".into(),
            example_questions: vec![],
        }
    }

    #[test]
    fn test_reading_time_rounds_up() {
        let r = AnalysisResult::new("x", "a".repeat(301));
        assert_eq!(r.word_count, 301);
        assert_eq!(r.reading_time, 2);

        let r = AnalysisResult::new("x", "a".repeat(300));
        assert_eq!(r.reading_time, 1);

        let r = AnalysisResult::new("x", "");
        assert_eq!(r.reading_time, 0);
    }

    #[test]
    fn test_word_count_counts_characters_not_bytes() {
        let r = AnalysisResult::new("x", "分析结果");
        assert_eq!(r.word_count, 4);
    }

    #[test]
    fn test_render_prompt_substitutes_question() {
        let m = sample();
        assert_eq!(m.render_prompt("怎么办"), "用帕累托法则分析：怎么办");
    }

    #[test]
    fn test_matches_is_case_insensitive() {
        let m = sample();
        assert!(m.matches("focus"));
        assert!(m.matches("PARETO"));
        assert!(!m.matches("bayes"));
    }

    #[test]
    fn test_category_wire_format() {
        let json = serde_json::to_string(&ModelCategory::CognitiveBias).unwrap();
        assert_eq!(json, "\"cognitive-bias\"");
        for c in ModelCategory::ALL {
            assert_eq!(ModelCategory::parse(c.as_str()), Some(c));
        }
    }

    #[test]
    fn test_model_serializes_camel_case() {
        let v = serde_json::to_value(sample()).unwrap();
        assert_eq!(v["usageFrequency"], 9);
        assert_eq!(v["nameEn"], "Pareto Principle");
        assert!(v.get("promptTemplate").is_some());
    }
}
