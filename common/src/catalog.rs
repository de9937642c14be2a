//! Model catalog: the read-only table of thinking models.
//!
//! Every lens we can recommend or analyze with is described here. The
//! catalog is built once at startup (from the embedded asset or a JSON
//! file) and handed to the recommender and analyzer; nothing mutates it
//! afterwards.

use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

use crate::model::{Difficulty, ModelCategory, ThinkingModel};

/// The built-in 30-entry catalog.
static BUILTIN_CATALOG: &str = include_str!("../data/thinking_models.json");

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("catalog is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),

    #[error("duplicate model id in catalog: {0}")]
    DuplicateId(String),
}

// ── Catalog ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ModelCatalog {
    models: Vec<ThinkingModel>,
}

impl ModelCatalog {
    /// Build a catalog from records, rejecting duplicate ids.
    pub fn new(models: Vec<ThinkingModel>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        for m in &models {
            if !seen.insert(m.id.as_str()) {
                return Err(CatalogError::DuplicateId(m.id.clone()));
            }
        }
        Ok(Self { models })
    }

    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json(BUILTIN_CATALOG)
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let models: Vec<ThinkingModel> = serde_json::from_str(json)?;
        Self::new(models)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path)?;
        let catalog = Self::from_json(&content)?;
        tracing::info!("Loaded {} thinking models from {:?}", catalog.len(), path);
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// All models in catalog order.
    pub fn models(&self) -> &[ThinkingModel] {
        &self.models
    }

    pub fn iter(&self) -> impl Iterator<Item = &ThinkingModel> {
        self.models.iter()
    }

    // ── Lookup ──

    pub fn find_by_id(&self, id: &str) -> Option<&ThinkingModel> {
        self.models.iter().find(|m| m.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.find_by_id(id).is_some()
    }

    /// Model name for display, or the raw id when the model is unknown.
    pub fn display_name(&self, id: &str) -> String {
        self.find_by_id(id)
            .map(|m| m.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    pub fn filter_by_category(&self, category: ModelCategory) -> Vec<&ThinkingModel> {
        self.models.iter().filter(|m| m.category == category).collect()
    }

    pub fn filter_by_difficulty(&self, difficulty: Difficulty) -> Vec<&ThinkingModel> {
        self.models.iter().filter(|m| m.difficulty == difficulty).collect()
    }

    /// Distinct categories in order of first appearance.
    pub fn categories(&self) -> Vec<ModelCategory> {
        let mut out = Vec::new();
        for m in &self.models {
            if !out.contains(&m.category) {
                out.push(m.category);
            }
        }
        out
    }

    pub fn search(&self, query: &str) -> Vec<&ThinkingModel> {
        self.models.iter().filter(|m| m.matches(query)).collect()
    }

    /// The `n` most-used models not in `excluding`, highest usage first.
    /// Ties keep catalog order (stable sort).
    pub fn top_by_usage_frequency<S: AsRef<str>>(
        &self,
        n: usize,
        excluding: &[S],
    ) -> Vec<&ThinkingModel> {
        let mut candidates: Vec<_> = self
            .models
            .iter()
            .filter(|m| !excluding.iter().any(|e| e.as_ref() == m.id))
            .collect();
        candidates.sort_by(|a, b| b.usage_frequency.cmp(&a.usage_frequency));
        candidates.truncate(n);
        candidates
    }

    /// Resolve ids to records, silently skipping unknown ids.
    pub fn resolve<S: AsRef<str>>(&self, ids: &[S]) -> Vec<ThinkingModel> {
        ids.iter()
            .filter_map(|id| self.find_by_id(id.as_ref()).cloned())
            .collect()
    }
}

/// Small fixture catalogs for tests in this and dependent crates.
#[cfg(any(test, feature = "test-util"))]
pub mod fixtures {
    use super::*;

    /// One model per `(id, category, usage_frequency)` entry. Prompts
    /// render as `Analyze with {id}: {question}`.
    pub fn catalog(entries: &[(&str, ModelCategory, u8)]) -> ModelCatalog {
        let models = entries
            .iter()
            .map(|(id, category, freq)| ThinkingModel {
                id: id.to_string(),
                name: format!("Model {}", id),
                name_en: None,
                category: *category,
                description: format!("Description of {}", id),
                detailed_description: String::new(),
                applicable_scenarios: vec!["planning".into()],
                keywords: vec![],
                tags: vec![],
                difficulty: Difficulty::Medium,
                usage_frequency: *freq,
                related_models: vec![],
                prompt_template: format!("Analyze with {}: {{question}}", id),
                example_questions: vec![],
            })
            .collect();
        ModelCatalog { models }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::catalog as fixture;
    use super::*;

    #[test]
    fn test_builtin_catalog_loads() {
        let catalog = ModelCatalog::builtin().unwrap();
        assert_eq!(catalog.len(), 30);
        assert_eq!(catalog.categories().len(), 10);
        for m in catalog.iter() {
            assert!(m.prompt_template.contains("{question}"), "{} lacks placeholder", m.id);
            assert!((1..=10).contains(&m.usage_frequency));
            assert!(m.id.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
        }
    }

    #[test]
    fn test_find_by_id_is_idempotent() {
        let catalog = ModelCatalog::builtin().unwrap();
        let a = catalog.find_by_id("eisenhower-matrix").cloned();
        let b = catalog.find_by_id("eisenhower-matrix").cloned();
        assert!(a.is_some());
        assert_eq!(a, b);
        assert!(catalog.find_by_id("no-such-model").is_none());
    }

    #[test]
    fn test_display_name_falls_back_to_id() {
        let catalog = fixture(&[("alpha", ModelCategory::RiskManagement, 5)]);
        assert_eq!(catalog.display_name("alpha"), "Model alpha");
        assert_eq!(catalog.display_name("ghost"), "ghost");
    }

    #[test]
    fn test_top_by_usage_frequency_orders_and_breaks_ties_by_catalog_order() {
        let catalog = fixture(&[
            ("a", ModelCategory::RiskManagement, 5),
            ("b", ModelCategory::RiskManagement, 9),
            ("c", ModelCategory::RiskManagement, 7),
            ("d", ModelCategory::RiskManagement, 9),
        ]);
        let ids: Vec<_> = catalog
            .top_by_usage_frequency::<&str>(3, &[])
            .iter()
            .map(|m| m.id.as_str())
            .collect();
        assert_eq!(ids, vec!["b", "d", "c"]);

        let ids: Vec<_> = catalog
            .top_by_usage_frequency(10, &["b"])
            .iter()
            .map(|m| m.id.as_str())
            .collect();
        assert_eq!(ids, vec!["d", "c", "a"]);
    }

    #[test]
    fn test_filter_by_category_keeps_catalog_order() {
        let catalog = ModelCatalog::builtin().unwrap();
        let risk = catalog.filter_by_category(ModelCategory::RiskManagement);
        let ids: Vec<_> = risk.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["black-swan-thinking", "mean-reversion", "murphys-law"]);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let json = r#"[
            {"id":"x","name":"X","category":"cognitive-bias","description":"d","difficulty":"easy","usageFrequency":1,"promptTemplate":"{question}"},
            {"id":"x","name":"X2","category":"cognitive-bias","description":"d","difficulty":"easy","usageFrequency":1,"promptTemplate":"{question}"}
        ]"#;
        assert!(matches!(ModelCatalog::from_json(json), Err(CatalogError::DuplicateId(id)) if id == "x"));
    }

    #[test]
    fn test_search_matches_keywords() {
        let catalog = ModelCatalog::builtin().unwrap();
        let hits = catalog.search("优先级");
        assert!(hits.iter().any(|m| m.id == "eisenhower-matrix"));
        assert_eq!(catalog.search("").len(), catalog.len());
    }

    #[test]
    fn test_resolve_skips_unknown_ids() {
        let catalog = fixture(&[("a", ModelCategory::RiskManagement, 5)]);
        let models = catalog.resolve(&["ghost", "a"]);
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].id, "a");
    }
}
