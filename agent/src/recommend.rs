//! Recommendation engine.
//!
//! Asks the completion provider for model ids when it is remote, and
//! falls back to keyword themes when it is synthetic or the remote call
//! fails. Either way the result is padded with the most-used models so
//! the caller always gets `min(count, catalog size)` distinct entries.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use common::{ModelCatalog, ThinkingModel};

use crate::llm::{CompletionProvider, CompletionRequest, ProviderMode};
use crate::prompts::{parse_model_ids, recommendation_prompt};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecommendError {
    #[error("the model catalog is empty")]
    EmptyCatalog,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationSource {
    Remote,
    Heuristic,
}

#[derive(Debug, Clone)]
pub struct Recommendation {
    pub models: Vec<ThinkingModel>,
    pub source: RecommendationSource,
}

impl Recommendation {
    pub fn ids(&self) -> Vec<&str> {
        self.models.iter().map(|m| m.id.as_str()).collect()
    }
}

// ── Keyword themes ──────────────────────────────────────────────────

struct Theme {
    triggers: &'static [&'static str],
    models: [&'static str; 3],
}

static THEMES: &[Theme] = &[
    // decision
    Theme {
        triggers: &["选择", "决策", "换工作", "投资", "decide", "decision", "choose", "choice", "invest", "career"],
        models: ["reversible-decisions", "regret-minimization", "40-70-rule"],
    },
    // efficiency
    Theme {
        triggers: &["效率", "时间", "管理", "efficien", "time", "productiv", "manage", "priorit"],
        models: ["eisenhower-matrix", "pareto-principle", "parkinsons-law"],
    },
    // innovation
    Theme {
        triggers: &["创新", "想法", "创业", "innovat", "idea", "startup", "creative"],
        models: ["first-principles", "scamper", "inversion-thinking"],
    },
    // problem solving
    Theme {
        triggers: &["问题", "解决", "怎么办", "problem", "solve", "fix", "issue", "why"],
        models: ["fishbone-diagram", "correlation-causation", "red-team"],
    },
];

static GENERIC_MODELS: [&str; 6] = [
    "reversible-decisions",
    "eisenhower-matrix",
    "first-principles",
    "fishbone-diagram",
    "second-order-thinking",
    "black-swan-thinking",
];

/// ASCII triggers of five or more letters are stems and match the start
/// of a word; shorter ones match a whole word or its plural. Other
/// triggers match anywhere.
fn trigger_matches(trigger: &str, question: &str, words: &[&str]) -> bool {
    if !trigger.is_ascii() {
        return question.contains(trigger);
    }
    words.iter().any(|w| {
        if trigger.len() >= 5 {
            w.starts_with(trigger)
        } else {
            *w == trigger || w.strip_suffix('s') == Some(trigger)
        }
    })
}

/// Theme ids matched by the question, in theme order, or the generic
/// set when nothing matches. Not yet filtered against a catalog.
pub fn heuristic_ids(question: &str) -> Vec<&'static str> {
    let q = question.to_lowercase();
    let words: Vec<&str> = q
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let matched: Vec<&'static str> = THEMES
        .iter()
        .filter(|t| t.triggers.iter().any(|trigger| trigger_matches(trigger, &q, &words)))
        .flat_map(|t| t.models)
        .collect();
    if matched.is_empty() {
        GENERIC_MODELS.to_vec()
    } else {
        matched
    }
}

// ── Recommender ─────────────────────────────────────────────────────

pub struct Recommender {
    catalog: Arc<ModelCatalog>,
    provider: Arc<dyn CompletionProvider>,
    count: usize,
}

impl Recommender {
    pub fn new(catalog: Arc<ModelCatalog>, provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            catalog,
            provider,
            count: common::config::DEFAULT_RECOMMENDATION_COUNT,
        }
    }

    /// Clamped to `1..=6`.
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count.clamp(1, common::config::MAX_RECOMMENDATION_COUNT);
        self
    }

    fn target(&self) -> usize {
        self.count.min(self.catalog.len())
    }

    /// The question is expected to be validated already.
    pub async fn recommend(&self, question: &str) -> Result<Recommendation, RecommendError> {
        if self.catalog.is_empty() {
            return Err(RecommendError::EmptyCatalog);
        }

        if self.provider.mode() == ProviderMode::Remote {
            match self.remote_ids(question).await {
                Ok(ids) => {
                    let models = self.complete_selection(&ids);
                    info!(count = models.len(), "Recommended models from provider");
                    return Ok(Recommendation {
                        models,
                        source: RecommendationSource::Remote,
                    });
                }
                Err(e) => warn!("Remote recommendation failed, using keyword fallback: {}", e),
            }
        }

        let ids = heuristic_ids(question);
        let models = self.complete_selection(&ids);
        info!(count = models.len(), "Recommended models from keyword themes");
        Ok(Recommendation {
            models,
            source: RecommendationSource::Heuristic,
        })
    }

    /// Most-used models only; used when everything else has failed.
    pub fn popular(&self) -> Vec<ThinkingModel> {
        self.complete_selection::<&str>(&[])
    }

    async fn remote_ids(&self, question: &str) -> Result<Vec<String>, crate::error::CompletionError> {
        let prompt = recommendation_prompt(question, &self.catalog, self.count);
        let reply = self.provider.complete(&CompletionRequest::recommendation(prompt)).await?;
        Ok(parse_model_ids(&reply))
    }

    /// Keep known ids in order without duplicates, then pad with the
    /// most-used remaining models up to the target size.
    fn complete_selection<S: AsRef<str>>(&self, ids: &[S]) -> Vec<ThinkingModel> {
        let target = self.target();
        let mut chosen: Vec<ThinkingModel> = Vec::with_capacity(target);
        for id in ids {
            if chosen.len() == target {
                break;
            }
            let id = id.as_ref();
            if chosen.iter().any(|m| m.id == id) {
                continue;
            }
            if let Some(model) = self.catalog.find_by_id(id) {
                chosen.push(model.clone());
            }
        }
        if chosen.len() < target {
            let taken: Vec<&str> = chosen.iter().map(|m| m.id.as_str()).collect();
            let padding: Vec<ThinkingModel> = self
                .catalog
                .top_by_usage_frequency(target - chosen.len(), &taken)
                .into_iter()
                .cloned()
                .collect();
            chosen.extend(padding);
        }
        chosen
    }
}
