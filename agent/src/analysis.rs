//! Analysis orchestrator.
//!
//! `Analyzer::run_batch` spawns one task per selected model, issues them
//! together and waits for all of them. Progress is published on an
//! `AnalysisBoard` keyed by batch generation, so results that arrive
//! after the board was reset are dropped.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

use common::validation::validate_model_id;
use common::{AnalysisResult, ModelCatalog, ValidationError};

use crate::classify::{classify, ClassifiedError};
use crate::error::CompletionError;
use crate::llm::{CompletionProvider, CompletionRequest, SyntheticProvider};
use crate::prompts::analysis_prompt;

// ── Progress Board ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "detail", rename_all = "camelCase")]
pub enum ModelProgress {
    Loading,
    Done(AnalysisResult),
    Failed(ClassifiedError),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoardSnapshot {
    pub generation: u64,
    pub progress: BTreeMap<String, ModelProgress>,
}

impl BoardSnapshot {
    pub fn loading(&self) -> Vec<&str> {
        self.progress
            .iter()
            .filter(|(_, p)| matches!(p, ModelProgress::Loading))
            .map(|(id, _)| id.as_str())
            .collect()
    }
}

#[derive(Default)]
struct BoardState {
    generation: u64,
    progress: HashMap<String, ModelProgress>,
}

/// Shared per-model progress for the current batch.
#[derive(Default)]
pub struct AnalysisBoard {
    state: Mutex<BoardState>,
}

impl AnalysisBoard {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start a new batch and return its generation.
    pub fn begin(&self) -> u64 {
        let mut state = self.lock();
        state.generation += 1;
        state.progress.clear();
        state.generation
    }

    /// Abandon the current batch. In-flight results will be ignored.
    pub fn reset(&self) {
        self.begin();
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Publish progress for `id`. Returns `false` when `generation` is no
    /// longer current.
    pub fn record(&self, generation: u64, id: &str, progress: ModelProgress) -> bool {
        let mut state = self.lock();
        if state.generation != generation {
            return false;
        }
        state.progress.insert(id.to_string(), progress);
        true
    }

    pub fn mark_loading(&self, generation: u64, id: &str) -> bool {
        self.record(generation, id, ModelProgress::Loading)
    }

    pub fn progress(&self, id: &str) -> Option<ModelProgress> {
        self.lock().progress.get(id).cloned()
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        let state = self.lock();
        BoardSnapshot {
            generation: state.generation,
            progress: state.progress.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        }
    }
}

// ── Batch Outcome ───────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub generation: u64,
    /// Ids in the order they were requested, deduplicated
    pub requested: Vec<String>,
    pub results: BTreeMap<String, AnalysisResult>,
    pub errors: BTreeMap<String, ClassifiedError>,
    /// The board moved to another batch before this one finished
    pub stale: bool,
}

impl BatchOutcome {
    /// Every requested id has a result or an error.
    pub fn is_complete(&self) -> bool {
        self.requested
            .iter()
            .all(|id| self.results.contains_key(id) || self.errors.contains_key(id))
    }

    pub fn has_results(&self) -> bool {
        !self.results.is_empty()
    }
}

// ── Analyzer ────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Analyzer {
    catalog: Arc<ModelCatalog>,
    provider: Arc<dyn CompletionProvider>,
}

impl Analyzer {
    pub fn new(catalog: Arc<ModelCatalog>, provider: Arc<dyn CompletionProvider>) -> Self {
        Self { catalog, provider }
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub fn provider(&self) -> &Arc<dyn CompletionProvider> {
        &self.provider
    }

    /// One analysis. Unknown ids fail before any provider call.
    pub async fn analyze(&self, question: &str, model_id: &str) -> Result<AnalysisResult, CompletionError> {
        validate_model_id(model_id)?;
        let model = self
            .catalog
            .find_by_id(model_id)
            .ok_or_else(|| ValidationError::UnknownModel(model_id.to_string()))?;

        let request = CompletionRequest::analysis(analysis_prompt(model, question), &model.name, question);
        let content = self.provider.complete(&request).await?;
        Ok(AnalysisResult::new(model_id, content))
    }

    /// Template analysis that needs no provider.
    pub fn synthetic_result(&self, question: &str, model_id: &str) -> AnalysisResult {
        let name = self.catalog.display_name(model_id);
        AnalysisResult::new(model_id, SyntheticProvider::render(&name, question))
    }

    /// Analyze every id concurrently and wait for all of them. Failures
    /// are collected per id; the batch itself never fails.
    pub async fn run_batch(&self, board: &Arc<AnalysisBoard>, question: &str, ids: &[String]) -> BatchOutcome {
        let generation = board.begin();
        let mut requested: Vec<String> = Vec::with_capacity(ids.len());
        for id in ids {
            if !requested.contains(id) {
                requested.push(id.clone());
            }
        }
        info!(generation, models = requested.len(), "Starting analysis batch");

        let mut handles = Vec::with_capacity(requested.len());
        for id in &requested {
            let analyzer = self.clone();
            let board = Arc::clone(board);
            let question = question.to_string();
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                board.mark_loading(generation, &id);
                let outcome = analyzer.analyze(&question, &id).await;
                let progress = match &outcome {
                    Ok(result) => ModelProgress::Done(result.clone()),
                    Err(e) => ModelProgress::Failed(classify(e)),
                };
                board.record(generation, &id, progress);
                outcome
            }));
        }

        let mut outcome = BatchOutcome {
            generation,
            requested: requested.clone(),
            ..Default::default()
        };
        for (id, handle) in requested.into_iter().zip(handles) {
            match handle.await {
                Ok(Ok(result)) => {
                    outcome.results.insert(id, result);
                }
                Ok(Err(e)) => {
                    warn!(model = %id, "Analysis failed: {}", e);
                    outcome.errors.insert(id, classify(&e));
                }
                Err(e) => {
                    let err = CompletionError::Other(format!("analysis task aborted: {}", e));
                    outcome.errors.insert(id, classify(&err));
                }
            }
        }
        outcome.stale = board.generation() != generation;
        info!(
            generation,
            ok = outcome.results.len(),
            failed = outcome.errors.len(),
            stale = outcome.stale,
            "Analysis batch finished"
        );
        outcome
    }
}
