//! Driver that ties the flow state machine to storage, the recommender
//! and the analyzer.

use chrono::{DateTime, Local, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use common::storage::{NewHistoryItem, PreferencesUpdate};
use common::{AnalysisResult, AppConfig, LocalStorage, ModelCatalog};

use crate::analysis::{AnalysisBoard, Analyzer, BatchOutcome};
use crate::flow::{FlowError, FlowState, Step};
use crate::llm::CompletionProvider;
use crate::recommend::{Recommendation, RecommendError, Recommender};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("trial limit of {limit} analyses reached")]
    TrialLimitReached { limit: u32 },

    #[error(transparent)]
    Flow(#[from] FlowError),

    #[error(transparent)]
    Recommend(#[from] RecommendError),
}

pub struct InsightApp {
    storage: Arc<LocalStorage>,
    catalog: Arc<ModelCatalog>,
    recommender: Recommender,
    analyzer: Analyzer,
    board: Arc<AnalysisBoard>,
    trial_limit: u32,
    state: FlowState,
    last_recommendation: Option<Recommendation>,
}

impl InsightApp {
    pub fn new(
        config: &AppConfig,
        catalog: Arc<ModelCatalog>,
        provider: Arc<dyn CompletionProvider>,
        storage: Arc<LocalStorage>,
    ) -> Self {
        let trial_limit = config.trial_limit();
        Self {
            recommender: Recommender::new(catalog.clone(), provider.clone())
                .with_count(config.recommendation_count()),
            analyzer: Analyzer::new(catalog.clone(), provider),
            catalog,
            storage,
            board: Arc::new(AnalysisBoard::new()),
            trial_limit,
            state: FlowState::new(trial_limit as usize),
            last_recommendation: None,
        }
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn board(&self) -> &Arc<AnalysisBoard> {
        &self.board
    }

    pub fn last_recommendation(&self) -> Option<&Recommendation> {
        self.last_recommendation.as_ref()
    }

    pub fn remaining_uses(&self) -> u32 {
        self.trial_limit.saturating_sub(self.storage.usage().count)
    }

    fn ensure_quota(&self) -> Result<(), AppError> {
        if !self.storage.can_use(self.trial_limit) {
            info!(limit = self.trial_limit, "Trial limit reached");
            return Err(AppError::TrialLimitReached {
                limit: self.trial_limit,
            });
        }
        Ok(())
    }

    fn autosave(&self) {
        if self.state.step == Step::Hero {
            return;
        }
        self.storage.set_session(&self.state.to_session());
        debug!(step = ?self.state.step, "Session saved");
    }

    /// Submit a new question: abandon any running batch, check the trial
    /// limit, then fetch recommendations.
    pub async fn submit(&mut self, question: &str) -> Result<&FlowState, AppError> {
        self.board.reset();
        self.state = self.state.restart();
        common::validation::validate_question(question).map_err(FlowError::from)?;
        self.ensure_quota()?;

        let recommendation = self.recommender.recommend(question).await?;
        self.state = self.state.submit_question(question, recommendation.models.clone())?;
        self.last_recommendation = Some(recommendation);
        self.autosave();
        Ok(&self.state)
    }

    pub fn toggle(&mut self, model_id: &str) -> Result<&FlowState, AppError> {
        self.state = self.state.toggle_model(model_id)?;
        self.autosave();
        Ok(&self.state)
    }

    /// Run the analysis batch for the current selection. Usage is counted
    /// once here, before any provider call.
    pub async fn start_analysis(&mut self) -> Result<BatchOutcome, AppError> {
        self.ensure_quota()?;
        let analyzing = self.state.start_analysis()?;
        let count = self.storage.increment_usage();
        info!(usage = count, limit = self.trial_limit, "Usage incremented");
        self.state = analyzing;
        self.autosave();

        let outcome = self
            .analyzer
            .run_batch(&self.board, &self.state.question, &self.state.selected)
            .await;
        self.state = self.state.apply_outcome(&outcome)?;

        if !outcome.stale && outcome.has_results() {
            let saved = self.storage.add_history(NewHistoryItem {
                question: self.state.question.clone(),
                selected_models: self.state.selected.clone(),
                results: outcome.results.clone(),
            });
            self.storage.update_preferences(PreferencesUpdate {
                last_used_models: Some(self.state.selected.clone()),
                ..Default::default()
            });
            info!(id = %saved.id, "Analysis saved to history");
        }
        self.autosave();
        Ok(outcome)
    }

    pub fn restart(&mut self) {
        self.board.reset();
        self.state = self.state.restart();
        self.last_recommendation = None;
        self.storage.clear_session();
    }

    /// Resume a saved session younger than its lifetime.
    pub fn restore(&mut self) -> bool {
        match self.storage.restorable_session() {
            Some(session) => {
                self.state = FlowState::restore(&session, self.trial_limit as usize);
                info!(step = ?self.state.step, "Restored previous session");
                true
            }
            None => false,
        }
    }

    /// Markdown report of the current results.
    pub fn report(&self) -> Option<String> {
        if self.state.results.is_empty() {
            return None;
        }
        Some(render_report(
            &self.state.question,
            &self.state.selected,
            &self.state.results,
            &self.catalog,
            Utc::now(),
        ))
    }
}

/// Markdown report. Results follow `order`; results whose id is not in
/// `order` come last.
pub fn render_report(
    question: &str,
    order: &[String],
    results: &BTreeMap<String, AnalysisResult>,
    catalog: &ModelCatalog,
    generated_at: DateTime<Utc>,
) -> String {
    let mut ids: Vec<&str> = order
        .iter()
        .map(String::as_str)
        .filter(|id| results.contains_key(*id))
        .collect();
    for id in results.keys() {
        if !ids.contains(&id.as_str()) {
            ids.push(id.as_str());
        }
    }

    let mut out = format!("# InsightBlast Analysis Report\n\n## Question\n{}\n\n## Results\n\n", question);
    for id in ids {
        let result = &results[id];
        out.push_str(&format!(
            "### {}\n{}\n\n*{} characters, about {} min read*\n\n---\n",
            catalog.display_name(id),
            result.content,
            result.word_count,
            result.reading_time
        ));
    }
    out.push_str(&format!(
        "\nGenerated: {}\n",
        generated_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
    ));
    out
}

/// `InsightBlast-report-YYYY-MM-DD.md`
pub fn report_filename(date: DateTime<Utc>) -> String {
    format!("InsightBlast-report-{}.md", date.format("%Y-%m-%d"))
}
