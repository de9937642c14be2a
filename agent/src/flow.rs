//! View-state machine for the question -> selection -> results flow.
//!
//! `FlowState` is an immutable snapshot; every transition returns a new
//! one or an error explaining why the transition is not allowed.

use chrono::Utc;
use std::collections::BTreeMap;
use thiserror::Error;

use common::storage::SessionData;
use common::validation::validate_question;
use common::{AnalysisResult, ThinkingModel, ValidationError};

use crate::analysis::BatchOutcome;
use crate::classify::ClassifiedError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Hero,
    Recommendation,
    Analysis,
    Results,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("at most {0} models can be selected")]
    SelectionLimit(usize),

    #[error("select at least one model first")]
    NothingSelected,

    #[error("model {0} was not suggested for this question")]
    NotSuggested(String),

    #[error("cannot {action} from the {step:?} step")]
    WrongStep { action: &'static str, step: Step },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlowState {
    pub step: Step,
    pub question: String,
    pub suggested: Vec<ThinkingModel>,
    /// Selection order is preserved
    pub selected: Vec<String>,
    pub results: BTreeMap<String, AnalysisResult>,
    pub errors: BTreeMap<String, ClassifiedError>,
    pub max_selection: usize,
}

impl FlowState {
    pub fn new(max_selection: usize) -> Self {
        Self {
            step: Step::Hero,
            question: String::new(),
            suggested: Vec::new(),
            selected: Vec::new(),
            results: BTreeMap::new(),
            errors: BTreeMap::new(),
            max_selection,
        }
    }

    fn require(&self, step: Step, action: &'static str) -> Result<(), FlowError> {
        if self.step != step {
            return Err(FlowError::WrongStep { action, step: self.step });
        }
        Ok(())
    }

    /// Start over with a new question. Allowed from any step.
    pub fn submit_question(&self, question: &str, suggested: Vec<ThinkingModel>) -> Result<Self, FlowError> {
        validate_question(question)?;
        Ok(Self {
            step: Step::Recommendation,
            question: question.to_string(),
            suggested,
            ..Self::new(self.max_selection)
        })
    }

    /// Select or deselect a suggested model.
    pub fn toggle_model(&self, id: &str) -> Result<Self, FlowError> {
        self.require(Step::Recommendation, "change the selection")?;
        let mut next = self.clone();
        if let Some(pos) = next.selected.iter().position(|s| s == id) {
            next.selected.remove(pos);
            return Ok(next);
        }
        if !self.suggested.iter().any(|m| m.id == id) {
            return Err(FlowError::NotSuggested(id.to_string()));
        }
        if next.selected.len() >= self.max_selection {
            return Err(FlowError::SelectionLimit(self.max_selection));
        }
        next.selected.push(id.to_string());
        Ok(next)
    }

    pub fn start_analysis(&self) -> Result<Self, FlowError> {
        self.require(Step::Recommendation, "start the analysis")?;
        if self.selected.is_empty() {
            return Err(FlowError::NothingSelected);
        }
        Ok(Self {
            step: Step::Analysis,
            results: BTreeMap::new(),
            errors: BTreeMap::new(),
            ..self.clone()
        })
    }

    /// Move to results. Stale outcomes leave the state untouched.
    pub fn apply_outcome(&self, outcome: &BatchOutcome) -> Result<Self, FlowError> {
        self.require(Step::Analysis, "apply analysis results")?;
        if outcome.stale {
            return Ok(self.clone());
        }
        Ok(Self {
            step: Step::Results,
            results: outcome.results.clone(),
            errors: outcome.errors.clone(),
            ..self.clone()
        })
    }

    pub fn restart(&self) -> Self {
        Self::new(self.max_selection)
    }

    /// Rebuild the flow from a saved session: results if any were saved,
    /// else the selection step if suggestions were saved, else the hero.
    pub fn restore(session: &SessionData, max_selection: usize) -> Self {
        let step = if !session.interpretations.is_empty() {
            Step::Results
        } else if !session.suggested_models.is_empty() {
            Step::Recommendation
        } else {
            Step::Hero
        };
        let mut selected = session.selected_models.clone();
        selected.truncate(max_selection);
        Self {
            step,
            question: session.question.clone(),
            suggested: session.suggested_models.clone(),
            selected,
            results: session.interpretations.clone(),
            errors: BTreeMap::new(),
            max_selection,
        }
    }

    pub fn to_session(&self) -> SessionData {
        SessionData {
            question: self.question.clone(),
            selected_models: self.selected.clone(),
            suggested_models: self.suggested.clone(),
            interpretations: self.results.clone(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::catalog::fixtures::catalog as fixture;
    use common::ModelCategory;

    fn suggestions() -> Vec<ThinkingModel> {
        fixture(&[
            ("a", ModelCategory::DecisionAnalysis, 5),
            ("b", ModelCategory::DecisionAnalysis, 5),
            ("c", ModelCategory::DecisionAnalysis, 5),
            ("d", ModelCategory::DecisionAnalysis, 5),
        ])
        .models()
        .to_vec()
    }

    fn at_recommendation() -> FlowState {
        FlowState::new(3).submit_question("Should I learn Rust?", suggestions()).unwrap()
    }

    #[test]
    fn test_submit_validates_question() {
        let err = FlowState::new(3).submit_question("hi", vec![]).unwrap_err();
        assert!(matches!(err, FlowError::Validation(_)));
        let state = at_recommendation();
        assert_eq!(state.step, Step::Recommendation);
        assert_eq!(state.suggested.len(), 4);
    }

    #[test]
    fn test_selection_is_capped() {
        let state = at_recommendation()
            .toggle_model("a")
            .and_then(|s| s.toggle_model("b"))
            .and_then(|s| s.toggle_model("c"))
            .unwrap();
        assert_eq!(state.toggle_model("d").unwrap_err(), FlowError::SelectionLimit(3));
        // Deselecting is always allowed
        let state = state.toggle_model("b").unwrap();
        assert_eq!(state.selected, vec!["a", "c"]);
        assert!(state.toggle_model("d").is_ok());
    }

    #[test]
    fn test_cannot_select_unsuggested_model() {
        let err = at_recommendation().toggle_model("zzz").unwrap_err();
        assert_eq!(err, FlowError::NotSuggested("zzz".into()));
    }

    #[test]
    fn test_start_requires_selection() {
        assert_eq!(at_recommendation().start_analysis().unwrap_err(), FlowError::NothingSelected);
        let state = at_recommendation().toggle_model("a").unwrap().start_analysis().unwrap();
        assert_eq!(state.step, Step::Analysis);
        assert!(matches!(
            state.toggle_model("b"),
            Err(FlowError::WrongStep { step: Step::Analysis, .. })
        ));
    }

    #[test]
    fn test_apply_outcome_and_stale_outcome() {
        let state = at_recommendation().toggle_model("a").unwrap().start_analysis().unwrap();
        let mut outcome = BatchOutcome {
            requested: vec!["a".into()],
            ..Default::default()
        };
        outcome.results.insert("a".into(), AnalysisResult::new("a", "text"));

        let stale = BatchOutcome {
            stale: true,
            ..outcome.clone()
        };
        assert_eq!(state.apply_outcome(&stale).unwrap(), state);

        let done = state.apply_outcome(&outcome).unwrap();
        assert_eq!(done.step, Step::Results);
        assert_eq!(done.results.len(), 1);
    }

    #[test]
    fn test_session_round_trip() {
        let state = at_recommendation().toggle_model("a").unwrap();
        let restored = FlowState::restore(&state.to_session(), 3);
        assert_eq!(restored.step, Step::Recommendation);
        assert_eq!(restored.selected, vec!["a"]);
        assert_eq!(restored.question, "Should I learn Rust?");

        let restarted = restored.restart();
        assert_eq!(restarted.step, Step::Hero);
        assert!(restarted.question.is_empty());
    }
}
