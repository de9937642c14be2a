use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{LocalStorage, KEY_ANALYSIS_HISTORY};
use crate::model::AnalysisResult;

/// Maximum number of history entries kept; the oldest is evicted.
pub const HISTORY_CAPACITY: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisHistoryItem {
    pub id: String,
    pub question: String,
    pub selected_models: Vec<String>,
    #[serde(default)]
    pub results: BTreeMap<String, AnalysisResult>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_favorite: bool,
}

/// A history entry before an id and timestamp are assigned.
#[derive(Debug, Clone)]
pub struct NewHistoryItem {
    pub question: String,
    pub selected_models: Vec<String>,
    pub results: BTreeMap<String, AnalysisResult>,
}

/// Millisecond timestamp followed by nine random hex characters.
fn new_history_id(now: DateTime<Utc>) -> String {
    let suffix: String = uuid::Uuid::new_v4().simple().to_string().chars().take(9).collect();
    format!("{}{}", now.timestamp_millis(), suffix)
}

impl LocalStorage {
    /// History, newest first.
    pub fn history(&self) -> Vec<AnalysisHistoryItem> {
        self.read(KEY_ANALYSIS_HISTORY).unwrap_or_default()
    }

    pub fn find_history(&self, id: &str) -> Option<AnalysisHistoryItem> {
        self.history().into_iter().find(|item| item.id == id)
    }

    /// Prepend a new entry, keeping at most `HISTORY_CAPACITY`.
    pub fn add_history(&self, item: NewHistoryItem) -> AnalysisHistoryItem {
        let now = Utc::now();
        let entry = AnalysisHistoryItem {
            id: new_history_id(now),
            question: item.question,
            selected_models: item.selected_models,
            results: item.results,
            created_at: now,
            is_favorite: false,
        };
        self.modify(KEY_ANALYSIS_HISTORY, |current: Option<Vec<AnalysisHistoryItem>>| {
            let mut history = Vec::with_capacity(HISTORY_CAPACITY);
            history.push(entry.clone());
            history.extend(current.unwrap_or_default().into_iter().take(HISTORY_CAPACITY - 1));
            (history, ())
        });
        tracing::debug!(id = %entry.id, "Saved analysis to history");
        entry
    }

    /// Returns whether an entry was removed.
    pub fn remove_history(&self, id: &str) -> bool {
        self.modify(KEY_ANALYSIS_HISTORY, |current: Option<Vec<AnalysisHistoryItem>>| {
            let mut history = current.unwrap_or_default();
            let before = history.len();
            history.retain(|item| item.id != id);
            let removed = history.len() != before;
            (history, removed)
        })
    }

    /// Flip the favorite flag; returns the new value, or `None` for an
    /// unknown id.
    pub fn toggle_favorite(&self, id: &str) -> Option<bool> {
        self.modify(KEY_ANALYSIS_HISTORY, |current: Option<Vec<AnalysisHistoryItem>>| {
            let mut history = current.unwrap_or_default();
            let flipped = history.iter_mut().find(|item| item.id == id).map(|item| {
                item.is_favorite = !item.is_favorite;
                item.is_favorite
            });
            (history, flipped)
        })
    }

    pub fn clear_history(&self) {
        let _guard = super::lock(&self.write_lock);
        self.raw_remove(KEY_ANALYSIS_HISTORY);
    }
}
