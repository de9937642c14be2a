use serde::{Deserialize, Serialize};

use super::{LocalStorage, KEY_USER_PREFERENCES};
use crate::config::DEFAULT_RECOMMENDATION_COUNT;
use crate::model::Difficulty;

pub const DEFAULT_LANGUAGE: &str = "zh-CN";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    Auto,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    #[serde(default)]
    pub preferred_models: Vec<String>,
    /// Always 6; stored values are ignored
    #[serde(default = "default_max_suggestions")]
    pub max_suggestions: usize,
    #[serde(default)]
    pub last_used_models: Vec<String>,
    #[serde(default)]
    pub favorite_models: Vec<String>,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub theme: Theme,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_difficulty: Option<Difficulty>,
}

fn default_max_suggestions() -> usize {
    DEFAULT_RECOMMENDATION_COUNT
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            preferred_models: Vec::new(),
            max_suggestions: DEFAULT_RECOMMENDATION_COUNT,
            last_used_models: Vec::new(),
            favorite_models: Vec::new(),
            language: default_language(),
            theme: Theme::Auto,
            default_difficulty: None,
        }
    }
}

/// Partial update; `None` fields keep the stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesUpdate {
    pub preferred_models: Option<Vec<String>>,
    pub last_used_models: Option<Vec<String>>,
    pub favorite_models: Option<Vec<String>>,
    pub language: Option<String>,
    pub theme: Option<Theme>,
    pub default_difficulty: Option<Difficulty>,
}

impl UserPreferences {
    fn merge(mut self, update: PreferencesUpdate) -> Self {
        if let Some(v) = update.preferred_models {
            self.preferred_models = v;
        }
        if let Some(v) = update.last_used_models {
            self.last_used_models = v;
        }
        if let Some(v) = update.favorite_models {
            self.favorite_models = v;
        }
        if let Some(v) = update.language {
            self.language = v;
        }
        if let Some(v) = update.theme {
            self.theme = v;
        }
        if update.default_difficulty.is_some() {
            self.default_difficulty = update.default_difficulty;
        }
        self.max_suggestions = DEFAULT_RECOMMENDATION_COUNT;
        self
    }
}

impl LocalStorage {
    /// Stored preferences, or defaults when nothing is stored.
    pub fn preferences(&self) -> UserPreferences {
        let mut prefs: UserPreferences = self.read(KEY_USER_PREFERENCES).unwrap_or_default();
        prefs.max_suggestions = DEFAULT_RECOMMENDATION_COUNT;
        prefs
    }

    pub fn update_preferences(&self, update: PreferencesUpdate) -> UserPreferences {
        self.modify(KEY_USER_PREFERENCES, |current: Option<UserPreferences>| {
            let merged = current.unwrap_or_default().merge(update);
            (merged.clone(), merged)
        })
    }

    pub fn clear_preferences(&self) {
        let _guard = super::lock(&self.write_lock);
        self.raw_remove(KEY_USER_PREFERENCES);
    }
}
