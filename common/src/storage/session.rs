use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{LocalStorage, KEY_SESSION_DATA};
use crate::model::{AnalysisResult, ThinkingModel};

/// A saved session is restorable for this long.
pub const SESSION_TTL_HOURS: i64 = 24;

/// Snapshot of the in-progress flow, autosaved after each change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    pub question: String,
    #[serde(default)]
    pub selected_models: Vec<String>,
    #[serde(default)]
    pub suggested_models: Vec<ThinkingModel>,
    #[serde(default)]
    pub interpretations: BTreeMap<String, AnalysisResult>,
    pub timestamp: DateTime<Utc>,
}

impl SessionData {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now - self.timestamp < Duration::hours(SESSION_TTL_HOURS)
    }
}

impl LocalStorage {
    pub fn session(&self) -> Option<SessionData> {
        self.read(KEY_SESSION_DATA)
    }

    pub fn set_session(&self, data: &SessionData) {
        let _guard = super::lock(&self.write_lock);
        self.write(KEY_SESSION_DATA, data);
    }

    pub fn clear_session(&self) {
        let _guard = super::lock(&self.write_lock);
        self.raw_remove(KEY_SESSION_DATA);
    }

    pub fn session_is_valid(&self) -> bool {
        self.session_is_valid_at(Utc::now())
    }

    pub fn session_is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.session().is_some_and(|s| s.is_valid_at(now))
    }

    /// The stored session if it is still within its lifetime.
    pub fn restorable_session(&self) -> Option<SessionData> {
        let now = Utc::now();
        self.session().filter(|s| s.is_valid_at(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(age: Duration) -> SessionData {
        let mut interpretations = BTreeMap::new();
        interpretations.insert(
            "first-principles".to_string(),
            AnalysisResult::generated_at("first-principles", "break it down", Utc::now() - age),
        );
        SessionData {
            question: "should I start a company?".into(),
            selected_models: vec!["first-principles".into()],
            suggested_models: vec![],
            interpretations,
            timestamp: Utc::now() - age,
        }
    }

    #[test]
    fn test_session_round_trip_restores_dates() {
        let storage = LocalStorage::in_memory();
        let data = snapshot(Duration::hours(1));
        storage.set_session(&data);
        assert!(storage.session_is_valid());
        let restored = storage.restorable_session().unwrap();
        assert_eq!(restored, data);
        assert_eq!(
            restored.interpretations["first-principles"].generated_at,
            data.interpretations["first-principles"].generated_at
        );
    }

    #[test]
    fn test_stale_session_is_invalid() {
        let storage = LocalStorage::in_memory();
        storage.set_session(&snapshot(Duration::hours(25)));
        assert!(!storage.session_is_valid());
        assert!(storage.restorable_session().is_none());
        // Still readable, just not restorable
        assert!(storage.session().is_some());
    }

    #[test]
    fn test_validity_boundary() {
        let data = snapshot(Duration::zero());
        let just_inside = data.timestamp + Duration::hours(24) - Duration::milliseconds(1);
        let boundary = data.timestamp + Duration::hours(24);
        assert!(data.is_valid_at(just_inside));
        assert!(!data.is_valid_at(boundary));
    }

    #[test]
    fn test_clear_session() {
        let storage = LocalStorage::in_memory();
        storage.set_session(&snapshot(Duration::zero()));
        storage.clear_session();
        assert!(storage.session().is_none());
        assert!(!storage.session_is_valid());
    }
}
