use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{LocalStorage, KEY_USAGE_DATA};

/// Trial usage counter. Advisory only: it lives on the client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub last_used: Option<DateTime<Utc>>,
}

impl LocalStorage {
    pub fn usage(&self) -> UsageRecord {
        self.read(KEY_USAGE_DATA).unwrap_or_default()
    }

    /// Bump the counter and stamp `lastUsed`; returns the new count.
    pub fn increment_usage(&self) -> u32 {
        self.modify(KEY_USAGE_DATA, |current: Option<UsageRecord>| {
            let count = current.unwrap_or_default().count.saturating_add(1);
            let next = UsageRecord {
                count,
                last_used: Some(Utc::now()),
            };
            (next, count)
        })
    }

    pub fn can_use(&self, limit: u32) -> bool {
        self.usage().count < limit
    }

    pub fn reset_usage(&self) {
        let _guard = super::lock(&self.write_lock);
        self.write(KEY_USAGE_DATA, &UsageRecord::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_increment_and_limit() {
        let storage = LocalStorage::in_memory();
        assert!(storage.can_use(3));
        assert_eq!(storage.increment_usage(), 1);
        assert_eq!(storage.increment_usage(), 2);
        assert_eq!(storage.increment_usage(), 3);
        assert!(!storage.can_use(3));
        assert!(storage.usage().last_used.is_some());
    }

    #[test]
    fn test_reset() {
        let storage = LocalStorage::in_memory();
        storage.increment_usage();
        storage.reset_usage();
        assert_eq!(storage.usage(), UsageRecord::default());
        assert!(storage.can_use(1));
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let storage = Arc::new(LocalStorage::in_memory());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let storage = storage.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        storage.increment_usage();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(storage.usage().count, 200);
    }
}
