//! Keyed in-flight registry.
//!
//! At most one report run holds a given `channel:date` key. The key is
//! released when the guard drops, so every exit path (error, timeout, panic
//! unwinding, cancelled future) frees it.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// Set of keys currently held by running reports.
#[derive(Debug, Clone, Default)]
pub struct InFlightRegistry {
    keys: Arc<Mutex<HashSet<String>>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key`, or `None` when another run holds it.
    pub fn try_acquire(&self, key: &str) -> Option<InFlightGuard> {
        if !self.lock().insert(key.to_string()) {
            return None;
        }
        Some(InFlightGuard {
            registry: self.clone(),
            key: key.to_string(),
        })
    }

    pub fn is_held(&self, key: &str) -> bool {
        self.lock().contains(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A poisoned set is still a valid set of strings.
    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        self.keys.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Holds a key until dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    registry: InFlightRegistry,
    key: String,
}

impl InFlightGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.key);
        tracing::trace!(key = %self.key, "Released in-flight key");
    }
}

/// Key for one channel's report on one date.
pub fn run_key(channel_id: &str, report_date: chrono::NaiveDate) -> String {
    format!("{}:{}", channel_id, report_date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_second_acquire_rejected_until_drop() {
        let registry = InFlightRegistry::new();
        let guard = registry.try_acquire("C1:2025-11-20").unwrap();
        assert!(registry.try_acquire("C1:2025-11-20").is_none());
        assert!(registry.try_acquire("C2:2025-11-20").is_some());

        drop(guard);
        assert!(!registry.is_held("C1:2025-11-20"));
        assert!(registry.try_acquire("C1:2025-11-20").is_some());
    }

    #[test]
    fn test_clones_share_keys() {
        let registry = InFlightRegistry::new();
        let other = registry.clone();
        let _guard = registry.try_acquire("k").unwrap();
        assert!(other.is_held("k"));
        assert_eq!(other.len(), 1);
    }

    #[test]
    fn test_run_key_format() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 5).unwrap();
        assert_eq!(run_key("C1", date), "C1:2025-01-05");
    }
}
