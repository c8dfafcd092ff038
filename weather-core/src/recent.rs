//! Recently searched places, most recent first.

use std::sync::Arc;

use tracing::debug;

use crate::{
    error::StoreError,
    store::{JsonSlot, KeyValueStore, StoreKey},
};

pub const MAX_RECENT: usize = 5;

#[derive(Debug, Clone)]
pub struct RecentSearches {
    slot: JsonSlot<Vec<String>>,
}

impl RecentSearches {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            slot: JsonSlot::new(store, StoreKey::RecentSearches),
        }
    }

    /// Persisted list; empty when nothing (or nothing readable) is stored.
    pub fn load(&self) -> Vec<String> {
        self.slot.load().unwrap_or_default()
    }

    /// Move `city` to the front and persist. Returns the updated list.
    pub fn record(&self, city: &str) -> Result<Vec<String>, StoreError> {
        let updated = push_front_unique(self.load(), city, MAX_RECENT);
        self.slot.save(&updated)?;
        debug!(city, len = updated.len(), "Recorded recent search");
        Ok(updated)
    }
}

fn push_front_unique(list: Vec<String>, city: &str, cap: usize) -> Vec<String> {
    std::iter::once(city.to_string())
        .chain(list.into_iter().filter(|c| c != city))
        .take(cap)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn recent() -> (Arc<MemoryStore>, RecentSearches) {
        let store = Arc::new(MemoryStore::new());
        let recent = RecentSearches::new(store.clone());
        (store, recent)
    }

    #[test]
    fn starts_empty() {
        let (_, recent) = recent();
        assert!(recent.load().is_empty());
    }

    #[test]
    fn re_search_moves_to_front() {
        let (_, recent) = recent();
        recent.record("Paris").unwrap();
        recent.record("Lyon").unwrap();
        let list = recent.record("Paris").unwrap();

        assert_eq!(list, ["Paris", "Lyon"]);
        assert_eq!(recent.load(), ["Paris", "Lyon"]);
    }

    #[test]
    fn re_search_keeps_length() {
        let (_, recent) = recent();
        for city in ["A", "B", "C"] {
            recent.record(city).unwrap();
        }
        let list = recent.record("B").unwrap();
        assert_eq!(list, ["B", "C", "A"]);
    }

    #[test]
    fn capped_at_five_without_duplicates() {
        let (_, recent) = recent();
        let cities = ["A", "B", "C", "A", "D", "E", "F", "B", "G", "G", "H"];

        for city in cities {
            let list = recent.record(city).unwrap();
            assert!(list.len() <= MAX_RECENT);

            let mut deduped = list.clone();
            deduped.sort();
            deduped.dedup();
            assert_eq!(deduped.len(), list.len(), "duplicates in {list:?}");
            assert_eq!(list[0], city);
        }

        assert_eq!(recent.load(), ["H", "G", "B", "F", "E"]);
    }

    #[test]
    fn match_is_case_sensitive() {
        let (_, recent) = recent();
        recent.record("paris").unwrap();
        let list = recent.record("Paris").unwrap();
        assert_eq!(list, ["Paris", "paris"]);
    }

    #[test]
    fn malformed_storage_loads_empty() {
        let (store, recent) = recent();
        store.set(StoreKey::RecentSearches, "[\"Paris\",").unwrap();

        assert!(recent.load().is_empty());

        // Recording over corrupt data starts a fresh list.
        assert_eq!(recent.record("Lyon").unwrap(), ["Lyon"]);
    }
}
