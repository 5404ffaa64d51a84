use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use chrono::Utc;

use crate::gateway::{Constraint, Record};

/// Fixed time-to-live for every entry.
pub const CACHE_TTL_MS: i64 = 30_000;

/// Key for a collection query. Two logically identical queries (same
/// collection, same constraints in the same order) always map to the same
/// key.
pub fn collection_key(collection: &str, constraints: &[Constraint]) -> String {
    let serialized = serde_json::to_string(constraints).unwrap_or_default();
    format!("{collection}:{serialized}")
}

/// Key for a single-document lookup.
pub fn document_key(collection: &str, id: &str) -> String {
    format!("{collection}:doc:{id}")
}

#[derive(Debug, Clone)]
struct CacheEntry {
    records: Vec<Record>,
    captured_at: i64,
}

/// Time-boxed in-memory query cache. A cloneable handle over shared state:
/// all mutation happens on the single UI thread, so no locking. The handle
/// is passed around explicitly (app context), never held in a global.
#[derive(Clone, Default)]
pub struct QueryCache {
    entries: Rc<RefCell<HashMap<String, CacheEntry>>>,
}

impl QueryCache {
    pub fn get(&self, key: &str) -> Option<Vec<Record>> {
        self.get_at(key, Utc::now().timestamp_millis())
    }

    pub fn put(&self, key: &str, records: Vec<Record>) {
        self.put_at(key, records, Utc::now().timestamp_millis());
    }

    fn get_at(&self, key: &str, now_ms: i64) -> Option<Vec<Record>> {
        let entries = self.entries.borrow();
        entries
            .get(key)
            .filter(|entry| now_ms - entry.captured_at < CACHE_TTL_MS)
            .map(|entry| entry.records.clone())
    }

    fn put_at(&self, key: &str, records: Vec<Record>, now_ms: i64) {
        self.entries.borrow_mut().insert(
            key.to_owned(),
            CacheEntry {
                records,
                captured_at: now_ms,
            },
        );
    }

    /// Drops every entry derived from `collection`, query keys and
    /// document keys alike. Must run after any write against that
    /// collection so later reads observe the mutation.
    pub fn invalidate_collection(&self, collection: &str) {
        let prefix = format!("{collection}:");
        self.entries
            .borrow_mut()
            .retain(|key, _| !key.starts_with(&prefix));
    }

    /// Manual escape hatch.
    #[allow(unused)]
    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.entries, &other.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{filter, limit, order_by, Direction, FilterOp};

    fn record(id: &str) -> Record {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "created": 0,
            "updated": 0,
            "fields": {}
        }))
        .unwrap()
    }

    #[test]
    fn key_is_deterministic_for_structurally_equal_queries() {
        let a = vec![
            filter("device", FilterOp::Eq, "d1"),
            order_by("ts", Direction::Desc),
            limit(1000),
        ];
        let b = vec![
            filter("device", FilterOp::Eq, "d1"),
            order_by("ts", Direction::Desc),
            limit(1000),
        ];
        assert_eq!(collection_key("readings", &a), collection_key("readings", &b));
        assert_ne!(collection_key("readings", &a), collection_key("devices", &a));
    }

    #[test]
    fn ttl_boundary() {
        let cache = QueryCache::default();
        let t0 = 1_700_000_000_000;
        cache.put_at("k", vec![record("r1")], t0);
        assert!(cache.get_at("k", t0 + 29_900).is_some());
        assert!(cache.get_at("k", t0 + 30_100).is_none());
    }

    #[test]
    fn put_overwrites_and_restamps() {
        let cache = QueryCache::default();
        let t0 = 1_700_000_000_000;
        cache.put_at("k", vec![record("old")], t0);
        cache.put_at("k", vec![record("new")], t0 + 25_000);
        let hit = cache.get_at("k", t0 + 40_000).unwrap();
        assert_eq!(hit[0].id, "new");
    }

    #[test]
    fn invalidation_is_scoped_to_the_collection() {
        let cache = QueryCache::default();
        let constraints = vec![limit(1)];
        cache.put(&collection_key("readings", &constraints), vec![record("r")]);
        cache.put(&document_key("readings", "r1"), vec![record("r")]);
        cache.put(&collection_key("devices", &constraints), vec![record("d")]);

        cache.invalidate_collection("readings");

        assert!(cache.get(&collection_key("readings", &constraints)).is_none());
        assert!(cache.get(&document_key("readings", "r1")).is_none());
        assert!(cache.get(&collection_key("devices", &constraints)).is_some());
    }

    #[test]
    fn invalidation_does_not_match_on_name_prefix_alone() {
        let cache = QueryCache::default();
        cache.put(&document_key("devices", "d1"), vec![record("d")]);
        // "dev" is a prefix of "devices" as a string but a different
        // collection
        cache.invalidate_collection("dev");
        assert!(cache.get(&document_key("devices", "d1")).is_some());
    }

    #[test]
    fn clear_drops_everything() {
        let cache = QueryCache::default();
        cache.put("a:x", vec![record("1")]);
        cache.put("b:y", vec![record("2")]);
        cache.clear();
        assert!(cache.get("a:x").is_none());
        assert!(cache.get("b:y").is_none());
    }
}
