//! Time-bounded cache of table column sets.
//!
//! Routing an attribute needs to know whether a key is a real column of the
//! host's table. Introspection is a query against the engine, so results are
//! kept per table for a TTL. A schema change made inside the window is only
//! observed after the entry expires (or after [`SchemaColumnCache::forget`]).
//!
//! The lock is never held across an introspection call: two threads that
//! miss at the same time both query, and the later insert wins. Both results
//! are equally fresh.

use crate::core::error::EavError;
use crate::core::ports::SchemaIntrospector;
use chrono::{DateTime, TimeDelta, Utc};
use mockable::Clock;
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

pub type ColumnSet = Arc<BTreeSet<String>>;

struct CachedColumns {
    columns: ColumnSet,
    expires_at: DateTime<Utc>,
}

pub struct SchemaColumnCache {
    introspector: Arc<dyn SchemaIntrospector>,
    clock: Arc<dyn Clock>,
    ttl: TimeDelta,
    entries: Mutex<FxHashMap<String, CachedColumns>>,
}

impl SchemaColumnCache {
    pub fn new(
        introspector: Arc<dyn SchemaIntrospector>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
    ) -> Self {
        Self {
            introspector,
            clock,
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
            entries: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl.to_std().unwrap_or(Duration::MAX)
    }

    /// Columns of `table`, from cache while the entry is live.
    pub fn columns_of(&self, table: &str) -> Result<ColumnSet, EavError> {
        let key = cache_key(table);
        let now = self.clock.utc();
        if let Some(entry) = self.lock_entries()?.get(&key) {
            if now < entry.expires_at {
                return Ok(Arc::clone(&entry.columns));
            }
        }

        let columns: ColumnSet = Arc::new(
            self.introspector
                .list_columns(table)?
                .into_iter()
                .map(|c| c.name)
                .collect(),
        );
        debug!(table, columns = columns.len(), "schema columns refreshed");

        let expires_at = now.checked_add_signed(self.ttl).unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.lock_entries()?.insert(
            key,
            CachedColumns {
                columns: Arc::clone(&columns),
                expires_at,
            },
        );
        Ok(columns)
    }

    pub fn has_column(&self, table: &str, name: &str) -> Result<bool, EavError> {
        Ok(self.columns_of(table)?.contains(name))
    }

    /// Drops the entry for `table`; the next lookup re-introspects.
    pub fn forget(&self, table: &str) -> Result<(), EavError> {
        self.lock_entries()?.remove(&cache_key(table));
        Ok(())
    }

    pub fn flush(&self) -> Result<(), EavError> {
        self.lock_entries()?.clear();
        Ok(())
    }

    fn lock_entries(&self) -> Result<MutexGuard<'_, FxHashMap<String, CachedColumns>>, EavError> {
        self.entries.lock().map_err(|_| {
            EavError::ValidationError("SchemaColumnCache entries lock poisoned".to_string())
        })
    }
}

/// Entries are namespaced per table.
pub fn cache_key(table: &str) -> String {
    format!("table-columns-{}", table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ports::ColumnInfo;
    use chrono::{Local, TimeZone};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StepClock(Mutex<DateTime<Utc>>);

    impl StepClock {
        fn new() -> Self {
            Self(Mutex::new(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()))
        }

        fn advance_seconds(&self, secs: i64) {
            *self.0.lock().unwrap() += TimeDelta::seconds(secs);
        }
    }

    impl Clock for StepClock {
        fn local(&self) -> DateTime<Local> {
            self.utc().with_timezone(&Local)
        }

        fn utc(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    #[derive(Default)]
    struct CountingIntrospector {
        calls: AtomicUsize,
        columns: Mutex<FxHashMap<String, Vec<String>>>,
        fail: Mutex<bool>,
    }

    impl CountingIntrospector {
        fn with_table(table: &str, columns: &[&str]) -> Self {
            let me = Self::default();
            me.set_table(table, columns);
            me
        }

        fn set_table(&self, table: &str, columns: &[&str]) {
            self.columns.lock().unwrap().insert(
                table.to_string(),
                columns.iter().map(|c| c.to_string()).collect(),
            );
        }
    }

    impl SchemaIntrospector for CountingIntrospector {
        fn list_columns(&self, table: &str) -> Result<Vec<ColumnInfo>, EavError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if *self.fail.lock().unwrap() {
                return Err(EavError::RusqliteError(rusqlite::Error::InvalidQuery));
            }
            let columns = self.columns.lock().unwrap();
            let names = columns
                .get(table)
                .ok_or_else(|| EavError::NotFound(table.to_string()))?;
            Ok(names
                .iter()
                .map(|name| ColumnInfo {
                    name: name.clone(),
                    data_type: "TEXT".to_string(),
                    nullable: true,
                    primary_key: name == "id",
                    default_value: None,
                })
                .collect())
        }
    }

    fn cache_with(
        introspector: Arc<CountingIntrospector>,
        clock: Arc<StepClock>,
    ) -> SchemaColumnCache {
        SchemaColumnCache::new(introspector, clock, Duration::from_secs(60))
    }

    #[test]
    fn test_repeated_lookups_hit_cache() {
        let introspector = Arc::new(CountingIntrospector::with_table("products", &["id", "name"]));
        let cache = cache_with(introspector.clone(), Arc::new(StepClock::new()));

        for _ in 0..5 {
            assert!(cache.has_column("products", "name").unwrap());
            assert!(!cache.has_column("products", "color").unwrap());
        }
        assert_eq!(introspector.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_entries_are_namespaced_per_table() {
        let introspector = Arc::new(CountingIntrospector::with_table("products", &["id", "sku"]));
        introspector.set_table("orders", &["id", "total"]);
        let cache = cache_with(introspector.clone(), Arc::new(StepClock::new()));

        assert!(cache.has_column("products", "sku").unwrap());
        assert!(!cache.has_column("orders", "sku").unwrap());
        assert!(cache.has_column("orders", "total").unwrap());
        assert_eq!(introspector.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache_key("orders"), "table-columns-orders");
    }

    #[test]
    fn test_schema_change_visible_only_after_expiry() {
        let introspector = Arc::new(CountingIntrospector::with_table("products", &["id", "name"]));
        let clock = Arc::new(StepClock::new());
        let cache = cache_with(introspector.clone(), clock.clone());

        assert!(!cache.has_column("products", "price").unwrap());
        clock.advance_seconds(10);
        introspector.set_table("products", &["id", "name", "price"]);

        clock.advance_seconds(49);
        assert!(!cache.has_column("products", "price").unwrap());

        clock.advance_seconds(1);
        assert!(cache.has_column("products", "price").unwrap());
        assert_eq!(introspector.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_forget_forces_refresh() {
        let introspector = Arc::new(CountingIntrospector::with_table("products", &["id"]));
        let cache = cache_with(introspector.clone(), Arc::new(StepClock::new()));

        assert!(!cache.has_column("products", "price").unwrap());
        introspector.set_table("products", &["id", "price"]);
        cache.forget("products").unwrap();
        assert!(cache.has_column("products", "price").unwrap());

        cache.flush().unwrap();
        cache.columns_of("products").unwrap();
        assert_eq!(introspector.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_introspection_failure_propagates_and_is_not_cached() {
        let introspector = Arc::new(CountingIntrospector::with_table("products", &["id"]));
        *introspector.fail.lock().unwrap() = true;
        let cache = cache_with(introspector.clone(), Arc::new(StepClock::new()));

        let err = cache.has_column("products", "id").unwrap_err();
        assert!(matches!(err, EavError::RusqliteError(_)));

        *introspector.fail.lock().unwrap() = false;
        assert!(cache.has_column("products", "id").unwrap());
        assert_eq!(introspector.calls.load(Ordering::SeqCst), 2);
    }
}
