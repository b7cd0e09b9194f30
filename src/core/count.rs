//! Counting logic: total opens and unique visitors per Moscow calendar day

use chrono::{DateTime, FixedOffset, Utc};
use dashmap::DashMap;
use std::sync::Arc;

use crate::core::summary::DailySummary;
use crate::error::Result;
use crate::state::{DailyAggregate, Days, Store};

/// Europe/Moscow has no DST, a fixed offset is exact
const MOSCOW: FixedOffset = match FixedOffset::east_opt(3 * 3600) {
    Some(offset) => offset,
    None => panic!("invalid Moscow offset"),
};

/// `YYYY-MM-DD` of `now` in Moscow time
pub fn day_key(now: DateTime<Utc>) -> String {
    now.with_timezone(&MOSCOW).format("%Y-%m-%d").to_string()
}

/// Owns the in-memory counters and mirrors them to the store on every write
pub struct Counter {
    days: Arc<DashMap<String, DailyAggregate>>,
    store: Arc<Store>,
}

impl Counter {
    /// Load the snapshot once and take ownership of it
    pub fn open(store: Store) -> Self {
        let days: DashMap<String, DailyAggregate> = store.load().into_iter().collect();
        Self {
            days: Arc::new(days),
            store: Arc::new(store),
        }
    }

    /// Count an open for today (POST /track)
    pub async fn record_visit(&self, user_id: Option<&str>) -> Result<()> {
        self.record_visit_at(Utc::now(), user_id).await
    }

    pub async fn record_visit_at(&self, now: DateTime<Utc>, user_id: Option<&str>) -> Result<()> {
        self.increment(day_key(now), user_id);
        self.persist().await
    }

    fn increment(&self, day: String, user_id: Option<&str>) {
        // Entry guard holds the shard lock for the whole update
        let mut entry = self.days.entry(day).or_default();
        entry.total += 1;

        if let Some(id) = user_id.filter(|id| !id.is_empty()) {
            if !entry.unique_visitors.contains(id) {
                entry.unique_visitors.insert(id.to_string());
            }
        }
    }

    /// Rewrite the whole snapshot file. Write failures are logged, not returned.
    pub async fn persist(&self) -> Result<()> {
        let days = Arc::clone(&self.days);
        let store = Arc::clone(&self.store);

        let saved = tokio::task::spawn_blocking(move || {
            store.persist_with(|| {
                days.iter()
                    .map(|entry| (entry.key().clone(), entry.value().clone()))
                    .collect()
            })
        })
        .await?;

        if let Err(e) = saved {
            tracing::warn!(
                "Failed to save {}: {}",
                self.store.path().display(),
                e
            );
        }
        Ok(())
    }

    /// Summary for today (GET /count, /stats, / and the bot)
    pub fn today_summary(&self) -> DailySummary {
        self.summary_at(Utc::now())
    }

    pub fn summary_at(&self, now: DateTime<Utc>) -> DailySummary {
        let date = day_key(now);
        match self.days.get(&date) {
            Some(aggregate) => DailySummary::from_aggregate(date, &aggregate),
            None => DailySummary::empty(date),
        }
    }

    /// Copy of the counters, ordered by day
    pub fn snapshot(&self) -> Days {
        self.days
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn create_test_counter() -> (Counter, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let counter = Counter::open(Store::new(temp_dir.path().join("stats.json")));
        (counter, temp_dir)
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn test_day_key_uses_moscow_time() {
        // 00:00 UTC is already 03:00 in Moscow
        assert_eq!(day_key(at(2024, 3, 10, 0, 0, 0)), "2024-03-10");
        assert_eq!(day_key(at(2024, 3, 10, 20, 59, 59)), "2024-03-10");
        assert_eq!(day_key(at(2024, 3, 10, 21, 0, 0)), "2024-03-11");
        assert_eq!(day_key(at(2023, 12, 31, 21, 30, 0)), "2024-01-01");
    }

    #[test]
    fn test_day_key_stable_within_day() {
        let start = at(2024, 6, 1, 21, 0, 0);
        let key = day_key(start);
        for minutes in (0..24 * 60).step_by(17) {
            assert_eq!(day_key(start + chrono::Duration::minutes(minutes)), key);
        }
        assert_ne!(day_key(start + chrono::Duration::hours(24)), key);
    }

    #[tokio::test]
    async fn test_repeat_user_and_anonymous() {
        let (counter, _temp) = create_test_counter();
        let now = at(2024, 3, 10, 12, 0, 0);

        counter.record_visit_at(now, Some("u1")).await.unwrap();
        counter.record_visit_at(now, Some("u1")).await.unwrap();
        counter.record_visit_at(now, None).await.unwrap();

        let summary = counter.summary_at(now);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.unique, 1);
    }

    #[tokio::test]
    async fn test_anonymous_only_falls_back_to_total() {
        let (counter, _temp) = create_test_counter();
        let now = at(2024, 3, 10, 12, 0, 0);

        for _ in 0..3 {
            counter.record_visit_at(now, None).await.unwrap();
        }

        let summary = counter.summary_at(now);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.unique, 3);
    }

    #[tokio::test]
    async fn test_empty_user_id_is_anonymous() {
        let (counter, _temp) = create_test_counter();
        let now = at(2024, 3, 10, 12, 0, 0);

        counter.record_visit_at(now, Some("")).await.unwrap();
        counter.record_visit_at(now, Some("a")).await.unwrap();

        let day = &counter.snapshot()["2024-03-10"];
        assert_eq!(day.total, 2);
        assert_eq!(day.unique_visitors.len(), 1);
    }

    #[tokio::test]
    async fn test_totals_and_distinct_users() {
        let (counter, _temp) = create_test_counter();
        let now = at(2024, 3, 10, 12, 0, 0);
        let ids = ["a", "b", "a", "c", "", "b", "d", "a"];

        for id in ids {
            counter.record_visit_at(now, Some(id)).await.unwrap();
        }

        let day = &counter.snapshot()["2024-03-10"];
        assert_eq!(day.total, ids.len() as u64);
        assert_eq!(day.unique_visitors.len(), 4);
        assert_eq!(counter.summary_at(now).unique, 4);
    }

    #[tokio::test]
    async fn test_days_are_independent() {
        let (counter, _temp) = create_test_counter();

        counter.record_visit_at(at(2024, 3, 10, 20, 0, 0), Some("u1")).await.unwrap();
        counter.record_visit_at(at(2024, 3, 10, 21, 0, 0), Some("u1")).await.unwrap();
        counter.record_visit_at(at(2024, 3, 10, 22, 0, 0), None).await.unwrap();

        let days = counter.snapshot();
        assert_eq!(days["2024-03-10"].total, 1);
        assert_eq!(days["2024-03-11"].total, 2);
        assert_eq!(days["2024-03-11"].unique_visitors.len(), 1);
    }

    #[test]
    fn test_summary_without_visits() {
        let (counter, _temp) = create_test_counter();
        let summary = counter.summary_at(at(2024, 3, 10, 12, 0, 0));
        assert_eq!(summary.date, "2024-03-10");
        assert_eq!(summary.total, 0);
        assert_eq!(summary.unique, 0);
    }

    #[tokio::test]
    async fn test_every_visit_is_persisted() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("stats.json");
        let now = at(2024, 3, 10, 12, 0, 0);

        let counter = Counter::open(Store::new(&path));
        counter.record_visit_at(now, Some("u1")).await.unwrap();
        counter.record_visit_at(now, Some("u2")).await.unwrap();

        let reopened = Counter::open(Store::new(&path));
        assert_eq!(reopened.snapshot(), counter.snapshot());
        assert_eq!(reopened.summary_at(now).unique, 2);
    }

    #[tokio::test]
    async fn test_recovers_from_corrupt_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("stats.json");
        std::fs::write(&path, "]]] definitely not json").unwrap();
        let now = at(2024, 3, 10, 12, 0, 0);

        let counter = Counter::open(Store::new(&path));
        assert!(counter.snapshot().is_empty());

        counter.record_visit_at(now, Some("u1")).await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["days"]["2024-03-10"]["total"], 1);
    }

    #[tokio::test]
    async fn test_write_failure_keeps_memory_state() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing-dir").join("stats.json");
        let now = at(2024, 3, 10, 12, 0, 0);

        let counter = Counter::open(Store::new(&path));
        counter.record_visit_at(now, Some("u1")).await.unwrap();

        assert!(!path.exists());
        assert_eq!(counter.summary_at(now).total, 1);
    }
}
