//! A small TTL'd dedup cache in front of plan observation: re-running the
//! same SQL text within `ttl` skips parsing `EXPLAIN` again, since its
//! plan digests can't have changed. The cache is swept back under
//! `max` entries once it grows past it, evicting anything older than
//! `sweep_age`.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};

pub struct SeenSqlCache {
    ttl: Duration,
    max: usize,
    sweep_age: Duration,
    entries: HashMap<u64, Instant>,
}

fn hash_sql(sql: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    sql.hash(&mut hasher);
    hasher.finish()
}

impl SeenSqlCache {
    pub fn new(ttl: Duration, max: usize, sweep_age: Duration) -> Self {
        Self {
            ttl,
            max,
            sweep_age,
            entries: HashMap::new(),
        }
    }

    /// Returns `true` if this SQL text was already recorded within `ttl`
    /// (the caller should skip plan observation), and refreshes its
    /// timestamp either way.
    pub fn observe(&mut self, sql: &str) -> bool {
        let now = Instant::now();
        let hash = hash_sql(sql);
        let skip = self
            .entries
            .get(&hash)
            .is_some_and(|seen_at| now.duration_since(*seen_at) < self.ttl);
        self.entries.insert(hash, now);
        if self.entries.len() > self.max {
            self.sweep(now);
        }
        skip
    }

    fn sweep(&mut self, now: Instant) {
        let sweep_age = self.sweep_age;
        self.entries.retain(|_, seen_at| now.duration_since(*seen_at) < sweep_age);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
