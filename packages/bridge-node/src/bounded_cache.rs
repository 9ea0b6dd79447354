//! Bounded dedupe cache with TTL and max-size eviction
//!
//! The relayer remembers which messages it has already settled so a replayed
//! Sent event does not put them back in the pending queue. The memory for
//! that is bounded: entries expire after a TTL and the oldest entry is
//! evicted when the cache is full.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::time::{Duration, Instant};

pub struct BoundedCache<K> {
    /// Key -> insertion timestamp
    map: HashMap<K, Instant>,
    /// Keys in insertion order; may hold stale keys already evicted from `map`
    order: VecDeque<(K, Instant)>,
    max_size: usize,
    ttl: Duration,
}

impl<K: Hash + Eq + Copy> BoundedCache<K> {
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            map: HashMap::new(),
            order: VecDeque::new(),
            max_size: max_size.max(1),
            ttl,
        }
    }

    /// Present and not expired
    pub fn contains(&self, key: &K) -> bool {
        self.map.get(key).is_some_and(|t| t.elapsed() < self.ttl)
    }

    pub fn insert(&mut self, key: K) {
        let now = Instant::now();
        self.evict_expired(now);

        while self.map.len() >= self.max_size {
            match self.order.pop_front() {
                Some((oldest, at)) => {
                    // skip queue entries superseded by a later re-insert
                    if self.map.get(&oldest) == Some(&at) {
                        self.map.remove(&oldest);
                    }
                }
                None => break,
            }
        }

        self.map.insert(key, now);
        self.order.push_back((key, now));
    }

    fn evict_expired(&mut self, now: Instant) {
        while let Some((key, at)) = self.order.front().copied() {
            if now.duration_since(at) < self.ttl {
                break;
            }
            self.order.pop_front();
            if self.map.get(&key) == Some(&at) {
                self.map.remove(&key);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// (current len, max_size)
    pub fn capacity_info(&self) -> (usize, usize) {
        (self.map.len(), self.max_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_insert_and_contains() {
        let mut cache = BoundedCache::new(10, Duration::from_secs(3600));
        assert!(!cache.contains(&1u64));
        cache.insert(1u64);
        assert!(cache.contains(&1));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_evicts_oldest_when_full() {
        let mut cache = BoundedCache::new(3, Duration::from_secs(3600));
        for k in [1u8, 2, 3] {
            cache.insert([k; 32]);
        }
        cache.insert([4u8; 32]);

        assert!(!cache.contains(&[1u8; 32]), "oldest should be evicted");
        assert!(cache.contains(&[2u8; 32]));
        assert!(cache.contains(&[4u8; 32]));
        assert_eq!(cache.capacity_info(), (3, 3));
    }

    #[test]
    fn test_reinsert_refreshes_position() {
        let mut cache = BoundedCache::new(2, Duration::from_secs(3600));
        cache.insert(1u32);
        cache.insert(2u32);
        cache.insert(1u32);
        cache.insert(3u32);

        assert!(cache.contains(&1));
        assert!(!cache.contains(&2));
        assert!(cache.contains(&3));
    }

    #[test]
    fn test_ttl_eviction() {
        let mut cache = BoundedCache::new(100, Duration::from_millis(50));
        cache.insert(42u32);
        assert!(cache.contains(&42));
        sleep(Duration::from_millis(80));
        assert!(!cache.contains(&42), "expired entry should not be found");

        cache.insert(99u32);
        assert_eq!(cache.len(), 1);
    }
}
