use dashmap::DashMap;
use std::{
    hash::Hash,
    sync::Arc,
    time::{Duration, Instant},
};
use tracing::debug;

/// Cache entry con TTL
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    created_at: Instant,
}

impl<V> CacheEntry<V> {
    fn new(value: V) -> Self {
        Self {
            value,
            created_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) >= ttl
    }
}

/// Cache concurrente con expiración por tiempo y capacidad acotada
#[derive(Debug)]
pub struct TtlCache<K: Clone + Eq + Hash, V> {
    data: Arc<DashMap<K, CacheEntry<V>>>,
    ttl: Duration,
    capacity: usize,
}

impl<K, V> TtlCache<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            data: Arc::new(DashMap::new()),
            ttl,
            capacity: capacity.max(1),
        }
    }

    pub fn insert(&self, key: K, value: V) -> Option<V> {
        if self.ttl.is_zero() {
            return None;
        }
        if self.data.len() >= self.capacity && !self.data.contains_key(&key) {
            self.evict_oldest();
        }
        self.data.insert(key, CacheEntry::new(value)).map(|old| old.value)
    }

    /// Saca la entrada si sigue vigente
    pub fn take(&self, key: &K) -> Option<V> {
        let (_, entry) = self.data.remove(key)?;
        (!entry.is_expired(self.ttl, Instant::now())).then_some(entry.value)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Limpia entradas expiradas y retorna el número de elementos removidos
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.data.len();
        self.data.retain(|_, entry| !entry.is_expired(self.ttl, now));
        let removed = before.saturating_sub(self.data.len());

        if removed > 0 {
            debug!("Limpiadas {} entradas expiradas del cache", removed);
        }
        removed
    }

    fn evict_oldest(&self) {
        let oldest = self
            .data
            .iter()
            .min_by_key(|entry| entry.value().created_at)
            .map(|entry| entry.key().clone());

        if let Some(key) = oldest {
            self.data.remove(&key);
        }
    }
}

impl<K, V> Clone for TtlCache<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            ttl: self.ttl,
            capacity: self.capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_removes_the_entry() {
        let cache = TtlCache::new(4, Duration::from_secs(60));
        cache.insert("a".to_string(), 1);
        assert_eq!(cache.take(&"a".to_string()), Some(1));
        assert_eq!(cache.take(&"a".to_string()), None);
    }

    #[test]
    fn zero_ttl_disables_caching() {
        let cache = TtlCache::new(4, Duration::ZERO);
        cache.insert("a".to_string(), 1);
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.take(&"a".to_string()), None);
    }

    #[test]
    fn capacity_evicts_the_oldest_entry() {
        let cache = TtlCache::new(2, Duration::from_secs(60));
        cache.insert(1u32, "uno");
        std::thread::sleep(Duration::from_millis(2));
        cache.insert(2u32, "dos");
        std::thread::sleep(Duration::from_millis(2));
        cache.insert(3u32, "tres");

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.take(&1), None);
        assert_eq!(cache.take(&3), Some("tres"));
    }

    #[test]
    fn expired_entries_are_purged() {
        let cache = TtlCache::new(4, Duration::from_millis(5));
        cache.insert(1u32, ());
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(cache.cleanup_expired(), 1);
        assert_eq!(cache.len(), 0);
    }
}
