//! 订单聚合的进程内缓存
//!
//! 以 order_uid 为键保存聚合的只读副本，写入订单时不会失效（读取可能是旧值），
//! 旧值的存活时间由 TTL 限制，条目总数由 `max_entries` 限制，超出时淘汰最早写入的条目。
//!
//! 读写锁只包住 map 操作本身，任何 `.await` 之前都已释放。

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use order_shared::config::CacheConfig;
use order_shared::observability::metrics;
use parking_lot::RwLock;
use tokio::time::Instant;
use tracing::debug;

use crate::models::OrderInfo;

struct CacheEntry {
    info: Arc<OrderInfo>,
    inserted_at: Instant,
    /// 与写入队列中的记录对应，用于识别过期的队列记录
    generation: u64,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    /// 按写入先后排列的 (order_uid, generation)，可能包含已被覆盖或删除的旧记录
    insertion_order: VecDeque<(String, u64)>,
    next_generation: u64,
}

impl CacheState {
    /// 淘汰最早写入的有效条目
    fn evict_oldest(&mut self) -> Option<String> {
        while let Some((uid, generation)) = self.insertion_order.pop_front() {
            let live = self
                .entries
                .get(&uid)
                .is_some_and(|entry| entry.generation == generation);
            if live {
                self.entries.remove(&uid);
                return Some(uid);
            }
        }
        None
    }

    /// 队列中的旧记录过多时重建，避免同一订单反复写入导致队列无限增长
    fn compact(&mut self, max_entries: usize) {
        if self.insertion_order.len() <= max_entries.saturating_mul(2).max(16) {
            return;
        }
        let entries = &self.entries;
        self.insertion_order.retain(|(uid, generation)| {
            entries
                .get(uid)
                .is_some_and(|entry| entry.generation == *generation)
        });
    }
}

/// 订单缓存
pub struct OrderCache {
    state: RwLock<CacheState>,
    max_entries: usize,
    ttl: Option<Duration>,
}

impl OrderCache {
    /// `ttl` 为 None 时条目在进程生命周期内一直有效；`max_entries` 为 0 时不缓存
    pub fn new(max_entries: usize, ttl: Option<Duration>) -> Self {
        Self {
            state: RwLock::new(CacheState::default()),
            max_entries,
            ttl,
        }
    }

    /// 从配置构造，`ttl_seconds = 0` 与未设置等价
    pub fn from_config(config: &CacheConfig) -> Self {
        let ttl = config
            .ttl_seconds
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);
        Self::new(config.max_entries, ttl)
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// 查询缓存；过期条目视为未命中并被移除
    pub fn get(&self, order_uid: &str) -> Option<Arc<OrderInfo>> {
        let expired = {
            let state = self.state.read();
            match state.entries.get(order_uid) {
                None => {
                    metrics::record_cache_event("miss");
                    return None;
                }
                Some(entry) if !self.is_expired(entry) => {
                    metrics::record_cache_event("hit");
                    return Some(Arc::clone(&entry.info));
                }
                Some(entry) => entry.generation,
            }
        };

        metrics::record_cache_event("expired");
        let mut state = self.state.write();
        // 释放读锁后条目可能已被刷新，只删除仍是同一代的条目
        if state
            .entries
            .get(order_uid)
            .is_some_and(|entry| entry.generation == expired)
        {
            state.entries.remove(order_uid);
        }
        metrics::set_cache_entries(state.entries.len());
        debug!(order_uid, "缓存条目已过期");
        None
    }

    /// 写入或覆盖条目，必要时淘汰最早写入的条目
    pub fn insert(&self, info: Arc<OrderInfo>) {
        if self.max_entries == 0 {
            return;
        }

        let order_uid = info.order_uid().to_string();
        let mut state = self.state.write();

        let generation = state.next_generation;
        state.next_generation += 1;

        let replaced = state
            .entries
            .insert(
                order_uid.clone(),
                CacheEntry {
                    info,
                    inserted_at: Instant::now(),
                    generation,
                },
            )
            .is_some();
        state.insertion_order.push_back((order_uid, generation));

        if !replaced {
            while state.entries.len() > self.max_entries {
                match state.evict_oldest() {
                    Some(evicted) => {
                        metrics::record_cache_event("evict");
                        debug!(order_uid = %evicted, "缓存已满，淘汰最早写入的订单");
                    }
                    None => break,
                }
            }
        }

        state.compact(self.max_entries);
        metrics::set_cache_entries(state.entries.len());
    }

    /// 移除指定订单的缓存，返回是否存在
    pub fn invalidate(&self, order_uid: &str) -> bool {
        let mut state = self.state.write();
        let removed = state.entries.remove(order_uid).is_some();
        metrics::set_cache_entries(state.entries.len());
        removed
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_expired(&self, entry: &CacheEntry) -> bool {
        self.ttl
            .is_some_and(|ttl| entry.inserted_at.elapsed() >= ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::to_entity;
    use crate::test_utils::sample_order;

    fn info(order_uid: &str) -> Arc<OrderInfo> {
        Arc::new(to_entity(&sample_order(order_uid)).unwrap())
    }

    #[test]
    fn test_get_after_insert() {
        let cache = OrderCache::new(10, None);
        assert!(cache.get("o1").is_none());

        cache.insert(info("o1"));
        let cached = cache.get("o1").unwrap();
        assert_eq!(cached.order_uid(), "o1");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_size_bound_evicts_oldest_inserted() {
        let cache = OrderCache::new(3, None);
        for uid in ["o1", "o2", "o3", "o4", "o5"] {
            cache.insert(info(uid));
            assert!(cache.len() <= 3);
        }

        assert!(cache.get("o1").is_none());
        assert!(cache.get("o2").is_none());
        for uid in ["o3", "o4", "o5"] {
            assert!(cache.get(uid).is_some(), "{uid} 应仍在缓存中");
        }
    }

    #[test]
    fn test_reinsert_moves_entry_to_back() {
        let cache = OrderCache::new(2, None);
        cache.insert(info("o1"));
        cache.insert(info("o2"));
        cache.insert(info("o1"));
        cache.insert(info("o3"));

        assert!(cache.get("o1").is_some());
        assert!(cache.get("o2").is_none());
        assert!(cache.get("o3").is_some());
    }

    #[test]
    fn test_repeated_reinsert_keeps_queue_bounded() {
        let cache = OrderCache::new(4, None);
        for _ in 0..1_000 {
            cache.insert(info("o1"));
        }
        assert_eq!(cache.len(), 1);
        assert!(cache.state.read().insertion_order.len() <= 16);
    }

    #[test]
    fn test_zero_capacity_disables_cache() {
        let cache = OrderCache::new(0, None);
        cache.insert(info("o1"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate() {
        let cache = OrderCache::new(10, None);
        cache.insert(info("o1"));

        assert!(cache.invalidate("o1"));
        assert!(!cache.invalidate("o1"));
        assert!(cache.get("o1").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry() {
        let cache = OrderCache::new(10, Some(Duration::from_secs(300)));
        cache.insert(info("o1"));

        tokio::time::advance(Duration::from_secs(299)).await;
        assert!(cache.get("o1").is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get("o1").is_none());
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_without_ttl_entries_never_expire() {
        let cache = OrderCache::from_config(&CacheConfig {
            max_entries: 10,
            ttl_seconds: None,
        });
        cache.insert(info("o1"));

        tokio::time::advance(Duration::from_secs(365 * 24 * 3600)).await;
        assert!(cache.get("o1").is_some());
    }

    #[test]
    fn test_concurrent_readers_and_writers() {
        let cache = Arc::new(OrderCache::new(50, None));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..200 {
                        let uid = format!("o{}", (t * 200 + i) % 120);
                        if i % 3 == 0 {
                            cache.insert(info(&uid));
                        } else if let Some(found) = cache.get(&uid) {
                            assert_eq!(found.order_uid(), uid);
                        }
                        assert!(cache.len() <= 50);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(cache.len() <= 50);
    }
}
