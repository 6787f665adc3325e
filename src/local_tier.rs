//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 进程内缓存层
//!
//! 使用LRU Cache实现的进程内存储，是三级缓存中最快的一层。
//!
//! # 特性
//!
//! - **惰性过期**: `get` 命中过期条目时直接移除并返回未命中
//! - **LRU淘汰**: 超过容量时自动淘汰最少使用的数据
//! - **显式清理**: [`LocalTier::cleanup_expired`] 扫描并移除所有过期条目
//!
//! # 使用示例
//!
//! ```no_run
//! use cacheron::local_tier::LocalTier;
//! use cacheron::tier::{CacheEntry, TierStore};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() {
//!     let tier = LocalTier::new(10_000);
//!     let entry = CacheEntry::new("key1", json!("value1"), 0, i64::MAX);
//!     tier.set("key1", &entry).await;
//!
//!     if let Some(entry) = tier.get("key1").await {
//!         println!("Value: {}", entry.value);
//!     }
//! }
//! ```

use async_trait::async_trait;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::clock::{Clock, SystemClock};
use crate::constants::DEFAULT_LOCAL_CAPACITY;
use crate::tier::{CacheEntry, TierKind, TierStore};

/// 进程内缓存层
pub struct LocalTier {
    /// 缓存数据（使用 LRU Cache 实现自动淘汰）
    data: Mutex<lru::LruCache<String, CacheEntry>>,
    /// 容量
    capacity: usize,
    /// 时钟
    clock: Arc<dyn Clock>,
    /// 过期移除次数
    expirations: AtomicU64,
    /// 淘汰次数
    evictions: AtomicU64,
}

impl LocalTier {
    /// 创建新的进程内缓存层
    pub fn new(capacity: usize) -> Self {
        Self::with_clock(capacity, Arc::new(SystemClock))
    }

    /// 使用指定时钟创建
    pub fn with_clock(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            data: Mutex::new(lru::LruCache::new(capacity)),
            capacity: capacity.get(),
            clock,
            expirations: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// 获取缓存大小
    pub fn len(&self) -> usize {
        self.data.lock().len()
    }

    /// 检查缓存是否为空
    pub fn is_empty(&self) -> bool {
        self.data.lock().is_empty()
    }

    /// 容量
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 过期移除次数
    pub fn expirations(&self) -> u64 {
        self.expirations.load(Ordering::Relaxed)
    }

    /// 淘汰次数
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }
}

impl Default for LocalTier {
    fn default() -> Self {
        Self::new(DEFAULT_LOCAL_CAPACITY)
    }
}

#[async_trait]
impl TierStore for LocalTier {
    fn kind(&self) -> TierKind {
        TierKind::Local
    }

    async fn get(&self, key: &str) -> Option<CacheEntry> {
        let now = self.clock.now_millis();
        let mut cache = self.data.lock();
        let expired = cache.get(key)?.is_expired(now);
        if expired {
            cache.pop(key);
            self.expirations.fetch_add(1, Ordering::Relaxed);
            trace!("本地层条目已过期: key={}", key);
            return None;
        }
        cache.get(key).cloned()
    }

    async fn set(&self, key: &str, entry: &CacheEntry) -> bool {
        let mut cache = self.data.lock();
        if !cache.contains(key) && cache.len() >= self.capacity {
            // 放置新键会自动淘汰LRU，这里只记录统计
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
        cache.put(key.to_string(), entry.clone());
        true
    }

    async fn delete(&self, key: &str) -> bool {
        self.data.lock().pop(key);
        true
    }

    async fn clear(&self) -> bool {
        self.data.lock().clear();
        true
    }

    async fn cleanup_expired(&self, now: i64) -> usize {
        let mut cache = self.data.lock();

        // 收集所有过期的键
        let expired_keys: Vec<String> = cache
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        let count = expired_keys.len();
        for key in expired_keys {
            cache.pop(&key);
        }
        self.expirations.fetch_add(count as u64, Ordering::Relaxed);

        if count > 0 {
            debug!("本地层清理了 {} 条过期数据", count);
        }

        count
    }
}
