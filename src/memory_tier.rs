//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 共享内存层
//!
//! 基于DashMap的网络层替身。未配置Redis时可作为网络层使用（单进程部署、开发环境），
//! 测试中也用它代替真实的网络缓存。

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::trace;

use crate::clock::{Clock, SystemClock};
use crate::tier::{CacheEntry, TierKind, TierStore};

/// 共享内存层
pub struct SharedMemoryTier {
    data: DashMap<String, CacheEntry>,
    clock: Arc<dyn Clock>,
}

impl SharedMemoryTier {
    /// 创建新的共享内存层
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// 使用指定时钟创建
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            data: DashMap::new(),
            clock,
        }
    }

    /// 条目数量（包含尚未被惰性清理的过期条目）
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Default for SharedMemoryTier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TierStore for SharedMemoryTier {
    fn kind(&self) -> TierKind {
        TierKind::Network
    }

    async fn get(&self, key: &str) -> Option<CacheEntry> {
        let now = self.clock.now_millis();
        let entry = self.data.get(key).map(|e| e.clone())?;
        if entry.is_expired(now) {
            // 模拟网络缓存的原生TTL
            self.data.remove_if(key, |_, e| e.is_expired(now));
            trace!("共享内存层条目已过期: key={}", key);
            return None;
        }
        Some(entry)
    }

    async fn set(&self, key: &str, entry: &CacheEntry) -> bool {
        self.data.insert(key.to_string(), entry.clone());
        true
    }

    async fn delete(&self, key: &str) -> bool {
        self.data.remove(key);
        true
    }

    async fn clear(&self) -> bool {
        self.data.clear();
        true
    }

    async fn cleanup_expired(&self, now: i64) -> usize {
        let mut count = 0;
        self.data.retain(|_, entry| {
            if entry.is_expired(now) {
                count += 1;
                false
            } else {
                true
            }
        });
        count
    }
}
