//! 测试通用工具模块
//!
//! 提供测试中常用的故障层、慢速层以及引擎构建函数。

#![allow(dead_code)]

use async_trait::async_trait;
use cacheron::{
    CacheEngine, CacheEntry, CacheStats, FileTier, LocalTier, ManualClock, SharedMemoryTier,
    TierKind, TierStore,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// 测试起始时间
pub const START_MILLIS: i64 = 1_700_000_000_000;

/// 永远失败的层（模拟不可达的网络缓存）
pub struct FailingTier {
    kind: TierKind,
    calls: AtomicU64,
}

impl FailingTier {
    pub fn new(kind: TierKind) -> Self {
        Self {
            kind,
            calls: AtomicU64::new(0),
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TierStore for FailingTier {
    fn kind(&self) -> TierKind {
        self.kind
    }

    async fn get(&self, _key: &str) -> Option<CacheEntry> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        None
    }

    async fn set(&self, _key: &str, _entry: &CacheEntry) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        false
    }

    async fn delete(&self, _key: &str) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        false
    }

    async fn clear(&self) -> bool {
        false
    }

    fn is_available(&self) -> bool {
        false
    }
}

/// 每次调用前先睡眠的层
pub struct SlowTier {
    delay: Duration,
    inner: SharedMemoryTier,
}

impl SlowTier {
    pub fn new(delay: Duration, clock: Arc<ManualClock>) -> Self {
        Self {
            delay,
            inner: SharedMemoryTier::with_clock(clock),
        }
    }
}

#[async_trait]
impl TierStore for SlowTier {
    fn kind(&self) -> TierKind {
        TierKind::Network
    }

    async fn get(&self, key: &str) -> Option<CacheEntry> {
        tokio::time::sleep(self.delay).await;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, entry: &CacheEntry) -> bool {
        tokio::time::sleep(self.delay).await;
        self.inner.set(key, entry).await
    }

    async fn delete(&self, key: &str) -> bool {
        tokio::time::sleep(self.delay).await;
        self.inner.delete(key).await
    }

    async fn clear(&self) -> bool {
        tokio::time::sleep(self.delay).await;
        self.inner.clear().await
    }

    async fn cleanup_expired(&self, now: i64) -> usize {
        tokio::time::sleep(self.delay).await;
        self.inner.cleanup_expired(now).await
    }
}

/// 测试引擎及其各层句柄
pub struct TestEngine {
    pub engine: Arc<CacheEngine>,
    pub clock: Arc<ManualClock>,
    pub stats: Arc<CacheStats>,
    pub local: Arc<LocalTier>,
    pub filesystem: Arc<FileTier>,
    pub dir: tempfile::TempDir,
}

/// 创建使用内存网络层的测试引擎
pub fn test_engine() -> (TestEngine, Arc<SharedMemoryTier>) {
    let clock = Arc::new(ManualClock::new(START_MILLIS));
    let network = Arc::new(SharedMemoryTier::with_clock(clock.clone()));
    let shared: Arc<dyn TierStore> = network.clone();
    let engine = build_engine(clock, Some(shared), Duration::from_secs(1));
    (engine, network)
}

/// 创建使用指定网络层的测试引擎
pub fn engine_with_network(
    clock: Arc<ManualClock>,
    network: Arc<dyn TierStore>,
    tier_timeout: Duration,
) -> TestEngine {
    build_engine(clock, Some(network), tier_timeout)
}

/// 创建没有网络层的测试引擎
pub fn engine_without_network() -> TestEngine {
    let clock = Arc::new(ManualClock::new(START_MILLIS));
    build_engine(clock, None, Duration::from_secs(1))
}

fn build_engine(
    clock: Arc<ManualClock>,
    network: Option<Arc<dyn TierStore>>,
    tier_timeout: Duration,
) -> TestEngine {
    let dir = tempfile::tempdir().unwrap();
    let stats = Arc::new(CacheStats::new());
    let local = Arc::new(LocalTier::with_clock(1000, clock.clone()));
    let filesystem = Arc::new(FileTier::with_clock(dir.path(), clock.clone()).unwrap());

    let mut builder = CacheEngine::builder()
        .local(local.clone())
        .filesystem(filesystem.clone())
        .clock(clock.clone())
        .stats(stats.clone())
        .tier_timeout(tier_timeout)
        .backfill_ttl(Duration::from_secs(30));
    if let Some(network) = network {
        builder = builder.network(network);
    }

    TestEngine {
        engine: Arc::new(builder.build().unwrap()),
        clock,
        stats,
        local,
        filesystem,
        dir,
    }
}
