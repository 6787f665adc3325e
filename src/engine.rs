//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 三级缓存引擎
//!
//! 按延迟从低到高依次查询 进程内层 -> 网络层 -> 文件系统层，
//! 命中后回填所有更快的层；写入时对三层做完整的写穿透。
//!
//! # 特性
//!
//! - **读穿透回填**: 网络层命中回填本地层（短TTL），文件系统层命中回填网络层和本地层
//! - **写穿透**: 每次 `set` 计算一次绝对过期时间，写入所有层
//! - **标签失效**: `set_with_tags` 维护 `tag:<name>` 索引，`invalidate_tag` 批量删除
//! - **降级机制**: 每次层调用都有超时，任何层故障都降级为未命中或尽力写入
//! - **单飞模式**: `remember` 保证同一进程内同一个键只加载一次
//!
//! 文件系统层是记录系统：`set`/`delete` 的返回值只取决于文件系统层是否成功，
//! 本地层和网络层只是加速器，失败只记录日志。
//!
//! # 使用示例
//!
//! ```no_run
//! use cacheron::{CacheConfig, CacheEngine, CacheStats};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), cacheron::CacheError> {
//!     let stats = Arc::new(CacheStats::new());
//!     let cache = CacheEngine::from_config(CacheConfig::default(), stats).await?;
//!
//!     cache.set("mentor:42", &"Ada Lovelace", Duration::from_secs(60)).await?;
//!     let name: Option<String> = cache.get_as("mentor:42").await?;
//!     assert_eq!(name.as_deref(), Some("Ada Lovelace"));
//!     Ok(())
//! }
//! ```

use ahash::AHashSet;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::clock::{duration_millis, Clock, SystemClock};
use crate::config::CacheConfig;
use crate::constants::{
    DEFAULT_LOCAL_BACKFILL_TTL_SECS, DEFAULT_LOCAL_CAPACITY, DEFAULT_TIER_TIMEOUT_MS,
    DEFAULT_TTL_SECS, TAG_KEY_PREFIX,
};
use crate::error::{validate_key, validate_ttl, CacheError};
use crate::file_tier::FileTier;
use crate::local_tier::LocalTier;
use crate::stats::{Availability, CacheStats, StatsSnapshot, TierAvailability};
use crate::tier::{CacheEntry, TierKind, TierStore};

type LoadResult = Result<serde_json::Value, String>;

/// 单飞加载器
struct SingleFlightLoader {
    /// 加载中的任务: key -> receiver
    pending: DashMap<String, watch::Receiver<Option<LoadResult>>>,
}

/// 加载者退出（完成或被取消）时移除单飞条目
struct PendingGuard<'a> {
    pending: &'a DashMap<String, watch::Receiver<Option<LoadResult>>>,
    key: &'a str,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.remove(self.key);
    }
}

impl SingleFlightLoader {
    fn new() -> Self {
        Self {
            pending: DashMap::new(),
        }
    }

    /// 尝试获取已存在的加载任务，或创建新的
    async fn get_or_load<F, Fut>(&self, key: &str, loader: F) -> LoadResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = LoadResult>,
    {
        use dashmap::mapref::entry::Entry;

        let slot = match self.pending.entry(key.to_string()) {
            Entry::Occupied(entry) => Err(entry.get().clone()),
            Entry::Vacant(entry) => {
                let (tx, rx) = watch::channel(None);
                entry.insert(rx);
                Ok(tx)
            }
        };

        let tx = match slot {
            Ok(tx) => tx,
            Err(mut rx) => {
                // 已有其他请求在加载，等待结果
                trace!("等待其他请求加载 key={}", key);
                return Self::wait(&mut rx).await;
            }
        };

        let _guard = PendingGuard {
            pending: &self.pending,
            key,
        };

        let result = loader().await;

        // 通知等待者
        let _ = tx.send(Some(result.clone()));

        result
    }

    async fn wait(rx: &mut watch::Receiver<Option<LoadResult>>) -> LoadResult {
        loop {
            if let Some(result) = rx.borrow_and_update().clone() {
                return result;
            }
            if rx.changed().await.is_err() {
                // 加载者在发送结果前被取消
                return rx
                    .borrow()
                    .clone()
                    .unwrap_or_else(|| Err("加载任务已被取消".to_string()));
            }
        }
    }
}

/// 各层最近一次调用是否在超时内完成
#[derive(Debug)]
struct TierHealth {
    local: AtomicBool,
    network: AtomicBool,
    filesystem: AtomicBool,
}

impl TierHealth {
    fn new() -> Self {
        Self {
            local: AtomicBool::new(true),
            network: AtomicBool::new(true),
            filesystem: AtomicBool::new(true),
        }
    }

    fn flag(&self, kind: TierKind) -> &AtomicBool {
        match kind {
            TierKind::Local => &self.local,
            TierKind::Network => &self.network,
            TierKind::Filesystem => &self.filesystem,
        }
    }
}

/// 缓存引擎构建器
pub struct CacheEngineBuilder {
    local: Option<Arc<dyn TierStore>>,
    network: Option<Arc<dyn TierStore>>,
    filesystem: Option<Arc<dyn TierStore>>,
    clock: Arc<dyn Clock>,
    stats: Arc<CacheStats>,
    tier_timeout: Duration,
    maintenance_timeout: Option<Duration>,
    backfill_ttl: Duration,
    default_ttl: Duration,
}

impl CacheEngineBuilder {
    pub fn new() -> Self {
        Self {
            local: None,
            network: None,
            filesystem: None,
            clock: Arc::new(SystemClock),
            stats: Arc::new(CacheStats::new()),
            tier_timeout: Duration::from_millis(DEFAULT_TIER_TIMEOUT_MS),
            maintenance_timeout: None,
            backfill_ttl: Duration::from_secs(DEFAULT_LOCAL_BACKFILL_TTL_SECS),
            default_ttl: Duration::from_secs(DEFAULT_TTL_SECS),
        }
    }

    /// 设置进程内层（默认使用 [`LocalTier`]）
    pub fn local(mut self, tier: Arc<dyn TierStore>) -> Self {
        self.local = Some(tier);
        self
    }

    /// 设置网络层（可选）
    pub fn network(mut self, tier: Arc<dyn TierStore>) -> Self {
        self.network = Some(tier);
        self
    }

    /// 设置文件系统层（必需）
    pub fn filesystem(mut self, tier: Arc<dyn TierStore>) -> Self {
        self.filesystem = Some(tier);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn stats(mut self, stats: Arc<CacheStats>) -> Self {
        self.stats = stats;
        self
    }

    pub fn tier_timeout(mut self, timeout: Duration) -> Self {
        self.tier_timeout = timeout;
        self
    }

    /// 设置 `clear`/`cleanup` 单层调用的超时（默认与层超时相同）
    pub fn maintenance_timeout(mut self, timeout: Duration) -> Self {
        self.maintenance_timeout = Some(timeout);
        self
    }

    pub fn backfill_ttl(mut self, ttl: Duration) -> Self {
        self.backfill_ttl = ttl;
        self
    }

    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn build(self) -> Result<CacheEngine, CacheError> {
        let filesystem = self
            .filesystem
            .ok_or_else(|| CacheError::ConfigError("必须配置文件系统层".to_string()))?;

        if self.tier_timeout.is_zero() {
            return Err(CacheError::ConfigError("层超时必须大于0".to_string()));
        }
        let maintenance_timeout = self.maintenance_timeout.unwrap_or(self.tier_timeout);
        if maintenance_timeout.is_zero() {
            return Err(CacheError::ConfigError("维护超时必须大于0".to_string()));
        }
        validate_ttl(self.backfill_ttl)?;
        validate_ttl(self.default_ttl)?;

        let local = self.local.unwrap_or_else(|| {
            Arc::new(LocalTier::with_clock(
                DEFAULT_LOCAL_CAPACITY,
                Arc::clone(&self.clock),
            ))
        });

        Ok(CacheEngine {
            local,
            network: self.network,
            filesystem,
            clock: self.clock,
            stats: self.stats,
            tier_timeout: self.tier_timeout,
            maintenance_timeout,
            backfill_ttl: self.backfill_ttl,
            default_ttl: self.default_ttl,
            health: TierHealth::new(),
            single_flight: SingleFlightLoader::new(),
        })
    }
}

impl Default for CacheEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 三级缓存引擎
pub struct CacheEngine {
    /// 进程内层
    local: Arc<dyn TierStore>,
    /// 网络层
    network: Option<Arc<dyn TierStore>>,
    /// 文件系统层（记录系统）
    filesystem: Arc<dyn TierStore>,
    /// 时钟
    clock: Arc<dyn Clock>,
    /// 统计信息
    stats: Arc<CacheStats>,
    /// 单次层调用超时
    tier_timeout: Duration,
    /// 单层清空/清理超时
    maintenance_timeout: Duration,
    /// 本地层回填TTL
    backfill_ttl: Duration,
    /// 默认TTL
    default_ttl: Duration,
    /// 超时健康状态
    health: TierHealth,
    /// 单飞加载器
    single_flight: SingleFlightLoader,
}

impl CacheEngine {
    pub fn builder() -> CacheEngineBuilder {
        CacheEngineBuilder::new()
    }

    /// 按配置创建缓存引擎
    ///
    /// 网络层连接失败不会导致创建失败，引擎会在没有网络层的情况下运行。
    pub async fn from_config(
        config: CacheConfig,
        stats: Arc<CacheStats>,
    ) -> Result<Self, CacheError> {
        config.validate()?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let local = Arc::new(LocalTier::with_clock(
            config.local.capacity,
            Arc::clone(&clock),
        ));
        let filesystem = Arc::new(
            FileTier::with_clock(&config.filesystem.dir, Arc::clone(&clock))?
                .temp_grace(Duration::from_secs(config.filesystem.temp_grace_secs)),
        );

        let mut builder = CacheEngineBuilder::new()
            .local(local)
            .filesystem(filesystem)
            .stats(stats)
            .tier_timeout(config.tier_timeout())
            .maintenance_timeout(config.maintenance_timeout())
            .backfill_ttl(config.backfill_ttl())
            .default_ttl(config.default_ttl());

        if let Some(network) = Self::connect_network(&config, &clock).await {
            builder = builder.network(network);
        }

        let engine = builder.clock(clock).build()?;
        info!(
            "缓存引擎已创建: network={}, dir={}",
            engine.network.is_some(),
            config.filesystem.dir.display()
        );
        Ok(engine)
    }

    #[cfg(feature = "redis")]
    async fn connect_network(
        config: &CacheConfig,
        clock: &Arc<dyn Clock>,
    ) -> Option<Arc<dyn TierStore>> {
        let network = config.network.as_ref()?;
        match crate::redis_tier::RedisTier::connect_with_clock(
            network.to_redis_config(),
            Arc::clone(clock),
        )
        .await
        {
            Ok(tier) => Some(Arc::new(tier)),
            Err(e) => {
                warn!("网络层创建失败，将在无网络层的情况下运行: {}", e);
                None
            }
        }
    }

    #[cfg(not(feature = "redis"))]
    async fn connect_network(
        config: &CacheConfig,
        _clock: &Arc<dyn Clock>,
    ) -> Option<Arc<dyn TierStore>> {
        if config.network.is_some() {
            warn!("配置了网络层但未启用 redis 特性，将在无网络层的情况下运行");
        }
        None
    }

    /// 获取值（三级缓存）
    pub async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, CacheError> {
        validate_key(key)?;
        Ok(self.lookup(key, true).await.map(|entry| entry.value))
    }

    /// 获取值并反序列化
    ///
    /// 无法解码为 `T` 的值视为未命中，并删除该键。
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        validate_key(key)?;
        let Some(entry) = self.lookup(key, true).await else {
            return Ok(None);
        };

        match serde_json::from_value(entry.value) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!("缓存值无法解码，已删除: key={}, error={}", key, e);
                self.remove(key).await;
                Ok(None)
            }
        }
    }

    /// 读取并反序列化，不计入命中统计
    pub(crate) async fn peek_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entry = self.lookup(key, false).await?;
        serde_json::from_value(entry.value)
            .map_err(|e| warn!("缓存值无法解码: key={}, error={}", key, e))
            .ok()
    }

    /// 检查键是否存在
    pub async fn has(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.get(key).await?.is_some())
    }

    /// 设置值（写穿透到所有层）
    ///
    /// 仅当文件系统层写入失败时返回 `Ok(false)`。
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<bool, CacheError> {
        validate_key(key)?;
        validate_ttl(ttl)?;
        let value = serde_json::to_value(value)?;
        Ok(self.write(key, value, ttl).await)
    }

    /// 删除值（从所有层删除）
    pub async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        validate_key(key)?;
        Ok(self.remove(key).await)
    }

    /// 清空所有层
    pub async fn clear(&self) -> bool {
        let network = async {
            match &self.network {
                Some(tier) => self.tier_clear(tier).await,
                None => true,
            }
        };
        let (local_ok, network_ok, filesystem_ok) = tokio::join!(
            self.tier_clear(&self.local),
            network,
            self.tier_clear(&self.filesystem)
        );

        if !local_ok || !network_ok {
            warn!(
                "加速层清空失败: local={}, network={}",
                local_ok, network_ok
            );
        }
        info!("缓存已清空");
        filesystem_ok
    }

    /// 设置值并关联标签
    ///
    /// 标签索引的读-改-写不是原子的，并发为同一标签打标时可能丢失一次更新。
    pub async fn set_with_tags<T, S>(
        &self,
        key: &str,
        value: &T,
        tags: &[S],
        ttl: Duration,
    ) -> Result<bool, CacheError>
    where
        T: Serialize + ?Sized,
        S: AsRef<str>,
    {
        validate_key(key)?;
        validate_ttl(ttl)?;
        let mut tag_keys = AHashSet::with_capacity(tags.len());
        for tag in tags {
            tag_keys.insert(Self::tag_key(tag.as_ref())?);
        }

        let ok = self.set(key, value, ttl).await?;

        for tag_key in tag_keys {
            let mut keys = self.tag_members(&tag_key).await;
            if !keys.iter().any(|k| k == key) {
                keys.push(key.to_string());
            }
            if !self.write(&tag_key, serde_json::json!(keys), ttl).await {
                warn!("标签索引写入失败: tag_key={}, key={}", tag_key, key);
            }
        }

        Ok(ok)
    }

    /// 使标签下的所有键失效
    ///
    /// 已过期或已删除的成员直接跳过；重复调用是安全的。
    pub async fn invalidate_tag(&self, tag: &str) -> Result<bool, CacheError> {
        let tag_key = Self::tag_key(tag)?;
        let keys = self.tag_members(&tag_key).await;

        let results = futures::future::join_all(keys.iter().map(|key| self.remove(key))).await;
        let failed = results.iter().filter(|ok| !**ok).count();
        if failed > 0 {
            warn!("标签失效时 {} 个键删除失败: tag={}", failed, tag);
        }

        debug!("标签已失效: tag={}, keys={}", tag, keys.len());
        Ok(self.remove(&tag_key).await)
    }

    /// 获取统计快照
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot(self.tier_availability())
    }

    /// 统计信息句柄
    pub fn stats_handle(&self) -> &Arc<CacheStats> {
        &self.stats
    }

    /// 清理所有层的过期条目，返回清理数量
    pub async fn cleanup(&self) -> usize {
        let now = self.clock.now_millis();
        let mut removed = self.tier_cleanup(&self.local, now).await;
        if let Some(network) = &self.network {
            removed += self.tier_cleanup(network, now).await;
        }
        removed += self.tier_cleanup(&self.filesystem, now).await;

        self.stats.record_expirations(removed);
        if removed > 0 {
            debug!("清理了 {} 条过期数据", removed);
        }
        removed
    }

    /// 读穿透：命中直接返回，否则调用加载器加载并写入缓存
    ///
    /// 同一进程内对同一个键的并发调用只会执行一次加载器。
    pub async fn remember<T, F, Fut, E>(
        &self,
        key: &str,
        ttl: Duration,
        loader: F,
    ) -> Result<T, CacheError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        validate_key(key)?;
        validate_ttl(ttl)?;

        if let Some(value) = self.get_as::<T>(key).await? {
            return Ok(value);
        }

        let value = self
            .single_flight
            .get_or_load(key, || async {
                let loaded = loader().await.map_err(|e| e.to_string())?;
                let value = serde_json::to_value(&loaded).map_err(|e| e.to_string())?;
                self.write(key, value.clone(), ttl).await;
                Ok::<_, String>(value)
            })
            .await
            .map_err(CacheError::LoaderError)?;

        Ok(serde_json::from_value(value)?)
    }

    /// 使用默认TTL的 [`CacheEngine::remember`]
    pub async fn remember_default<T, F, Fut, E>(&self, key: &str, loader: F) -> Result<T, CacheError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.remember(key, self.default_ttl, loader).await
    }

    /// 启动后台清理任务
    ///
    /// 任务只持有弱引用，引擎被释放后自动退出。
    pub fn spawn_cleanup_task(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let engine: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(engine) = engine.upgrade() else {
                    debug!("缓存引擎已释放，清理任务退出");
                    break;
                };
                engine.cleanup().await;
            }
        })
    }

    /// 进程内层
    pub fn local_tier(&self) -> &Arc<dyn TierStore> {
        &self.local
    }

    /// 网络层
    pub fn network_tier(&self) -> Option<&Arc<dyn TierStore>> {
        self.network.as_ref()
    }

    /// 文件系统层
    pub fn filesystem_tier(&self) -> &Arc<dyn TierStore> {
        &self.filesystem
    }

    /// 时钟
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// 默认TTL
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// 各层可用状态
    pub fn tier_availability(&self) -> TierAvailability {
        TierAvailability {
            local: self.availability_of(Some(&self.local)),
            network: self.availability_of(self.network.as_ref()),
            filesystem: self.availability_of(Some(&self.filesystem)),
        }
    }

    fn availability_of(&self, tier: Option<&Arc<dyn TierStore>>) -> Availability {
        match tier {
            None => Availability::Absent,
            Some(tier) => {
                let healthy = self.health.flag(tier.kind()).load(Ordering::Relaxed);
                if healthy && tier.is_available() {
                    Availability::Available
                } else {
                    Availability::Degraded
                }
            }
        }
    }

    fn tag_key(tag: &str) -> Result<String, CacheError> {
        if tag.is_empty() {
            return Err(CacheError::InvalidArgument("标签不能为空".to_string()));
        }
        let tag_key = format!("{}{}", TAG_KEY_PREFIX, tag);
        validate_key(&tag_key)?;
        Ok(tag_key)
    }

    /// 读取标签索引（不计入命中统计），损坏的索引视为空
    async fn tag_members(&self, tag_key: &str) -> Vec<String> {
        let Some(entry) = self.lookup(tag_key, false).await else {
            return Vec::new();
        };
        serde_json::from_value(entry.value).unwrap_or_else(|e| {
            warn!("标签索引损坏，按空索引处理: tag_key={}, error={}", tag_key, e);
            Vec::new()
        })
    }

    /// 三级查询
    async fn lookup(&self, key: &str, record: bool) -> Option<CacheEntry> {
        let now = self.clock.now_millis();

        // 本地层
        if let Some(entry) = self.tier_get(&self.local, key, now).await {
            trace!("本地层命中: key={}", key);
            if record {
                self.stats.record_hit(TierKind::Local);
            }
            return Some(entry);
        }

        // 网络层
        if let Some(network) = &self.network {
            if let Some(entry) = self.tier_get(network, key, now).await {
                trace!("网络层命中: key={}", key);
                self.backfill_local(key, &entry, now).await;
                if record {
                    self.stats.record_hit(TierKind::Network);
                }
                return Some(entry);
            }
        }

        // 文件系统层
        if let Some(entry) = self.tier_get(&self.filesystem, key, now).await {
            trace!("文件系统层命中: key={}", key);
            if let Some(network) = &self.network {
                if self.tier_set(network, key, &entry).await {
                    self.stats.record_promotion();
                }
            }
            self.backfill_local(key, &entry, now).await;
            if record {
                self.stats.record_hit(TierKind::Filesystem);
            }
            return Some(entry);
        }

        if record {
            self.stats.record_miss();
        }
        trace!("缓存未命中: key={}", key);
        None
    }

    /// 回填本地层，TTL不超过条目自身的过期时间
    async fn backfill_local(&self, key: &str, entry: &CacheEntry, now: i64) {
        let capped =
            entry.with_expiry_capped(now.saturating_add(duration_millis(self.backfill_ttl)));
        if self.tier_set(&self.local, key, &capped).await {
            self.stats.record_promotion();
        }
    }

    /// 写穿透
    async fn write(&self, key: &str, value: serde_json::Value, ttl: Duration) -> bool {
        let now = self.clock.now_millis();
        let entry = CacheEntry::new(key, value, now, now.saturating_add(duration_millis(ttl)));

        let network = async {
            match &self.network {
                Some(tier) => self.tier_set(tier, key, &entry).await,
                None => true,
            }
        };
        let (local_ok, network_ok, filesystem_ok) = tokio::join!(
            self.tier_set(&self.local, key, &entry),
            network,
            self.tier_set(&self.filesystem, key, &entry)
        );

        self.stats.record_set();
        if !local_ok || !network_ok {
            debug!(
                "加速层写入失败: key={}, local={}, network={}",
                key, local_ok, network_ok
            );
        }
        if !filesystem_ok {
            warn!("文件系统层写入失败: key={}", key);
        }
        filesystem_ok
    }

    /// 从所有层删除
    async fn remove(&self, key: &str) -> bool {
        let network = async {
            match &self.network {
                Some(tier) => self.tier_delete(tier, key).await,
                None => true,
            }
        };
        let (local_ok, network_ok, filesystem_ok) = tokio::join!(
            self.tier_delete(&self.local, key),
            network,
            self.tier_delete(&self.filesystem, key)
        );

        self.stats.record_delete();
        if !local_ok || !network_ok {
            debug!(
                "加速层删除失败（将自然过期）: key={}, local={}, network={}",
                key, local_ok, network_ok
            );
        }
        filesystem_ok
    }

    async fn tier_get(
        &self,
        tier: &Arc<dyn TierStore>,
        key: &str,
        now: i64,
    ) -> Option<CacheEntry> {
        self.guarded(tier.kind(), "get", key, tier.get(key))
            .await
            .flatten()
            .filter(|entry| !entry.is_expired(now))
    }

    async fn tier_set(&self, tier: &Arc<dyn TierStore>, key: &str, entry: &CacheEntry) -> bool {
        match self.guarded(tier.kind(), "set", key, tier.set(key, entry)).await {
            Some(true) => true,
            Some(false) => {
                self.stats.record_tier_error();
                false
            }
            None => false,
        }
    }

    async fn tier_delete(&self, tier: &Arc<dyn TierStore>, key: &str) -> bool {
        match self.guarded(tier.kind(), "delete", key, tier.delete(key)).await {
            Some(true) => true,
            Some(false) => {
                self.stats.record_tier_error();
                false
            }
            None => false,
        }
    }

    async fn tier_clear(&self, tier: &Arc<dyn TierStore>) -> bool {
        let fut = tier.clear();
        match self
            .guarded_for(self.maintenance_timeout, tier.kind(), "clear", "*", fut)
            .await
        {
            Some(true) => true,
            Some(false) => {
                self.stats.record_tier_error();
                false
            }
            None => false,
        }
    }

    /// 超时的清理按0条计
    async fn tier_cleanup(&self, tier: &Arc<dyn TierStore>, now: i64) -> usize {
        let fut = tier.cleanup_expired(now);
        self.guarded_for(self.maintenance_timeout, tier.kind(), "cleanup", "*", fut)
            .await
            .unwrap_or(0)
    }

    /// 为层调用加上超时
    async fn guarded<T, F>(&self, kind: TierKind, op: &str, key: &str, fut: F) -> Option<T>
    where
        F: Future<Output = T>,
    {
        self.guarded_for(self.tier_timeout, kind, op, key, fut).await
    }

    async fn guarded_for<T, F>(
        &self,
        limit: Duration,
        kind: TierKind,
        op: &str,
        key: &str,
        fut: F,
    ) -> Option<T>
    where
        F: Future<Output = T>,
    {
        match tokio::time::timeout(limit, fut).await {
            Ok(value) => {
                self.health.flag(kind).store(true, Ordering::Relaxed);
                Some(value)
            }
            Err(_) => {
                warn!("{}层{}超时 ({:?}): key={}", kind, op, limit, key);
                self.health.flag(kind).store(false, Ordering::Relaxed);
                self.stats.record_tier_timeout();
                None
            }
        }
    }
}
