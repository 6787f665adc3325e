//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! Redis缓存层
//!
//! 基于Redis的网络缓存层，所有工作进程共享。
//!
//! # 特性
//!
//! - **连接管理**: 使用ConnectionManager自动重连
//! - **键命名空间**: 所有键加上可配置的前缀，`clear` 只清理本命名空间
//! - **原生TTL**: 使用 `SET ... PX` 写入剩余存活毫秒数
//! - **降级机制**: Redis故障时返回未命中/写入失败，不向上抛出错误
//!
//! 条目以JSON编码的 [`CacheEntry`] 存储，保留与其他层完全相同的绝对过期时间。

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client, IntoConnectionInfo};
use secrecy::{ExposeSecret, Secret};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

use crate::clock::{Clock, SystemClock};
use crate::constants::{
    DEFAULT_CONNECTION_TIMEOUT_MS, DEFAULT_NETWORK_NAMESPACE, DEFAULT_REDIS_URL, REDIS_SCAN_BATCH,
};
use crate::error::StorageError;
use crate::tier::{CacheEntry, TierKind, TierStore};

/// Redis配置
#[derive(Clone)]
pub struct RedisConfig {
    /// Redis连接URL
    pub url: String,
    /// 数据库索引
    pub db: i64,
    /// 密码（使用 Secret 包装以防止意外泄露）
    pub password: Option<Secret<String>>,
    /// 键命名空间
    pub namespace: String,
    /// 连接超时
    pub connection_timeout: Duration,
}

impl std::fmt::Debug for RedisConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisConfig")
            .field("url", &self.url)
            .field("db", &self.db)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("namespace", &self.namespace)
            .field("connection_timeout", &self.connection_timeout)
            .finish()
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_REDIS_URL.to_string(),
            db: 0,
            password: None,
            namespace: DEFAULT_NETWORK_NAMESPACE.to_string(),
            connection_timeout: Duration::from_millis(DEFAULT_CONNECTION_TIMEOUT_MS),
        }
    }
}

impl RedisConfig {
    /// 创建新的Redis配置
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// 设置数据库索引
    pub fn db(mut self, db: i64) -> Self {
        self.db = db;
        self
    }

    /// 设置密码
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(Secret::new(password.into()));
        self
    }

    /// 设置键命名空间
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// 设置连接超时
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }
}

/// Redis缓存层
pub struct RedisTier {
    /// 连接管理器
    conn: ConnectionManager,
    /// 配置
    config: RedisConfig,
    /// 时钟
    clock: Arc<dyn Clock>,
    /// 降级状态
    degraded: AtomicBool,
}

impl RedisTier {
    /// 连接Redis
    pub async fn connect(config: RedisConfig) -> Result<Self, StorageError> {
        Self::connect_with_clock(config, Arc::new(SystemClock)).await
    }

    /// 使用指定时钟连接Redis
    pub async fn connect_with_clock(
        config: RedisConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StorageError> {
        // 空命名空间会让 clear 的 SCAN MATCH 覆盖整个数据库
        if config.namespace.is_empty() {
            return Err(StorageError::ConnectionError(
                "Redis命名空间不能为空".to_string(),
            ));
        }

        info!("创建Redis缓存层, URL: {}", config.url);

        let mut info = config.url.as_str().into_connection_info()?;
        info.redis.db = config.db;
        if let Some(password) = &config.password {
            info.redis.password = Some(password.expose_secret().clone());
        }

        let client = Client::open(info).map_err(|e| {
            error!("创建Redis客户端失败: {}", e);
            StorageError::ConnectionError(format!("创建Redis客户端失败: {}", e))
        })?;

        let conn = tokio::time::timeout(config.connection_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| {
                StorageError::TimeoutError(format!(
                    "连接Redis超时 ({:?})",
                    config.connection_timeout
                ))
            })?
            .map_err(|e| {
                error!("创建Redis连接管理器失败: {}", e);
                StorageError::ConnectionError(format!("创建Redis连接管理器失败: {}", e))
            })?;

        info!("Redis连接建立成功");
        Ok(Self {
            conn,
            config,
            clock,
            degraded: AtomicBool::new(false),
        })
    }

    /// 检查Redis连接
    pub async fn ping(&self) -> Result<(), StorageError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    /// 配置
    pub fn config(&self) -> &RedisConfig {
        &self.config
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}{}", self.config.namespace, key)
    }

    /// 设置降级状态
    fn set_degraded(&self, degraded: bool) {
        let previous = self.degraded.swap(degraded, Ordering::Relaxed);
        if previous != degraded {
            if degraded {
                warn!("Redis缓存层已降级");
            } else {
                info!("Redis缓存层已恢复正常");
            }
        }
    }

    fn observe<T>(&self, op: &str, key: &str, result: Result<T, StorageError>) -> Option<T> {
        match result {
            Ok(value) => {
                self.set_degraded(false);
                Some(value)
            }
            Err(e) => {
                warn!("Redis {}失败: key={}, error={}", op, key, e);
                if matches!(
                    e,
                    StorageError::ConnectionError(_) | StorageError::TimeoutError(_)
                ) {
                    self.set_degraded(true);
                }
                None
            }
        }
    }

    async fn try_get(&self, key: &str) -> Result<Option<CacheEntry>, StorageError> {
        let mut conn = self.conn.clone();
        let namespaced = self.namespaced(key);
        let raw: Option<String> = conn.get(&namespaced).await?;

        let Some(raw) = raw else {
            return Ok(None);
        };

        match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) if entry.key == key => Ok(Some(entry)),
            Ok(_) => Ok(None),
            Err(e) => {
                warn!("Redis条目损坏，已删除: key={}, error={}", key, e);
                let _: () = conn.del(&namespaced).await?;
                Ok(None)
            }
        }
    }

    async fn try_set(&self, key: &str, entry: &CacheEntry) -> Result<(), StorageError> {
        let mut conn = self.conn.clone();
        let namespaced = self.namespaced(key);
        let ttl_ms = entry.remaining_millis(self.clock.now_millis());

        if ttl_ms == 0 {
            // 已过期的条目不写入，同时移除旧值
            let _: () = conn.del(&namespaced).await?;
            return Ok(());
        }

        let payload = serde_json::to_string(entry)?;
        let _: () = redis::cmd("SET")
            .arg(&namespaced)
            .arg(payload)
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await?;

        trace!("SET key={}, ttl_ms={}", namespaced, ttl_ms);
        Ok(())
    }

    async fn try_delete(&self, key: &str) -> Result<(), StorageError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(self.namespaced(key)).await?;
        Ok(())
    }

    async fn try_clear(&self) -> Result<usize, StorageError> {
        let mut conn = self.conn.clone();
        let pattern = format!("{}*", self.config.namespace);
        let mut cursor: u64 = 0;
        let mut removed = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(REDIS_SCAN_BATCH)
                .query_async(&mut conn)
                .await?;

            if !keys.is_empty() {
                removed += keys.len();
                let _: () = conn.del(keys).await?;
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        Ok(removed)
    }
}

#[async_trait]
impl TierStore for RedisTier {
    fn kind(&self) -> TierKind {
        TierKind::Network
    }

    async fn get(&self, key: &str) -> Option<CacheEntry> {
        let result = self.try_get(key).await;
        self.observe("GET", key, result).flatten()
    }

    async fn set(&self, key: &str, entry: &CacheEntry) -> bool {
        let result = self.try_set(key, entry).await;
        self.observe("SET", key, result).is_some()
    }

    async fn delete(&self, key: &str) -> bool {
        let result = self.try_delete(key).await;
        self.observe("DEL", key, result).is_some()
    }

    async fn clear(&self) -> bool {
        let result = self.try_clear().await;
        match self.observe("CLEAR", &self.config.namespace, result) {
            Some(removed) => {
                debug!("Redis命名空间已清空，删除 {} 个键", removed);
                true
            }
            None => false,
        }
    }

    fn is_available(&self) -> bool {
        !self.degraded.load(Ordering::Relaxed)
    }
}
