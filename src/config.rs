//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 配置模块
//!
//! 定义缓存引擎的配置结构，支持从YAML、TOML、JSON加载。
//!
//! ```yaml
//! default_ttl_secs: 300
//! tier_timeout_ms: 50
//! maintenance_timeout_ms: 5000
//! cleanup_interval_secs: 60
//! local:
//!   capacity: 10000
//!   backfill_ttl_secs: 60
//! network:
//!   url: redis://127.0.0.1:6379
//!   namespace: "mentor:"
//! filesystem:
//!   dir: /var/cache/mentor
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{
    DEFAULT_CACHE_DIR, DEFAULT_CLEANUP_INTERVAL_SECS, DEFAULT_CONNECTION_TIMEOUT_MS,
    DEFAULT_LOCAL_BACKFILL_TTL_SECS, DEFAULT_LOCAL_CAPACITY, DEFAULT_MAINTENANCE_TIMEOUT_MS,
    DEFAULT_NETWORK_NAMESPACE, DEFAULT_REDIS_URL, DEFAULT_STATS_TTL_SECS, DEFAULT_TEMP_GRACE_SECS,
    DEFAULT_TIER_TIMEOUT_MS, DEFAULT_TTL_SECS,
};
use crate::error::CacheError;

/// 缓存引擎配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// 默认TTL（秒）
    pub default_ttl_secs: u64,
    /// 单次层操作超时（毫秒）
    pub tier_timeout_ms: u64,
    /// 单层清空/清理超时（毫秒）
    pub maintenance_timeout_ms: u64,
    /// 后台清理间隔（秒）
    pub cleanup_interval_secs: u64,
    /// 统计快照发布TTL（秒）
    pub stats_ttl_secs: u64,
    /// 进程内层
    pub local: LocalTierConfig,
    /// 网络层（可选）
    pub network: Option<NetworkTierConfig>,
    /// 文件系统层
    pub filesystem: FileTierConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: DEFAULT_TTL_SECS,
            tier_timeout_ms: DEFAULT_TIER_TIMEOUT_MS,
            maintenance_timeout_ms: DEFAULT_MAINTENANCE_TIMEOUT_MS,
            cleanup_interval_secs: DEFAULT_CLEANUP_INTERVAL_SECS,
            stats_ttl_secs: DEFAULT_STATS_TTL_SECS,
            local: LocalTierConfig::default(),
            network: None,
            filesystem: FileTierConfig::default(),
        }
    }
}

/// 进程内层配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalTierConfig {
    /// 容量
    pub capacity: usize,
    /// 回填TTL（秒）
    pub backfill_ttl_secs: u64,
}

impl Default for LocalTierConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_LOCAL_CAPACITY,
            backfill_ttl_secs: DEFAULT_LOCAL_BACKFILL_TTL_SECS,
        }
    }
}

/// 网络层配置
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkTierConfig {
    /// 连接URL
    pub url: String,
    /// 键命名空间
    pub namespace: String,
    /// 数据库索引
    pub db: i64,
    /// 密码（不会被序列化输出）
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// 连接超时（毫秒）
    pub connection_timeout_ms: u64,
}

impl std::fmt::Debug for NetworkTierConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkTierConfig")
            .field("url", &self.url)
            .field("namespace", &self.namespace)
            .field("db", &self.db)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("connection_timeout_ms", &self.connection_timeout_ms)
            .finish()
    }
}

impl Default for NetworkTierConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_REDIS_URL.to_string(),
            namespace: DEFAULT_NETWORK_NAMESPACE.to_string(),
            db: 0,
            password: None,
            connection_timeout_ms: DEFAULT_CONNECTION_TIMEOUT_MS,
        }
    }
}

impl NetworkTierConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// 转换为Redis配置
    #[cfg(feature = "redis")]
    pub fn to_redis_config(&self) -> crate::redis_tier::RedisConfig {
        let mut config = crate::redis_tier::RedisConfig::new(self.url.clone())
            .db(self.db)
            .namespace(self.namespace.clone())
            .connection_timeout(Duration::from_millis(self.connection_timeout_ms));
        if let Some(password) = &self.password {
            config = config.password(password.clone());
        }
        config
    }
}

/// 文件系统层配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileTierConfig {
    /// 记录目录
    pub dir: PathBuf,
    /// 遗留临时文件保留时间（秒）
    pub temp_grace_secs: u64,
}

impl Default for FileTierConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_CACHE_DIR),
            temp_grace_secs: DEFAULT_TEMP_GRACE_SECS,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从YAML字符串解析
    pub fn from_yaml_str(content: &str) -> Result<Self, CacheError> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// 从TOML字符串解析
    pub fn from_toml_str(content: &str) -> Result<Self, CacheError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// 从JSON字符串解析
    pub fn from_json_str(content: &str) -> Result<Self, CacheError> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| CacheError::ConfigError(format!("JSON解析失败: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载，按扩展名选择格式
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content),
            Some("toml") => Self::from_toml_str(&content),
            Some("json") => Self::from_json_str(&content),
            other => Err(CacheError::ConfigError(format!(
                "不支持的配置文件格式: {:?}",
                other
            ))),
        }
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.default_ttl_secs == 0 {
            return Err(CacheError::ConfigError(
                "default_ttl_secs 必须大于0".to_string(),
            ));
        }

        if self.tier_timeout_ms == 0 {
            return Err(CacheError::ConfigError(
                "tier_timeout_ms 必须大于0".to_string(),
            ));
        }

        if self.maintenance_timeout_ms == 0 {
            return Err(CacheError::ConfigError(
                "maintenance_timeout_ms 必须大于0".to_string(),
            ));
        }

        if self.cleanup_interval_secs == 0 {
            return Err(CacheError::ConfigError(
                "cleanup_interval_secs 必须大于0".to_string(),
            ));
        }

        if self.stats_ttl_secs == 0 {
            return Err(CacheError::ConfigError(
                "stats_ttl_secs 必须大于0".to_string(),
            ));
        }

        if self.local.capacity == 0 {
            return Err(CacheError::ConfigError(
                "local.capacity 必须大于0".to_string(),
            ));
        }

        if self.local.backfill_ttl_secs == 0 {
            return Err(CacheError::ConfigError(
                "local.backfill_ttl_secs 必须大于0".to_string(),
            ));
        }

        if let Some(network) = &self.network {
            if network.url.is_empty() {
                return Err(CacheError::ConfigError("network.url 不能为空".to_string()));
            }
            // 空命名空间会让 clear 删除整个数据库
            if network.namespace.is_empty() {
                return Err(CacheError::ConfigError(
                    "network.namespace 不能为空".to_string(),
                ));
            }
            if network
                .namespace
                .chars()
                .any(|c| matches!(c, '*' | '?' | '[' | ']'))
            {
                return Err(CacheError::ConfigError(
                    "network.namespace 不能包含通配符".to_string(),
                ));
            }
        }

        if self.filesystem.dir.as_os_str().is_empty() {
            return Err(CacheError::ConfigError(
                "filesystem.dir 不能为空".to_string(),
            ));
        }

        Ok(())
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    pub fn tier_timeout(&self) -> Duration {
        Duration::from_millis(self.tier_timeout_ms)
    }

    pub fn maintenance_timeout(&self) -> Duration {
        Duration::from_millis(self.maintenance_timeout_ms)
    }

    /// 后台清理任务间隔，配合 [`CacheEngine::spawn_cleanup_task`] 使用
    ///
    /// [`CacheEngine::spawn_cleanup_task`]: crate::engine::CacheEngine::spawn_cleanup_task
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn backfill_ttl(&self) -> Duration {
        Duration::from_secs(self.local.backfill_ttl_secs)
    }

    pub fn stats_ttl(&self) -> Duration {
        Duration::from_secs(self.stats_ttl_secs)
    }

    pub fn default_ttl_secs(mut self, secs: u64) -> Self {
        self.default_ttl_secs = secs;
        self
    }

    pub fn tier_timeout_ms(mut self, ms: u64) -> Self {
        self.tier_timeout_ms = ms;
        self
    }

    pub fn maintenance_timeout_ms(mut self, ms: u64) -> Self {
        self.maintenance_timeout_ms = ms;
        self
    }

    pub fn cleanup_interval_secs(mut self, secs: u64) -> Self {
        self.cleanup_interval_secs = secs;
        self
    }

    pub fn local_capacity(mut self, capacity: usize) -> Self {
        self.local.capacity = capacity;
        self
    }

    pub fn backfill_ttl_secs(mut self, secs: u64) -> Self {
        self.local.backfill_ttl_secs = secs;
        self
    }

    pub fn network(mut self, network: NetworkTierConfig) -> Self {
        self.network = Some(network);
        self
    }

    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.filesystem.dir = dir.into();
        self
    }
}
