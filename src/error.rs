//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 错误类型定义
//!
//! 使用thiserror定义所有错误类型。
//!
//! 缓存层的约定：后端不可用、存储值损坏都在层内恢复（降级为未命中或尽力写入），
//! 只有调用方误用（空键、零TTL等）才会以 [`CacheError`] 的形式返回给调用方。

use thiserror::Error;

/// 缓存错误类型（对调用方可见）
#[derive(Error, Debug)]
pub enum CacheError {
    /// 非法键
    #[error("非法键: {0}")]
    InvalidKey(String),

    /// 非法TTL
    #[error("非法TTL: {0}")]
    InvalidTtl(String),

    /// 非法参数
    #[error("非法参数: {0}")]
    InvalidArgument(String),

    /// 配置错误
    #[error("配置错误: {0}")]
    ConfigError(String),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    SerdeError(#[from] serde_json::Error),

    /// IO错误（仅在构建阶段出现）
    #[error("IO错误: {0}")]
    IoError(#[from] std::io::Error),

    /// 加载器错误
    #[error("加载器错误: {0}")]
    LoaderError(String),
}

impl From<serde_yaml::Error> for CacheError {
    fn from(err: serde_yaml::Error) -> Self {
        CacheError::ConfigError(format!("YAML解析失败: {}", err))
    }
}

impl From<toml::de::Error> for CacheError {
    fn from(err: toml::de::Error) -> Self {
        CacheError::ConfigError(format!("TOML解析失败: {}", err))
    }
}

/// 存储错误
///
/// 仅在层实现内部使用，不会越过 [`TierStore`](crate::tier::TierStore) 边界。
#[derive(Error, Debug, Clone)]
pub enum StorageError {
    /// 连接错误
    #[error("连接错误: {0}")]
    ConnectionError(String),

    /// 查询错误
    #[error("查询错误: {0}")]
    QueryError(String),

    /// 超时错误
    #[error("超时错误: {0}")]
    TimeoutError(String),

    /// 未找到
    #[error("未找到: {0}")]
    NotFound(String),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    SerializationError(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound(err.to_string()),
            std::io::ErrorKind::TimedOut => StorageError::TimeoutError(err.to_string()),
            _ => StorageError::QueryError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::SerializationError(err.to_string())
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for StorageError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() {
            StorageError::TimeoutError(err.to_string())
        } else if err.is_connection_dropped() || err.is_connection_refusal() || err.is_io_error() {
            StorageError::ConnectionError(err.to_string())
        } else {
            StorageError::QueryError(err.to_string())
        }
    }
}

/// 校验缓存键
pub(crate) fn validate_key(key: &str) -> Result<(), CacheError> {
    if key.is_empty() {
        return Err(CacheError::InvalidKey("键不能为空".to_string()));
    }

    if key.len() > crate::constants::MAX_KEY_LENGTH {
        return Err(CacheError::InvalidKey(format!(
            "键长度超过限制（最大 {} 字符）",
            crate::constants::MAX_KEY_LENGTH
        )));
    }

    if key.contains('\0') {
        return Err(CacheError::InvalidKey("键包含非法字符".to_string()));
    }

    Ok(())
}

/// 校验TTL
pub(crate) fn validate_ttl(ttl: std::time::Duration) -> Result<(), CacheError> {
    if ttl.is_zero() {
        return Err(CacheError::InvalidTtl("TTL必须大于零".to_string()));
    }
    Ok(())
}
