//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 存储层抽象
//!
//! 定义缓存条目和三级存储共用的 [`TierStore`] 接口。
//!
//! 所有层都遵循"失败即放行"约定：`get` 在任何传输或解码失败时返回 `None`，
//! `set`/`delete`/`clear` 失败时返回 `false`，错误只记录日志，不会抛给引擎。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 缓存条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// 缓存键
    pub key: String,
    /// 缓存值（引擎不解释其内容）
    pub value: serde_json::Value,
    /// 绝对过期时间（Unix 毫秒）
    pub expires_at: i64,
    /// 创建时间（Unix 毫秒，仅用于诊断）
    pub created_at: i64,
}

impl CacheEntry {
    /// 创建新的缓存条目
    pub fn new(
        key: impl Into<String>,
        value: serde_json::Value,
        created_at: i64,
        expires_at: i64,
    ) -> Self {
        Self {
            key: key.into(),
            value,
            expires_at,
            created_at,
        }
    }

    /// 检查是否过期
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }

    /// 剩余存活时间（毫秒，已过期时为0）
    pub fn remaining_millis(&self, now: i64) -> i64 {
        (self.expires_at - now).max(0)
    }

    /// 复制一份过期时间被截断到 `expires_at` 之前的条目
    pub fn with_expiry_capped(&self, expires_at: i64) -> Self {
        Self {
            expires_at: self.expires_at.min(expires_at),
            ..self.clone()
        }
    }
}

/// 存储层类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierKind {
    /// 进程内
    Local,
    /// 网络缓存
    Network,
    /// 文件系统
    Filesystem,
}

impl fmt::Display for TierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TierKind::Local => write!(f, "local"),
            TierKind::Network => write!(f, "network"),
            TierKind::Filesystem => write!(f, "filesystem"),
        }
    }
}

/// 存储层接口
#[async_trait]
pub trait TierStore: Send + Sync {
    /// 层类型
    fn kind(&self) -> TierKind;

    /// 获取条目，失败视为未命中
    async fn get(&self, key: &str) -> Option<CacheEntry>;

    /// 写入条目（使用条目自带的绝对过期时间）
    async fn set(&self, key: &str, entry: &CacheEntry) -> bool;

    /// 删除条目，键不存在也视为成功
    async fn delete(&self, key: &str) -> bool;

    /// 清空本层
    async fn clear(&self) -> bool;

    /// 清理过期条目，返回清理数量
    async fn cleanup_expired(&self, _now: i64) -> usize {
        0
    }

    /// 后端当前是否可用
    fn is_available(&self) -> bool {
        true
    }
}
