//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 文件系统缓存层
//!
//! 每个键对应一个独立的JSON记录文件，文件名为键的SHA-256十六进制摘要，
//! 因此 `clear` 和过期清理可以直接枚举目录，不需要额外索引。
//!
//! # 写入
//!
//! 先写入同目录下唯一命名的临时文件，再 `rename` 覆盖目标文件。
//! 多个进程并发写同一个键时，结果是"某一个写入者获胜"，不会读到写了一半的记录。
//! 目录没有跨进程锁。
//!
//! # 读取
//!
//! - 记录无法解码：删除该记录并视为未命中
//! - 记录已过期：删除该记录并视为未命中
//! - 记录中的键与请求的键不一致（哈希碰撞）：视为未命中

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, trace, warn};

use crate::clock::{Clock, SystemClock};
use crate::constants::{DEFAULT_TEMP_GRACE_SECS, RECORD_EXTENSION, TEMP_EXTENSION};
use crate::error::{CacheError, StorageError};
use crate::tier::{CacheEntry, TierKind, TierStore};

/// 文件系统缓存层
pub struct FileTier {
    /// 记录目录
    dir: PathBuf,
    /// 时钟
    clock: Arc<dyn Clock>,
    /// 临时文件保留时间
    temp_grace: Duration,
    /// 最近一次操作是否成功
    available: AtomicBool,
}

impl FileTier {
    /// 创建文件系统缓存层，目录不存在时自动创建
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        Self::with_clock(dir, Arc::new(SystemClock))
    }

    /// 使用指定时钟创建
    pub fn with_clock(dir: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Result<Self, CacheError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        info!("文件系统缓存层目录: {}", dir.display());

        Ok(Self {
            dir,
            clock,
            temp_grace: Duration::from_secs(DEFAULT_TEMP_GRACE_SECS),
            available: AtomicBool::new(true),
        })
    }

    /// 设置临时文件保留时间
    pub fn temp_grace(mut self, grace: Duration) -> Self {
        self.temp_grace = grace;
        self
    }

    /// 记录目录
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 键对应的记录文件路径
    pub fn record_path(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", Self::hash_key(key), RECORD_EXTENSION))
    }

    /// 键的SHA-256十六进制摘要
    fn hash_key(key: &str) -> String {
        hex::encode(Sha256::digest(key.as_bytes()))
    }

    fn temp_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!(
            "{}.{}.{}",
            Self::hash_key(key),
            uuid::Uuid::new_v4().simple(),
            TEMP_EXTENSION
        ))
    }

    fn mark(&self, ok: bool) {
        let previous = self.available.swap(ok, Ordering::Relaxed);
        if previous && !ok {
            warn!("文件系统缓存层已降级: {}", self.dir.display());
        } else if !previous && ok {
            info!("文件系统缓存层已恢复: {}", self.dir.display());
        }
    }

    async fn remove_record(path: &Path) -> Result<(), StorageError> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn try_get(&self, key: &str) -> Result<Option<CacheEntry>, StorageError> {
        let path = self.record_path(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let entry: CacheEntry = match serde_json::from_slice(&bytes) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("文件记录损坏，已删除: key={}, error={}", key, e);
                Self::remove_record(&path).await?;
                return Ok(None);
            }
        };

        if entry.key != key {
            debug!("文件记录键不一致: 请求={}, 记录={}", key, entry.key);
            return Ok(None);
        }

        if entry.is_expired(self.clock.now_millis()) {
            trace!("文件记录已过期: key={}", key);
            Self::remove_record(&path).await?;
            return Ok(None);
        }

        Ok(Some(entry))
    }

    async fn try_set(&self, key: &str, entry: &CacheEntry) -> Result<(), StorageError> {
        let payload = serde_json::to_vec(entry)?;
        let temp = self.temp_path(key);

        tokio::fs::write(&temp, &payload).await?;
        if let Err(e) = tokio::fs::rename(&temp, self.record_path(key)).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn try_clear(&self) -> Result<usize, StorageError> {
        let mut removed = 0;
        let mut dir = tokio::fs::read_dir(&self.dir).await?;
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            if is_record(&path) || is_temp(&path) {
                Self::remove_record(&path).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn try_cleanup(&self, now: i64) -> Result<usize, StorageError> {
        let mut removed = 0;
        let mut dir = tokio::fs::read_dir(&self.dir).await?;
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();

            if is_temp(&path) {
                // 只删除被遗弃的临时文件，避免与正在写入的进程冲突
                let stale = item
                    .metadata()
                    .await
                    .ok()
                    .and_then(|m| m.modified().ok())
                    .and_then(|t| SystemTime::now().duration_since(t).ok())
                    .is_some_and(|age| age >= self.temp_grace);
                if stale {
                    match Self::remove_record(&path).await {
                        Ok(()) => trace!("删除遗留临时文件: {}", path.display()),
                        Err(e) => warn!("删除遗留临时文件失败: {}, error={}", path.display(), e),
                    }
                }
                continue;
            }

            if !is_record(&path) {
                continue;
            }

            // 单个文件失败不中断扫描，已删除的数量照常返回
            let bytes = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                // 其他进程已删除
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    warn!("读取记录失败，跳过: {}, error={}", path.display(), e);
                    continue;
                }
            };

            let dead = match serde_json::from_slice::<CacheEntry>(&bytes) {
                Ok(entry) => entry.is_expired(now),
                Err(_) => true,
            };
            if dead {
                match Self::remove_record(&path).await {
                    Ok(()) => removed += 1,
                    Err(e) => warn!("删除过期记录失败，跳过: {}, error={}", path.display(), e),
                }
            }
        }
        Ok(removed)
    }
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(ext)
}

fn is_record(path: &Path) -> bool {
    has_extension(path, RECORD_EXTENSION)
}

fn is_temp(path: &Path) -> bool {
    has_extension(path, TEMP_EXTENSION)
}

#[async_trait]
impl TierStore for FileTier {
    fn kind(&self) -> TierKind {
        TierKind::Filesystem
    }

    async fn get(&self, key: &str) -> Option<CacheEntry> {
        match self.try_get(key).await {
            Ok(entry) => {
                self.mark(true);
                entry
            }
            Err(e) => {
                warn!("文件系统层读取失败: key={}, error={}", key, e);
                self.mark(false);
                None
            }
        }
    }

    async fn set(&self, key: &str, entry: &CacheEntry) -> bool {
        match self.try_set(key, entry).await {
            Ok(()) => {
                self.mark(true);
                trace!("文件系统层写入成功: key={}", key);
                true
            }
            Err(e) => {
                warn!("文件系统层写入失败: key={}, error={}", key, e);
                self.mark(false);
                false
            }
        }
    }

    async fn delete(&self, key: &str) -> bool {
        match Self::remove_record(&self.record_path(key)).await {
            Ok(()) => {
                self.mark(true);
                true
            }
            Err(e) => {
                warn!("文件系统层删除失败: key={}, error={}", key, e);
                self.mark(false);
                false
            }
        }
    }

    async fn clear(&self) -> bool {
        match self.try_clear().await {
            Ok(removed) => {
                self.mark(true);
                debug!("文件系统层已清空，删除 {} 个文件", removed);
                true
            }
            Err(e) => {
                warn!("文件系统层清空失败: error={}", e);
                self.mark(false);
                false
            }
        }
    }

    async fn cleanup_expired(&self, now: i64) -> usize {
        match self.try_cleanup(now).await {
            Ok(removed) => {
                self.mark(true);
                if removed > 0 {
                    debug!("文件系统层清理了 {} 条过期记录", removed);
                }
                removed
            }
            Err(e) => {
                warn!("文件系统层清理失败: error={}", e);
                self.mark(false);
                0
            }
        }
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }
}
