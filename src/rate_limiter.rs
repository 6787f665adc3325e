//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 滑动窗口限流器
//!
//! 请求时间戳列表存放在缓存引擎中（键为 `rate:<action>:<identifier>`），
//! 所有共享网络层或文件系统层的工作进程看到的是同一个窗口。
//!
//! 窗口是半开区间 `(now - window, now]`：满足 `now - ts >= window` 的时间戳被剔除。
//! 被拒绝的请求不会被记录。
//!
//! 读-改-写不是原子的，多个进程并发时可能多放行少量请求。

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

use crate::clock::{duration_millis, Clock};
use crate::constants::RATE_KEY_PREFIX;
use crate::engine::CacheEngine;
use crate::error::CacheError;

/// 单个限流窗口
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateWindow {
    /// 窗口标签（区分同一动作下的多个窗口）
    pub label: String,
    /// 窗口内最大请求数
    pub limit: u64,
    /// 窗口大小
    pub window: Duration,
}

impl RateWindow {
    pub fn new(label: impl Into<String>, limit: u64, window: Duration) -> Self {
        Self {
            label: label.into(),
            limit,
            window,
        }
    }

    /// 每秒窗口
    pub fn per_second(limit: u64) -> Self {
        Self::new("second", limit, Duration::from_secs(1))
    }

    /// 每分钟窗口
    pub fn per_minute(limit: u64) -> Self {
        Self::new("minute", limit, Duration::from_secs(60))
    }

    /// 每小时窗口
    pub fn per_hour(limit: u64) -> Self {
        Self::new("hour", limit, Duration::from_secs(3600))
    }
}

/// 限流状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitStatus {
    /// 下一次请求是否会被放行
    pub allowed: bool,
    /// 窗口内已记录的请求数
    pub current: u64,
    /// 剩余可用次数
    pub remaining: u64,
    /// 达到上限时，最早的请求离开窗口还需等待的时间
    pub retry_after: Option<Duration>,
}

/// 滑动窗口限流器
pub struct RateLimiter {
    /// 缓存引擎
    cache: Arc<CacheEngine>,
    /// 时钟
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// 创建限流器，使用引擎的时钟
    pub fn new(cache: Arc<CacheEngine>) -> Self {
        let clock = Arc::clone(cache.clock());
        Self { cache, clock }
    }

    /// 使用指定时钟创建限流器
    pub fn with_clock(cache: Arc<CacheEngine>, clock: Arc<dyn Clock>) -> Self {
        Self { cache, clock }
    }

    /// 检查并记录一次请求
    ///
    /// # 返回
    /// - `Ok(true)`: 放行，并已记录本次请求
    /// - `Ok(false)`: 已达上限，未记录
    pub async fn check_and_record(
        &self,
        identifier: &str,
        action: &str,
        limit: u64,
        window: Duration,
    ) -> Result<bool, CacheError> {
        validate_window(window)?;
        let key = window_key(identifier, action, None)?;
        let now = self.clock.now_millis();

        let mut timestamps = self.load(&key, now, window).await?;
        if timestamps.len() as u64 >= limit {
            trace!("限流拒绝: key={}, current={}, limit={}", key, timestamps.len(), limit);
            return Ok(false);
        }

        timestamps.push(now);
        self.store(&key, &timestamps, window).await?;
        Ok(true)
    }

    /// 查询当前限流状态（不记录请求）
    pub async fn status(
        &self,
        identifier: &str,
        action: &str,
        limit: u64,
        window: Duration,
    ) -> Result<RateLimitStatus, CacheError> {
        validate_window(window)?;
        let key = window_key(identifier, action, None)?;
        let now = self.clock.now_millis();

        let timestamps = self.load(&key, now, window).await?;
        let current = timestamps.len() as u64;
        let allowed = current < limit;

        // limit 为0时永远不会放行
        let retry_after = if allowed || limit == 0 {
            None
        } else {
            // 需要腾出 current - limit + 1 个位置
            timestamps.get((current - limit) as usize).map(|ts| {
                let wait = ts
                    .saturating_add(duration_millis(window))
                    .saturating_sub(now)
                    .max(0);
                Duration::from_millis(wait as u64)
            })
        };

        Ok(RateLimitStatus {
            allowed,
            current,
            remaining: limit.saturating_sub(current),
            retry_after,
        })
    }

    /// 多窗口检查（所有窗口都放行才放行）
    ///
    /// 先检查所有窗口，全部放行后才在每个窗口中记录本次请求。
    pub async fn check_all(
        &self,
        identifier: &str,
        action: &str,
        windows: &[RateWindow],
    ) -> Result<bool, CacheError> {
        if windows.is_empty() {
            return Err(CacheError::InvalidArgument("至少需要一个限流窗口".to_string()));
        }

        let now = self.clock.now_millis();
        let mut pending = Vec::with_capacity(windows.len());

        for window in windows {
            validate_window(window.window)?;
            if window.label.is_empty() {
                return Err(CacheError::InvalidArgument("窗口标签不能为空".to_string()));
            }
            let key = window_key(identifier, action, Some(&window.label))?;
            let timestamps = self.load(&key, now, window.window).await?;

            if timestamps.len() as u64 >= window.limit {
                debug!(
                    "多窗口限流拒绝: identifier={}, action={}, window={}",
                    identifier, action, window.label
                );
                return Ok(false);
            }
            pending.push((key, timestamps, window.window));
        }

        for (key, mut timestamps, window) in pending {
            timestamps.push(now);
            self.store(&key, &timestamps, window).await?;
        }

        Ok(true)
    }

    /// 重置窗口
    pub async fn reset(&self, identifier: &str, action: &str) -> Result<bool, CacheError> {
        let key = window_key(identifier, action, None)?;
        debug!("重置限流窗口: key={}", key);
        self.cache.delete(&key).await
    }

    /// 读取并剔除窗口外的时间戳
    async fn load(&self, key: &str, now: i64, window: Duration) -> Result<Vec<i64>, CacheError> {
        let window_ms = duration_millis(window);
        let mut timestamps: Vec<i64> = self.cache.get_as(key).await?.unwrap_or_default();
        timestamps.retain(|ts| now - ts < window_ms);
        timestamps.sort_unstable();
        Ok(timestamps)
    }

    async fn store(&self, key: &str, timestamps: &[i64], window: Duration) -> Result<(), CacheError> {
        self.cache.set(key, timestamps, window).await?;
        Ok(())
    }
}

fn validate_window(window: Duration) -> Result<(), CacheError> {
    if window.is_zero() {
        return Err(CacheError::InvalidArgument("限流窗口必须大于0".to_string()));
    }
    Ok(())
}

fn window_key(identifier: &str, action: &str, label: Option<&str>) -> Result<String, CacheError> {
    if identifier.is_empty() {
        return Err(CacheError::InvalidArgument("标识符不能为空".to_string()));
    }
    if action.is_empty() {
        return Err(CacheError::InvalidArgument("动作不能为空".to_string()));
    }
    Ok(match label {
        Some(label) => format!("{}{}:{}:{}", RATE_KEY_PREFIX, action, label, identifier),
        None => format!("{}{}:{}", RATE_KEY_PREFIX, action, identifier),
    })
}
