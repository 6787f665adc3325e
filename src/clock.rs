//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 时钟抽象
//!
//! 缓存条目和限流窗口都以 Unix 毫秒时间戳记录绝对时间。通过注入 [`Clock`]，
//! 测试可以用 [`ManualClock`] 模拟时间流逝，而不必真实等待。

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

/// 时钟接口
pub trait Clock: Send + Sync {
    /// 当前时间（Unix 毫秒）
    fn now_millis(&self) -> i64;
}

/// 系统时钟
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// 手动时钟
///
/// 时间只会在调用 [`ManualClock::advance`] 或 [`ManualClock::set`] 时改变。
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    /// 从指定毫秒时间戳开始
    pub fn new(start_millis: i64) -> Self {
        Self {
            now: AtomicI64::new(start_millis),
        }
    }

    /// 从当前系统时间开始
    pub fn starting_now() -> Self {
        Self::new(SystemClock.now_millis())
    }

    /// 推进时间
    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(duration_millis(by), Ordering::SeqCst);
    }

    /// 设置当前时间
    pub fn set(&self, millis: i64) {
        self.now.store(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// 把 Duration 转成毫秒（饱和到 i64::MAX）
pub(crate) fn duration_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
