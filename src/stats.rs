//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 缓存统计
//!
//! [`CacheStats`] 由调用方持有并在构建引擎时注入，引擎只负责累加计数。
//! 计数器自进程启动（或最近一次 [`CacheStats::reset`]）起累计。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::tier::TierKind;

/// 缓存统计信息
#[derive(Debug, Default)]
pub struct CacheStats {
    /// 命中次数
    hits: AtomicU64,
    /// 未命中次数
    misses: AtomicU64,
    /// 写入次数
    sets: AtomicU64,
    /// 删除次数
    deletes: AtomicU64,
    /// 本地层命中次数
    local_hits: AtomicU64,
    /// 网络层命中次数
    network_hits: AtomicU64,
    /// 文件系统层命中次数
    filesystem_hits: AtomicU64,
    /// 回填次数
    promotions: AtomicU64,
    /// 层操作失败次数
    tier_errors: AtomicU64,
    /// 层操作超时次数
    tier_timeouts: AtomicU64,
    /// 清理移除的过期条目数
    expirations: AtomicU64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn sets(&self) -> u64 {
        self.sets.load(Ordering::Relaxed)
    }

    pub fn deletes(&self) -> u64 {
        self.deletes.load(Ordering::Relaxed)
    }

    pub fn promotions(&self) -> u64 {
        self.promotions.load(Ordering::Relaxed)
    }

    pub fn tier_errors(&self) -> u64 {
        self.tier_errors.load(Ordering::Relaxed)
    }

    pub fn tier_timeouts(&self) -> u64 {
        self.tier_timeouts.load(Ordering::Relaxed)
    }

    pub fn expirations(&self) -> u64 {
        self.expirations.load(Ordering::Relaxed)
    }

    /// 指定层的命中次数
    pub fn tier_hits(&self, kind: TierKind) -> u64 {
        match kind {
            TierKind::Local => self.local_hits.load(Ordering::Relaxed),
            TierKind::Network => self.network_hits.load(Ordering::Relaxed),
            TierKind::Filesystem => self.filesystem_hits.load(Ordering::Relaxed),
        }
    }

    /// 命中率（百分比，无请求时为0）
    pub fn hit_rate(&self) -> f64 {
        hit_rate_percent(self.hits(), self.misses())
    }

    pub(crate) fn record_hit(&self, kind: TierKind) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        let counter = match kind {
            TierKind::Local => &self.local_hits,
            TierKind::Network => &self.network_hits,
            TierKind::Filesystem => &self.filesystem_hits,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_set(&self) {
        self.sets.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_promotion(&self) {
        self.promotions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_tier_error(&self) {
        self.tier_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_tier_timeout(&self) {
        self.tier_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_expirations(&self, count: usize) {
        self.expirations.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// 生成快照
    pub fn snapshot(&self, tier_availability: TierAvailability) -> StatsSnapshot {
        StatsSnapshot {
            hits: self.hits(),
            misses: self.misses(),
            sets: self.sets(),
            deletes: self.deletes(),
            hit_rate: self.hit_rate(),
            local_hits: self.tier_hits(TierKind::Local),
            network_hits: self.tier_hits(TierKind::Network),
            filesystem_hits: self.tier_hits(TierKind::Filesystem),
            promotions: self.promotions(),
            tier_errors: self.tier_errors(),
            tier_timeouts: self.tier_timeouts(),
            expirations: self.expirations(),
            tier_availability,
            taken_at: Utc::now(),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.hits,
            &self.misses,
            &self.sets,
            &self.deletes,
            &self.local_hits,
            &self.network_hits,
            &self.filesystem_hits,
            &self.promotions,
            &self.tier_errors,
            &self.tier_timeouts,
            &self.expirations,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

pub(crate) fn hit_rate_percent(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64 * 100.0
    }
}

/// 层可用状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    /// 可用
    Available,
    /// 已配置但当前不可达
    Degraded,
    /// 未配置
    Absent,
}

impl Availability {
    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available)
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Availability::Available => write!(f, "available"),
            Availability::Degraded => write!(f, "degraded"),
            Availability::Absent => write!(f, "absent"),
        }
    }
}

/// 各层可用状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierAvailability {
    pub local: Availability,
    pub network: Availability,
    pub filesystem: Availability,
}

impl TierAvailability {
    /// 合并两个进程的可用状态，取较差者
    fn worst(self, other: Self) -> Self {
        fn pick(a: Availability, b: Availability) -> Availability {
            use Availability::*;
            match (a, b) {
                (Degraded, _) | (_, Degraded) => Degraded,
                (Available, _) | (_, Available) => Available,
                _ => Absent,
            }
        }
        Self {
            local: pick(self.local, other.local),
            network: pick(self.network, other.network),
            filesystem: pick(self.filesystem, other.filesystem),
        }
    }
}

/// 统计快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    /// 命中率（百分比）
    pub hit_rate: f64,
    pub local_hits: u64,
    pub network_hits: u64,
    pub filesystem_hits: u64,
    pub promotions: u64,
    pub tier_errors: u64,
    pub tier_timeouts: u64,
    pub expirations: u64,
    pub tier_availability: TierAvailability,
    pub taken_at: DateTime<Utc>,
}

impl StatsSnapshot {
    /// 累加另一个快照（用于跨进程汇总）
    pub fn merge(&self, other: &StatsSnapshot) -> StatsSnapshot {
        let hits = self.hits + other.hits;
        let misses = self.misses + other.misses;
        StatsSnapshot {
            hits,
            misses,
            sets: self.sets + other.sets,
            deletes: self.deletes + other.deletes,
            hit_rate: hit_rate_percent(hits, misses),
            local_hits: self.local_hits + other.local_hits,
            network_hits: self.network_hits + other.network_hits,
            filesystem_hits: self.filesystem_hits + other.filesystem_hits,
            promotions: self.promotions + other.promotions,
            tier_errors: self.tier_errors + other.tier_errors,
            tier_timeouts: self.tier_timeouts + other.tier_timeouts,
            expirations: self.expirations + other.expirations,
            tier_availability: self.tier_availability.worst(other.tier_availability),
            taken_at: self.taken_at.max(other.taken_at),
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "hits:          {}", self.hits)?;
        writeln!(f, "misses:        {}", self.misses)?;
        writeln!(f, "hit rate:      {:.2}%", self.hit_rate)?;
        writeln!(f, "sets:          {}", self.sets)?;
        writeln!(f, "deletes:       {}", self.deletes)?;
        writeln!(
            f,
            "tier hits:     local={} network={} filesystem={}",
            self.local_hits, self.network_hits, self.filesystem_hits
        )?;
        writeln!(f, "promotions:    {}", self.promotions)?;
        writeln!(
            f,
            "tier failures: errors={} timeouts={}",
            self.tier_errors, self.tier_timeouts
        )?;
        writeln!(f, "expirations:   {}", self.expirations)?;
        write!(
            f,
            "availability:  local={} network={} filesystem={}",
            self.tier_availability.local,
            self.tier_availability.network,
            self.tier_availability.filesystem
        )
    }
}
