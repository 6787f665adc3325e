//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! Prelude module - Commonly used types for quick imports
//!
//! This module re-exports the most commonly used types from Cacheron,
//! allowing users to import them with a single `use cacheron::prelude::*;`
//! statement instead of importing each type individually.

// Core types - always available
pub use crate::config::CacheConfig;
pub use crate::engine::{CacheEngine, CacheEngineBuilder};
pub use crate::error::CacheError;
pub use crate::stats::{CacheStats, StatsSnapshot};

// Rate limiting
pub use crate::rate_limiter::{RateLimitStatus, RateLimiter, RateWindow};
pub use crate::reporter::StatsReporter;

// Tiers
pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::file_tier::FileTier;
pub use crate::local_tier::LocalTier;
pub use crate::memory_tier::SharedMemoryTier;
pub use crate::tier::{CacheEntry, TierKind, TierStore};

// Feature-gated exports
#[cfg(feature = "redis")]
pub use crate::redis_tier::{RedisConfig, RedisTier};

#[cfg(feature = "monitoring")]
pub use crate::telemetry::CacheMetrics;
