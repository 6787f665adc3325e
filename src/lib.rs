//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! Cacheron - Tiered Cache and Rate Limiting
//!
//! A three-tier read-through/write-through cache (process-local LRU, shared
//! networked cache, filesystem) with tag-based invalidation, plus a
//! sliding-window rate limiter that stores its windows in the same cache.
//!
//! # API Layers
//!
//! ## Prelude (Quick Start)
//!
//! Use `use cacheron::prelude::*;` to import all commonly used types.
//!
//! ## Core API
//!
//! - [`CacheEngine`] - Tier orchestration: get/set/delete/tags/remember
//! - [`RateLimiter`] - Sliding-window request counting on top of the engine
//! - [`StatsReporter`] - Cross-process statistics publishing
//! - [`CacheConfig`] - Configuration loaded from YAML, TOML or JSON
//! - [`CacheError`] - Caller-visible error type
//!
//! ## Tiers
//!
//! Every backing store implements [`TierStore`]. Tier failures never surface
//! as errors: reads degrade to a miss and writes become best-effort.
//!
//! - [`LocalTier`] - Per-process LRU
//! - [`SharedMemoryTier`] - In-process stand-in for the networked tier
//! - `RedisTier` - Networked tier (requires `redis` feature)
//! - [`FileTier`] - Filesystem tier, the system of record
//!
//! ## Extensions (feature-gated)
//!
//! - Redis networked tier (requires `redis` feature)
//! - Tracing subscriber setup (requires `telemetry` feature)
//! - Prometheus metrics (requires `monitoring` feature)
//!
//! # Examples
//!
//! ```rust,no_run
//! use cacheron::prelude::*;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), CacheError> {
//!     let stats = Arc::new(CacheStats::new());
//!     let engine = Arc::new(CacheEngine::from_config(CacheConfig::default(), stats).await?);
//!
//!     engine
//!         .set_with_tags("mentor:1", &"Grace", &["mentors"], Duration::from_secs(300))
//!         .await?;
//!     engine.invalidate_tag("mentors").await?;
//!
//!     let limiter = RateLimiter::new(Arc::clone(&engine));
//!     let allowed = limiter
//!         .check_and_record("user-7", "login", 5, Duration::from_secs(60))
//!         .await?;
//!     assert!(allowed);
//!     Ok(())
//! }
//! ```

pub mod prelude;

pub mod clock;
pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod file_tier;
pub mod local_tier;
pub mod memory_tier;
pub mod rate_limiter;
#[cfg(feature = "redis")]
pub mod redis_tier;
pub mod reporter;
pub mod stats;
#[cfg(any(feature = "telemetry", feature = "monitoring"))]
pub mod telemetry;
pub mod tier;

// 重新导出常用类型
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheConfig, FileTierConfig, LocalTierConfig, NetworkTierConfig};
pub use engine::{CacheEngine, CacheEngineBuilder};
pub use error::{CacheError, StorageError};
pub use file_tier::FileTier;
pub use local_tier::LocalTier;
pub use memory_tier::SharedMemoryTier;
pub use rate_limiter::{RateLimitStatus, RateLimiter, RateWindow};
#[cfg(feature = "redis")]
pub use redis_tier::{RedisConfig, RedisTier};
pub use reporter::StatsReporter;
pub use stats::{Availability, CacheStats, StatsSnapshot, TierAvailability};
#[cfg(feature = "telemetry")]
pub use telemetry::init_tracing;
#[cfg(feature = "monitoring")]
pub use telemetry::CacheMetrics;
pub use tier::{CacheEntry, TierKind, TierStore};

pub use serde_json::Value;
