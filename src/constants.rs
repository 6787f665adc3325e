//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! Centralized configuration constants for Cacheron.
//!
//! This module provides well-documented constants used throughout the library.
//! All magic numbers are defined here with their purpose and usage context.

// ============================================================================
// Key Constants
// ============================================================================

/// Maximum accepted key length in bytes.
///
/// Keys longer than this are rejected as caller misuse before any tier is touched.
pub const MAX_KEY_LENGTH: usize = 1024;

/// Prefix of tag index keys.
///
/// A tag index for `users` lives at `tag:users`.
pub const TAG_KEY_PREFIX: &str = "tag:";

/// Prefix of rate window keys.
///
/// A window for action `login` and identifier `10.0.0.1` lives at `rate:login:10.0.0.1`.
pub const RATE_KEY_PREFIX: &str = "rate:";

/// Prefix of published statistics snapshots.
pub const STATS_KEY_PREFIX: &str = "stats:";

// ============================================================================
// Engine Constants
// ============================================================================

/// Default TTL used by [`CacheEngine::remember`] and config defaults (5 minutes).
///
/// [`CacheEngine::remember`]: crate::engine::CacheEngine::remember
pub const DEFAULT_TTL_SECS: u64 = 300;

/// Default timeout applied to every individual tier call (50 milliseconds).
///
/// An unreachable networked tier degrades to a miss within this bound.
pub const DEFAULT_TIER_TIMEOUT_MS: u64 = 50;

/// Default timeout for a single tier's `clear` or `cleanup` call (5 seconds).
///
/// Scanning a whole namespace or record directory takes longer than a per-key call.
pub const DEFAULT_MAINTENANCE_TIMEOUT_MS: u64 = 5_000;

/// Default cleanup interval for the background maintenance task (1 minute).
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 60;

// ============================================================================
// Local Tier Constants
// ============================================================================

/// Default capacity of the process-local tier.
///
/// Represents 10,000 cache entries; least recently used entries are evicted beyond it.
pub const DEFAULT_LOCAL_CAPACITY: usize = 10_000;

/// Default TTL for local-tier backfills after a slower-tier hit (1 minute).
///
/// The local tier is a short-lived accelerator; a backfill never outlives the
/// entry's own absolute expiry.
pub const DEFAULT_LOCAL_BACKFILL_TTL_SECS: u64 = 60;

// ============================================================================
// Networked Tier Constants
// ============================================================================

/// Default Redis URL.
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Default namespace prepended to every networked-tier key.
pub const DEFAULT_NETWORK_NAMESPACE: &str = "cacheron:";

/// Default connection timeout for the networked tier (2 seconds).
pub const DEFAULT_CONNECTION_TIMEOUT_MS: u64 = 2_000;

/// Number of keys requested per `SCAN` round trip when clearing a namespace.
pub const REDIS_SCAN_BATCH: usize = 500;

// ============================================================================
// Filesystem Tier Constants
// ============================================================================

/// Default directory for filesystem records.
pub const DEFAULT_CACHE_DIR: &str = "./cache";

/// Extension of filesystem records.
pub const RECORD_EXTENSION: &str = "json";

/// Extension of in-flight temporary files.
pub const TEMP_EXTENSION: &str = "tmp";

/// Age after which an orphaned temporary file is removed by cleanup (5 minutes).
///
/// Temporary files are left behind only when a writer is abandoned mid-write.
pub const DEFAULT_TEMP_GRACE_SECS: u64 = 300;

// ============================================================================
// Stats Constants
// ============================================================================

/// Default TTL of published statistics snapshots (5 minutes).
pub const DEFAULT_STATS_TTL_SECS: u64 = 300;
