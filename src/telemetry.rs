//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 日志与监控
//!
//! - `telemetry` 特性: [`init_tracing`] 安装 `tracing-subscriber` 日志输出
//! - `monitoring` 特性: [`CacheMetrics`] 把统计快照导出为Prometheus指标
//!
//! # 示例
//!
//! ```ignore
//! use cacheron::telemetry::{init_tracing, CacheMetrics};
//!
//! init_tracing("cacheron=debug")?;
//!
//! let metrics = CacheMetrics::new()?;
//! metrics.observe(&engine.stats());
//! println!("{}", metrics.gather());
//! ```

#[cfg(feature = "telemetry")]
use crate::error::CacheError;

/// 初始化日志输出
///
/// `RUST_LOG` 环境变量优先于传入的过滤规则。重复初始化返回错误。
#[cfg(feature = "telemetry")]
pub fn init_tracing(filter: &str) -> Result<(), CacheError> {
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .map_err(|e| CacheError::ConfigError(format!("无效的日志过滤规则: {}", e)))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init()
        .map_err(|e| CacheError::ConfigError(format!("日志初始化失败: {}", e)))?;

    tracing::info!("日志已初始化: filter={}", filter);
    Ok(())
}

#[cfg(feature = "monitoring")]
pub use metrics::CacheMetrics;

#[cfg(feature = "monitoring")]
mod metrics {
    use prometheus::{Encoder, Gauge, GaugeVec, Opts, Registry, TextEncoder};
    use tracing::error;

    use crate::error::CacheError;
    use crate::stats::{Availability, StatsSnapshot};

    /// 缓存监控指标
    ///
    /// 指标是快照的镜像，由调用方定期 [`CacheMetrics::observe`]。
    #[derive(Clone)]
    pub struct CacheMetrics {
        pub hits: Gauge,
        pub misses: Gauge,
        pub hit_rate: Gauge,
        pub sets: Gauge,
        pub deletes: Gauge,
        pub promotions: Gauge,
        pub tier_errors: Gauge,
        pub tier_timeouts: Gauge,
        pub expirations: Gauge,
        /// 各层命中次数，label: tier
        pub tier_hits: GaugeVec,
        /// 各层是否可用（1/0），label: tier
        pub tier_available: GaugeVec,
        /// 指标注册表
        registry: Registry,
    }

    fn map_err(e: prometheus::Error) -> CacheError {
        CacheError::ConfigError(format!("注册指标失败: {}", e))
    }

    fn gauge(registry: &Registry, name: &str, help: &str) -> Result<Gauge, CacheError> {
        let gauge = Gauge::with_opts(Opts::new(name, help)).map_err(map_err)?;
        registry.register(Box::new(gauge.clone())).map_err(map_err)?;
        Ok(gauge)
    }

    fn gauge_vec(registry: &Registry, name: &str, help: &str) -> Result<GaugeVec, CacheError> {
        let gauge = GaugeVec::new(Opts::new(name, help), &["tier"]).map_err(map_err)?;
        registry.register(Box::new(gauge.clone())).map_err(map_err)?;
        Ok(gauge)
    }

    impl CacheMetrics {
        pub fn new() -> Result<Self, CacheError> {
            Self::with_registry(Registry::new())
        }

        /// 在已有注册表上注册指标
        pub fn with_registry(registry: Registry) -> Result<Self, CacheError> {
            Ok(Self {
                hits: gauge(&registry, "cacheron_hits", "Cache hits since start")?,
                misses: gauge(&registry, "cacheron_misses", "Cache misses since start")?,
                hit_rate: gauge(
                    &registry,
                    "cacheron_hit_rate_percent",
                    "Hit rate as percentage (0-100)",
                )?,
                sets: gauge(&registry, "cacheron_sets", "Write-through sets since start")?,
                deletes: gauge(&registry, "cacheron_deletes", "Deletes since start")?,
                promotions: gauge(
                    &registry,
                    "cacheron_promotions",
                    "Backfills into faster tiers",
                )?,
                tier_errors: gauge(&registry, "cacheron_tier_errors", "Failed tier calls")?,
                tier_timeouts: gauge(
                    &registry,
                    "cacheron_tier_timeouts",
                    "Tier calls that exceeded the timeout",
                )?,
                expirations: gauge(
                    &registry,
                    "cacheron_expirations",
                    "Expired entries removed by cleanup",
                )?,
                tier_hits: gauge_vec(&registry, "cacheron_tier_hits", "Hits served per tier")?,
                tier_available: gauge_vec(
                    &registry,
                    "cacheron_tier_available",
                    "Whether a tier is reachable (1) or not (0)",
                )?,
                registry,
            })
        }

        /// 用快照更新指标
        pub fn observe(&self, snapshot: &StatsSnapshot) {
            self.hits.set(snapshot.hits as f64);
            self.misses.set(snapshot.misses as f64);
            self.hit_rate.set(snapshot.hit_rate);
            self.sets.set(snapshot.sets as f64);
            self.deletes.set(snapshot.deletes as f64);
            self.promotions.set(snapshot.promotions as f64);
            self.tier_errors.set(snapshot.tier_errors as f64);
            self.tier_timeouts.set(snapshot.tier_timeouts as f64);
            self.expirations.set(snapshot.expirations as f64);

            let availability = &snapshot.tier_availability;
            for (tier, hits, state) in [
                ("local", snapshot.local_hits, availability.local),
                ("network", snapshot.network_hits, availability.network),
                ("filesystem", snapshot.filesystem_hits, availability.filesystem),
            ] {
                self.tier_hits.with_label_values(&[tier]).set(hits as f64);
                let up = if state == Availability::Available { 1.0 } else { 0.0 };
                self.tier_available.with_label_values(&[tier]).set(up);
            }
        }

        /// 导出Prometheus文本格式
        pub fn gather(&self) -> String {
            let encoder = TextEncoder::new();
            let metric_families = self.registry.gather();
            let mut buffer = Vec::new();
            if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
                error!("Failed to encode metrics: {}", e);
                return String::new();
            }
            String::from_utf8(buffer).unwrap_or_default()
        }

        pub fn registry(&self) -> &Registry {
            &self.registry
        }
    }

}
