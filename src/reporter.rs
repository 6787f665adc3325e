//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 统计上报
//!
//! 每个进程把自己的统计快照写入 `stats:<instance_id>`，
//! 任何进程都可以读取这些快照并汇总成全局视图。

use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::CacheConfig;
use crate::constants::{DEFAULT_STATS_TTL_SECS, STATS_KEY_PREFIX};
use crate::engine::CacheEngine;
use crate::error::{validate_key, validate_ttl, CacheError};
use crate::stats::StatsSnapshot;

/// 统计上报器
#[derive(Debug, Clone)]
pub struct StatsReporter {
    /// 实例ID
    instance_id: String,
    /// 快照TTL
    ttl: Duration,
}

impl StatsReporter {
    /// 使用随机实例ID创建上报器
    pub fn new(ttl: Duration) -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
            ttl,
        }
    }

    /// 使用指定实例ID创建上报器
    pub fn with_instance_id(instance_id: impl Into<String>, ttl: Duration) -> Self {
        Self {
            instance_id: instance_id.into(),
            ttl,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.stats_ttl())
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// 发布当前进程的统计快照
    pub async fn publish(&self, engine: &CacheEngine) -> Result<bool, CacheError> {
        validate_ttl(self.ttl)?;
        let key = Self::stats_key(&self.instance_id)?;
        let snapshot = engine.stats();
        debug!("发布统计快照: key={}, hits={}", key, snapshot.hits);
        engine.set(&key, &snapshot, self.ttl).await
    }

    /// 汇总多个实例的快照
    ///
    /// 未发布或已过期的实例被跳过；一个都没有时返回 `None`。
    pub async fn aggregate(
        engine: &CacheEngine,
        instance_ids: &[impl AsRef<str>],
    ) -> Result<Option<StatsSnapshot>, CacheError> {
        let mut total: Option<StatsSnapshot> = None;

        for id in instance_ids {
            let key = Self::stats_key(id.as_ref())?;
            let Some(snapshot) = engine.peek_as::<StatsSnapshot>(&key).await else {
                debug!("实例未发布统计快照: {}", id.as_ref());
                continue;
            };
            total = Some(match total {
                Some(acc) => acc.merge(&snapshot),
                None => snapshot,
            });
        }

        Ok(total)
    }

    /// 启动定时发布任务，引擎被释放后自动退出
    pub fn spawn_publish_task(&self, engine: &Arc<CacheEngine>, interval: Duration) -> JoinHandle<()> {
        let engine: Weak<CacheEngine> = Arc::downgrade(engine);
        let reporter = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let Some(engine) = engine.upgrade() else {
                    break;
                };
                if let Err(e) = reporter.publish(&engine).await {
                    warn!("发布统计快照失败: {}", e);
                }
            }
        })
    }

    fn stats_key(instance_id: &str) -> Result<String, CacheError> {
        if instance_id.is_empty() {
            return Err(CacheError::InvalidArgument("实例ID不能为空".to_string()));
        }
        let key = format!("{}{}", STATS_KEY_PREFIX, instance_id);
        validate_key(&key)?;
        Ok(key)
    }
}

impl Default for StatsReporter {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_STATS_TTL_SECS))
    }
}
