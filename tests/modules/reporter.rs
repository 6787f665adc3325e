//! 统计上报集成测试

use crate::common::*;
use cacheron::{CacheEngine, CacheStats, ManualClock, StatsReporter, StatsSnapshot, TierStore};
use std::sync::Arc;
use std::time::Duration;

/// 两个工作进程共享网络层和文件系统目录
#[tokio::test]
async fn test_publish_and_aggregate_across_workers() {
    let (a, network) = test_engine();
    let shared: Arc<dyn TierStore> = network;
    let b = CacheEngine::builder()
        .network(shared)
        .filesystem(a.filesystem.clone())
        .clock(a.clock.clone())
        .stats(Arc::new(CacheStats::new()))
        .build()
        .unwrap();

    a.engine.set("k", &"v", Duration::from_secs(60)).await.unwrap();
    a.engine.get("k").await.unwrap();
    b.get("k").await.unwrap();
    b.get("k").await.unwrap();
    b.get("nope").await.unwrap();

    let reporter_a = StatsReporter::with_instance_id("a", Duration::from_secs(30));
    let reporter_b = StatsReporter::with_instance_id("b", Duration::from_secs(30));
    reporter_a.publish(&a.engine).await.unwrap();
    reporter_b.publish(&b).await.unwrap();

    let total = StatsReporter::aggregate(&b, &["a", "b"]).await.unwrap().unwrap();
    assert_eq!(total.hits, 3);
    assert_eq!(total.misses, 1);
    assert_eq!(total.hit_rate, 75.0);
    assert_eq!(total.network_hits, 1);

    // 汇总结果可以直接展示
    let text = total.to_string();
    assert!(text.contains("hit rate:      75.00%"));
}

/// 快照随TTL过期
#[tokio::test]
async fn test_published_snapshot_expires() {
    let (t, _network) = test_engine();
    let reporter = StatsReporter::with_instance_id("w1", Duration::from_secs(30));

    assert!(reporter.publish(&t.engine).await.unwrap());
    let snapshot: Option<StatsSnapshot> = t.engine.get_as("stats:w1").await.unwrap();
    assert!(snapshot.is_some());

    t.clock.advance(Duration::from_secs(31));
    assert!(StatsReporter::aggregate(&t.engine, &["w1"])
        .await
        .unwrap()
        .is_none());
}

/// 定时发布任务
#[tokio::test]
async fn test_spawn_publish_task() {
    let clock = Arc::new(ManualClock::new(START_MILLIS));
    let network = Arc::new(cacheron::SharedMemoryTier::with_clock(clock.clone()));
    let t = engine_with_network(clock, network, Duration::from_secs(1));
    let reporter = StatsReporter::with_instance_id("ticker", Duration::from_secs(600));

    let handle = reporter.spawn_publish_task(&t.engine, Duration::from_millis(50));
    tokio::time::sleep(Duration::from_millis(200)).await;
    handle.abort();

    let total = StatsReporter::aggregate(&t.engine, &["ticker"]).await.unwrap();
    assert!(total.is_some());
}
