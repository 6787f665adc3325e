//! 缓存引擎集成测试
//!
//! 覆盖读穿透回填、写穿透一致性、标签失效、降级与超时、单飞加载

use crate::common::*;
use cacheron::{Availability, CacheError, TierKind, TierStore};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Mentor {
    id: u64,
    name: String,
    skills: Vec<String>,
}

fn mentor() -> Mentor {
    Mentor {
        id: 7,
        name: "Grace".to_string(),
        skills: vec!["compilers".to_string(), "navy".to_string()],
    }
}

/// 写入后读取得到相同的值
#[tokio::test]
async fn test_round_trip() {
    let (t, _network) = test_engine();

    assert!(t
        .engine
        .set("mentor:7", &mentor(), Duration::from_secs(60))
        .await
        .unwrap());

    let cached: Option<Mentor> = t.engine.get_as("mentor:7").await.unwrap();
    assert_eq!(cached, Some(mentor()));
    assert!(t.engine.has("mentor:7").await.unwrap());
}

/// 模拟时钟推进超过TTL后未命中
#[tokio::test]
async fn test_expiry_with_simulated_clock() {
    let (t, _network) = test_engine();

    t.engine.set("k", &"v", Duration::from_secs(2)).await.unwrap();
    t.clock.advance(Duration::from_millis(1999));
    assert_eq!(t.engine.get("k").await.unwrap(), Some(json!("v")));

    t.clock.advance(Duration::from_millis(501));
    assert_eq!(t.engine.get("k").await.unwrap(), None);
}

/// 三层记录的过期时间完全一致
#[tokio::test]
async fn test_write_through_uniformity() {
    let (t, network) = test_engine();

    t.engine.set("k", &42, Duration::from_secs(90)).await.unwrap();

    let local = t.local.get("k").await.unwrap();
    let shared = network.get("k").await.unwrap();
    let file = t.filesystem.get("k").await.unwrap();

    let expected = START_MILLIS + 90_000;
    assert_eq!(local.expires_at, expected);
    assert_eq!(shared.expires_at, expected);
    assert_eq!(file.expires_at, expected);
    assert_eq!(local.value, json!(42));
    assert_eq!(shared.value, json!(42));
    assert_eq!(file.value, json!(42));
}

/// 文件系统层命中后回填网络层和本地层
#[tokio::test]
async fn test_filesystem_hit_promotes() {
    let (t, network) = test_engine();

    t.engine.set("k", &"v", Duration::from_secs(600)).await.unwrap();
    t.local.clear().await;
    network.clear().await;

    assert_eq!(t.engine.get("k").await.unwrap(), Some(json!("v")));
    assert_eq!(t.stats.tier_hits(TierKind::Filesystem), 1);

    // 网络层保留原始过期时间，本地层使用回填TTL
    assert_eq!(
        network.get("k").await.unwrap().expires_at,
        START_MILLIS + 600_000
    );
    assert_eq!(
        t.local.get("k").await.unwrap().expires_at,
        START_MILLIS + 30_000
    );

    // 再次读取命中本地层
    t.engine.get("k").await.unwrap();
    assert_eq!(t.stats.tier_hits(TierKind::Local), 1);
}

/// 标签失效删除所有成员，不影响其他键
#[tokio::test]
async fn test_tag_invalidation() {
    let (t, _network) = test_engine();
    let ttl = Duration::from_secs(60);

    t.engine
        .set_with_tags("session:a", &1, &["user:9"], ttl)
        .await
        .unwrap();
    t.engine
        .set_with_tags("session:b", &2, &["user:9", "web"], ttl)
        .await
        .unwrap();
    t.engine.set("session:c", &3, ttl).await.unwrap();

    assert!(t.engine.invalidate_tag("user:9").await.unwrap());

    assert_eq!(t.engine.get("session:a").await.unwrap(), None);
    assert_eq!(t.engine.get("session:b").await.unwrap(), None);
    assert_eq!(t.engine.get("session:c").await.unwrap(), Some(json!(3)));
    assert_eq!(t.engine.get("tag:user:9").await.unwrap(), None);

    // 另一个标签的索引仍然存在，其中的成员已不存在也没关系
    assert!(t.engine.invalidate_tag("web").await.unwrap());
}

/// 重复失效和失效不存在的标签都是安全的
#[tokio::test]
async fn test_idempotent_invalidation() {
    let (t, _network) = test_engine();

    t.engine
        .set_with_tags("k", &1, &["t"], Duration::from_secs(60))
        .await
        .unwrap();

    assert!(t.engine.invalidate_tag("t").await.unwrap());
    assert!(t.engine.invalidate_tag("t").await.unwrap());
    assert!(t.engine.invalidate_tag("never-used").await.unwrap());
    assert_eq!(t.engine.get("k").await.unwrap(), None);
}

/// 网络层不可达时仍可正常读写
#[tokio::test]
async fn test_fail_open_when_network_unreachable() {
    let clock = Arc::new(cacheron::ManualClock::new(START_MILLIS));
    let failing = Arc::new(FailingTier::new(TierKind::Network));
    let t = engine_with_network(clock, failing.clone(), Duration::from_secs(1));

    assert!(t.engine.set("k", &"v", Duration::from_secs(60)).await.unwrap());
    assert_eq!(t.engine.get("k").await.unwrap(), Some(json!("v")));

    // 本地层清空后从文件系统层读取
    t.local.clear().await;
    assert_eq!(t.engine.get("k").await.unwrap(), Some(json!("v")));
    assert_eq!(t.stats.tier_hits(TierKind::Filesystem), 1);

    assert!(t.engine.delete("k").await.unwrap());
    assert_eq!(t.engine.get("k").await.unwrap(), None);

    let stats = t.engine.stats();
    assert!(stats.tier_errors > 0);
    assert!(failing.calls() > 0);
    assert_eq!(stats.tier_availability.network, Availability::Degraded);
    assert_eq!(stats.tier_availability.filesystem, Availability::Available);
}

/// 没有网络层时引擎只使用本地层和文件系统层
#[tokio::test]
async fn test_without_network_tier() {
    let t = engine_without_network();

    t.engine.set("k", &1, Duration::from_secs(60)).await.unwrap();
    t.local.clear().await;
    assert_eq!(t.engine.get("k").await.unwrap(), Some(json!(1)));
    assert_eq!(
        t.engine.stats().tier_availability.network,
        Availability::Absent
    );
}

/// 慢速层超时降级为未命中
#[tokio::test]
async fn test_timeout_degrades_to_miss() {
    let clock = Arc::new(cacheron::ManualClock::new(START_MILLIS));
    let slow = Arc::new(SlowTier::new(Duration::from_secs(5), clock.clone()));
    let t = engine_with_network(clock, slow, Duration::from_millis(250));

    let started = std::time::Instant::now();
    assert_eq!(t.engine.get("missing").await.unwrap(), None);
    assert!(started.elapsed() < Duration::from_secs(4));

    // 写入仍然成功（文件系统层是记录系统）
    assert!(t.engine.set("k", &1, Duration::from_secs(60)).await.unwrap());

    let stats = t.engine.stats();
    assert!(stats.tier_timeouts >= 2);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.tier_availability.network, Availability::Degraded);
}

/// 清空和清理同样受超时约束
#[tokio::test]
async fn test_maintenance_calls_time_out() {
    let clock = Arc::new(cacheron::ManualClock::new(START_MILLIS));
    let slow = Arc::new(SlowTier::new(Duration::from_secs(3), clock.clone()));
    let t = engine_with_network(clock, slow, Duration::from_millis(50));

    let started = std::time::Instant::now();
    // 文件系统层清空成功，网络层超时只记录
    assert!(t.engine.clear().await);
    assert_eq!(t.engine.cleanup().await, 0);
    assert!(started.elapsed() < Duration::from_secs(2));

    let stats = t.engine.stats();
    assert!(stats.tier_timeouts >= 2);
    assert_eq!(stats.tier_availability.network, Availability::Degraded);
}

/// 3次命中+1次未命中 => 命中率75%
#[tokio::test]
async fn test_hit_rate_accounting() {
    let (t, _network) = test_engine();

    t.engine.set("k", &1, Duration::from_secs(60)).await.unwrap();
    for _ in 0..3 {
        t.engine.get("k").await.unwrap();
    }
    t.engine.get("missing").await.unwrap();

    let stats = t.engine.stats();
    assert_eq!(stats.hits, 3);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hit_rate, 75.0);
    assert_eq!(t.stats.hit_rate(), 75.0);
}

/// 损坏的文件记录在读取时被删除
#[tokio::test]
async fn test_corrupt_filesystem_record_deleted() {
    let t = engine_without_network();
    let path = t.filesystem.record_path("broken");
    std::fs::write(&path, b"{ not json").unwrap();

    assert_eq!(t.engine.get("broken").await.unwrap(), None);
    assert!(!path.exists());
}

/// 清理返回各层移除的过期条目总数
#[tokio::test]
async fn test_cleanup_counts() {
    let t = engine_without_network();

    t.engine.set("a", &1, Duration::from_secs(1)).await.unwrap();
    t.engine.set("b", &2, Duration::from_secs(1)).await.unwrap();
    t.engine.set("c", &3, Duration::from_secs(60)).await.unwrap();
    t.clock.advance(Duration::from_secs(5));

    // 本地层2条 + 文件系统层2条
    assert_eq!(t.engine.cleanup().await, 4);
    assert_eq!(t.engine.cleanup().await, 0);
    assert_eq!(t.engine.get("c").await.unwrap(), Some(json!(3)));
}

/// 参数误用返回错误
#[tokio::test]
async fn test_misuse_errors() {
    let (t, _network) = test_engine();

    assert!(matches!(
        t.engine.set("", &1, Duration::from_secs(1)).await,
        Err(CacheError::InvalidKey(_))
    ));
    assert!(matches!(
        t.engine.set("k", &1, Duration::ZERO).await,
        Err(CacheError::InvalidTtl(_))
    ));
    assert!(matches!(
        t.engine.get(&"x".repeat(4096)).await,
        Err(CacheError::InvalidKey(_))
    ));
    assert!(matches!(
        t.engine.invalidate_tag("").await,
        Err(CacheError::InvalidArgument(_))
    ));
}

/// 并发 remember 只调用一次加载器
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_remember_single_flight() {
    let (t, _network) = test_engine();
    let calls = Arc::new(AtomicU64::new(0));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let engine = t.engine.clone();
        let calls = calls.clone();
        handles.push(tokio::spawn(async move {
            engine
                .remember("mentor:7", Duration::from_secs(60), || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    Ok::<_, CacheError>(mentor())
                })
                .await
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), mentor());
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let cached: Option<Mentor> = t.engine.get_as("mentor:7").await.unwrap();
    assert_eq!(cached, Some(mentor()));
}

/// 加载者被取消时等待者收到错误，之后的调用可以重新加载
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_remember_leader_cancelled() {
    let (t, _network) = test_engine();

    let engine = t.engine.clone();
    let leader = tokio::spawn(async move {
        engine
            .remember("slow", Duration::from_secs(60), || async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok::<_, CacheError>(1u32)
            })
            .await
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let engine = t.engine.clone();
    let waiter = tokio::spawn(async move {
        engine
            .remember("slow", Duration::from_secs(60), || async {
                Ok::<_, CacheError>(2u32)
            })
            .await
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    leader.abort();
    assert!(matches!(
        waiter.await.unwrap(),
        Err(CacheError::LoaderError(_))
    ));

    let value = t
        .engine
        .remember("slow", Duration::from_secs(60), || async {
            Ok::<_, CacheError>(3u32)
        })
        .await
        .unwrap();
    assert_eq!(value, 3);
}

/// 后台清理任务定期移除过期条目
#[tokio::test]
async fn test_spawn_cleanup_task() {
    let t = engine_without_network();

    t.engine.set("a", &1, Duration::from_secs(1)).await.unwrap();
    t.clock.advance(Duration::from_secs(2));

    let handle = t.engine.spawn_cleanup_task(Duration::from_millis(50));
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(t.engine.stats().expirations, 2);
    assert!(!t.filesystem.record_path("a").exists());
    handle.abort();
}
