//! Redis集成测试
//!
//! 测试Redis网络层与引擎的集成

use cacheron::{
    CacheEngine, CacheEntry, CacheStats, Clock, FileTier, RedisConfig, RedisTier, SystemClock,
    TierStore,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

async fn connect(namespace: &str) -> RedisTier {
    let config = RedisConfig::new("redis://localhost:6379").namespace(namespace);
    RedisTier::connect(config).await.unwrap()
}

/// 测试Redis连接
#[tokio::test]
#[ignore] // 需要Redis服务器运行
async fn test_redis_connection() {
    let tier = connect("cacheron-test:ping:").await;
    assert!(tier.ping().await.is_ok());
    assert!(tier.is_available());
}

/// 测试写入读取和原生TTL
#[tokio::test]
#[ignore]
async fn test_redis_set_get_ttl() {
    let tier = connect("cacheron-test:ttl:").await;
    tier.clear().await;

    let now = SystemClock.now_millis();
    let entry = CacheEntry::new("k", json!({"a": 1}), now, now + 500);
    assert!(tier.set("k", &entry).await);
    assert_eq!(tier.get("k").await, Some(entry));

    tokio::time::sleep(Duration::from_millis(700)).await;
    assert_eq!(tier.get("k").await, None);
}

/// 清空只影响本命名空间
#[tokio::test]
#[ignore]
async fn test_redis_clear_is_namespaced() {
    let a = connect("cacheron-test:a:").await;
    let b = connect("cacheron-test:b:").await;

    let now = SystemClock.now_millis();
    let entry = CacheEntry::new("k", json!(1), now, now + 60_000);
    a.set("k", &entry).await;
    b.set("k", &entry).await;

    assert!(a.clear().await);
    assert_eq!(a.get("k").await, None);
    assert!(b.get("k").await.is_some());
    b.clear().await;
}

/// 两个引擎通过Redis共享数据
#[tokio::test]
#[ignore]
async fn test_engines_share_through_redis() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    let build = |dir: &std::path::Path, network: RedisTier| {
        CacheEngine::builder()
            .network(Arc::new(network))
            .filesystem(Arc::new(FileTier::new(dir).unwrap()))
            .stats(Arc::new(CacheStats::new()))
            .tier_timeout(Duration::from_millis(500))
            .build()
            .unwrap()
    };

    let a = build(dir_a.path(), connect("cacheron-test:share:").await);
    let b = build(dir_b.path(), connect("cacheron-test:share:").await);
    a.clear().await;

    a.set("mentor:1", &"Ada", Duration::from_secs(30)).await.unwrap();
    assert_eq!(b.get("mentor:1").await.unwrap(), Some(json!("Ada")));
    assert_eq!(b.stats().network_hits, 1);
    a.clear().await;
}
