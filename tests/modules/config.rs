//! 配置加载与按配置构建引擎

use cacheron::{Availability, CacheConfig, CacheEngine, CacheError, CacheStats, NetworkTierConfig};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_engine_from_yaml_file() {
    let dir = tempfile::tempdir().unwrap();
    let cache_dir = dir.path().join("records");
    let path = dir.path().join("cache.yaml");
    std::fs::write(
        &path,
        format!(
            "default_ttl_secs: 45\ntier_timeout_ms: 500\nlocal:\n  capacity: 16\nfilesystem:\n  dir: {}\n",
            cache_dir.display()
        ),
    )
    .unwrap();

    let config = CacheConfig::from_file(&path).unwrap();
    let engine = CacheEngine::from_config(config, Arc::new(CacheStats::new()))
        .await
        .unwrap();

    assert_eq!(engine.default_ttl(), Duration::from_secs(45));
    assert!(cache_dir.is_dir());

    let value: u32 = engine
        .remember_default("answer", || async { Ok::<_, CacheError>(42u32) })
        .await
        .unwrap();
    assert_eq!(value, 42);
}

/// 网络层不可达时引擎照常创建，只是没有网络层
#[tokio::test]
async fn test_unreachable_network_falls_back() {
    let dir = tempfile::tempdir().unwrap();
    let mut network = NetworkTierConfig::new("redis://127.0.0.1:1");
    network.connection_timeout_ms = 200;
    let config = CacheConfig::default()
        .cache_dir(dir.path())
        .tier_timeout_ms(500)
        .network(network);

    let engine = CacheEngine::from_config(config, Arc::new(CacheStats::new()))
        .await
        .unwrap();

    assert!(engine.network_tier().is_none());
    assert_eq!(
        engine.stats().tier_availability.network,
        Availability::Absent
    );
    assert!(engine.set("k", &1, Duration::from_secs(5)).await.unwrap());
}

#[tokio::test]
async fn test_invalid_config_rejected() {
    let config = CacheConfig::default().tier_timeout_ms(0);
    assert!(matches!(
        CacheEngine::from_config(config, Arc::new(CacheStats::new())).await,
        Err(CacheError::ConfigError(_))
    ));
}
