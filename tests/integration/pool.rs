//! Connection reuse through the pool manager

use crate::{get_mysql_config, new_probe, skip_if_not_enabled};
use lagprobe::pool::ConnectionState;

#[tokio::test]
async fn test_connections_are_reused() {
    skip_if_not_enabled!();

    let config = get_mysql_config();
    let (probe, manager) = new_probe();
    let target = config.target("SELECT 1");

    for _ in 0..5 {
        let result = probe.measure(&target).await;
        assert!(result.err.is_none(), "unexpected error: {:?}", result.err);
    }

    let stats = manager.stats();
    assert_eq!(stats.endpoints, 1);
    assert_eq!(stats.open_connections, 1);
    assert_eq!(stats.idle_connections, 1);
}

#[tokio::test]
async fn test_concurrent_probes_respect_max_open() {
    skip_if_not_enabled!();

    let config = get_mysql_config();
    let (probe, manager) = new_probe();
    let probe = std::sync::Arc::new(probe);
    let target = std::sync::Arc::new(config.target("SELECT SLEEP(0.05)"));

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..8 {
        let probe = probe.clone();
        let target = target.clone();
        tasks.spawn(async move { probe.measure(target.as_ref()).await });
    }
    while let Some(result) = tasks.join_next().await {
        let result = result.expect("probe task panicked");
        assert!(result.err.is_none(), "unexpected error: {:?}", result.err);
    }

    // Default limits: 3 open, 3 idle
    assert!(manager.stats().open_connections <= 3);
}

#[tokio::test]
async fn test_checked_out_connection_pings_and_closes() {
    skip_if_not_enabled!();

    let config = get_mysql_config();
    let manager = lagprobe::pool::PoolManager::default();
    let uri = format!(
        "mysql://{}:{}@{}:{}/information_schema",
        config.user, config.password, config.host, config.port
    );

    let (pool, from_cache) = manager.get_db(&uri).expect("valid uri");
    assert!(!from_cache);

    {
        let mut conn = pool.get().await.expect("connect");
        assert_eq!(conn.state(), ConnectionState::InUse);
        assert!(conn.ping().await);
    }
    assert_eq!(manager.stats().idle_connections, 1);

    manager.close_all().await;
    let stats = manager.stats();
    assert_eq!(stats.open_connections, 0);
    assert_eq!(stats.idle_connections, 0);
}
