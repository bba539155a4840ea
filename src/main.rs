use std::sync::Arc;
use std::time::Duration;

use rand::Rng as _;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use lagprobe::config;
use lagprobe::metrics::{self, Metrics};
use lagprobe::pool::PoolManager;
use lagprobe::probe::{MetricProbe, Probe};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let config = config::load_or_default()?;

    if config.probes.is_empty() {
        warn!("No probes configured, nothing to do");
        return Ok(());
    }

    let metrics = Arc::new(Metrics::new());
    let pool_manager = Arc::new(PoolManager::new(&config.pool));
    let probe = Arc::new(MetricProbe::from_config(
        pool_manager.clone(),
        metrics.clone(),
        &config,
    ));

    info!(
        max_open = config.pool.max_open_connections,
        max_idle = config.pool.max_idle_connections,
        replica_status = ?config.probe.replica_status,
        "Probe configured"
    );

    if config.metrics.enabled {
        let addr = config.metrics.listen_addr.clone();
        let metrics = metrics.clone();
        tokio::spawn(async move {
            if let Err(e) = metrics::start_metrics_server(&addr, metrics).await {
                error!(addr = %addr, error = %e, "Metrics server failed");
            }
        });
    }

    let shutdown = CancellationToken::new();
    let interval = Duration::from_millis(config.probe.interval_ms.max(1));
    let timeout = Duration::from_millis(config.probe.timeout_ms.max(1));
    let mut tasks = JoinSet::new();

    for target in config.probes.iter().map(Probe::from) {
        let probe = probe.clone();
        let shutdown = shutdown.clone();

        info!(
            key = %target.key,
            interval_ms = interval.as_millis() as u64,
            timeout_ms = timeout.as_millis() as u64,
            "Starting probe loop"
        );

        tasks.spawn(async move {
            // Random initial delay to stagger probes (0-100% of interval)
            let initial_delay = rand::thread_rng().gen_range(0..interval.as_millis() as u64);
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = tokio::time::sleep(Duration::from_millis(initial_delay)) => {}
            }

            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let result = tokio::select! {
                            _ = shutdown.cancelled() => break,
                            result = tokio::time::timeout(timeout, probe.measure(&target)) => result,
                        };
                        match result {
                            Ok(result) => match result.get() {
                                Ok(value) => info!(key = %result.key, value = value, "Probe result"),
                                Err(e) => warn!(key = %result.key, kind = e.kind(), error = %e, "Probe failed"),
                            },
                            Err(_) => warn!(key = %target.key, timeout_ms = timeout.as_millis() as u64, "Probe timed out"),
                        }
                    }
                }
            }
        });
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    shutdown.cancel();
    while tasks.join_next().await.is_some() {}

    let stats = pool_manager.stats();
    info!(
        endpoints = stats.endpoints,
        open_connections = stats.open_connections,
        idle_connections = stats.idle_connections,
        "Probe loops stopped"
    );
    pool_manager.close_all().await;
    Ok(())
}
