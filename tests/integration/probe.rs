//! MetricProbe against a live server, checked with the mysql crate

use crate::{get_mysql_config, new_probe, skip_if_not_enabled};
use lagprobe::probe::{InstanceKey, Probe, ProbeError};
use mysql::prelude::*;

#[tokio::test]
async fn test_select_metric() {
    skip_if_not_enabled!();

    let config = get_mysql_config();
    let (probe, _) = new_probe();

    let result = probe.measure(&config.target("SELECT 42")).await;
    assert!(result.err.is_none(), "unexpected error: {:?}", result.err);
    assert_eq!(result.value, 42.0);
}

#[tokio::test]
async fn test_show_global_metric_matches_server() {
    skip_if_not_enabled!();

    let config = get_mysql_config();
    let (probe, _) = new_probe();

    let result = probe
        .measure(&config.target("show global variables like 'max_connections'"))
        .await;
    assert!(result.err.is_none(), "unexpected error: {:?}", result.err);

    let mut conn = config.conn();
    let expected: Option<u64> = conn
        .query_first("SELECT @@global.max_connections")
        .expect("SELECT @@max_connections should succeed");
    assert_eq!(Some(result.value as u64), expected);
}

#[tokio::test]
async fn test_replication_lag_matches_server() {
    skip_if_not_enabled!();

    let config = get_mysql_config();
    let (probe, _) = new_probe();

    let mut conn = config.conn();
    let rows: Vec<mysql::Row> = conn
        .query("SHOW SLAVE STATUS")
        .expect("SHOW SLAVE STATUS should succeed");

    let result = probe.measure(&config.target("")).await;

    match rows.last() {
        None => assert!(matches!(
            result.err,
            Some(ProbeError::ReplicationNotConfigured(_))
        )),
        Some(row) => {
            let lag: Option<Option<i64>> = row.get("Seconds_Behind_Master");
            match lag.flatten() {
                Some(_) => assert!(result.err.is_none(), "unexpected error: {:?}", result.err),
                None => assert!(matches!(
                    result.err,
                    Some(ProbeError::ReplicationNotRunning { .. })
                )),
            }
        }
    }
}

#[tokio::test]
async fn test_server_error_is_reported() {
    skip_if_not_enabled!();

    let config = get_mysql_config();
    let (probe, _) = new_probe();

    let result = probe
        .measure(&config.target("SELECT no_such_column FROM information_schema.tables"))
        .await;
    assert!(matches!(result.err, Some(ProbeError::Query(_))));
    assert_eq!(result.value, 0.0);
}

#[tokio::test]
async fn test_wrong_password_is_connection_error() {
    skip_if_not_enabled!();

    let config = get_mysql_config();
    let (probe, _) = new_probe();

    let target = Probe::new(
        InstanceKey::new(config.host.clone(), config.port),
        config.user.clone(),
        format!("{}-wrong", config.password),
    )
    .with_metric_query("SELECT 1");

    let result = probe.measure(&target).await;
    assert!(matches!(result.err, Some(ProbeError::Connection(_))));
}
