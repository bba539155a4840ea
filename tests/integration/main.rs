//! Integration test entry point
//!
//! Run with: LAGPROBE_RUN_INTEGRATION_TESTS=1 cargo test --test integration
//!
//! The account must authenticate with mysql_native_password.
//!
//! Environment variables:
//! - LAGPROBE_RUN_INTEGRATION_TESTS: Set to "1" to enable integration tests
//! - LAGPROBE_TEST_MYSQL_HOST: MySQL host (default: 127.0.0.1)
//! - LAGPROBE_TEST_MYSQL_PORT: MySQL port (default: 3306)
//! - LAGPROBE_TEST_MYSQL_USER: MySQL user (default: root)
//! - LAGPROBE_TEST_MYSQL_PASS: MySQL password (default: empty)

mod pool;
mod probe;

use std::env;
use std::sync::Arc;

use lagprobe::pool::PoolManager;
use lagprobe::probe::{InstanceKey, MetricProbe, NoopTelemetry, Probe};
use mysql::{OptsBuilder, Pool, PooledConn};

/// Check if integration tests should run
pub fn should_run_integration_tests() -> bool {
    env::var("LAGPROBE_RUN_INTEGRATION_TESTS")
        .map(|v| v == "1")
        .unwrap_or(false)
}

/// Skip test if integration tests are not enabled
#[macro_export]
macro_rules! skip_if_not_enabled {
    () => {
        if !crate::should_run_integration_tests() {
            eprintln!("Skipping integration test (set LAGPROBE_RUN_INTEGRATION_TESTS=1 to run)");
            return;
        }
    };
}

/// MySQL endpoint under test
#[derive(Debug, Clone)]
pub struct MysqlTestConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

/// Get MySQL connection config from environment
pub fn get_mysql_config() -> MysqlTestConfig {
    MysqlTestConfig {
        host: env::var("LAGPROBE_TEST_MYSQL_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
        port: env::var("LAGPROBE_TEST_MYSQL_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3306),
        user: env::var("LAGPROBE_TEST_MYSQL_USER").unwrap_or_else(|_| "root".to_string()),
        password: env::var("LAGPROBE_TEST_MYSQL_PASS").unwrap_or_default(),
    }
}

impl MysqlTestConfig {
    /// Reference connection through the mysql crate
    pub fn conn(&self) -> PooledConn {
        let opts = OptsBuilder::new()
            .ip_or_hostname(Some(&self.host))
            .tcp_port(self.port)
            .user(Some(&self.user))
            .pass(Some(&self.password));
        Pool::new(opts)
            .expect("Failed to create connection pool")
            .get_conn()
            .expect("Failed to get connection")
    }

    /// Probe target for this endpoint
    pub fn target(&self, metric_query: &str) -> Probe {
        Probe::new(
            InstanceKey::new(self.host.clone(), self.port),
            self.user.clone(),
            self.password.clone(),
        )
        .with_metric_query(metric_query)
    }
}

/// Probe backed by a fresh pool manager
pub fn new_probe() -> (MetricProbe<PoolManager>, Arc<PoolManager>) {
    let manager = Arc::new(PoolManager::default());
    let probe = MetricProbe::new(manager.clone(), Arc::new(NoopTelemetry));
    (probe, manager)
}
