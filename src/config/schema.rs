use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Prometheus endpoint
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// Connection pool settings applied to every endpoint
    #[serde(default)]
    pub pool: PoolConfig,
    /// Probe behaviour shared by all targets
    #[serde(default)]
    pub probe: ProbeSettings,
    /// Targets to probe
    #[serde(default)]
    pub probes: Vec<ProbeConfig>,
}

// ============================================================================
// Metrics Endpoint Configuration
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_listen_addr")]
    pub listen_addr: String,
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_metrics_listen_addr() -> String {
    "127.0.0.1:9104".to_string()
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            listen_addr: default_metrics_listen_addr(),
        }
    }
}

// ============================================================================
// Pool Configuration
// ============================================================================

/// Pool sizing, applied once when an endpoint pool is first created
#[derive(Debug, Clone, Deserialize)]
pub struct PoolConfig {
    /// Maximum open connections per endpoint
    #[serde(default = "default_max_open_connections")]
    pub max_open_connections: usize,
    /// Maximum idle connections kept per endpoint
    #[serde(default = "default_max_idle_connections")]
    pub max_idle_connections: usize,
    /// Idle connections older than this are discarded (milliseconds)
    #[serde(default = "default_max_idle_time_ms")]
    pub max_idle_time_ms: u64,
    /// TCP connect timeout when the URI has none (milliseconds)
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_max_open_connections() -> usize {
    3
}

fn default_max_idle_connections() -> usize {
    3
}

fn default_max_idle_time_ms() -> u64 {
    300_000
}

fn default_connect_timeout_ms() -> u64 {
    1000
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_open_connections: default_max_open_connections(),
            max_idle_connections: default_max_idle_connections(),
            max_idle_time_ms: default_max_idle_time_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

// ============================================================================
// Probe Configuration
// ============================================================================

/// Which replica status statement the default probe runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReplicaStatusSyntax {
    /// `SHOW SLAVE STATUS` (MySQL < 8.0.22, MariaDB)
    #[default]
    Slave,
    /// `SHOW REPLICA STATUS` (MySQL >= 8.0.22)
    Replica,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProbeSettings {
    /// Interval between probes of one target (milliseconds)
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Upper bound the runner puts on one probe (milliseconds)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Schema the probe connects to
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default)]
    pub replica_status: ReplicaStatusSyntax,
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_schema() -> String {
    "information_schema".to_string()
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            timeout_ms: default_timeout_ms(),
            schema: default_schema(),
            replica_status: ReplicaStatusSyntax::default(),
        }
    }
}

/// One MySQL endpoint to probe
#[derive(Debug, Clone, Deserialize)]
pub struct ProbeConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    #[serde(default)]
    pub password: String,
    /// Empty means replication lag via replica status
    #[serde(default)]
    pub metric_query: String,
    /// Per-target connect timeout, overrides the pool default (milliseconds)
    #[serde(default)]
    pub connect_timeout_ms: Option<u64>,
}

fn default_port() -> u16 {
    3306
}
