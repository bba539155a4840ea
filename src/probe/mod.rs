//! Replication lag / custom metric probe
//!
//! [`MetricProbe::measure`] reads one number from a MySQL endpoint:
//! - explicit `SELECT` returning a single numeric column
//! - `SHOW GLOBAL ...` returning `(variable_name, value)`
//! - by default, `Seconds_Behind_Master` from replica status
//!
//! Failures never escape as `Err`; they are carried in
//! [`MetricResult::err`]. Every call records latency, a total count and,
//! on failure, an error count on a detached task.

mod error;
mod query;
mod result;
mod source;
mod target;
pub mod telemetry;

pub use error::ProbeError;
pub use query::{MetricQuery, ReplicaColumns};
pub use result::MetricResult;
pub use source::{ConnectionSource, DbHandle, QueryExecutor};
pub use target::{InstanceKey, Probe, ProbeTarget};
pub use telemetry::{NoopTelemetry, TelemetrySink};

use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use crate::config::{Config, PoolConfig, ReplicaStatusSyntax};

/// Schema probe connections are scoped to
pub const DEFAULT_SCHEMA: &str = "information_schema";

/// Pool sizing applied when a handle is first created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolLimits {
    pub max_open: usize,
    pub max_idle: usize,
}

impl Default for PoolLimits {
    fn default() -> Self {
        Self::from(&PoolConfig::default())
    }
}

impl From<&PoolConfig> for PoolLimits {
    fn from(config: &PoolConfig) -> Self {
        Self {
            max_open: config.max_open_connections,
            max_idle: config.max_idle_connections,
        }
    }
}

/// Reads one metric per call from a probe target
pub struct MetricProbe<S: ConnectionSource> {
    source: Arc<S>,
    telemetry: Arc<dyn TelemetrySink>,
    limits: PoolLimits,
    schema: String,
    replica_status: ReplicaStatusSyntax,
}

impl<S: ConnectionSource> MetricProbe<S> {
    pub fn new(source: Arc<S>, telemetry: Arc<dyn TelemetrySink>) -> Self {
        Self {
            source,
            telemetry,
            limits: PoolLimits::default(),
            schema: DEFAULT_SCHEMA.to_string(),
            replica_status: ReplicaStatusSyntax::default(),
        }
    }

    pub fn from_config(
        source: Arc<S>,
        telemetry: Arc<dyn TelemetrySink>,
        config: &Config,
    ) -> Self {
        Self::new(source, telemetry)
            .with_limits(PoolLimits::from(&config.pool))
            .with_schema(config.probe.schema.clone())
            .with_replica_status(config.probe.replica_status)
    }

    pub fn with_limits(mut self, limits: PoolLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    pub fn with_replica_status(mut self, syntax: ReplicaStatusSyntax) -> Self {
        self.replica_status = syntax;
        self
    }

    /// Probe `target` once
    ///
    /// Always returns a result keyed by the target. No retry, no timeout
    /// beyond the connect timeout carried by the target URI.
    pub async fn measure<T>(&self, target: &T) -> MetricResult
    where
        T: ProbeTarget + Sync + ?Sized,
    {
        let started = Instant::now();
        let key = target.key().clone();

        let result = match self.read_metric(target).await {
            Ok(value) => {
                debug!(key = %key, value = value, "Probe succeeded");
                MetricResult::success(key, value)
            }
            Err(e) => {
                debug!(key = %key, kind = e.kind(), error = %e, "Probe failed");
                MetricResult::failure(key, e)
            }
        };

        telemetry::dispatch(&self.telemetry, started.elapsed(), result.err.is_some());
        result
    }

    async fn read_metric<T>(&self, target: &T) -> Result<f64, ProbeError>
    where
        T: ProbeTarget + Sync + ?Sized,
    {
        let query = MetricQuery::parse(target.metric_query(), self.replica_status);

        let uri = target.db_uri(&self.schema);
        let (db, from_cache) = self.source.get_db(&uri)?;
        if !from_cache {
            db.set_max_open_conns(self.limits.max_open);
            db.set_max_idle_conns(self.limits.max_idle);
        }

        let sql = query.statement()?;
        let mut conn = db.conn().await?;
        let rs = conn.query(sql).await?;
        query.scan(&rs)
    }
}
