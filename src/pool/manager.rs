use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::debug;

use crate::config::PoolConfig;
use crate::probe::{ConnectionSource, DbHandle, QueryExecutor};
use crate::protocol::ResultSet;

use super::connection::{ConnectionError, QueryError};
use super::endpoint::{EndpointPool, PoolGuard};
use super::uri::DbUri;

/// Cache of endpoint pools keyed by connection URI
///
/// Shared by every probe; the first caller for a URI creates its pool.
/// New pools start with the configured limits so concurrent first callers
/// never see an unlimited pool.
pub struct PoolManager {
    pools: DashMap<String, Arc<EndpointPool>>,
    connect_timeout: Duration,
    max_idle_time: Duration,
    max_open: usize,
    max_idle: usize,
}

impl Default for PoolManager {
    fn default() -> Self {
        Self::new(&PoolConfig::default())
    }
}

impl PoolManager {
    pub fn new(config: &PoolConfig) -> Self {
        Self {
            pools: DashMap::new(),
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
            max_idle_time: Duration::from_millis(config.max_idle_time_ms),
            max_open: config.max_open_connections,
            max_idle: config.max_idle_connections,
        }
    }

    /// Get the pool for `uri`, creating it on first use
    ///
    /// The flag is true when the pool already existed.
    pub fn get_db(&self, uri: &str) -> Result<(Arc<EndpointPool>, bool), ConnectionError> {
        if let Some(pool) = self.pools.get(uri) {
            return Ok((pool.clone(), true));
        }

        let parsed: DbUri = uri.parse()?;
        let mut from_cache = true;
        let pool = self
            .pools
            .entry(uri.to_string())
            .or_insert_with(|| {
                from_cache = false;
                debug!(uri = %parsed, max_open = self.max_open, "Creating endpoint pool");
                let pool = EndpointPool::new(parsed, self.connect_timeout, self.max_idle_time);
                pool.set_max_open_conns(self.max_open);
                pool.set_max_idle_conns(self.max_idle);
                Arc::new(pool)
            })
            .clone();

        Ok((pool, from_cache))
    }

    /// Drop the pool for `uri`; checked-out connections close on return
    pub fn remove(&self, uri: &str) -> bool {
        self.pools.remove(uri).is_some()
    }

    /// Close idle connections of every cached pool
    pub async fn close_all(&self) {
        let pools: Vec<Arc<EndpointPool>> = self.pools.iter().map(|p| p.value().clone()).collect();
        for pool in pools {
            let closed = pool.close_idle().await;
            debug!(uri = %pool.uri(), closed, "Closed idle connections");
        }
    }

    /// Get pool statistics
    pub fn stats(&self) -> PoolStats {
        let mut stats = PoolStats {
            endpoints: self.pools.len(),
            ..PoolStats::default()
        };
        for pool in self.pools.iter() {
            stats.open_connections += pool.open_count();
            stats.idle_connections += pool.idle_count();
        }
        stats
    }
}

/// Pool statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub endpoints: usize,
    pub open_connections: usize,
    pub idle_connections: usize,
}

impl ConnectionSource for PoolManager {
    type Handle = Arc<EndpointPool>;

    fn get_db(&self, uri: &str) -> Result<(Arc<EndpointPool>, bool), ConnectionError> {
        PoolManager::get_db(self, uri)
    }
}

impl DbHandle for Arc<EndpointPool> {
    type Conn = PoolGuard;

    fn set_max_open_conns(&self, n: usize) {
        EndpointPool::set_max_open_conns(self, n);
    }

    fn set_max_idle_conns(&self, n: usize) {
        EndpointPool::set_max_idle_conns(self, n);
    }

    async fn conn(&self) -> Result<PoolGuard, ConnectionError> {
        self.get().await
    }
}

impl QueryExecutor for PoolGuard {
    async fn query(&mut self, sql: &str) -> Result<ResultSet, QueryError> {
        (**self).query(sql).await
    }
}
