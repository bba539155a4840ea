//! Seams between the probe and the connection pool

use std::future::Future;

use crate::pool::{ConnectionError, QueryError};
use crate::protocol::ResultSet;

/// Something that can run a statement and buffer its result
pub trait QueryExecutor: Send {
    fn query(&mut self, sql: &str) -> impl Future<Output = Result<ResultSet, QueryError>> + Send;
}

/// A pooled database handle for one URI
pub trait DbHandle: Send + Sync {
    type Conn: QueryExecutor;

    fn set_max_open_conns(&self, n: usize);

    fn set_max_idle_conns(&self, n: usize);

    /// Check out a connection, opening one if needed
    fn conn(&self) -> impl Future<Output = Result<Self::Conn, ConnectionError>> + Send;
}

/// Cache of database handles keyed by connection URI
pub trait ConnectionSource: Send + Sync {
    type Handle: DbHandle;

    /// Returns the handle and whether it came from cache
    fn get_db(&self, uri: &str) -> Result<(Self::Handle, bool), ConnectionError>;
}
