use crate::pool::{ConnectionError, QueryError};

/// Why a probe produced no measurement
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProbeError {
    /// No usable connection for the target URI
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Metric query is neither a SELECT nor a SHOW GLOBAL statement
    #[error("unsupported metric query type: {0}")]
    UnsupportedQuery(String),

    /// Statement failed or its result did not scan
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Replica status has no lag value
    #[error("replication not running; {io_column}={io_running}, {sql_column}={sql_running}")]
    ReplicationNotRunning {
        io_column: &'static str,
        io_running: String,
        sql_column: &'static str,
        sql_running: String,
    },

    /// Replica status returned no rows
    #[error("replication not configured; {0} returned no rows")]
    ReplicationNotConfigured(&'static str),
}

impl ProbeError {
    /// Short label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            ProbeError::Connection(_) => "connection",
            ProbeError::UnsupportedQuery(_) => "unsupported_query",
            ProbeError::Query(_) => "query",
            ProbeError::ReplicationNotRunning { .. } => "replication_not_running",
            ProbeError::ReplicationNotConfigured(_) => "replication_not_configured",
        }
    }
}
