mod connection;
mod endpoint;
mod manager;
mod uri;

#[cfg(test)]
pub(crate) mod testing;

pub use connection::{ConnectionError, ConnectionState, PooledConnection, QueryError};
pub use endpoint::{EndpointPool, PoolGuard, DEFAULT_MAX_IDLE};
pub use manager::{PoolManager, PoolStats};
pub use uri::DbUri;
