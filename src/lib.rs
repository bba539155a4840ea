//! MySQL replication lag and custom metric probe
//!
//! [`probe::MetricProbe`] reads a single number from a MySQL endpoint,
//! either replication lag from replica status or the result of a
//! configured `SELECT` / `SHOW GLOBAL` query, and reports failures as data.

pub mod config;
pub mod metrics;
pub mod pool;
pub mod probe;
pub mod protocol;
