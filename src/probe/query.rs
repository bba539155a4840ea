//! Metric query classification and result scanning
//!
//! A metric query string resolves to exactly one strategy:
//! - `select ...`      one row, one numeric column
//! - `show global ...` one row, `(variable_name, value)`
//! - empty             replica status, lag from `Seconds_Behind_Master`
//! - anything else     rejected without touching the server

use crate::config::ReplicaStatusSyntax;
use crate::pool::QueryError;
use crate::protocol::ResultSet;

use super::error::ProbeError;

/// Column names of one replica status dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplicaColumns {
    pub io_running: &'static str,
    pub sql_running: &'static str,
    pub lag: &'static str,
}

const SLAVE_COLUMNS: ReplicaColumns = ReplicaColumns {
    io_running: "Slave_IO_Running",
    sql_running: "Slave_SQL_Running",
    lag: "Seconds_Behind_Master",
};

const REPLICA_COLUMNS: ReplicaColumns = ReplicaColumns {
    io_running: "Replica_IO_Running",
    sql_running: "Replica_SQL_Running",
    lag: "Seconds_Behind_Source",
};

impl ReplicaStatusSyntax {
    pub fn statement(self) -> &'static str {
        match self {
            ReplicaStatusSyntax::Slave => "SHOW SLAVE STATUS",
            ReplicaStatusSyntax::Replica => "SHOW REPLICA STATUS",
        }
    }

    pub fn columns(self) -> ReplicaColumns {
        match self {
            ReplicaStatusSyntax::Slave => SLAVE_COLUMNS,
            ReplicaStatusSyntax::Replica => REPLICA_COLUMNS,
        }
    }

    /// Columns actually present in `rs`
    ///
    /// Some servers answer one statement with the other dialect's names
    /// (MySQL 8.0.22+ still accepts SHOW SLAVE STATUS but may label
    /// columns either way), so fall back before giving up.
    fn detect_columns(self, rs: &ResultSet) -> ReplicaColumns {
        let preferred = self.columns();
        if rs.column_index(preferred.lag).is_some() {
            return preferred;
        }
        let other = match self {
            ReplicaStatusSyntax::Slave => REPLICA_COLUMNS,
            ReplicaStatusSyntax::Replica => SLAVE_COLUMNS,
        };
        if rs.column_index(other.lag).is_some() {
            other
        } else {
            preferred
        }
    }
}

/// Strategy resolved from a metric query string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricQuery<'a> {
    Select(&'a str),
    ShowGlobal(&'a str),
    ReplicaStatus(ReplicaStatusSyntax),
    Unsupported(&'a str),
}

impl<'a> MetricQuery<'a> {
    pub fn parse(query: &'a str, syntax: ReplicaStatusSyntax) -> Self {
        let trimmed = query.trim_start();
        if starts_with_ignore_case(trimmed, "select") {
            MetricQuery::Select(query)
        } else if starts_with_ignore_case(trimmed, "show global") {
            MetricQuery::ShowGlobal(query)
        } else if !query.is_empty() {
            MetricQuery::Unsupported(query)
        } else {
            MetricQuery::ReplicaStatus(syntax)
        }
    }

    /// Statement to send, or the rejection for unsupported queries
    pub fn statement(&self) -> Result<&'a str, ProbeError> {
        match *self {
            MetricQuery::Select(sql) | MetricQuery::ShowGlobal(sql) => Ok(sql),
            MetricQuery::ReplicaStatus(syntax) => Ok(syntax.statement()),
            MetricQuery::Unsupported(sql) => Err(ProbeError::UnsupportedQuery(sql.to_string())),
        }
    }

    /// Turn the statement's result into a measurement
    pub fn scan(&self, rs: &ResultSet) -> Result<f64, ProbeError> {
        match *self {
            MetricQuery::Select(_) => Ok(scan_single_value(rs, 1, 0)?),
            MetricQuery::ShowGlobal(_) => Ok(scan_single_value(rs, 2, 1)?),
            MetricQuery::ReplicaStatus(syntax) => scan_replica_status(rs, syntax),
            MetricQuery::Unsupported(sql) => Err(ProbeError::UnsupportedQuery(sql.to_string())),
        }
    }
}

fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len()
        && s.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

/// First row must have exactly `width` columns; `index` holds the number
fn scan_single_value(rs: &ResultSet, width: usize, index: usize) -> Result<f64, QueryError> {
    let row = rs.first_row().ok_or(QueryError::NoRows)?;
    if rs.columns().len() != width {
        return Err(QueryError::ColumnCount {
            expected: width,
            actual: rs.columns().len(),
        });
    }
    parse_float(row.get(index).flatten())
}

fn parse_float(cell: Option<&str>) -> Result<f64, QueryError> {
    let text = cell.ok_or_else(|| QueryError::Scan("converting NULL to f64 is unsupported".into()))?;
    text.trim()
        .parse::<f64>()
        .map_err(|_| QueryError::Scan(format!("converting {text:?} to f64: invalid syntax")))
}

/// Every row must report a lag; the last row's lag wins
fn scan_replica_status(rs: &ResultSet, syntax: ReplicaStatusSyntax) -> Result<f64, ProbeError> {
    if rs.is_empty() {
        return Err(ProbeError::ReplicationNotConfigured(syntax.statement()));
    }

    let columns = syntax.detect_columns(rs);
    let mut lag = 0.0;
    for row in rs.rows() {
        match row.get_null_i64(columns.lag) {
            Some(seconds) => lag = seconds as f64,
            None => {
                return Err(ProbeError::ReplicationNotRunning {
                    io_column: columns.io_running,
                    io_running: row.get_string(columns.io_running).to_string(),
                    sql_column: columns.sql_running,
                    sql_running: row.get_string(columns.sql_running).to_string(),
                })
            }
        }
    }
    Ok(lag)
}
