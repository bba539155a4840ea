use std::fmt;

use crate::config::ProbeConfig;

/// Identity of a probed MySQL endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceKey {
    pub hostname: String,
    pub port: u16,
}

impl InstanceKey {
    pub fn new(hostname: impl Into<String>, port: u16) -> Self {
        Self {
            hostname: hostname.into(),
            port,
        }
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.hostname, self.port)
    }
}

/// What the probe needs to know about a target
pub trait ProbeTarget {
    /// Identity copied into every result
    fn key(&self) -> &InstanceKey;

    /// Metric query; empty selects the replication lag default
    fn metric_query(&self) -> &str;

    /// Connection URI scoped to `schema`
    fn db_uri(&self, schema: &str) -> String;
}

/// A configured probe target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    pub key: InstanceKey,
    pub user: String,
    pub password: String,
    pub metric_query: String,
    pub connect_timeout_ms: Option<u64>,
}

impl Probe {
    pub fn new(key: InstanceKey, user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            key,
            user: user.into(),
            password: password.into(),
            metric_query: String::new(),
            connect_timeout_ms: None,
        }
    }

    pub fn with_metric_query(mut self, query: impl Into<String>) -> Self {
        self.metric_query = query.into();
        self
    }
}

impl From<&ProbeConfig> for Probe {
    fn from(config: &ProbeConfig) -> Self {
        Self {
            key: InstanceKey::new(config.host.clone(), config.port),
            user: config.user.clone(),
            password: config.password.clone(),
            metric_query: config.metric_query.clone(),
            connect_timeout_ms: config.connect_timeout_ms,
        }
    }
}

impl ProbeTarget for Probe {
    fn key(&self) -> &InstanceKey {
        &self.key
    }

    fn metric_query(&self) -> &str {
        &self.metric_query
    }

    fn db_uri(&self, schema: &str) -> String {
        let mut uri = format!(
            "mysql://{}:{}@{}/{}",
            self.user, self.password, self.key, schema
        );
        if let Some(ms) = self.connect_timeout_ms {
            uri.push_str(&format!("?timeout={ms}ms"));
        }
        uri
    }
}
