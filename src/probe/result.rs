use super::error::ProbeError;
use super::target::InstanceKey;

/// Outcome of one probe
///
/// `err` is None exactly when `value` holds a measurement. A zero value
/// without error is a real reading (e.g. no lag).
#[derive(Debug, Clone)]
pub struct MetricResult {
    pub key: InstanceKey,
    pub value: f64,
    pub err: Option<ProbeError>,
}

impl MetricResult {
    pub(crate) fn success(key: InstanceKey, value: f64) -> Self {
        Self {
            key,
            value,
            err: None,
        }
    }

    /// Value stays at zero on failure
    pub(crate) fn failure(key: InstanceKey, err: ProbeError) -> Self {
        Self {
            key,
            value: 0.0,
            err: Some(err),
        }
    }

    pub fn get(&self) -> Result<f64, &ProbeError> {
        match &self.err {
            Some(err) => Err(err),
            None => Ok(self.value),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.err.is_none()
    }
}
