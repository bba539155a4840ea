use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tracing::debug;

/// Stable instrument names
pub const PROBES_LATENCY: &str = "probes.latency";
pub const PROBES_TOTAL: &str = "probes.total";
pub const PROBES_ERROR: &str = "probes.error";

/// Receiver of per-probe telemetry
pub trait TelemetrySink: Send + Sync + 'static {
    /// Observe under the [`PROBES_LATENCY`] timer
    fn record_latency(&self, elapsed: Duration);

    /// Increment the [`PROBES_TOTAL`] counter
    fn record_probe(&self);

    /// Increment the [`PROBES_ERROR`] counter
    fn record_error(&self);
}

/// Sink that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetry;

impl TelemetrySink for NoopTelemetry {
    fn record_latency(&self, _elapsed: Duration) {}
    fn record_probe(&self) {}
    fn record_error(&self) {}
}

/// Record one probe on a detached task
///
/// Never awaited by the caller. Without a runtime the sample is dropped;
/// a panicking sink only takes down its own task.
pub(crate) fn dispatch(sink: &Arc<dyn TelemetrySink>, elapsed: Duration, failed: bool) {
    let Ok(handle) = Handle::try_current() else {
        debug!("No runtime available, dropping probe telemetry");
        return;
    };

    let sink = sink.clone();
    handle.spawn(async move {
        sink.record_latency(elapsed);
        sink.record_probe();
        if failed {
            sink.record_error();
        }
    });
}
