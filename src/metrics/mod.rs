//! Prometheus metrics for lagprobe
//!
//! Exposes probe telemetry via HTTP endpoint for Prometheus scraping.

use std::sync::Arc;
use std::time::Duration;

use prometheus::{Histogram, HistogramOpts, IntCounter, Registry};

use crate::probe::telemetry::{self, TelemetrySink};

/// Exported name of each probe instrument
pub const PROBES_LATENCY_SECONDS: &str = "lagprobe_probes_latency_seconds";
pub const PROBES_TOTAL: &str = "lagprobe_probes_total";
pub const PROBES_ERROR_TOTAL: &str = "lagprobe_probes_error_total";

/// Probe metrics collection
pub struct Metrics {
    /// Registry for all metrics
    pub registry: Registry,
    /// Probe latency histogram (in seconds)
    pub probes_latency_seconds: Histogram,
    /// Total probes attempted
    pub probes_total: IntCounter,
    /// Probes that returned an error
    pub probes_error_total: IntCounter,
}

impl Metrics {
    /// Create a new metrics collection
    pub fn new() -> Self {
        let registry = Registry::new();

        let probes_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                PROBES_LATENCY_SECONDS,
                format!("Probe latency in seconds ({})", telemetry::PROBES_LATENCY),
            )
            .buckets(vec![
                0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
            ]),
        )
        .expect("valid histogram options");

        let probes_total = IntCounter::new(
            PROBES_TOTAL,
            format!("Total number of probes ({})", telemetry::PROBES_TOTAL),
        )
        .expect("valid counter options");

        let probes_error_total = IntCounter::new(
            PROBES_ERROR_TOTAL,
            format!("Total number of failed probes ({})", telemetry::PROBES_ERROR),
        )
        .expect("valid counter options");

        registry
            .register(Box::new(probes_latency_seconds.clone()))
            .expect("metric registered once");
        registry
            .register(Box::new(probes_total.clone()))
            .expect("metric registered once");
        registry
            .register(Box::new(probes_error_total.clone()))
            .expect("metric registered once");

        Self {
            registry,
            probes_latency_seconds,
            probes_total,
            probes_error_total,
        }
    }

    /// Get metrics as Prometheus text format
    pub fn gather(&self) -> String {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::error!(error = %e, "Failed to encode metrics");
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetrySink for Metrics {
    fn record_latency(&self, elapsed: Duration) {
        self.probes_latency_seconds.observe(elapsed.as_secs_f64());
    }

    fn record_probe(&self) {
        self.probes_total.inc();
    }

    fn record_error(&self) {
        self.probes_error_total.inc();
    }
}

/// Start the metrics HTTP server
pub async fn start_metrics_server(addr: &str, metrics: Arc<Metrics>) -> anyhow::Result<()> {
    use http_body_util::Full;
    use hyper::body::Bytes;
    use hyper::header::{HeaderValue, CONTENT_TYPE};
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper::{Request, Response, StatusCode};
    use hyper_util::rt::TokioIo;
    use std::convert::Infallible;
    use std::net::SocketAddr;
    use tokio::net::TcpListener;
    use tracing::{error, info};

    fn respond(metrics: &Metrics, req: &Request<hyper::body::Incoming>) -> Response<Full<Bytes>> {
        let (status, body) = match req.uri().path() {
            "/metrics" => (StatusCode::OK, metrics.gather()),
            "/health" => (StatusCode::OK, "OK".to_string()),
            _ => (StatusCode::NOT_FOUND, "Not Found".to_string()),
        };
        let mut response = Response::new(Full::new(Bytes::from(body)));
        *response.status_mut() = status;
        if req.uri().path() == "/metrics" {
            response.headers_mut().insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8"),
            );
        }
        response
    }

    let addr: SocketAddr = addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Metrics server listening");

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req| {
                let response = respond(&metrics, &req);
                async move { Ok::<_, Infallible>(response) }
            });
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                error!(error = %e, "Metrics server connection error");
            }
        });
    }
}
