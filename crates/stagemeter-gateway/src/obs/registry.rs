//! Serving metrics: request counter, per-stage latency histogram, and the
//! prediction accuracy gauge, plus the exposition endpoint that serves them.
//!
//! One exported `MetricsRegistry` per process. Build it once at startup with
//! [`MetricsRegistry::initialize`] and share the `Arc` with every proxy. A
//! second `initialize` in the same process fails with `DuplicateInstrument`,
//! whatever address it asks for. [`MetricsRegistry::new`] is not guarded: it
//! never exports, so embedded hosts and tests may build as many as they like.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use stagemeter_core::error::{Result, StagemeterError};
use stagemeter_core::stage::Outcome;

use super::metrics::{CounterVec, Gauge, HistogramVec, Registry};
use crate::router;

pub const REQUESTS_TOTAL: &str = "http_server_requests_total";
pub const REQUEST_DURATION: &str = "http_server_request_duration_seconds";
pub const PREDICTION_ACCURACY: &str = "model_prediction_accuracy";

/// Set while an exported registry is live (or being started).
static EXPORTED: AtomicBool = AtomicBool::new(false);

/// Latency bucket upper bounds in seconds.
pub const LATENCY_BUCKETS: [f64; 8] = [0.001, 0.005, 0.01, 0.025, 0.05, 0.075, 0.1, 0.25];

pub struct MetricsRegistry {
    registry: Registry,
    requests: Arc<CounterVec>,
    duration: Arc<HistogramVec>,
    accuracy: Arc<Gauge>,
    local_addr: Option<SocketAddr>,
}

impl MetricsRegistry {
    /// Register the instruments without starting an endpoint.
    ///
    /// Useful when the host already runs an HTTP server and mounts
    /// [`router::build_metrics_router`] itself.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let requests = registry.register_counter(REQUESTS_TOTAL, "Total HTTP requests")?;
        let duration = registry.register_histogram(
            REQUEST_DURATION,
            "Request duration in seconds",
            &LATENCY_BUCKETS,
        )?;
        let accuracy = registry.register_gauge(PREDICTION_ACCURACY, "Model prediction accuracy")?;

        Ok(Self {
            registry,
            requests,
            duration,
            accuracy,
            local_addr: None,
        })
    }

    /// Register the instruments and start serving them on `addr`.
    ///
    /// Must be called from within a tokio runtime. The endpoint runs until the
    /// runtime shuts down. Fails with `DuplicateInstrument` if this process
    /// already exported its instruments, and with `AddrInUse` if `addr` is
    /// bound by someone else. A failed call does not consume the slot.
    pub async fn initialize(addr: SocketAddr) -> Result<Arc<Self>> {
        if EXPORTED
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(StagemeterError::DuplicateInstrument(format!(
                "{REQUESTS_TOTAL}, {REQUEST_DURATION}, {PREDICTION_ACCURACY} \
                 already exported by this process"
            )));
        }

        let res = Self::start(addr).await;
        if res.is_err() {
            EXPORTED.store(false, Ordering::Release);
        }
        res
    }

    async fn start(addr: SocketAddr) -> Result<Arc<Self>> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AddrInUse => StagemeterError::AddrInUse(addr.to_string()),
                _ => StagemeterError::Internal(format!("bind {addr} failed: {e}")),
            })?;
        let local = listener
            .local_addr()
            .map_err(|e| StagemeterError::Internal(format!("local_addr failed: {e}")))?;

        let mut metrics = Self::new()?;
        metrics.local_addr = Some(local);
        let metrics = Arc::new(metrics);

        let app = router::build_metrics_router(Arc::clone(&metrics));
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "metrics endpoint stopped");
            }
        });

        tracing::info!(addr = %local, "metrics endpoint listening");
        Ok(metrics)
    }

    /// Address of the exposition endpoint, if one was started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn record_success(&self, stage: &str, elapsed: Duration) {
        self.record(Outcome::Success, stage, elapsed);
    }

    pub fn record_failure(&self, stage: &str, elapsed: Duration) {
        self.record(Outcome::Failure, stage, elapsed);
    }

    /// One counter increment and one histogram observation.
    pub fn record(&self, outcome: Outcome, stage: &str, elapsed: Duration) {
        self.requests
            .inc(&[("status", outcome.status()), ("method", stage)]);
        self.duration
            .observe(&[("method", stage)], elapsed.as_secs_f64());
    }

    /// Overwrite the accuracy gauge. Range is the caller's business.
    pub fn set_accuracy(&self, value: f64) {
        self.accuracy.set(value);
    }

    /// Handle for stage implementations to report accuracy from `predict`.
    pub fn accuracy_reporter(&self) -> AccuracyReporter {
        AccuracyReporter {
            gauge: Arc::clone(&self.accuracy),
        }
    }

    pub fn request_count(&self, outcome: Outcome, stage: &str) -> u64 {
        self.requests
            .get(&[("status", outcome.status()), ("method", stage)])
    }

    pub fn observation_count(&self, stage: &str) -> u64 {
        self.duration.count(&[("method", stage)])
    }

    pub fn bucket_counts(&self, stage: &str) -> Vec<u64> {
        self.duration.bucket_counts(&[("method", stage)])
    }

    pub fn accuracy(&self) -> f64 {
        self.accuracy.get()
    }

    /// Prometheus text exposition of every instrument.
    pub fn render(&self) -> String {
        self.registry.render()
    }

    /// Underlying registry, for hosts that register extra instruments.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

/// Cloneable accuracy sink handed to stage implementations.
#[derive(Clone, Default)]
pub struct AccuracyReporter {
    gauge: Arc<Gauge>,
}

impl AccuracyReporter {
    pub fn report(&self, value: f64) {
        self.gauge.set(value);
    }

    pub fn last(&self) -> f64 {
        self.gauge.get()
    }
}
