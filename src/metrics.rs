//! Observability hooks.
//!
//! - `tracing_helpers` (feature `tracing`): spans around statements, connections and
//!   transactions.
//! - `METRICS` (feature `metrics`): OpenTelemetry instruments exported through a
//!   Prometheus registry.
//!
//! Both executors route every statement through `observe`.

#[cfg(feature = "metrics")]
use once_cell::sync::Lazy;
#[cfg(feature = "metrics")]
use opentelemetry::metrics::{Counter, Histogram, MeterProvider};
#[cfg(feature = "metrics")]
use opentelemetry_sdk::metrics::SdkMeterProvider;
#[cfg(feature = "metrics")]
use std::time::Duration;

#[cfg(feature = "metrics")]
pub static METRICS: Lazy<RowkeeperMetrics> = Lazy::new(RowkeeperMetrics::init);

#[cfg(feature = "metrics")]
pub struct RowkeeperMetrics {
    registry: prometheus::Registry,
    // Dropping the provider stops collection.
    _provider: Option<SdkMeterProvider>,
    queries_total: Counter<u64>,
    query_errors_total: Counter<u64>,
    query_duration: Histogram<f64>,
    connection_duration: Histogram<f64>,
}

#[cfg(feature = "metrics")]
impl RowkeeperMetrics {
    pub fn init() -> Self {
        let registry = prometheus::Registry::new();
        let provider = match opentelemetry_prometheus::exporter()
            .with_registry(registry.clone())
            .build()
        {
            Ok(exporter) => Some(SdkMeterProvider::builder().with_reader(exporter).build()),
            Err(e) => {
                log::warn!("Prometheus exporter unavailable, metrics will not be exported: {e}");
                None
            }
        };
        let meter = match &provider {
            Some(p) => p.meter("rowkeeper"),
            None => opentelemetry::global::meter("rowkeeper"),
        };

        let queries_total = meter
            .u64_counter("rowkeeper_queries_total")
            .with_description("Total statements executed")
            .build();
        let query_errors_total = meter
            .u64_counter("rowkeeper_query_errors_total")
            .with_description("Statements that returned an error")
            .build();
        let query_duration = meter
            .f64_histogram("rowkeeper_query_duration_seconds")
            .with_description("Duration of statements")
            .build();
        let connection_duration = meter
            .f64_histogram("rowkeeper_connection_duration_seconds")
            .with_description("Time spent establishing connections")
            .build();

        Self {
            registry,
            _provider: provider,
            queries_total,
            query_errors_total,
            query_duration,
            connection_duration,
        }
    }

    pub fn record_query_duration(&self, elapsed: Duration) {
        self.queries_total.add(1, &[]);
        self.query_duration.record(elapsed.as_secs_f64(), &[]);
    }

    pub fn record_query_error(&self) {
        self.query_errors_total.add(1, &[]);
    }

    pub fn record_connection_wait(&self, elapsed: Duration) {
        self.connection_duration.record(elapsed.as_secs_f64(), &[]);
    }

    /// Current metrics in the Prometheus text exposition format
    pub fn gather(&self) -> String {
        use prometheus::Encoder;

        let mut buf = Vec::new();
        if let Err(e) = prometheus::TextEncoder::new().encode(&self.registry.gather(), &mut buf) {
            log::warn!("Failed to encode metrics: {e}");
        }
        String::from_utf8_lossy(&buf).into_owned()
    }
}

/// Run one statement inside its span, recording duration and failure
pub(crate) fn observe<R, E: std::fmt::Display>(
    sql: &str,
    run: impl FnOnce() -> Result<R, E>,
) -> Result<R, E> {
    #[cfg(feature = "tracing")]
    let _span = tracing_helpers::execute_query_span(sql).entered();

    let start = std::time::Instant::now();
    let result = run();
    if let Err(e) = &result {
        log::debug!("statement failed: {e}; sql: {sql}");
        #[cfg(feature = "metrics")]
        METRICS.record_query_error();
    }

    let duration = start.elapsed();
    #[cfg(feature = "metrics")]
    METRICS.record_query_duration(duration);
    log::trace!("{sql} took {duration:?}");

    result
}

#[cfg(feature = "tracing")]
pub mod tracing_helpers {
    use tracing::{info_span, Span};

    pub fn execute_query_span(sql: &str) -> Span {
        info_span!("rowkeeper.execute_query", db.statement = %sql)
    }

    pub fn acquire_connection_span() -> Span {
        info_span!("rowkeeper.acquire_connection")
    }

    pub fn begin_transaction_span() -> Span {
        info_span!("rowkeeper.begin_transaction")
    }

    pub fn commit_transaction_span() -> Span {
        info_span!("rowkeeper.commit_transaction")
    }

    pub fn rollback_transaction_span() -> Span {
        info_span!("rowkeeper.rollback_transaction")
    }
}
