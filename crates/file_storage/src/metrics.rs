//! Metrics for storage adapter operations.

use std::time::Duration;

use opentelemetry::{
    KeyValue,
    metrics::{Counter, Histogram, Meter},
};

/// Metrics for storage adapter operations.
#[derive(Clone)]
pub struct StorageMetrics {
    /// Histogram for operation latencies.
    pub operations: Histogram<f64>,

    /// Counter for operation errors.
    pub errors: Counter<u64>,
}

impl StorageMetrics {
    pub fn new(meter: &Meter) -> Self {
        let operations = meter
            .f64_histogram("file_storage_operation_duration_seconds")
            .with_description("Duration of file storage operations in seconds")
            .build();

        let errors = meter
            .u64_counter("file_storage_errors_total")
            .with_description("Total number of failed file storage operations")
            .build();

        Self { operations, errors }
    }

    /// Metrics backed by the globally installed meter provider.
    pub fn global() -> Self {
        Self::new(&opentelemetry::global::meter("file_storage"))
    }

    /// Record one finished operation. Failures also bump the error counter.
    pub fn observe(&self, labels: &[KeyValue], elapsed: Duration, failed: bool) {
        self.operations.record(elapsed.as_secs_f64(), labels);
        if failed {
            self.errors.add(1, labels);
        }
    }
}
