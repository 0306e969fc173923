//! Summary statistics over a drained batch of measurements.

use crate::core::measurement::Measurement;
use chrono::{DateTime, Utc};
use serde::Serialize;
use statrs::statistics::Statistics;

/// Aggregate view of one batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub count: usize,
    pub first: Option<DateTime<Utc>>,
    pub last: Option<DateTime<Utc>>,
    /// Mean capture latency in µs
    pub mean_latency_us: f64,
    /// Standard deviation of capture latency in µs (0 for fewer than two samples)
    pub latency_std_us: f64,
    pub mean_temperature_c: f64,
    pub total_energy_j: f64,
}

impl BatchSummary {
    pub fn from_measurements(batch: &[Measurement]) -> Self {
        if batch.is_empty() {
            return Self::default();
        }

        let latencies: Vec<f64> = batch.iter().map(|m| m.latency).collect();
        let temperatures: Vec<f64> = batch.iter().map(|m| m.temperature).collect();

        let latency_std_us = if latencies.len() > 1 {
            latencies.iter().std_dev()
        } else {
            0.0
        };

        Self {
            count: batch.len(),
            first: batch.first().map(Measurement::captured_at),
            last: batch.last().map(Measurement::captured_at),
            mean_latency_us: latencies.iter().mean(),
            latency_std_us,
            mean_temperature_c: temperatures.iter().mean(),
            total_energy_j: batch.iter().map(|m| m.energy).sum(),
        }
    }

    /// Span between first and last capture, in milliseconds.
    pub fn span_ms(&self) -> f64 {
        match (self.first, self.last) {
            (Some(first), Some(last)) => (last - first).num_microseconds().unwrap_or(0) as f64 / 1000.0,
            _ => 0.0,
        }
    }

    /// One-line description for console output.
    pub fn line(&self) -> String {
        format!(
            "{} measurements over {:.3} ms | latency {:.3} ± {:.3} µs | T {:.4} °C | E {:.6} J",
            self.count,
            self.span_ms(),
            self.mean_latency_us,
            self.latency_std_us,
            self.mean_temperature_c,
            self.total_energy_j
        )
    }
}
