use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicI64, AtomicU64, Ordering},
        Arc, RwLock,
    },
    time::{Duration, Instant},
};

use crate::errors::ErrorCategory;

/// Basic metrics collection system for telemetry
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    counters: RwLock<HashMap<String, Arc<AtomicU64>>>,
    gauges: RwLock<HashMap<String, Arc<AtomicI64>>>,
    histograms: RwLock<HashMap<String, Arc<RwLock<Vec<u64>>>>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment a counter by 1
    pub fn increment_counter(&self, name: &str) {
        self.add_to_counter(name, 1);
    }

    /// Add a value to a counter
    pub fn add_to_counter(&self, name: &str, value: u64) {
        if let Ok(counters) = self.counters.read() {
            if let Some(counter) = counters.get(name) {
                counter.fetch_add(value, Ordering::Relaxed);
                return;
            }
        }
        if let Ok(mut counters) = self.counters.write() {
            let counter = counters
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(AtomicU64::new(0)));
            counter.fetch_add(value, Ordering::Relaxed);
        }
    }

    /// Move a gauge up or down
    pub fn add_to_gauge(&self, name: &str, delta: i64) {
        if let Ok(gauges) = self.gauges.read() {
            if let Some(gauge) = gauges.get(name) {
                gauge.fetch_add(delta, Ordering::Relaxed);
                return;
            }
        }
        if let Ok(mut gauges) = self.gauges.write() {
            let gauge = gauges
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(AtomicI64::new(0)));
            gauge.fetch_add(delta, Ordering::Relaxed);
        }
    }

    pub fn get_gauge(&self, name: &str) -> i64 {
        self.gauges
            .read()
            .ok()
            .and_then(|g| g.get(name).map(|g| g.load(Ordering::Relaxed)))
            .unwrap_or(0)
    }

    /// Count an error under `errors_<category>_total`
    pub fn record_error(&self, category: ErrorCategory) {
        self.increment_counter(&format!("errors_{}_total", category.metric_label()));
    }

    /// Record histogram value (duration in milliseconds)
    pub fn record_histogram(&self, name: &str, duration: Duration) {
        let millis = duration.as_millis() as u64;
        let histogram = {
            let existing = self
                .histograms
                .read()
                .ok()
                .and_then(|h| h.get(name).cloned());
            match existing {
                Some(h) => h,
                None => match self.histograms.write() {
                    Ok(mut histograms) => histograms
                        .entry(name.to_string())
                        .or_insert_with(|| Arc::new(RwLock::new(Vec::new())))
                        .clone(),
                    Err(_) => return,
                },
            }
        };
        if let Ok(mut hist) = histogram.write() {
            hist.push(millis);
            // Keep only last 1000 values
            if hist.len() > 1000 {
                hist.drain(0..500);
            }
        };
    }

    /// Get counter value
    pub fn get_counter(&self, name: &str) -> u64 {
        self.counters
            .read()
            .ok()
            .and_then(|c| c.get(name).map(|c| c.load(Ordering::Relaxed)))
            .unwrap_or(0)
    }

    /// Get histogram statistics
    pub fn get_histogram_stats(&self, name: &str) -> Option<HistogramStats> {
        let histograms = self.histograms.read().ok()?;
        let hist = histograms.get(name)?.read().ok()?;
        if hist.is_empty() {
            return None;
        }
        let mut sorted = hist.clone();
        sorted.sort_unstable();
        let len = sorted.len();
        Some(HistogramStats {
            count: len as u64,
            min: sorted[0],
            max: sorted[len - 1],
            p50: sorted[len / 2],
            p95: sorted[len * 95 / 100],
            p99: sorted[len * 99 / 100],
        })
    }

    /// Export all metrics in a simple format
    pub fn export_metrics(&self) -> MetricsSnapshot {
        let counters = self
            .counters
            .read()
            .map(|c| {
                c.iter()
                    .map(|(k, v)| (k.clone(), v.load(Ordering::Relaxed)))
                    .collect()
            })
            .unwrap_or_default();

        let gauges = self
            .gauges
            .read()
            .map(|g| {
                g.iter()
                    .map(|(k, v)| (k.clone(), v.load(Ordering::Relaxed)))
                    .collect()
            })
            .unwrap_or_default();

        let names: Vec<String> = self
            .histograms
            .read()
            .map(|h| h.keys().cloned().collect())
            .unwrap_or_default();
        let histograms = names
            .into_iter()
            .filter_map(|k| self.get_histogram_stats(&k).map(|stats| (k, stats)))
            .collect();

        MetricsSnapshot {
            counters,
            gauges,
            histograms,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct HistogramStats {
    pub count: u64,
    pub min: u64,
    pub max: u64,
    pub p50: u64,
    pub p95: u64,
    pub p99: u64,
}

#[derive(Debug, serde::Serialize)]
pub struct MetricsSnapshot {
    pub counters: HashMap<String, u64>,
    pub gauges: HashMap<String, i64>,
    pub histograms: HashMap<String, HistogramStats>,
}

/// Global metrics registry instance
static GLOBAL_METRICS: std::sync::OnceLock<MetricsRegistry> = std::sync::OnceLock::new();

/// Get global metrics registry
pub fn metrics() -> &'static MetricsRegistry {
    GLOBAL_METRICS.get_or_init(MetricsRegistry::new)
}

/// Timer helper for measuring duration
pub struct Timer {
    name: String,
    start: Instant,
}

impl Timer {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    pub fn finish(self) {
        let duration = self.start.elapsed();
        metrics().record_histogram(&self.name, duration);
    }
}
