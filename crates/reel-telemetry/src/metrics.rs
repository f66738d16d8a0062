use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Counter,
    Gauge,
    Histogram,
}

/// One metric value captured by [`MetricsRecorder::snapshot`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetricSample {
    pub timestamp: String,
    pub name: String,
    pub value: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    pub metric_type: MetricType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<HistogramSummary>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HistogramSummary {
    pub count: u64,
    pub sum: f64,
    pub min: f64,
    pub p50: f64,
    pub p90: f64,
    pub max: f64,
}

impl HistogramSummary {
    fn of(observations: &[f64]) -> Self {
        if observations.is_empty() {
            return Self::default();
        }
        let mut sorted = observations.to_vec();
        sorted.sort_by(f64::total_cmp);
        let last = sorted.len() - 1;
        let rank = |q: f64| sorted[((last as f64) * q).round() as usize];
        Self {
            count: sorted.len() as u64,
            sum: sorted.iter().sum(),
            min: sorted[0],
            p50: rank(0.5),
            p90: rank(0.9),
            max: sorted[last],
        }
    }
}

/// Storage for one labelled series. A name keeps the type it was first
/// recorded with; updates of another type are dropped.
enum Cell {
    Counter(AtomicU64),
    // f64 bits
    Gauge(AtomicU64),
    Histogram(Mutex<Vec<f64>>),
}

impl Cell {
    fn counter() -> Self {
        Self::Counter(AtomicU64::new(0))
    }

    fn gauge() -> Self {
        Self::Gauge(AtomicU64::new(0f64.to_bits()))
    }

    fn histogram() -> Self {
        Self::Histogram(Mutex::new(Vec::new()))
    }

    fn sample(&self) -> (MetricType, f64, Option<HistogramSummary>) {
        match self {
            Self::Counter(n) => (MetricType::Counter, n.load(Ordering::Relaxed) as f64, None),
            Self::Gauge(bits) => (
                MetricType::Gauge,
                f64::from_bits(bits.load(Ordering::Relaxed)),
                None,
            ),
            Self::Histogram(obs) => {
                let summary = HistogramSummary::of(&obs.lock());
                (MetricType::Histogram, summary.p50, Some(summary))
            }
        }
    }
}

/// Series key: name plus labels sorted by label name.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
struct SeriesKey {
    name: String,
    labels: Vec<(String, String)>,
}

impl SeriesKey {
    fn new(name: &str, labels: &[(&str, &str)]) -> Self {
        let mut labels: Vec<(String, String)> = labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        labels.sort();
        Self {
            name: name.to_string(),
            labels,
        }
    }
}

/// Thread-safe in-memory metrics recorder.
#[derive(Default)]
pub struct MetricsRecorder {
    series: RwLock<HashMap<SeriesKey, Cell>>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` on the series, creating it with `make` on first use.
    fn update(&self, key: SeriesKey, make: fn() -> Cell, f: impl FnOnce(&Cell)) {
        if let Some(cell) = self.series.read().get(&key) {
            f(cell);
            return;
        }
        let mut series = self.series.write();
        f(series.entry(key).or_insert_with(make));
    }

    fn read<R>(&self, name: &str, labels: &[(&str, &str)], f: impl FnOnce(&Cell) -> R) -> Option<R> {
        self.series.read().get(&SeriesKey::new(name, labels)).map(f)
    }

    pub fn counter_inc(&self, name: &str, labels: &[(&str, &str)], n: u64) {
        self.update(SeriesKey::new(name, labels), Cell::counter, |cell| {
            if let Cell::Counter(value) = cell {
                value.fetch_add(n, Ordering::Relaxed);
            }
        });
    }

    pub fn gauge_set(&self, name: &str, labels: &[(&str, &str)], value: f64) {
        self.update(SeriesKey::new(name, labels), Cell::gauge, |cell| {
            if let Cell::Gauge(bits) = cell {
                bits.store(value.to_bits(), Ordering::Relaxed);
            }
        });
    }

    pub fn histogram_observe(&self, name: &str, labels: &[(&str, &str)], value: f64) {
        self.update(SeriesKey::new(name, labels), Cell::histogram, |cell| {
            if let Cell::Histogram(obs) = cell {
                obs.lock().push(value);
            }
        });
    }

    /// Zero when the series was never recorded.
    pub fn counter_get(&self, name: &str, labels: &[(&str, &str)]) -> u64 {
        self.read(name, labels, |cell| match cell {
            Cell::Counter(value) => value.load(Ordering::Relaxed),
            _ => 0,
        })
        .unwrap_or(0)
    }

    pub fn gauge_get(&self, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
        self.read(name, labels, |cell| match cell {
            Cell::Gauge(bits) => Some(f64::from_bits(bits.load(Ordering::Relaxed))),
            _ => None,
        })
        .flatten()
    }

    pub fn histogram_summary(&self, name: &str, labels: &[(&str, &str)]) -> HistogramSummary {
        self.read(name, labels, |cell| match cell {
            Cell::Histogram(obs) => HistogramSummary::of(&obs.lock()),
            _ => HistogramSummary::default(),
        })
        .unwrap_or_default()
    }

    /// Every series, sorted by name then labels. Histograms report their
    /// median as the value and carry the full summary.
    pub fn snapshot(&self) -> Vec<MetricSample> {
        let timestamp = Utc::now().to_rfc3339();
        let mut samples: Vec<MetricSample> = self
            .series
            .read()
            .iter()
            .map(|(key, cell)| {
                let (metric_type, value, summary) = cell.sample();
                MetricSample {
                    timestamp: timestamp.clone(),
                    name: key.name.clone(),
                    value,
                    labels: key.labels.iter().cloned().collect(),
                    metric_type,
                    summary,
                }
            })
            .collect();
        samples.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.labels.cmp(&b.labels)));
        samples
    }
}
