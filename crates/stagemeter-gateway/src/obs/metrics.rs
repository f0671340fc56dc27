//! Minimal metrics registry.
//!
//! Counter/gauge/histogram types with dynamic labels backed by `DashMap`.
//! Labels are flattened into sorted key vectors to keep deterministic
//! ordering. Histograms take their bucket upper bounds (seconds) at
//! construction; the `+Inf` bucket is implicit and equals the count.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use dashmap::DashMap;

use stagemeter_core::error::{Result, StagemeterError};

type LabelKey = Vec<(String, String)>;

/// Helper to escape label values.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn label_key(labels: &[(&str, &str)]) -> LabelKey {
    let mut key: LabelKey = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    key.sort();
    key
}

fn label_str(key: &LabelKey) -> String {
    key.iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
        .collect::<Vec<_>>()
        .join(",")
}

/// Sample value in exposition syntax (`+Inf`, `-Inf`, `NaN` spelled out).
fn fmt_value(v: f64) -> String {
    match v {
        v if v.is_nan() => "NaN".into(),
        f64::INFINITY => "+Inf".into(),
        f64::NEG_INFINITY => "-Inf".into(),
        v => v.to_string(),
    }
}

/// Add to an `f64` stored as bits.
fn atomic_add_f64(cell: &AtomicU64, v: f64) {
    let mut cur = cell.load(Ordering::Relaxed);
    loop {
        let next = (f64::from_bits(cur) + v).to_bits();
        match cell.compare_exchange_weak(cur, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return,
            Err(actual) => cur = actual,
        }
    }
}

#[derive(Debug, Default)]
pub struct CounterVec {
    map: DashMap<LabelKey, AtomicU64>,
}

impl CounterVec {
    /// Increment by 1.
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.add(labels, 1);
    }

    /// Increment by an arbitrary value.
    pub fn add(&self, labels: &[(&str, &str)], v: u64) {
        let counter = self
            .map
            .entry(label_key(labels))
            .or_insert_with(|| AtomicU64::new(0));
        counter.fetch_add(v, Ordering::Relaxed);
    }

    /// Current value, 0 for a label set never touched.
    pub fn get(&self, labels: &[(&str, &str)]) -> u64 {
        self.map
            .get(&label_key(labels))
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn render(&self, name: &str, out: &mut String) {
        let mut rows: Vec<(String, u64)> = self
            .map
            .iter()
            .map(|r| (label_str(r.key()), r.value().load(Ordering::Relaxed)))
            .collect();
        rows.sort();
        for (labels, val) in rows {
            let _ = writeln!(out, "{}{{{}}} {}", name, labels, val);
        }
    }
}

/// Unlabeled floating point gauge. Last write wins.
#[derive(Debug, Default)]
pub struct Gauge {
    bits: AtomicU64,
}

impl Gauge {
    pub fn set(&self, v: f64) {
        self.bits.store(v.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "{} {}", name, fmt_value(self.get()));
    }
}

#[derive(Debug)]
struct AtomicHistogram {
    count: AtomicU64,
    sum: AtomicU64,
    buckets: Vec<AtomicU64>,
}

impl AtomicHistogram {
    fn new(n: usize) -> Self {
        Self {
            count: AtomicU64::new(0),
            sum: AtomicU64::new(0f64.to_bits()),
            buckets: (0..n).map(|_| AtomicU64::new(0)).collect(),
        }
    }
}

#[derive(Debug)]
pub struct HistogramVec {
    bounds: Vec<f64>,
    map: DashMap<LabelKey, AtomicHistogram>,
}

impl HistogramVec {
    /// Bounds must be finite and strictly ascending.
    pub fn new(bounds: &[f64]) -> Result<Self> {
        if bounds.iter().any(|b| !b.is_finite()) {
            return Err(StagemeterError::BadRequest(
                "histogram bucket bounds must be finite".into(),
            ));
        }
        if bounds.windows(2).any(|w| w[0] >= w[1]) {
            return Err(StagemeterError::BadRequest(
                "histogram bucket bounds must be strictly ascending".into(),
            ));
        }
        Ok(Self {
            bounds: bounds.to_vec(),
            map: DashMap::new(),
        })
    }

    pub fn bounds(&self) -> &[f64] {
        &self.bounds
    }

    /// Observe a value (seconds) and increment cumulative buckets.
    pub fn observe(&self, labels: &[(&str, &str)], v: f64) {
        let n = self.bounds.len();
        let hist = self
            .map
            .entry(label_key(labels))
            .or_insert_with(|| AtomicHistogram::new(n));

        hist.count.fetch_add(1, Ordering::Relaxed);
        atomic_add_f64(&hist.sum, v);

        // Cumulative: every bucket whose bound is >= v.
        for (i, &b) in self.bounds.iter().enumerate() {
            if v <= b {
                hist.buckets[i].fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Number of observations for a label set.
    pub fn count(&self, labels: &[(&str, &str)]) -> u64 {
        self.map
            .get(&label_key(labels))
            .map(|h| h.count.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Sum of observed values for a label set.
    pub fn sum(&self, labels: &[(&str, &str)]) -> f64 {
        self.map
            .get(&label_key(labels))
            .map(|h| f64::from_bits(h.sum.load(Ordering::Relaxed)))
            .unwrap_or(0.0)
    }

    /// Cumulative bucket counts (without `+Inf`).
    pub fn bucket_counts(&self, labels: &[(&str, &str)]) -> Vec<u64> {
        match self.map.get(&label_key(labels)) {
            Some(h) => h.buckets.iter().map(|b| b.load(Ordering::Relaxed)).collect(),
            None => vec![0; self.bounds.len()],
        }
    }

    fn render(&self, name: &str, out: &mut String) {
        let mut keys: Vec<LabelKey> = self.map.iter().map(|r| r.key().clone()).collect();
        keys.sort();

        for key in keys {
            let Some(hist) = self.map.get(&key) else {
                continue;
            };
            let labels = label_str(&key);
            let prefix = if labels.is_empty() {
                String::new()
            } else {
                format!("{},", labels)
            };

            for (i, le) in self.bounds.iter().enumerate() {
                let count = hist.buckets[i].load(Ordering::Relaxed);
                let _ = writeln!(out, "{}_bucket{{{}le=\"{}\"}} {}", name, prefix, le, count);
            }
            let count = hist.count.load(Ordering::Relaxed);
            let _ = writeln!(out, "{}_bucket{{{}le=\"+Inf\"}} {}", name, prefix, count);

            let sum = f64::from_bits(hist.sum.load(Ordering::Relaxed));
            let _ = writeln!(out, "{}_sum{{{}}} {}", name, labels, fmt_value(sum));
            let _ = writeln!(out, "{}_count{{{}}} {}", name, labels, count);
        }
    }
}

#[derive(Clone)]
enum Family {
    Counter(Arc<CounterVec>),
    Gauge(Arc<Gauge>),
    Histogram(Arc<HistogramVec>),
}

impl Family {
    fn type_str(&self) -> &'static str {
        match self {
            Family::Counter(_) => "counter",
            Family::Gauge(_) => "gauge",
            Family::Histogram(_) => "histogram",
        }
    }
}

struct Entry {
    name: String,
    help: String,
    family: Family,
}

/// Named instrument families, rendered in registration order.
///
/// Registering the same name twice is a configuration error.
#[derive(Default)]
pub struct Registry {
    entries: RwLock<Vec<Entry>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_counter(&self, name: &str, help: &str) -> Result<Arc<CounterVec>> {
        let c = Arc::new(CounterVec::default());
        self.insert(name, help, Family::Counter(Arc::clone(&c)))?;
        Ok(c)
    }

    pub fn register_gauge(&self, name: &str, help: &str) -> Result<Arc<Gauge>> {
        let g = Arc::new(Gauge::default());
        self.insert(name, help, Family::Gauge(Arc::clone(&g)))?;
        Ok(g)
    }

    pub fn register_histogram(
        &self,
        name: &str,
        help: &str,
        bounds: &[f64],
    ) -> Result<Arc<HistogramVec>> {
        let h = Arc::new(HistogramVec::new(bounds)?);
        self.insert(name, help, Family::Histogram(Arc::clone(&h)))?;
        Ok(h)
    }

    fn insert(&self, name: &str, help: &str, family: Family) -> Result<()> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':');
        if !valid {
            return Err(StagemeterError::BadRequest(format!(
                "invalid metric name: {name:?}"
            )));
        }
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StagemeterError::Internal("metrics registry lock poisoned".into()))?;
        if entries.iter().any(|e| e.name == name) {
            return Err(StagemeterError::DuplicateInstrument(name.to_string()));
        }
        entries.push(Entry {
            name: name.to_string(),
            help: help.to_string(),
            family,
        });
        Ok(())
    }

    /// Names in registration order.
    pub fn names(&self) -> Vec<String> {
        match self.entries.read() {
            Ok(entries) => entries.iter().map(|e| e.name.clone()).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Render in Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut out = String::new();
        // Poisoned lock means a panic mid-registration; still render what exists.
        let entries = match self.entries.read() {
            Ok(g) => g,
            Err(p) => p.into_inner(),
        };
        for e in entries.iter() {
            let _ = writeln!(out, "# HELP {} {}", e.name, e.help.replace('\n', " "));
            let _ = writeln!(out, "# TYPE {} {}", e.name, e.family.type_str());
            match &e.family {
                Family::Counter(c) => c.render(&e.name, &mut out),
                Family::Gauge(g) => g.render(&e.name, &mut out),
                Family::Histogram(h) => h.render(&e.name, &mut out),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn counter_labels_are_order_insensitive() {
        let c = CounterVec::default();
        c.inc(&[("status", "200"), ("method", "predict")]);
        c.inc(&[("method", "predict"), ("status", "200")]);
        assert_eq!(c.get(&[("status", "200"), ("method", "predict")]), 2);
        assert_eq!(c.get(&[("status", "500"), ("method", "predict")]), 0);
    }

    #[test]
    fn histogram_buckets_are_cumulative() {
        let h = HistogramVec::new(&[0.01, 0.1, 1.0]).unwrap();
        let l = [("method", "predict")];
        h.observe(&l, 0.005);
        h.observe(&l, 0.05);
        h.observe(&l, 5.0);
        assert_eq!(h.bounds(), &[0.01, 0.1, 1.0]);
        assert_eq!(h.bucket_counts(&l), vec![1, 2, 2]);
        assert_eq!(h.count(&l), 3);
        assert!((h.sum(&l) - 5.055).abs() < 1e-9);
    }

    #[test]
    fn histogram_rejects_unsorted_bounds() {
        assert!(HistogramVec::new(&[0.1, 0.01]).is_err());
        assert!(HistogramVec::new(&[0.1, f64::INFINITY]).is_err());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let r = Registry::new();
        r.register_counter("x_total", "x").unwrap();
        let err = r.register_gauge("x_total", "again").unwrap_err();
        assert_eq!(err.code().as_str(), "DUPLICATE_INSTRUMENT");
        assert_eq!(r.names(), vec!["x_total".to_string()]);
    }

    #[test]
    fn render_emits_help_type_and_samples() {
        let r = Registry::new();
        let c = r.register_counter("req_total", "Requests").unwrap();
        let g = r.register_gauge("acc", "Accuracy").unwrap();
        let h = r.register_histogram("lat_seconds", "Latency", &[0.1]).unwrap();
        c.inc(&[("method", "a\"b")]);
        g.set(0.5);
        h.observe(&[("method", "p")], 0.05);

        let out = r.render();
        assert!(out.contains("# HELP req_total Requests\n# TYPE req_total counter\n"));
        assert!(out.contains("req_total{method=\"a\\\"b\"} 1\n"));
        assert!(out.contains("# TYPE acc gauge\nacc 0.5\n"));
        assert!(out.contains("lat_seconds_bucket{method=\"p\",le=\"0.1\"} 1\n"));
        assert!(out.contains("lat_seconds_bucket{method=\"p\",le=\"+Inf\"} 1\n"));
        assert!(out.contains("lat_seconds_count{method=\"p\"} 1\n"));
    }

    #[test]
    fn non_finite_values_use_exposition_spelling() {
        let r = Registry::new();
        let g = r.register_gauge("acc", "Accuracy").unwrap();
        let h = r.register_histogram("lat_seconds", "Latency", &[0.1]).unwrap();

        g.set(f64::INFINITY);
        h.observe(&[("method", "p")], f64::NEG_INFINITY);
        let out = r.render();
        assert!(out.contains("acc +Inf\n"), "{out}");
        assert!(out.contains("lat_seconds_sum{method=\"p\"} -Inf\n"), "{out}");
        assert!(!out.contains("inf\n"));

        g.set(f64::NAN);
        assert!(r.render().contains("acc NaN\n"));

        g.set(f64::NEG_INFINITY);
        assert!(r.render().contains("acc -Inf\n"));
    }
}
