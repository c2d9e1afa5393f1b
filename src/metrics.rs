//! Prometheus metrics definitions and text rendering.
//!
//! The exported metric families are a fixed catalog indexed by [`Metric`].
//! Label sets differ per sample (PV and PVC labels are user defined), so
//! samples are rendered directly instead of through a registry of vectors
//! with fixed label names.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;

/// Label name to label value. Iteration order is stable.
pub type Labels = BTreeMap<String, String>;

/// Prometheus metric type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MetricKind {
    Counter,
    Gauge,
    Summary,
    Untyped,
    Histogram,
}

impl MetricKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Summary => "summary",
            MetricKind::Untyped => "untyped",
            MetricKind::Histogram => "histogram",
        }
    }
}

/// Static description of a metric family.
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct MetricDefinition {
    pub name: &'static str,
    pub kind: MetricKind,
    pub help: &'static str,
}

/// The exported metric families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Metric {
    UsagePercent,
    AvailableBytes,
    UsedBytes,
    TotalBytes,
    CollectSeconds,
    RequestSeconds,
}

static CATALOG: [MetricDefinition; 6] = [
    MetricDefinition {
        name: "pv_disk_usage_percent_used",
        kind: MetricKind::Gauge,
        help: "Percentage of non-root filesystem used",
    },
    MetricDefinition {
        name: "pv_disk_usage_bytes_available",
        kind: MetricKind::Gauge,
        help: "Bytes available to user",
    },
    MetricDefinition {
        name: "pv_disk_usage_bytes_used",
        kind: MetricKind::Gauge,
        help: "Bytes of user data on filesystem.",
    },
    MetricDefinition {
        name: "pv_disk_usage_bytes_total",
        kind: MetricKind::Gauge,
        help: "Total bytes of user storage",
    },
    MetricDefinition {
        name: "pv_disk_usage_exporter_collect_seconds",
        kind: MetricKind::Gauge,
        help: "Time spent collecting disk usage and volume labels",
    },
    MetricDefinition {
        name: "pv_disk_usage_exporter_request_seconds",
        kind: MetricKind::Gauge,
        help: "Time spent handling the metrics request",
    },
];

impl Metric {
    /// Every metric, in rendering order.
    pub const ALL: [Metric; 6] = [
        Metric::UsagePercent,
        Metric::AvailableBytes,
        Metric::UsedBytes,
        Metric::TotalBytes,
        Metric::CollectSeconds,
        Metric::RequestSeconds,
    ];

    pub fn definition(self) -> &'static MetricDefinition {
        &CATALOG[self as usize]
    }
}

/// One measured value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSample {
    pub metric: Metric,
    pub value: f64,
    pub labels: Labels,
}

impl MetricSample {
    pub fn new(metric: Metric, value: f64, labels: Labels) -> Self {
        Self {
            metric,
            value,
            labels,
        }
    }
}

/// Replace every character outside `[_a-z0-9]` with an underscore.
pub fn sanitize_label_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '_' => c,
            _ => '_',
        })
        .collect()
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        let inf = if value > 0.0 { "+Inf" } else { "-Inf" };
        inf.to_string()
    } else {
        value.to_string()
    }
}

fn write_sample(out: &mut String, name: &str, sample: &MetricSample) {
    out.push_str(name);
    if !sample.labels.is_empty() {
        // keys that only differ before sanitizing collapse into one label
        let labels: BTreeMap<String, &String> = sample
            .labels
            .iter()
            .map(|(key, value)| (sanitize_label_name(key), value))
            .collect();

        out.push('{');
        for (i, (key, value)) in labels.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            // serde_json quotes and escapes the value
            let quoted = serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string());
            let _ = write!(out, "{}={}", key, quoted);
        }
        out.push('}');
    }
    let _ = writeln!(out, " {}", format_value(sample.value));
}

/// Render one sample line, for appending to the output of [`render`].
///
/// Only samples of the last catalog entry can be appended this way
/// without splitting a family.
pub fn render_sample(sample: &MetricSample) -> String {
    let mut out = String::new();
    write_sample(&mut out, sample.metric.definition().name, sample);
    out
}

/// Render samples in the Prometheus text exposition format.
///
/// Every catalog entry gets its `HELP` and `TYPE` lines, followed by its
/// samples in the order given.
pub fn render(samples: &[MetricSample]) -> String {
    let mut out = String::with_capacity(256 + samples.len() * 128);
    for metric in Metric::ALL {
        let definition = metric.definition();
        let _ = writeln!(out, "# HELP {} {}", definition.name, definition.help);
        let _ = writeln!(out, "# TYPE {} {}", definition.name, definition.kind.as_str());
        for sample in samples.iter().filter(|s| s.metric == metric) {
            write_sample(&mut out, definition.name, sample);
        }
    }
    out
}
