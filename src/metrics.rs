use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Display metadata for one measured quantity
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricDef {
    pub key: &'static str,
    pub label: &'static str,
    pub unit: &'static str,
    pub color: &'static str,
}

impl MetricDef {
    /// Label with the unit suffix, e.g. `Latency (ms)`
    pub fn axis_label(&self) -> String {
        format!("{} ({})", self.label, self.unit)
    }

    pub fn format_value(&self, value: f64) -> String {
        format!("{:.2} {}", value, self.unit)
    }
}

/// Every metric the dashboard knows about, in legend and navigation order.
/// Loader, aggregator, selection and report all iterate this table.
pub static CATALOG: [MetricDef; 6] = [
    MetricDef {
        key: "download_speed",
        label: "Download Speed",
        unit: "Mbps",
        color: "#1f77b4",
    },
    MetricDef {
        key: "upload_speed",
        label: "Upload Speed",
        unit: "Mbps",
        color: "#ff7f0e",
    },
    MetricDef {
        key: "latency_ms",
        label: "Latency",
        unit: "ms",
        color: "#2ca02c",
    },
    MetricDef {
        key: "jitter_ms",
        label: "Jitter",
        unit: "ms",
        color: "#d62728",
    },
    MetricDef {
        key: "packet_loss",
        label: "Packet Loss",
        unit: "%",
        color: "#9467bd",
    },
    MetricDef {
        key: "rssi",
        label: "RSSI",
        unit: "dBm",
        color: "#8c564b",
    },
];

pub fn find(key: &str) -> Option<&'static MetricDef> {
    CATALOG.iter().find(|m| m.key == key)
}

pub fn index_of(key: &str) -> Option<usize> {
    CATALOG.iter().position(|m| m.key == key)
}

pub fn keys() -> impl Iterator<Item = &'static str> {
    CATALOG.iter().map(|m| m.key)
}

/// Per-metric values aligned with `CATALOG`. `None` is a sensor gap, not zero.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricValues(Vec<Option<f64>>);

impl MetricValues {
    pub fn empty() -> Self {
        Self(vec![None; CATALOG.len()])
    }

    /// Builds values by asking `lookup` for every catalog key in order
    pub fn from_fn(mut lookup: impl FnMut(&'static MetricDef) -> Option<f64>) -> Self {
        Self(CATALOG.iter().map(|m| lookup(m)).collect())
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        index_of(key).and_then(|i| self.0[i])
    }

    pub fn set(&mut self, key: &str, value: Option<f64>) -> bool {
        match index_of(key) {
            Some(i) => {
                self.0[i] = value;
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static MetricDef, Option<f64>)> + '_ {
        CATALOG.iter().zip(self.0.iter().copied())
    }
}

impl Serialize for MetricValues {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (metric, value) in self.iter() {
            map.serialize_entry(metric.key, &value)?;
        }
        map.end()
    }
}

/// One observed sample at a location during a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasurementRecord {
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: NaiveDateTime,
    pub location: String,
    pub run_no: u32,
    pub values: MetricValues,
}

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

impl MeasurementRecord {
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    /// Timestamp truncated to the start of its hour
    pub fn hour(&self) -> NaiveDateTime {
        self.timestamp
            .with_minute(0)
            .and_then(|t| t.with_second(0))
            .unwrap_or(self.timestamp)
    }

    pub fn hour_label(&self) -> String {
        format!("{:02}:00", self.timestamp.hour())
    }

    pub fn value(&self, key: &str) -> Option<f64> {
        self.values.get(key)
    }
}

fn serialize_timestamp<S: Serializer>(ts: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&ts.format(TIMESTAMP_FORMAT).to_string())
}
