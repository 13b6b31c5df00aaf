//! Flattens per-location measurement documents into typed records.
//!
//! Each stored document groups every measurement taken at one location. A
//! measurement that cannot be read is skipped on its own; a store that cannot
//! be read at all yields an empty record set.

use crate::metrics::{MeasurementRecord, MetricValues, TIMESTAMP_FORMAT};
use crate::storage::{DocumentSource, LocationDocument};
use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum SkipReason {
    #[error("measurement is not an object")]
    NotAnObject,
    #[error("missing field {0}")]
    MissingField(&'static str),
    #[error("unparsable timestamp {0:?}")]
    BadTimestamp(String),
    #[error("invalid run number {0}")]
    BadRunNumber(String),
    #[error("location name {0:?} does not match its document")]
    LocationMismatch(String),
}

/// A measurement left out of the record set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedMeasurement {
    pub location: String,
    pub position: usize,
    pub reason: SkipReason,
}

#[derive(Debug, Default)]
pub struct LoadReport {
    pub records: Vec<MeasurementRecord>,
    pub skipped: Vec<SkippedMeasurement>,
}

#[derive(Clone)]
pub struct RecordLoader {
    source: Arc<dyn DocumentSource>,
}

impl RecordLoader {
    pub fn new(source: Arc<dyn DocumentSource>) -> Self {
        Self { source }
    }

    /// Reads the whole store. Never fails: an unreachable store means no data.
    pub fn load(&self) -> Vec<MeasurementRecord> {
        self.load_report().records
    }

    pub fn load_report(&self) -> LoadReport {
        let documents = match self.source.fetch_all() {
            Ok(documents) => documents,
            Err(e) => {
                error!("Error fetching measurements from store: {}", e);
                return LoadReport::default();
            }
        };

        let report = flatten_documents(&documents);
        if !report.skipped.is_empty() {
            warn!("Skipped {} malformed measurement(s)", report.skipped.len());
        }
        debug!(
            "Loaded {} records from {} location documents",
            report.records.len(),
            documents.len()
        );
        report
    }
}

pub fn flatten_documents(documents: &[LocationDocument]) -> LoadReport {
    let mut report = LoadReport::default();

    for doc in documents {
        for (position, raw) in doc.measurements.iter().enumerate() {
            match parse_measurement(&doc.location, raw) {
                Ok(record) => report.records.push(record),
                Err(reason) => {
                    warn!(location = %doc.location, position, "Skipping bad record: {}", reason);
                    report.skipped.push(SkippedMeasurement {
                        location: doc.location.clone(),
                        position,
                        reason,
                    });
                }
            }
        }
    }

    report
}

pub fn parse_measurement(document_key: &str, raw: &Value) -> Result<MeasurementRecord, SkipReason> {
    let obj = raw.as_object().ok_or(SkipReason::NotAnObject)?;

    let ts_str = obj
        .get("timestamp")
        .and_then(Value::as_str)
        .ok_or(SkipReason::MissingField("timestamp"))?;
    let timestamp = NaiveDateTime::parse_from_str(ts_str, TIMESTAMP_FORMAT)
        .map_err(|_| SkipReason::BadTimestamp(ts_str.to_string()))?;

    let run_value = obj.get("run_no").ok_or(SkipReason::MissingField("run_no"))?;
    let run_no = run_value
        .as_u64()
        .filter(|&n| n > 0)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| SkipReason::BadRunNumber(run_value.to_string()))?;

    let location = obj
        .get("location")
        .and_then(|l| l.get("position[name]"))
        .and_then(Value::as_str)
        .ok_or(SkipReason::MissingField("location.position[name]"))?;
    if location != document_key {
        return Err(SkipReason::LocationMismatch(location.to_string()));
    }

    let values = MetricValues::from_fn(|metric| obj.get(metric.key).and_then(Value::as_f64));

    Ok(MeasurementRecord {
        timestamp,
        location: location.to_string(),
        run_no,
        values,
    })
}
