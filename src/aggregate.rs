use crate::coords::{is_mapped, map_location, Coords};
use crate::error::SelectionError;
use crate::metrics::{MeasurementRecord, MetricDef, MetricValues, CATALOG};
use crate::selection::DateRange;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::debug;

/// Bar height used for a run label with no data, so a gap never looks like a real zero
pub const NO_DATA_EPSILON: f64 = 0.0001;

/// Mean of the present values; gaps are skipped, not counted as zero
pub fn null_aware_mean(values: impl IntoIterator<Item = Option<f64>>) -> Option<f64> {
    let present: Vec<f64> = values.into_iter().flatten().collect();
    if present.is_empty() {
        None
    } else {
        Some(statrs::statistics::Statistics::mean(present.iter()))
    }
}

fn metric_means(group: &[&MeasurementRecord]) -> MetricValues {
    MetricValues::from_fn(|metric| null_aware_mean(group.iter().map(|r| r.value(metric.key))))
}

/// Per-metric means over one group of records
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow {
    pub location: String,
    pub means: MetricValues,
    pub count: usize,
}

impl AggregateRow {
    pub fn mean(&self, key: &str) -> Option<f64> {
        self.means.get(key)
    }
}

/// Groups the records of one `(date, run)` by location. Locations without a
/// matching record do not appear.
pub fn aggregate_point(records: &[MeasurementRecord], date: NaiveDate, run_no: u32) -> Vec<AggregateRow> {
    let mut groups: BTreeMap<&str, Vec<&MeasurementRecord>> = BTreeMap::new();
    for r in records.iter().filter(|r| r.date() == date && r.run_no == run_no) {
        groups.entry(r.location.as_str()).or_default().push(r);
    }

    let rows: Vec<AggregateRow> = groups
        .into_iter()
        .map(|(location, group)| AggregateRow {
            location: location.to_string(),
            means: metric_means(&group),
            count: group.len(),
        })
        .collect();
    debug!("Point aggregation {} run {}: {} location rows", date, run_no, rows.len());
    rows
}

/// `date | run` category used on the trends x-axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunLabel {
    pub date: NaiveDate,
    pub run_no: u32,
}

impl RunLabel {
    pub fn of(record: &MeasurementRecord) -> Self {
        Self {
            date: record.date(),
            run_no: record.run_no,
        }
    }
}

impl fmt::Display for RunLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} | Run {}", self.date, self.run_no)
    }
}

impl Serialize for RunLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub label: RunLabel,
    pub mean: Option<f64>,
    pub normalized: Option<f64>,
}

impl SeriesPoint {
    pub fn bar_height(&self) -> f64 {
        self.normalized.unwrap_or(NO_DATA_EPSILON)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSeries {
    pub metric: &'static str,
    pub label: String,
    pub color: &'static str,
    /// Normalization bounds, taken over the whole dataset
    pub range: Option<(f64, f64)>,
    pub points: Vec<SeriesPoint>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SeriesAggregate {
    pub run_labels: Vec<RunLabel>,
    pub per_metric: Vec<MetricSeries>,
}

impl SeriesAggregate {
    pub fn is_empty(&self) -> bool {
        self.run_labels.is_empty()
    }

    pub fn series(&self, key: &str) -> Option<&MetricSeries> {
        self.per_metric.iter().find(|s| s.metric == key)
    }
}

/// Min and max of a metric over every record, widened by one on each side
/// when the metric is constant. `None` when the metric was never observed.
pub fn global_range(records: &[MeasurementRecord], key: &str) -> Option<(f64, f64)> {
    let (lo, hi) = records
        .iter()
        .filter_map(|r| r.value(key))
        .fold(None, |acc: Option<(f64, f64)>, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })?;
    if lo == hi {
        Some((lo - 1.0, hi + 1.0))
    } else {
        Some((lo, hi))
    }
}

/// Builds one normalized bar series per metric for `location`.
///
/// The label axis covers every run present in the whole dataset within
/// `range`, so locations missing a run get a gap rather than a shorter axis.
/// Normalization bounds come from the whole unfiltered dataset, which keeps
/// the scale stable while the date window moves.
pub fn aggregate_series(
    records: &[MeasurementRecord],
    location: &str,
    range: Option<DateRange>,
    metrics: &[&'static MetricDef],
) -> SeriesAggregate {
    let in_range = |r: &&MeasurementRecord| range.map_or(true, |rg| rg.contains(r.date()));

    let run_labels: Vec<RunLabel> = records
        .iter()
        .filter(in_range)
        .map(RunLabel::of)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if run_labels.is_empty() {
        return SeriesAggregate::default();
    }

    let mut by_label: BTreeMap<RunLabel, Vec<&MeasurementRecord>> = BTreeMap::new();
    for r in records.iter().filter(in_range).filter(|r| r.location == location) {
        by_label.entry(RunLabel::of(r)).or_default().push(r);
    }

    let per_metric = metrics
        .iter()
        .map(|metric| {
            let bounds = global_range(records, metric.key);
            let points = run_labels
                .iter()
                .map(|label| {
                    let mean = by_label
                        .get(label)
                        .and_then(|group| null_aware_mean(group.iter().map(|r| r.value(metric.key))));
                    let normalized = mean.zip(bounds).map(|(m, (lo, hi))| (m - lo) / (hi - lo));
                    SeriesPoint {
                        label: *label,
                        mean,
                        normalized,
                    }
                })
                .collect();
            MetricSeries {
                metric: metric.key,
                label: metric.axis_label(),
                color: metric.color,
                range: bounds,
                points,
            }
        })
        .collect();

    debug!(
        "Series aggregation for {}: {} run labels, {} metrics",
        location,
        run_labels.len(),
        metrics.len()
    );
    SeriesAggregate { run_labels, per_metric }
}

/// Most recent record for a location, used for the summary cards
pub fn latest_record<'a>(records: &'a [MeasurementRecord], location: &str) -> Option<&'a MeasurementRecord> {
    records
        .iter()
        .filter(|r| r.location == location)
        .max_by_key(|r| r.timestamp)
}

pub fn latest_per_location(records: &[MeasurementRecord]) -> Vec<&MeasurementRecord> {
    let mut latest: BTreeMap<&str, &MeasurementRecord> = BTreeMap::new();
    for r in records {
        latest
            .entry(r.location.as_str())
            .and_modify(|cur| {
                if r.timestamp > cur.timestamp {
                    *cur = r;
                }
            })
            .or_insert(r);
    }
    latest.into_values().collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyMean {
    pub hour: String,
    pub mean: Option<f64>,
    pub count: usize,
}

/// Mean of one metric per hour of day at a location, across all dates
pub fn hourly_means(records: &[MeasurementRecord], location: &str, metric: &MetricDef) -> Vec<HourlyMean> {
    let mut by_hour: BTreeMap<String, Vec<Option<f64>>> = BTreeMap::new();
    for r in records.iter().filter(|r| r.location == location) {
        by_hour.entry(r.hour_label()).or_default().push(r.value(metric.key));
    }
    by_hour
        .into_iter()
        .map(|(hour, values)| HourlyMean {
            hour,
            count: values.len(),
            mean: null_aware_mean(values),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunDetail {
    pub location: String,
    pub date: NaiveDate,
    pub run_no: u32,
    pub started_at: NaiveDateTime,
    pub means: MetricValues,
    pub count: usize,
}

/// Everything measured at one location during one run
pub fn run_detail(records: &[MeasurementRecord], location: &str, date: NaiveDate, run_no: u32) -> Option<RunDetail> {
    let group: Vec<&MeasurementRecord> = records
        .iter()
        .filter(|r| r.location == location && r.date() == date && r.run_no == run_no)
        .collect();
    let started_at = group.iter().map(|r| r.timestamp).min()?;
    Some(RunDetail {
        location: location.to_string(),
        date,
        run_no,
        started_at,
        means: metric_means(&group),
        count: group.len(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpatialPoint {
    pub location: String,
    pub coords: Coords,
    pub value: f64,
    pub count: usize,
    pub marker_size: f64,
}

/// Places point-aggregation rows on the site plan. Rows without a value for
/// `metric` or without registered coordinates are dropped.
pub fn spatial_points(rows: &[AggregateRow], metric: &MetricDef) -> Vec<SpatialPoint> {
    let placed: Vec<(&AggregateRow, Coords, f64)> = rows
        .iter()
        .filter_map(|row| {
            let value = row.mean(metric.key)?;
            let coords = map_location(&row.location);
            is_mapped(coords).then_some((row, coords, value))
        })
        .collect();

    let max_count = placed.iter().fold(0usize, |acc, (row, _, _)| acc.max(row.count));
    placed
        .into_iter()
        .map(|(row, coords, value)| SpatialPoint {
            location: row.location.clone(),
            coords,
            value,
            count: row.count,
            marker_size: row.count as f64 / max_count.max(1) as f64 * 40.0 + 10.0,
        })
        .collect()
}

/// Resolves metric keys against the catalog, preserving catalog order
pub fn resolve_metrics(keys: &[&str]) -> Result<Vec<&'static MetricDef>, SelectionError> {
    if let Some(unknown) = keys.iter().find(|k| crate::metrics::find(k).is_none()) {
        return Err(SelectionError::UnknownMetric(unknown.to_string()));
    }
    Ok(CATALOG.iter().filter(|m| keys.contains(&m.key)).collect())
}
