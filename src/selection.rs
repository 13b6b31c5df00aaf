//! Cyclic navigation state for the dashboard views.
//!
//! Every axis (location, date, run, metric) is a small state machine over a
//! candidate list derived from the live record set. A [`NavigationContext`]
//! bundles the four axes for one view, and a [`Session`] owns one context per
//! view. Nothing here is shared between sessions.

use crate::error::SelectionError;
use crate::metrics::{self, MeasurementRecord, MetricDef, CATALOG};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Prev,
    Next,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisKind {
    Location,
    Date,
    Run,
    Metric,
}

impl AxisKind {
    pub fn name(self) -> &'static str {
        match self {
            AxisKind::Location => "location",
            AxisKind::Date => "date",
            AxisKind::Run => "run",
            AxisKind::Metric => "metric",
        }
    }
}

/// Index into an ordered candidate list with wrap-around stepping
#[derive(Debug, Clone, PartialEq)]
pub struct Axis<T> {
    candidates: Vec<T>,
    index: usize,
}

impl<T: Clone + PartialEq> Axis<T> {
    pub fn new(candidates: Vec<T>) -> Self {
        Self { candidates, index: 0 }
    }

    pub fn candidates(&self) -> &[T] {
        &self.candidates
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// `None` means the axis has no data
    pub fn index(&self) -> Option<usize> {
        (!self.candidates.is_empty()).then_some(self.index)
    }

    pub fn current(&self) -> Option<&T> {
        self.candidates.get(self.index)
    }

    pub fn advance(&mut self, direction: Direction) -> Option<usize> {
        let len = self.candidates.len() as i64;
        if len == 0 {
            return None;
        }
        let step = match direction {
            Direction::Next => 1,
            Direction::Prev => -1,
        };
        self.index = (self.index as i64 + step).rem_euclid(len) as usize;
        Some(self.index)
    }

    pub fn reset(&mut self) -> Option<usize> {
        self.index = 0;
        self.index()
    }

    /// Moves to `value` if it is a candidate; otherwise leaves the axis alone
    pub fn pick(&mut self, value: &T) -> Option<usize> {
        let position = self.candidates.iter().position(|c| c == value)?;
        self.index = position;
        Some(position)
    }

    /// Swaps in a fresh candidate list, following the current value when it survives
    pub fn set_candidates(&mut self, candidates: Vec<T>) {
        let current = self.current().cloned();
        self.index = current
            .and_then(|c| candidates.iter().position(|v| *v == c))
            .unwrap_or(0);
        self.candidates = candidates;
    }
}

/// Inclusive calendar window used by the trends view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(a: NaiveDate, b: NaiveDate) -> Self {
        if a <= b {
            Self { start: a, end: b }
        } else {
            Self { start: b, end: a }
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Widens the window by one day on the side given by `direction`, staying
    /// within `[first, last]`
    pub fn shift(self, direction: Direction, first: NaiveDate, last: NaiveDate) -> Self {
        let (mut start, mut end) = match direction {
            Direction::Prev => (self.start - Duration::days(1), self.end),
            Direction::Next => (self.start, self.end + Duration::days(1)),
        };
        start = start.max(first);
        end = end.min(last);
        if end < start {
            end = start;
        }
        Self { start, end }
    }

    fn clamp(self, first: NaiveDate, last: NaiveDate) -> Self {
        let start = self.start.clamp(first, last);
        let end = self.end.clamp(start, last);
        Self { start, end }
    }
}

/// Candidate values for each axis, derived from one load of the record set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateIndex {
    pub locations: Vec<String>,
    pub dates: Vec<NaiveDate>,
    runs_by_date: BTreeMap<NaiveDate, BTreeSet<u32>>,
}

impl CandidateIndex {
    pub fn from_records(records: &[MeasurementRecord]) -> Self {
        let mut locations = BTreeSet::new();
        let mut runs_by_date: BTreeMap<NaiveDate, BTreeSet<u32>> = BTreeMap::new();
        for r in records {
            locations.insert(r.location.clone());
            runs_by_date.entry(r.date()).or_default().insert(r.run_no);
        }
        Self {
            locations: locations.into_iter().collect(),
            dates: runs_by_date.keys().copied().collect(),
            runs_by_date,
        }
    }

    pub fn runs_on(&self, date: NaiveDate) -> Vec<u32> {
        self.runs_by_date
            .get(&date)
            .map(|runs| runs.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn full_range(&self) -> Option<DateRange> {
        Some(DateRange::new(*self.dates.first()?, *self.dates.last()?))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum NavAction {
    Advance { direction: Direction },
    Reset,
    Pick { value: String },
    /// Widen the trends date window
    ShiftRange { direction: Direction },
}

/// One user interaction. `seq` is the click counter of the originating
/// control; a trigger whose `seq` was already applied is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub axis: AxisKind,
    #[serde(flatten)]
    pub action: NavAction,
    pub seq: u64,
}

impl Trigger {
    fn control(&self) -> &'static str {
        match self.action {
            NavAction::ShiftRange { .. } => "date_range",
            _ => self.axis.name(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NavigationContext {
    index: CandidateIndex,
    location: Axis<String>,
    date: Axis<NaiveDate>,
    run: Axis<u32>,
    metric: Axis<&'static MetricDef>,
    date_range: Option<DateRange>,
    applied: HashMap<&'static str, u64>,
}

impl NavigationContext {
    pub fn new(records: &[MeasurementRecord]) -> Self {
        let index = CandidateIndex::from_records(records);
        let date = Axis::new(index.dates.clone());
        let run = Axis::new(date.current().map(|d| index.runs_on(*d)).unwrap_or_default());
        Self {
            location: Axis::new(index.locations.clone()),
            metric: Axis::new(CATALOG.iter().collect()),
            date_range: index.full_range(),
            date,
            run,
            index,
            applied: HashMap::new(),
        }
    }

    /// Re-derives every candidate list from a fresh load
    pub fn refresh(&mut self, records: &[MeasurementRecord]) {
        self.index = CandidateIndex::from_records(records);
        self.location.set_candidates(self.index.locations.clone());
        let previous_date = self.date.current().copied();
        self.date.set_candidates(self.index.dates.clone());
        if self.date.current().copied() == previous_date {
            let runs = self.date.current().map(|d| self.index.runs_on(*d)).unwrap_or_default();
            self.run.set_candidates(runs);
        } else {
            self.date_changed();
        }
        self.date_range = match (self.date_range, self.index.full_range()) {
            (Some(range), Some(full)) => Some(range.clamp(full.start, full.end)),
            (None, full) => full,
            (Some(_), None) => None,
        };
    }

    pub fn location(&self) -> &Axis<String> {
        &self.location
    }

    pub fn date(&self) -> &Axis<NaiveDate> {
        &self.date
    }

    pub fn run(&self) -> &Axis<u32> {
        &self.run
    }

    pub fn metric(&self) -> &Axis<&'static MetricDef> {
        &self.metric
    }

    pub fn date_range(&self) -> Option<DateRange> {
        self.date_range
    }

    pub fn index_of(&self, axis: AxisKind) -> Option<usize> {
        match axis {
            AxisKind::Location => self.location.index(),
            AxisKind::Date => self.date.index(),
            AxisKind::Run => self.run.index(),
            AxisKind::Metric => self.metric.index(),
        }
    }

    pub fn advance(&mut self, axis: AxisKind, direction: Direction) -> Option<usize> {
        match axis {
            AxisKind::Location => self.location.advance(direction),
            AxisKind::Date => {
                let moved = self.date.advance(direction);
                if moved.is_some() {
                    self.date_changed();
                }
                moved
            }
            AxisKind::Run => self.run.advance(direction),
            AxisKind::Metric => self.metric.advance(direction),
        }
    }

    pub fn reset(&mut self, axis: AxisKind) -> Option<usize> {
        match axis {
            AxisKind::Location => self.location.reset(),
            AxisKind::Date => {
                let moved = self.date.reset();
                if moved.is_some() {
                    self.date_changed();
                }
                moved
            }
            AxisKind::Run => self.run.reset(),
            AxisKind::Metric => self.metric.reset(),
        }
    }

    /// Selects a specific value. Values outside the candidate list are refused
    /// and the axis keeps its position.
    pub fn pick(&mut self, axis: AxisKind, raw: &str) -> Result<usize, SelectionError> {
        if self.index_of(axis).is_none() {
            return Err(SelectionError::NoData(axis.name()));
        }
        let not_candidate = || SelectionError::NotACandidate {
            axis: axis.name(),
            value: raw.to_string(),
        };
        let invalid = || SelectionError::InvalidValue {
            axis: axis.name(),
            value: raw.to_string(),
        };

        match axis {
            AxisKind::Location => self.location.pick(&raw.to_string()).ok_or_else(not_candidate),
            AxisKind::Date => {
                let date = NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|_| invalid())?;
                let picked = self.date.pick(&date).ok_or_else(not_candidate)?;
                self.date_changed();
                Ok(picked)
            }
            AxisKind::Run => {
                let run: u32 = raw.trim().parse().map_err(|_| invalid())?;
                self.run.pick(&run).ok_or_else(not_candidate)
            }
            AxisKind::Metric => {
                let metric = metrics::find(raw).ok_or_else(|| SelectionError::UnknownMetric(raw.to_string()))?;
                self.metric.pick(&metric).ok_or_else(not_candidate)
            }
        }
    }

    pub fn shift_range(&mut self, direction: Direction) -> Option<DateRange> {
        let full = self.index.full_range()?;
        let shifted = self
            .date_range
            .unwrap_or(full)
            .shift(direction, full.start, full.end);
        self.date_range = Some(shifted);
        self.date_range
    }

    /// Applies one interaction. Replays of an already applied trigger report
    /// the current index without moving.
    pub fn apply(&mut self, trigger: &Trigger) -> Result<Option<usize>, SelectionError> {
        let control = trigger.control();
        if self.applied.get(control).is_some_and(|&last| trigger.seq <= last) {
            debug!(control, seq = trigger.seq, "Ignoring replayed trigger");
            return Ok(self.index_of(trigger.axis));
        }

        let result = match &trigger.action {
            NavAction::Advance { direction } => Ok(self.advance(trigger.axis, *direction)),
            NavAction::Reset => Ok(self.reset(trigger.axis)),
            NavAction::Pick { value } => self.pick(trigger.axis, value).map(Some),
            NavAction::ShiftRange { direction } => {
                self.shift_range(*direction);
                Ok(self.index_of(trigger.axis))
            }
        }?;

        self.applied.insert(control, trigger.seq);
        Ok(result)
    }

    // Runs are scoped to a date; a run index from another date is meaningless.
    fn date_changed(&mut self) {
        let runs = self.date.current().map(|d| self.index.runs_on(*d)).unwrap_or_default();
        self.run = Axis::new(runs);
    }

    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            location: self.location.current().cloned(),
            location_index: self.location.index(),
            locations: self.location.candidates().len(),
            date: self.date.current().copied(),
            date_index: self.date.index(),
            dates: self.date.candidates().len(),
            run: self.run.current().copied(),
            run_index: self.run.index(),
            runs: self.run.candidates().len(),
            metric: self.metric.current().map(|m| m.key),
            metric_index: self.metric.index(),
            date_range: self.date_range,
        }
    }
}

/// Serializable view of a context; `None` fields mean "no data"
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextSnapshot {
    pub location: Option<String>,
    pub location_index: Option<usize>,
    pub locations: usize,
    pub date: Option<NaiveDate>,
    pub date_index: Option<usize>,
    pub dates: usize,
    pub run: Option<u32>,
    pub run_index: Option<usize>,
    pub runs: usize,
    pub metric: Option<&'static str>,
    pub metric_index: Option<usize>,
    pub date_range: Option<DateRange>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    Overview,
    RunAnalysis,
    Trends,
    Heatmap,
}

impl View {
    pub const ALL: [View; 4] = [View::Overview, View::RunAnalysis, View::Trends, View::Heatmap];

    pub fn name(self) -> &'static str {
        match self {
            View::Overview => "overview",
            View::RunAnalysis => "run_analysis",
            View::Trends => "trends",
            View::Heatmap => "heatmap",
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for View {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        View::ALL
            .into_iter()
            .find(|v| v.name() == s)
            .ok_or_else(|| format!("unknown view {s}"))
    }
}

/// Navigation state of one dashboard user
#[derive(Debug, Clone)]
pub struct Session {
    contexts: HashMap<View, NavigationContext>,
}

impl Session {
    pub fn new(records: &[MeasurementRecord]) -> Self {
        let context = NavigationContext::new(records);
        Self {
            contexts: View::ALL.into_iter().map(|v| (v, context.clone())).collect(),
        }
    }

    pub fn context(&self, view: View) -> Option<&NavigationContext> {
        self.contexts.get(&view)
    }

    pub fn context_mut(&mut self, view: View) -> Option<&mut NavigationContext> {
        self.contexts.get_mut(&view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{MetricValues, TIMESTAMP_FORMAT};
    use chrono::NaiveDateTime;
    use proptest::prelude::*;

    fn record(location: &str, ts: &str, run_no: u32) -> MeasurementRecord {
        MeasurementRecord {
            timestamp: NaiveDateTime::parse_from_str(ts, TIMESTAMP_FORMAT).unwrap(),
            location: location.to_string(),
            run_no,
            values: MetricValues::empty(),
        }
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    fn sample() -> Vec<MeasurementRecord> {
        vec![
            record("GEC", "2024-01-02 10:00:00", 1),
            record("ECC", "2024-01-01 09:00:00", 1),
            record("ECC", "2024-01-01 13:00:00", 2),
            record("SDB", "2024-01-01 17:00:00", 3),
            record("ECC", "2024-01-02 11:00:00", 2),
            record("LOUNGE", "2024-01-04 12:00:00", 1),
        ]
    }

    #[test]
    fn prev_from_zero_wraps_to_last() {
        let mut axis = Axis::new(vec!["a", "b", "c"]);
        assert_eq!(axis.advance(Direction::Prev), Some(2));
        assert_eq!(axis.current(), Some(&"c"));
        assert_eq!(axis.advance(Direction::Next), Some(0));
    }

    #[test]
    fn empty_axis_reports_no_data() {
        let mut axis: Axis<u32> = Axis::new(vec![]);
        assert_eq!(axis.advance(Direction::Next), None);
        assert_eq!(axis.advance(Direction::Prev), None);
        assert_eq!(axis.reset(), None);
        assert_eq!(axis.pick(&1), None);
        assert_eq!(axis.current(), None);
    }

    #[test]
    fn set_candidates_follows_current_value() {
        let mut axis = Axis::new(vec!["ECC", "GEC", "SDB"]);
        axis.pick(&"GEC");
        axis.set_candidates(vec!["AAA", "ECC", "GEC", "SDB"]);
        assert_eq!(axis.index(), Some(2));
        axis.set_candidates(vec!["ECC", "SDB"]);
        assert_eq!(axis.index(), Some(0));
    }

    #[test]
    fn initial_context_starts_at_first_candidates() {
        let ctx = NavigationContext::new(&sample());
        let snap = ctx.snapshot();
        assert_eq!(snap.location.as_deref(), Some("ECC"));
        assert_eq!(snap.date, Some(day("2024-01-01")));
        assert_eq!(ctx.run().candidates(), &[1, 2, 3]);
        assert_eq!(snap.metric, Some("download_speed"));
        assert_eq!(snap.date_range, Some(DateRange::new(day("2024-01-01"), day("2024-01-04"))));
    }

    #[test]
    fn date_change_resets_run() {
        let mut ctx = NavigationContext::new(&sample());
        ctx.advance(AxisKind::Run, Direction::Prev);
        assert_eq!(ctx.run().current(), Some(&3));

        ctx.advance(AxisKind::Date, Direction::Next);
        assert_eq!(ctx.date().current(), Some(&day("2024-01-02")));
        assert_eq!(ctx.run().index(), Some(0));
        assert_eq!(ctx.run().candidates(), &[1, 2]);

        ctx.advance(AxisKind::Run, Direction::Next);
        ctx.pick(AxisKind::Date, "2024-01-01").unwrap();
        assert_eq!(ctx.run().index(), Some(0));
        assert_eq!(ctx.run().candidates(), &[1, 2, 3]);
    }

    #[test]
    fn rejected_picks_leave_state_unchanged() {
        let mut ctx = NavigationContext::new(&sample());
        ctx.advance(AxisKind::Date, Direction::Next);
        ctx.advance(AxisKind::Run, Direction::Next);
        let before = ctx.snapshot();

        assert_eq!(
            ctx.pick(AxisKind::Date, "2024-01-03"),
            Err(SelectionError::NotACandidate {
                axis: "date",
                value: "2024-01-03".to_string()
            })
        );
        assert!(matches!(
            ctx.pick(AxisKind::Date, "yesterday"),
            Err(SelectionError::InvalidValue { .. })
        ));
        assert_eq!(
            ctx.pick(AxisKind::Metric, "signal_dbm"),
            Err(SelectionError::UnknownMetric("signal_dbm".to_string()))
        );
        assert!(ctx.pick(AxisKind::Location, "UNKNOWN").is_err());
        assert!(ctx.pick(AxisKind::Run, "7").is_err());
        assert_eq!(ctx.snapshot(), before);
    }

    #[test]
    fn pick_moves_to_the_named_value() {
        let mut ctx = NavigationContext::new(&sample());
        assert_eq!(ctx.pick(AxisKind::Location, "SDB"), Ok(3));
        assert_eq!(ctx.pick(AxisKind::Metric, "rssi"), Ok(5));
        assert_eq!(ctx.pick(AxisKind::Run, "2"), Ok(1));
        assert_eq!(ctx.pick(AxisKind::Date, "2024-01-04"), Ok(2));
        assert_eq!(ctx.run().current(), Some(&1));
    }

    #[test]
    fn empty_dataset_has_no_data_everywhere() {
        let mut ctx = NavigationContext::new(&[]);
        assert_eq!(ctx.advance(AxisKind::Date, Direction::Next), None);
        assert_eq!(ctx.advance(AxisKind::Location, Direction::Prev), None);
        assert_eq!(ctx.pick(AxisKind::Date, "2024-01-01"), Err(SelectionError::NoData("date")));
        assert_eq!(ctx.shift_range(Direction::Next), None);
        // the metric axis comes from the catalog, not from data
        assert_eq!(ctx.advance(AxisKind::Metric, Direction::Prev), Some(CATALOG.len() - 1));
    }

    #[test]
    fn replayed_trigger_does_not_double_advance() {
        let mut ctx = NavigationContext::new(&sample());
        let next = Trigger {
            axis: AxisKind::Location,
            action: NavAction::Advance {
                direction: Direction::Next,
            },
            seq: 1,
        };
        assert_eq!(ctx.apply(&next), Ok(Some(1)));
        assert_eq!(ctx.apply(&next), Ok(Some(1)));

        let again = Trigger { seq: 2, ..next.clone() };
        assert_eq!(ctx.apply(&again), Ok(Some(2)));

        // counters are tracked per control
        let run_next = Trigger {
            axis: AxisKind::Run,
            seq: 1,
            ..next
        };
        assert_eq!(ctx.apply(&run_next), Ok(Some(1)));
    }

    #[test]
    fn rejected_trigger_is_not_recorded() {
        let mut ctx = NavigationContext::new(&sample());
        let bad = Trigger {
            axis: AxisKind::Date,
            action: NavAction::Pick {
                value: "2030-01-01".to_string(),
            },
            seq: 4,
        };
        assert!(ctx.apply(&bad).is_err());
        let good = Trigger {
            action: NavAction::Pick {
                value: "2024-01-02".to_string(),
            },
            ..bad
        };
        assert_eq!(ctx.apply(&good), Ok(Some(1)));
    }

    #[test]
    fn trigger_wire_format() {
        let trigger: Trigger =
            serde_json::from_str(r#"{"axis":"date","action":"advance","direction":"prev","seq":3}"#).unwrap();
        assert_eq!(trigger.axis, AxisKind::Date);
        assert_eq!(
            trigger.action,
            NavAction::Advance {
                direction: Direction::Prev
            }
        );
        let pick: Trigger = serde_json::from_str(r#"{"axis":"metric","action":"pick","value":"rssi","seq":1}"#).unwrap();
        assert_eq!(pick.action, NavAction::Pick { value: "rssi".to_string() });
    }

    #[test]
    fn range_shift_widens_and_clamps() {
        let first = day("2024-01-01");
        let last = day("2024-01-10");
        let range = DateRange::new(day("2024-01-05"), day("2024-01-06"));

        let earlier = range.shift(Direction::Prev, first, last);
        assert_eq!(earlier, DateRange::new(day("2024-01-04"), day("2024-01-06")));

        let later = range.shift(Direction::Next, first, last);
        assert_eq!(later, DateRange::new(day("2024-01-05"), day("2024-01-07")));

        let full = DateRange::new(first, last);
        assert_eq!(full.shift(Direction::Prev, first, last), full);
        assert_eq!(full.shift(Direction::Next, first, last), full);
    }

    #[test]
    fn refresh_tracks_shrinking_data() {
        let mut ctx = NavigationContext::new(&sample());
        ctx.pick(AxisKind::Location, "SDB").unwrap();
        ctx.pick(AxisKind::Date, "2024-01-02").unwrap();
        ctx.pick(AxisKind::Run, "2").unwrap();

        let mut fewer = sample();
        fewer.retain(|r| r.location != "SDB");
        ctx.refresh(&fewer);
        assert_eq!(ctx.location().current().map(String::as_str), Some("ECC"));
        assert_eq!(ctx.date().current(), Some(&day("2024-01-02")));
        assert_eq!(ctx.run().current(), Some(&2));

        ctx.refresh(&[]);
        assert_eq!(ctx.snapshot().location, None);
        assert_eq!(ctx.snapshot().run, None);
        assert_eq!(ctx.date_range(), None);
    }

    #[test]
    fn refresh_that_drops_the_selected_date_resets_run() {
        let mut records = Vec::new();
        for date in ["2024-01-01", "2024-01-02"] {
            for run in 1..=3 {
                records.push(record("ECC", &format!("{date} 09:00:00"), run));
            }
        }
        let mut ctx = NavigationContext::new(&records);
        ctx.pick(AxisKind::Date, "2024-01-02").unwrap();
        ctx.pick(AxisKind::Run, "3").unwrap();

        records.retain(|r| r.date() != day("2024-01-02"));
        ctx.refresh(&records);
        assert_eq!(ctx.date().current(), Some(&day("2024-01-01")));
        assert_eq!(ctx.run().index(), Some(0));
        assert_eq!(ctx.run().current(), Some(&1));
    }

    #[test]
    fn sessions_do_not_share_state() {
        let records = sample();
        let mut a = Session::new(&records);
        let b = Session::new(&records);
        a.context_mut(View::Heatmap)
            .unwrap()
            .advance(AxisKind::Metric, Direction::Next);
        assert_eq!(a.context(View::Heatmap).unwrap().metric().index(), Some(1));
        assert_eq!(a.context(View::Trends).unwrap().metric().index(), Some(0));
        assert_eq!(b.context(View::Heatmap).unwrap().metric().index(), Some(0));
    }

    #[test]
    fn view_names_round_trip() {
        for view in View::ALL {
            assert_eq!(view.to_string().parse::<View>(), Ok(view));
        }
        assert!("insights".parse::<View>().is_err());
    }

    proptest! {
        #[test]
        fn advancing_len_times_returns_to_origin(len in 1usize..40, start in 0usize..40) {
            let start = start % len;
            let mut axis = Axis::new((0..len as u32).collect());
            axis.pick(&(start as u32));
            for _ in 0..len {
                axis.advance(Direction::Next);
            }
            prop_assert_eq!(axis.index(), Some(start));
            for _ in 0..len {
                let idx = axis.advance(Direction::Prev);
                prop_assert!(idx.is_some_and(|i| i < len));
            }
            prop_assert_eq!(axis.index(), Some(start));
        }

        #[test]
        fn any_date_move_resets_run(date_steps in 1usize..6, run_steps in 0usize..6, forward in any::<bool>()) {
            let mut ctx = NavigationContext::new(&sample());
            let direction = if forward { Direction::Next } else { Direction::Prev };
            for _ in 0..date_steps {
                for _ in 0..run_steps {
                    ctx.advance(AxisKind::Run, Direction::Next);
                }
                ctx.advance(AxisKind::Date, direction);
                prop_assert_eq!(ctx.run().index(), Some(0));
            }
        }
    }
}
