use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use wifi_survey_dashboard::aggregate::{aggregate_point, aggregate_series, spatial_points, NO_DATA_EPSILON};
use wifi_survey_dashboard::analysis::generate_report;
use wifi_survey_dashboard::loader::RecordLoader;
use wifi_survey_dashboard::metrics::{self, CATALOG};
use wifi_survey_dashboard::seed::{dummy_measurement, seed_store, SeedPlan};
use wifi_survey_dashboard::selection::{AxisKind, DateRange, Direction, NavAction, NavigationContext, Trigger};
use wifi_survey_dashboard::storage::SqliteDocumentStore;

fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn seeded_loader(days: u32) -> RecordLoader {
    let store = Arc::new(SqliteDocumentStore::open_in_memory().unwrap());
    let plan = SeedPlan {
        days,
        runs_per_day: 2,
        last_day: day("2024-03-10"),
    };
    seed_store(&store, &plan, &mut StdRng::seed_from_u64(11)).unwrap();
    RecordLoader::new(store)
}

#[test]
fn seeded_survey_drives_every_view() {
    let records = seeded_loader(4).load();
    assert_eq!(records.len(), 4 * 2 * 5);

    // run analysis / heatmap
    let rows = aggregate_point(&records, day("2024-03-09"), 2);
    assert_eq!(rows.len(), 5);
    assert!(rows.iter().all(|r| r.count == 1));
    let points = spatial_points(&rows, metrics::find("rssi").unwrap());
    assert_eq!(points.len(), 5);
    assert!(points.iter().all(|p| (p.marker_size - 50.0).abs() < 1e-9));

    // trends
    let all: Vec<_> = CATALOG.iter().collect();
    let series = aggregate_series(&records, "SDB", None, &all);
    assert_eq!(series.run_labels.len(), 8);
    assert_eq!(series.per_metric.len(), CATALOG.len());
    for metric in &series.per_metric {
        for point in &metric.points {
            let h = point.bar_height();
            assert!((0.0..=1.0).contains(&h), "{} out of range: {}", metric.metric, h);
        }
    }

    let window = DateRange::new(day("2024-03-09"), day("2024-03-10"));
    let windowed = aggregate_series(&records, "SDB", Some(window), &all);
    assert_eq!(windowed.run_labels.len(), 4);
    // bounds still come from the whole dataset
    assert_eq!(windowed.per_metric[0].range, series.per_metric[0].range);

    let report = generate_report(&records);
    assert!(report.contains("Total Samples: 40"));
    assert!(report.contains("Survey Days:   4"));
}

#[test]
fn location_missing_a_run_gets_a_gap() {
    let store = Arc::new(SqliteDocumentStore::open_in_memory().unwrap());
    let mut rng = StdRng::seed_from_u64(3);
    let d = day("2024-02-01");
    store.push_measurement("SDB", &dummy_measurement("SDB", d, 1, &mut rng)).unwrap();
    store.push_measurement("SDB", &dummy_measurement("SDB", d, 2, &mut rng)).unwrap();
    store.push_measurement("GEC", &dummy_measurement("GEC", d, 1, &mut rng)).unwrap();

    let records = RecordLoader::new(store).load();
    let series = aggregate_series(&records, "GEC", None, &[metrics::find("latency_ms").unwrap()]);
    let points = &series.per_metric[0].points;
    assert_eq!(points.len(), 2);
    assert!(points[0].mean.is_some());
    assert!(points[1].mean.is_none());
    assert_eq!(points[1].bar_height(), NO_DATA_EPSILON);
}

#[test]
fn navigation_follows_reloaded_data() {
    let loader = seeded_loader(2);
    let records = loader.load();
    let mut ctx = NavigationContext::new(&records);
    assert_eq!(ctx.date().current(), Some(&day("2024-03-09")));

    let next_day = Trigger {
        axis: AxisKind::Date,
        action: NavAction::Advance {
            direction: Direction::Next,
        },
        seq: 1,
    };
    assert_eq!(ctx.apply(&next_day), Ok(Some(1)));
    assert_eq!(ctx.date().current(), Some(&day("2024-03-10")));

    // wraps back to the first day
    let again = Trigger { seq: 2, ..next_day };
    assert_eq!(ctx.apply(&again), Ok(Some(0)));

    // a reload with the same data keeps the selection
    ctx.refresh(&loader.load());
    assert_eq!(ctx.date().current(), Some(&day("2024-03-09")));
    assert_eq!(ctx.run().candidates(), &[1, 2]);
}
