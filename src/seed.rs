//! Fills a store with random survey data for demos and local testing.

use crate::coords::{map_location, registered_locations};
use crate::error::StoreResult;
use crate::metrics::TIMESTAMP_FORMAT;
use crate::storage::SqliteDocumentStore;
use chrono::{Duration, NaiveDate, NaiveTime};
use rand::Rng;
use serde_json::{json, Value};
use tracing::info;

#[derive(Debug, Clone, Copy)]
pub struct SeedPlan {
    pub days: u32,
    pub runs_per_day: u32,
    /// Most recent survey day; earlier days count backwards from it
    pub last_day: NaiveDate,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

pub fn dummy_measurement<R: Rng>(location: &str, date: NaiveDate, run_no: u32, rng: &mut R) -> Value {
    let time = NaiveTime::from_hms_opt(rng.random_range(9..=18), rng.random_range(0..60), rng.random_range(0..60))
        .unwrap_or(NaiveTime::MIN);
    let coords = map_location(location);

    json!({
        "timestamp": date.and_time(time).format(TIMESTAMP_FORMAT).to_string(),
        "run_no": run_no,
        "location": {
            "position[x]": coords.x,
            "position[y]": coords.y,
            "position[name]": location,
        },
        "download_speed": round2(rng.random_range(10.0..100.0)),
        "upload_speed": round2(rng.random_range(5.0..50.0)),
        "latency_ms": round2(rng.random_range(10.0..100.0)),
        "jitter_ms": round2(rng.random_range(0.0..20.0)),
        "packet_loss": round2(rng.random_range(0.0..5.0)),
        "rssi": rng.random_range(30..=90),
    })
}

/// Writes one measurement per registered location for every run of every day.
/// Returns the number of measurements written.
pub fn seed_store<R: Rng>(store: &SqliteDocumentStore, plan: &SeedPlan, rng: &mut R) -> StoreResult<usize> {
    let mut written = 0;
    for offset in 0..plan.days {
        let date = plan.last_day - Duration::days(i64::from(offset));
        for run_no in 1..=plan.runs_per_day {
            for location in registered_locations() {
                store.push_measurement(location, &dummy_measurement(location, date, run_no, rng))?;
                written += 1;
            }
        }
    }
    info!("Seeded {} measurements over {} day(s)", written, plan.days);
    Ok(written)
}
