use crate::aggregate::{latest_per_location, null_aware_mean};
use crate::metrics::{self, MeasurementRecord, CATALOG};
use crate::selection::CandidateIndex;
use std::collections::BTreeMap;

const RULE_HEAVY: &str = "═══════════════════════════════════════════════════════════════════\n";
const RULE_LIGHT: &str = "───────────────────────────────────────────────────────────────────\n";

fn section(report: &mut String, title: &str) {
    report.push_str(RULE_LIGHT);
    report.push_str(&format!("{:^67}\n", title));
    report.push_str(RULE_LIGHT);
    report.push('\n');
}

pub fn generate_report(records: &[MeasurementRecord]) -> String {
    let mut report = String::new();

    // Header
    report.push_str(RULE_HEAVY);
    report.push_str(&format!("{:^67}\n", "WiFi Survey Report"));
    report.push_str(RULE_HEAVY);
    report.push('\n');

    if records.is_empty() {
        report.push_str("  No measurements available.\n\n");
        report.push_str(RULE_HEAVY);
        return report;
    }

    let index = CandidateIndex::from_records(records);
    let first = records.iter().map(|r| r.timestamp).min();
    let last = records.iter().map(|r| r.timestamp).max();
    if let (Some(first), Some(last)) = (first, last) {
        report.push_str(&format!(
            "Report Period: {} to {}\n",
            first.format("%Y-%m-%d %H:%M:%S"),
            last.format("%Y-%m-%d %H:%M:%S")
        ));
    }
    report.push_str(&format!("Total Samples: {}\n", records.len()));
    report.push_str(&format!("Locations:     {}\n", index.locations.len()));
    report.push_str(&format!("Survey Days:   {}\n\n", index.dates.len()));

    // Runs per day
    section(&mut report, "SURVEY RUNS");
    for date in &index.dates {
        let runs: Vec<String> = index.runs_on(*date).iter().map(|r| r.to_string()).collect();
        report.push_str(&format!("  {}  runs {}\n", date, runs.join(", ")));
    }
    report.push('\n');

    // Latest readings
    section(&mut report, "LATEST READINGS");
    for latest in latest_per_location(records) {
        report.push_str(&format!(
            "  {} (run {}, {})\n",
            latest.location,
            latest.run_no,
            latest.timestamp.format("%Y-%m-%d %H:%M")
        ));
        for (metric, value) in latest.values.iter() {
            let shown = value.map(|v| metric.format_value(v)).unwrap_or_else(|| "N/A".to_string());
            report.push_str(&format!("    {:<16} {:>14}\n", metric.label, shown));
        }
    }
    report.push('\n');

    // Averages
    section(&mut report, "LOCATION AVERAGES");
    let averages = location_averages(records);
    report.push_str(&format!("  {:<12}", "Location"));
    for metric in CATALOG.iter() {
        report.push_str(&format!("{:>10}", metric.unit));
    }
    report.push('\n');
    for (location, means) in &averages {
        report.push_str(&format!("  {:<12}", location));
        for mean in means {
            match mean {
                Some(v) => report.push_str(&format!("{:>10.2}", v)),
                None => report.push_str(&format!("{:>10}", "--")),
            }
        }
        report.push('\n');
    }
    report.push('\n');

    // Issues
    section(&mut report, "ISSUES DETECTED");
    let issues = analyze_issues(&averages, records);
    if issues.is_empty() {
        report.push_str("  No significant issues detected.\n\n");
    } else {
        for (i, issue) in issues.iter().enumerate() {
            report.push_str(&format!("  {}. {}\n", i + 1, issue));
        }
        report.push('\n');
    }

    report.push_str(RULE_HEAVY);
    report.push_str(&format!("{:^67}\n", "END OF REPORT"));
    report.push_str(RULE_HEAVY);

    report
}

/// Overall mean of every catalog metric per location, in catalog order
fn location_averages(records: &[MeasurementRecord]) -> BTreeMap<String, Vec<Option<f64>>> {
    let mut grouped: BTreeMap<String, Vec<&MeasurementRecord>> = BTreeMap::new();
    for r in records {
        grouped.entry(r.location.clone()).or_default().push(r);
    }
    grouped
        .into_iter()
        .map(|(location, group)| {
            let means = CATALOG
                .iter()
                .map(|m| null_aware_mean(group.iter().map(|r| r.value(m.key))))
                .collect();
            (location, means)
        })
        .collect()
}

fn average_of(means: &[Option<f64>], key: &str) -> Option<f64> {
    let idx = metrics::index_of(key)?;
    means.get(idx).copied().flatten()
}

fn latency_rating(ms: f64) -> &'static str {
    match ms as i32 {
        i32::MIN..=20 => "(Excellent)",
        21..=50 => "(Good)",
        51..=100 => "(Fair)",
        101..=200 => "(Poor)",
        _ => "(Very Poor)",
    }
}

fn jitter_rating(ms: f64) -> &'static str {
    match ms as i32 {
        i32::MIN..=10 => "(Excellent)",
        11..=20 => "(Good)",
        21..=30 => "(Fair)",
        31..=50 => "(Poor)",
        _ => "(Very Poor)",
    }
}

fn analyze_issues(averages: &BTreeMap<String, Vec<Option<f64>>>, records: &[MeasurementRecord]) -> Vec<String> {
    let mut issues = Vec::new();

    for (location, means) in averages {
        if let Some(latency) = average_of(means, "latency_ms") {
            if latency > 50.0 {
                issues.push(format!(
                    "{}: average latency {:.1} ms {}",
                    location,
                    latency,
                    latency_rating(latency)
                ));
            }
        }
        if let Some(jitter) = average_of(means, "jitter_ms") {
            if jitter > 20.0 {
                issues.push(format!(
                    "{}: average jitter {:.1} ms {}",
                    location,
                    jitter,
                    jitter_rating(jitter)
                ));
            }
        }
        if let Some(loss) = average_of(means, "packet_loss") {
            if loss > 1.0 {
                issues.push(format!("{}: average packet loss {:.2}%", location, loss));
            }
        }
    }

    // Sensor gaps
    for metric in CATALOG.iter() {
        let gaps = records.iter().filter(|r| r.value(metric.key).is_none()).count();
        if gaps > 0 {
            issues.push(format!("{} missing in {} of {} samples", metric.label, gaps, records.len()));
        }
    }

    // Slowest location overall
    let slowest = averages
        .iter()
        .filter_map(|(loc, means)| average_of(means, "download_speed").map(|v| (loc, v)))
        .min_by(|a, b| a.1.total_cmp(&b.1));
    if let Some((loc, v)) = slowest {
        if averages.len() > 1 {
            issues.push(format!("{} has the lowest average download speed ({:.2} Mbps)", loc, v));
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{MetricValues, TIMESTAMP_FORMAT};
    use chrono::NaiveDateTime;

    fn record(location: &str, ts: &str, run_no: u32, latency: Option<f64>, download: f64) -> MeasurementRecord {
        let mut values = MetricValues::from_fn(|_| Some(1.0));
        values.set("latency_ms", latency);
        values.set("download_speed", Some(download));
        MeasurementRecord {
            timestamp: NaiveDateTime::parse_from_str(ts, TIMESTAMP_FORMAT).unwrap(),
            location: location.to_string(),
            run_no,
            values,
        }
    }

    #[test]
    fn empty_dataset_report() {
        let report = generate_report(&[]);
        assert!(report.contains("WiFi Survey Report"));
        assert!(report.contains("No measurements available."));
    }

    #[test]
    fn report_lists_runs_latest_values_and_issues() {
        let records = vec![
            record("ECC", "2024-01-01 09:00:00", 1, Some(20.0), 80.0),
            record("ECC", "2024-01-02 09:00:00", 2, None, 90.0),
            record("GEC", "2024-01-01 10:00:00", 1, Some(150.0), 12.0),
        ];
        let report = generate_report(&records);

        assert!(report.contains("Total Samples: 3"));
        assert!(report.contains("2024-01-01  runs 1"));
        assert!(report.contains("2024-01-02  runs 2"));
        assert!(report.contains("ECC (run 2, 2024-01-02 09:00)"));
        assert!(report.contains("GEC: average latency 150.0 ms (Poor)"));
        assert!(report.contains("Latency missing in 1 of 3 samples"));
        assert!(report.contains("GEC has the lowest average download speed (12.00 Mbps)"));
        assert!(!report.contains("ECC: average latency"));
        assert!(report.contains("END OF REPORT"));
    }

    #[test]
    fn ratings_cover_bounds() {
        assert_eq!(latency_rating(0.0), "(Excellent)");
        assert_eq!(latency_rating(250.0), "(Very Poor)");
        assert_eq!(jitter_rating(25.0), "(Fair)");
    }
}
