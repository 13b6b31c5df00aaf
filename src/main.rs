use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use wifi_survey_dashboard::analysis;
use wifi_survey_dashboard::loader::RecordLoader;
use wifi_survey_dashboard::metrics::MeasurementRecord;
use wifi_survey_dashboard::seed::{seed_store, SeedPlan};
use wifi_survey_dashboard::selection::{DateRange, DATE_FORMAT};
use wifi_survey_dashboard::storage::SqliteDocumentStore;
use wifi_survey_dashboard::web::{start_web_server, AppState, ServerConfig};

#[derive(Parser)]
#[command(name = "wifi-survey-dashboard")]
#[command(about = "Navigate and aggregate WiFi site-survey measurements", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the dashboard API over the survey store
    Serve {
        /// Path to the survey database
        #[arg(short, long, default_value = "wifi_survey.db")]
        database: PathBuf,

        /// Port for the dashboard API
        #[arg(short, long, default_value = "8080")]
        port: u16,

        /// Path to store log files
        #[arg(short, long, default_value = "logs")]
        log_dir: PathBuf,

        /// Give up on a store read after this many milliseconds
        #[arg(long, default_value = "5000")]
        load_timeout_ms: u64,

        /// Drop navigation sessions idle for longer than this many seconds
        #[arg(long, default_value = "1800")]
        session_ttl_secs: u64,
    },
    /// Fill the database with random survey runs
    Seed {
        /// Path to the survey database
        #[arg(short, long, default_value = "wifi_survey.db")]
        database: PathBuf,

        /// Number of survey days, ending today
        #[arg(long, default_value = "7")]
        days: u32,

        /// Survey runs per day
        #[arg(long, default_value = "2")]
        runs_per_day: u32,

        /// Remove existing documents first
        #[arg(long, default_value = "false")]
        reset: bool,
    },
    /// Export measurements to JSON
    Export {
        /// Path to the survey database
        #[arg(short, long, default_value = "wifi_survey.db")]
        database: PathBuf,

        /// Output file path
        #[arg(short, long, default_value = "wifi_survey_export.json")]
        output: PathBuf,

        /// First survey day to include (YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,

        /// Last survey day to include (YYYY-MM-DD)
        #[arg(long)]
        end: Option<String>,
    },
    /// Summarize the survey and write a text report
    Report {
        /// Path to the survey database
        #[arg(short, long, default_value = "wifi_survey.db")]
        database: PathBuf,

        /// Output report file
        #[arg(short, long, default_value = "wifi_survey_report.txt")]
        output: PathBuf,
    },
}

fn open_store(database: &Path, busy_timeout: Duration) -> anyhow::Result<Arc<SqliteDocumentStore>> {
    let store = SqliteDocumentStore::new(database, busy_timeout)
        .with_context(|| format!("opening survey database {:?}", database))?;
    Ok(Arc::new(store))
}

fn parse_day(raw: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).with_context(|| format!("invalid date {raw:?}, expected YYYY-MM-DD"))
}

fn filter_by_days(records: Vec<MeasurementRecord>, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Vec<MeasurementRecord> {
    let range = DateRange::new(start.unwrap_or(NaiveDate::MIN), end.unwrap_or(NaiveDate::MAX));
    records.into_iter().filter(|r| range.contains(r.date())).collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            database,
            port,
            log_dir,
            load_timeout_ms,
            session_ttl_secs,
        } => {
            // Set up logging
            std::fs::create_dir_all(&log_dir)?;
            let file_appender = RollingFileAppender::new(Rotation::HOURLY, &log_dir, "wifi-survey.log");
            let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

            tracing_subscriber::registry()
                .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
                .with(fmt::layer().with_writer(std::io::stdout))
                .with(fmt::layer().json().with_writer(non_blocking))
                .init();

            let config = ServerConfig {
                port,
                load_timeout: Duration::from_millis(load_timeout_ms),
                session_ttl: Duration::from_secs(session_ttl_secs),
            };

            info!("Starting WiFi Survey Dashboard");
            info!("Database: {:?}", database);
            info!("Store read timeout: {}ms", load_timeout_ms);
            info!("Idle session expiry: {}s", session_ttl_secs);
            info!("Dashboard API: http://localhost:{}/api/catalog", port);

            let store = open_store(&database, config.load_timeout)?;
            let state = AppState::new(RecordLoader::new(store), &config);

            tokio::select! {
                result = start_web_server(state, &config) => result?,
                _ = tokio::signal::ctrl_c() => info!("Shutting down..."),
            }
            Ok(())
        }
        Commands::Seed {
            database,
            days,
            runs_per_day,
            reset,
        } => {
            tracing_subscriber::registry()
                .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
                .with(fmt::layer())
                .init();

            let store = open_store(&database, Duration::from_secs(5))?;
            if reset {
                let removed = store.clear()?;
                info!("Removed {} existing location document(s)", removed);
            }

            let plan = SeedPlan {
                days,
                runs_per_day,
                last_day: Local::now().date_naive(),
            };
            let written = seed_store(&store, &plan, &mut StdRng::from_os_rng())?;
            println!("Seeded {} measurements into {:?}", written, database);
            Ok(())
        }
        Commands::Export {
            database,
            output,
            start,
            end,
        } => {
            let start = start.as_deref().map(parse_day).transpose()?;
            let end = end.as_deref().map(parse_day).transpose()?;

            let store = open_store(&database, Duration::from_secs(5))?;
            let records = filter_by_days(RecordLoader::new(store).load(), start, end);
            let data = serde_json::to_string_pretty(&records)?;
            std::fs::write(&output, data)?;
            println!("Exported {} measurements to {:?}", records.len(), output);
            Ok(())
        }
        Commands::Report { database, output } => {
            let store = open_store(&database, Duration::from_secs(5))?;
            let records = RecordLoader::new(store).load();
            let report = analysis::generate_report(&records);
            std::fs::write(&output, &report)?;
            println!("{}", report);
            println!("\nReport saved to {:?}", output);
            Ok(())
        }
    }
}
