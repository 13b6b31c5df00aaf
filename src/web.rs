use crate::aggregate::{
    aggregate_point, aggregate_series, hourly_means, latest_record, resolve_metrics, run_detail, spatial_points,
};
use crate::coords::{is_mapped, map_location};
use crate::error::StoreError;
use crate::loader::RecordLoader;
use crate::metrics::{self, MeasurementRecord, CATALOG};
use crate::selection::{DateRange, Session, Trigger, View, DATE_FORMAT};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Upper bound on one full read of the store
    pub load_timeout: Duration,
    /// Sessions untouched for longer than this are dropped
    pub session_ttl: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            load_timeout: Duration::from_secs(5),
            session_ttl: Duration::from_secs(30 * 60),
        }
    }
}

struct SessionEntry {
    session: Session,
    last_seen: Instant,
}

/// Navigation sessions keyed by id. Idle entries are swept on every access.
struct SessionRegistry {
    entries: HashMap<Uuid, SessionEntry>,
    ttl: Duration,
}

impl SessionRegistry {
    fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    fn sweep(&mut self) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries.retain(|_, entry| entry.last_seen.elapsed() <= ttl);
        let expired = before - self.entries.len();
        if expired > 0 {
            debug!("Expired {} idle session(s)", expired);
        }
        expired
    }

    fn insert(&mut self, id: Uuid, session: Session) {
        self.sweep();
        self.entries.insert(
            id,
            SessionEntry {
                session,
                last_seen: Instant::now(),
            },
        );
    }

    fn touch(&mut self, id: &Uuid) -> Option<&mut Session> {
        self.sweep();
        let entry = self.entries.get_mut(id)?;
        entry.last_seen = Instant::now();
        Some(&mut entry.session)
    }

    fn remove(&mut self, id: &Uuid) -> bool {
        self.sweep();
        self.entries.remove(id).is_some()
    }
}

#[derive(Clone)]
pub struct AppState {
    loader: RecordLoader,
    sessions: Arc<Mutex<SessionRegistry>>,
    load_timeout: Duration,
}

impl AppState {
    pub fn new(loader: RecordLoader, config: &ServerConfig) -> Self {
        Self {
            loader,
            sessions: Arc::new(Mutex::new(SessionRegistry::new(config.session_ttl))),
            load_timeout: config.load_timeout,
        }
    }

    /// Full read of the store for one interaction. Falls back to no data on timeout.
    async fn load_records(&self) -> Vec<MeasurementRecord> {
        let loader = self.loader.clone();
        let task = tokio::task::spawn_blocking(move || loader.load());
        match tokio::time::timeout(self.load_timeout, task).await {
            Ok(Ok(records)) => records,
            Ok(Err(e)) => {
                error!("Record load task failed: {}", e);
                Vec::new()
            }
            Err(_) => {
                warn!("{}", StoreError::Timeout(self.load_timeout.as_millis() as u64));
                Vec::new()
            }
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/catalog", get(catalog_handler))
        .route("/api/records", get(records_handler))
        .route("/api/aggregate/point", get(point_handler))
        .route("/api/aggregate/series", get(series_handler))
        .route("/api/heatmap", get(heatmap_handler))
        .route("/api/hourly", get(hourly_handler))
        .route("/api/locations/:name/coords", get(coords_handler))
        .route("/api/locations/:name/latest", get(latest_handler))
        .route("/api/runs/detail", get(run_detail_handler))
        .route("/api/sessions", post(create_session_handler))
        .route("/api/sessions/:id", delete(delete_session_handler))
        .route("/api/sessions/:id/:view", get(session_view_handler))
        .route("/api/sessions/:id/:view/navigate", post(navigate_handler))
        .layer(cors)
        .with_state(state)
}

pub async fn start_web_server(state: AppState, config: &ServerConfig) -> anyhow::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    info!("Web server listening on port {}", config.port);
    axum::serve(listener, app).await?;
    Ok(())
}

fn failure(status: StatusCode, message: impl ToString) -> Response {
    (
        status,
        Json(serde_json::json!({
            "success": false,
            "error": message.to_string()
        })),
    )
        .into_response()
}

fn parse_date(raw: &str) -> Result<NaiveDate, Response> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|_| failure(StatusCode::BAD_REQUEST, format!("Invalid date: {raw}")))
}

fn parse_metric(raw: &str) -> Result<&'static metrics::MetricDef, Response> {
    metrics::find(raw).ok_or_else(|| failure(StatusCode::BAD_REQUEST, format!("Unknown metric: {raw}")))
}

#[derive(Deserialize)]
struct PointQuery {
    date: String,
    run: u32,
}

#[derive(Deserialize)]
struct SeriesQuery {
    location: String,
    start: Option<String>,
    end: Option<String>,
    metrics: Option<String>,
}

#[derive(Deserialize)]
struct HeatmapQuery {
    date: String,
    run: u32,
    metric: String,
}

#[derive(Deserialize)]
struct HourlyQuery {
    location: String,
    metric: String,
}

#[derive(Deserialize)]
struct RunDetailQuery {
    location: String,
    date: String,
    run: u32,
}

async fn catalog_handler() -> Response {
    Json(serde_json::json!({
        "success": true,
        "data": CATALOG
    }))
    .into_response()
}

async fn records_handler(State(state): State<AppState>) -> Response {
    let records = state.load_records().await;
    Json(serde_json::json!({
        "success": true,
        "count": records.len(),
        "data": records
    }))
    .into_response()
}

async fn point_handler(State(state): State<AppState>, Query(params): Query<PointQuery>) -> Response {
    let date = match parse_date(&params.date) {
        Ok(d) => d,
        Err(resp) => return resp,
    };
    let records = state.load_records().await;
    let rows = aggregate_point(&records, date, params.run);
    Json(serde_json::json!({
        "success": true,
        "count": rows.len(),
        "data": rows
    }))
    .into_response()
}

async fn series_handler(State(state): State<AppState>, Query(params): Query<SeriesQuery>) -> Response {
    let range = match (params.start.as_deref(), params.end.as_deref()) {
        (Some(start), Some(end)) => match (parse_date(start), parse_date(end)) {
            (Ok(s), Ok(e)) => Some(DateRange::new(s, e)),
            (Err(resp), _) | (_, Err(resp)) => return resp,
        },
        _ => None,
    };

    let keys: Vec<&str> = match params.metrics.as_deref() {
        Some(list) if !list.trim().is_empty() => list.split(',').map(str::trim).collect(),
        _ => metrics::keys().collect(),
    };
    let selected = match resolve_metrics(&keys) {
        Ok(selected) => selected,
        Err(e) => return failure(StatusCode::BAD_REQUEST, e),
    };

    let records = state.load_records().await;
    let series = aggregate_series(&records, &params.location, range, &selected);
    Json(serde_json::json!({
        "success": true,
        "location": params.location,
        "data": series
    }))
    .into_response()
}

async fn heatmap_handler(State(state): State<AppState>, Query(params): Query<HeatmapQuery>) -> Response {
    let (date, metric) = match (parse_date(&params.date), parse_metric(&params.metric)) {
        (Ok(d), Ok(m)) => (d, m),
        (Err(resp), _) | (_, Err(resp)) => return resp,
    };
    let records = state.load_records().await;
    let rows = aggregate_point(&records, date, params.run);
    let points = spatial_points(&rows, metric);
    Json(serde_json::json!({
        "success": true,
        "metric": metric.key,
        "count": points.len(),
        "data": points
    }))
    .into_response()
}

async fn hourly_handler(State(state): State<AppState>, Query(params): Query<HourlyQuery>) -> Response {
    let metric = match parse_metric(&params.metric) {
        Ok(m) => m,
        Err(resp) => return resp,
    };
    let records = state.load_records().await;
    let hours = hourly_means(&records, &params.location, metric);
    Json(serde_json::json!({
        "success": true,
        "metric": metric.key,
        "data": hours
    }))
    .into_response()
}

async fn coords_handler(Path(name): Path<String>) -> Response {
    let coords = map_location(&name);
    Json(serde_json::json!({
        "success": true,
        "location": name,
        "mapped": is_mapped(coords),
        "data": coords
    }))
    .into_response()
}

async fn latest_handler(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    let records = state.load_records().await;
    match latest_record(&records, &name) {
        Some(record) => Json(serde_json::json!({
            "success": true,
            "data": record
        }))
        .into_response(),
        None => Json(serde_json::json!({
            "success": true,
            "data": null,
            "message": "No data collected for this location"
        }))
        .into_response(),
    }
}

async fn run_detail_handler(State(state): State<AppState>, Query(params): Query<RunDetailQuery>) -> Response {
    let date = match parse_date(&params.date) {
        Ok(d) => d,
        Err(resp) => return resp,
    };
    let records = state.load_records().await;
    Json(serde_json::json!({
        "success": true,
        "data": run_detail(&records, &params.location, date, params.run)
    }))
    .into_response()
}

async fn create_session_handler(State(state): State<AppState>) -> Response {
    let records = state.load_records().await;
    let session = Session::new(&records);
    let id = Uuid::new_v4();
    let snapshot = session.context(View::Overview).map(|c| c.snapshot());

    match state.sessions.lock() {
        Ok(mut sessions) => {
            sessions.insert(id, session);
            info!("Created navigation session {}", id);
            Json(serde_json::json!({
                "success": true,
                "session_id": id.to_string(),
                "data": snapshot
            }))
            .into_response()
        }
        Err(_) => failure(StatusCode::INTERNAL_SERVER_ERROR, "Session registry unavailable"),
    }
}

async fn delete_session_handler(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let Ok(id) = Uuid::parse_str(&id) else {
        return failure(StatusCode::BAD_REQUEST, format!("Invalid session id: {id}"));
    };
    let Ok(mut sessions) = state.sessions.lock() else {
        return failure(StatusCode::INTERNAL_SERVER_ERROR, "Session registry unavailable");
    };
    if sessions.remove(&id) {
        info!("Closed navigation session {}", id);
        Json(serde_json::json!({ "success": true })).into_response()
    } else {
        failure(StatusCode::NOT_FOUND, format!("Unknown session: {id}"))
    }
}

fn parse_session_path(id: &str, view: &str) -> Result<(Uuid, View), Response> {
    let id = Uuid::parse_str(id).map_err(|_| failure(StatusCode::BAD_REQUEST, format!("Invalid session id: {id}")))?;
    let view = view.parse::<View>().map_err(|e| failure(StatusCode::NOT_FOUND, e))?;
    Ok((id, view))
}

async fn session_view_handler(State(state): State<AppState>, Path((id, view)): Path<(String, String)>) -> Response {
    let (id, view) = match parse_session_path(&id, &view) {
        Ok(parsed) => parsed,
        Err(resp) => return resp,
    };
    let records = state.load_records().await;

    let Ok(mut sessions) = state.sessions.lock() else {
        return failure(StatusCode::INTERNAL_SERVER_ERROR, "Session registry unavailable");
    };
    let Some(context) = sessions.touch(&id).and_then(|s| s.context_mut(view)) else {
        return failure(StatusCode::NOT_FOUND, format!("Unknown session: {id}"));
    };
    context.refresh(&records);
    Json(serde_json::json!({
        "success": true,
        "view": view,
        "data": context.snapshot()
    }))
    .into_response()
}

async fn navigate_handler(
    State(state): State<AppState>,
    Path((id, view)): Path<(String, String)>,
    Json(trigger): Json<Trigger>,
) -> Response {
    let (id, view) = match parse_session_path(&id, &view) {
        Ok(parsed) => parsed,
        Err(resp) => return resp,
    };
    let records = state.load_records().await;

    let Ok(mut sessions) = state.sessions.lock() else {
        return failure(StatusCode::INTERNAL_SERVER_ERROR, "Session registry unavailable");
    };
    let Some(context) = sessions.touch(&id).and_then(|s| s.context_mut(view)) else {
        return failure(StatusCode::NOT_FOUND, format!("Unknown session: {id}"));
    };
    context.refresh(&records);

    match context.apply(&trigger) {
        Ok(index) => {
            debug!(session = %id, view = %view, axis = ?trigger.axis, ?index, "Navigation applied");
            Json(serde_json::json!({
                "success": true,
                "index": index,
                "data": context.snapshot()
            }))
            .into_response()
        }
        Err(e) => {
            warn!(session = %id, view = %view, "Rejected navigation: {}", e);
            (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({
                    "success": false,
                    "error": e.to_string(),
                    "data": context.snapshot()
                })),
            )
                .into_response()
        }
    }
}
