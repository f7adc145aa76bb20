use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, Query, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info};

use flux_core::body_fat::{lean_body_mass, navy_body_fat};
use flux_core::models::{
    BodyLog, Dashboard, DayLog, ExportData, ImportSummary, Sex, TrendPoint, UserSettings,
    WeekSummary, validate_body_log, validate_day_log, validate_settings,
};
use flux_core::projection::MAX_TREND_DAYS;
use flux_core::service::TrackerService;
use flux_core::store::validate_bundle;

const BODY_LIMIT: usize = 10 * 1024 * 1024; // 10 MB
const DEFAULT_TREND_DAYS: u32 = 30;

#[derive(Clone)]
struct AppState {
    svc: Arc<Mutex<TrackerService>>,
    api_key: Option<String>,
}

impl AppState {
    fn svc(&self) -> MutexGuard<'_, TrackerService> {
        self.svc
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

// --- Request / Response types ---

#[derive(Deserialize)]
struct RangeQuery {
    from: Option<String>,
    to: Option<String>,
}

#[derive(Deserialize)]
struct TrendQuery {
    days: Option<u32>,
}

#[derive(Deserialize)]
struct PutLogRequest {
    weight: Option<f64>,
    calories: Option<f64>,
}

#[derive(Deserialize)]
struct PutBodyLogRequest {
    weight: f64,
    neck: Option<f64>,
    waist: Option<f64>,
    hips: Option<f64>,
    #[serde(alias = "bfPercent")]
    bf_percent: Option<f64>,
}

#[derive(Deserialize)]
struct BodyFatRequest {
    neck: f64,
    waist: f64,
    height: f64,
    sex: Sex,
    hips: Option<f64>,
    weight: Option<f64>,
}

#[derive(Serialize)]
struct BodyFatResponse {
    bf_percent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    lean_mass: Option<f64>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Internal(err) => {
                error!("internal server error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

fn bad_request(err: &anyhow::Error) -> ApiError {
    ApiError::BadRequest(format!("{err:#}"))
}

fn parse_date(value: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("Invalid date '{value}'. Use YYYY-MM-DD")))
}

fn no_settings() -> ApiError {
    ApiError::NotFound("No settings found. Save settings first".to_string())
}

// --- Middleware ---

async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(ref expected_key) = state.api_key {
        let authorized = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected_key);

        if !authorized {
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Invalid or missing API key".to_string(),
                }),
            )
                .into_response();
        }
    }
    next.run(request).await
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Settings handlers ---

async fn get_settings(State(state): State<AppState>) -> Result<Json<UserSettings>, ApiError> {
    let settings = state.svc().settings().context("database error")?;
    settings.map(Json).ok_or_else(no_settings)
}

async fn put_settings(
    State(state): State<AppState>,
    Json(settings): Json<UserSettings>,
) -> Result<Json<UserSettings>, ApiError> {
    validate_settings(&settings).map_err(|e| bad_request(&e))?;
    state
        .svc()
        .save_settings(&settings)
        .context("failed to save settings")?;
    Ok(Json(settings))
}

// --- Day log handlers ---

async fn get_logs(
    State(state): State<AppState>,
    Query(range): Query<RangeQuery>,
) -> Result<Json<Vec<DayLog>>, ApiError> {
    let from = range.from.as_deref().map(parse_date).transpose()?;
    let to = range.to.as_deref().map(parse_date).transpose()?;
    let logs = state.svc().logs(from, to).context("database error")?;
    Ok(Json(logs))
}

async fn put_log(
    State(state): State<AppState>,
    Path(date_str): Path<String>,
    Json(req): Json<PutLogRequest>,
) -> Result<Json<DayLog>, ApiError> {
    let log = DayLog {
        date: parse_date(&date_str)?,
        weight: req.weight,
        calories: req.calories,
    };
    if log.weight.is_none() && log.calories.is_none() {
        return Err(ApiError::BadRequest(
            "Give a weight, calories, or both".to_string(),
        ));
    }
    validate_day_log(&log).map_err(|e| bad_request(&e))?;
    state.svc().put_log(&log).context("failed to save log")?;
    Ok(Json(log))
}

async fn delete_log(
    State(state): State<AppState>,
    Path(date_str): Path<String>,
) -> Result<StatusCode, ApiError> {
    let date = parse_date(&date_str)?;
    if state.svc().delete_log(date).context("database error")? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("No log for {date_str}")))
    }
}

// --- Body log handlers ---

async fn get_body_logs(State(state): State<AppState>) -> Result<Json<Vec<BodyLog>>, ApiError> {
    let logs = state.svc().body_logs().context("database error")?;
    Ok(Json(logs))
}

async fn put_body_log(
    State(state): State<AppState>,
    Path(date_str): Path<String>,
    Json(req): Json<PutBodyLogRequest>,
) -> Result<Json<BodyLog>, ApiError> {
    let entry = BodyLog {
        date: parse_date(&date_str)?,
        weight: req.weight,
        neck: req.neck,
        waist: req.waist,
        hips: req.hips,
        bf_percent: req.bf_percent,
    };
    validate_body_log(&entry).map_err(|e| bad_request(&e))?;
    let (saved, _) = state
        .svc()
        .log_body(&entry)
        .context("failed to save body log")?;
    Ok(Json(saved))
}

async fn delete_body_log(
    State(state): State<AppState>,
    Path(date_str): Path<String>,
) -> Result<StatusCode, ApiError> {
    let date = parse_date(&date_str)?;
    if state.svc().delete_body_log(date).context("database error")? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("No body log for {date_str}")))
    }
}

async fn compute_body_fat(
    Json(req): Json<BodyFatRequest>,
) -> Result<Json<BodyFatResponse>, ApiError> {
    let bf = navy_body_fat(req.neck, req.waist, req.height, req.sex, req.hips)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    Ok(Json(BodyFatResponse {
        bf_percent: bf,
        lean_mass: req.weight.map(|w| lean_body_mass(w, bf)),
    }))
}

// --- Derived views ---

async fn get_weeks(State(state): State<AppState>) -> Result<Json<Vec<WeekSummary>>, ApiError> {
    let svc = state.svc();
    if svc.settings().context("database error")?.is_none() {
        return Err(no_settings());
    }
    let weeks = svc.week_summaries().context("failed to build weeks")?;
    Ok(Json(weeks))
}

async fn get_dashboard(State(state): State<AppState>) -> Result<Json<Dashboard>, ApiError> {
    let svc = state.svc();
    if svc.settings().context("database error")?.is_none() {
        return Err(no_settings());
    }
    let dashboard = svc
        .dashboard(Local::now().date_naive())
        .context("failed to build dashboard")?;
    Ok(Json(dashboard))
}

async fn get_trend(
    State(state): State<AppState>,
    Query(query): Query<TrendQuery>,
) -> Result<Json<Vec<TrendPoint>>, ApiError> {
    let days = query.days.unwrap_or(DEFAULT_TREND_DAYS);
    if days == 0 || days > MAX_TREND_DAYS {
        return Err(ApiError::BadRequest(format!(
            "days must be between 1 and {MAX_TREND_DAYS}"
        )));
    }
    let points = state
        .svc()
        .weight_trend(Local::now().date_naive(), days)
        .context("failed to build trend")?;
    Ok(Json(points))
}

// --- Export / Import handlers ---

async fn export_data(State(state): State<AppState>) -> Result<Json<ExportData>, ApiError> {
    let data = state.svc().export_all().context("failed to export data")?;
    Ok(Json(data))
}

async fn import_data(
    State(state): State<AppState>,
    Json(data): Json<ExportData>,
) -> Result<Json<ImportSummary>, ApiError> {
    validate_bundle(&data).map_err(|e| bad_request(&e))?;
    let summary = state
        .svc()
        .import_all(&data)
        .context("failed to import data")?;
    Ok(Json(summary))
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/settings", get(get_settings).put(put_settings))
        .route("/api/logs", get(get_logs))
        .route("/api/logs/{date}", put(put_log).delete(delete_log))
        .route("/api/body", get(get_body_logs))
        .route("/api/body/{date}", put(put_body_log).delete(delete_body_log))
        .route("/api/body-fat", post(compute_body_fat))
        .route("/api/weeks", get(get_weeks))
        .route("/api/dashboard", get(get_dashboard))
        .route("/api/trend", get(get_trend))
        .route("/api/export", get(export_data))
        .route("/api/import", post(import_data))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server(
    svc: TrackerService,
    port: u16,
    bind: &str,
    api_key: Option<String>,
) -> anyhow::Result<()> {
    let state = AppState {
        svc: Arc::new(Mutex::new(svc)),
        api_key: api_key.clone(),
    };

    let app = build_router(state);

    if let Some(ref key) = api_key {
        eprintln!(
            "API key: {}...{} (see api_key file in data directory)",
            &key[..4],
            &key[key.len() - 4..],
        );
    } else {
        eprintln!("Warning: Authentication disabled (--no-auth). API is open to anyone.");
    }

    if bind != "127.0.0.1" && bind != "localhost" && api_key.is_none() {
        eprintln!(
            "Warning: Listening on {bind} with no authentication. Any device on your network can access this API."
        );
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}"))
        .await
        .with_context(|| format!("failed to bind {bind}:{port}"))?;
    info!(%bind, port, auth = api_key.is_some(), "server listening");
    eprintln!("Listening on http://{bind}:{port}");
    axum::serve(listener, app).await?;

    Ok(())
}
