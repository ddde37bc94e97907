//! HTTP surface of the serving process.
//!
//! Every handler is a thin adapter: it extracts the request, calls the
//! matching service on [`AppState`] and shapes the JSON reply. Errors flow
//! through [`AppError`]'s `IntoResponse` as `{"detail": "..."}` bodies.

use crate::error::{AppError, AppResult};
use crate::models::{normalize_ticker, Company, FundamentalRecord, ModelMetadata};
use crate::services::{MetricsReport, ModelState, TrainingReport};
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

/// Rows returned by the data endpoints
pub const LATEST_ROWS: i64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictRequest {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub volume: f64,
    pub dividends: f64,
    pub earnings: f64,
}

impl PredictRequest {
    /// Features in model column order
    pub fn features(&self) -> [f64; 6] {
        [
            self.open,
            self.high,
            self.low,
            self.volume,
            self.dividends,
            self.earnings,
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    pub predicted_close: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyRequest {
    pub ticker: String,
    #[serde(alias = "company_name")]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusMessage {
    pub status: String,
    pub message: String,
}

impl StatusMessage {
    fn new(status: &str, message: String) -> Self {
        Self {
            status: status.to_string(),
            message,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CompanyList {
    pub companies: Vec<Company>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
    pub state: ModelState,
    pub model_info: ModelMetadata,
    pub last_trained: Option<DateTime<Utc>>,
}

/// Build the API router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/predict", post(predict))
        .route("/train", get(train).post(train))
        .route("/metrics", get(metrics))
        .route("/health", get(health))
        .route("/companies", get(list_companies).post(add_company))
        .route("/companies/add", post(add_company))
        .route("/companies/list", get(list_companies))
        .route("/companies/:ticker", delete(delete_company))
        .route("/delete_company/:ticker", delete(delete_company))
        .route("/data", get(latest_data))
        .route("/fundamental/data", get(latest_data))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn predict(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PredictRequest>,
) -> AppResult<Json<PredictResponse>> {
    let predicted_close = state.training.predict(&request.features()).await?;
    Ok(Json(PredictResponse { predicted_close }))
}

async fn train(State(state): State<Arc<AppState>>) -> AppResult<Json<TrainingReport>> {
    Ok(Json(state.training.train().await?))
}

async fn metrics(State(state): State<Arc<AppState>>) -> AppResult<Json<MetricsReport>> {
    Ok(Json(state.training.metrics().await?))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let training = &state.training;
    let database = match state.database.ping().await {
        Ok(()) => "ok",
        Err(e) => {
            warn!("Database ping failed: {}", e);
            "unreachable"
        }
    };
    Json(HealthResponse {
        status: "ok",
        database,
        state: training.handle().state().await,
        model_info: training.model_info().await,
        last_trained: training.last_trained().await,
    })
}

async fn add_company(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CompanyRequest>,
) -> AppResult<Response> {
    match state.registry.add(&request.ticker, &request.name).await {
        Ok(company) => Ok(Json(StatusMessage::new(
            "ok",
            format!("Added {}", company.ticker),
        ))
        .into_response()),
        Err(AppError::Conflict(message)) => Ok((
            StatusCode::CONFLICT,
            Json(StatusMessage::new("duplicate", message)),
        )
            .into_response()),
        Err(e) => Err(e),
    }
}

async fn list_companies(State(state): State<Arc<AppState>>) -> AppResult<Json<CompanyList>> {
    let companies = state.registry.list().await?;
    Ok(Json(CompanyList { companies }))
}

async fn delete_company(
    State(state): State<Arc<AppState>>,
    Path(ticker): Path<String>,
) -> AppResult<Json<StatusMessage>> {
    state.registry.delete(&ticker).await?;
    Ok(Json(StatusMessage::new(
        "ok",
        format!("Deleted {}", normalize_ticker(&ticker)),
    )))
}

async fn latest_data(
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<Vec<FundamentalRecord>>> {
    Ok(Json(state.fundamental_repo.find_latest(LATEST_ROWS).await?))
}
