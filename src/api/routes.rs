use super::csv::csv_response;
use super::AppState;
use crate::core::ScrapeError;
use crate::http::{ScrapePayload, ScrapeResult};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use log::{debug, error};
use serde::Deserialize;
use serde_json::json;
use std::any::Any as PanicPayload;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/scrape", post(scrape))
        .route("/scrape/csv", post(scrape_csv))
        .route("/analyze", get(analyze))
        .layer(CatchPanicLayer::custom(panic_reply))
        .layer(cors)
        .with_state(state)
}

fn status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// 500 `InternalFault` reply for a handler that panicked.
fn panic_reply(payload: Box<dyn PanicPayload + Send + 'static>) -> Response {
    let detail = payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!("Request handler panicked: {}", detail);

    let error = ScrapeError::Internal(detail.to_string());
    let result = ScrapeResult::failure(Uuid::now_v7(), "", &error, 0);
    (status(error.http_status()), Json(result)).into_response()
}

/// Failure reply for a request that never reached the handler.
fn rejected(state: &AppState, url: &str, message: String) -> Response {
    debug!("Rejected request body: {}", message);
    let error = ScrapeError::InvalidInput(message);
    let result = ScrapeResult::failure(Uuid::now_v7(), url, &error, 0);
    state.stats().record_result(&result);
    (status(error.http_status()), Json(result)).into_response()
}

async fn run_scrape(
    state: &AppState,
    payload: Result<Json<ScrapePayload>, JsonRejection>,
) -> Result<ScrapeResult, Response> {
    let Json(payload) = payload.map_err(|rejection| rejected(state, "", rejection.body_text()))?;

    let reply = state.handler.scrape(payload).await;
    if reply.result.is_success() {
        Ok(reply.result)
    } else {
        Err((status(reply.status_code), Json(reply.result)).into_response())
    }
}

async fn scrape(
    State(state): State<AppState>,
    payload: Result<Json<ScrapePayload>, JsonRejection>,
) -> Response {
    match run_scrape(&state, payload).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(response) => response,
    }
}

async fn scrape_csv(
    State(state): State<AppState>,
    payload: Result<Json<ScrapePayload>, JsonRejection>,
) -> Response {
    match run_scrape(&state, payload).await {
        Ok(result) => csv_response(&result),
        Err(response) => response,
    }
}

#[derive(Debug, Deserialize)]
struct AnalyzeParams {
    url: String,
}

async fn analyze(
    State(state): State<AppState>,
    params: Result<Query<AnalyzeParams>, QueryRejection>,
) -> Response {
    let Query(params) = match params {
        Ok(params) => params,
        Err(rejection) => return rejected(&state, "", rejection.body_text()),
    };

    match state.handler.analyze(&params.url).await {
        Ok(analysis) => (StatusCode::OK, Json(analysis)).into_response(),
        Err(error) => {
            let result = ScrapeResult::failure(Uuid::now_v7(), &params.url, &error, 0);
            (status(error.http_status()), Json(result)).into_response()
        }
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now(),
    }))
}

async fn stats(State(state): State<AppState>) -> Response {
    Json(state.stats().get_stats()).into_response()
}

async fn index() -> Json<serde_json::Value> {
    Json(json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "POST /scrape": "Fetch a page and extract fields as JSON",
            "POST /scrape/csv": "Same as /scrape, returned as a CSV attachment",
            "GET /analyze?url=": "Report whether a page looks like a store or a script-rendered app",
            "GET /health": "Liveness check",
            "GET /stats": "Request statistics",
        },
    }))
}
