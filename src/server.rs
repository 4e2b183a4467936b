//! HTTP server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (version, record count, active mode) |
//! | `POST` | `/search` | Ranked matches for a free-text query |
//! | `POST` | `/analyze` | Full analysis report as JSON |
//! | `POST` | `/report` | Full analysis report as a PDF download |
//! | `POST` | `/records/reload` | Re-read the CSV and drop cached indices |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Codes: `bad_request` (400), `data_source` (500), `embedding_service`
//! (502), `unavailable_backend` (503), `internal` (500).
//!
//! Requests are served one at a time against a single [`Analyzer`]; the
//! lexical cache it owns is not shared across threads. `/health` reads a
//! snapshot published after each request and never waits on the analyzer.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use nc_analyzer_core::models::QueryContext;
use nc_analyzer_core::rank::{RankMode, RequestedMode};
use nc_analyzer_core::NcError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::analyze::{AnalysisReport, Analyzer, SearchOutcome};
use crate::report::{default_file_name, render_pdf};

/// What `/health` reports, refreshed after every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Snapshot {
    records: usize,
    mode: RankMode,
}

impl Snapshot {
    fn of(analyzer: &Analyzer) -> Self {
        Self {
            records: analyzer.records().len(),
            mode: analyzer.mode(None),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    analyzer: Arc<Mutex<Analyzer>>,
    snapshot: Arc<watch::Sender<Snapshot>>,
}

impl AppState {
    pub fn new(analyzer: Analyzer) -> Self {
        let (snapshot, _) = watch::channel(Snapshot::of(&analyzer));
        Self {
            analyzer: Arc::new(Mutex::new(analyzer)),
            snapshot: Arc::new(snapshot),
        }
    }

    fn publish(&self, analyzer: &Analyzer) {
        self.snapshot.send_replace(Snapshot::of(analyzer));
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/search", post(handle_search))
        .route("/analyze", post(handle_analyze))
        .route("/report", post(handle_report))
        .route("/records/reload", post(handle_reload))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
}

/// Bind to `[server].bind` and serve until the process is terminated.
pub async fn run_server(analyzer: Analyzer) -> anyhow::Result<()> {
    let bind_addr = analyzer.config().server.bind.clone();
    let app = build_router(AppState::new(analyzer));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "NC analyzer listening");
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

impl From<NcError> for AppError {
    fn from(err: NcError) -> Self {
        let status = match &err {
            NcError::DataSource(_) => StatusCode::INTERNAL_SERVER_ERROR,
            NcError::EmbeddingService(_) | NcError::Generation(_) => StatusCode::BAD_GATEWAY,
            NcError::UnavailableBackend(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        AppError {
            status,
            code: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    records: usize,
    mode: String,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let snapshot = *state.snapshot.borrow();
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        records: snapshot.records,
        mode: snapshot.mode.to_string(),
    })
}

// ============ POST /search ============

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default)]
    top_k: Option<usize>,
    #[serde(default)]
    mode: Option<String>,
}

async fn handle_search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchOutcome>, AppError> {
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    if req.top_k == Some(0) {
        return Err(bad_request("top_k must be >= 1"));
    }
    let requested = req
        .mode
        .as_deref()
        .map(str::parse::<RequestedMode>)
        .transpose()
        .map_err(bad_request)?;

    let mut analyzer = state.analyzer.lock().await;
    let outcome = analyzer.search(&req.query, req.top_k, requested).await;
    state.publish(&analyzer);
    Ok(Json(outcome?))
}

// ============ POST /analyze, POST /report ============

async fn handle_analyze(
    State(state): State<AppState>,
    Json(ctx): Json<QueryContext>,
) -> Json<AnalysisReport> {
    let mut analyzer = state.analyzer.lock().await;
    let report = analyzer.analyze(ctx).await;
    state.publish(&analyzer);
    Json(report)
}

async fn handle_report(
    State(state): State<AppState>,
    Json(ctx): Json<QueryContext>,
) -> Result<Response, AppError> {
    let report = {
        let mut analyzer = state.analyzer.lock().await;
        let report = analyzer.analyze(ctx).await;
        state.publish(&analyzer);
        report
    };
    let bytes = render_pdf(&report).map_err(|e| internal(format!("PDF rendering failed: {}", e)))?;
    let disposition = format!("attachment; filename=\"{}\"", default_file_name(&report));

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

// ============ POST /records/reload ============

#[derive(Serialize)]
struct ReloadResponse {
    records: usize,
}

async fn handle_reload(State(state): State<AppState>) -> Result<Json<ReloadResponse>, AppError> {
    let mut analyzer = state.analyzer.lock().await;
    let records = analyzer.reload()?;
    state.publish(&analyzer);
    Ok(Json(ReloadResponse { records }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::ranker::Ranker;
    use nc_analyzer_core::models::{Record, RecordCollection};
    use std::time::Duration;

    fn state() -> AppState {
        let records = RecordCollection::new(vec![Record {
            issue: "burr on edge".into(),
            ..Default::default()
        }]);
        AppState::new(Analyzer::new(
            Config::minimal(),
            records,
            Ranker::lexical_only(),
            None,
        ))
    }

    #[tokio::test]
    async fn test_health_answers_while_analyzer_is_busy() {
        let state = state();
        let _busy = state.analyzer.lock().await;

        let Json(health) = tokio::time::timeout(
            Duration::from_secs(1),
            handle_health(State(state.clone())),
        )
        .await
        .expect("health waited on the analyzer lock");
        assert_eq!(health.records, 1);
        assert_eq!(health.mode, "lexical");
    }

    #[tokio::test]
    async fn test_publish_refreshes_snapshot() {
        let state = state();
        {
            let mut analyzer = state.analyzer.lock().await;
            analyzer.replace_records(RecordCollection::empty());
            state.publish(&analyzer);
        }
        let Json(health) = handle_health(State(state)).await;
        assert_eq!(health.records, 0);
    }
}
