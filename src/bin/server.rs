use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sportsbet_export_rs::dates::export_dates;
use sportsbet_export_rs::{ExportResult, PageStorage, SportsbetClient};

/// Server configuration
struct ServerConfig {
    port: u16,
}

impl ServerConfig {
    fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
        }
    }
}

/// Application state shared across all requests
#[derive(Clone)]
struct AppState {
    client: Arc<SportsbetClient>,
    metrics: Arc<Metrics>,
    /// Set while an export is running; at most one runs at a time
    in_flight: Arc<AtomicBool>,
}

/// Server metrics
struct Metrics {
    total_requests: AtomicU64,
    exports_completed: AtomicU64,
    exports_rejected: AtomicU64,
    start_time: Instant,
}

/// RAII guard that releases the single-flight flag
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl<'a> Drop for InFlightGuard<'a> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing/logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "server=info,sportsbet_export_rs=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();

    let client = Arc::new(SportsbetClient::new().context("Failed to build HTTP client")?);
    tracing::info!(endpoint = %client.config().endpoint, "Sportsbet client ready");

    let app = build_app(client);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}

/// Build the Axum application with routes and middleware
fn build_app(client: Arc<SportsbetClient>) -> Router {
    let metrics = Arc::new(Metrics {
        total_requests: AtomicU64::new(0),
        exports_completed: AtomicU64::new(0),
        exports_rejected: AtomicU64::new(0),
        start_time: Instant::now(),
    });

    let state = AppState {
        client,
        metrics,
        in_flight: Arc::new(AtomicBool::new(false)),
    };

    Router::new()
        .route("/health", get(health_check))
        .route("/api/export", post(export_transactions))
        .route("/api/metrics", get(get_metrics))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportRequest {
    #[serde(default)]
    storage: PageStorage,
    from_date: String,
    to_date: String,
}

#[derive(Serialize)]
struct ExportResponse {
    #[serde(flatten)]
    result: ExportResult,
    /// CSV text, present only when rows were exported
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

/// Run one export from a storage snapshot and two raw date inputs
async fn export_transactions(
    State(state): State<AppState>,
    Json(request): Json<ExportRequest>,
) -> Result<Json<ExportResponse>, ApiError> {
    state.metrics.total_requests.fetch_add(1, Ordering::Relaxed);

    let dates = export_dates(&request.from_date, &request.to_date)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let Some(_guard) = InFlightGuard::acquire(&state.in_flight) else {
        state.metrics.exports_rejected.fetch_add(1, Ordering::Relaxed);
        return Err(ApiError::Conflict(
            "An export is already running. Wait for it to finish.".to_string(),
        ));
    };

    tracing::info!(
        "Exporting transactions {} to {}",
        dates.display_from,
        dates.display_to
    );

    let report = state.client.export(&request.storage, &dates).await;
    let result = report.result();
    let content = report
        .into_document()
        .map(|doc| String::from_utf8_lossy(&doc.content).into_owned());

    state
        .metrics
        .exports_completed
        .fetch_add(1, Ordering::Relaxed);

    Ok(Json(ExportResponse { result, content }))
}

/// Get server metrics
async fn get_metrics(State(state): State<AppState>) -> Json<MetricsResponse> {
    Json(MetricsResponse {
        total_requests: state.metrics.total_requests.load(Ordering::Relaxed),
        exports_completed: state.metrics.exports_completed.load(Ordering::Relaxed),
        exports_rejected: state.metrics.exports_rejected.load(Ordering::Relaxed),
        export_in_flight: state.in_flight.load(Ordering::Relaxed),
        uptime_seconds: state.metrics.start_time.elapsed().as_secs(),
    })
}

#[derive(Serialize)]
struct MetricsResponse {
    total_requests: u64,
    exports_completed: u64,
    exports_rejected: u64,
    export_in_flight: bool,
    uptime_seconds: u64,
}

/// API error types
enum ApiError {
    BadRequest(String),
    Conflict(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };

        let body = Json(serde_json::json!({
            "success": false,
            "message": message
        }));

        (status, body).into_response()
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down gracefully...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down gracefully...");
        }
    }
}
