use crate::core::TaskRunner;
use anyhow::Context;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::Mutex;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

pub const TASK_OK: &str = "Tweet task executed successfully.";
pub const TASK_FAILED: &str = "Tweet task execution failed or was skipped.";
pub const TASK_BUSY: &str = "Tweet task already running.";

pub struct AppState {
    runner: Arc<dyn TaskRunner>,
    mode: &'static str,
    running: Arc<Mutex<()>>,
    started: Instant,
}

impl AppState {
    pub fn new(runner: Arc<dyn TaskRunner>, mode: &'static str) -> Self {
        Self {
            runner,
            mode,
            running: Arc::new(Mutex::new(())),
            started: Instant::now(),
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime: u64,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/run-tweet-task", get(run_tweet_task).post(run_tweet_task))
        .route("/health", get(health))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

async fn home(State(state): State<Arc<AppState>>) -> String {
    format!("Weather Tweet Bot is alive! Current mode: {}", state.mode)
}

async fn run_tweet_task(State(state): State<Arc<AppState>>) -> (StatusCode, &'static str) {
    tracing::info!("'/run-tweet-task' endpoint triggered by a request.");

    let Ok(guard) = state.running.clone().try_lock_owned() else {
        tracing::warn!("Tweet task already in progress; rejecting trigger.");
        return (StatusCode::CONFLICT, TASK_BUSY);
    };

    // Detached so a client disconnect cannot cancel a run midway.
    let runner = state.runner.clone();
    let handle = tokio::spawn(async move {
        let result = runner.run().await;
        drop(guard);
        result
    });

    match handle.await {
        Ok(Ok(_)) => (StatusCode::OK, TASK_OK),
        Ok(Err(e)) => {
            tracing::error!("Tweet task failed: {}", e.user_friendly_message());
            (StatusCode::INTERNAL_SERVER_ERROR, TASK_FAILED)
        }
        Err(e) => {
            tracing::error!("Tweet task panicked: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, TASK_FAILED)
        }
    }
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = HealthResponse {
        status: "up",
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.started.elapsed().as_secs(),
    };

    (
        [
            (header::CACHE_CONTROL, "no-store, no-cache, must-revalidate"),
            (header::PRAGMA, "no-cache"),
        ],
        Json(body),
    )
}

/// Serves until Ctrl+C or SIGTERM.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> anyhow::Result<()> {
    let address = listener.local_addr().context("Failed to read listener address")?;
    tracing::info!("🚀 Listening on http://{}", address);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = shutdown_signal().await {
                tracing::error!("Error while waiting for shutdown signal: {e}");
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutdown signal received, starting graceful shutdown...");
        })
        .await
        .context("HTTP server error")
}

pub async fn bind(port: u16) -> anyhow::Result<TcpListener> {
    let address = SocketAddr::from(([0, 0, 0, 0], port));
    TcpListener::bind(address)
        .await
        .with_context(|| format!("Failed to bind {}", address))
}

async fn shutdown_signal() -> anyhow::Result<()> {
    let ctrl_c = async { signal::ctrl_c().await.context("Failed to install Ctrl+C handler") };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("Failed to install SIGTERM handler")?
            .recv()
            .await;
        Ok::<_, anyhow::Error>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<anyhow::Result<()>>();

    tokio::select! {
        res = ctrl_c => res,
        res = terminate => res,
    }
}
