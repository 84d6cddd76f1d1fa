mod error;
mod params;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderValue, Method},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use miette::{Context, IntoDiagnostic, Result};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing::{error, info, warn};

pub use error::ApiError;
pub use params::{DownloadParams, RawResolution};

use crate::{
    actors::{JobError, WorkerPool},
    config::{ApiSettings, Settings},
    context::RequestContext,
    types::{Artifact, DownloadRequest},
};

pub const SERVICE_NAME: &str = "youtube-downloader-api";

#[derive(Debug, Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub pool: Arc<WorkerPool>,
}

impl AppState {
    pub fn new(settings: Arc<Settings>, pool: Arc<WorkerPool>) -> Self {
        Self { settings, pool }
    }
}

pub fn router(state: AppState) -> Router {
    let index = state.settings.server.static_dir.join("index.html");
    let media = ServeDir::new(&state.settings.downloader.download_dir);
    let cors = cors_layer(&state.settings.api);

    Router::new()
        .route_service("/", ServeFile::new(index))
        .route("/health", get(health))
        .route("/config", get(public_config))
        .route(
            "/v1/youtube/download",
            get(download_video).post(download_video),
        )
        .route(
            "/v1/youtube/download/audio",
            get(download_audio).post(download_audio),
        )
        .route(
            "/v1/youtube/download/audio/mp3",
            get(download_audio_mp3).post(download_audio_mp3),
        )
        .nest_service("/media", media)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Serve until Ctrl-C, then let the in-flight requests finish.
pub async fn serve(state: AppState) -> Result<()> {
    let addr = format!("{}:{}", state.settings.server.host, state.settings.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .into_diagnostic()
        .wrap_err_with(|| format!("Could not listen on {addr}"))?;
    info!("Listening on http://{addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .into_diagnostic()
        .wrap_err("Server error")
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Ctrl-C received, shutting down"),
        Err(err) => {
            error!("Could not listen for Ctrl-C: {err}");
            std::future::pending::<()>().await;
        }
    }
}

fn cors_layer(settings: &ApiSettings) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    if settings.cors_origin.is_any() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = settings
        .cors_origin
        .origins()
        .into_iter()
        .filter_map(|origin| match HeaderValue::from_str(&origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {origin:?}");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": SERVICE_NAME,
    }))
}

async fn public_config(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.settings.public_view())
}

async fn download_video(
    State(state): State<AppState>,
    params: DownloadParams,
) -> Result<Json<Artifact>, ApiError> {
    let url = params.require_url()?;
    let resolution = params.resolution_or(state.settings.downloader.default_resolution)?;

    run(&state, DownloadRequest::video(url, resolution), "Failed to download video").await
}

async fn download_audio(
    State(state): State<AppState>,
    params: DownloadParams,
) -> Result<Json<Artifact>, ApiError> {
    let url = params.require_url()?;
    run(&state, DownloadRequest::audio(url, false), "Failed to download audio").await
}

async fn download_audio_mp3(
    State(state): State<AppState>,
    params: DownloadParams,
) -> Result<Json<Artifact>, ApiError> {
    let url = params.require_url()?;
    run(&state, DownloadRequest::audio(url, true), "Failed to download audio").await
}

/// Hand the request to the worker pool and wait for its artifact.
///
/// Every failure is answered with the same `failure` message.
async fn run(
    state: &AppState,
    request: DownloadRequest,
    failure: &'static str,
) -> Result<Json<Artifact>, ApiError> {
    let ctx = RequestContext::for_request(&request, state.settings.downloader.engine_timeout());
    let span = ctx.span().clone();
    info!(parent: &span, "Received request to download {:?}", request.mode);

    match state.pool.execute(request, ctx).await {
        Ok(artifact) => Ok(Json(artifact)),
        // Already logged by the worker
        Err(JobError::Pipeline { .. }) => Err(ApiError::internal(failure)),
        Err(err) => {
            error!(parent: &span, "Request not processed: {err}");
            Err(ApiError::internal(failure))
        }
    }
}
