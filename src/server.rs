use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode, Uri},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tokio::signal;

use crate::service::{MatchResponse, ServiceError, SketchService};

/// Upload field carrying the sketch.
const SKETCH_FIELD: &str = "sketch";

pub fn router(service: Arc<SketchService>) -> Router {
    Router::new()
        .route("/upload_sketch", post(upload_sketch))
        .route("/*image_id", get(get_image))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(32 * 1024 * 1024))
        .with_state(service)
}

/// Blocks on a multi-threaded runtime until Ctrl-C.
pub fn serve(service: Arc<SketchService>, listen: &str) -> Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?
        .block_on(async {
            let listener = tokio::net::TcpListener::bind(listen)
                .await
                .with_context(|| format!("binding {listen}"))?;
            log::info!("listening on {}", listen);
            axum::serve(listener, router(service))
                .with_graceful_shutdown(shutdown_signal())
                .await
                .context("serving http")
        })
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        log::error!("failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("shutting down");
}

#[derive(Debug)]
struct HttpError(ServiceError);

impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self.0 {
            ServiceError::Sketch(source) => {
                log::warn!("rejecting sketch: {}", source);
                StatusCode::BAD_REQUEST
            }
            ServiceError::MissingSketch | ServiceError::InvalidUpload(_) => StatusCode::BAD_REQUEST,
            ServiceError::ImageNotFound(id) => {
                log::warn!("image not found: {}", id);
                StatusCode::NOT_FOUND
            }
            ServiceError::NoGallery => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Store(_) | ServiceError::Internal(_) => {
                log::error!("{:?}", self.0);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

impl From<ServiceError> for HttpError {
    fn from(err: ServiceError) -> Self {
        Self(err)
    }
}

async fn upload_sketch(
    State(service): State<Arc<SketchService>>,
    mut multipart: Multipart,
) -> Result<Json<MatchResponse>, HttpError> {
    let mut sketch = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::InvalidUpload(e.to_string()))?
    {
        if field.name() == Some(SKETCH_FIELD) {
            let data = field
                .bytes()
                .await
                .map_err(|e| ServiceError::InvalidUpload(e.to_string()))?;
            sketch = Some(data);
            break;
        }
    }
    let sketch = sketch.ok_or(ServiceError::MissingSketch)?;

    let response = tokio::task::spawn_blocking(move || service.match_sketch(&sketch))
        .await
        .map_err(|e| ServiceError::Internal(e.to_string()))??;
    Ok(Json(response))
}

async fn get_image(
    State(service): State<Arc<SketchService>>,
    Path(image_id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let photo = tokio::task::spawn_blocking(move || service.photo(&image_id))
        .await
        .map_err(|e| ServiceError::Internal(e.to_string()))??;
    Ok(([(header::CONTENT_TYPE, photo.content_type)], photo.data))
}

async fn not_found(uri: Uri) -> HttpError {
    HttpError(ServiceError::ImageNotFound(uri.path().to_string()))
}
