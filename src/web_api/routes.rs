//! API Routes

use axum::{
    extract::{Path, State},
    http::header,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use rand::seq::SliceRandom;

use crate::error::{Error, Result};
use crate::ingest::OutputFormat;
use crate::state::AppState;

/// Create API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/random_image", get(random_image))
        .route("/image_get/:alias", get(image_get))
        // Layers run outermost-first in reverse add order: the rate-limit
        // gate sees every request first, then HTTPS enforcement, then
        // endpoint dispatch.
        .layer(middleware::from_fn_with_state(
            state.clone(),
            super::middleware::enforce_https,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            super::middleware::rate_limit,
        ))
        .with_state(state)
}

/// Pick one indexed image uniformly at random and stream its bytes
async fn random_image(State(state): State<AppState>) -> Result<Response> {
    let records = state.index.list_all().await?;
    let record = records
        .choose(&mut rand::thread_rng())
        .ok_or_else(|| Error::NotFound("no images found in the index".to_string()))?;

    tracing::info!(alias = %record.alias, "Serving random image");
    serve_image(&record.storage_path, state.config.image_format).await
}

/// Stream the image stored under the given alias
async fn image_get(
    State(state): State<AppState>,
    Path(alias): Path<String>,
) -> Result<Response> {
    let path = state
        .index
        .lookup(&alias)
        .await?
        .ok_or_else(|| Error::NotFound(format!("no image found with alias {alias}")))?;

    tracing::info!(alias = %alias, path = %path, "Serving image by alias");
    serve_image(&path, state.config.image_format).await
}

/// Read the backing file and respond with its bytes and the image content
/// type. A file missing on disk is a 404, not a server fault.
async fn serve_image(path: &str, format: OutputFormat) -> Result<Response> {
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            Ok(([(header::CONTENT_TYPE, format.media_type())], bytes).into_response())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(Error::NotFound(format!("image file not found at {path}")))
        }
        Err(e) => Err(e.into()),
    }
}
