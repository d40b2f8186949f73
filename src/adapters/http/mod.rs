//! HTTP inbound adapter.
//!
//! - `POST /video?owner_id=` multipart upload (field `video`), runs the pipeline
//! - `GET /zips?owner_id=` lists the owner's videos
//! - `GET /zip/download?owner_id=&video_id=` streams a finished archive

mod error;
mod handlers;

pub use error::{ApiError, ErrorResponse};

use crate::application::pipeline::VideoService;
use crate::ports::auth::TokenValidator;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<dyn VideoService>,
    pub auth: Arc<dyn TokenValidator>,
    /// Where multipart uploads are spooled before validation
    pub spool_dir: PathBuf,
    /// Request body cap for uploads; unlimited when `None`
    pub max_upload_bytes: Option<usize>,
}

pub fn router(state: AppState) -> Router {
    let body_limit = match state.max_upload_bytes {
        Some(max) => DefaultBodyLimit::max(max),
        None => DefaultBodyLimit::disable(),
    };
    Router::new()
        .route("/video", post(handlers::upload_video))
        .route("/zips", get(handlers::list_videos))
        .route("/zip/download", get(handlers::download_zip))
        .route("/health", get(handlers::health))
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests;
