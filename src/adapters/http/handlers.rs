use super::{ApiError, AppState};
use crate::application::pipeline::UploadedVideo;
use crate::domain::video::VideoSummary;
use axum::body::{Body, Bytes};
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{BoxError, Json};
use futures::{Stream, TryStreamExt};
use serde::Deserialize;
use std::io;
use std::path::Path;
use tempfile::NamedTempFile;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::io::StreamReader;
use tracing::{debug, info};

const VIDEO_FIELD: &str = "video";

#[derive(Debug, Deserialize)]
pub struct OwnerParams {
    owner_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DownloadParams {
    owner_id: Option<String>,
    video_id: Option<String>,
}

fn required(value: Option<String>, name: &str) -> Result<String, ApiError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("Missing {} query parameter", name)))
}

async fn authorize(state: &AppState, headers: &HeaderMap, owner_id: &str) -> Result<(), ApiError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if state.auth.validate(token, owner_id).await? {
        Ok(())
    } else {
        debug!(owner_id, "token rejected");
        Err(ApiError::Unauthorized)
    }
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge
    } else {
        ApiError::BadRequest(format!("Error parsing form data: {}", err.body_text()))
    }
}

fn spool_error(err: io::Error) -> ApiError {
    match err
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<MultipartError>())
    {
        Some(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => ApiError::PayloadTooLarge,
        _ => ApiError::BadRequest(format!("Error retrieving the file: {}", err)),
    }
}

// Save a `Stream` to a file
async fn stream_to_file<S, E>(file: tokio::fs::File, stream: S) -> io::Result<u64>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<BoxError>,
{
    let body_with_io_error = stream.map_err(io::Error::other);
    let body_reader = StreamReader::new(body_with_io_error);
    futures::pin_mut!(body_reader);

    let mut file = BufWriter::new(file);
    let written = tokio::io::copy(&mut body_reader, &mut file).await?;
    file.flush().await?;
    Ok(written)
}

fn spool_file(dir: &Path) -> io::Result<NamedTempFile> {
    std::fs::create_dir_all(dir)?;
    tempfile::Builder::new()
        .prefix(".upload-")
        .tempfile_in(dir)
}

pub async fn upload_video(
    State(state): State<AppState>,
    Query(params): Query<OwnerParams>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<VideoSummary>, ApiError> {
    let owner_id = required(params.owner_id, "owner_id")?;
    authorize(&state, &headers, &owner_id).await?;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(VIDEO_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();

        let spool = spool_file(&state.spool_dir)
            .map_err(|e| ApiError::internal("Error storing upload", e))?;
        let writer = spool
            .reopen()
            .map_err(|e| ApiError::internal("Error storing upload", e))?;
        let bytes = stream_to_file(tokio::fs::File::from_std(writer), field)
            .await
            .map_err(spool_error)?;
        debug!(%owner_id, %file_name, bytes, "upload spooled");

        let reader = spool
            .reopen()
            .map_err(|e| ApiError::internal("Error storing upload", e))?;
        let upload = UploadedVideo::new(file_name, tokio::fs::File::from_std(reader));

        // `spool` is removed when dropped, after the pipeline has copied it
        let record = state.service.generate(upload, &owner_id).await?;
        info!(video_id = %record.id, %owner_id, "video processed");
        return Ok(Json(VideoSummary::from(&record)));
    }

    Err(ApiError::BadRequest(format!(
        "Missing multipart field `{}`",
        VIDEO_FIELD
    )))
}

pub async fn list_videos(
    State(state): State<AppState>,
    Query(params): Query<OwnerParams>,
    headers: HeaderMap,
) -> Result<Json<Vec<VideoSummary>>, ApiError> {
    let owner_id = required(params.owner_id, "owner_id")?;
    authorize(&state, &headers, &owner_id).await?;

    let videos = state.service.get_videos(&owner_id).await?;
    Ok(Json(videos))
}

pub async fn download_zip(
    State(state): State<AppState>,
    Query(params): Query<DownloadParams>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let owner_id = required(params.owner_id, "owner_id")?;
    authorize(&state, &headers, &owner_id).await?;
    let video_id = required(params.video_id, "video_id")?;

    let stream = state.service.download_zip(&video_id, &owner_id).await?;

    let disposition = HeaderValue::from_str(&format!("attachment; filename={}.zip", video_id))
        .map_err(|_| ApiError::BadRequest("Invalid video_id".to_string()))?;
    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            ),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

pub async fn health() -> &'static str {
    "ok"
}
