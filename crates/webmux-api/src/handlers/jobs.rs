//! Job creation, status and download handlers.

use std::io;
use std::path::{Component, Path, PathBuf};

use axum::body::Body;
use axum::extract::{Path as UrlPath, Query, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::Json;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

use webmux_models::{Job, JobAnnouncement, JobId, JobStatus, VideoId};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// Query of `POST /api/generate`.
#[derive(Debug, Deserialize)]
pub struct GenerateQuery {
    /// Video id
    pub v: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub job_id: JobId,
}

/// Create a queued job and announce it to workers.
pub async fn generate(
    State(state): State<AppState>,
    Query(query): Query<GenerateQuery>,
) -> ApiResult<(StatusCode, Json<GenerateResponse>)> {
    let video_id = query
        .v
        .and_then(|v| VideoId::parse(v).ok())
        .ok_or_else(|| ApiError::bad_request("Valid \"v\" parameter is required"))?;

    let job = Job::new_queued(video_id);
    state.store.set(&job.job_id, &job).await?;
    state
        .bus
        .publish(&state.job_channel, &JobAnnouncement::from(&job))
        .await?;

    metrics::record_job_enqueued();
    info!(job_id = %job.job_id, video_id = %job.video_id, "Job queued");

    Ok((
        StatusCode::ACCEPTED,
        Json(GenerateResponse { job_id: job.job_id }),
    ))
}

/// Return the stored job record.
pub async fn job_status(
    State(state): State<AppState>,
    UrlPath(job_id): UrlPath<String>,
) -> ApiResult<Json<Job>> {
    let job = state
        .store
        .get(&JobId::from_string(job_id))
        .await?
        .ok_or_else(|| ApiError::not_found("Job not found"))?;

    Ok(Json(job))
}

/// Stream a completed job's output, then delete the file.
///
/// The file is removed once its last byte has been read; a client that
/// disconnects earlier can retry.
pub async fn download(
    State(state): State<AppState>,
    UrlPath(job_id): UrlPath<String>,
) -> ApiResult<Response> {
    let job = state.store.get(&JobId::from_string(job_id)).await?;

    let (output_path, filename) = match job {
        Some(Job {
            status: JobStatus::Completed,
            output_path: Some(output_path),
            filename,
            ..
        }) => (output_path, filename),
        _ => return Err(ApiError::not_found("File is not ready or does not exist")),
    };

    let path = resolve_output(&state.config.mount_path, &output_path)
        .ok_or_else(|| ApiError::not_found("File is not ready or does not exist"))?;

    let file = match File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ApiError::not_found("File not found on disk"));
        }
        Err(e) => return Err(e.into()),
    };
    let len = file.metadata().await?.len();

    let filename = filename.unwrap_or_else(|| {
        path.file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "output.webm".to_string())
    });

    // A zero-length body is never polled.
    if len == 0 {
        remove_delivered(&path).await;
    }

    let body = Body::from_stream(stream_then_remove(file, len, path));
    metrics::record_download(len);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "video/webm")
        .header(header::CONTENT_LENGTH, len)
        .header(header::CONTENT_DISPOSITION, content_disposition(&filename))
        .body(body)
        .map_err(|e| ApiError::internal(e.to_string()))
}

/// Stream `file` and remove it as soon as its last byte has been read.
///
/// The removal runs before the final chunk is handed to the server, since
/// the body is not polled again once `len` bytes have been written. A
/// transfer that stops early leaves the file in place.
fn stream_then_remove(
    file: File,
    len: u64,
    path: PathBuf,
) -> impl Stream<Item = io::Result<Bytes>> + Send {
    let pending = (len > 0).then_some(path);

    futures_util::stream::unfold(
        (ReaderStream::new(file), len, pending),
        |(mut reader, mut remaining, mut pending)| async move {
            match reader.next().await {
                Some(Ok(chunk)) => {
                    remaining = remaining.saturating_sub(chunk.len() as u64);
                    if remaining == 0 {
                        if let Some(path) = pending.take() {
                            remove_delivered(&path).await;
                        }
                    }
                    Some((Ok(chunk), (reader, remaining, pending)))
                }
                Some(Err(e)) => Some((Err(e), (reader, remaining, None))),
                None => {
                    // Shorter than its metadata said; it was still fully read.
                    if let Some(path) = pending.take() {
                        remove_delivered(&path).await;
                    }
                    None
                }
            }
        },
    )
}

async fn remove_delivered(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed delivered output {}", path.display()),
        Err(e) => warn!("Failed to remove delivered output {}: {}", path.display(), e),
    }
}

/// Join a stored relative `outputPath` onto the mount root.
///
/// Absolute paths and parent components are refused.
fn resolve_output(root: &Path, output_path: &str) -> Option<PathBuf> {
    let relative = Path::new(output_path);
    let mut components = relative.components().peekable();
    if components.peek().is_none() {
        return None;
    }
    if components.all(|c| matches!(c, Component::Normal(_))) {
        Some(root.join(relative))
    } else {
        None
    }
}

fn content_disposition(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .map(|c| if c == '"' || c == '\\' || c.is_control() { '_' } else { c })
        .collect();
    format!("attachment; filename=\"{}\"", safe)
}
