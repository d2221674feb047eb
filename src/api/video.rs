//! Metadata and download endpoints

use axum::{
    body::{Body, Bytes},
    extract::{rejection::JsonRejection, Path, State},
    http::header,
    response::Response,
    routing::post,
    Json, Router,
};
use chrono::NaiveDate;
use futures_util::Stream;
use serde::Serialize;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio_util::io::ReaderStream;

use super::error::{require_url, UrlRequest};
use super::AppState;
use crate::extractors::{StreamRequest, VideoMetadata};
use crate::storage::ScopedPath;
use crate::utils::ascii_filename;
use crate::ServiceError;

#[derive(Debug, Serialize)]
pub struct VideoInfoResponse {
    pub title: String,
    pub author: Option<String>,
    pub length: Option<u64>,
    pub views: Option<u64>,
    pub description: Option<String>,
    pub publish_date: Option<NaiveDate>,
    pub thumbnail_url: Option<String>,
    pub streams: Vec<StreamSummary>,
}

#[derive(Debug, Serialize)]
pub struct StreamSummary {
    pub resolution: Option<String>,
    pub mime_type: String,
    pub itag: String,
    pub filesize: Option<u64>,
}

impl From<VideoMetadata> for VideoInfoResponse {
    fn from(metadata: VideoMetadata) -> Self {
        let streams = metadata
            .progressive_streams()
            .into_iter()
            .map(|stream| StreamSummary {
                resolution: stream.resolution.clone(),
                mime_type: stream.mime_type(),
                itag: stream.format_id.clone(),
                filesize: stream.filesize,
            })
            .collect();

        Self {
            title: metadata.title,
            author: metadata.author,
            length: metadata.length,
            views: metadata.views,
            description: metadata.description,
            publish_date: metadata.publish_date,
            thumbnail_url: metadata.thumbnail_url,
            streams,
        }
    }
}

/// POST /video_info
async fn video_info(
    State(state): State<AppState>,
    body: Result<Json<UrlRequest>, JsonRejection>,
) -> Result<Json<VideoInfoResponse>, ServiceError> {
    let url = require_url(body)?;
    let metadata = state.orchestrator.fetch_metadata(&url).await?;

    Ok(Json(metadata.into()))
}

/// POST /download/:resolution
///
/// `resolution` is `audio` or an exact progressive resolution such as `720p`.
async fn download(
    State(state): State<AppState>,
    Path(resolution): Path<String>,
    body: Result<Json<UrlRequest>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let url = require_url(body)?;
    let request = StreamRequest::parse(&resolution);
    let prepared = state.orchestrator.prepare_download(&url, &request).await?;

    let file = tokio::fs::File::open(prepared.path())
        .await
        .map_err(|e| ServiceError::Internal(format!("could not open downloaded file: {}", e)))?;
    let length = file.metadata().await.ok().map(|meta| meta.len());

    let disposition = format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        ascii_filename(&prepared.filename),
        urlencoding::encode(&prepared.filename)
    );

    let mut response = Response::builder()
        .header(header::CONTENT_TYPE, prepared.mime_type())
        .header(header::CONTENT_DISPOSITION, disposition);
    if let Some(length) = length {
        response = response.header(header::CONTENT_LENGTH, length);
    }

    tracing::info!("Sending {} for {}", prepared.filename, url);

    let body = Body::from_stream(ScopedFileStream::new(file, prepared.file));
    response
        .body(body)
        .map_err(|e| ServiceError::Internal(format!("could not build response: {}", e)))
}

/// Streams a downloaded file and deletes it once the body is finished or dropped
struct ScopedFileStream {
    inner: ReaderStream<tokio::fs::File>,
    _scope: ScopedPath,
}

impl ScopedFileStream {
    fn new(file: tokio::fs::File, scope: ScopedPath) -> Self {
        Self {
            inner: ReaderStream::new(file),
            _scope: scope,
        }
    }
}

impl Stream for ScopedFileStream {
    type Item = std::io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

pub fn video_routes() -> Router<AppState> {
    Router::new()
        .route("/video_info", post(video_info))
        .route("/download/:resolution", post(download))
}
