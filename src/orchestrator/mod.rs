//! Per-request sequencing of validation, extraction, download and recognition
//!
//! Every public operation runs its stages one after another and ends in exactly one
//! `Ok` or `ServiceError`. Downloaded files live in a [`ScopedPath`], so cleanup
//! happens on every exit path, including early returns and dropped futures.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

use crate::extractors::{
    select_stream, ExtractionError, MediaExtractor, StreamDescriptor, StreamRequest, VideoMetadata,
};
use crate::recognition::{
    mapper, RawRecognition, RecognitionClient, RecognitionOutcome, ScanWindow, STATUS_NO_RESULT,
    STATUS_SUCCESS,
};
use crate::storage::{ScopedPath, ScratchSpace};
use crate::utils::{download_filename, format_file_size};
use crate::validator::{self, VideoReference};
use crate::ServiceError;

/// Stage a request was in when it failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validating,
    Extracting,
    Downloading,
    Recognizing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Validating => write!(f, "validating"),
            Stage::Extracting => write!(f, "extracting"),
            Stage::Downloading => write!(f, "downloading"),
            Stage::Recognizing => write!(f, "recognizing"),
        }
    }
}

/// A stream materialized on disk, ready to be sent
///
/// Dropping it deletes the file.
#[derive(Debug)]
pub struct PreparedDownload {
    pub file: ScopedPath,
    /// Sanitized attachment name
    pub filename: String,
    pub stream: StreamDescriptor,
}

impl PreparedDownload {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn mime_type(&self) -> String {
        self.stream.mime_type()
    }
}

/// Binds the extractor, the recognizer and scratch storage together
pub struct Orchestrator {
    extractor: Arc<dyn MediaExtractor>,
    recognizer: Option<Arc<dyn RecognitionClient>>,
    scratch: ScratchSpace,
}

impl Orchestrator {
    pub fn new(
        extractor: Arc<dyn MediaExtractor>,
        recognizer: Option<Arc<dyn RecognitionClient>>,
        scratch: ScratchSpace,
    ) -> Self {
        Self {
            extractor,
            recognizer,
            scratch,
        }
    }

    pub fn recognition_enabled(&self) -> bool {
        self.recognizer.is_some()
    }

    /// Metadata and progressive streams for `url`; writes nothing to disk
    pub async fn fetch_metadata(&self, url: &str) -> Result<VideoMetadata, ServiceError> {
        self.run_fetch_metadata(url)
            .instrument(request_span("video_info", url))
            .await
    }

    /// Download the stream matching `request` into a fresh scoped path
    pub async fn prepare_download(
        &self,
        url: &str,
        request: &StreamRequest,
    ) -> Result<PreparedDownload, ServiceError> {
        self.run_prepare_download(url, request)
            .instrument(request_span("download", url))
            .await
    }

    /// Identify the music in the audio track of `url`
    ///
    /// Fails with `RecognitionUnavailable` before any other work when no recognizer
    /// is configured. The downloaded audio is removed before this returns.
    pub async fn identify(&self, url: &str) -> Result<RecognitionOutcome, ServiceError> {
        self.run_identify(url)
            .instrument(request_span("identify", url))
            .await
    }

    async fn run_fetch_metadata(&self, url: &str) -> Result<VideoMetadata, ServiceError> {
        let video = validate(url)?;
        let metadata = self.extract(&video).await?;

        tracing::info!(
            "Fetched metadata for {} ({} streams)",
            video.video_id,
            metadata.streams.len()
        );
        Ok(metadata)
    }

    async fn run_prepare_download(
        &self,
        url: &str,
        request: &StreamRequest,
    ) -> Result<PreparedDownload, ServiceError> {
        let video = validate(url)?;
        let metadata = self.extract(&video).await?;

        let stream = match select_stream(&metadata.streams, request) {
            Ok(stream) => stream.clone(),
            Err(missing) => {
                tracing::info!(
                    "No {} stream for {}; available: {:?}",
                    missing.requested,
                    video.video_id,
                    missing.available
                );
                return Err(ServiceError::StreamNotFound {
                    requested: missing.requested,
                    available: missing.available,
                });
            }
        };

        let file = self.download(&video, &stream).await?;
        let filename = download_filename(&metadata.title, stream.label(), &stream.container);

        Ok(PreparedDownload {
            file,
            filename,
            stream,
        })
    }

    async fn run_identify(&self, url: &str) -> Result<RecognitionOutcome, ServiceError> {
        let Some(recognizer) = self.recognizer.as_deref() else {
            tracing::warn!("Recognition requested but the recognition service is not configured");
            return Err(ServiceError::RecognitionUnavailable);
        };

        let video = validate(url)?;
        let metadata = self.extract(&video).await?;

        let stream = match select_stream(&metadata.streams, &StreamRequest::Audio) {
            Ok(stream) => stream.clone(),
            Err(_) => {
                tracing::info!("No audio stream for {}", video.video_id);
                return Err(ServiceError::NoAudioStream);
            }
        };

        let artifact = self.download(&video, &stream).await?;
        self.recognize(recognizer, artifact.path()).await
    }

    /// Submit the scan window of `audio` and interpret the status code
    pub async fn recognize(
        &self,
        recognizer: &dyn RecognitionClient,
        audio: &Path,
    ) -> Result<RecognitionOutcome, ServiceError> {
        tracing::debug!(stage = %Stage::Recognizing, "Submitting audio for recognition");

        let raw = recognizer.identify(audio, ScanWindow::DEFAULT).await.map_err(|e| {
            tracing::error!(stage = %Stage::Recognizing, "Recognition request failed: {}", e);
            ServiceError::RecognitionFailed(e.to_string())
        })?;

        let outcome = interpret(raw).map_err(|e| {
            tracing::error!(stage = %Stage::Recognizing, "{}", e);
            e
        })?;

        tracing::info!(
            "Recognition finished with code {} and {} matches",
            outcome.code(),
            outcome.matches().len()
        );
        Ok(outcome)
    }

    async fn extract(&self, video: &VideoReference) -> Result<VideoMetadata, ServiceError> {
        tracing::debug!(
            stage = %Stage::Extracting,
            "Fetching metadata from {}",
            self.extractor.platform_name()
        );

        self.extractor.fetch_metadata(video).await.map_err(|e| {
            tracing::error!(stage = %Stage::Extracting, "Error retrieving video info: {}", e);
            extraction_failure(e, Stage::Extracting)
        })
    }

    async fn download(
        &self,
        video: &VideoReference,
        stream: &StreamDescriptor,
    ) -> Result<ScopedPath, ServiceError> {
        tracing::debug!(stage = %Stage::Downloading, "Downloading format {}", stream.format_id);

        let file = self.scratch.acquire(&format!(".{}", stream.container)).map_err(|e| {
            tracing::error!(stage = %Stage::Downloading, "Could not acquire scratch space: {}", e);
            ServiceError::Internal(format!("could not acquire scratch space: {}", e))
        })?;

        self.extractor.download(video, stream, file.path()).await.map_err(|e| {
            tracing::error!(
                stage = %Stage::Downloading,
                "Error downloading format {}: {}",
                stream.format_id,
                e
            );
            extraction_failure(e, Stage::Downloading)
        })?;

        if let Ok(meta) = tokio::fs::metadata(file.path()).await {
            tracing::info!("Downloaded {} ({})", stream.label(), format_file_size(meta.len()));
        }

        Ok(file)
    }
}

fn request_span(operation: &'static str, url: &str) -> tracing::Span {
    tracing::info_span!("request", id = %Uuid::new_v4(), operation, url = %url)
}

fn validate(url: &str) -> Result<VideoReference, ServiceError> {
    validator::parse(url).ok_or_else(|| {
        tracing::info!(stage = %Stage::Validating, "Rejected URL");
        ServiceError::InvalidInput("Invalid or missing YouTube URL".to_string())
    })
}

/// Map an extractor failure to the service taxonomy
///
/// Generic failures during a download are reported as `DownloadFailed`; the
/// availability, rate limit and timeout variants keep their meaning at any stage.
pub fn extraction_failure(err: ExtractionError, stage: Stage) -> ServiceError {
    match err {
        ExtractionError::Unavailable(message) => ServiceError::VideoUnavailable(message),
        ExtractionError::Private => ServiceError::VideoUnavailable("video is private".to_string()),
        ExtractionError::AgeRestricted => {
            ServiceError::VideoUnavailable("video is age-restricted".to_string())
        }
        ExtractionError::RateLimited(message) => ServiceError::RateLimited(message),
        ExtractionError::Http { status: 429, message } => ServiceError::RateLimited(message),
        ExtractionError::Timeout(limit) => ServiceError::ExtractionTimeout(limit.as_secs()),
        other if stage == Stage::Downloading => ServiceError::DownloadFailed(other.to_string()),
        ExtractionError::Http { status, message } => ServiceError::Upstream {
            status: Some(status),
            message,
        },
        ExtractionError::Failed(message) | ExtractionError::Parse(message) => {
            ServiceError::Upstream { status: None, message }
        }
        ExtractionError::Io(e) => ServiceError::Upstream {
            status: None,
            message: e.to_string(),
        },
    }
}

/// Turn a raw recognition response into an outcome
///
/// Code 0 is a match list (possibly empty), 1001 is "no match", anything else is an
/// upstream error carrying the code and message verbatim.
pub fn interpret(recognition: RawRecognition) -> Result<RecognitionOutcome, ServiceError> {
    let RawRecognition { response, raw } = recognition;

    match response.status.code {
        STATUS_SUCCESS => {
            let matches = response
                .metadata
                .map(|metadata| metadata.music.iter().map(mapper::map).collect())
                .unwrap_or_default();
            Ok(RecognitionOutcome::Matched {
                matches,
                code: STATUS_SUCCESS,
                raw,
            })
        }
        STATUS_NO_RESULT => Ok(RecognitionOutcome::NoMatch {
            code: STATUS_NO_RESULT,
            raw,
        }),
        code => Err(ServiceError::RecognitionUpstream {
            code,
            message: response.status.msg,
        }),
    }
}
