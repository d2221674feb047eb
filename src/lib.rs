//! tubetrace - a small HTTP service for YouTube metadata, downloads and music recognition
//!
//! This library validates YouTube URLs, extracts metadata and streams through `yt-dlp`,
//! and identifies the music in a video by submitting an audio sample to ACRCloud.

pub mod api;
pub mod cli;
pub mod config;
pub mod extractors;
pub mod orchestrator;
pub mod recognition;
pub mod storage;
pub mod utils;
pub mod validator;

pub use api::{build_router, AppState};
pub use cli::{Cli, Commands};
pub use config::Config;
pub use extractors::{MediaExtractor, StreamDescriptor, VideoMetadata};
pub use orchestrator::Orchestrator;
pub use recognition::{RecognitionClient, RecognitionMatch, RecognitionOutcome};

/// Result type used by startup and configuration code
pub type Result<T> = anyhow::Result<T>;

/// Terminal failures a request can end in
///
/// Every variant maps to exactly one HTTP status, see `api::error`.
#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Resolution '{requested}' not available or no suitable progressive stream found for this video.")]
    StreamNotFound {
        requested: String,
        available: Vec<String>,
    },

    #[error("No audio stream found for this video")]
    NoAudioStream,

    #[error("Video unavailable: {0}")]
    VideoUnavailable(String),

    #[error("YouTube rate limited the extractor: {0}")]
    RateLimited(String),

    #[error("Upstream extraction error: {message}")]
    Upstream {
        status: Option<u16>,
        message: String,
    },

    #[error("Extraction timed out after {0} seconds")]
    ExtractionTimeout(u64),

    #[error("Could not download video: {0}")]
    DownloadFailed(String),

    #[error("Recognition service is not configured")]
    RecognitionUnavailable,

    #[error("Recognition service returned code {code}: {message}")]
    RecognitionUpstream { code: i64, message: String },

    #[error("Recognition failed: {0}")]
    RecognitionFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
