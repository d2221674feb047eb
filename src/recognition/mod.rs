use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

pub mod acrcloud;
pub mod mapper;

pub use acrcloud::AcrCloudClient;

/// Status code for a successful recognition
pub const STATUS_SUCCESS: i64 = 0;

/// Status code the service uses for "no match"
pub const STATUS_NO_RESULT: i64 = 1001;

/// Offset and length of the audio sample submitted for recognition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanWindow {
    pub start: Duration,
    pub length: Duration,
}

impl ScanWindow {
    /// First 12 seconds of the track
    pub const DEFAULT: ScanWindow = ScanWindow {
        start: Duration::ZERO,
        length: Duration::from_secs(12),
    };
}

/// A recognized track in the public response schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionMatch {
    pub id: String,
    pub title: String,
    /// All artist names joined with ", "
    pub artist: String,
    pub album: String,
    pub release_date: String,
    pub score: f64,
    pub platform_ids: PlatformIds,
    pub platform_links: PlatformLinks,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlatformIds {
    pub spotify: Option<String>,
    pub youtube: Option<String>,
    pub deezer: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlatformLinks {
    pub spotify: Option<String>,
    pub youtube: Option<String>,
    pub deezer: Option<String>,
}

/// Result of a recognition that the service considers successful
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionOutcome {
    /// Status 0, zero or more matches
    Matched {
        matches: Vec<RecognitionMatch>,
        code: i64,
        raw: Value,
    },

    /// Status 1001; the audio matched nothing
    NoMatch { code: i64, raw: Value },
}

impl RecognitionOutcome {
    pub fn matches(&self) -> &[RecognitionMatch] {
        match self {
            RecognitionOutcome::Matched { matches, .. } => matches,
            RecognitionOutcome::NoMatch { .. } => &[],
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            RecognitionOutcome::Matched { code, .. }
            | RecognitionOutcome::NoMatch { code, .. } => *code,
        }
    }
}

/// Raw recognition response as returned by the API
#[derive(Debug, Clone)]
pub struct RawRecognition {
    pub response: RawResponse,
    /// The untouched JSON body
    pub raw: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawResponse {
    pub status: RawStatus,
    #[serde(default)]
    pub metadata: Option<RawMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawStatus {
    pub code: i64,
    #[serde(default)]
    pub msg: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMetadata {
    #[serde(default)]
    pub music: Vec<RawMusic>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMusic {
    pub acrid: Option<String>,
    pub title: Option<String>,
    pub artists: Option<Vec<RawNamed>>,
    pub album: Option<RawNamed>,
    pub release_date: Option<String>,
    pub score: Option<f64>,
    pub external_metadata: Option<RawExternalMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawNamed {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawExternalMetadata {
    pub spotify: Option<RawTrackHolder>,
    pub deezer: Option<RawTrackHolder>,
    pub youtube: Option<RawYoutube>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTrackHolder {
    pub track: Option<RawTrack>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTrack {
    /// Spotify sends a string, Deezer sometimes a number
    pub id: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawYoutube {
    pub vid: Option<String>,
}

/// Transport-level recognition failures
///
/// Upstream status codes are not errors at this level; see `Orchestrator::recognize`.
#[derive(Debug, thiserror::Error)]
pub enum RecognitionError {
    #[error("recognition request timed out")]
    Timeout,

    #[error("recognition request failed: {0}")]
    Transport(String),

    #[error("recognition service returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("could not prepare audio sample: {0}")]
    Sample(String),

    #[error("could not parse recognition response: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for RecognitionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RecognitionError::Timeout
        } else {
            RecognitionError::Transport(err.to_string())
        }
    }
}

/// Audio fingerprinting service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecognitionClient: Send + Sync {
    /// Submit the `window` of the audio file at `audio` for identification
    async fn identify(
        &self,
        audio: &Path,
        window: ScanWindow,
    ) -> Result<RawRecognition, RecognitionError>;
}
