use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub mod youtube;

use crate::validator::VideoReference;

/// Metadata about one remote video
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub title: String,

    /// Uploader or channel name
    pub author: Option<String>,

    /// Duration in seconds
    pub length: Option<u64>,

    pub views: Option<u64>,

    pub description: Option<String>,

    pub publish_date: Option<NaiveDate>,

    pub thumbnail_url: Option<String>,

    /// Every stream the extractor reported, in extractor order
    pub streams: Vec<StreamDescriptor>,
}

impl VideoMetadata {
    /// Progressive streams ordered by descending resolution
    pub fn progressive_streams(&self) -> Vec<&StreamDescriptor> {
        let mut streams: Vec<_> = self.streams.iter().filter(|s| s.progressive).collect();
        streams.sort_by(|a, b| b.height.cmp(&a.height));
        streams
    }
}

/// One downloadable stream of a video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    /// Opaque selection token understood by the extractor
    pub format_id: String,

    /// `"<height>p"`, absent for audio-only streams
    pub resolution: Option<String>,

    pub height: Option<u32>,

    /// Container / file extension (mp4, webm, m4a, ...)
    pub container: String,

    /// Approximate size in bytes if known
    pub filesize: Option<u64>,

    /// Audio and video multiplexed together
    pub progressive: bool,

    pub audio_only: bool,

    /// Audio bitrate in kbit/s
    pub audio_bitrate: Option<f64>,
}

impl StreamDescriptor {
    pub fn mime_type(&self) -> String {
        match (self.audio_only, self.container.as_str()) {
            (true, "m4a") => "audio/mp4".to_string(),
            (true, ext) => format!("audio/{}", ext),
            (false, ext) => format!("video/{}", ext),
        }
    }

    /// Label used in download filenames
    pub fn label(&self) -> &str {
        match &self.resolution {
            Some(resolution) if !self.audio_only => resolution,
            _ => "audio",
        }
    }
}

/// What the caller asked to download
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamRequest {
    /// Best audio-only stream
    Audio,

    /// A progressive stream with exactly this resolution, e.g. `720p`
    Resolution(String),
}

impl StreamRequest {
    pub fn parse(input: &str) -> Self {
        if input.eq_ignore_ascii_case("audio") {
            StreamRequest::Audio
        } else {
            StreamRequest::Resolution(input.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            StreamRequest::Audio => "audio",
            StreamRequest::Resolution(resolution) => resolution,
        }
    }
}

/// No stream satisfied a [`StreamRequest`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoMatchingStream {
    pub requested: String,

    /// Progressive resolutions that do exist, highest first
    pub available: Vec<String>,
}

/// Pick the stream to materialize for `request`
///
/// Resolutions match exactly and must be progressive; when several streams share
/// the resolution the largest known file wins. Audio picks the audio-only stream
/// with the highest bitrate. Ties go to the stream listed first. There is no
/// fallback to other resolutions.
pub fn select_stream<'a>(
    streams: &'a [StreamDescriptor],
    request: &StreamRequest,
) -> Result<&'a StreamDescriptor, NoMatchingStream> {
    // `max_by` keeps the last of equal elements, so iterate in reverse to keep the first
    let selected = match request {
        StreamRequest::Resolution(resolution) => streams
            .iter()
            .filter(|s| s.progressive && s.resolution.as_deref() == Some(resolution.as_str()))
            .rev()
            .max_by_key(|s| s.filesize.unwrap_or(0)),
        StreamRequest::Audio => streams
            .iter()
            .filter(|s| s.audio_only)
            .rev()
            .max_by(|a, b| {
                a.audio_bitrate
                    .unwrap_or(0.0)
                    .total_cmp(&b.audio_bitrate.unwrap_or(0.0))
            }),
    };

    selected.ok_or_else(|| NoMatchingStream {
        requested: request.as_str().to_string(),
        available: progressive_resolutions(streams),
    })
}

/// Distinct progressive resolutions, highest first
pub fn progressive_resolutions(streams: &[StreamDescriptor]) -> Vec<String> {
    let mut progressive: Vec<_> = streams.iter().filter(|s| s.progressive).collect();
    progressive.sort_by(|a, b| b.height.cmp(&a.height));

    let mut resolutions: Vec<String> = Vec::new();
    for stream in progressive {
        if let Some(resolution) = &stream.resolution {
            if !resolutions.contains(resolution) {
                resolutions.push(resolution.clone());
            }
        }
    }
    resolutions
}

/// Failures reported by a media extractor
///
/// The orchestrator switches on these variants to pick a response status.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("video unavailable: {0}")]
    Unavailable(String),

    #[error("video is private")]
    Private,

    #[error("video is age-restricted")]
    AgeRestricted,

    #[error("rate limited by YouTube: {0}")]
    RateLimited(String),

    #[error("upstream HTTP error {status}: {message}")]
    Http { status: u16, message: String },

    #[error("extractor failed: {0}")]
    Failed(String),

    #[error("extractor timed out after {0:?}")]
    Timeout(Duration),

    #[error("could not parse extractor output: {0}")]
    Parse(String),

    #[error("extractor I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Source of video metadata and stream bytes
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Fetch metadata and the stream list without writing anything to disk
    async fn fetch_metadata(
        &self,
        video: &VideoReference,
    ) -> Result<VideoMetadata, ExtractionError>;

    /// Write the bytes of `stream` to `destination`
    async fn download(
        &self,
        video: &VideoReference,
        stream: &StreamDescriptor,
        destination: &Path,
    ) -> Result<(), ExtractionError>;

    /// Get the name of this platform
    fn platform_name(&self) -> &'static str;
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn progressive(height: u32, filesize: Option<u64>) -> StreamDescriptor {
        StreamDescriptor {
            format_id: format!("p{}", height),
            resolution: Some(format!("{}p", height)),
            height: Some(height),
            container: "mp4".to_string(),
            filesize,
            progressive: true,
            audio_only: false,
            audio_bitrate: Some(96.0),
        }
    }

    pub fn video_only(height: u32) -> StreamDescriptor {
        StreamDescriptor {
            format_id: format!("v{}", height),
            resolution: Some(format!("{}p", height)),
            height: Some(height),
            container: "webm".to_string(),
            filesize: Some(1_000_000),
            progressive: false,
            audio_only: false,
            audio_bitrate: None,
        }
    }

    pub fn audio(format_id: &str, bitrate: f64) -> StreamDescriptor {
        StreamDescriptor {
            format_id: format_id.to_string(),
            resolution: None,
            height: None,
            container: "m4a".to_string(),
            filesize: Some(500_000),
            progressive: false,
            audio_only: true,
            audio_bitrate: Some(bitrate),
        }
    }

    pub fn metadata(streams: Vec<StreamDescriptor>) -> VideoMetadata {
        VideoMetadata {
            title: "Never Gonna Give You Up".to_string(),
            author: Some("Rick Astley".to_string()),
            length: Some(213),
            views: Some(1_000_000),
            description: Some("Official video".to_string()),
            publish_date: NaiveDate::from_ymd_opt(2009, 10, 25),
            thumbnail_url: Some("https://i.ytimg.com/vi/dQw4w9WgXcQ/maxresdefault.jpg".to_string()),
            streams,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_exact_progressive_match() {
        let streams = vec![progressive(720, Some(10)), video_only(1080), progressive(360, Some(5))];
        let selected = select_stream(&streams, &StreamRequest::parse("720p")).unwrap();
        assert_eq!(selected.format_id, "p720");
    }

    #[test]
    fn test_video_only_stream_is_not_a_fallback() {
        let streams = vec![progressive(720, None), progressive(480, None), video_only(1080)];
        let err = select_stream(&streams, &StreamRequest::parse("1080p")).unwrap_err();

        assert_eq!(err.requested, "1080p");
        assert_eq!(err.available, vec!["720p".to_string(), "480p".to_string()]);
    }

    #[test]
    fn test_largest_file_wins_within_resolution() {
        let mut small = progressive(360, Some(100));
        small.format_id = "small".to_string();
        let mut large = progressive(360, Some(900));
        large.format_id = "large".to_string();

        let streams = vec![small, large];
        let selected = select_stream(&streams, &StreamRequest::parse("360p")).unwrap();
        assert_eq!(selected.format_id, "large");
    }

    #[test]
    fn test_ties_keep_first_listed_stream() {
        let mut first = progressive(720, None);
        first.format_id = "first".to_string();
        let mut second = progressive(720, None);
        second.format_id = "second".to_string();

        let streams = vec![first, second];
        let selected = select_stream(&streams, &StreamRequest::parse("720p")).unwrap();
        assert_eq!(selected.format_id, "first");

        let streams = vec![audio("first", 128.0), audio("second", 128.0)];
        let selected = select_stream(&streams, &StreamRequest::Audio).unwrap();
        assert_eq!(selected.format_id, "first");
    }

    #[test]
    fn test_audio_picks_highest_bitrate() {
        let streams = vec![
            audio("139", 48.0),
            progressive(360, None),
            audio("140", 129.5),
            audio("251", 128.0),
        ];
        let selected = select_stream(&streams, &StreamRequest::parse("AUDIO")).unwrap();
        assert_eq!(selected.format_id, "140");
    }

    #[test]
    fn test_audio_ignores_progressive_streams() {
        let streams = vec![progressive(360, None)];
        let err = select_stream(&streams, &StreamRequest::Audio).unwrap_err();
        assert_eq!(err.requested, "audio");
        assert_eq!(err.available, vec!["360p".to_string()]);
    }

    #[test]
    fn test_progressive_resolutions_are_distinct() {
        let streams = vec![
            progressive(360, None),
            progressive(720, None),
            progressive(360, Some(3)),
        ];
        assert_eq!(progressive_resolutions(&streams), vec!["720p", "360p"]);
    }

    #[test]
    fn test_progressive_streams_ordered_descending() {
        let meta = metadata(vec![
            progressive(360, None),
            audio("140", 128.0),
            progressive(720, None),
        ]);
        let heights: Vec<_> = meta.progressive_streams().iter().map(|s| s.height).collect();
        assert_eq!(heights, vec![Some(720), Some(360)]);
    }

    #[test]
    fn test_mime_type_and_label() {
        assert_eq!(progressive(720, None).mime_type(), "video/mp4");
        assert_eq!(audio("140", 128.0).mime_type(), "audio/mp4");
        assert_eq!(progressive(720, None).label(), "720p");
        assert_eq!(audio("140", 128.0).label(), "audio");
    }
}
