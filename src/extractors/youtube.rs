use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;

use super::{ExtractionError, MediaExtractor, StreamDescriptor, VideoMetadata};
use crate::validator::VideoReference;

/// YouTube extractor backed by yt-dlp
pub struct YoutubeExtractor {
    yt_dlp_path: String,
    metadata_timeout: Duration,
    download_timeout: Duration,
}

/// The subset of `yt-dlp --dump-json` we read
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
    duration: Option<f64>,
    view_count: Option<u64>,
    description: Option<String>,
    upload_date: Option<String>,
    thumbnail: Option<String>,
    #[serde(default)]
    formats: Vec<YtDlpFormat>,
}

#[derive(Debug, Deserialize)]
struct YtDlpFormat {
    format_id: String,
    ext: Option<String>,
    vcodec: Option<String>,
    acodec: Option<String>,
    height: Option<u32>,
    filesize: Option<f64>,
    filesize_approx: Option<f64>,
    abr: Option<f64>,
}

impl YoutubeExtractor {
    pub fn new(
        yt_dlp_path: impl Into<String>,
        metadata_timeout: Duration,
        download_timeout: Duration,
    ) -> Self {
        Self {
            yt_dlp_path: yt_dlp_path.into(),
            metadata_timeout,
            download_timeout,
        }
    }

    /// Run yt-dlp with a deadline; the child is killed if the deadline passes or the
    /// calling future is dropped.
    async fn run(&self, args: &[&str], limit: Duration) -> Result<Output, ExtractionError> {
        let mut command = Command::new(&self.yt_dlp_path);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(limit, command.output())
            .await
            .map_err(|_| ExtractionError::Timeout(limit))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(&stderr));
        }

        Ok(output)
    }
}

#[async_trait]
impl MediaExtractor for YoutubeExtractor {
    async fn fetch_metadata(
        &self,
        video: &VideoReference,
    ) -> Result<VideoMetadata, ExtractionError> {
        let url = video.canonical_url();
        tracing::debug!("Extracting video info for: {}", url);

        let args = ["--dump-json", "--no-playlist", "--no-warnings", url.as_str()];
        let output = self.run(&args, self.metadata_timeout).await?;

        parse_info(&output.stdout)
    }

    async fn download(
        &self,
        video: &VideoReference,
        stream: &StreamDescriptor,
        destination: &Path,
    ) -> Result<(), ExtractionError> {
        let url = video.canonical_url();
        // yt-dlp treats `%` in the output path as a template marker
        let template = destination.to_string_lossy().replace('%', "%%");

        tracing::debug!(
            "Downloading format {} of {} to {}",
            stream.format_id,
            url,
            destination.display()
        );

        self.run(
            &[
                "--format",
                stream.format_id.as_str(),
                "--output",
                template.as_str(),
                "--no-playlist",
                "--no-part",
                "--no-progress",
                "--no-warnings",
                url.as_str(),
            ],
            self.download_timeout,
        )
        .await?;

        match tokio::fs::metadata(destination).await {
            Ok(meta) if meta.len() > 0 => Ok(()),
            Ok(_) => Err(ExtractionError::Failed("yt-dlp produced an empty file".to_string())),
            Err(_) => Err(ExtractionError::Failed(
                "yt-dlp did not produce an output file".to_string(),
            )),
        }
    }

    fn platform_name(&self) -> &'static str {
        "YouTube"
    }
}

fn parse_info(stdout: &[u8]) -> Result<VideoMetadata, ExtractionError> {
    let info: YtDlpInfo =
        serde_json::from_slice(stdout).map_err(|e| ExtractionError::Parse(e.to_string()))?;

    let streams = info.formats.into_iter().filter_map(to_descriptor).collect();

    Ok(VideoMetadata {
        title: info.title.unwrap_or_default(),
        author: info.uploader.or(info.channel),
        length: info.duration.map(|d| d.max(0.0).round() as u64),
        views: info.view_count,
        description: info.description,
        publish_date: info
            .upload_date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y%m%d").ok()),
        thumbnail_url: info.thumbnail,
        streams,
    })
}

fn has_codec(codec: Option<&str>) -> bool {
    matches!(codec, Some(c) if c != "none")
}

/// Convert a yt-dlp format; storyboards and other formats without media are skipped
fn to_descriptor(format: YtDlpFormat) -> Option<StreamDescriptor> {
    let has_video = has_codec(format.vcodec.as_deref());
    let has_audio = has_codec(format.acodec.as_deref());
    if !has_video && !has_audio {
        return None;
    }

    let height = if has_video { format.height } else { None };

    Some(StreamDescriptor {
        format_id: format.format_id,
        resolution: height.map(|h| format!("{}p", h)),
        height,
        container: format.ext.unwrap_or_else(|| "mp4".to_string()),
        filesize: format
            .filesize
            .or(format.filesize_approx)
            .map(|size| size.max(0.0) as u64),
        progressive: has_video && has_audio,
        audio_only: has_audio && !has_video,
        audio_bitrate: format.abr,
    })
}

/// Map yt-dlp's stderr to the closed error set
pub fn classify_failure(stderr: &str) -> ExtractionError {
    let message = last_error_line(stderr);
    let lower = stderr.to_lowercase();

    if lower.contains("private video") {
        return ExtractionError::Private;
    }
    if lower.contains("confirm your age")
        || lower.contains("age-restricted")
        || lower.contains("inappropriate for some users")
    {
        return ExtractionError::AgeRestricted;
    }
    if lower.contains("http error 429")
        || lower.contains("too many requests")
        || lower.contains("not a bot")
    {
        return ExtractionError::RateLimited(message);
    }
    if lower.contains("video unavailable")
        || lower.contains("has been removed")
        || lower.contains("not available in your country")
        || lower.contains("this video is unavailable")
    {
        return ExtractionError::Unavailable(message);
    }
    if let Some(status) = http_status(&lower) {
        return ExtractionError::Http { status, message };
    }

    ExtractionError::Failed(message)
}

fn last_error_line(stderr: &str) -> String {
    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| line.starts_with("ERROR:"))
        .or_else(|| stderr.lines().rev().map(str::trim).find(|line| !line.is_empty()))
        .unwrap_or("yt-dlp exited with an error")
        .to_string()
}

fn http_status(lower: &str) -> Option<u16> {
    let start = lower.find("http error ")? + "http error ".len();
    lower.get(start..start + 3)?.parse().ok()
}
