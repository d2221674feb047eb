use async_trait::async_trait;
use base64::Engine;
use hmac::{Hmac, Mac};
use reqwest::multipart::{Form, Part};
use sha1::Sha1;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use super::{RawRecognition, RawResponse, RecognitionClient, RecognitionError, ScanWindow};
use crate::config::AcrCloudCredentials;

const IDENTIFY_PATH: &str = "/v1/identify";
const DATA_TYPE: &str = "audio";
const SIGNATURE_VERSION: &str = "1";
const SAMPLE_FILE_NAME: &str = "sample.wav";
const SAMPLE_TIMEOUT: Duration = Duration::from_secs(60);
const USER_AGENT: &str = concat!("tubetrace/", env!("CARGO_PKG_VERSION"));

/// ACRCloud identify client
///
/// The scan window is cut out of the downloaded audio with ffmpeg and uploaded as a
/// mono 8 kHz WAV sample.
pub struct AcrCloudClient {
    http_client: reqwest::Client,
    endpoint: String,
    access_key: String,
    access_secret: String,
    ffmpeg_path: String,
}

impl AcrCloudClient {
    pub fn new(
        credentials: &AcrCloudCredentials,
        ffmpeg_path: impl Into<String>,
    ) -> Result<Self, RecognitionError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(credentials.timeout)
            .timeout(credentials.timeout)
            .build()?;

        Ok(Self {
            http_client,
            endpoint: endpoint_for(&credentials.host),
            access_key: credentials.access_key.clone(),
            access_secret: credentials.access_secret.clone(),
            ffmpeg_path: ffmpeg_path.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Cut `window` out of `audio` into a WAV file next to it
    async fn clip_sample(
        &self,
        audio: &Path,
        window: ScanWindow,
    ) -> Result<PathBuf, RecognitionError> {
        let sample_path = audio.with_file_name(SAMPLE_FILE_NAME);

        let start = format!("{:.3}", window.start.as_secs_f64());
        let length = format!("{:.3}", window.length.as_secs_f64());
        let input = audio.to_string_lossy();
        let output = sample_path.to_string_lossy();

        let mut command = Command::new(&self.ffmpeg_path);
        command
            .args([
                "-nostdin", "-hide_banner",
                "-loglevel", "error",
                "-y",
                "-ss", start.as_str(),
                "-t", length.as_str(),
                "-i", &*input,
                "-vn",
                "-ac", "1",
                "-ar", "8000",
                "-f", "wav",
                &*output,
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let result = tokio::time::timeout(SAMPLE_TIMEOUT, command.output())
            .await
            .map_err(|_| RecognitionError::Sample("ffmpeg timed out".to_string()))?
            .map_err(|e| RecognitionError::Sample(format!("could not run ffmpeg: {}", e)))?;

        if !result.status.success() {
            let error = String::from_utf8_lossy(&result.stderr);
            return Err(RecognitionError::Sample(format!("ffmpeg failed: {}", error.trim())));
        }

        Ok(sample_path)
    }
}

#[async_trait]
impl RecognitionClient for AcrCloudClient {
    async fn identify(
        &self,
        audio: &Path,
        window: ScanWindow,
    ) -> Result<RawRecognition, RecognitionError> {
        let sample_path = self.clip_sample(audio, window).await?;
        let sample = tokio::fs::read(&sample_path).await?;
        if sample.is_empty() {
            return Err(RecognitionError::Sample("audio sample is empty".to_string()));
        }

        let timestamp = chrono::Utc::now().timestamp();
        let signature = sign(&self.access_secret, &self.access_key, timestamp);

        tracing::debug!(
            "Submitting {} byte sample to {}",
            sample.len(),
            self.endpoint
        );

        let form = Form::new()
            .text("access_key", self.access_key.clone())
            .text("data_type", DATA_TYPE)
            .text("signature_version", SIGNATURE_VERSION)
            .text("signature", signature)
            .text("timestamp", timestamp.to_string())
            .text("sample_bytes", sample.len().to_string())
            .part(
                "sample",
                Part::bytes(sample)
                    .file_name(SAMPLE_FILE_NAME)
                    .mime_str("audio/wav")?,
            );

        let response = self.http_client.post(&self.endpoint).multipart(form).send().await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(RecognitionError::Http {
                status: status.as_u16(),
                body,
            });
        }

        parse_response(&body)
    }
}

/// Build the identify URL; a host given with a scheme is used as-is
fn endpoint_for(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        format!("{}{}", host, IDENTIFY_PATH)
    } else {
        format!("https://{}{}", host, IDENTIFY_PATH)
    }
}

/// HMAC-SHA1 request signature, base64 encoded
pub fn sign(access_secret: &str, access_key: &str, timestamp: i64) -> String {
    let string_to_sign = format!(
        "POST\n{}\n{}\n{}\n{}\n{}",
        IDENTIFY_PATH, access_key, DATA_TYPE, SIGNATURE_VERSION, timestamp
    );

    let mut mac =
        Hmac::<Sha1>::new_from_slice(access_secret.as_bytes()).expect("HMAC accepts any key size");
    mac.update(string_to_sign.as_bytes());

    base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
}

fn parse_response(body: &str) -> Result<RawRecognition, RecognitionError> {
    let raw: serde_json::Value =
        serde_json::from_str(body).map_err(|e| RecognitionError::Parse(e.to_string()))?;
    let response: RawResponse =
        serde_json::from_value(raw.clone()).map_err(|e| RecognitionError::Parse(e.to_string()))?;

    Ok(RawRecognition { response, raw })
}
