use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_HOST: &str = "TUBETRACE_HOST";
pub const ENV_PORT: &str = "TUBETRACE_PORT";
/// Port variable set by most PaaS platforms; `TUBETRACE_PORT` wins over it
pub const ENV_PLATFORM_PORT: &str = "PORT";
pub const ENV_TEMP_DIR: &str = "TUBETRACE_TEMP_DIR";
pub const ENV_YT_DLP: &str = "TUBETRACE_YT_DLP";
pub const ENV_FFMPEG: &str = "TUBETRACE_FFMPEG";
pub const ENV_EXTRACTION_TIMEOUT: &str = "TUBETRACE_EXTRACTION_TIMEOUT";
pub const ENV_ACR_HOST: &str = "ACRCLOUD_HOST";
pub const ENV_ACR_ACCESS_KEY: &str = "ACRCLOUD_ACCESS_KEY";
pub const ENV_ACR_ACCESS_SECRET: &str = "ACRCLOUD_ACCESS_SECRET";
pub const ENV_ACR_TIMEOUT: &str = "ACRCLOUD_TIMEOUT";

const LOCAL_CONFIG_FILE: &str = "tubetrace.yaml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP listener settings
    pub server: ServerConfig,

    /// Scratch storage for downloads
    pub storage: StorageConfig,

    /// yt-dlp settings
    pub extraction: ExtractionConfig,

    /// ACRCloud settings
    pub recognition: RecognitionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root for per-request scratch directories (system temp dir if unset)
    pub temp_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub yt_dlp_path: String,

    /// Deadline for metadata lookups
    pub timeout_secs: u64,

    /// Deadline for stream downloads
    pub download_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    pub host: Option<String>,
    pub access_key: Option<String>,
    pub access_secret: Option<String>,

    /// Connect and response timeout for the identify call
    pub timeout_secs: u64,

    /// ffmpeg binary used to cut the scan window
    pub ffmpeg_path: String,
}

/// Fully specified ACRCloud credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcrCloudCredentials {
    pub host: String,
    pub access_key: String,
    pub access_secret: String,
    pub timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            yt_dlp_path: "yt-dlp".to_string(),
            timeout_secs: 60,
            download_timeout_secs: 600,
        }
    }
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            host: None,
            access_key: None,
            access_secret: None,
            timeout_secs: 10,
            ffmpeg_path: "ffmpeg".to_string(),
        }
    }
}

impl RecognitionConfig {
    /// Resolve the credentials
    ///
    /// `Ok(None)` when none of host, key and secret are set (recognition disabled).
    /// A partial set is a configuration error naming the missing variables.
    pub fn credentials(&self) -> Result<Option<AcrCloudCredentials>> {
        let fields = [
            (ENV_ACR_HOST, non_blank(&self.host)),
            (ENV_ACR_ACCESS_KEY, non_blank(&self.access_key)),
            (ENV_ACR_ACCESS_SECRET, non_blank(&self.access_secret)),
        ];

        let missing: Vec<&str> = fields
            .iter()
            .filter(|(_, value)| value.is_none())
            .map(|(name, _)| *name)
            .collect();

        if missing.len() == fields.len() {
            return Ok(None);
        }
        if !missing.is_empty() {
            anyhow::bail!(
                "Recognition service is partially configured; missing {}",
                missing.join(", ")
            );
        }
        if self.timeout_secs == 0 {
            anyhow::bail!("{} must be at least 1 second", ENV_ACR_TIMEOUT);
        }

        let [(_, host), (_, access_key), (_, access_secret)] = fields;
        Ok(Some(AcrCloudCredentials {
            host: host.unwrap_or_default(),
            access_key: access_key.unwrap_or_default(),
            access_secret: access_secret.unwrap_or_default(),
            timeout: Duration::from_secs(self.timeout_secs),
        }))
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// Fails if the file cannot be parsed, a variable has an invalid value, or the
    /// recognition credentials are only partially set.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let config = Self::resolve(explicit_path)?;
        config.validate()?;

        Ok(config)
    }

    /// File plus environment, without validation
    pub fn resolve(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = match Self::config_path(explicit_path)? {
            Some(path) => {
                tracing::info!("Loading configuration from {}", path.display());
                Self::from_file(&path)?
            }
            None => Self::default(),
        };

        config.apply_env(|name| std::env::var(name).ok())?;

        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs_err::read_to_string(path).context("Failed to read config file")?;

        serde_yaml::from_str(&content).context("Failed to parse config file")
    }

    /// Get configuration file path, if any exists
    fn config_path(explicit_path: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit_path {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            return Ok(Some(path.to_path_buf()));
        }

        // First try current directory for easy testing
        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            return Ok(Some(local_config));
        }

        Ok(dirs::config_dir()
            .map(|dir| dir.join("tubetrace").join("config.yaml"))
            .filter(|path| path.exists()))
    }

    /// Overlay environment variables read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(ENV_HOST) {
            self.server.host = host;
        }
        if let Some(port) = lookup(ENV_PORT).or_else(|| lookup(ENV_PLATFORM_PORT)) {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid port: {}", port))?;
        }
        if let Some(dir) = lookup(ENV_TEMP_DIR) {
            self.storage.temp_dir = Some(PathBuf::from(dir));
        }
        if let Some(path) = lookup(ENV_YT_DLP) {
            self.extraction.yt_dlp_path = path;
        }
        if let Some(secs) = lookup(ENV_EXTRACTION_TIMEOUT) {
            self.extraction.timeout_secs = secs
                .trim()
                .parse()
                .with_context(|| format!("Invalid {}: {}", ENV_EXTRACTION_TIMEOUT, secs))?;
        }
        if let Some(path) = lookup(ENV_FFMPEG) {
            self.recognition.ffmpeg_path = path;
        }
        if let Some(host) = lookup(ENV_ACR_HOST) {
            self.recognition.host = Some(host);
        }
        if let Some(key) = lookup(ENV_ACR_ACCESS_KEY) {
            self.recognition.access_key = Some(key);
        }
        if let Some(secret) = lookup(ENV_ACR_ACCESS_SECRET) {
            self.recognition.access_secret = Some(secret);
        }
        if let Some(secs) = lookup(ENV_ACR_TIMEOUT) {
            self.recognition.timeout_secs = secs
                .trim()
                .parse()
                .with_context(|| format!("Invalid {}: {}", ENV_ACR_TIMEOUT, secs))?;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.extraction.timeout_secs == 0 || self.extraction.download_timeout_secs == 0 {
            anyhow::bail!("Extraction timeouts must be at least 1 second");
        }

        self.recognition.credentials()?;

        Ok(())
    }

    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_secs(self.extraction.timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.extraction.download_timeout_secs)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Listen: {}", self.bind_address());
        match &self.storage.temp_dir {
            Some(dir) => println!("  Temp Dir: {}", dir.display()),
            None => println!("  Temp Dir: {} (system default)", std::env::temp_dir().display()),
        }
        println!("  yt-dlp: {}", self.extraction.yt_dlp_path);
        println!(
            "  Extraction Timeouts: {}s metadata, {}s download",
            self.extraction.timeout_secs, self.extraction.download_timeout_secs
        );
        println!("  ffmpeg: {}", self.recognition.ffmpeg_path);
        match self.recognition.credentials() {
            Ok(Some(credentials)) => {
                println!("  ACRCloud Host: {}", credentials.host);
                println!("  ACRCloud Access Key: {}", credentials.access_key);
                println!("  ACRCloud Access Secret: {}", mask(&credentials.access_secret));
                println!("  ACRCloud Timeout: {}s", credentials.timeout.as_secs());
            }
            Ok(None) => println!("  ACRCloud: not configured (recognition disabled)"),
            Err(e) => println!("  ACRCloud: invalid ({})", e),
        }
    }
}

fn mask(secret: &str) -> String {
    let visible: String = secret.chars().take(2).collect();
    format!("{}{}", visible, "*".repeat(secret.chars().count().saturating_sub(2).max(4)))
}
