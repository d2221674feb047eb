const FALLBACK_STEM: &str = "video";

/// Sanitize filename for safe filesystem usage
///
/// Alphanumeric characters, spaces, dots and hyphens are kept, everything else becomes `_`.
pub fn sanitize_filename(filename: &str) -> String {
    sanitize_with(filename, char::is_alphanumeric)
}

/// Like [`sanitize_filename`] but restricted to ASCII, for header values
pub fn ascii_filename(filename: &str) -> String {
    sanitize_with(filename, |c| c.is_ascii_alphanumeric())
}

fn sanitize_with(filename: &str, keep: impl Fn(char) -> bool) -> String {
    filename
        .chars()
        .map(|c| if keep(c) || c == ' ' || c == '.' || c == '-' { c } else { '_' })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Attachment name for a downloaded stream: `<title>_<label>.<ext>`
pub fn download_filename(title: &str, label: &str, extension: &str) -> String {
    let stem = sanitize_filename(title);
    let stem = if stem.is_empty() { FALLBACK_STEM.to_string() } else { stem };

    format!("{}_{}.{}", stem, sanitize_filename(label), sanitize_filename(extension))
}

/// Format file size in human-readable format
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f = bytes as f64;
    let unit_index = (bytes_f.log10() / THRESHOLD.log10()).floor() as usize;
    let unit_index = unit_index.min(UNITS.len() - 1);

    let size = bytes_f / THRESHOLD.powi(unit_index as i32);

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

/// Check if the current environment has required tools
pub async fn check_dependencies(yt_dlp: &str, ffmpeg: &str) -> Vec<String> {
    let mut missing = Vec::new();

    if !check_command_available(yt_dlp).await {
        missing.push(format!("{} - required for metadata and downloads", yt_dlp));
    }

    if !check_command_available(ffmpeg).await {
        missing.push(format!("{} - required to cut recognition samples", ffmpeg));
    }

    missing
}

/// Check if a command is available in PATH
async fn check_command_available(command: &str) -> bool {
    use tokio::process::Command;

    Command::new(command)
        .arg("-version")
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
        || Command::new(command)
            .arg("--version")
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(1048576), "1.0 MB");
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("Hello World!"), "Hello World_");
        assert_eq!(sanitize_filename("AC/DC: Back in Black (Live)"), "AC_DC_ Back in Black _Live_");
        assert_eq!(sanitize_filename("  spaced  "), "spaced");
        assert_eq!(sanitize_filename("Beyoncé - Halo"), "Beyoncé - Halo");
    }

    #[test]
    fn test_ascii_filename() {
        assert_eq!(ascii_filename("Beyoncé - Halo"), "Beyonc_ - Halo");
        assert_eq!(ascii_filename("a\"b\\c"), "a_b_c");
    }

    #[test]
    fn test_download_filename() {
        assert_eq!(download_filename("My Video?", "720p", "mp4"), "My Video__720p.mp4");
        assert_eq!(download_filename("", "audio", "m4a"), "video_audio.m4a");
        assert_eq!(download_filename("///", "audio", "m4a"), "____audio.m4a");
    }

    #[tokio::test]
    async fn test_missing_commands_are_reported() {
        let missing =
            check_dependencies("tubetrace-no-such-yt-dlp", "tubetrace-no-such-ffmpeg").await;
        assert_eq!(missing.len(), 2);
    }
}
