//! YouTube URL validation
//!
//! Accepted grammar (anchored, no trimming):
//!
//! ```text
//! url    = [ ("http" | "https") "://" ] [ "www." ] ( long | short ) [ extra ]
//! long   = "youtube.com/watch?v=" id
//! short  = "youtu.be/" id
//! id     = 1*( ALPHA / DIGIT / "_" / "-" )
//! extra  = ( "&" | "?" ) *( non-whitespace )
//! ```
//!
//! Scheme and host are matched case-insensitively, the video id is not.

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

static YOUTUBE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?i:https?://)?(?i:www\.)?(?:(?i:youtube\.com)/watch\?v=(?P<long>[A-Za-z0-9_-]+)|(?i:youtu\.be)/(?P<short>[A-Za-z0-9_-]+))(?:[&?]\S*)?$",
    )
    .expect("YouTube URL pattern is valid")
});

/// A validated reference to one remote video
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoReference {
    /// The URL exactly as the caller sent it
    pub source: String,

    /// The video id extracted from either URL form
    pub video_id: String,
}

impl VideoReference {
    /// The canonical long-form watch URL handed to the extractor
    ///
    /// Extra query parameters from the source (playlists, timestamps) are dropped.
    pub fn canonical_url(&self) -> Url {
        let mut url = Url::parse("https://www.youtube.com/watch").expect("static URL is valid");
        url.query_pairs_mut().append_pair("v", &self.video_id);
        url
    }
}

/// Check whether `input` is a supported YouTube video URL
pub fn validate(input: &str) -> bool {
    YOUTUBE_URL.is_match(input)
}

/// Validate `input` and derive its video id
pub fn parse(input: &str) -> Option<VideoReference> {
    let captures = YOUTUBE_URL.captures(input)?;
    let video_id = captures
        .name("long")
        .or_else(|| captures.name("short"))?
        .as_str()
        .to_string();

    Some(VideoReference {
        source: input.to_string(),
        video_id,
    })
}
