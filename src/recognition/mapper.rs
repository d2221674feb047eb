//! Translation from the raw recognition schema to [`RecognitionMatch`]

use serde_json::Value;

use super::{PlatformIds, PlatformLinks, RawMusic, RecognitionMatch};

pub const UNKNOWN_TITLE: &str = "Unknown Title";
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
pub const UNKNOWN_ALBUM: &str = "Unknown Album";
pub const UNKNOWN_RELEASE_DATE: &str = "N/A";

/// Build a public match from one raw music entry
///
/// Total over any deserialized entry; absent fields take the `UNKNOWN_*` defaults
/// and a score of 0.
pub fn map(raw: &RawMusic) -> RecognitionMatch {
    let artist = raw
        .artists
        .as_ref()
        .map(|artists| {
            artists
                .iter()
                .filter_map(|a| non_blank(a.name.as_deref()))
                .collect::<Vec<_>>()
                .join(", ")
        })
        .filter(|joined| !joined.is_empty())
        .unwrap_or_else(|| UNKNOWN_ARTIST.to_string());

    let external = raw.external_metadata.as_ref();
    let platform_ids = PlatformIds {
        spotify: external
            .and_then(|e| e.spotify.as_ref())
            .and_then(|s| s.track.as_ref())
            .and_then(|t| identifier(t.id.as_ref())),
        youtube: external
            .and_then(|e| e.youtube.as_ref())
            .and_then(|y| non_blank(y.vid.as_deref())),
        deezer: external
            .and_then(|e| e.deezer.as_ref())
            .and_then(|d| d.track.as_ref())
            .and_then(|t| identifier(t.id.as_ref())),
    };
    let platform_links = links_for(&platform_ids);

    RecognitionMatch {
        id: raw.acrid.clone().unwrap_or_default(),
        title: non_blank(raw.title.as_deref()).unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
        artist,
        album: raw
            .album
            .as_ref()
            .and_then(|a| non_blank(a.name.as_deref()))
            .unwrap_or_else(|| UNKNOWN_ALBUM.to_string()),
        release_date: non_blank(raw.release_date.as_deref())
            .unwrap_or_else(|| UNKNOWN_RELEASE_DATE.to_string()),
        score: raw.score.unwrap_or(0.0),
        platform_ids,
        platform_links,
    }
}

fn links_for(ids: &PlatformIds) -> PlatformLinks {
    PlatformLinks {
        spotify: ids
            .spotify
            .as_ref()
            .map(|id| format!("https://open.spotify.com/track/{}", urlencoding::encode(id))),
        youtube: ids
            .youtube
            .as_ref()
            .map(|id| format!("https://www.youtube.com/watch?v={}", urlencoding::encode(id))),
        deezer: ids
            .deezer
            .as_ref()
            .map(|id| format!("https://www.deezer.com/track/{}", urlencoding::encode(id))),
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn identifier(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => non_blank(Some(s)),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
