//! HTTP surface
//!
//! - `GET /` liveness text
//! - `GET /health`
//! - `POST /video_info`
//! - `POST /download/:resolution`
//! - `POST /api/process-youtube-url`

pub mod error;
pub mod health;
pub mod recognition;
pub mod video;

pub use health::health_routes;
pub use recognition::recognition_routes;
pub use video::video_routes;

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::orchestrator::Orchestrator;

/// Application state shared across handlers
///
/// Everything here is read-only after startup.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub config: Arc<Config>,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator, config: Config) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            config: Arc::new(config),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(health_routes())
        .merge(video_routes())
        .merge(recognition_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::fixtures::{audio, metadata, progressive, video_only};
    use crate::extractors::{ExtractionError, MockMediaExtractor, StreamDescriptor};
    use crate::orchestrator::testing::{raw_recognition, VALID_URL};
    use crate::recognition::{MockRecognitionClient, RecognitionClient};
    use crate::storage::ScratchSpace;
    use axum::body::Body;
    use axum::http::{header, HeaderMap, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const RECOGNIZE: &str = "/api/process-youtube-url";

    struct TestApp {
        router: Router,
        root: tempfile::TempDir,
    }

    impl TestApp {
        async fn send(&self, request: Request<Body>) -> (StatusCode, HeaderMap, Vec<u8>) {
            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let headers = response.headers().clone();
            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            (status, headers, bytes.to_vec())
        }

        async fn send_json(&self, request: Request<Body>) -> (StatusCode, Value) {
            let (status, _, bytes) = self.send(request).await;
            (status, serde_json::from_slice(&bytes).unwrap())
        }

        /// POST `{"url": url}` and decode the JSON answer
        async fn post_url(&self, uri: &str, url: &str) -> (StatusCode, Value) {
            self.send_json(post(uri, json!({ "url": url }))).await
        }

        fn scratch_is_empty(&self) -> bool {
            let root = self.root.path();
            !root.exists() || std::fs::read_dir(root).unwrap().count() == 0
        }
    }

    fn app(extractor: MockMediaExtractor, recognizer: Option<MockRecognitionClient>) -> TestApp {
        let root = tempfile::tempdir().unwrap();
        let orchestrator = Orchestrator::new(
            Arc::new(extractor),
            recognizer.map(|r| Arc::new(r) as Arc<dyn RecognitionClient>),
            ScratchSpace::new(root.path()),
        );
        let router = build_router(AppState::new(orchestrator, Config::default()));
        TestApp { router, root }
    }

    fn extractor_with(streams: Vec<StreamDescriptor>) -> MockMediaExtractor {
        let mut extractor = MockMediaExtractor::new();
        extractor.expect_platform_name().return_const("YouTube");
        extractor
            .expect_fetch_metadata()
            .returning(move |_| Ok(metadata(streams.clone())));
        extractor.expect_download().returning(|_, _, dest| {
            std::fs::write(dest, b"media bytes").unwrap();
            Ok(())
        });
        extractor
    }

    fn idle_extractor() -> MockMediaExtractor {
        let mut extractor = MockMediaExtractor::new();
        extractor.expect_fetch_metadata().never();
        extractor.expect_download().never();
        extractor
    }

    fn recognizer_answering(body: Value) -> MockRecognitionClient {
        let mut recognizer = MockRecognitionClient::new();
        recognizer
            .expect_identify()
            .returning(move |_, _| Ok(raw_recognition(body.clone())));
        recognizer
    }

    fn post(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_liveness_and_health() {
        let app = app(idle_extractor(), None);

        let (status, _, body) = app.send(get("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(String::from_utf8(body).unwrap().contains("running"));

        let (status, body) = app.send_json(get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["recognition_configured"], false);
    }

    #[tokio::test]
    async fn test_invalid_url_is_bad_request_everywhere() {
        let mut recognizer = MockRecognitionClient::new();
        recognizer.expect_identify().never();
        let app = app(idle_extractor(), Some(recognizer));

        let invalid = [
            "not a url",
            "https://vimeo.com/76979871",
            "https://www.youtube.com/watch?v=",
        ];
        for uri in ["/video_info", "/download/720p", "/download/audio", RECOGNIZE] {
            for url in invalid {
                let (status, body) = app.post_url(uri, url).await;
                assert_eq!(status, StatusCode::BAD_REQUEST, "{} with {}", uri, url);
                assert_eq!(body["error"], "Invalid or missing YouTube URL");
            }
        }
        assert!(app.scratch_is_empty());
    }

    #[tokio::test]
    async fn test_missing_url_is_bad_request_everywhere() {
        let app = app(idle_extractor(), None);

        for uri in ["/video_info", "/download/720p"] {
            let (status, body) = app.send_json(post(uri, json!({}))).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error"], "Missing 'url' in request body");
        }

        let no_body = Request::builder()
            .method("POST")
            .uri("/video_info")
            .body(Body::empty())
            .unwrap();
        let (status, _) = app.send_json(no_body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_video_info_success() {
        let streams = vec![progressive(360, Some(10)), audio("140", 128.0), progressive(720, None)];
        let app = app(extractor_with(streams), None);

        let (status, body) = app.post_url("/video_info", VALID_URL).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Never Gonna Give You Up");
        assert_eq!(body["author"], "Rick Astley");
        assert_eq!(body["length"], 213);
        assert_eq!(body["publish_date"], "2009-10-25");
        assert_eq!(body["streams"][0]["resolution"], "720p");
        assert_eq!(body["streams"][1]["resolution"], "360p");
        assert_eq!(body["streams"][1]["mime_type"], "video/mp4");
        assert_eq!(body["streams"].as_array().unwrap().len(), 2);
        assert!(app.scratch_is_empty());
    }

    #[tokio::test]
    async fn test_video_info_rate_limited() {
        let mut extractor = MockMediaExtractor::new();
        extractor.expect_platform_name().return_const("YouTube");
        extractor
            .expect_fetch_metadata()
            .returning(|_| Err(ExtractionError::RateLimited("HTTP Error 429".to_string())));
        let app = app(extractor, None);

        let (status, _) = app.post_url("/video_info", VALID_URL).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_download_unknown_resolution_lists_alternatives() {
        let streams = vec![progressive(720, None), progressive(480, None), video_only(1080)];
        let app = app(extractor_with(streams), None);

        let (status, body) = app.post_url("/download/1080p", VALID_URL).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let mut available: Vec<String> = body["available_progressive_resolutions"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect();
        available.sort();
        assert_eq!(available, vec!["480p", "720p"]);
        assert!(app.scratch_is_empty());
    }

    #[tokio::test]
    async fn test_download_streams_attachment_and_cleans_up() {
        let app = app(extractor_with(vec![progressive(720, Some(11))]), None);

        let request = post("/download/720p", json!({ "url": VALID_URL }));
        let (status, headers, body) = app.send(request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"media bytes");
        assert_eq!(headers[header::CONTENT_TYPE], "video/mp4");
        assert_eq!(headers[header::CONTENT_LENGTH], "11");

        let disposition = headers[header::CONTENT_DISPOSITION].to_str().unwrap();
        assert!(disposition
            .starts_with(r#"attachment; filename="Never Gonna Give You Up_720p.mp4""#));

        assert!(app.scratch_is_empty());
    }

    #[tokio::test]
    async fn test_download_audio() {
        let app = app(extractor_with(vec![progressive(360, None), audio("140", 128.0)]), None);

        let request = post("/download/audio", json!({ "url": VALID_URL }));
        let (status, headers, _) = app.send(request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "audio/mp4");
        assert!(headers[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .contains("_audio.m4a"));
        assert!(app.scratch_is_empty());
    }

    #[tokio::test]
    async fn test_dropped_download_body_cleans_up() {
        let app = app(extractor_with(vec![progressive(720, None)]), None);

        let response = app
            .router
            .clone()
            .oneshot(post("/download/720p", json!({ "url": VALID_URL })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(!app.scratch_is_empty());

        drop(response);
        assert!(app.scratch_is_empty());
    }

    #[tokio::test]
    async fn test_recognition_unconfigured_is_503_without_work() {
        let app = app(idle_extractor(), None);

        for body in [json!({ "url": VALID_URL }), json!({})] {
            let (status, body) = app.send_json(post(RECOGNIZE, body)).await;
            assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
            assert!(body["error"].is_string());
        }
    }

    #[tokio::test]
    async fn test_recognition_no_match_is_ok() {
        let recognizer = recognizer_answering(json!({
            "status": {"code": 1001, "msg": "No result", "version": "1.0"}
        }));
        let app = app(extractor_with(vec![audio("140", 128.0)]), Some(recognizer));

        let (status, body) = app.post_url(RECOGNIZE, VALID_URL).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["matches"], json!([]));
        assert_eq!(body["acrCode"], 1001);
        assert_eq!(body["acrResponse"]["status"]["msg"], "No result");
        assert!(app.scratch_is_empty());
    }

    #[tokio::test]
    async fn test_recognition_match() {
        let recognizer = recognizer_answering(json!({
            "status": {"code": 0, "msg": "Success"},
            "metadata": {"music": [{
                "acrid": "abc",
                "title": "Never Gonna Give You Up",
                "artists": [{"name": "Rick Astley"}],
                "score": 100,
                "external_metadata": {"spotify": {"track": {"id": "4PTG3Z6ehGkBFwjybzWkR8"}}}
            }]}
        }));
        let app = app(extractor_with(vec![audio("140", 128.0)]), Some(recognizer));

        let (status, body) = app.post_url(RECOGNIZE, VALID_URL).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["acrCode"], 0);

        let first = &body["matches"][0];
        assert_eq!(first["artist"], "Rick Astley");
        assert_eq!(first["album"], "Unknown Album");
        assert_eq!(first["releaseDate"], "N/A");
        assert_eq!(
            first["platformLinks"]["spotify"],
            "https://open.spotify.com/track/4PTG3Z6ehGkBFwjybzWkR8"
        );
        assert_eq!(first["platformLinks"]["deezer"], Value::Null);
    }

    #[tokio::test]
    async fn test_recognition_upstream_error() {
        let recognizer = recognizer_answering(json!({
            "status": {"code": 3001, "msg": "Missing/Invalid Access Key"}
        }));
        let app = app(extractor_with(vec![audio("140", 128.0)]), Some(recognizer));

        let (status, body) = app.post_url(RECOGNIZE, VALID_URL).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["acrCode"], 3001);
        assert_eq!(body["acrMessage"], "Missing/Invalid Access Key");
        assert!(app.scratch_is_empty());
    }

    #[tokio::test]
    async fn test_recognition_video_unavailable() {
        let mut extractor = MockMediaExtractor::new();
        extractor.expect_platform_name().return_const("YouTube");
        extractor
            .expect_fetch_metadata()
            .returning(|_| Err(ExtractionError::Private));
        extractor.expect_download().never();
        let mut recognizer = MockRecognitionClient::new();
        recognizer.expect_identify().never();
        let app = app(extractor, Some(recognizer));

        let (status, _) = app.post_url(RECOGNIZE, VALID_URL).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
