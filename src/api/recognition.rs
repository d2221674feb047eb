use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;

use super::error::{require_url, UrlRequest};
use super::AppState;
use crate::recognition::{RecognitionMatch, RecognitionOutcome};
use crate::ServiceError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionResponse {
    /// Empty when the audio matched nothing
    pub matches: Vec<RecognitionMatch>,
    pub acr_code: i64,
    /// Raw response from the recognition service
    pub acr_response: Value,
}

impl From<RecognitionOutcome> for RecognitionResponse {
    fn from(outcome: RecognitionOutcome) -> Self {
        match outcome {
            RecognitionOutcome::Matched { matches, code, raw } => Self {
                matches,
                acr_code: code,
                acr_response: raw,
            },
            RecognitionOutcome::NoMatch { code, raw } => Self {
                matches: Vec::new(),
                acr_code: code,
                acr_response: raw,
            },
        }
    }
}

/// POST /api/process-youtube-url
async fn process_youtube_url(
    State(state): State<AppState>,
    body: Result<Json<UrlRequest>, JsonRejection>,
) -> Result<Json<RecognitionResponse>, ServiceError> {
    if !state.orchestrator.recognition_enabled() {
        return Err(ServiceError::RecognitionUnavailable);
    }

    let url = require_url(body)?;
    let outcome = state.orchestrator.identify(&url).await?;

    Ok(Json(outcome.into()))
}

pub fn recognition_routes() -> Router<AppState> {
    Router::new().route("/api/process-youtube-url", post(process_youtube_url))
}
