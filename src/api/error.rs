//! HTTP status mapping for [`ServiceError`]

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::ServiceError;

const PROGRESSIVE_HINT: &str = "Progressive streams include both video and audio.";

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ServiceError::StreamNotFound { .. }
            | ServiceError::NoAudioStream
            | ServiceError::VideoUnavailable(_) => StatusCode::NOT_FOUND,
            ServiceError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ServiceError::Upstream { status: Some(_), .. } => StatusCode::BAD_GATEWAY,
            ServiceError::ExtractionTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ServiceError::RecognitionUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Upstream { status: None, .. }
            | ServiceError::DownloadFailed(_)
            | ServiceError::RecognitionUpstream { .. }
            | ServiceError::RecognitionFailed(_)
            | ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut body = json!({ "error": self.to_string() });

        match &self {
            ServiceError::StreamNotFound { available, .. } => {
                body["message"] = json!(PROGRESSIVE_HINT);
                body["available_progressive_resolutions"] = json!(available);
            }
            ServiceError::RecognitionUpstream { code, message } => {
                body["acrCode"] = json!(code);
                body["acrMessage"] = json!(message);
            }
            ServiceError::Upstream { status: Some(upstream), .. } => {
                body["upstreamStatus"] = json!(upstream);
            }
            _ => {}
        }

        (status, Json(body)).into_response()
    }
}

/// Body shared by every POST endpoint
#[derive(Debug, Deserialize)]
pub struct UrlRequest {
    pub url: Option<String>,
}

/// Pull the URL out of a JSON body, rejecting absent bodies and keys alike
pub fn require_url(body: Result<Json<UrlRequest>, JsonRejection>) -> Result<String, ServiceError> {
    match body {
        Ok(Json(UrlRequest { url: Some(url) })) => Ok(url),
        Ok(Json(UrlRequest { url: None })) => Err(missing_url()),
        Err(rejection) => {
            tracing::debug!("Rejected request body: {}", rejection.body_text());
            Err(missing_url())
        }
    }
}

fn missing_url() -> ServiceError {
    ServiceError::InvalidInput("Missing 'url' in request body".to_string())
}
