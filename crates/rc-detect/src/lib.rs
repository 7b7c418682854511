//! Remote object-detection client.
//!
//! Sends frames to a pretrained detector served over HTTP and returns its raw
//! candidates. The operating point travels with each request so the server
//! can prefilter, but the classifier adapter in `rc-core` re-applies it on
//! the response regardless.
//!
//! Wire format:
//! - request: `POST <endpoint>?conf=<f32>&iou=<f32>`, body = PNG frame
//! - response: `{"detections":[{"class_id":3,"confidence":0.91,"bbox":[x1,y1,x2,y2]}]}`
//! - error: `{"error":{"message":"..."}}` with a non-2xx status

use std::fmt;
use std::io::Cursor;
use std::time::Duration;

use rc_core::{Candidate, Detector, Frame, Thresholds};
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use thiserror::Error;

/// Default request timeout for detection calls.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Detection client errors.
#[derive(Debug, Error)]
pub enum DetectError {
    /// The endpoint URL was empty or malformed.
    #[error("invalid detector endpoint: {reason}")]
    InvalidEndpoint { reason: String },
    /// Failed to build HTTP client.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    /// Failed to start the runtime that drives requests.
    #[error("failed to start detector runtime: {0}")]
    Runtime(#[source] std::io::Error),
    /// Failed to encode the frame for upload.
    #[error("failed to encode frame: {0}")]
    Encode(#[from] image::ImageError),
    /// HTTP request failed.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// Detector returned an error response.
    #[error("detector error: {message}")]
    Api { message: String },
    /// Failed to parse response.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Blocking client for a remote detector.
///
/// Owns a current-thread runtime so the capture loop stays synchronous.
pub struct HttpDetector {
    http: reqwest::Client,
    endpoint: reqwest::Url,
    runtime: tokio::runtime::Runtime,
}

impl fmt::Debug for HttpDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpDetector")
            .field("endpoint", &self.endpoint.as_str())
            .finish_non_exhaustive()
    }
}

impl HttpDetector {
    /// Creates a client for the given endpoint URL.
    pub fn new(endpoint: &str) -> Result<Self, DetectError> {
        let endpoint = parse_endpoint(endpoint)?;

        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(DetectError::ClientBuild)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(DetectError::Runtime)?;

        Ok(Self {
            http,
            endpoint,
            runtime,
        })
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    async fn request(
        &self,
        png: Vec<u8>,
        thresholds: &Thresholds,
    ) -> Result<Vec<Candidate>, DetectError> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .query(&[("conf", thresholds.confidence()), ("iou", thresholds.iou())])
            .header(CONTENT_TYPE, "image/png")
            .body(png)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(parse_api_error(&body).unwrap_or_else(|| DetectError::Api {
                message: format!("status {status}: {body}"),
            }));
        }
        parse_detections(&body)
    }
}

impl Detector for HttpDetector {
    type Error = DetectError;

    fn detect(
        &mut self,
        frame: &Frame,
        thresholds: &Thresholds,
    ) -> Result<Vec<Candidate>, DetectError> {
        let png = encode_png(frame)?;
        let candidates = self.runtime.block_on(self.request(png, thresholds))?;
        tracing::trace!(candidates = candidates.len(), "detector responded");
        Ok(candidates)
    }
}

fn parse_endpoint(endpoint: &str) -> Result<reqwest::Url, DetectError> {
    let trimmed = endpoint.trim();
    if trimmed.is_empty() {
        return Err(DetectError::InvalidEndpoint {
            reason: "endpoint cannot be empty".to_string(),
        });
    }
    let url = reqwest::Url::parse(trimmed).map_err(|err| DetectError::InvalidEndpoint {
        reason: err.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(DetectError::InvalidEndpoint {
            reason: format!("unsupported scheme: {}", url.scheme()),
        });
    }
    Ok(url)
}

fn encode_png(frame: &Frame) -> Result<Vec<u8>, DetectError> {
    let mut buf = Cursor::new(Vec::new());
    frame.write_to(&mut buf, image::ImageFormat::Png)?;
    Ok(buf.into_inner())
}

fn parse_detections(body: &str) -> Result<Vec<Candidate>, DetectError> {
    #[derive(Deserialize)]
    struct Payload {
        #[serde(default)]
        detections: Vec<Candidate>,
    }

    let payload: Payload =
        serde_json::from_str(body).map_err(|err| DetectError::InvalidResponse(err.to_string()))?;
    Ok(payload.detections)
}

fn parse_api_error(body: &str) -> Option<DetectError> {
    #[derive(Deserialize)]
    struct ErrorPayload {
        error: ErrorDetails,
    }

    #[derive(Deserialize)]
    struct ErrorDetails {
        message: String,
    }

    serde_json::from_str::<ErrorPayload>(body)
        .ok()
        .map(|payload| DetectError::Api {
            message: payload.error.message,
        })
}
