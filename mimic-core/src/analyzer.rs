//! HTTP client for a DeepFace-compatible `/analyze` endpoint.

use base64::{engine::general_purpose, Engine as _};
use log::{debug, info};
use opencv::core::{Mat, Vector};
use opencv::imgcodecs;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

use crate::classifier::{AnalyzeRequest, EmotionAnalyzer};
use crate::error::ClassificationError;

const JPEG_QUALITY: i32 = 85;

pub struct HttpEmotionAnalyzer {
    agent: ureq::Agent,
    url: String,
}

impl HttpEmotionAnalyzer {
    pub fn new(endpoint: &str, timeout: Option<Duration>) -> Self {
        let mut builder = ureq::AgentBuilder::new();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let url = format!("{}/analyze", endpoint.trim_end_matches('/'));
        info!("Expression analysis via {} (timeout: {:?})", url, timeout);

        Self {
            agent: builder.build(),
            url,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl EmotionAnalyzer for HttpEmotionAnalyzer {
    fn analyze(&self, frame: &Mat, request: &AnalyzeRequest) -> Result<Value, ClassificationError> {
        let started = Instant::now();
        let body = request_body(&encode_frame(frame)?, request);

        let result: Value = self
            .agent
            .post(&self.url)
            .send_json(body)?
            .into_json()
            .map_err(ClassificationError::Response)?;

        debug!("Analysis answered in {:?}", started.elapsed());
        Ok(result)
    }
}

/// JPEG-encodes `frame` as a base64 data URI.
pub fn encode_frame(frame: &Mat) -> Result<String, ClassificationError> {
    let mut buf = Vector::<u8>::new();
    let params = Vector::<i32>::from_slice(&[imgcodecs::IMWRITE_JPEG_QUALITY, JPEG_QUALITY]);
    imgcodecs::imencode(".jpg", frame, &mut buf, &params)?;

    Ok(format!(
        "data:image/jpeg;base64,{}",
        general_purpose::STANDARD.encode(buf.to_vec())
    ))
}

fn request_body(image: &str, request: &AnalyzeRequest) -> Value {
    json!({
        "img": image,
        "actions": request.actions,
        "enforce_detection": request.enforce_detection,
        "detector_backend": request.detector_backend,
    })
}
