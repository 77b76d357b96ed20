use log::debug;
use opencv::core::Mat;
use serde::Serialize;
use serde_json::Value;

use crate::error::ClassificationError;
use crate::label::ExpressionLabel;

/// Parameters sent with every analysis call.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeRequest {
    pub actions: Vec<String>,
    pub enforce_detection: bool,
    pub detector_backend: String,
}

impl AnalyzeRequest {
    /// Emotion analysis only, and a frame without a detectable face is
    /// analysed as a whole instead of failing the call.
    pub fn emotion_only(detector_backend: &str) -> Self {
        Self {
            actions: vec!["emotion".to_string()],
            enforce_detection: false,
            detector_backend: detector_backend.to_string(),
        }
    }
}

/// The external emotion analysis capability, returning its raw result.
pub trait EmotionAnalyzer {
    fn analyze(&self, frame: &Mat, request: &AnalyzeRequest) -> Result<Value, ClassificationError>;
}

/// Narrow seam the tracker depends on. `None` means "no new classification".
pub trait ExpressionClassifier {
    fn classify(&mut self, frame: &Mat) -> Option<ExpressionLabel>;
}

/// Turns an [`EmotionAnalyzer`] into an [`ExpressionClassifier`], absorbing
/// every failure.
pub struct ClassifierAdapter<A> {
    analyzer: A,
    request: AnalyzeRequest,
}

impl<A: EmotionAnalyzer> ClassifierAdapter<A> {
    pub fn new(analyzer: A, detector_backend: &str) -> Self {
        Self {
            analyzer,
            request: AnalyzeRequest::emotion_only(detector_backend),
        }
    }

    pub fn analyzer(&self) -> &A {
        &self.analyzer
    }
}

impl<A: EmotionAnalyzer> ExpressionClassifier for ClassifierAdapter<A> {
    fn classify(&mut self, frame: &Mat) -> Option<ExpressionLabel> {
        match self.analyzer.analyze(frame, &self.request) {
            Ok(result) => {
                let label = dominant_emotion(&result);
                if label.is_none() {
                    debug!("Analysis result has no dominant emotion: {}", result);
                }
                label
            }
            Err(e) => {
                debug!("Expression analysis failed: {}", e);
                None
            }
        }
    }
}

/// Extracts the dominant emotion from an analysis result, which may be a
/// single face object, a list of face objects, or an object wrapping that
/// list under `results`. Only the first face is considered.
pub fn dominant_emotion(result: &Value) -> Option<ExpressionLabel> {
    let face = match result {
        Value::Array(faces) => faces.first()?,
        Value::Object(map) => match map.get("results") {
            Some(Value::Array(faces)) => faces.first()?,
            _ => result,
        },
        _ => return None,
    };

    let label = ExpressionLabel::new(face.get("dominant_emotion")?.as_str()?);
    (!label.is_empty()).then_some(label)
}
