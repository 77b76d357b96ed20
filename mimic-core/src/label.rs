use std::fmt;

pub const NEUTRAL: &str = "neutral";

/// Emotion labels the analysis service can report as dominant.
pub const KNOWN_LABELS: [&str; 7] = ["angry", "disgust", "fear", "happy", "sad", "surprise", NEUTRAL];

/// A canonical (trimmed, lower-case) expression key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExpressionLabel(String);

impl ExpressionLabel {
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_lowercase())
    }

    pub fn neutral() -> Self {
        Self(NEUTRAL.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_neutral(&self) -> bool {
        self.0 == NEUTRAL
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Human-readable form used in the overlay, e.g. "happy" -> "Happy".
    pub fn display_name(&self) -> String {
        let mut chars = self.0.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

impl fmt::Display for ExpressionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ExpressionLabel {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}
