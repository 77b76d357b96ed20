use std::path::PathBuf;
use thiserror::Error;

/// The expression catalog could not be loaded. Fatal at startup.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("catalog {path:?} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("catalog must be an object mapping labels to arrays of file names")]
    NotAMapping,

    #[error("catalog entry '{label}' must be an array of non-empty strings")]
    InvalidEntry { label: String },

    #[error("catalog label '{label}' appears more than once (labels are case-insensitive)")]
    DuplicateLabel { label: String },
}

/// A referenced image could not be produced. Recovered locally by the cache.
#[derive(Debug, Error)]
pub enum ImageLoadError {
    #[error("image {0:?} does not exist")]
    NotFound(PathBuf),

    #[error("image {0:?} could not be decoded")]
    Undecodable(PathBuf),

    #[error("image identifier '{0}' escapes the image directory")]
    OutsideBaseDir(String),

    #[error("opencv error while decoding image: {0}")]
    OpenCv(#[from] opencv::Error),
}

/// The external classifier failed or answered with something unusable.
/// Never fatal; the tracker keeps the previous expression.
#[derive(Debug, Error)]
pub enum ClassificationError {
    #[error("failed to encode frame for analysis: {0}")]
    Encode(#[from] opencv::Error),

    #[error("analysis request failed: {0}")]
    Request(#[source] Box<ureq::Error>),

    #[error("analysis response could not be read: {0}")]
    Response(#[source] std::io::Error),

    #[error("classifier worker is gone")]
    WorkerGone,
}

impl From<ureq::Error> for ClassificationError {
    fn from(e: ureq::Error) -> Self {
        ClassificationError::Request(Box::new(e))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config {path:?} is not valid: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
