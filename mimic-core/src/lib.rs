//! Core of Mimic: tracks the subject's facial expression across a video
//! stream and pairs every frame with a reference image for that expression.
//!
//! Frames flow through [`ExpressionSession::process_frame`]: the
//! [`ExpressionTracker`] decides whether the frame is due for
//! classification, the [`ExpressionCatalog`] and [`ImageCache`] resolve
//! the current expression to a decoded image, and the [`FrameCompositor`]
//! lays the two side by side.

pub mod analyzer;
pub mod cache;
pub mod catalog;
pub mod classifier;
pub mod compositor;
pub mod config;
pub mod error;
pub mod label;
pub mod session;
pub mod snapshot;
pub mod tracker;
pub mod worker;

pub use analyzer::HttpEmotionAnalyzer;
pub use cache::{DirectoryImageSource, ImageCache, ImageSource};
pub use catalog::ExpressionCatalog;
pub use classifier::{ClassifierAdapter, EmotionAnalyzer, ExpressionClassifier};
pub use compositor::{FrameCompositor, OverlayLayout};
pub use config::MimicConfig;
pub use error::{CatalogError, ClassificationError, ConfigError, ImageLoadError};
pub use label::ExpressionLabel;
pub use session::{run, Classification, DisplaySink, ExpressionSession, FrameSource, SessionSummary};
pub use snapshot::SnapshotWriter;
pub use tracker::{ExpressionTracker, Transition};
pub use worker::BackgroundClassifier;
