//! The frame-driven loop tying tracker, catalog, cache and compositor
//! together.

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use opencv::core::Mat;
use opencv::prelude::*;

use crate::analyzer::HttpEmotionAnalyzer;
use crate::cache::{DirectoryImageSource, ImageCache, ImageSource};
use crate::catalog::ExpressionCatalog;
use crate::classifier::{ClassifierAdapter, ExpressionClassifier};
use crate::compositor::FrameCompositor;
use crate::config::MimicConfig;
use crate::label::ExpressionLabel;
use crate::snapshot::SnapshotWriter;
use crate::tracker::{ExpressionTracker, Transition};
use crate::worker::BackgroundClassifier;

const KEY_ESCAPE: i32 = 27;

/// Capture device. `None` means the stream has ended.
pub trait FrameSource {
    fn read_frame(&mut self) -> Option<Mat>;
}

/// Window the composite is shown in.
pub trait DisplaySink {
    fn show(&mut self, image: &Mat) -> Result<()>;
    fn poll_key(&mut self) -> Result<Option<i32>>;
}

/// How cadence frames reach the classifier.
pub enum Classification {
    /// Classified on the capture thread, blocking that frame.
    Inline(Box<dyn ExpressionClassifier>),
    /// Classified on a worker thread, applied when the result arrives.
    Background(BackgroundClassifier),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub frames: u64,
    pub classifications: u64,
    pub changes: u64,
    pub snapshots: u64,
}

pub struct ExpressionSession<S = DirectoryImageSource> {
    catalog: ExpressionCatalog,
    cache: ImageCache<S>,
    tracker: ExpressionTracker,
    compositor: FrameCompositor,
    classification: Classification,
    last_composite: Option<Mat>,
    summary: SessionSummary,
}

impl ExpressionSession<DirectoryImageSource> {
    /// Loads the catalog and wires up the HTTP classifier described by
    /// `config`. Catalog failures are returned and should end the program.
    pub fn from_config(config: &MimicConfig) -> Result<Self> {
        let catalog_config = &config.catalog;
        let loaded = if catalog_config.bootstrap {
            ExpressionCatalog::load_or_bootstrap(&catalog_config.mapping_file, &catalog_config.image_dir)
        } else {
            ExpressionCatalog::load(&catalog_config.mapping_file)
        };
        let catalog = loaded.context("Failed to load expression catalog")?;

        let analyzer = HttpEmotionAnalyzer::new(&config.classifier.endpoint, config.classifier_timeout());
        let adapter = ClassifierAdapter::new(analyzer, &config.classifier.detector_backend);

        let classification = if config.classifier.background {
            info!("Classifying in the background");
            Classification::Background(
                BackgroundClassifier::spawn(adapter).context("Failed to start classifier worker")?,
            )
        } else {
            Classification::Inline(Box::new(adapter))
        };

        info!("Classifying every {} frame(s)", config.classifier.cadence);
        Ok(Self::new(
            catalog,
            ImageCache::new(DirectoryImageSource::new(&catalog_config.image_dir)),
            ExpressionTracker::new(config.classifier.cadence),
            config.compositor(),
            classification,
        ))
    }
}

impl<S: ImageSource> ExpressionSession<S> {
    pub fn new(
        catalog: ExpressionCatalog,
        cache: ImageCache<S>,
        tracker: ExpressionTracker,
        compositor: FrameCompositor,
        classification: Classification,
    ) -> Self {
        Self {
            catalog,
            cache,
            tracker,
            compositor,
            classification,
            last_composite: None,
            summary: SessionSummary::default(),
        }
    }

    pub fn current_expression(&self) -> &ExpressionLabel {
        self.tracker.current()
    }

    pub fn catalog(&self) -> &ExpressionCatalog {
        &self.catalog
    }

    pub fn cache(&self) -> &ImageCache<S> {
        &self.cache
    }

    pub fn summary(&self) -> SessionSummary {
        self.summary
    }

    pub fn last_composite(&self) -> Option<&Mat> {
        self.last_composite.as_ref()
    }

    /// Runs one frame through the pipeline and returns the buffer to show.
    /// A frame that fails to composite leaves the previous composite up.
    pub fn process_frame(&mut self, frame: &Mat) -> &Mat {
        self.summary.frames += 1;

        let transition = self.advance(frame);
        if let Transition::Changed { .. } = transition {
            self.summary.changes += 1;
        }

        let label = self.tracker.current();
        let reference = match self.catalog.resolve_first_image(label) {
            Some(identifier) => self.cache.get(identifier),
            None => None,
        };

        match self.compositor.compose(frame, reference, label) {
            Ok(composite) => self.last_composite = Some(composite),
            Err(e) => {
                warn!("Failed to compose frame: {}", e);
                if self.last_composite.is_none() {
                    self.last_composite = frame.try_clone().ok();
                }
            }
        }

        self.last_composite.get_or_insert_with(Mat::default)
    }

    fn advance(&mut self, frame: &Mat) -> Transition {
        match &mut self.classification {
            Classification::Inline(classifier) => {
                let transition = self.tracker.observe(frame, classifier.as_mut(), &self.catalog);
                if transition != Transition::Skipped {
                    self.summary.classifications += 1;
                }
                transition
            }
            Classification::Background(worker) => {
                let transition = match worker.poll() {
                    Some(result) => self.tracker.apply(result, &self.catalog),
                    None => Transition::Skipped,
                };
                if self.tracker.tick() && worker.submit(frame) {
                    self.summary.classifications += 1;
                }
                transition
            }
        }
    }
}

/// Reads, processes and shows frames until the stream ends or the user
/// quits with `q`/Esc. `s` saves the current composite.
pub fn run<F, D, S>(
    source: &mut F,
    display: &mut D,
    session: &mut ExpressionSession<S>,
    snapshots: &mut SnapshotWriter,
) -> Result<SessionSummary>
where
    F: FrameSource,
    D: DisplaySink,
    S: ImageSource,
{
    info!("Expression matcher started, press 's' to save, 'q' to quit");

    while let Some(frame) = source.read_frame() {
        let composite = session.process_frame(&frame);
        display.show(composite)?;

        match display.poll_key()?.map(|k| k & 0xFF) {
            Some(k) if k == i32::from(b'q') || k == KEY_ESCAPE => {
                debug!("Quit requested");
                break;
            }
            Some(k) if k == i32::from(b's') => {
                if let Some(composite) = session.last_composite() {
                    match snapshots.save(composite) {
                        Ok(_) => session.summary.snapshots += 1,
                        Err(e) => error!("{:#}", e),
                    }
                }
            }
            _ => {}
        }
    }

    let summary = session.summary();
    info!(
        "Session ended after {} frame(s): {} classification(s), {} expression change(s), {} snapshot(s)",
        summary.frames, summary.classifications, summary.changes, summary.snapshots
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ImageLoadError;
    use opencv::core::{Scalar, CV_8UC3};
    use opencv::prelude::*;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::thread;
    use std::time::Duration;
    use tempfile::tempdir;

    struct SolidImages;

    impl ImageSource for SolidImages {
        fn load(&self, identifier: &str) -> Result<Mat, ImageLoadError> {
            Ok(Mat::new_rows_cols_with_default(
                identifier.len() as i32 * 10,
                20,
                CV_8UC3,
                Scalar::all(1.0),
            )?)
        }
    }

    struct Frames(u32);

    impl FrameSource for Frames {
        fn read_frame(&mut self) -> Option<Mat> {
            if self.0 == 0 {
                return None;
            }
            self.0 -= 1;
            Mat::new_rows_cols_with_default(40, 60, CV_8UC3, Scalar::all(0.0)).ok()
        }
    }

    struct ScriptedDisplay {
        keys: VecDeque<Option<i32>>,
        shown: usize,
    }

    impl DisplaySink for ScriptedDisplay {
        fn show(&mut self, image: &Mat) -> Result<()> {
            assert!(!image.empty());
            self.shown += 1;
            Ok(())
        }

        fn poll_key(&mut self) -> Result<Option<i32>> {
            Ok(self.keys.pop_front().flatten())
        }
    }

    struct Always(&'static str);

    impl ExpressionClassifier for Always {
        fn classify(&mut self, _frame: &Mat) -> Option<ExpressionLabel> {
            Some(ExpressionLabel::new(self.0))
        }
    }

    fn session(answer: &'static str) -> ExpressionSession<SolidImages> {
        let catalog = ExpressionCatalog::from_value(json!({"neutral": ["n.png"], "happy": ["happy.png"]})).unwrap();
        ExpressionSession::new(
            catalog,
            ImageCache::new(SolidImages),
            ExpressionTracker::new(10),
            FrameCompositor::default(),
            Classification::Inline(Box::new(Always(answer))),
        )
    }

    #[test]
    fn processed_frames_use_resolved_reference() {
        let mut session = session("happy");
        let frame = Mat::new_rows_cols_with_default(40, 60, CV_8UC3, Scalar::all(0.0)).unwrap();

        let composite = session.process_frame(&frame);
        // happy.png is 90x20 -> scaled to height 40 gives width 9.
        assert_eq!(composite.cols(), 60 + 9);
        assert_eq!(session.current_expression().as_str(), "happy");
        assert_eq!(session.summary().classifications, 1);
        assert_eq!(session.summary().changes, 1);
    }

    #[test]
    fn composition_failure_keeps_last_good_composite() {
        let mut session = session("happy");
        let frame = Mat::new_rows_cols_with_default(40, 60, CV_8UC3, Scalar::all(0.0)).unwrap();
        let good_cols = session.process_frame(&frame).cols();

        let shown = session.process_frame(&Mat::default());
        assert_eq!(shown.cols(), good_cols);
    }

    #[test]
    fn run_stops_at_end_of_stream() {
        let mut session = session("happy");
        let dir = tempdir().unwrap();
        let mut snapshots = SnapshotWriter::new(dir.path(), "expression");
        let mut display = ScriptedDisplay { keys: VecDeque::new(), shown: 0 };

        let summary = run(&mut Frames(25), &mut display, &mut session, &mut snapshots).unwrap();
        assert_eq!(summary.frames, 25);
        assert_eq!(summary.classifications, 3);
        assert_eq!(display.shown, 25);
    }

    #[test]
    fn keys_save_and_quit() {
        let mut session = session("neutral");
        let dir = tempdir().unwrap();
        let mut snapshots = SnapshotWriter::new(dir.path(), "expression");
        let mut display = ScriptedDisplay {
            keys: VecDeque::from(vec![None, Some(i32::from(b's')), None, Some(0x100 | i32::from(b'q'))]),
            shown: 0,
        };

        let summary = run(&mut Frames(100), &mut display, &mut session, &mut snapshots).unwrap();
        assert_eq!(summary.frames, 4);
        assert_eq!(summary.snapshots, 1);
        assert!(PathBuf::from(dir.path()).join("expression_000.png").exists());
    }

    /// Answers only when the test releases a label through the gate.
    struct Gated {
        gate: async_channel::Receiver<&'static str>,
    }

    impl ExpressionClassifier for Gated {
        fn classify(&mut self, _frame: &Mat) -> Option<ExpressionLabel> {
            self.gate.recv_blocking().ok().map(ExpressionLabel::new)
        }
    }

    fn process_until<S: ImageSource>(
        session: &mut ExpressionSession<S>,
        frame: &Mat,
        expected: &str,
    ) -> i32 {
        for _ in 0..500 {
            let cols = session.process_frame(frame).cols();
            if session.current_expression().as_str() == expected {
                return cols;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("expression never became '{}'", expected);
    }

    #[test]
    fn background_results_are_applied_on_later_frames() {
        let catalog = ExpressionCatalog::from_value(json!({"neutral": ["n.png"], "happy": ["happy.png"]})).unwrap();
        let (release, gate) = async_channel::unbounded();
        let worker = BackgroundClassifier::spawn(Gated { gate }).unwrap();
        let mut session = ExpressionSession::new(
            catalog,
            ImageCache::new(SolidImages),
            ExpressionTracker::new(1),
            FrameCompositor::default(),
            Classification::Background(worker),
        );
        // Rebound so it drops before the session if an assertion fails.
        let release = release;
        let frame = Mat::new_rows_cols_with_default(40, 60, CV_8UC3, Scalar::all(0.0)).unwrap();

        // Every frame is a cadence frame; only the first reaches the worker
        // while it is still blocked.
        for _ in 0..3 {
            // n.png is 50x20, scaled to height 40 gives width 16.
            assert_eq!(session.process_frame(&frame).cols(), 60 + 16);
        }
        assert!(session.current_expression().is_neutral());
        assert_eq!(session.summary().frames, 3);
        assert_eq!(session.summary().classifications, 1);

        release.send_blocking("happy").unwrap();
        assert_eq!(process_until(&mut session, &frame, "happy"), 60 + 9);
        assert_eq!(session.summary().changes, 1);
        // The frame that picked up the result submitted the next one.
        assert_eq!(session.summary().classifications, 2);

        release.send_blocking("surprised").unwrap();
        process_until(&mut session, &frame, "neutral");
        assert_eq!(session.summary().changes, 2);
        assert_eq!(session.summary().classifications, 3);

        // Unblock the pending request so the worker can shut down.
        release.close();
    }
}
