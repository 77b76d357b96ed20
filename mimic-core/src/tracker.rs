use log::{debug, info};
use opencv::core::Mat;

use crate::catalog::ExpressionCatalog;
use crate::classifier::ExpressionClassifier;
use crate::label::ExpressionLabel;

pub const DEFAULT_CADENCE: u64 = 10;

/// What a classification result did to the tracked expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Not a cadence frame; the classifier was not consulted.
    Skipped,
    /// Classification failed, the last known expression is kept.
    Retained,
    /// Classification confirmed the current expression.
    Unchanged,
    Changed {
        from: ExpressionLabel,
        to: ExpressionLabel,
    },
}

/// Holds the displayed expression and decides when to classify.
#[derive(Debug, Clone)]
pub struct ExpressionTracker {
    current: ExpressionLabel,
    frame_counter: u64,
    cadence: u64,
}

impl ExpressionTracker {
    /// A cadence of zero is treated as one (classify every frame).
    pub fn new(cadence: u64) -> Self {
        Self {
            current: ExpressionLabel::neutral(),
            frame_counter: 0,
            cadence: cadence.max(1),
        }
    }

    pub fn current(&self) -> &ExpressionLabel {
        &self.current
    }

    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    pub fn cadence(&self) -> u64 {
        self.cadence
    }

    /// Advances the frame counter and reports whether the frame just
    /// counted is due for classification. Frames 0, N, 2N, ... are due.
    pub fn tick(&mut self) -> bool {
        let due = self.frame_counter % self.cadence == 0;
        self.frame_counter = self.frame_counter.wrapping_add(1);
        due
    }

    /// Applies a classification result: a catalog label replaces the
    /// current one, an unknown label becomes neutral, `None` changes nothing.
    pub fn apply(&mut self, result: Option<ExpressionLabel>, catalog: &ExpressionCatalog) -> Transition {
        let Some(label) = result else {
            return Transition::Retained;
        };

        let next = if catalog.contains(&label) {
            label
        } else {
            debug!("Label '{}' is not in the catalog, using neutral", label);
            ExpressionLabel::neutral()
        };

        if next == self.current {
            return Transition::Unchanged;
        }

        info!("Expression changed: {} -> {}", self.current, next);
        let from = std::mem::replace(&mut self.current, next.clone());
        Transition::Changed { from, to: next }
    }

    /// One frame of the synchronous pipeline: tick, and on a cadence frame
    /// classify inline and apply the result.
    pub fn observe(
        &mut self,
        frame: &Mat,
        classifier: &mut dyn ExpressionClassifier,
        catalog: &ExpressionCatalog,
    ) -> Transition {
        if !self.tick() {
            return Transition::Skipped;
        }
        let result = classifier.classify(frame);
        self.apply(result, catalog)
    }
}

impl Default for ExpressionTracker {
    fn default() -> Self {
        Self::new(DEFAULT_CADENCE)
    }
}
