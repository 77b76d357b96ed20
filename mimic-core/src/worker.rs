use async_channel::{Receiver, Sender, TryRecvError, TrySendError};
use log::{debug, warn};
use opencv::core::Mat;
use opencv::prelude::*;
use std::thread::{self, JoinHandle};

use crate::classifier::ExpressionClassifier;
use crate::label::ExpressionLabel;

/// Runs classification on a dedicated thread so capture never stalls.
///
/// At most one frame is being classified at any time. Results are handed
/// back in completion order and the caller applies them as they arrive.
pub struct BackgroundClassifier {
    frames: Sender<Mat>,
    results: Receiver<Option<ExpressionLabel>>,
    in_flight: bool,
    handle: Option<JoinHandle<()>>,
}

impl BackgroundClassifier {
    pub fn spawn<C>(mut classifier: C) -> std::io::Result<Self>
    where
        C: ExpressionClassifier + Send + 'static,
    {
        let (frame_tx, frame_rx) = async_channel::bounded::<Mat>(1);
        let (result_tx, result_rx) = async_channel::unbounded();

        let handle = thread::Builder::new()
            .name("mimic-classifier".to_string())
            .spawn(move || {
                while let Ok(frame) = frame_rx.recv_blocking() {
                    let result = classifier.classify(&frame);
                    if result_tx.send_blocking(result).is_err() {
                        break;
                    }
                }
                debug!("Classifier worker stopped");
            })?;

        Ok(Self {
            frames: frame_tx,
            results: result_rx,
            in_flight: false,
            handle: Some(handle),
        })
    }

    /// Hands `frame` to the worker. Returns false, dropping the request,
    /// when a classification is already running.
    pub fn submit(&mut self, frame: &Mat) -> bool {
        if self.in_flight {
            debug!("Classification still in flight, skipping cadence frame");
            return false;
        }

        let frame = match frame.try_clone() {
            Ok(f) => f,
            Err(e) => {
                warn!("Could not copy frame for classification: {}", e);
                return false;
            }
        };

        match self.frames.try_send(frame) {
            Ok(()) => {
                self.in_flight = true;
                true
            }
            Err(TrySendError::Full(_)) => false,
            Err(TrySendError::Closed(_)) => {
                warn!("Classifier worker is gone, frame dropped");
                false
            }
        }
    }

    /// A finished classification, if one has arrived since the last poll.
    pub fn poll(&mut self) -> Option<Option<ExpressionLabel>> {
        match self.results.try_recv() {
            Ok(result) => {
                self.in_flight = false;
                Some(result)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => {
                self.in_flight = false;
                None
            }
        }
    }

    /// Blocks until the in-flight classification finishes.
    pub fn wait(&mut self) -> Option<Option<ExpressionLabel>> {
        if !self.in_flight {
            return None;
        }
        self.in_flight = false;
        self.results.recv_blocking().ok()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }
}

impl Drop for BackgroundClassifier {
    fn drop(&mut self) {
        self.frames.close();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Classifier worker panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counting {
        calls: Arc<AtomicUsize>,
        answer: Option<&'static str>,
    }

    impl ExpressionClassifier for Counting {
        fn classify(&mut self, _frame: &Mat) -> Option<ExpressionLabel> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer.map(ExpressionLabel::new)
        }
    }

    fn spawn(answer: Option<&'static str>) -> (BackgroundClassifier, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let worker = BackgroundClassifier::spawn(Counting {
            calls: Arc::clone(&calls),
            answer,
        })
        .unwrap();
        (worker, calls)
    }

    #[test]
    fn returns_classifications_from_the_worker() {
        let (mut worker, calls) = spawn(Some("happy"));
        assert!(worker.submit(&Mat::default()));
        assert_eq!(worker.wait(), Some(Some("happy".into())));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!worker.is_in_flight());
    }

    #[test]
    fn only_one_classification_in_flight() {
        let (mut worker, calls) = spawn(None);
        assert!(worker.submit(&Mat::default()));
        assert!(!worker.submit(&Mat::default()));
        assert!(!worker.submit(&Mat::default()));

        assert_eq!(worker.wait(), Some(None));
        assert!(worker.submit(&Mat::default()));
        assert_eq!(worker.wait(), Some(None));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn poll_without_work_is_empty() {
        let (mut worker, _) = spawn(Some("sad"));
        assert_eq!(worker.poll(), None);
        assert_eq!(worker.wait(), None);
    }

    #[test]
    fn drop_stops_the_worker() {
        let (mut worker, calls) = spawn(Some("sad"));
        worker.submit(&Mat::default());
        drop(worker);
        assert!(calls.load(Ordering::SeqCst) <= 1);
    }
}
