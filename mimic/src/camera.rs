use anyhow::{Context, Result};
use log::{debug, info, warn};
use opencv::core::Mat;
use opencv::prelude::*;
use opencv::videoio::{self, VideoCapture, CAP_ANY};

use mimic_core::FrameSource;

#[derive(Debug, Clone)]
pub enum VideoSource {
    Camera(i32),
    File(String),
}

pub struct Camera {
    cap: VideoCapture,
    frames_read: u64,
}

impl Camera {
    pub fn open(source: &VideoSource, width: u32, height: u32) -> Result<Self> {
        let mut cap = match source {
            VideoSource::Camera(index) => {
                info!("Opening camera {}", index);
                VideoCapture::new(*index, CAP_ANY)
                    .with_context(|| format!("Failed to open camera {}", index))?
            }
            VideoSource::File(path) => {
                info!("Opening video file {}", path);
                VideoCapture::from_file(path, CAP_ANY)
                    .with_context(|| format!("Failed to open video file {}", path))?
            }
        };

        if !cap.is_opened().unwrap_or(false) {
            anyhow::bail!("Video source {:?} could not be opened", source);
        }

        if let VideoSource::Camera(_) = source {
            cap.set(videoio::CAP_PROP_FRAME_WIDTH, width as f64).ok();
            cap.set(videoio::CAP_PROP_FRAME_HEIGHT, height as f64).ok();
        }

        let actual_width = cap.get(videoio::CAP_PROP_FRAME_WIDTH).unwrap_or(0.0);
        let actual_height = cap.get(videoio::CAP_PROP_FRAME_HEIGHT).unwrap_or(0.0);
        info!("Capturing at {}x{}", actual_width, actual_height);

        Ok(Self { cap, frames_read: 0 })
    }
}

impl FrameSource for Camera {
    fn read_frame(&mut self) -> Option<Mat> {
        let mut frame = Mat::default();
        match self.cap.read(&mut frame) {
            Ok(true) if !frame.empty() => {
                self.frames_read += 1;
                Some(frame)
            }
            Ok(_) => {
                debug!("End of stream after {} frame(s)", self.frames_read);
                None
            }
            Err(e) => {
                warn!("Failed to read frame: {}", e);
                None
            }
        }
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        let _ = self.cap.release();
    }
}
