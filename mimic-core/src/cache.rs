use log::{debug, warn};
use opencv::core::Mat;
use opencv::imgcodecs;
use opencv::prelude::*;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use crate::error::ImageLoadError;

/// Somewhere reference images can be decoded from.
pub trait ImageSource {
    fn load(&self, identifier: &str) -> Result<Mat, ImageLoadError>;
}

/// Decodes images from files under a fixed base directory.
#[derive(Debug, Clone)]
pub struct DirectoryImageSource {
    base_dir: PathBuf,
}

impl DirectoryImageSource {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into() }
    }

    fn resolve(&self, identifier: &str) -> Result<PathBuf, ImageLoadError> {
        let relative = Path::new(identifier);
        let confined = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !confined {
            return Err(ImageLoadError::OutsideBaseDir(identifier.to_string()));
        }
        Ok(self.base_dir.join(relative))
    }
}

impl ImageSource for DirectoryImageSource {
    fn load(&self, identifier: &str) -> Result<Mat, ImageLoadError> {
        let path = self.resolve(identifier)?;
        if !path.is_file() {
            return Err(ImageLoadError::NotFound(path));
        }

        let image = imgcodecs::imread(&path.to_string_lossy(), imgcodecs::IMREAD_COLOR)?;
        if image.empty() {
            return Err(ImageLoadError::Undecodable(path));
        }
        Ok(image)
    }
}

/// Memoises decoded reference images for the lifetime of a session.
///
/// Each identifier hits storage at most once. Failures are remembered too,
/// so a permanently missing file is not retried every frame.
pub struct ImageCache<S = DirectoryImageSource> {
    source: S,
    entries: HashMap<String, Option<Mat>>,
}

impl<S: ImageSource> ImageCache<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            entries: HashMap::new(),
        }
    }

    pub fn get(&mut self, identifier: &str) -> Option<&Mat> {
        if !self.entries.contains_key(identifier) {
            let loaded = match self.source.load(identifier) {
                Ok(image) => {
                    debug!("Cached image '{}' ({}x{})", identifier, image.cols(), image.rows());
                    Some(image)
                }
                Err(e) => {
                    warn!("Failed to load image '{}': {}", identifier, e);
                    None
                }
            };
            self.entries.insert(identifier.to_string(), loaded);
        }

        self.entries.get(identifier).and_then(Option::as_ref)
    }

    /// Number of identifiers resolved so far, successful or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn failed(&self) -> usize {
        self.entries.values().filter(|e| e.is_none()).count()
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}
