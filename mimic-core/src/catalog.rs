//! Expression label to reference image mapping.
//!
//! The catalog is a JSON object such as
//! `{"neutral": ["n.png"], "happy": ["h.png", "h2.png"]}`. Only the first
//! file of each list is ever displayed. Key order from the document is kept
//! so the last-resort fallback scan is deterministic.

use log::{debug, info, warn};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

use crate::error::CatalogError;
use crate::label::{ExpressionLabel, KNOWN_LABELS};

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

#[derive(Debug, Clone, Default)]
pub struct ExpressionCatalog {
    entries: Vec<(ExpressionLabel, Vec<String>)>,
}

impl ExpressionCatalog {
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let content = fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let value: Value = serde_json::from_str(&content).map_err(|source| CatalogError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let catalog = Self::from_value(value)?;
        info!("Loaded expression catalog {:?} with {} label(s)", path, catalog.len());
        catalog.warn_if_degraded();
        Ok(catalog)
    }

    /// Loads `path`, or synthesises a catalog from `image_dir` and writes it
    /// to `path` when the mapping file does not exist yet.
    pub fn load_or_bootstrap(path: &Path, image_dir: &Path) -> Result<Self, CatalogError> {
        if path.exists() {
            return Self::load(path);
        }

        info!("No catalog at {:?}, building one from {:?}", path, image_dir);
        let catalog = Self::bootstrap(image_dir);

        let written = serde_json::to_string_pretty(&catalog.to_value())
            .map_err(std::io::Error::other)
            .and_then(|content| fs::write(path, content));
        match written {
            Ok(()) => info!("Wrote default catalog to {:?}", path),
            Err(e) => warn!("Could not write default catalog to {:?}: {}", path, e),
        }

        catalog.warn_if_degraded();
        Ok(catalog)
    }

    /// Every known label mapped to nothing, except "neutral" which receives
    /// all images found in `image_dir`.
    pub fn bootstrap(image_dir: &Path) -> Self {
        let images = list_images(image_dir);
        debug!("Found {} image(s) for the default catalog", images.len());

        let entries = KNOWN_LABELS
            .iter()
            .map(|label| {
                let label = ExpressionLabel::new(label);
                let files = if label.is_neutral() { images.clone() } else { Vec::new() };
                (label, files)
            })
            .collect();

        Self { entries }
    }

    pub fn from_value(value: Value) -> Result<Self, CatalogError> {
        let Value::Object(map) = value else {
            return Err(CatalogError::NotAMapping);
        };

        let mut entries: Vec<(ExpressionLabel, Vec<String>)> = Vec::with_capacity(map.len());
        for (key, files) in map {
            let label = ExpressionLabel::new(&key);
            if label.is_empty() {
                return Err(CatalogError::InvalidEntry { label: key });
            }
            if entries.iter().any(|(existing, _)| *existing == label) {
                return Err(CatalogError::DuplicateLabel { label: label.to_string() });
            }

            let Value::Array(items) = files else {
                return Err(CatalogError::InvalidEntry { label: key });
            };
            let mut names = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(name) if !name.trim().is_empty() => names.push(name),
                    _ => return Err(CatalogError::InvalidEntry { label: key }),
                }
            }

            entries.push((label, names));
        }

        Ok(Self { entries })
    }

    pub fn to_value(&self) -> Value {
        let map: Map<String, Value> = self
            .entries
            .iter()
            .map(|(label, files)| {
                let files = files.iter().cloned().map(Value::String).collect();
                (label.to_string(), Value::Array(files))
            })
            .collect();
        Value::Object(map)
    }

    pub fn images(&self, label: &ExpressionLabel) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, files)| files.as_slice())
    }

    pub fn contains(&self, label: &ExpressionLabel) -> bool {
        self.images(label).is_some()
    }

    /// First image for `label`, else the first neutral image, else the
    /// first image of any entry in document order.
    pub fn resolve_first_image(&self, label: &ExpressionLabel) -> Option<&str> {
        let first = |l: &ExpressionLabel| {
            self.images(l)
                .and_then(|files| files.first())
                .map(String::as_str)
        };

        first(label)
            .or_else(|| first(&ExpressionLabel::neutral()))
            .or_else(|| {
                self.entries
                    .iter()
                    .find_map(|(_, files)| files.first().map(String::as_str))
            })
    }

    /// A catalog without a usable "neutral" entry has no guaranteed fallback.
    pub fn is_degraded(&self) -> bool {
        self.images(&ExpressionLabel::neutral())
            .map_or(true, |files| files.is_empty())
    }

    pub fn labels(&self) -> impl Iterator<Item = &ExpressionLabel> {
        self.entries.iter().map(|(label, _)| label)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn warn_if_degraded(&self) {
        if self.is_degraded() {
            warn!("Catalog has no usable 'neutral' entry; falling back to any available image");
        }
    }
}

/// Image file names (png/jpg/jpeg, any case) directly under `dir`, sorted.
pub fn list_images(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut names: Vec<String> = entries
        .flatten()
        .filter(|entry| entry.path().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .map_or(false, |e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        })
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}
