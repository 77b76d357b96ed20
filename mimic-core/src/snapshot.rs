use anyhow::{Context, Result};
use log::info;
use opencv::core::{Mat, Vector};
use opencv::imgcodecs;
use std::fs;
use std::path::{Path, PathBuf};

/// Writes composites to `<dir>/<prefix>_NNN.png` on request.
#[derive(Debug)]
pub struct SnapshotWriter {
    dir: PathBuf,
    prefix: String,
    next: Option<u32>,
}

impl SnapshotWriter {
    pub fn new(dir: impl Into<PathBuf>, prefix: &str) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.to_string(),
            next: None,
        }
    }

    pub fn save(&mut self, image: &Mat) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create output directory {:?}", self.dir))?;

        let index = match self.next {
            Some(n) => n,
            None => next_free_index(&self.dir, &self.prefix),
        };
        let path = self.dir.join(format!("{}_{:03}.png", self.prefix, index));

        let written = imgcodecs::imwrite(&path.to_string_lossy(), image, &Vector::new())
            .with_context(|| format!("Failed to encode snapshot {:?}", path))?;
        if !written {
            anyhow::bail!("Failed to write snapshot {:?}", path);
        }

        self.next = Some(index + 1);
        info!("Saved: {}", path.display());
        Ok(path)
    }
}

/// One past the highest `<prefix>_NNN.png` already in `dir`.
fn next_free_index(dir: &Path, prefix: &str) -> u32 {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };

    entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().to_string();
            name.strip_prefix(prefix)?
                .strip_prefix('_')?
                .strip_suffix(".png")?
                .parse::<u32>()
                .ok()
        })
        .max()
        .map_or(0, |n| n + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{Scalar, CV_8UC3};
    use tempfile::tempdir;

    fn image() -> Mat {
        Mat::new_rows_cols_with_default(4, 4, CV_8UC3, Scalar::all(50.0)).unwrap()
    }

    #[test]
    fn numbers_snapshots_sequentially() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("output");
        let mut writer = SnapshotWriter::new(&out, "expression");

        let first = writer.save(&image()).unwrap();
        let second = writer.save(&image()).unwrap();

        assert_eq!(first, out.join("expression_000.png"));
        assert_eq!(second, out.join("expression_001.png"));
        assert!(second.exists());
    }

    #[test]
    fn continues_after_existing_snapshots() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("expression_004.png"), b"").unwrap();
        fs::write(dir.path().join("expression_notes.png"), b"").unwrap();
        fs::write(dir.path().join("other_009.png"), b"").unwrap();

        let mut writer = SnapshotWriter::new(dir.path(), "expression");
        let path = writer.save(&image()).unwrap();
        assert_eq!(path, dir.path().join("expression_005.png"));
    }
}
