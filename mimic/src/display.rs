use anyhow::{Context, Result};
use opencv::core::Mat;
use opencv::highgui;

use mimic_core::DisplaySink;

pub struct Window {
    title: String,
}

impl Window {
    pub fn open(title: &str) -> Result<Self> {
        highgui::named_window(title, highgui::WINDOW_AUTOSIZE)
            .with_context(|| format!("Failed to open window '{}'", title))?;
        Ok(Self {
            title: title.to_string(),
        })
    }
}

impl DisplaySink for Window {
    fn show(&mut self, image: &Mat) -> Result<()> {
        highgui::imshow(&self.title, image).context("Failed to show frame")
    }

    fn poll_key(&mut self) -> Result<Option<i32>> {
        let key = highgui::wait_key(1).context("Failed to poll keyboard")?;
        Ok((key >= 0).then_some(key))
    }
}

impl Drop for Window {
    fn drop(&mut self) {
        let _ = highgui::destroy_all_windows();
    }
}
