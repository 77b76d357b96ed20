//! Side-by-side composition of the live frame and the reference image.

use opencv::core::{self, Mat, Point, Scalar, Size};
use opencv::imgproc;
use opencv::prelude::*;
use serde::{Deserialize, Serialize};

use crate::label::ExpressionLabel;

const PLACEHOLDER_COLOR: f64 = 220.0;
const PLACEHOLDER_TEXT_COLOR: f64 = 100.0;
const PLACEHOLDER_TEXT: &str = "No image";
const SHADOW_OFFSET: i32 = 2;

/// Where the expression label is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayLayout {
    /// A black bar is appended below the images and the label sits in it.
    BottomBar,
    /// The label is drawn over the bottom-left of the live frame.
    Inline,
}

#[derive(Debug, Clone)]
pub struct FrameCompositor {
    pub layout: OverlayLayout,
    pub bar_height: i32,
    pub gap: i32,
    pub placeholder_width_ratio: f64,
    pub shadow: bool,
}

impl Default for FrameCompositor {
    fn default() -> Self {
        Self {
            layout: OverlayLayout::BottomBar,
            bar_height: 50,
            gap: 0,
            placeholder_width_ratio: 0.75,
            shadow: true,
        }
    }
}

impl FrameCompositor {
    /// Builds the display buffer: live frame, optional gap, then the
    /// reference image scaled to the live height (or a "No image" panel),
    /// with the expression label overlaid.
    pub fn compose(&self, live: &Mat, reference: Option<&Mat>, label: &ExpressionLabel) -> opencv::Result<Mat> {
        if live.empty() {
            return Err(opencv::Error::new(core::StsBadArg, "live frame is empty"));
        }

        let live_bgr = to_bgr(live)?;
        let live = live_bgr.as_ref().unwrap_or(live);
        let height = live.rows();

        let panel = match reference.filter(|r| !r.empty()) {
            Some(reference) => self.scale_to_height(reference, height)?,
            None => self.placeholder(height)?,
        };

        let mut row = Mat::default();
        if self.gap > 0 {
            let mut padded = Mat::default();
            core::copy_make_border(live, &mut padded, 0, 0, 0, self.gap, core::BORDER_CONSTANT, Scalar::all(0.0))?;
            core::hconcat2(&padded, &panel, &mut row)?;
        } else {
            core::hconcat2(live, &panel, &mut row)?;
        }

        let (mut output, anchor) = match self.layout {
            OverlayLayout::BottomBar => {
                let mut framed = Mat::default();
                core::copy_make_border(
                    &row,
                    &mut framed,
                    0,
                    self.bar_height,
                    0,
                    0,
                    core::BORDER_CONSTANT,
                    Scalar::all(0.0),
                )?;
                (framed, Point::new(20, height + self.bar_height * 7 / 10))
            }
            OverlayLayout::Inline => (row, Point::new(30, (height - 40).max(30))),
        };

        let text = format!("Expression: {}", label.display_name());
        self.draw_label(&mut output, &text, anchor)?;
        Ok(output)
    }

    /// Dimensions `compose` will produce for the given inputs.
    pub fn output_size(&self, live: Size, reference: Option<Size>) -> Size {
        let panel_width = match reference {
            Some(r) if r.width > 0 && r.height > 0 => scaled_width(r.width, r.height, live.height),
            _ => self.placeholder_width(live.height),
        };
        let bar = match self.layout {
            OverlayLayout::BottomBar => self.bar_height,
            OverlayLayout::Inline => 0,
        };
        Size::new(live.width + self.gap + panel_width, live.height + bar)
    }

    pub fn placeholder_width(&self, height: i32) -> i32 {
        ((height as f64 * self.placeholder_width_ratio).round() as i32).max(1)
    }

    fn scale_to_height(&self, reference: &Mat, height: i32) -> opencv::Result<Mat> {
        let reference_bgr = to_bgr(reference)?;
        let reference = reference_bgr.as_ref().unwrap_or(reference);

        let width = scaled_width(reference.cols(), reference.rows(), height);
        let interpolation = if height < reference.rows() {
            imgproc::INTER_AREA
        } else {
            imgproc::INTER_LINEAR
        };

        let mut scaled = Mat::default();
        imgproc::resize(reference, &mut scaled, Size::new(width, height), 0.0, 0.0, interpolation)?;
        Ok(scaled)
    }

    fn placeholder(&self, height: i32) -> opencv::Result<Mat> {
        let width = self.placeholder_width(height);
        let mut panel = Mat::new_rows_cols_with_default(height, width, core::CV_8UC3, Scalar::all(PLACEHOLDER_COLOR))?;
        imgproc::put_text(
            &mut panel,
            PLACEHOLDER_TEXT,
            Point::new(width / 4, height / 2),
            imgproc::FONT_HERSHEY_SIMPLEX,
            0.8,
            Scalar::all(PLACEHOLDER_TEXT_COLOR),
            2,
            imgproc::LINE_AA,
            false,
        )?;
        Ok(panel)
    }

    fn draw_label(&self, image: &mut Mat, text: &str, anchor: Point) -> opencv::Result<()> {
        if self.shadow {
            imgproc::put_text(
                image,
                text,
                Point::new(anchor.x + SHADOW_OFFSET, anchor.y + SHADOW_OFFSET),
                imgproc::FONT_HERSHEY_SIMPLEX,
                1.0,
                Scalar::all(0.0),
                3,
                imgproc::LINE_AA,
                false,
            )?;
        }
        imgproc::put_text(
            image,
            text,
            anchor,
            imgproc::FONT_HERSHEY_SIMPLEX,
            1.0,
            Scalar::all(255.0),
            2,
            imgproc::LINE_AA,
            false,
        )
    }
}

/// Width of a `width`x`height` image scaled to `target_height` with its
/// aspect ratio kept, rounded to the nearest pixel.
pub fn scaled_width(width: i32, height: i32, target_height: i32) -> i32 {
    let scaled = (width as f64 * target_height as f64 / height as f64).round() as i32;
    scaled.max(1)
}

/// Converts gray or BGRA input to 3-channel BGR. `None` when already BGR.
fn to_bgr(image: &Mat) -> opencv::Result<Option<Mat>> {
    let code = match image.channels() {
        1 => imgproc::COLOR_GRAY2BGR,
        4 => imgproc::COLOR_BGRA2BGR,
        _ => return Ok(None),
    };
    let mut bgr = Mat::default();
    imgproc::cvt_color(image, &mut bgr, code, 0)?;
    Ok(Some(bgr))
}
