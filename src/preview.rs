//! Annotated preview frames for a UI.
//!
//! The tracker only builds a preview when a [`PreviewSink`] reports itself
//! visible. The extractor may draw its own annotations before the tracker
//! adds the rate line and the top-marker cross.

use crate::{
    constants::PREVIEW_CROSS_HALF_LENGTH,
    image_view::ImageView,
    utils::safe_cast::{checked_index, f64_to_i64_round},
};
use nalgebra::Point2;
use ndarray::Array3;

/// RGB colour
pub type Rgb = [u8; 3];

/// Colour of the cross drawn on the top marker
pub const CROSS_COLOR: Rgb = [255, 0, 0];

/// An RGB canvas plus one line of status text
#[derive(Debug, Clone, PartialEq)]
pub struct Preview {
    canvas: Array3<u8>,
    info: String,
}

impl Preview {
    /// Copy a frame into an RGB canvas
    ///
    /// Single and dual channel frames are replicated to grey; frames with
    /// three or more channels keep their first three.
    #[must_use]
    pub fn from_image(image: &ImageView<'_>) -> Self {
        let (height, width, channels) = image.dim();
        let canvas = Array3::from_shape_fn((height, width, 3), |(y, x, c)| {
            let source = if channels >= 3 { c } else { 0 };
            image.sample_u8(y, x, source)
        });
        Self {
            canvas,
            info: String::new(),
        }
    }

    /// Canvas as `(height, width, 3)`
    #[must_use]
    pub fn canvas(&self) -> &Array3<u8> {
        &self.canvas
    }

    /// Mutable canvas for extractor annotations
    pub fn canvas_mut(&mut self) -> &mut Array3<u8> {
        &mut self.canvas
    }

    /// Width in pixels
    #[must_use]
    pub fn width(&self) -> usize {
        self.canvas.dim().1
    }

    /// Height in pixels
    #[must_use]
    pub fn height(&self) -> usize {
        self.canvas.dim().0
    }

    /// Status line
    #[must_use]
    pub fn info(&self) -> &str {
        &self.info
    }

    /// Replace the status line with the current frame rates
    pub fn draw_info(&mut self, effective_fps: f64, skipped_fps: f64) {
        self.info = format!("FPS: {effective_fps:.0}/{skipped_fps:.0}");
    }

    /// Colour one pixel, ignoring coordinates off the canvas
    pub fn set_pixel(&mut self, x: i64, y: i64, color: Rgb) {
        let (Some(column), Some(row)) = (checked_index(x, self.width()), checked_index(y, self.height())) else {
            return;
        };
        for (c, value) in color.into_iter().enumerate() {
            self.canvas[[row, column, c]] = value;
        }
    }

    /// Draw an axis-aligned cross centred on `center`, clipped to the canvas
    pub fn draw_cross(&mut self, center: &Point2<f64>, color: Rgb) {
        let (Some(cx), Some(cy)) = (f64_to_i64_round(center.x), f64_to_i64_round(center.y)) else {
            return;
        };
        for offset in -PREVIEW_CROSS_HALF_LENGTH..=PREVIEW_CROSS_HALF_LENGTH {
            self.set_pixel(cx.saturating_add(offset), cy, color);
            self.set_pixel(cx, cy.saturating_add(offset), color);
        }
    }
}

/// Destination for preview frames, typically a UI widget
pub trait PreviewSink: Send {
    /// Whether anyone is looking; previews are skipped otherwise
    fn is_visible(&self) -> bool;

    /// Show a finished preview
    fn present(&mut self, preview: &Preview);
}
