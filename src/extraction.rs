//! Point extractor contract.

use crate::{constants::MARKER_COUNT, image_view::ImageView, preview::Preview};
use nalgebra::Point2;

/// Finds bright marker centroids in a frame
pub trait PointExtractor: Send {
    /// Detected centroids in pixels, in no particular order
    ///
    /// Any number of points may be returned. When `preview` is present the
    /// extractor may annotate it.
    fn extract(&mut self, image: &ImageView<'_>, preview: Option<&mut Preview>) -> Vec<Point2<f64>>;
}

/// The first three detections, or `None` if fewer were found
#[must_use]
pub fn first_markers(points: &[Point2<f64>]) -> Option<[Point2<f64>; MARKER_COUNT]> {
    points.get(..MARKER_COUNT)?.try_into().ok()
}
