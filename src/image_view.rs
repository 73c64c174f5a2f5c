//! Typed views over raw camera frames.
//!
//! Frames arrive as bytes with a row stride. 8-bit frames are viewed in
//! place; 16-bit frames are decoded into an owned array since the byte
//! buffer carries no alignment guarantee for `u16`.

use crate::{camera::Frame, Error, Result};
use ndarray::{Array3, ArrayView3, ShapeBuilder};

/// A frame seen as `(height, width, channels)` samples
#[derive(Debug)]
pub enum ImageView<'a> {
    /// 8 bits per channel, borrowed from the camera buffer
    U8(ArrayView3<'a, u8>),
    /// 16 bits per channel, native byte order
    U16(Array3<u16>),
}

impl<'a> ImageView<'a> {
    /// Wrap a raw frame, picking the sample type from its channel size
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The channel size is neither 1 nor 2 bytes
    /// - The frame has no channels or a stride shorter than one row
    /// - The buffer is too short for the declared layout
    pub fn from_frame(frame: &Frame<'a>) -> Result<Self> {
        validate_layout(frame)?;

        match frame.bytes_per_channel {
            1 => {
                let shape = (frame.height, frame.width, frame.channels).strides((frame.stride, frame.channels, 1));
                Ok(Self::U8(ArrayView3::from_shape(shape, frame.data)?))
            }
            2 => {
                let data = frame.data;
                let stride = frame.stride;
                let channels = frame.channels;
                let samples = Array3::from_shape_fn((frame.height, frame.width, channels), |(y, x, c)| {
                    let offset = y * stride + (x * channels + c) * 2;
                    u16::from_ne_bytes([data[offset], data[offset + 1]])
                });
                Ok(Self::U16(samples))
            }
            other => Err(Error::UnsupportedFrame(format!(
                "{other} bytes per channel, expected 1 or 2"
            ))),
        }
    }

    /// `(height, width, channels)`
    #[must_use]
    pub fn dim(&self) -> (usize, usize, usize) {
        match self {
            Self::U8(view) => view.dim(),
            Self::U16(samples) => samples.dim(),
        }
    }

    /// Width in pixels
    #[must_use]
    pub fn width(&self) -> usize {
        self.dim().1
    }

    /// Height in pixels
    #[must_use]
    pub fn height(&self) -> usize {
        self.dim().0
    }

    /// Sample scaled down to 8 bits
    #[must_use]
    pub fn sample_u8(&self, y: usize, x: usize, channel: usize) -> u8 {
        match self {
            Self::U8(view) => view[[y, x, channel]],
            Self::U16(samples) => (samples[[y, x, channel]] >> 8) as u8,
        }
    }
}

/// Check the buffer against the declared layout
fn validate_layout(frame: &Frame<'_>) -> Result<()> {
    if frame.channels == 0 {
        return Err(Error::UnsupportedFrame("frame has no channels".to_string()));
    }
    if !matches!(frame.bytes_per_channel, 1 | 2) {
        return Err(Error::UnsupportedFrame(format!(
            "{} bytes per channel, expected 1 or 2",
            frame.bytes_per_channel
        )));
    }

    let overflow = || Error::InvalidInput("Frame layout overflows the address space".to_string());

    let row_bytes = frame
        .width
        .checked_mul(frame.channels)
        .and_then(|bytes| bytes.checked_mul(frame.bytes_per_channel))
        .ok_or_else(overflow)?;
    if frame.stride < row_bytes {
        return Err(Error::InvalidInput(format!(
            "Stride {} is shorter than a row of {row_bytes} bytes",
            frame.stride
        )));
    }

    let required = match frame.height {
        0 => 0,
        h => (h - 1)
            .checked_mul(frame.stride)
            .and_then(|bytes| bytes.checked_add(row_bytes))
            .ok_or_else(overflow)?,
    };
    if frame.data.len() < required {
        return Err(Error::InvalidInput(format!(
            "Frame buffer holds {} bytes, layout needs {required}",
            frame.data.len()
        )));
    }

    Ok(())
}
