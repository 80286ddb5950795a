//! Drawing surface the overlay is composed on.

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

use lammah_common::error::{LammahError, LammahResult};

/// Background of a freshly created surface.
const CLEAR_COLOR: Rgb<u8> = Rgb([0, 0, 0]);

/// Fixed-size RGB canvas sized to the source video.
///
/// Every frame handed to the encoder is read from here. A released surface
/// holds no pixel buffer and rejects further drawing.
#[derive(Debug)]
pub struct Surface {
    width: u32,
    height: u32,
    canvas: RgbImage,
    released: bool,
}

impl Surface {
    /// Create a cleared surface. Zero-sized surfaces cannot be captured.
    pub fn new(width: u32, height: u32) -> LammahResult<Self> {
        if width == 0 || height == 0 {
            return Err(LammahError::encode(format!(
                "Cannot create a {width}x{height} drawing surface"
            )));
        }
        Ok(Self {
            width,
            height,
            canvas: RgbImage::from_pixel(width, height, CLEAR_COLOR),
            released: false,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Replace the canvas content with a decoded frame.
    ///
    /// Frames whose size differs from the surface are stretched to fit.
    pub fn draw_frame(&mut self, frame: &RgbImage) -> LammahResult<()> {
        self.ensure_live()?;
        if frame.dimensions() == (self.width, self.height) {
            self.canvas.copy_from_slice(frame.as_raw());
        } else {
            self.canvas = imageops::resize(frame, self.width, self.height, FilterType::Triangle);
        }
        Ok(())
    }

    pub fn canvas(&self) -> &RgbImage {
        &self.canvas
    }

    pub fn canvas_mut(&mut self) -> LammahResult<&mut RgbImage> {
        self.ensure_live()?;
        Ok(&mut self.canvas)
    }

    /// Drop the pixel buffer. Idempotent.
    pub fn release(&mut self) {
        if !self.released {
            self.canvas = RgbImage::new(0, 0);
            self.released = true;
            tracing::debug!(width = self.width, height = self.height, "Surface released");
        }
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    fn ensure_live(&self) -> LammahResult<()> {
        if self.released {
            return Err(LammahError::render("Drawing surface already released"));
        }
        Ok(())
    }
}
