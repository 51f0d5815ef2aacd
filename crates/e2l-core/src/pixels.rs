//! Captured pixel buffers

use crate::error::{BridgeError, Result};

/// Numpy dtype string for unsigned 8-bit pixels, as carried on the wire
pub const PIXEL_DTYPE: &str = "|u1";

/// Channels kept per pixel after dropping alpha
pub const RGB_CHANNELS: usize = 3;

/// An RGB image, row-major, 3 bytes per pixel
///
/// The shape reported to clients is `(width, height, 3)`, the layout the
/// capture system hands back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Build from raw RGB bytes; `data` must hold exactly `width * height * 3` bytes
    pub fn from_rgb(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * RGB_CHANNELS;
        if data.len() != expected {
            return Err(BridgeError::Engine(format!(
                "pixel buffer of {}x{} needs {} bytes, got {}",
                width,
                height,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Build from an RGBA capture, dropping the alpha channel
    pub fn from_rgba(width: u32, height: u32, rgba: &[u8]) -> Result<Self> {
        let pixels = width as usize * height as usize;
        if rgba.len() != pixels * 4 {
            return Err(BridgeError::Engine(format!(
                "RGBA capture of {}x{} needs {} bytes, got {}",
                width,
                height,
                pixels * 4,
                rgba.len()
            )));
        }
        let mut data = Vec::with_capacity(pixels * RGB_CHANNELS);
        for px in rgba.chunks_exact(4) {
            data.extend_from_slice(&px[..RGB_CHANNELS]);
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// `(width, height, channels)`
    pub fn shape(&self) -> [usize; 3] {
        [self.width as usize, self.height as usize, RGB_CHANNELS]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}
