//! Raster image service.
//!
//! [`RasterBackend`] is the set of pixel primitives the pipeline needs:
//! decode, statistics, color modulation, sigmoidal contrast, scaling,
//! encoding and distortion measurement. The decision logic in
//! [`processors`](crate::processors) only ever talks to this trait, so it can
//! be exercised against a scripted mock.
//!
//! The production implementation is [`RustBackend`], which works on 16-bit
//! RGB buffers (quantum range 65535) using the `image` crate.
//!
//! Releasing an image is dropping it: backends own no handles beyond the
//! `Image` value itself.

pub mod jpeg_quality;
pub mod photo;

#[cfg(test)]
pub(crate) mod mock;

pub use photo::{Photo, RustBackend};

use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Mean and standard deviation over every sample of every color channel,
/// in quantum units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelStats {
    pub mean: f64,
    pub stddev: f64,
}

pub trait RasterBackend: Send + Sync {
    type Image: Send;

    /// Largest representable channel value.
    fn quantum_range(&self) -> f64;

    /// Decode and auto-orient an image file.
    fn decode(&self, path: &Path) -> Result<Self::Image, BackendError>;

    fn dimensions(&self, image: &Self::Image) -> Dimensions;

    fn channel_stats(&self, image: &Self::Image) -> Result<ChannelStats, BackendError>;

    /// Linear level stretch of the darkest sample to 0 and the brightest to the quantum range.
    fn auto_level(&self, image: &mut Self::Image) -> Result<(), BackendError>;

    /// Percent-scale brightness and saturation; `hue` of 100 leaves hue untouched.
    fn modulate(
        &self,
        image: &mut Self::Image,
        brightness: f64,
        saturation: f64,
        hue: f64,
    ) -> Result<(), BackendError>;

    /// Brightening sigmoidal contrast curve; `midpoint` is a fraction of the quantum range.
    fn sigmoidal_contrast(
        &self,
        image: &mut Self::Image,
        strength: f64,
        midpoint: f64,
    ) -> Result<(), BackendError>;

    fn duplicate(&self, image: &Self::Image) -> Self::Image;

    fn resize(&self, image: &Self::Image, width: u32, height: u32) -> Self::Image;

    fn crop(&self, image: &Self::Image, x: u32, y: u32, width: u32, height: u32) -> Self::Image;

    fn sharpen(&self, image: &mut Self::Image);

    /// Drop embedded profiles and metadata so they are not written on encode.
    fn strip_metadata(&self, image: &mut Self::Image);

    /// Write the image as a JPEG at the given quality.
    fn encode(&self, image: &Self::Image, path: &Path, quality: u8) -> Result<(), BackendError>;

    /// Number of pixels whose color differs by more than `fuzz` (in quantum units).
    fn distortion(
        &self,
        original: &Self::Image,
        candidate: &Self::Image,
        fuzz: f64,
    ) -> Result<f64, BackendError>;

    fn distinct_colors(&self, image: &Self::Image) -> usize;

    /// Quality the image was encoded with, when it came from a JPEG.
    fn encoded_quality(&self, image: &Self::Image) -> Option<u8>;
}
