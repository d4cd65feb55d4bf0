// photoprep/src/raster/photo.rs
//! Pure Rust raster backend.
//!
//! | Operation | Implementation |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP) | `image::ImageReader`, EXIF orientation applied |
//! | Statistics, levels, modulation, sigmoidal contrast | per-sample math on `Rgb<u16>` |
//! | Resize / crop / sharpen | `image::imageops` (Lanczos3, `crop_imm`, `unsharpen`) |
//! | Encode | `image::codecs::jpeg::JpegEncoder` |
//! | Encoded quality | [`jpeg_quality`](super::jpeg_quality) table matching |

use super::jpeg_quality::estimate_quality;
use super::{BackendError, ChannelStats, Dimensions, RasterBackend};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{
    DynamicImage, ExtendedColorType, ImageBuffer, ImageDecoder, ImageEncoder, ImageFormat,
    ImageReader, Rgb,
};
use std::collections::HashSet;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

pub type Rgb16Image = ImageBuffer<Rgb<u16>, Vec<u16>>;

const QUANTUM_RANGE: f64 = 65535.0;

/// Unsharp mask applied after scaling.
const SHARPEN_SIGMA: f32 = 0.7;
const SHARPEN_THRESHOLD: f64 = 0.008;

/// A decoded photo held at 16 bits per channel.
#[derive(Debug, Clone)]
pub struct Photo {
    pixels: Rgb16Image,
    icc_profile: Option<Vec<u8>>,
    quality: Option<u8>,
}

impl Photo {
    pub fn from_pixels(pixels: Rgb16Image) -> Self {
        Self {
            pixels,
            icc_profile: None,
            quality: None,
        }
    }

    pub fn pixels(&self) -> &Rgb16Image {
        &self.pixels
    }

    pub fn icc_profile(&self) -> Option<&[u8]> {
        self.icc_profile.as_deref()
    }

    fn with_pixels(&self, pixels: Rgb16Image) -> Self {
        Self {
            pixels,
            icc_profile: self.icc_profile.clone(),
            quality: self.quality,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl RasterBackend for RustBackend {
    type Image = Photo;

    fn quantum_range(&self) -> f64 {
        QUANTUM_RANGE
    }

    fn decode(&self, path: &Path) -> Result<Photo, BackendError> {
        log::debug!("Decoding image from: {}", path.display());

        let reader = ImageReader::open(path)?.with_guessed_format()?;
        let format = reader.format();

        let mut decoder = reader.into_decoder()?;
        let orientation = decoder.orientation()?;
        let icc_profile = decoder.icc_profile()?;

        let mut image = DynamicImage::from_decoder(decoder)?;
        image.apply_orientation(orientation);

        let quality = if format == Some(ImageFormat::Jpeg) {
            estimate_quality(&std::fs::read(path)?)
        } else {
            None
        };

        Ok(Photo {
            pixels: image.into_rgb16(),
            icc_profile,
            quality,
        })
    }

    fn dimensions(&self, image: &Photo) -> Dimensions {
        Dimensions {
            width: image.pixels.width(),
            height: image.pixels.height(),
        }
    }

    fn channel_stats(&self, image: &Photo) -> Result<ChannelStats, BackendError> {
        let samples = image.pixels.as_raw();
        if samples.is_empty() {
            return Err(BackendError::ProcessingFailed(
                "Cannot measure an empty image".to_string(),
            ));
        }

        let count = samples.len() as f64;
        let mean = samples.iter().map(|&v| f64::from(v)).sum::<f64>() / count;
        let variance = samples
            .iter()
            .map(|&v| {
                let d = f64::from(v) - mean;
                d * d
            })
            .sum::<f64>()
            / count;

        Ok(ChannelStats {
            mean,
            stddev: variance.sqrt(),
        })
    }

    fn auto_level(&self, image: &mut Photo) -> Result<(), BackendError> {
        let samples = image.pixels.as_raw();
        let (min, max) = match (samples.iter().min(), samples.iter().max()) {
            (Some(&min), Some(&max)) => (f64::from(min), f64::from(max)),
            _ => return Ok(()),
        };

        if max <= min {
            return Ok(());
        }

        let scale = QUANTUM_RANGE / (max - min);
        for sample in image.pixels.iter_mut() {
            *sample = to_quantum((f64::from(*sample) - min) * scale);
        }

        Ok(())
    }

    fn modulate(
        &self,
        image: &mut Photo,
        brightness: f64,
        saturation: f64,
        hue: f64,
    ) -> Result<(), BackendError> {
        let brightness = brightness / 100.0;
        let saturation = saturation / 100.0;
        // 200 is a half turn, so 100 and 300 both leave hue alone
        let hue_shift = (hue - 100.0) / 200.0;

        for pixel in image.pixels.pixels_mut() {
            let [r, g, b] = pixel.0.map(|v| f64::from(v) / QUANTUM_RANGE);
            let (h, s, l) = rgb_to_hsl(r, g, b);

            let h = (h + hue_shift).rem_euclid(1.0);
            let s = (s * saturation).clamp(0.0, 1.0);
            let l = (l * brightness).clamp(0.0, 1.0);

            let (r, g, b) = hsl_to_rgb(h, s, l);
            pixel.0 = [r, g, b].map(|v| to_quantum(v * QUANTUM_RANGE));
        }

        Ok(())
    }

    fn sigmoidal_contrast(
        &self,
        image: &mut Photo,
        strength: f64,
        midpoint: f64,
    ) -> Result<(), BackendError> {
        if strength <= 0.0 {
            return Err(BackendError::ProcessingFailed(format!(
                "Sigmoidal contrast strength must be positive, got {strength}"
            )));
        }

        let low = sigmoid(-strength * midpoint);
        let high = sigmoid(strength * (1.0 - midpoint));
        let span = high - low;

        // precompute the curve once, there are only 65536 possible inputs
        let curve: Vec<u16> = (0..=u16::MAX)
            .map(|v| {
                let u = f64::from(v) / QUANTUM_RANGE;
                let mapped = (sigmoid(strength * (u - midpoint)) - low) / span;
                to_quantum(mapped * QUANTUM_RANGE)
            })
            .collect();

        for sample in image.pixels.iter_mut() {
            *sample = curve[usize::from(*sample)];
        }

        Ok(())
    }

    fn duplicate(&self, image: &Photo) -> Photo {
        image.clone()
    }

    fn resize(&self, image: &Photo, width: u32, height: u32) -> Photo {
        if width == image.pixels.width() && height == image.pixels.height() {
            return image.clone();
        }

        log::debug!(
            "Resizing image from {}x{} to {}x{}",
            image.pixels.width(),
            image.pixels.height(),
            width,
            height
        );

        image.with_pixels(imageops::resize(
            &image.pixels,
            width.max(1),
            height.max(1),
            FilterType::Lanczos3,
        ))
    }

    fn crop(&self, image: &Photo, x: u32, y: u32, width: u32, height: u32) -> Photo {
        image.with_pixels(imageops::crop_imm(&image.pixels, x, y, width, height).to_image())
    }

    fn sharpen(&self, image: &mut Photo) {
        let threshold = (SHARPEN_THRESHOLD * QUANTUM_RANGE).round() as i32;
        image.pixels = imageops::unsharpen(&image.pixels, SHARPEN_SIGMA, threshold);
    }

    fn strip_metadata(&self, image: &mut Photo) {
        image.icc_profile = None;
    }

    fn encode(&self, image: &Photo, path: &Path, quality: u8) -> Result<(), BackendError> {
        let rgb8 = DynamicImage::ImageRgb16(image.pixels.clone()).into_rgb8();
        let writer = BufWriter::new(File::create(path)?);

        let mut encoder = JpegEncoder::new_with_quality(writer, quality.clamp(1, 100));
        if let Some(icc) = &image.icc_profile {
            if let Err(e) = encoder.set_icc_profile(icc.clone()) {
                log::debug!("Skipping ICC profile for {}: {}", path.display(), e);
            }
        }

        encoder.write_image(
            rgb8.as_raw(),
            rgb8.width(),
            rgb8.height(),
            ExtendedColorType::Rgb8,
        )?;

        Ok(())
    }

    fn distortion(&self, original: &Photo, candidate: &Photo, fuzz: f64) -> Result<f64, BackendError> {
        if original.pixels.dimensions() != candidate.pixels.dimensions() {
            let (ow, oh) = original.pixels.dimensions();
            let (cw, ch) = candidate.pixels.dimensions();
            return Err(BackendError::ProcessingFailed(format!(
                "Cannot compare a {ow}x{oh} image with a {cw}x{ch} image"
            )));
        }

        let fuzz_squared = fuzz * fuzz;
        let differing = original
            .pixels
            .pixels()
            .zip(candidate.pixels.pixels())
            .filter(|(a, b)| {
                let distance: f64 = a
                    .0
                    .iter()
                    .zip(b.0.iter())
                    .map(|(&x, &y)| {
                        let d = f64::from(x) - f64::from(y);
                        d * d
                    })
                    .sum::<f64>()
                    / 3.0;
                distance > fuzz_squared
            })
            .count();

        Ok(differing as f64)
    }

    fn distinct_colors(&self, image: &Photo) -> usize {
        image
            .pixels
            .pixels()
            .map(|p| p.0)
            .collect::<HashSet<[u16; 3]>>()
            .len()
    }

    fn encoded_quality(&self, image: &Photo) -> Option<u8> {
        image.quality
    }
}

fn to_quantum(value: f64) -> u16 {
    value.round().clamp(0.0, QUANTUM_RANGE) as u16
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn rgb_to_hsl(r: f64, g: f64, b: f64) -> (f64, f64, f64) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;
    let delta = max - min;

    if delta <= f64::EPSILON {
        return (0.0, 0.0, l);
    }

    let s = if l <= 0.5 {
        delta / (max + min)
    } else {
        delta / (2.0 - max - min)
    };

    let sector = if max == r {
        ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        (b - r) / delta + 2.0
    } else {
        (r - g) / delta + 4.0
    };

    (sector / 6.0, s, l)
}

fn hsl_to_rgb(h: f64, s: f64, l: f64) -> (f64, f64, f64) {
    if s <= f64::EPSILON {
        return (l, l, l);
    }

    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;

    (
        hue_to_channel(p, q, h + 1.0 / 3.0),
        hue_to_channel(p, q, h),
        hue_to_channel(p, q, h - 1.0 / 3.0),
    )
}

fn hue_to_channel(p: f64, q: f64, t: f64) -> f64 {
    let t = t.rem_euclid(1.0);
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}
