// photoprep/src/raster/mock.rs
//! Scripted backend for exercising pipeline logic without real pixels.
//!
//! Images carry pre-set statistics. Encoding writes the quality into the
//! target file so that decoding it back yields a probe image, whose
//! distortion against the original comes from a scripted curve.

use super::{BackendError, ChannelStats, Dimensions, RasterBackend};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const PROBE_PREFIX: &str = "mock-jpeg q=";

#[derive(Debug, Clone, PartialEq)]
pub struct MockImage {
    pub width: u32,
    pub height: u32,
    pub mean: f64,
    pub stddev: f64,
    pub distinct_colors: usize,
    pub quality: Option<u8>,
    pub probe_quality: Option<u8>,
    pub stripped: bool,
}

impl Default for MockImage {
    fn default() -> Self {
        Self {
            width: 4000,
            height: 3000,
            mean: 30000.0,
            stddev: 18000.0,
            distinct_colors: 100_000,
            quality: Some(95),
            probe_quality: None,
            stripped: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MockOp {
    Decode(PathBuf),
    Stats,
    AutoLevel,
    Modulate {
        brightness: f64,
        saturation: f64,
        hue: f64,
    },
    Sigmoidal {
        strength: f64,
        midpoint: f64,
    },
    Resize {
        width: u32,
        height: u32,
    },
    Crop {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
    Sharpen,
    Strip,
    Encode {
        path: PathBuf,
        quality: u8,
    },
    Distortion,
}

type DistortionCurve = Box<dyn Fn(u8) -> f64 + Send + Sync>;

/// Records every call; uses `Mutex` so it can be shared across rayon workers.
pub struct MockBackend {
    pub image: MockImage,
    curve: DistortionCurve,
    fail_on: Option<&'static str>,
    operations: Mutex<Vec<MockOp>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self {
            image: MockImage::default(),
            // lower quality, more changed pixels
            curve: Box::new(|q| f64::from(100 - q.min(100)) * 0.001),
            fail_on: None,
            operations: Mutex::new(Vec::new()),
        }
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(image: MockImage) -> Self {
        Self {
            image,
            ..Self::default()
        }
    }

    /// Distortion ratio (changed pixels / total pixels) for each probe quality.
    pub fn with_curve(mut self, curve: impl Fn(u8) -> f64 + Send + Sync + 'static) -> Self {
        self.curve = Box::new(curve);
        self
    }

    /// Make the named operation return an error.
    pub fn failing_on(mut self, op: &'static str) -> Self {
        self.fail_on = Some(op);
        self
    }

    pub fn get_operations(&self) -> Vec<MockOp> {
        self.operations.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&MockOp) -> bool) -> usize {
        self.operations.lock().unwrap().iter().filter(|op| pred(*op)).count()
    }

    fn record(&self, op: MockOp) {
        self.operations.lock().unwrap().push(op);
    }

    fn check(&self, op: &'static str) -> Result<(), BackendError> {
        if self.fail_on == Some(op) {
            Err(BackendError::ProcessingFailed(format!("mock {op} failure")))
        } else {
            Ok(())
        }
    }
}

impl RasterBackend for MockBackend {
    type Image = MockImage;

    fn quantum_range(&self) -> f64 {
        65535.0
    }

    fn decode(&self, path: &Path) -> Result<MockImage, BackendError> {
        self.record(MockOp::Decode(path.to_path_buf()));
        self.check("decode")?;

        let content = std::fs::read_to_string(path).unwrap_or_default();
        match content.strip_prefix(PROBE_PREFIX) {
            Some(q) => {
                let quality = q.trim().parse::<u8>().map_err(|e| {
                    BackendError::ProcessingFailed(format!("bad mock probe: {e}"))
                })?;
                Ok(MockImage {
                    quality: Some(quality),
                    probe_quality: Some(quality),
                    ..self.image.clone()
                })
            }
            None => {
                std::fs::metadata(path)?;
                Ok(self.image.clone())
            }
        }
    }

    fn dimensions(&self, image: &MockImage) -> Dimensions {
        Dimensions {
            width: image.width,
            height: image.height,
        }
    }

    fn channel_stats(&self, image: &MockImage) -> Result<ChannelStats, BackendError> {
        self.record(MockOp::Stats);
        self.check("stats")?;
        Ok(ChannelStats {
            mean: image.mean,
            stddev: image.stddev,
        })
    }

    fn auto_level(&self, _image: &mut MockImage) -> Result<(), BackendError> {
        self.record(MockOp::AutoLevel);
        self.check("auto_level")
    }

    fn modulate(
        &self,
        _image: &mut MockImage,
        brightness: f64,
        saturation: f64,
        hue: f64,
    ) -> Result<(), BackendError> {
        self.record(MockOp::Modulate {
            brightness,
            saturation,
            hue,
        });
        self.check("modulate")
    }

    fn sigmoidal_contrast(
        &self,
        _image: &mut MockImage,
        strength: f64,
        midpoint: f64,
    ) -> Result<(), BackendError> {
        self.record(MockOp::Sigmoidal { strength, midpoint });
        self.check("sigmoidal")
    }

    fn duplicate(&self, image: &MockImage) -> MockImage {
        image.clone()
    }

    fn resize(&self, image: &MockImage, width: u32, height: u32) -> MockImage {
        self.record(MockOp::Resize { width, height });
        MockImage {
            width,
            height,
            ..image.clone()
        }
    }

    fn crop(&self, image: &MockImage, x: u32, y: u32, width: u32, height: u32) -> MockImage {
        self.record(MockOp::Crop {
            x,
            y,
            width,
            height,
        });
        MockImage {
            width,
            height,
            ..image.clone()
        }
    }

    fn sharpen(&self, _image: &mut MockImage) {
        self.record(MockOp::Sharpen);
    }

    fn strip_metadata(&self, image: &mut MockImage) {
        self.record(MockOp::Strip);
        image.stripped = true;
    }

    fn encode(&self, _image: &MockImage, path: &Path, quality: u8) -> Result<(), BackendError> {
        self.record(MockOp::Encode {
            path: path.to_path_buf(),
            quality,
        });
        self.check("encode")?;
        std::fs::write(path, format!("{PROBE_PREFIX}{quality}"))?;
        Ok(())
    }

    fn distortion(
        &self,
        original: &MockImage,
        candidate: &MockImage,
        _fuzz: f64,
    ) -> Result<f64, BackendError> {
        self.record(MockOp::Distortion);
        self.check("distortion")?;
        let ratio = candidate.probe_quality.map_or(0.0, |q| (self.curve)(q));
        Ok(ratio * self.dimensions(original).pixel_count() as f64)
    }

    fn distinct_colors(&self, image: &MockImage) -> usize {
        image.distinct_colors
    }

    fn encoded_quality(&self, image: &MockImage) -> Option<u8> {
        image.quality
    }
}
