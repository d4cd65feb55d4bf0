// photoprep/src/processors/quality.rs
//! Smallest JPEG quality that does not visibly change the image.
//!
//! A bounded binary search over `[min_quality, max_quality]`: each probe
//! encodes the image to a temporary JPEG, decodes it and counts the pixels
//! that moved by more than the fuzz tolerance. Probes within tolerance pull
//! the ceiling down, lossy probes push the floor up. A probe landing inside
//! the acceptance band around the threshold ends the search at once.
//!
//! The threshold is a target, not a guarantee: when every probe is too lossy
//! the search settles on the ceiling, whose round trip may still distort more
//! than the threshold allows.

use crate::core::context::ProcessingContext;
use crate::core::pipeline::Stage;
use crate::core::results::{QualitySearchResult, StageFailure, StageOutput, StageResult};
use crate::core::QualitySearchConfig;
use crate::raster::{BackendError, RasterBackend};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default)]
pub struct QualitySearcher {
    config: QualitySearchConfig,
}

impl QualitySearcher {
    pub fn new(config: QualitySearchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &QualitySearchConfig {
        &self.config
    }

    pub fn search<B: RasterBackend>(
        &self,
        backend: &B,
        image: &B::Image,
    ) -> Result<QualitySearchResult, BackendError> {
        let cfg = &self.config;
        let current = backend.encoded_quality(image);

        let colors = backend.distinct_colors(image);
        if colors < cfg.min_unique_colors {
            let quality = current
                .unwrap_or(cfg.max_quality)
                .clamp(cfg.min_quality, cfg.max_quality);
            log::debug!(
                "Only {} distinct colors, keeping quality {}",
                colors,
                quality
            );
            return Ok(QualitySearchResult {
                quality,
                iterations: 0,
            });
        }

        let mut max_quality = match current {
            Some(q) if q > cfg.min_quality => q.min(cfg.max_quality),
            _ => cfg.max_quality,
        };
        let mut min_quality = cfg.min_quality;

        let pixel_count = backend.dimensions(image).pixel_count().max(1) as f64;
        let fuzz = cfg.fuzz * backend.quantum_range();
        let band = cfg.acceptance_band();

        let mut iterations = 0;
        while max_quality > min_quality + 1 && iterations < cfg.steps {
            iterations += 1;

            let candidate = ((u16::from(max_quality) + u16::from(min_quality)) / 2) as u8;
            let distortion = self.probe(backend, image, candidate, fuzz)? / pixel_count;

            log::debug!(
                "Probe {}: quality {} distortion {:.5}",
                iterations,
                candidate,
                distortion
            );

            if distortion > cfg.distortion_threshold {
                min_quality = candidate;
            } else {
                max_quality = candidate;
            }

            if (distortion - cfg.distortion_threshold).abs() < band {
                max_quality = candidate;
                break;
            }
        }

        Ok(QualitySearchResult {
            quality: max_quality,
            iterations,
        })
    }

    /// Encode at `quality`, decode again and measure against the original.
    /// The probe file is removed when this returns, on every path.
    fn probe<B: RasterBackend>(
        &self,
        backend: &B,
        image: &B::Image,
        quality: u8,
        fuzz: f64,
    ) -> Result<f64, BackendError> {
        let probe_file = tempfile::Builder::new()
            .prefix("photoprep-probe-")
            .suffix(".jpg")
            .tempfile()?;

        backend.encode(image, probe_file.path(), quality)?;
        let decoded = backend.decode(probe_file.path())?;

        backend.distortion(image, &decoded, fuzz)
    }
}

pub struct QualitySearchStage<B: RasterBackend> {
    backend: Arc<B>,
    searcher: QualitySearcher,
}

impl<B: RasterBackend> QualitySearchStage<B> {
    pub fn new(backend: Arc<B>, searcher: QualitySearcher) -> Self {
        Self { backend, searcher }
    }
}

impl<B: RasterBackend> Stage<B::Image> for QualitySearchStage<B> {
    fn name(&self) -> &'static str {
        "quality"
    }

    fn process(&self, ctx: &mut ProcessingContext<B::Image>) -> Option<StageResult> {
        let Some(image) = ctx.image() else {
            return Some(Err(StageFailure::new(
                "quality",
                format!("No image loaded for {}", ctx.source_file().display()),
            )));
        };

        let result = match self.searcher.search(self.backend.as_ref(), image) {
            Ok(found) => {
                log::debug!(
                    "Chose quality {} for {} after {} probes",
                    found.quality,
                    ctx.source_file().display(),
                    found.iterations
                );
                Ok(StageOutput::Quality(found))
            }
            Err(e) => Err(StageFailure::new(
                "quality",
                format!(
                    "Error finding min jpg quality setting for file {}: {}",
                    ctx.source_file().display(),
                    e
                ),
            )),
        };

        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::mock::{MockBackend, MockImage, MockOp};
    use crate::raster::{Photo, RustBackend};
    use image::{ImageBuffer, Rgb};

    fn probes(backend: &MockBackend) -> Vec<u8> {
        backend
            .get_operations()
            .into_iter()
            .filter_map(|op| match op {
                MockOp::Encode { quality, .. } => Some(quality),
                _ => None,
            })
            .collect()
    }

    fn search_with(
        image: MockImage,
        curve: impl Fn(u8) -> f64 + Send + Sync + 'static,
    ) -> (QualitySearchResult, Vec<u8>) {
        let backend = MockBackend::with_image(image.clone()).with_curve(curve);
        let result = QualitySearcher::default().search(&backend, &image).unwrap();
        (result, probes(&backend))
    }

    #[test]
    fn low_color_images_keep_their_quality() {
        let image = MockImage {
            distinct_colors: 4095,
            quality: Some(80),
            ..Default::default()
        };
        let (result, probed) = search_with(image, |_| 0.0);

        assert_eq!(result.quality, 80);
        assert_eq!(result.iterations, 0);
        assert!(probed.is_empty());
    }

    #[test]
    fn low_color_quality_is_held_within_bounds() {
        let high = MockImage {
            distinct_colors: 10,
            quality: Some(98),
            ..Default::default()
        };
        assert_eq!(search_with(high, |_| 0.0).0.quality, 92);

        let unknown = MockImage {
            distinct_colors: 10,
            quality: None,
            ..Default::default()
        };
        let (result, probed) = search_with(unknown, |_| 0.0);
        assert_eq!(result.quality, 92);
        assert!(probed.is_empty());
    }

    #[test]
    fn converges_immediately_inside_acceptance_band() {
        let image = MockImage {
            quality: None,
            ..Default::default()
        };
        let (result, probed) = search_with(image, |q| if q == 73 { 0.0148 } else { 0.0 });

        assert_eq!(probed, vec![73]);
        assert_eq!(result.quality, 73);
        assert_eq!(result.iterations, 1);
    }

    #[test]
    fn lossless_everywhere_walks_down_to_the_floor() {
        let image = MockImage {
            quality: None,
            ..Default::default()
        };
        let (result, probed) = search_with(image, |_| 0.0);

        assert_eq!(probed, vec![73, 64, 59, 57, 56]);
        assert_eq!(result.quality, 56);
        assert_eq!(result.iterations, 5);
    }

    #[test]
    fn lossy_everywhere_keeps_the_ceiling() {
        let image = MockImage {
            quality: None,
            ..Default::default()
        };
        let (result, probed) = search_with(image, |_| 0.5);

        assert_eq!(probed, vec![73, 82, 87, 89, 90]);
        assert_eq!(result.quality, 92);
    }

    #[test]
    fn current_quality_lowers_the_ceiling() {
        let image = MockImage {
            quality: Some(80),
            ..Default::default()
        };
        let (_, probed) = search_with(image, |_| 0.0);
        assert_eq!(probed[0], 67);

        let above = MockImage {
            quality: Some(100),
            ..Default::default()
        };
        let (result, probed) = search_with(above, |_| 0.5);
        assert_eq!(probed[0], 73);
        assert_eq!(result.quality, 92);
    }

    #[test]
    fn bounds_probe_limit_and_monotonicity_hold_across_curves() {
        type Curve = Arc<dyn Fn(u8) -> f64 + Send + Sync>;
        let curves: Vec<Curve> = vec![
            Arc::new(|q: u8| f64::from(100 - q) * 0.001),
            Arc::new(|q: u8| f64::from(100 - q) * 0.0004),
            Arc::new(|q: u8| if q < 70 { 0.03 } else { 0.001 }),
            Arc::new(|q: u8| if q < 85 { 0.2 } else { 0.0 }),
            Arc::new(|q: u8| 0.0165 - f64::from(q) * 0.00001),
        ];

        for (i, curve) in curves.into_iter().enumerate() {
            for current in [None, Some(50), Some(60), Some(75), Some(92), Some(99)] {
                let image = MockImage {
                    quality: current,
                    ..Default::default()
                };
                let scripted = Arc::clone(&curve);
                let backend =
                    MockBackend::with_image(image.clone()).with_curve(move |q| scripted(q));
                let result = QualitySearcher::default().search(&backend, &image).unwrap();
                let probed = probes(&backend);

                assert!(
                    (55..=92).contains(&result.quality),
                    "curve {i}, current {current:?}: {}",
                    result.quality
                );
                assert!(probed.len() <= 5);
                assert_eq!(probed.len() as u32, result.iterations);

                for q in probed {
                    if curve(q) <= 0.015 {
                        assert!(
                            result.quality <= q,
                            "curve {i}: accepted probe {q} but returned {}",
                            result.quality
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn probe_files_are_removed() {
        let image = MockImage {
            quality: None,
            ..Default::default()
        };
        let backend = MockBackend::with_image(image.clone());
        QualitySearcher::default().search(&backend, &image).unwrap();

        for op in backend.get_operations() {
            if let MockOp::Encode { path, .. } = op {
                assert!(!path.exists(), "{} left behind", path.display());
            }
        }
    }

    #[test]
    fn distortion_error_aborts_search_and_cleans_up() {
        let image = MockImage::default();
        let backend = MockBackend::with_image(image.clone()).failing_on("distortion");

        assert!(QualitySearcher::default().search(&backend, &image).is_err());

        let encoded: Vec<_> = backend
            .get_operations()
            .into_iter()
            .filter_map(|op| match op {
                MockOp::Encode { path, .. } => Some(path),
                _ => None,
            })
            .collect();
        assert_eq!(encoded.len(), 1);
        assert!(!encoded[0].exists());
    }

    #[test]
    fn stage_reports_chosen_quality() {
        let backend = Arc::new(MockBackend::new().with_curve(|_| 0.0));
        let stage = QualitySearchStage::new(backend, QualitySearcher::default());

        let mut ctx = ProcessingContext::new("/photos/a.jpg");
        ctx.set_image(MockImage {
            quality: None,
            ..Default::default()
        });

        let output = stage.process(&mut ctx).unwrap().unwrap();
        assert_eq!(
            output,
            StageOutput::Quality(QualitySearchResult {
                quality: 56,
                iterations: 5
            })
        );
    }

    #[test]
    fn smooth_gradient_round_trip_stays_under_threshold() {
        let pixels = ImageBuffer::from_fn(128, 128, |x, y| {
            Rgb([
                (x * 512) as u16,
                (y * 512) as u16,
                ((x + y) * 200 + 8000) as u16,
            ])
        });
        let photo = Photo::from_pixels(pixels);
        let backend = RustBackend::new();
        let searcher = QualitySearcher::default();

        let found = searcher.search(&backend, &photo).unwrap();
        assert!((55..=92).contains(&found.quality));

        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("out.jpg");
        backend.encode(&photo, &path, found.quality).unwrap();
        let decoded = backend.decode(&path).unwrap();

        let cfg = searcher.config();
        let distortion = backend
            .distortion(&photo, &decoded, cfg.fuzz * backend.quantum_range())
            .unwrap()
            / (128.0 * 128.0);
        assert!(distortion <= cfg.distortion_threshold + cfg.acceptance_band() + 1e-9);
    }

    #[test]
    fn noisy_image_settles_on_the_ceiling() {
        let pixels = ImageBuffer::from_fn(128, 128, |x, y| {
            let h = (x.wrapping_mul(73_856_093) ^ y.wrapping_mul(19_349_663))
                .wrapping_mul(2_654_435_761);
            Rgb([h as u16, (h >> 8) as u16, (h >> 16) as u16])
        });
        let photo = Photo::from_pixels(pixels);
        let backend = RustBackend::new();
        let searcher = QualitySearcher::default();
        let cfg = searcher.config();

        let found = searcher.search(&backend, &photo).unwrap();
        assert_eq!(found.quality, cfg.max_quality);
        assert!(found.iterations <= cfg.steps);

        // even the ceiling cannot bring noise under the threshold
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("noise.jpg");
        backend.encode(&photo, &path, found.quality).unwrap();
        let decoded = backend.decode(&path).unwrap();
        let distortion = backend
            .distortion(&photo, &decoded, cfg.fuzz * backend.quantum_range())
            .unwrap()
            / (128.0 * 128.0);
        assert!(distortion > cfg.distortion_threshold + cfg.acceptance_band());
    }
}
