// photoprep/src/processors/optimizer.rs
//! Automatic brightness and saturation correction.
//!
//! After a level stretch the channel mean and standard deviation are measured
//! once, each as a fraction of the quantum range. Below the threshold a cosine
//! curve yields a correction that is largest for very flat or dark frames and
//! fades to zero at the threshold:
//!
//! | Measure | Correction | Applied when |
//! |---|---|---|
//! | stddev | saturation multiplier `100 + adj`, adj up to 20 | multiplier > 100 |
//! | mean | sigmoidal contrast strength, up to 3 | mean above the absolute floor and strength > 1 |

use crate::core::context::ProcessingContext;
use crate::core::pipeline::Stage;
use crate::core::results::{OptimizationResult, StageFailure, StageOutput, StageResult};
use crate::core::OptimizerConfig;
use crate::raster::{BackendError, RasterBackend};
use std::f64::consts::PI;
use std::sync::Arc;

/// Neutral saturation/brightness for the modulation primitive.
const NEUTRAL_PERCENT: f64 = 100.0;
/// Hue value that leaves hue untouched.
const NEUTRAL_HUE: f64 = 100.0;

/// Cosine fall-off: `max` at 0, zero at `threshold`.
pub fn correction_curve(fraction: f64, threshold: f64, max: f64) -> f64 {
    max * (0.5 + (fraction / (threshold / PI)).cos() / 2.0)
}

/// Saturation multiplier (percent) for a normalized stddev, if any boost applies.
pub fn saturation_adjustment(stddev_fraction: f64, config: &OptimizerConfig) -> Option<f64> {
    if stddev_fraction >= config.threshold {
        return None;
    }

    let multiplier = NEUTRAL_PERCENT
        + correction_curve(
            stddev_fraction,
            config.threshold,
            config.max_saturation_adjustment,
        );

    (multiplier > NEUTRAL_PERCENT).then_some(multiplier)
}

/// Sigmoidal contrast strength for a channel mean, if brightening applies.
pub fn sigmoidal_adjustment(
    mean: f64,
    quantum_range: f64,
    config: &OptimizerConfig,
) -> Option<f64> {
    let fraction = mean / quantum_range;
    if fraction >= config.threshold || mean <= config.min_mean_for_brightening {
        return None;
    }

    let strength = correction_curve(fraction, config.threshold, config.max_sigmoidal_adjustment);
    (strength > 1.0).then_some(strength)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VisualOptimizer {
    config: OptimizerConfig,
}

impl VisualOptimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn optimize<B: RasterBackend>(
        &self,
        backend: &B,
        image: &mut B::Image,
    ) -> Result<OptimizationResult, BackendError> {
        backend.auto_level(image)?;

        let stats = backend.channel_stats(image)?;
        let quantum = backend.quantum_range();

        log::debug!(
            "Channel stats: mean {:.1} ({:.3}), stddev {:.1} ({:.3})",
            stats.mean,
            stats.mean / quantum,
            stats.stddev,
            stats.stddev / quantum
        );

        let saturation = saturation_adjustment(stats.stddev / quantum, &self.config);
        let sigmoidal = sigmoidal_adjustment(stats.mean, quantum, &self.config);

        // brighten first, then saturate the brightened pixels
        if let Some(strength) = sigmoidal {
            log::debug!("Adjusting sigmoidal: {:.2}", strength);
            backend.sigmoidal_contrast(image, strength, 0.0)?;
        }

        if let Some(multiplier) = saturation {
            log::debug!("Adjusting saturation: {:.2}", multiplier);
            backend.modulate(image, NEUTRAL_PERCENT, multiplier, NEUTRAL_HUE)?;
        }

        Ok(OptimizationResult {
            sigmoidal_adjustment: sigmoidal,
            saturation_adjustment: saturation,
        })
    }
}

pub struct OptimizeStage<B: RasterBackend> {
    backend: Arc<B>,
    optimizer: VisualOptimizer,
}

impl<B: RasterBackend> OptimizeStage<B> {
    pub fn new(backend: Arc<B>, optimizer: VisualOptimizer) -> Self {
        Self { backend, optimizer }
    }
}

impl<B: RasterBackend> Stage<B::Image> for OptimizeStage<B> {
    fn name(&self) -> &'static str {
        "optimize"
    }

    fn process(&self, ctx: &mut ProcessingContext<B::Image>) -> Option<StageResult> {
        let source = ctx.source_file().display().to_string();

        let Some(image) = ctx.image_mut() else {
            return Some(Err(StageFailure::new(
                "optimize",
                format!("No image loaded for {}", source),
            )));
        };

        let result = match self.optimizer.optimize(self.backend.as_ref(), image) {
            Ok(result) => Ok(StageOutput::Optimization(result)),
            Err(e) => Err(StageFailure::new(
                "optimize",
                format!("Error optimizing photo for file {}: {}", source, e),
            )),
        };

        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::mock::{MockBackend, MockImage, MockOp};

    const Q: f64 = 65535.0;

    fn run(mean: f64, stddev: f64) -> (OptimizationResult, Vec<MockOp>) {
        let backend = MockBackend::new();
        let mut image = MockImage {
            mean,
            stddev,
            ..Default::default()
        };
        let result = VisualOptimizer::default()
            .optimize(&backend, &mut image)
            .unwrap();
        (result, backend.get_operations())
    }

    #[test]
    fn curve_end_points() {
        assert!((correction_curve(0.0, 0.3, 20.0) - 20.0).abs() < 1e-9);
        assert!(correction_curve(0.3, 0.3, 20.0).abs() < 1e-9);
        assert!((correction_curve(0.15, 0.3, 20.0) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn adjustments_stay_within_bounds() {
        let config = OptimizerConfig::default();

        for step in 0..=100 {
            let fraction = f64::from(step) / 100.0;

            match saturation_adjustment(fraction, &config) {
                Some(m) => {
                    assert!(fraction < 0.30);
                    assert!(m > 100.0 && m <= 120.0, "saturation {m} at {fraction}");
                }
                None => assert!(fraction >= 0.30 || correction_curve(fraction, 0.3, 20.0) <= 0.0),
            }

            let mean = fraction * Q;
            if let Some(s) = sigmoidal_adjustment(mean, Q, &config) {
                assert!(fraction < 0.30 && mean > 2000.0);
                assert!(s > 1.0 && s <= 3.0, "sigmoidal {s} at {fraction}");
            }
        }
    }

    #[test]
    fn flat_mid_gray_gets_saturation_only() {
        let (result, ops) = run(0.5 * Q, 0.0);

        let saturation = result.saturation_adjustment.unwrap();
        assert!((saturation - 120.0).abs() < 1e-6);
        assert!(result.sigmoidal_adjustment.is_none());
        assert!(result.was_optimized());

        assert_eq!(ops[0], MockOp::AutoLevel);
        assert!(ops.contains(&MockOp::Modulate {
            brightness: 100.0,
            saturation,
            hue: 100.0
        }));
        assert!(!ops.iter().any(|op| matches!(op, MockOp::Sigmoidal { .. })));
    }

    #[test]
    fn near_black_frame_is_not_brightened() {
        let (result, ops) = run(500.0, 0.4 * Q);
        assert!(result.sigmoidal_adjustment.is_none());
        assert!(result.saturation_adjustment.is_none());
        assert!(!result.was_optimized());
        assert_eq!(ops, vec![MockOp::AutoLevel, MockOp::Stats]);
    }

    #[test]
    fn dark_frame_is_brightened() {
        let (result, ops) = run(0.05 * Q, 0.35 * Q);

        let strength = result.sigmoidal_adjustment.unwrap();
        assert!(strength > 1.0 && strength <= 3.0);
        assert!(ops.contains(&MockOp::Sigmoidal {
            strength,
            midpoint: 0.0
        }));
    }

    #[test]
    fn brightening_runs_before_saturation() {
        let (result, ops) = run(0.05 * Q, 0.05 * Q);
        let strength = result.sigmoidal_adjustment.unwrap();
        let saturation = result.saturation_adjustment.unwrap();

        assert_eq!(
            ops,
            vec![
                MockOp::AutoLevel,
                MockOp::Stats,
                MockOp::Sigmoidal {
                    strength,
                    midpoint: 0.0
                },
                MockOp::Modulate {
                    brightness: 100.0,
                    saturation,
                    hue: 100.0
                },
            ]
        );
    }

    #[test]
    fn statistics_are_measured_once() {
        let (_, ops) = run(0.05 * Q, 0.05 * Q);
        assert_eq!(ops.iter().filter(|op| **op == MockOp::Stats).count(), 1);
    }

    #[test]
    fn primitive_failure_fails_the_stage() {
        let backend = Arc::new(MockBackend::new().failing_on("modulate"));
        let stage = OptimizeStage::new(backend, VisualOptimizer::default());

        let mut ctx = ProcessingContext::new("/photos/a.jpg");
        ctx.set_image(MockImage {
            stddev: 0.0,
            ..Default::default()
        });

        let failure = stage.process(&mut ctx).unwrap().unwrap_err();
        assert_eq!(failure.stage, "optimize");
        assert!(failure.message.contains("mock modulate failure"));
    }

    #[test]
    fn missing_image_fails_the_stage() {
        let stage = OptimizeStage::new(Arc::new(MockBackend::new()), VisualOptimizer::default());
        let mut ctx = ProcessingContext::new("/photos/a.jpg");
        assert!(stage.process(&mut ctx).unwrap().is_err());
    }
}
