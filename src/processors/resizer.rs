// photoprep/src/processors/resizer.rs
use crate::core::context::ProcessingContext;
use crate::core::pipeline::{OutputDirectory, Stage};
use crate::core::results::{PhotoWriterResult, StageFailure, StageOutput, StageResult};
use crate::raster::{BackendError, Dimensions, RasterBackend};
use crate::utils::{rendition_file_name, PhotoPaths};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeMode {
    /// Fill exactly `width`x`height`, cropping the overflow evenly from both sides.
    Fixed(u32, u32),
    /// Fit inside `width`x`height` keeping the aspect ratio; never upscales.
    Fit(u32, u32),
    /// Keep the source dimensions.
    Original,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenditionQuality {
    /// Use the quality the search stage chose.
    Searched,
    Fixed(u8),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenditionSpec {
    pub scale: String,
    pub mode: ResizeMode,
    pub quality: RenditionQuality,
    /// Whether the lossless re-compression pass applies to this rendition.
    pub minify: bool,
}

impl RenditionSpec {
    pub fn new(scale: impl Into<String>, mode: ResizeMode) -> Self {
        Self {
            scale: scale.into(),
            mode,
            quality: RenditionQuality::Searched,
            minify: true,
        }
    }
}

/// The rendition set published for every photo.
pub fn default_renditions(print_quality: u8) -> Vec<RenditionSpec> {
    vec![
        RenditionSpec::new("xs_sq", ResizeMode::Fixed(160, 120)),
        RenditionSpec::new("xs", ResizeMode::Fit(160, 120)),
        RenditionSpec::new("sm", ResizeMode::Fit(640, 480)),
        RenditionSpec::new("md", ResizeMode::Fit(1024, 768)),
        RenditionSpec::new("lg", ResizeMode::Original),
        RenditionSpec {
            scale: "prt".to_string(),
            mode: ResizeMode::Original,
            quality: RenditionQuality::Fixed(print_quality),
            minify: false,
        },
    ]
}

/// Largest size inside `max_w`x`max_h` with the source aspect ratio, no larger than the source.
pub fn fit_dimensions(orig_w: u32, orig_h: u32, max_w: u32, max_h: u32) -> (u32, u32) {
    if orig_w == 0 || orig_h == 0 {
        return (orig_w, orig_h);
    }

    let ratio_w = max_w as f64 / orig_w as f64;
    let ratio_h = max_h as f64 / orig_h as f64;
    let ratio = ratio_w.min(ratio_h).min(1.0);

    let new_w = (orig_w as f64 * ratio).round() as u32;
    let new_h = (orig_h as f64 * ratio).round() as u32;

    (new_w.max(1), new_h.max(1))
}

/// Scaled size and crop offset that fill `target_w`x`target_h` exactly.
pub fn fill_geometry(
    orig_w: u32,
    orig_h: u32,
    target_w: u32,
    target_h: u32,
) -> (u32, u32, u32, u32) {
    let aspect = orig_w as f64 / orig_h.max(1) as f64;
    let target_aspect = target_w as f64 / target_h.max(1) as f64;

    if aspect >= target_aspect {
        let scaled_w = ((aspect * target_h as f64).round() as u32).max(target_w);
        (scaled_w, target_h, (scaled_w - target_w) / 2, 0)
    } else {
        let scaled_h = ((target_w as f64 / aspect).round() as u32).max(target_h);
        (target_w, scaled_h, 0, (scaled_h - target_h) / 2)
    }
}

/// Writes one rendition of the context image into its own subdirectory.
pub struct WriterStage<B: RasterBackend> {
    backend: Arc<B>,
    spec: RenditionSpec,
    paths: Arc<PhotoPaths>,
    fallback_quality: u8,
}

impl<B: RasterBackend> WriterStage<B> {
    pub fn new(
        backend: Arc<B>,
        spec: RenditionSpec,
        paths: Arc<PhotoPaths>,
        fallback_quality: u8,
    ) -> Self {
        Self {
            backend,
            spec,
            paths,
            fallback_quality,
        }
    }

    pub fn spec(&self) -> &RenditionSpec {
        &self.spec
    }

    fn scale(&self, image: &B::Image) -> B::Image {
        let Dimensions { width, height } = self.backend.dimensions(image);

        match self.spec.mode {
            ResizeMode::Original => self.backend.duplicate(image),
            ResizeMode::Fit(max_w, max_h) => {
                let (w, h) = fit_dimensions(width, height, max_w, max_h);
                if (w, h) == (width, height) {
                    self.backend.duplicate(image)
                } else {
                    self.backend.resize(image, w, h)
                }
            }
            ResizeMode::Fixed(target_w, target_h) => {
                let (w, h, x, y) = fill_geometry(width, height, target_w, target_h);
                let scaled = self.backend.resize(image, w, h);
                self.backend.crop(&scaled, x, y, target_w, target_h)
            }
        }
    }

    fn write(
        &self,
        ctx: &ProcessingContext<B::Image>,
        image: &B::Image,
    ) -> Result<PhotoWriterResult, BackendError> {
        let quality = match self.spec.quality {
            RenditionQuality::Fixed(q) => q,
            RenditionQuality::Searched => ctx
                .results()
                .quality()
                .map(|q| q.quality)
                .unwrap_or(self.fallback_quality),
        };

        let file_name = rendition_file_name(ctx.source_file());
        let local_path = self.paths.scaled_local_path(&self.spec.scale, &file_name);
        let url = self.paths.scaled_web_path(&self.spec.scale, &file_name);

        // the scaled copy lives only for this call
        let mut scaled = self.scale(image);
        self.backend.sharpen(&mut scaled);
        self.backend.encode(&scaled, &local_path, quality)?;

        let Dimensions { width, height } = self.backend.dimensions(&scaled);
        let file_size = std::fs::metadata(&local_path)?.len();

        log::debug!(
            "Wrote {} ({}x{}, q{}, {} bytes)",
            local_path.display(),
            width,
            height,
            quality,
            file_size
        );

        Ok(PhotoWriterResult {
            scale: self.spec.scale.clone(),
            width,
            height,
            file_size,
            local_path,
            url,
        })
    }
}

impl<B: RasterBackend> Stage<B::Image> for WriterStage<B> {
    fn name(&self) -> &'static str {
        "write"
    }

    fn process(&self, ctx: &mut ProcessingContext<B::Image>) -> Option<StageResult> {
        let Some(image) = ctx.image() else {
            return Some(Err(StageFailure::new(
                "write",
                format!("No image loaded for scale {}", self.spec.scale),
            )));
        };

        let result = match self.write(ctx, image) {
            Ok(written) => Ok(StageOutput::Written(written)),
            Err(e) => Err(StageFailure::new(
                "write",
                format!("Error writing file for scale {}: {}", self.spec.scale, e),
            )),
        };

        Some(result)
    }

    fn as_output_directory(&self) -> Option<&dyn OutputDirectory> {
        Some(self)
    }
}

impl<B: RasterBackend> OutputDirectory for WriterStage<B> {
    fn output_subdirectory(&self) -> &str {
        &self.spec.scale
    }
}
