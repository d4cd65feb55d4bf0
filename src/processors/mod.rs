// photoprep/src/processors/mod.rs
pub mod batch;
pub mod compressor;
pub mod external;
pub mod loader;
pub mod metadata;
pub mod mover;
pub mod optimizer;
pub mod quality;
pub mod raw;
pub mod resizer;

pub use batch::{BatchDriver, BatchReport};
pub use compressor::{JpegTran, MinifyStage, Recompressor, StripMetadataStage};
pub use loader::ReadStage;
pub use metadata::{ExifData, MetadataStage};
pub use mover::{MoveStage, SOURCE_SUBDIR};
pub use optimizer::{OptimizeStage, VisualOptimizer};
pub use quality::{QualitySearchStage, QualitySearcher};
pub use raw::{RawConverter, RawTherapeeConverter};
pub use resizer::{default_renditions, RenditionSpec, ResizeMode, WriterStage};

use crate::core::pipeline::Pipeline;
use crate::core::ProcessConfig;
use crate::raster::RasterBackend;
use crate::utils::PhotoPaths;
use std::sync::Arc;

/// External services the publishing stages call into.
pub struct Services<B: RasterBackend> {
    pub backend: Arc<B>,
    pub raw: Arc<dyn RawConverter>,
    pub recompressor: Arc<dyn Recompressor>,
}

impl<B: RasterBackend> Services<B> {
    /// `rawtherapee-cli` for RAW files and `jpegtran` for minification.
    pub fn with_external_tools(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
            raw: Arc::new(RawTherapeeConverter::new()),
            recompressor: Arc::new(JpegTran::new()),
        }
    }
}

/// Stage order for publishing one photo:
///
/// | # | Stage | Writes to |
/// |---|---|---|
/// | 1 | move source | `src/` |
/// | 2 | read EXIF | |
/// | 3 | decode | |
/// | 4 | visual optimization | |
/// | 5 | strip metadata | |
/// | 6 | quality search | |
/// | 7 | one writer per rendition | `xs_sq/`, `xs/`, `sm/`, `md/`, `lg/`, `prt/` |
/// | 8 | minify (unless disabled) | in place |
pub fn publishing_pipeline<B>(
    config: &ProcessConfig,
    paths: Arc<PhotoPaths>,
    services: &Services<B>,
) -> Pipeline<B::Image>
where
    B: RasterBackend + 'static,
    B::Image: 'static,
{
    let backend = &services.backend;
    let ceiling = config.quality.max_quality;

    let mut pipeline = Pipeline::new();
    pipeline
        .add_stage(MoveStage::new(SOURCE_SUBDIR))
        .add_stage(MetadataStage::new())
        .add_stage(ReadStage::new(
            Arc::clone(backend),
            Arc::clone(&services.raw),
            Arc::clone(&paths),
        ))
        .add_stage(OptimizeStage::new(
            Arc::clone(backend),
            VisualOptimizer::new(config.optimizer),
        ))
        .add_stage(StripMetadataStage::new(Arc::clone(backend)))
        .add_stage(QualitySearchStage::new(
            Arc::clone(backend),
            QualitySearcher::new(config.quality),
        ));

    let renditions = default_renditions(ceiling);

    for spec in &renditions {
        pipeline.add_stage(WriterStage::new(
            Arc::clone(backend),
            spec.clone(),
            Arc::clone(&paths),
            ceiling,
        ));
    }

    if config.minify {
        for spec in renditions.iter().filter(|s| s.minify) {
            pipeline.add_stage(MinifyStage::new(
                spec.scale.clone(),
                Arc::clone(&services.recompressor),
            ));
        }
    }

    pipeline
}
