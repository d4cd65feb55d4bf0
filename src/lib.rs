//! Photo batch preparation for web publishing.
//!
//! A [`Publisher`] runs every photo of a category directory through a
//! [`Pipeline`] of stages: move the source aside, read EXIF, decode, correct
//! brightness and saturation, strip metadata, search the lowest visually
//! lossless JPEG quality, write the scaled renditions and minify them. The
//! results of a batch feed a [`CatalogWriter`].

pub mod catalog;
pub mod cli;
pub mod core;
pub mod processors;
pub mod raster;
pub mod utils;

pub use crate::catalog::{CatalogWriter, CategoryInfo, NoopWriter, PgsqlInsertWriter};
pub use crate::core::context::{PhotoRecord, ProcessingContext};
pub use crate::core::pipeline::{OutputDirectory, Pipeline, Stage};
pub use crate::core::processor::Publisher;
pub use crate::core::results::{StageFailure, StageOutput, StageResult, StageResults};
pub use crate::core::{
    OptimizerConfig, OutputMode, PhotoPrepError, ProcessConfig,
    QualitySearchConfig, Result,
};
pub use crate::processors::{
    publishing_pipeline, BatchDriver, BatchReport, QualitySearcher, Services, VisualOptimizer,
};
pub use crate::raster::{Photo, RasterBackend, RustBackend};
pub use crate::utils::{format_file_size, is_supported_format, PhotoPaths};

pub mod prelude {
    pub use crate::{
        BatchReport, OutputMode, Pipeline, ProcessConfig, Publisher, RasterBackend,
        RustBackend, Stage,
    };
}
