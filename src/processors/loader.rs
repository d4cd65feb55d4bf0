// photoprep/src/processors/loader.rs
use super::raw::RawConverter;
use crate::core::context::ProcessingContext;
use crate::core::pipeline::Stage;
use crate::core::results::{PhotoReaderResult, StageFailure, StageOutput, StageResult};
use crate::processors::mover::SOURCE_SUBDIR;
use crate::raster::RasterBackend;
use crate::utils::{file_name_string, is_raw_file, PhotoPaths};
use std::path::Path;
use std::sync::Arc;

/// Decodes the source photo into the context. RAW files go through the
/// converter first; the intermediate TIFF is removed on every path.
pub struct ReadStage<B: RasterBackend> {
    backend: Arc<B>,
    raw: Arc<dyn RawConverter>,
    paths: Arc<PhotoPaths>,
}

impl<B: RasterBackend> ReadStage<B> {
    pub fn new(backend: Arc<B>, raw: Arc<dyn RawConverter>, paths: Arc<PhotoPaths>) -> Self {
        Self { backend, raw, paths }
    }

    fn load(&self, source: &Path) -> Result<B::Image, String> {
        if !is_raw_file(source) {
            return self
                .backend
                .decode(source)
                .map_err(|e| format!("Error trying to read file {}: {}", source.display(), e));
        }

        let developed = tempfile::Builder::new()
            .prefix("photoprep-raw-")
            .suffix(".tif")
            .tempfile()
            .map_err(|e| format!("Cannot create temporary file for RAW conversion: {}", e))?;

        self.raw
            .convert(source, developed.path())
            .map_err(|e| format!("Error converting from raw for file {}: {}", source.display(), e))?;

        self.backend
            .decode(developed.path())
            .map_err(|e| format!("Error reading developed RAW {}: {}", source.display(), e))
    }
}

impl<B: RasterBackend> Stage<B::Image> for ReadStage<B> {
    fn name(&self) -> &'static str {
        "read"
    }

    fn process(&self, ctx: &mut ProcessingContext<B::Image>) -> Option<StageResult> {
        let source = ctx.source_file().to_path_buf();
        let url = self
            .paths
            .scaled_web_path(SOURCE_SUBDIR, &file_name_string(&source));

        let file_size = match std::fs::metadata(&source) {
            Ok(meta) => meta.len(),
            Err(e) => {
                return Some(Err(StageFailure::new(
                    "read",
                    format!("Cannot stat {}: {}", source.display(), e),
                )))
            }
        };

        if let Some(image) = ctx.image() {
            let dims = self.backend.dimensions(image);
            return Some(Ok(StageOutput::Read(PhotoReaderResult {
                width: dims.width,
                height: dims.height,
                file_size,
                url,
                skipped: true,
            })));
        }

        let image = match self.load(&source) {
            Ok(image) => image,
            Err(message) => return Some(Err(StageFailure::new("read", message))),
        };

        let dims = self.backend.dimensions(&image);
        log::debug!(
            "Loaded {}: {}x{} pixels",
            source.display(),
            dims.width,
            dims.height
        );

        ctx.set_image(image);

        Some(Ok(StageOutput::Read(PhotoReaderResult {
            width: dims.width,
            height: dims.height,
            file_size,
            url,
            skipped: false,
        })))
    }
}
