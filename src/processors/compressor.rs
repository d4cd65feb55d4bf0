// photoprep/src/processors/compressor.rs
use super::external::{run_tool, ToolError};
use crate::core::context::ProcessingContext;
use crate::core::pipeline::Stage;
use crate::core::results::{MinifyResult, StageFailure, StageOutput, StageResult};
use crate::raster::RasterBackend;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;

/// Drops embedded metadata and profiles from the context image before any
/// rendition is written.
pub struct StripMetadataStage<B: RasterBackend> {
    backend: Arc<B>,
}

impl<B: RasterBackend> StripMetadataStage<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }
}

impl<B: RasterBackend> Stage<B::Image> for StripMetadataStage<B> {
    fn name(&self) -> &'static str {
        "strip"
    }

    fn process(&self, ctx: &mut ProcessingContext<B::Image>) -> Option<StageResult> {
        match ctx.image_mut() {
            Some(image) => {
                self.backend.strip_metadata(image);
                Some(Ok(StageOutput::MetadataStripped))
            }
            None => Some(Err(StageFailure::new(
                "strip",
                "No image loaded to strip metadata from",
            ))),
        }
    }
}

/// Lossless JPEG re-compression.
pub trait Recompressor: Send + Sync {
    fn recompress(&self, input: &Path, output: &Path) -> Result<(), ToolError>;
}

/// Huffman-optimized progressive re-encode with `jpegtran`, dropping all markers.
#[derive(Debug, Clone)]
pub struct JpegTran {
    binary: String,
}

impl JpegTran {
    pub fn new() -> Self {
        Self {
            binary: "jpegtran".to_string(),
        }
    }

    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn command(&self, input: &Path, output: &Path) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(["-optimize", "-progressive", "-copy", "none", "-outfile"])
            .arg(output)
            .arg(input);
        cmd
    }
}

impl Default for JpegTran {
    fn default() -> Self {
        Self::new()
    }
}

impl Recompressor for JpegTran {
    fn recompress(&self, input: &Path, output: &Path) -> Result<(), ToolError> {
        run_tool(self.command(input, output), &self.binary)
    }
}

/// Re-compresses the file a writer stage produced for `scale`, in place.
pub struct MinifyStage {
    scale: String,
    recompressor: Arc<dyn Recompressor>,
}

impl MinifyStage {
    pub fn new(scale: impl Into<String>, recompressor: Arc<dyn Recompressor>) -> Self {
        Self {
            scale: scale.into(),
            recompressor,
        }
    }

    fn minify(&self, file: &Path) -> Result<MinifyResult, ToolError> {
        let original_size = std::fs::metadata(file)?.len();
        let dir = file.parent().unwrap_or_else(|| Path::new("."));

        // removed on drop unless persisted over the original
        let minified = tempfile::Builder::new()
            .prefix(".minify-")
            .suffix(".jpg")
            .tempfile_in(dir)?;

        self.recompressor.recompress(file, minified.path())?;

        let minified_size = std::fs::metadata(minified.path())?.len();
        if minified_size == 0 {
            return Err(ToolError::Failed {
                tool: "minify".to_string(),
                status: "empty output".to_string(),
                message: format!("{} produced no data", file.display()),
            });
        }

        minified.persist(file).map_err(|e| ToolError::Io(e.error))?;

        Ok(MinifyResult {
            scale: self.scale.clone(),
            original_size,
            minified_size,
        })
    }
}

impl<I> Stage<I> for MinifyStage {
    fn name(&self) -> &'static str {
        "minify"
    }

    fn process(&self, ctx: &mut ProcessingContext<I>) -> Option<StageResult> {
        let Some(file) = ctx
            .results()
            .writer(&self.scale)
            .map(|w| w.local_path.clone())
        else {
            return Some(Err(StageFailure::new(
                "minify",
                format!("No {} rendition was written to minify", self.scale),
            )));
        };

        let result = match self.minify(&file) {
            Ok(result) => {
                log::debug!(
                    "Minified {}: {} -> {} bytes",
                    file.display(),
                    result.original_size,
                    result.minified_size
                );
                Ok(StageOutput::Minified(result))
            }
            Err(e) => Err(StageFailure::new(
                "minify",
                format!("Error minifying file {}: {}", file.display(), e),
            )),
        };

        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::results::PhotoWriterResult;
    use crate::raster::mock::{MockBackend, MockImage, MockOp};

    /// Copies the input minus its last byte.
    struct TrimmingRecompressor;

    impl Recompressor for TrimmingRecompressor {
        fn recompress(&self, input: &Path, output: &Path) -> Result<(), ToolError> {
            let mut data = std::fs::read(input)?;
            data.pop();
            std::fs::write(output, data)?;
            Ok(())
        }
    }

    struct FailingRecompressor;

    impl Recompressor for FailingRecompressor {
        fn recompress(&self, _input: &Path, _output: &Path) -> Result<(), ToolError> {
            Err(ToolError::Failed {
                tool: "jpegtran".to_string(),
                status: "exit status: 1".to_string(),
                message: "Not a JPEG file".to_string(),
            })
        }
    }

    fn context_with_rendition(file: &Path) -> ProcessingContext<()> {
        let mut ctx = ProcessingContext::new("/photos/a.jpg");
        ctx.push_result(Ok(StageOutput::Written(PhotoWriterResult {
            scale: "md".to_string(),
            width: 1024,
            height: 768,
            file_size: 10,
            local_path: file.to_path_buf(),
            url: "/images/2024/trip/md/a.jpg".to_string(),
        })));
        ctx
    }

    #[test]
    fn strip_requires_an_image() {
        let backend = Arc::new(MockBackend::new());
        let stage = StripMetadataStage::new(Arc::clone(&backend));

        let mut ctx = ProcessingContext::new("/photos/a.jpg");
        assert!(stage.process(&mut ctx).unwrap().is_err());

        ctx.set_image(MockImage::default());
        assert_eq!(
            stage.process(&mut ctx).unwrap(),
            Ok(StageOutput::MetadataStripped)
        );
        assert!(ctx.image().unwrap().stripped);
        assert_eq!(backend.get_operations(), vec![MockOp::Strip]);
    }

    #[test]
    fn jpegtran_arguments() {
        let cmd = JpegTran::new().command(Path::new("/in.jpg"), Path::new("/out.jpg"));
        let args: Vec<_> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec!["-optimize", "-progressive", "-copy", "none", "-outfile", "/out.jpg", "/in.jpg"]
        );
    }

    #[test]
    fn minify_replaces_rendition_in_place() {
        let tmp = tempfile::TempDir::new().unwrap();
        let file = tmp.path().join("a.jpg");
        std::fs::write(&file, b"0123456789").unwrap();

        let stage = MinifyStage::new("md", Arc::new(TrimmingRecompressor));
        let mut ctx = context_with_rendition(&file);

        let output = stage.process(&mut ctx).unwrap().unwrap();
        assert_eq!(
            output,
            StageOutput::Minified(MinifyResult {
                scale: "md".to_string(),
                original_size: 10,
                minified_size: 9,
            })
        );
        assert_eq!(std::fs::read(&file).unwrap(), b"012345678");
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 1);
    }

    #[test]
    fn failed_minify_keeps_original_and_cleans_up() {
        let tmp = tempfile::TempDir::new().unwrap();
        let file = tmp.path().join("a.jpg");
        std::fs::write(&file, b"0123456789").unwrap();

        let stage = MinifyStage::new("md", Arc::new(FailingRecompressor));
        let mut ctx = context_with_rendition(&file);

        let failure = stage.process(&mut ctx).unwrap().unwrap_err();
        assert!(failure.message.contains("Not a JPEG file"));
        assert_eq!(std::fs::read(&file).unwrap(), b"0123456789");
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 1);
    }

    #[test]
    fn minify_without_rendition_fails() {
        let stage = MinifyStage::new("sm", Arc::new(TrimmingRecompressor));
        let mut ctx: ProcessingContext<()> = ProcessingContext::new("/photos/a.jpg");
        assert!(stage.process(&mut ctx).unwrap().is_err());
    }
}
